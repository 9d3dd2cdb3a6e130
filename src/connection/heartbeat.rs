//! Liveness check: periodic pings with a pong deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, trace};

use crate::connection::close::{CloseCause, CloseCoordinator};
use crate::protocol::Frame;

/// Asks the dispatcher for a ping every `interval` and tears the connection
/// down when no pong follows within `pong_timeout`.
///
/// Any pong counts, whatever its payload. A zero `pong_timeout` keeps the
/// pings going without enforcing a deadline.
pub(crate) struct Heartbeat {
    interval: Duration,
    pong_timeout: Duration,
    control: mpsc::Sender<Frame>,
    pongs: watch::Receiver<u64>,
    coordinator: Arc<CloseCoordinator>,
}

impl Heartbeat {
    pub(crate) fn new(
        interval: Duration,
        pong_timeout: Duration,
        control: mpsc::Sender<Frame>,
        pongs: watch::Receiver<u64>,
        coordinator: Arc<CloseCoordinator>,
    ) -> Self {
        Self {
            interval,
            pong_timeout,
            control,
            pongs,
            coordinator,
        }
    }

    pub(crate) async fn run(mut self) {
        let token = self.coordinator.token().clone();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // pongs that arrived before this ping do not answer it
            let _ = self.pongs.borrow_and_update();
            seq = seq.wrapping_add(1);
            let ping = Frame::ping(seq.to_be_bytes().to_vec());
            let sent = tokio::select! {
                biased;
                () = token.cancelled() => break,
                sent = self.control.send(ping) => sent,
            };
            if sent.is_err() {
                break;
            }
            trace!(seq, "Ping queued");

            if self.pong_timeout.is_zero() {
                continue;
            }
            let answered = tokio::select! {
                biased;
                () = token.cancelled() => break,
                answered = timeout(self.pong_timeout, self.pongs.changed()) => answered,
            };
            match answered {
                Ok(Ok(())) => trace!(seq, "Pong in time"),
                // the reader is gone, so teardown is already under way
                Ok(Err(_)) => break,
                Err(_) => {
                    self.coordinator
                        .trigger(CloseCause::PongTimeout(self.pong_timeout));
                    break;
                }
            }
        }
        debug!("Heartbeat stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    struct Harness {
        control: mpsc::Receiver<Frame>,
        pongs: watch::Sender<u64>,
        coordinator: Arc<CloseCoordinator>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_heartbeat(interval: Duration, pong_timeout: Duration) -> Harness {
        let (control_tx, control) = mpsc::channel(8);
        let (pongs, pongs_rx) = watch::channel(0);
        let coordinator = Arc::new(CloseCoordinator::new());
        let heartbeat = Heartbeat::new(
            interval,
            pong_timeout,
            control_tx,
            pongs_rx,
            Arc::clone(&coordinator),
        );
        Harness {
            control,
            pongs,
            coordinator,
            task: tokio::spawn(heartbeat.run()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_ping_after_one_interval() {
        let mut harness = spawn_heartbeat(Duration::from_secs(5), Duration::from_secs(1));
        let start = Instant::now();

        let ping = harness.control.recv().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_millis(5010));
        assert_eq!(ping.opcode, OpCode::Ping);
        assert_eq!(ping.payload(), &1u64.to_be_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pong_triggers_teardown() {
        let mut harness = spawn_heartbeat(Duration::from_secs(5), Duration::from_secs(2));
        let start = Instant::now();

        harness.control.recv().await.unwrap();
        harness.task.await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_millis(7010));
        assert_eq!(
            harness.coordinator.cause(),
            Some(CloseCause::PongTimeout(Duration::from_secs(2)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_keeps_connection_alive() {
        let mut harness = spawn_heartbeat(Duration::from_secs(5), Duration::from_secs(2));

        for seq in 1..=4u64 {
            let ping = harness.control.recv().await.unwrap();
            assert_eq!(ping.payload(), &seq.to_be_bytes());
            harness.pongs.send_modify(|seen| *seen += 1);
        }
        assert!(!harness.coordinator.is_closing());

        harness.coordinator.trigger(CloseCause::Local);
        harness.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pong_does_not_count() {
        let mut harness = spawn_heartbeat(Duration::from_secs(5), Duration::from_secs(2));
        // unsolicited pong before any ping
        harness.pongs.send_modify(|seen| *seen += 1);

        harness.control.recv().await.unwrap();
        harness.task.await.unwrap();
        assert!(matches!(
            harness.coordinator.cause(),
            Some(CloseCause::PongTimeout(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_pong_timeout_never_enforced() {
        let mut harness = spawn_heartbeat(Duration::from_secs(1), Duration::ZERO);
        for _ in 0..5 {
            harness.control.recv().await.unwrap();
        }
        assert!(!harness.coordinator.is_closing());
        harness.coordinator.trigger(CloseCause::Local);
        harness.task.await.unwrap();
    }
}
