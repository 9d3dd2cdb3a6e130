//! Concurrency tests for connections.
//!
//! Tests ordering, liveness and teardown with many callers sharing one
//! connection. The far end is either a second `Connection` or a raw frame
//! reader/writer pair driven by the test.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use wsstream::codec::{FrameReader, FrameWriter};
use wsstream::protocol::{Frame, OpCode};
use wsstream::{CloseCause, Config, Connection, ConnectionState, Error, MessageMode, Role};

type PeerReader = FrameReader<ReadHalf<DuplexStream>>;
type PeerWriter = FrameWriter<WriteHalf<DuplexStream>>;

fn server_with_raw_peer(config: Config) -> (Arc<Connection>, PeerReader, PeerWriter) {
    let (io, peer) = duplex(256 * 1024);
    let conn = Connection::new(io, Role::Server, config);
    let (peer_read, peer_write) = tokio::io::split(peer);
    (
        Arc::new(conn),
        FrameReader::new(peer_read, Role::Client, &Config::client()),
        FrameWriter::new(peer_write, Role::Client),
    )
}

fn connected_pair(server: Config, client: Config) -> (Arc<Connection>, Arc<Connection>) {
    let (a, b) = duplex(64 * 1024);
    (
        Arc::new(Connection::new(a, Role::Server, server)),
        Arc::new(Connection::new(b, Role::Client, client)),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_keep_their_order() {
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 200;

    let (conn, mut peer, _peer_tx) = server_with_raw_peer(Config::server());

    let mut set = JoinSet::new();
    for writer in 0..WRITERS {
        let conn = Arc::clone(&conn);
        set.spawn(async move {
            for seq in 0..PER_WRITER {
                let payload = format!("{writer}:{seq}");
                let enqueued = conn.write(payload.as_bytes()).await.unwrap();
                assert_eq!(enqueued.len, payload.len());
            }
        });
    }

    let mut next_seq: HashMap<usize, usize> = HashMap::new();
    for _ in 0..WRITERS * PER_WRITER {
        let frame = peer.read_frame().await.unwrap();
        assert_eq!(frame.opcode, OpCode::Text);
        let text = std::str::from_utf8(frame.payload()).unwrap();
        let (writer, seq) = text.split_once(':').unwrap();
        let writer: usize = writer.parse().unwrap();
        let seq: usize = seq.parse().unwrap();

        let expected = next_seq.entry(writer).or_insert(0);
        assert_eq!(seq, *expected, "writer {writer} out of order");
        *expected += 1;
    }

    while let Some(result) = set.join_next().await {
        result.unwrap();
    }
    assert!(next_seq.values().all(|&n| n == PER_WRITER));
}

#[tokio::test]
async fn test_single_writer_wire_order_is_enqueue_order() {
    let (conn, mut peer, _peer_tx) = server_with_raw_peer(Config::server());

    for i in 0..300u32 {
        conn.write(&i.to_be_bytes()).await.unwrap();
    }
    for i in 0..300u32 {
        let frame = peer.read_frame().await.unwrap();
        assert_eq!(frame.payload(), &i.to_be_bytes());
    }
}

#[tokio::test]
async fn test_inbound_order_with_small_queue() {
    let config = Config::server().with_inbound_capacity(1);
    let (conn, _peer, mut peer_tx) = server_with_raw_peer(config);

    let sender = tokio::spawn(async move {
        for i in 0..500u32 {
            let frame = if i % 2 == 0 {
                Frame::binary(i.to_be_bytes().to_vec())
            } else {
                Frame::text(i.to_string())
            };
            peer_tx.write_frame(&frame).await.unwrap();
        }
        peer_tx
    });

    let mut buf = [0u8; 16];
    for i in 0..500u32 {
        let read = conn.read_message(&mut buf).await.unwrap();
        if i % 2 == 0 {
            assert_eq!(read.mode, MessageMode::Binary);
            assert_eq!(&buf[..read.len], &i.to_be_bytes());
        } else {
            assert_eq!(read.mode, MessageMode::Text);
            assert_eq!(&buf[..read.len], i.to_string().as_bytes());
        }
    }
    let _peer_tx = sender.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_messages() {
    const MESSAGES: u32 = 400;
    let (server, client) = connected_pair(Config::server(), Config::client());
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

    let mut readers = JoinSet::new();
    for _ in 0..4 {
        let server = Arc::clone(&server);
        let seen_tx = seen_tx.clone();
        readers.spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; 4];
            while let Ok(n) = server.read(&mut buf).await {
                assert_eq!(n, 4);
                let value = u32::from_be_bytes(buf);
                seen.push(value);
                seen_tx.send(value).unwrap();
            }
            seen
        });
    }
    drop(seen_tx);

    client.set_message_mode(MessageMode::Binary).unwrap();
    for i in 0..MESSAGES {
        client.write(&i.to_be_bytes()).await.unwrap();
    }

    // close only once everything is through; close does not drain the queue
    let mut all = Vec::new();
    while all.len() < MESSAGES as usize {
        all.push(seen_rx.recv().await.unwrap());
    }
    client.close().await.unwrap();

    while let Some(result) = readers.join_next().await {
        let seen = result.unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
    all.sort_unstable();
    assert_eq!(all, (0..MESSAGES).collect::<Vec<_>>());
    assert_eq!(server.close_cause(), Some(CloseCause::Peer(Some(1000))));
}

#[tokio::test(start_paused = true)]
async fn test_missing_pong_tears_down_between_interval_and_deadline() {
    let interval = Duration::from_secs(5);
    let pong_timeout = Duration::from_secs(2);
    let config = Config::server()
        .with_ping_interval(interval)
        .with_pong_timeout(pong_timeout);
    let (conn, mut peer, _peer_tx) = server_with_raw_peer(config);
    let start = Instant::now();

    // the peer reads everything and answers nothing
    let frames = tokio::spawn(async move {
        let mut opcodes = Vec::new();
        while let Ok(frame) = peer.read_frame().await {
            opcodes.push((frame.opcode, frame.payload().to_vec()));
        }
        opcodes
    });

    tokio::time::sleep(interval - Duration::from_millis(100)).await;
    assert_eq!(conn.state(), ConnectionState::Open);

    conn.closed().await;
    let elapsed = start.elapsed();
    assert!(elapsed >= interval + pong_timeout, "torn down after {elapsed:?}");
    assert!(elapsed < interval + pong_timeout + Duration::from_millis(100));

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.close_cause(), Some(CloseCause::PongTimeout(pong_timeout)));
    assert_eq!(conn.recv().await, Err(Error::PongTimeout(pong_timeout)));
    assert_eq!(conn.write(b"x").await, Err(Error::PongTimeout(pong_timeout)));

    let frames = frames.await.unwrap();
    assert_eq!(frames[0], (OpCode::Ping, 1u64.to_be_bytes().to_vec()));
    assert_eq!(frames[1], (OpCode::Close, vec![0x03, 0xE9]));
}

#[tokio::test(start_paused = true)]
async fn test_answering_peer_stays_connected() {
    let config = Config::server()
        .with_ping_interval(Duration::from_secs(1))
        .with_pong_timeout(Duration::from_millis(500));
    let (server, client) = connected_pair(config, Config::client());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(server.state(), ConnectionState::Open);
    assert_eq!(client.state(), ConnectionState::Open);

    client.write(b"still here").await.unwrap();
    let mut buf = [0u8; 32];
    let n = server.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"still here");
}

#[tokio::test(start_paused = true)]
async fn test_zero_ping_interval_sends_no_pings() {
    let config = Config::server().with_ping_interval(Duration::ZERO);
    let (conn, mut peer, _peer_tx) = server_with_raw_peer(config);

    let quiet = tokio::time::timeout(Duration::from_secs(600), peer.read_frame()).await;
    assert!(quiet.is_err(), "unexpected frame: {quiet:?}");
    assert_eq!(conn.state(), ConnectionState::Open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_closes_collapse_into_one() {
    let (conn, mut peer, _peer_tx) = server_with_raw_peer(Config::server());

    let mut set = JoinSet::new();
    for _ in 0..16 {
        let conn = Arc::clone(&conn);
        set.spawn(async move { conn.close().await });
    }

    let mut accepted = 0;
    while let Some(result) = set.join_next().await {
        match result.unwrap() {
            Ok(()) => accepted += 1,
            Err(err) => assert_eq!(err, Error::ConnectionClosed(None)),
        }
    }
    assert_eq!(accepted, 1);

    conn.closed().await;
    let frame = peer.read_frame().await.unwrap();
    assert_eq!(frame.opcode, OpCode::Close);
    assert!(matches!(
        peer.read_frame().await,
        Err(Error::ConnectionClosed(None))
    ));
}

#[tokio::test]
async fn test_write_deadline_unblocks_pending_reader_and_writer() {
    let config = Config::server()
        .with_outbound_capacity(1)
        .with_write_timeout(Duration::from_millis(200));
    let (io, _peer) = duplex(64);
    let conn = Arc::new(Connection::new(io, Role::Server, config));

    let reader = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.recv().await })
    };
    let writer = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move {
            // the peer never reads, so the queue eventually stays full
            loop {
                if let Err(err) = conn.write(&[0u8; 1024]).await {
                    return err;
                }
            }
        })
    };

    conn.closed().await;
    assert!(matches!(reader.await.unwrap(), Err(Error::WriteTimeout(_))));
    assert!(matches!(writer.await.unwrap(), Error::WriteTimeout(_)));
}
