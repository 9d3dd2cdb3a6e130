//! UTF-8 validation for text messages.
//!
//! Text messages may arrive fragmented, and a multi-byte character may be
//! split across fragment boundaries. The validator carries the unfinished
//! tail of one fragment into the next.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator for fragmented text messages.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Bytes of a multi-byte sequence left open by the previous fragment.
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Validator {
    /// Create a new UTF-8 validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate one fragment.
    ///
    /// For non-final fragments an unfinished sequence at the end is kept for
    /// the next call. For the final fragment every sequence must be complete.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` if the data contains invalid UTF-8.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let data = if self.pending_len > 0 {
            // Finish the open sequence first, using at most 3 more bytes.
            let take = data.len().min(4 - self.pending_len);
            let mut joined = [0u8; 4];
            joined[..self.pending_len].copy_from_slice(&self.pending[..self.pending_len]);
            joined[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            let joined_len = self.pending_len + take;

            match std::str::from_utf8(&joined[..joined_len]) {
                Ok(_) => {
                    self.pending_len = 0;
                    &data[take..]
                }
                Err(e) if e.valid_up_to() > 0 => {
                    // The open sequence completed; rescan from where it ended.
                    let used = e.valid_up_to() - self.pending_len;
                    self.pending_len = 0;
                    &data[used..]
                }
                Err(e) if e.error_len().is_none() && take == data.len() => {
                    // Still unfinished: this fragment was too short.
                    self.pending[..joined_len].copy_from_slice(&joined[..joined_len]);
                    self.pending_len = joined_len;
                    return if is_final { Err(Error::InvalidUtf8) } else { Ok(()) };
                }
                Err(_) => return Err(Error::InvalidUtf8),
            }
        } else {
            data
        };

        match std::str::from_utf8(data) {
            Ok(_) => Ok(()),
            Err(e) if !is_final && e.error_len().is_none() => {
                let tail = &data[e.valid_up_to()..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Ok(())
            }
            Err(_) => Err(Error::InvalidUtf8),
        }
    }

    /// Reset the validator state, discarding any open sequence.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Check if an open sequence is pending.
    pub fn has_incomplete(&self) -> bool {
        self.pending_len > 0
    }
}

/// Validate that a byte slice is complete, valid UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data).map(|_| ()).map_err(|_| Error::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate("Hello 世界 🌍".as_bytes(), true).is_ok());
        assert!(validate_utf8("émoji 🎉".as_bytes()).is_ok());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0x80], true).is_err());

        validator.reset();
        assert!(validator.validate(&[0xc0, 0x80], true).is_err());

        validator.reset();
        assert!(validator.validate(&[0x48, 0x65, 0x80, 0x6c], false).is_err());
    }

    #[test]
    fn test_incomplete_sequence_final_fails() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xe2], true).is_err());
    }

    #[test]
    fn test_multibyte_split_across_fragments() {
        // 🎉 = F0 9F 8E 89
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xf0, 0x9f], false).is_ok());
        assert!(validator.has_incomplete());
        assert!(validator.validate(&[0x8e, 0x89], true).is_ok());
        assert!(!validator.has_incomplete());

        // three-way split
        validator.reset();
        assert!(validator.validate(&[0xf0], false).is_ok());
        assert!(validator.validate(&[0x9f], false).is_ok());
        assert!(validator.validate(&[0x8e, 0x89], true).is_ok());
    }

    #[test]
    fn test_split_followed_by_more_text() {
        // "Hello 世界": 世 = E4 B8 96, 界 = E7 95 8C
        let mut validator = Utf8Validator::new();
        let mut frag1 = b"Hello ".to_vec();
        frag1.push(0xe4);
        assert!(validator.validate(&frag1, false).is_ok());
        assert!(validator.validate(&[0xb8, 0x96, 0xe7, 0x95], false).is_ok());
        assert!(validator.validate(&[0x8c], true).is_ok());
    }

    #[test]
    fn test_bad_continuation_after_split() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xe2], false).is_ok());
        assert!(validator.validate(&[0x41, 0x42], true).is_err());
    }

    #[test]
    fn test_empty_fragment_keeps_pending() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xe2], false).is_ok());
        assert!(validator.validate(&[], false).is_ok());
        assert!(validator.has_incomplete());
        assert!(validator.validate(&[0x82, 0xac], true).is_ok());
    }
}
