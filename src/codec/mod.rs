//! Frame-level codec over async I/O.
//!
//! The codec is split into independent read and write halves so that one
//! task can own all socket reads and another all socket writes.

mod framed;

pub use framed::{FrameReader, FrameWriter};
