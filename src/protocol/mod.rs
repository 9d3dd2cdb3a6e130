//! WebSocket wire protocol (RFC 6455): frames, masking, validation and
//! message reassembly.

pub mod assembler;
pub mod frame;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use assembler::MessageAssembler;
pub use frame::{Frame, FrameHeader};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use utf8::{Utf8Validator, validate_utf8};
pub use validation::FrameValidator;
