//! # mockmate-protocol
//!
//! Wire format of the MockMate event stream.
//!
//! ```text
//! data: {"type":"<kind>","data":{...}}\n\n
//! data: [DONE]\n\n
//! ```
//!
//! - [`frame`]: splitting a normalized byte buffer into complete frames
//! - [`buffer`]: [`FrameBuffer`], the per-channel parse buffer
//! - [`codec`]: [`encode`]/[`decode`] between frames and [`LogicalEvent`]s
//!
//! Everything here is synchronous and free of I/O.
//!
//! [`LogicalEvent`]: mockmate_core::LogicalEvent

#![deny(unsafe_code)]

pub mod buffer;
pub mod codec;
pub mod frame;

pub use buffer::{DEFAULT_MAX_FRAME_BYTES, FrameBuffer, FrameError};
pub use codec::{Decoded, decode, decode_data, encode, encode_terminator};
pub use frame::{DELIMITER, RawFrame, TERMINATOR_LITERAL};
