//! Wire encoding for objects and their metadata.
//!
//! Everything is built on QUIC variable-length integers, the same as the MoQ control and data streams.

mod decode;
mod encode;
mod varint;

pub use decode::*;
pub use encode::*;
pub use varint::*;

// Re-export the bytes crate
pub use bytes::*;
