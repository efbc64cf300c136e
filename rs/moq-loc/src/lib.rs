//! # moq-loc: live media over MoQ objects
//!
//! Slices a live capture into Media over QUIC objects and reassembles them on the other side.
//! The transport, the codecs, and the render surface are external; this crate owns the mapping
//! between them, which is where playback semantics are won or lost:
//! - A new group starts at every keyframe, so a late joiner can start decoding at any group.
//! - The first object of every group carries the decoder configuration.
//! - The encoder is restarted periodically, bounding the length of a group.
//! - Decoding and rendering run on their own thread so they never stall the read loop.
//!
//! To publish, create a [Publisher] with an [EncoderFactory] and call [Publisher::setup] with a
//! [CaptureSource]. The resulting [ObjectStream] can be drained into any [ObjectSink] with [forward].
//!
//! To subscribe, create a [Subscriber] and call [Subscriber::setup] with an [ObjectSource], a
//! [DecoderEngine], and a [Renderer].
//!
//! Objects are described by LOC style extension headers; see [Extensions].

mod config;
mod encoder;
mod engine;
mod error;
mod model;
mod publish;
mod queue;
mod render;
mod sequencer;
mod subscribe;

pub mod coding;
pub mod transport;

#[cfg(test)]
mod mock;

pub use config::*;
pub use encoder::*;
pub use engine::*;
pub use error::*;
pub use model::*;
pub use publish::*;
pub use queue::*;
pub use render::*;
pub use sequencer::*;
pub use subscribe::*;
pub use transport::{ObjectSink, ObjectSource, forward};
