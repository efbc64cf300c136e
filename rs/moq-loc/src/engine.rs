//! The seams to the platform: capture, encoder and decoder engines, and the render surface.
//!
//! None of these are implemented here. The pipelines are generic over them so they can be backed
//! by a hardware encoder, a software codec, or a test double.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{EncoderConfig, EngineError, Timestamp};

/// A raw frame produced by a capture source.
#[derive(Clone, derive_more::Debug)]
pub struct RawFrame {
	pub timestamp: Timestamp,

	#[debug("{} bytes", data.len())]
	pub data: Bytes,
}

/// One unit of encoder output.
#[derive(Clone, derive_more::Debug)]
pub struct EncodedChunk {
	/// The capture timestamp of the frame that produced this chunk.
	pub timestamp: Timestamp,

	/// Whether this chunk can be decoded independently.
	pub keyframe: bool,

	#[debug("{} bytes", payload.len())]
	pub payload: Bytes,

	/// The decoder configuration, when the engine reports one alongside this chunk.
	#[debug("{:?}", config.as_ref().map(|c| c.len()))]
	pub config: Option<Bytes>,
}

/// A decoded frame ready to be rendered.
#[derive(Clone, derive_more::Debug)]
pub struct DecodedFrame {
	pub timestamp: Timestamp,

	#[debug("{} bytes", data.len())]
	pub data: Bytes,
}

/// A source of raw frames, ex. a camera.
pub trait CaptureSource: Send + 'static {
	/// Wait for the next frame, returning `None` once the capture has ended.
	fn next_frame(&mut self) -> impl Future<Output = anyhow::Result<Option<RawFrame>>> + Send;
}

/// The output half handed to an encoder engine when it is created.
///
/// Sending never blocks. If the sequencer falls behind and the channel is full, the send fails and the
/// engine should report the error, which discards the session until the next restart.
#[derive(Clone, Debug)]
pub struct EncoderOutput {
	tx: mpsc::Sender<EncodedChunk>,
}

impl EncoderOutput {
	pub(crate) fn new(tx: mpsc::Sender<EncodedChunk>) -> Self {
		Self { tx }
	}

	pub fn send(&self, chunk: EncodedChunk) -> Result<(), EngineError> {
		self.tx.try_send(chunk).map_err(|err| match err {
			mpsc::error::TrySendError::Full(_) => EngineError::msg("encoder output is full"),
			mpsc::error::TrySendError::Closed(_) => EngineError::msg("encoder output is closed"),
		})
	}
}

/// A live encoder instance.
pub trait EncoderEngine: Send + 'static {
	/// Submit a frame; output is delivered asynchronously via [EncoderOutput].
	fn encode(&mut self, frame: RawFrame) -> Result<(), EngineError>;

	/// Emit any buffered output.
	fn flush(&mut self) -> impl Future<Output = Result<(), EngineError>> + Send;

	/// Release the engine. Called after [Self::flush], or directly once the engine has reported an error.
	fn close(self);
}

/// Creates encoder engines with a fixed configuration.
pub trait EncoderFactory: Send + 'static {
	type Engine: EncoderEngine;

	/// Create a fresh engine. Its first output must be a keyframe.
	fn create(&mut self, config: &EncoderConfig, output: EncoderOutput) -> Result<Self::Engine, EngineError>;
}

/// A decoder instance, driven synchronously from the render thread.
pub trait DecoderEngine: Send + 'static {
	/// (Re)initialize the decoder with an opaque configuration blob.
	fn configure(&mut self, config: &[u8]) -> Result<(), EngineError>;

	/// Decode a single chunk, returning a frame if one is ready.
	fn decode(&mut self, chunk: EncodedChunk) -> Result<Option<DecodedFrame>, EngineError>;

	fn close(&mut self) {}
}

/// A render surface.
pub trait Renderer: Send + 'static {
	fn render(&mut self, frame: DecodedFrame) -> anyhow::Result<()>;

	/// Release the surface; no further frames will be rendered.
	fn release(&mut self) {}
}
