//! Stand-ins for the platform media stack, so the pipelines can run anywhere.
//!
//! Frames are a single scan line of a moving test pattern, prefixed with the frame number.
//! The "codec" passes them through unchanged.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use moq_loc::{
	CaptureSource, DecodedFrame, DecoderEngine, EncodedChunk, EncoderConfig, EncoderEngine, EncoderFactory,
	EncoderOutput, EngineError, RawFrame, Renderer, Timestamp,
};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};

/// The decoder configuration produced by [RawFactory], serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
	pub codec: String,
	pub width: u32,
	pub height: u32,
	pub framerate: u32,
}

impl From<&EncoderConfig> for StreamInfo {
	fn from(config: &EncoderConfig) -> Self {
		Self {
			codec: config.codec.clone(),
			width: config.width,
			height: config.height,
			framerate: config.framerate,
		}
	}
}

/// Produces frames at the configured frame rate until `duration` has elapsed.
pub struct TestPattern {
	width: usize,
	interval: tokio::time::Interval,
	start: Instant,
	duration: Option<Duration>,
	index: u64,
}

impl TestPattern {
	pub fn new(config: &EncoderConfig, duration: Option<Duration>) -> Self {
		let mut interval = tokio::time::interval(config.frame_interval());
		interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

		Self {
			width: config.width as usize,
			interval,
			start: Instant::now(),
			duration,
			index: 0,
		}
	}
}

impl CaptureSource for TestPattern {
	async fn next_frame(&mut self) -> anyhow::Result<Option<RawFrame>> {
		let now = self.interval.tick().await;
		let elapsed = now.duration_since(self.start);

		if self.duration.is_some_and(|duration| elapsed >= duration) {
			return Ok(None);
		}

		let mut data = BytesMut::with_capacity(8 + self.width);
		data.put_u64(self.index);
		data.extend((0..self.width).map(|x| (x as u64 + self.index) as u8));

		self.index += 1;

		Ok(Some(RawFrame {
			timestamp: Timestamp::try_from(elapsed)?,
			data: data.freeze(),
		}))
	}
}

/// Creates [RawEncoder]s that force a keyframe every `gop` frames.
pub struct RawFactory {
	gop: u64,
}

impl RawFactory {
	pub fn new(gop: u64) -> Self {
		Self { gop: gop.max(1) }
	}
}

impl EncoderFactory for RawFactory {
	type Engine = RawEncoder;

	fn create(&mut self, config: &EncoderConfig, output: EncoderOutput) -> Result<RawEncoder, EngineError> {
		let info = StreamInfo::from(config);
		let config = serde_json::to_vec(&info).map_err(anyhow::Error::from)?;

		Ok(RawEncoder {
			config: config.into(),
			gop: self.gop,
			frames: 0,
			output,
		})
	}
}

pub struct RawEncoder {
	config: Bytes,
	gop: u64,
	frames: u64,
	output: EncoderOutput,
}

impl EncoderEngine for RawEncoder {
	fn encode(&mut self, frame: RawFrame) -> Result<(), EngineError> {
		let keyframe = self.frames % self.gop == 0;
		self.frames += 1;

		self.output.send(EncodedChunk {
			timestamp: frame.timestamp,
			keyframe,
			payload: frame.data,
			config: keyframe.then(|| self.config.clone()),
		})
	}

	async fn flush(&mut self) -> Result<(), EngineError> {
		Ok(())
	}

	fn close(self) {
		tracing::trace!(frames = self.frames, "closed raw encoder");
	}
}

/// The inverse of [RawEncoder], validating frames against the stream info.
#[derive(Default)]
pub struct RawDecoder {
	info: Option<StreamInfo>,
}

impl DecoderEngine for RawDecoder {
	fn configure(&mut self, config: &[u8]) -> Result<(), EngineError> {
		let info: StreamInfo = serde_json::from_slice(config).map_err(anyhow::Error::from)?;
		tracing::info!(?info, "configured decoder");
		self.info = Some(info);
		Ok(())
	}

	fn decode(&mut self, chunk: EncodedChunk) -> Result<Option<DecodedFrame>, EngineError> {
		let info = self.info.as_ref().ok_or(EngineError::msg("not configured"))?;
		if chunk.payload.len() != 8 + info.width as usize {
			return Err(EngineError::msg("unexpected frame size"));
		}

		Ok(Some(DecodedFrame {
			timestamp: chunk.timestamp,
			data: chunk.payload,
		}))
	}
}

/// Logs rendered frames instead of drawing them.
#[derive(Default)]
pub struct LogRenderer {
	frames: u64,
	last: Option<u64>,
}

impl Renderer for LogRenderer {
	fn render(&mut self, frame: DecodedFrame) -> anyhow::Result<()> {
		let mut data = frame.data;
		anyhow::ensure!(data.len() >= 8, "truncated frame");
		let index = data.get_u64();

		if let Some(last) = self.last {
			if index != last + 1 {
				tracing::warn!(expected = last + 1, got = index, "skipped frames");
			}
		}

		self.last = Some(index);
		self.frames += 1;

		tracing::debug!(index, timestamp = ?frame.timestamp, "rendered frame");
		Ok(())
	}

	fn release(&mut self) {
		tracing::info!(frames = self.frames, "released renderer");
	}
}
