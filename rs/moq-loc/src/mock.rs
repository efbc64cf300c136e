//! Test doubles for the engine seams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::{
	CaptureSource, DecodedFrame, DecoderEngine, EncodedChunk, EncoderConfig, EncoderEngine, EncoderFactory,
	EncoderOutput, EngineError, RawFrame, Renderer, Timestamp,
};

pub const CONFIG: &[u8] = b"mock-config";

/// Shared knobs and counters for every engine created by a [MockFactory].
#[derive(Debug, Default)]
pub struct MockState {
	pub create_attempts: usize,
	pub created: usize,
	pub flushed: usize,
	pub closed: usize,
	pub encoded: usize,

	// The order of lifecycle calls: "create", "flush", "close".
	pub events: Vec<&'static str>,

	pub fail_create: bool,
	pub fail_next_encode: bool,

	// Hold output until the next flush.
	pub buffer: bool,
}

#[derive(Clone, Default)]
pub struct MockFactory {
	pub state: Arc<Mutex<MockState>>,
}

impl MockFactory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
		self.state.lock().unwrap()
	}
}

impl EncoderFactory for MockFactory {
	type Engine = MockEncoder;

	fn create(&mut self, _config: &EncoderConfig, output: EncoderOutput) -> Result<MockEncoder, EngineError> {
		let mut state = self.state.lock().unwrap();
		state.create_attempts += 1;

		if state.fail_create {
			return Err(EngineError::msg("create failed"));
		}

		state.created += 1;
		state.events.push("create");

		Ok(MockEncoder {
			state: self.state.clone(),
			output,
			frames: 0,
			pending: Vec::new(),
		})
	}
}

/// Emits every frame unchanged, with a keyframe only at the start of the session.
pub struct MockEncoder {
	state: Arc<Mutex<MockState>>,
	output: EncoderOutput,
	frames: u64,
	pending: Vec<EncodedChunk>,
}

impl EncoderEngine for MockEncoder {
	fn encode(&mut self, frame: RawFrame) -> Result<(), EngineError> {
		let mut state = self.state.lock().unwrap();
		if std::mem::take(&mut state.fail_next_encode) {
			return Err(EngineError::msg("encode failed"));
		}

		let keyframe = self.frames == 0;
		self.frames += 1;
		state.encoded += 1;

		let chunk = EncodedChunk {
			timestamp: frame.timestamp,
			keyframe,
			payload: frame.data,
			config: keyframe.then(|| Bytes::from_static(CONFIG)),
		};

		if state.buffer {
			self.pending.push(chunk);
			Ok(())
		} else {
			self.output.send(chunk)
		}
	}

	async fn flush(&mut self) -> Result<(), EngineError> {
		for chunk in self.pending.drain(..) {
			self.output.send(chunk)?;
		}

		let mut state = self.state.lock().unwrap();
		state.flushed += 1;
		state.events.push("flush");

		Ok(())
	}

	fn close(self) {
		let mut state = self.state.lock().unwrap();
		state.closed += 1;
		state.events.push("close");
	}
}

/// Produces a frame every `interval` of (usually paused) tokio time.
pub struct MockCapture {
	interval: Duration,
	index: u64,
	pub limit: Option<u64>,
	pub fail_at: Option<u64>,
}

impl MockCapture {
	pub fn new(interval: Duration) -> Self {
		Self {
			interval,
			index: 0,
			limit: None,
			fail_at: None,
		}
	}
}

impl CaptureSource for MockCapture {
	async fn next_frame(&mut self) -> anyhow::Result<Option<RawFrame>> {
		if self.limit.is_some_and(|limit| self.index >= limit) {
			return Ok(None);
		}

		if self.fail_at == Some(self.index) {
			anyhow::bail!("camera unplugged");
		}

		tokio::time::sleep(self.interval).await;

		let timestamp = Timestamp::try_from(self.interval * self.index as u32)?;
		let data = Bytes::from(self.index.to_be_bytes().to_vec());
		self.index += 1;

		Ok(Some(RawFrame { timestamp, data }))
	}
}

#[derive(Debug, Default)]
pub struct MockDecoderState {
	pub configs: Vec<Bytes>,
	pub decoded: usize,
	pub closed: bool,
}

/// Passes payloads through, failing on the payload `bad`.
#[derive(Clone, Default)]
pub struct MockDecoder {
	pub state: Arc<Mutex<MockDecoderState>>,
}

impl DecoderEngine for MockDecoder {
	fn configure(&mut self, config: &[u8]) -> Result<(), EngineError> {
		self.state.lock().unwrap().configs.push(Bytes::copy_from_slice(config));
		Ok(())
	}

	fn decode(&mut self, chunk: EncodedChunk) -> Result<Option<DecodedFrame>, EngineError> {
		if chunk.payload.as_ref() == b"bad" {
			return Err(EngineError::msg("corrupt payload"));
		}

		self.state.lock().unwrap().decoded += 1;

		Ok(Some(DecodedFrame {
			timestamp: chunk.timestamp,
			data: chunk.payload,
		}))
	}

	fn close(&mut self) {
		self.state.lock().unwrap().closed = true;
	}
}

#[derive(Debug, Default)]
pub struct MockRendererState {
	pub frames: Vec<DecodedFrame>,
	pub released: bool,
}

/// Records every frame, failing on the payload `norender`.
#[derive(Clone, Default)]
pub struct MockRenderer {
	pub state: Arc<Mutex<MockRendererState>>,
}

impl Renderer for MockRenderer {
	fn render(&mut self, frame: DecodedFrame) -> anyhow::Result<()> {
		anyhow::ensure!(frame.data.as_ref() != b"norender", "surface lost");
		self.state.lock().unwrap().frames.push(frame);
		Ok(())
	}

	fn release(&mut self) {
		self.state.lock().unwrap().released = true;
	}
}
