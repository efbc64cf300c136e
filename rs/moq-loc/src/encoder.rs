use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
	CaptureSource, EncodedChunk, EncoderConfig, EncoderEngine, EncoderFactory, EncoderOutput, EngineError, Error,
	RawFrame,
};

/// The lifecycle of the encoder owned by an [EncoderManager].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
	/// No session has been created yet.
	Uninitialized,

	/// A session is live and accepting frames.
	Running,

	/// The session is being flushed before it is replaced.
	Draining,

	/// The session hit an error and was discarded; a new one is created on the next tick.
	Failed,

	/// Torn down; nothing will be created again.
	Stopped,
}

// A live engine, replaced wholesale on restart.
struct EncoderSession<E> {
	engine: E,
	generation: u64,
	created: Instant,
	frames: u64,
}

/// Owns exactly one live encoder session and periodically replaces it.
///
/// Every restart forces a keyframe, which bounds the length of a group and guarantees late joiners
/// receive a fresh decoder configuration. Engine errors are contained: the session is discarded and
/// recreated on the next tick, dropping any frames captured in between.
pub struct EncoderManager<F: EncoderFactory> {
	factory: F,
	config: EncoderConfig,
	interval: Duration,
	output: mpsc::Sender<EncodedChunk>,

	session: Option<EncoderSession<F::Engine>>,
	state: EncoderState,
	generation: u64,
	dropped: u64,
}

impl<F: EncoderFactory> EncoderManager<F> {
	pub fn new(factory: F, config: EncoderConfig, interval: Duration, output: mpsc::Sender<EncodedChunk>) -> Self {
		Self {
			factory,
			config,
			interval,
			output,
			session: None,
			state: EncoderState::Uninitialized,
			generation: 0,
			dropped: 0,
		}
	}

	pub fn state(&self) -> EncoderState {
		self.state
	}

	/// The number of sessions created so far.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// The number of frames dropped because no session was live.
	pub fn dropped(&self) -> u64 {
		self.dropped
	}

	/// Create the first session.
	///
	/// Unlike later failures, an error here is returned so the caller can abort setup.
	pub fn start(&mut self) -> Result<(), EngineError> {
		if self.state != EncoderState::Uninitialized {
			return Ok(());
		}

		if let Err(err) = self.create() {
			self.state = EncoderState::Failed;
			return Err(err);
		}

		Ok(())
	}

	fn create(&mut self) -> Result<(), EngineError> {
		let output = EncoderOutput::new(self.output.clone());
		let engine = self.factory.create(&self.config, output)?;

		self.generation += 1;
		self.session = Some(EncoderSession {
			engine,
			generation: self.generation,
			created: Instant::now(),
			frames: 0,
		});
		self.state = EncoderState::Running;

		tracing::debug!(generation = self.generation, codec = %self.config.codec, "created encoder");

		Ok(())
	}

	// Discard the session after an engine error.
	fn fail(&mut self, err: EngineError) {
		if let Some(session) = self.session.take() {
			tracing::warn!(generation = session.generation, frames = session.frames, %err, "encoder failed");
			session.engine.close();
		}

		self.state = EncoderState::Failed;
	}

	/// Submit a frame to the live session, or drop it if there is none.
	pub fn encode(&mut self, frame: RawFrame) {
		let Some(session) = self.session.as_mut() else {
			self.dropped += 1;
			tracing::trace!(timestamp = ?frame.timestamp, state = ?self.state, "dropped frame");
			return;
		};

		match session.engine.encode(frame) {
			Ok(()) => session.frames += 1,
			Err(err) => self.fail(err),
		}
	}

	/// Flush and close the current session, then replace it with a fresh one.
	///
	/// A failed session is simply recreated. If creation fails, the manager stays [EncoderState::Failed]
	/// until the next restart.
	pub async fn restart(&mut self) {
		match self.state {
			EncoderState::Running | EncoderState::Failed => {}
			EncoderState::Uninitialized | EncoderState::Draining | EncoderState::Stopped => return,
		}

		if let Some(mut session) = self.session.take() {
			self.state = EncoderState::Draining;

			match session.engine.flush().await {
				Ok(()) => tracing::debug!(
					generation = session.generation,
					frames = session.frames,
					elapsed = ?session.created.elapsed(),
					"restarting encoder"
				),
				Err(err) => tracing::warn!(generation = session.generation, %err, "failed to flush encoder"),
			}

			session.engine.close();
		}

		if let Err(err) = self.create() {
			tracing::warn!(%err, "failed to create encoder, retrying on the next tick");
			self.state = EncoderState::Failed;
		}
	}

	/// Flush and close the live session, if any. Nothing is created afterwards.
	pub async fn stop(&mut self) {
		if let Some(mut session) = self.session.take() {
			self.state = EncoderState::Draining;

			if let Err(err) = session.engine.flush().await {
				tracing::warn!(generation = session.generation, %err, "failed to flush encoder");
			}

			session.engine.close();
		}

		if self.state != EncoderState::Stopped {
			tracing::debug!(generations = self.generation, dropped = self.dropped, "stopped encoder");
		}

		self.state = EncoderState::Stopped;
	}

	/// Pump frames from the capture source until it ends, fails, or `shutdown` fires (or is dropped).
	///
	/// The restart timer runs in the same task, so feeding a frame and restarting never overlap.
	/// [CaptureSource::next_frame] must be cancel safe, as a tick may interrupt it.
	pub async fn run<C: CaptureSource>(
		mut self,
		mut capture: C,
		mut shutdown: oneshot::Receiver<()>,
	) -> Result<(), Error> {
		self.start()?;

		let mut timer = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
		timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let res = loop {
			tokio::select! {
				biased;
				_ = &mut shutdown => break Ok(()),
				_ = timer.tick() => self.restart().await,
				frame = capture.next_frame() => match frame {
					Ok(Some(frame)) => self.encode(frame),
					Ok(None) => break Ok(()),
					Err(err) => break Err(Error::Capture(Arc::new(err))),
				},
			}
		};

		self.stop().await;

		res
	}
}
