use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{DecoderEngine, EncodedChunk, Error, Extensions, Location, MediaObject, Renderer, Timestamp};

/// An object handed to the render thread, which takes ownership of the payload.
#[derive(Clone, derive_more::Debug)]
pub struct RenderMessage {
	pub location: Location,
	pub extensions: Extensions,

	#[debug("{} bytes", payload.len())]
	pub payload: Bytes,
}

impl From<MediaObject> for RenderMessage {
	fn from(object: MediaObject) -> Self {
		Self {
			location: object.location,
			extensions: object.extensions,
			payload: object.payload,
		}
	}
}

/// Counters reported by a [DecodeRenderContext] once it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RenderStats {
	pub received: u64,
	pub rendered: u64,

	/// Objects skipped because the decoder rejected them.
	pub decode_errors: u64,

	/// Frames skipped because the surface rejected them.
	pub render_errors: u64,

	/// Objects discarded because no decoder configuration had arrived yet.
	pub unconfigured: u64,

	/// The number of times the decoder was (re)configured.
	pub configured: u64,
}

/// Decodes and renders objects in order, off the read path.
///
/// A decode or render error only skips the offending object. Payloads that arrive before the first
/// decoder configuration are discarded, so playback starts at the first group with one.
pub struct DecodeRenderContext<D: DecoderEngine, R: Renderer> {
	decoder: D,
	renderer: R,
	config: Option<Bytes>,
	stats: RenderStats,
}

impl<D: DecoderEngine, R: Renderer> DecodeRenderContext<D, R> {
	pub fn new(decoder: D, renderer: R) -> Self {
		Self {
			decoder,
			renderer,
			config: None,
			stats: RenderStats::default(),
		}
	}

	pub fn stats(&self) -> RenderStats {
		self.stats
	}

	pub fn handle(&mut self, msg: RenderMessage) {
		self.stats.received += 1;

		// Every configuration-bearing object (re)initializes the decoder, even with an unchanged config.
		if let Some(config) = msg.extensions.video_config() {
			match self.decoder.configure(config) {
				Ok(()) => {
					tracing::debug!(group = msg.location.group, size = config.len(), "configured decoder");
					self.config = Some(config.clone());
					self.stats.configured += 1;
				}
				Err(err) => {
					tracing::warn!(group = msg.location.group, %err, "failed to configure decoder");
					self.config = None;
					self.stats.decode_errors += 1;
					return;
				}
			}
		}

		if self.config.is_none() {
			tracing::trace!(group = msg.location.group, object = msg.location.object, "waiting for decoder config");
			self.stats.unconfigured += 1;
			return;
		}

		let chunk = EncodedChunk {
			timestamp: msg.extensions.capture_timestamp().unwrap_or(Timestamp::ZERO),
			keyframe: msg.extensions.frame_marking().unwrap_or(false),
			payload: msg.payload,
			config: None,
		};

		let frame = match self.decoder.decode(chunk) {
			Ok(Some(frame)) => frame,
			Ok(None) => return,
			Err(err) => {
				tracing::warn!(group = msg.location.group, object = msg.location.object, %err, "failed to decode");
				self.stats.decode_errors += 1;
				return;
			}
		};

		match self.renderer.render(frame) {
			Ok(()) => self.stats.rendered += 1,
			Err(err) => {
				tracing::warn!(group = msg.location.group, object = msg.location.object, %err, "failed to render");
				self.stats.render_errors += 1;
			}
		}
	}

	/// Close the decoder and release the surface.
	pub fn close(mut self) -> RenderStats {
		self.decoder.close();
		self.renderer.release();
		tracing::debug!(stats = ?self.stats, "render context closed");
		self.stats
	}

	/// Run on a dedicated thread until every [RenderHandle] is dropped.
	pub fn spawn(self) -> Result<(RenderHandle, RenderTask), Error> {
		let (tx, mut rx) = mpsc::unbounded_channel::<RenderMessage>();

		let thread = std::thread::Builder::new()
			.name("moq-loc-render".to_string())
			.spawn(move || {
				let mut context = self;
				while let Some(msg) = rx.blocking_recv() {
					context.handle(msg);
				}
				context.close()
			})
			.map_err(|err| {
				tracing::error!(%err, "failed to spawn render thread");
				Error::Unavailable("render thread")
			})?;

		Ok((RenderHandle { tx }, RenderTask { thread }))
	}
}

/// Sends objects to a spawned [DecodeRenderContext].
#[derive(Clone)]
pub struct RenderHandle {
	tx: mpsc::UnboundedSender<RenderMessage>,
}

impl RenderHandle {
	/// Never blocks; returns [Error::Closed] if the render thread has exited.
	pub fn send(&self, msg: impl Into<RenderMessage>) -> Result<(), Error> {
		self.tx.send(msg.into()).map_err(|_| Error::Closed)
	}
}

pub struct RenderTask {
	thread: std::thread::JoinHandle<RenderStats>,
}

impl RenderTask {
	/// Wait for the render thread to drain its queue and exit.
	pub async fn join(self) -> Result<RenderStats, Error> {
		let thread = self.thread;
		let res = tokio::task::spawn_blocking(move || thread.join()).await;
		match res {
			Ok(Ok(stats)) => Ok(stats),
			_ => Err(Error::Cancel),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::*;

	fn msg(group: u64, object: u64, payload: &'static [u8], config: Option<&'static [u8]>) -> RenderMessage {
		let mut extensions = Extensions::new();
		extensions.set_capture_timestamp(Timestamp::from_millis(group * 1000 + object * 33).unwrap());
		extensions.set_frame_marking(object == 0);
		if let Some(config) = config {
			extensions.set_video_config(Bytes::from_static(config));
		}

		RenderMessage {
			location: Location::new(group, object),
			extensions,
			payload: Bytes::from_static(payload),
		}
	}

	#[test]
	fn test_decode_error_skips_one() {
		let decoder = MockDecoder::default();
		let renderer = MockRenderer::default();
		let mut context = DecodeRenderContext::new(decoder.clone(), renderer.clone());

		context.handle(msg(1, 0, b"k", Some(b"cfg")));
		context.handle(msg(1, 1, b"d1", None));
		context.handle(msg(1, 2, b"bad", None));
		context.handle(msg(1, 3, b"d3", None));

		let stats = context.close();
		assert_eq!(stats.rendered, 3);
		assert_eq!(stats.decode_errors, 1);

		let rendered: Vec<_> = renderer.state.lock().unwrap().frames.iter().map(|f| f.data.clone()).collect();
		assert_eq!(rendered, vec![&b"k"[..], &b"d1"[..], &b"d3"[..]]);

		assert!(decoder.state.lock().unwrap().closed);
		assert!(renderer.state.lock().unwrap().released);
	}

	#[test]
	fn test_unconfigured() {
		let decoder = MockDecoder::default();
		let mut context = DecodeRenderContext::new(decoder.clone(), MockRenderer::default());

		// Joined mid-group.
		context.handle(msg(4, 7, b"d", None));
		context.handle(msg(4, 8, b"d", None));
		context.handle(msg(5, 0, b"k", Some(b"cfg")));
		context.handle(msg(5, 1, b"d", None));

		let stats = context.stats();
		assert_eq!(stats.unconfigured, 2);
		assert_eq!(stats.rendered, 2);
		assert_eq!(decoder.state.lock().unwrap().decoded, 2);
	}

	#[test]
	fn test_reconfigure() {
		let decoder = MockDecoder::default();
		let mut context = DecodeRenderContext::new(decoder.clone(), MockRenderer::default());

		context.handle(msg(1, 0, b"k", Some(b"one")));
		context.handle(msg(2, 0, b"k", Some(b"one")));
		context.handle(msg(3, 0, b"k", Some(b"two")));

		assert_eq!(context.stats().configured, 3);
		assert_eq!(
			decoder.state.lock().unwrap().configs,
			vec![&b"one"[..], &b"one"[..], &b"two"[..]]
		);
	}

	#[test]
	fn test_recover_after_decode_error() {
		let decoder = MockDecoder::default();
		let renderer = MockRenderer::default();
		let mut context = DecodeRenderContext::new(decoder.clone(), renderer.clone());

		context.handle(msg(1, 0, b"k", Some(b"cfg")));
		context.handle(msg(1, 1, b"bad", None));
		context.handle(msg(2, 0, b"k2", Some(b"cfg")));

		// The same configuration is applied again at the next keyframe.
		assert_eq!(decoder.state.lock().unwrap().configs, vec![&b"cfg"[..], &b"cfg"[..]]);

		let stats = context.stats();
		assert_eq!(stats.configured, 2);
		assert_eq!(stats.decode_errors, 1);
		assert_eq!(stats.rendered, 2);
	}

	#[test]
	fn test_render_error() {
		let mut context = DecodeRenderContext::new(MockDecoder::default(), MockRenderer::default());

		context.handle(msg(1, 0, b"k", Some(b"cfg")));
		context.handle(msg(1, 1, b"norender", None));
		context.handle(msg(1, 2, b"d", None));

		let stats = context.stats();
		assert_eq!(stats.render_errors, 1);
		assert_eq!(stats.rendered, 2);
	}

	#[tokio::test]
	async fn test_thread() {
		let renderer = MockRenderer::default();
		let context = DecodeRenderContext::new(MockDecoder::default(), renderer.clone());
		let (handle, task) = context.spawn().unwrap();

		handle.send(msg(1, 0, b"k", Some(b"cfg"))).unwrap();
		for i in 1..10 {
			handle.send(msg(1, i, b"d", None)).unwrap();
		}
		drop(handle);

		let stats = task.join().await.unwrap();
		assert_eq!(stats.received, 10);
		assert_eq!(stats.rendered, 10);
		assert!(renderer.state.lock().unwrap().released);
	}
}
