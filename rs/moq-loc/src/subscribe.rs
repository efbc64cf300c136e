use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{
	DecodeRenderContext, DecoderEngine, Error, ExtensionKind, MediaObject, ObjectSource, RenderHandle, RenderStats,
	RenderTask, Renderer, Severity, TrackName,
};

/// Reads objects for a single track and dispatches them to a decode/render thread.
#[derive(Clone, Debug)]
pub struct Subscriber {
	track: TrackName,
}

impl Subscriber {
	pub fn new(track: TrackName) -> Self {
		Self { track }
	}

	pub fn track(&self) -> &TrackName {
		&self.track
	}

	/// Spawn the render thread and the read loop.
	///
	/// Fails if the render target is missing. Must be called within a tokio runtime.
	pub fn setup<S: ObjectSource + 'static, D: DecoderEngine, R: Renderer>(
		self,
		mut source: S,
		decoder: D,
		renderer: impl Into<Option<R>>,
	) -> Result<Subscription, Error> {
		let renderer = renderer.into().ok_or(Error::Unavailable("render target"))?;
		let (handle, render) = DecodeRenderContext::new(decoder, renderer).spawn()?;

		let (shutdown, closed) = oneshot::channel();

		tracing::info!(track = %self.track, "subscribing");

		let task = tokio::spawn(async move {
			tokio::select! {
				res = self.run(&mut source, &handle) => res,
				_ = closed => Ok(()),
			}
		});

		Ok(Subscription {
			shutdown: Some(shutdown),
			task,
			render,
		})
	}

	/// Forward objects from the source until it ends.
	///
	/// The end of the stream or a transport error ends the loop quietly; an object that doesn't
	/// belong to this track is a protocol violation and is returned.
	pub async fn run<S: ObjectSource>(&self, source: &mut S, handle: &RenderHandle) -> Result<(), Error> {
		loop {
			let object = match source.read_object().await {
				Ok(Some(object)) => object,
				Ok(None) => break,
				Err(err) if err.severity() == Severity::Ended => {
					tracing::debug!(track = %self.track, %err, "transport ended");
					break;
				}
				Err(err) => return Err(err),
			};

			self.validate(&object)?;

			if object.payload.is_empty() {
				tracing::warn!(group = object.group(), object = object.object(), "dropping empty object");
				continue;
			}

			tracing::trace!(group = object.group(), object = object.object(), size = object.payload.len(), "received");

			if handle.send(object).is_err() {
				tracing::debug!(track = %self.track, "render thread exited");
				break;
			}
		}

		Ok(())
	}

	/// Check that an object belongs to this track and carries the required metadata.
	pub fn validate(&self, object: &MediaObject) -> Result<(), Error> {
		if object.track != self.track {
			return Err(Error::WrongTrack {
				expected: self.track.clone(),
				got: object.track.clone(),
			});
		}

		if object.capture_timestamp().is_none() {
			return Err(Error::MissingExtension(ExtensionKind::CaptureTimestamp));
		}

		if object.extensions.frame_marking().is_none() {
			return Err(Error::MissingExtension(ExtensionKind::VideoFrameMarking));
		}

		Ok(())
	}
}

/// A running subscription; dropping it stops the read loop.
pub struct Subscription {
	shutdown: Option<oneshot::Sender<()>>,
	task: JoinHandle<Result<(), Error>>,
	render: RenderTask,
}

impl Subscription {
	/// Stop reading; anything already dispatched is still rendered.
	pub fn stop(&mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
	}

	/// Wait for the read loop to end and the render thread to drain.
	///
	/// Returns the render counters, or the protocol violation that ended the read loop.
	pub async fn closed(self) -> Result<RenderStats, Error> {
		// Keep the read loop alive until it ends on its own.
		let _shutdown = self.shutdown;

		let res = self.task.await.map_err(|_| Error::Cancel)?;
		let stats = self.render.join().await?;

		res.map(|_| stats)
	}
}
