use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
	CaptureSource, EncoderFactory, EncoderManager, Error, MediaObject, ObjectSequencer, PublishConfig, QueueConsumer,
	QueueProducer, Track, queue,
};

/// Turns a capture source into a stream of sequenced objects.
pub struct Publisher<F: EncoderFactory> {
	config: PublishConfig,
	factory: F,
}

impl<F: EncoderFactory> Publisher<F> {
	pub fn new(config: PublishConfig, factory: F) -> Self {
		Self { config, factory }
	}

	/// Start encoding, returning the outgoing objects.
	///
	/// This consumes the publisher; a pipeline can only be set up once.
	/// Fails if the capture source is missing or the first encoder can't be created.
	/// Must be called within a tokio runtime.
	pub fn setup<C: CaptureSource>(self, capture: impl Into<Option<C>>) -> Result<ObjectStream, Error> {
		let capture = capture.into().ok_or(Error::Unavailable("capture source"))?;

		let track = self.config.track.track();
		let (output, chunks) = mpsc::channel(self.config.output_capacity.max(1));

		let mut encoder = EncoderManager::new(
			self.factory,
			self.config.encoder.clone(),
			self.config.restart_interval,
			output,
		);
		encoder.start()?;

		let (producer, consumer) = queue(self.config.queue);
		let (shutdown, closed) = oneshot::channel();

		tracing::info!(track = %track.name, codec = %self.config.encoder.codec, "publishing");

		let sequencer = ObjectSequencer::new(track.clone());
		tokio::spawn(Self::run_sequencer(sequencer, chunks, producer));
		let encoder = tokio::spawn(encoder.run(capture, closed));

		Ok(ObjectStream {
			track,
			consumer,
			shutdown: Some(shutdown),
			encoder: Some(encoder),
		})
	}

	async fn run_sequencer(
		mut sequencer: ObjectSequencer,
		mut chunks: mpsc::Receiver<crate::EncodedChunk>,
		producer: QueueProducer,
	) {
		while let Some(chunk) = chunks.recv().await {
			let object = sequencer.sequence(chunk);
			tracing::trace!(group = object.group(), object = object.object(), size = object.payload.len(), "sequenced");

			if producer.push(object).is_err() {
				tracing::debug!(track = %sequencer.track().name, "outgoing queue closed");
				break;
			}
		}
	}
}

/// The outgoing objects of a publish session.
///
/// Single consumer and not restartable: once the session ends, whatever is queued is returned
/// and then [Self::next] yields `None` forever.
pub struct ObjectStream {
	track: Track,
	consumer: QueueConsumer,
	shutdown: Option<oneshot::Sender<()>>,
	encoder: Option<JoinHandle<Result<(), Error>>>,
}

impl ObjectStream {
	pub fn track(&self) -> &Track {
		&self.track
	}

	/// Return the next object in emission order.
	pub async fn next(&mut self) -> Option<MediaObject> {
		self.consumer.next().await
	}

	/// The number of objects waiting to be sent.
	pub fn queued(&self) -> usize {
		self.consumer.len()
	}

	/// The number of objects discarded by the queue policy.
	pub fn dropped(&self) -> u64 {
		self.consumer.dropped()
	}

	/// Stop capturing. The live encoder is flushed and anything already queued can still be read.
	pub fn stop(&mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
	}

	/// Stop the session and discard anything queued, returning the reason the pipeline ended.
	pub async fn close(mut self) -> Result<(), Error> {
		self.consumer.close();
		self.stop();
		self.finished().await
	}

	/// Wait for the encoder task to exit without stopping it.
	///
	/// Returns a capture error if that's why the session ended.
	pub async fn finished(&mut self) -> Result<(), Error> {
		match self.encoder.take() {
			Some(task) => task.await.map_err(|_| Error::Cancel)?,
			None => Ok(()),
		}
	}
}
