use tokio::sync::mpsc;

use crate::{Error, MediaObject, ObjectSink, ObjectSource};

/// Create an in-process transport: objects written to the sink are read from the source.
pub fn channel() -> (LocalSink, LocalSource) {
	let (tx, rx) = mpsc::unbounded_channel();
	(LocalSink { tx: Some(tx) }, LocalSource { rx })
}

pub struct LocalSink {
	tx: Option<mpsc::UnboundedSender<Result<MediaObject, Error>>>,
}

impl LocalSink {
	/// End the stream with an error, which the source will return.
	pub fn abort(mut self, err: Error) {
		if let Some(tx) = self.tx.take() {
			let _ = tx.send(Err(err));
		}
	}

	fn send(&mut self, item: Result<MediaObject, Error>) -> Result<(), Error> {
		let tx = self.tx.as_ref().ok_or(Error::Closed)?;
		tx.send(item).map_err(|_| Error::Closed)
	}
}

impl ObjectSink for LocalSink {
	async fn write_object(&mut self, object: MediaObject) -> Result<(), Error> {
		self.send(Ok(object))
	}

	async fn finish(&mut self) -> Result<(), Error> {
		self.tx.take();
		Ok(())
	}
}

pub struct LocalSource {
	rx: mpsc::UnboundedReceiver<Result<MediaObject, Error>>,
}

impl ObjectSource for LocalSource {
	async fn read_object(&mut self) -> Result<Option<MediaObject>, Error> {
		self.rx.recv().await.transpose()
	}
}
