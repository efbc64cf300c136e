//! The seam to the transport: anything that can accept outgoing objects or yield incoming ones.
//!
//! The protocol engine itself lives elsewhere. This module provides the traits plus two adapters:
//! an in-process [channel] and a byte stream codec ([ObjectWriter] and [ObjectReader]).

mod local;
mod stream;

pub use local::*;
pub use stream::*;

use std::future::Future;

use crate::{Error, MediaObject, ObjectStream};

/// Accepts outgoing objects in commit order.
pub trait ObjectSink: Send {
	fn write_object(&mut self, object: MediaObject) -> impl Future<Output = Result<(), Error>> + Send;

	/// Signal that no more objects will be written.
	fn finish(&mut self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Yields incoming objects in arrival order.
pub trait ObjectSource: Send {
	/// Returns `None` at the end of the stream.
	fn read_object(&mut self) -> impl Future<Output = Result<Option<MediaObject>, Error>> + Send;
}

/// Drain a publish session into a sink until either side ends.
///
/// If the sink fails, the publisher is stopped and whatever is still queued is discarded; that is
/// not an error. Otherwise the sink is finished and the reason the publisher ended is returned.
pub async fn forward<S: ObjectSink>(mut objects: ObjectStream, sink: &mut S) -> Result<(), Error> {
	while let Some(object) = objects.next().await {
		let location = object.location;

		if let Err(err) = sink.write_object(object).await {
			tracing::warn!(group = location.group, object = location.object, queued = objects.queued(), %err, "sink closed, stopping publisher");

			if let Err(err) = objects.close().await {
				tracing::warn!(%err, "publisher failed while closing");
			}

			return Ok(());
		}
	}

	let res = objects.close().await;
	sink.finish().await?;

	res
}
