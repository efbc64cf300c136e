use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::{Error, MediaObject, QueuePolicy};

#[derive(Default)]
struct State {
	objects: VecDeque<MediaObject>,
	closed: bool,
	dropped: u64,
}

struct Shared {
	policy: QueuePolicy,
	state: Mutex<State>,
	notify: Notify,
}

/// Create the outgoing object queue between the sequencer and the transport.
pub fn queue(policy: QueuePolicy) -> (QueueProducer, QueueConsumer) {
	let shared = Arc::new(Shared {
		policy,
		state: Default::default(),
		notify: Notify::new(),
	});

	(QueueProducer { shared: shared.clone() }, QueueConsumer { shared })
}

/// The write half, closed when dropped.
pub struct QueueProducer {
	shared: Arc<Shared>,
}

impl QueueProducer {
	/// Append an object, returning [Error::Closed] if the consumer is gone.
	pub fn push(&self, object: MediaObject) -> Result<(), Error> {
		let mut state = self.shared.state.lock().unwrap();
		if state.closed {
			return Err(Error::Closed);
		}

		state.objects.push_back(object);

		if let QueuePolicy::DropGroups { max_objects } = self.shared.policy {
			Self::enforce(&mut state, max_objects);
		}

		drop(state);
		self.shared.notify.notify_one();

		Ok(())
	}

	// Drop whole groups from the front until we're under the limit, always keeping the newest group.
	fn enforce(state: &mut State, max_objects: usize) {
		let Some(newest) = state.objects.back().map(|o| o.group()) else {
			return;
		};

		while state.objects.len() > max_objects {
			let Some(oldest) = state.objects.front().map(|o| o.group()) else {
				break;
			};

			if oldest >= newest {
				break;
			}

			let count = state.objects.iter().take_while(|o| o.group() == oldest).count();
			state.objects.drain(..count);
			state.dropped += count as u64;

			tracing::warn!(group = oldest, count, "transport is behind, dropped group");
		}
	}

	pub fn close(self) {}
}

impl Drop for QueueProducer {
	fn drop(&mut self) {
		self.shared.state.lock().unwrap().closed = true;
		self.shared.notify.notify_one();
	}
}

/// The read half, consumed by a single transport sink.
pub struct QueueConsumer {
	shared: Arc<Shared>,
}

impl QueueConsumer {
	/// Return the next object, or `None` once the producer is closed and the queue is drained.
	pub async fn next(&mut self) -> Option<MediaObject> {
		loop {
			{
				let mut state = self.shared.state.lock().unwrap();
				if let Some(object) = state.objects.pop_front() {
					return Some(object);
				}

				if state.closed {
					return None;
				}
			}

			self.shared.notify.notified().await;
		}
	}

	/// The number of objects waiting to be consumed.
	pub fn len(&self) -> usize {
		self.shared.state.lock().unwrap().objects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The number of objects discarded by the queue policy.
	pub fn dropped(&self) -> u64 {
		self.shared.state.lock().unwrap().dropped
	}

	/// Stop accepting new objects; anything already queued can still be read.
	pub fn close(&mut self) {
		self.shared.state.lock().unwrap().closed = true;
	}
}

impl Drop for QueueConsumer {
	fn drop(&mut self) {
		self.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Extensions, Location, TrackName};

	use bytes::Bytes;

	fn object(group: u64, object: u64) -> MediaObject {
		let mut extensions = Extensions::new();
		extensions.set_frame_marking(object == 0);

		MediaObject {
			track: TrackName::new("moqtail", "demo"),
			location: Location::new(group, object),
			priority: 1,
			extensions,
			payload: Bytes::from_static(b"x"),
		}
	}

	async fn collect(consumer: &mut QueueConsumer) -> Vec<(u64, u64)> {
		let mut out = Vec::new();
		while let Some(object) = consumer.next().await {
			out.push((object.group(), object.object()));
		}
		out
	}

	#[tokio::test]
	async fn test_unbounded() {
		let (producer, mut consumer) = queue(QueuePolicy::Unbounded);

		for i in 0..100 {
			producer.push(object(1 + i / 10, i % 10)).unwrap();
		}

		assert_eq!(consumer.len(), 100);
		drop(producer);

		assert_eq!(collect(&mut consumer).await.len(), 100);
		assert_eq!(consumer.dropped(), 0);
	}

	#[tokio::test]
	async fn test_drop_groups() {
		let (producer, mut consumer) = queue(QueuePolicy::DropGroups { max_objects: 4 });

		for (group, object_id) in [(1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (3, 0), (3, 1)] {
			producer.push(object(group, object_id)).unwrap();
		}
		drop(producer);

		// Whole groups are dropped, never a prefix.
		assert_eq!(collect(&mut consumer).await, vec![(2, 0), (2, 1), (3, 0), (3, 1)]);
		assert_eq!(consumer.dropped(), 3);
	}

	#[tokio::test]
	async fn test_drop_groups_keeps_newest() {
		let (producer, mut consumer) = queue(QueuePolicy::DropGroups { max_objects: 2 });

		for object_id in 0..5 {
			producer.push(object(7, object_id)).unwrap();
		}
		drop(producer);

		assert_eq!(collect(&mut consumer).await.len(), 5);
	}

	#[tokio::test]
	async fn test_wakeup() {
		let (producer, mut consumer) = queue(QueuePolicy::Unbounded);

		let task = tokio::spawn(async move { collect(&mut consumer).await });

		tokio::task::yield_now().await;
		producer.push(object(1, 0)).unwrap();
		tokio::task::yield_now().await;
		producer.push(object(1, 1)).unwrap();
		producer.close();

		assert_eq!(task.await.unwrap(), vec![(1, 0), (1, 1)]);
	}

	#[test]
	fn test_consumer_gone() {
		let (producer, consumer) = queue(QueuePolicy::Unbounded);
		drop(consumer);

		assert!(matches!(producer.push(object(1, 0)), Err(Error::Closed)));
	}
}
