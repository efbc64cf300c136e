use bytes::Bytes;

use crate::{EncodedChunk, Extensions, Location, MediaObject, Track};

/// Assigns group and object identifiers to encoder output and attaches the per-object metadata.
///
/// A new group starts at every keyframe, and the first object of each group carries the decoder
/// configuration once one is known. The configuration is also attached whenever it changes.
#[derive(Debug)]
pub struct ObjectSequencer {
	track: Track,

	// The group of the most recent object; zero until the first keyframe.
	group: u64,

	// The object ID to assign next.
	object: u64,

	// The most recent decoder configuration reported by the encoder.
	config: Option<Bytes>,

	// Set at each keyframe, cleared once the configuration has been attached within the group.
	config_pending: bool,
}

impl ObjectSequencer {
	pub fn new(track: Track) -> Self {
		Self {
			track,
			group: 0,
			object: 0,
			config: None,
			config_pending: false,
		}
	}

	pub fn track(&self) -> &Track {
		&self.track
	}

	/// The current group ID.
	pub fn group(&self) -> u64 {
		self.group
	}

	/// Returns true once the encoder has reported a decoder configuration.
	pub fn config_known(&self) -> bool {
		self.config.is_some()
	}

	/// Produce exactly one object for an encoded chunk.
	pub fn sequence(&mut self, chunk: EncodedChunk) -> MediaObject {
		if chunk.keyframe {
			self.group += 1;
			self.object = 0;
			self.config_pending = true;

			tracing::debug!(track = %self.track.name, group = self.group, "new group");
		}

		let mut changed = false;
		if let Some(config) = chunk.config {
			if self.config.as_ref() != Some(&config) {
				tracing::debug!(track = %self.track.name, size = config.len(), "decoder config changed");
				self.config = Some(config);
				changed = true;
			}
		}

		let mut extensions = Extensions::new();
		extensions.set_capture_timestamp(chunk.timestamp);
		extensions.set_frame_marking(chunk.keyframe);

		if changed || self.config_pending {
			if let Some(config) = &self.config {
				extensions.set_video_config(config.clone());
				self.config_pending = false;
			}
		}

		let location = Location::new(self.group, self.object);
		self.object += 1;

		MediaObject {
			track: self.track.name.clone(),
			location,
			priority: self.track.priority,
			extensions,
			payload: chunk.payload,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Timestamp, TrackName};

	fn track() -> Track {
		Track::new(TrackName::new("moqtail", "demo")).with_priority(1)
	}

	fn chunk(index: u64, keyframe: bool, config: Option<&'static str>) -> EncodedChunk {
		EncodedChunk {
			timestamp: Timestamp::from_millis(index * 33).unwrap(),
			keyframe,
			payload: Bytes::from(vec![index as u8; 4]),
			config: config.map(|c| Bytes::from_static(c.as_bytes())),
		}
	}

	fn locations(objects: &[MediaObject]) -> Vec<(u64, u64)> {
		objects.iter().map(|o| (o.group(), o.object())).collect()
	}

	#[test]
	fn test_scenario_groups() {
		let mut seq = ObjectSequencer::new(track());
		let pattern = [true, false, false, true, false];

		let objects: Vec<_> = pattern
			.iter()
			.enumerate()
			.map(|(i, &key)| seq.sequence(chunk(i as u64, key, key.then_some("avcC"))))
			.collect();

		assert_eq!(locations(&objects), vec![(1, 0), (1, 1), (1, 2), (2, 0), (2, 1)]);

		let with_config: Vec<_> = objects.iter().map(|o| o.config().is_some()).collect();
		assert_eq!(with_config, vec![true, false, false, true, false]);

		for object in &objects {
			assert_eq!(object.priority, 1);
			assert_eq!(object.track, TrackName::new("moqtail", "demo"));
			assert!(object.capture_timestamp().is_some());
		}
	}

	#[test]
	fn test_keyframes_then_deltas() {
		let mut seq = ObjectSequencer::new(track());
		let pattern = [true, true, true, false, false];

		let objects: Vec<_> = pattern
			.iter()
			.enumerate()
			.map(|(i, &key)| seq.sequence(chunk(i as u64, key, Some("avcC"))))
			.collect();

		assert_eq!(locations(&objects), vec![(1, 0), (2, 0), (3, 0), (3, 1), (3, 2)]);
		assert_eq!(seq.group(), 3);
	}

	#[test]
	fn test_config_reported_once() {
		// The encoder only reports the configuration alongside its first output.
		let mut seq = ObjectSequencer::new(track());

		let first = seq.sequence(chunk(0, true, Some("avcC")));
		let delta = seq.sequence(chunk(1, false, None));
		let second = seq.sequence(chunk(2, true, None));

		assert_eq!(first.config().unwrap().as_ref(), b"avcC");
		assert!(delta.config().is_none());
		assert_eq!(second.config().unwrap().as_ref(), b"avcC");
	}

	#[test]
	fn test_config_change_mid_group() {
		let mut seq = ObjectSequencer::new(track());

		seq.sequence(chunk(0, true, Some("one")));
		let same = seq.sequence(chunk(1, false, Some("one")));
		let changed = seq.sequence(chunk(2, false, Some("two")));

		assert!(same.config().is_none());
		assert_eq!(changed.config().unwrap().as_ref(), b"two");
		assert_eq!(changed.location, Location::new(1, 2));
	}

	#[test]
	fn test_config_unknown() {
		let mut seq = ObjectSequencer::new(track());

		let key = seq.sequence(chunk(0, true, None));
		assert!(key.config().is_none());
		assert!(key.is_boundary());
		assert!(!seq.config_known());

		// The group is still waiting, so the config goes on the first object that learns it.
		let late = seq.sequence(chunk(1, false, Some("avcC")));
		assert_eq!(late.config().unwrap().as_ref(), b"avcC");

		let after = seq.sequence(chunk(2, false, None));
		assert!(after.config().is_none());
	}

	#[test]
	fn test_delta_before_keyframe() {
		let mut seq = ObjectSequencer::new(track());

		let objects = vec![
			seq.sequence(chunk(0, false, None)),
			seq.sequence(chunk(1, false, None)),
			seq.sequence(chunk(2, true, None)),
		];

		assert_eq!(locations(&objects), vec![(0, 0), (0, 1), (1, 0)]);
	}

	#[test]
	fn test_group_invariants() {
		// A fixed pseudo-random boundary pattern.
		let mut seq = ObjectSequencer::new(track());
		let mut state = 0x2545_f491_u32;

		let mut prev: Option<MediaObject> = None;
		for i in 0..500 {
			state ^= state << 13;
			state ^= state >> 17;
			state ^= state << 5;

			let key = i == 0 || state % 7 == 0;
			let object = seq.sequence(chunk(i, key, Some("avcC")));

			assert_eq!(object.is_boundary(), key);
			if key {
				assert_eq!(object.object(), 0);
				assert!(object.config().is_some());
			} else {
				assert!(object.config().is_none());
			}

			if let Some(prev) = prev {
				assert!(object.group() >= prev.group());
				if object.group() == prev.group() {
					assert_eq!(object.object(), prev.object() + 1);
				} else {
					assert_eq!(object.group(), prev.group() + 1);
				}
			}

			prev = Some(object);
		}
	}
}
