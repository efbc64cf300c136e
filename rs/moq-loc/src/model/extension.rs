use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::coding::*;
use crate::model::Timestamp;

/// The most extensions a single object may carry.
const MAX_EXTENSIONS: usize = 64;

/// The well-known metadata extensions attached to media objects.
///
/// Even ids carry a varint value and odd ids carry a length-prefixed byte string.
/// Unknown ids are preserved so they can be relayed untouched.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ExtensionKind {
	/// Wall clock capture time, in microseconds.
	CaptureTimestamp = 2,
	/// 1 if the object starts an independently decodable unit.
	VideoFrameMarking = 4,
	AudioLevel = 6,
	/// The opaque decoder configuration, ex. an avcC box.
	VideoConfig = 13,
	#[num_enum(catch_all)]
	Unknown(u64),
}

impl ExtensionKind {
	pub fn is_bytes(self) -> bool {
		u64::from(self) % 2 == 1
	}
}

#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum ExtensionValue {
	#[debug("{_0}")]
	VarInt(u64),
	#[debug("{}", hex::encode(_0))]
	Bytes(Bytes),
}

/// An ordered set of typed key/value extensions.
///
/// Each kind appears at most once; setting an existing kind replaces the value in place.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Extensions {
	entries: Vec<(ExtensionKind, ExtensionValue)>,
}

impl Extensions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (ExtensionKind, &ExtensionValue)> {
		self.entries.iter().map(|(kind, value)| (*kind, value))
	}

	pub fn get(&self, kind: ExtensionKind) -> Option<&ExtensionValue> {
		self.entries.iter().find(|(k, _)| *k == kind).map(|(_, v)| v)
	}

	pub fn get_varint(&self, kind: ExtensionKind) -> Option<u64> {
		match self.get(kind)? {
			ExtensionValue::VarInt(v) => Some(*v),
			ExtensionValue::Bytes(_) => None,
		}
	}

	pub fn get_bytes(&self, kind: ExtensionKind) -> Option<&Bytes> {
		match self.get(kind)? {
			ExtensionValue::Bytes(v) => Some(v),
			ExtensionValue::VarInt(_) => None,
		}
	}

	/// Sets a varint value, failing if the id is odd and so carries bytes on the wire.
	pub fn set_varint(&mut self, kind: ExtensionKind, value: u64) -> Result<(), DecodeError> {
		if kind.is_bytes() {
			return Err(DecodeError::InvalidValue);
		}

		self.insert(kind, ExtensionValue::VarInt(value));
		Ok(())
	}

	/// Sets a byte string value, failing if the id is even and so carries a varint on the wire.
	pub fn set_bytes(&mut self, kind: ExtensionKind, value: Bytes) -> Result<(), DecodeError> {
		if !kind.is_bytes() {
			return Err(DecodeError::InvalidValue);
		}

		self.insert(kind, ExtensionValue::Bytes(value));
		Ok(())
	}

	pub fn remove(&mut self, kind: ExtensionKind) -> Option<ExtensionValue> {
		let index = self.entries.iter().position(|(k, _)| *k == kind)?;
		Some(self.entries.remove(index).1)
	}

	fn insert(&mut self, kind: ExtensionKind, value: ExtensionValue) {
		match self.entries.iter_mut().find(|(k, _)| *k == kind) {
			Some(entry) => entry.1 = value,
			None => self.entries.push((kind, value)),
		}
	}

	pub fn capture_timestamp(&self) -> Option<Timestamp> {
		let micros = self.get_varint(ExtensionKind::CaptureTimestamp)?;
		Timestamp::from_micros(micros).ok()
	}

	pub fn set_capture_timestamp(&mut self, timestamp: Timestamp) {
		self.insert(
			ExtensionKind::CaptureTimestamp,
			ExtensionValue::VarInt(timestamp.as_micros()),
		);
	}

	/// Returns whether the object starts a decodable unit, if the marking is present.
	pub fn frame_marking(&self) -> Option<bool> {
		self.get_varint(ExtensionKind::VideoFrameMarking).map(|v| v != 0)
	}

	pub fn set_frame_marking(&mut self, keyframe: bool) {
		self.insert(ExtensionKind::VideoFrameMarking, ExtensionValue::VarInt(keyframe as u64));
	}

	pub fn video_config(&self) -> Option<&Bytes> {
		self.get_bytes(ExtensionKind::VideoConfig)
	}

	pub fn set_video_config(&mut self, config: Bytes) {
		self.insert(ExtensionKind::VideoConfig, ExtensionValue::Bytes(config));
	}
}

impl Decode for Extensions {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let count = usize::decode(r)?;
		if count > MAX_EXTENSIONS {
			return Err(DecodeError::TooMany);
		}

		let mut entries: Vec<(ExtensionKind, ExtensionValue)> = Vec::with_capacity(count);

		for _ in 0..count {
			let kind = ExtensionKind::from(u64::decode(r)?);
			if entries.iter().any(|(k, _)| *k == kind) {
				return Err(DecodeError::Duplicate);
			}

			let value = match kind.is_bytes() {
				true => ExtensionValue::Bytes(Bytes::decode(r)?),
				false => ExtensionValue::VarInt(u64::decode(r)?),
			};

			entries.push((kind, value));
		}

		Ok(Self { entries })
	}
}

impl Encode for Extensions {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.entries.len().encode(w);

		for (kind, value) in self.entries.iter() {
			u64::from(*kind).encode(w);
			match value {
				ExtensionValue::VarInt(v) => v.encode(w),
				ExtensionValue::Bytes(v) => v.encode(w),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kind_parity() {
		assert!(!ExtensionKind::CaptureTimestamp.is_bytes());
		assert!(!ExtensionKind::VideoFrameMarking.is_bytes());
		assert!(ExtensionKind::VideoConfig.is_bytes());
		assert_eq!(ExtensionKind::from(13), ExtensionKind::VideoConfig);
		assert_eq!(ExtensionKind::from(99), ExtensionKind::Unknown(99));
	}

	#[test]
	fn test_insert_replaces_in_place() {
		let mut ext = Extensions::new();
		ext.set_capture_timestamp(Timestamp::from_micros(1).unwrap());
		ext.set_frame_marking(true);
		ext.set_video_config(Bytes::from_static(b"old"));
		ext.set_video_config(Bytes::from_static(b"new"));

		assert_eq!(ext.len(), 3);
		assert_eq!(ext.video_config().unwrap().as_ref(), b"new");

		let kinds: Vec<_> = ext.iter().map(|(kind, _)| kind).collect();
		assert_eq!(
			kinds,
			[
				ExtensionKind::CaptureTimestamp,
				ExtensionKind::VideoFrameMarking,
				ExtensionKind::VideoConfig
			]
		);
	}

	#[test]
	fn test_unknown_preserved() {
		let mut ext = Extensions::new();
		ext.set_varint(ExtensionKind::Unknown(40), 7).unwrap();
		ext.set_bytes(ExtensionKind::Unknown(41), Bytes::from_static(&[1, 2, 3])).unwrap();

		let decoded = Extensions::decode(&mut ext.encode_bytes()).unwrap();
		assert_eq!(decoded, ext);
		assert_eq!(decoded.get_varint(ExtensionKind::Unknown(40)), Some(7));
	}

	#[test]
	fn test_set_wrong_parity() {
		let mut ext = Extensions::new();
		assert_eq!(
			ext.set_varint(ExtensionKind::Unknown(41), 7),
			Err(DecodeError::InvalidValue)
		);
		assert_eq!(
			ext.set_bytes(ExtensionKind::CaptureTimestamp, Bytes::from_static(b"x")),
			Err(DecodeError::InvalidValue)
		);
		assert!(ext.is_empty());

		// The typed setters always pick the right value type.
		ext.set_video_config(Bytes::from_static(b"avcC"));
		let decoded = Extensions::decode(&mut ext.encode_bytes()).unwrap();
		assert_eq!(decoded.video_config().unwrap().as_ref(), b"avcC");
	}

	#[test]
	fn test_duplicate_rejected() {
		let mut buf = BytesMut::new();
		2usize.encode(&mut buf);
		2u64.encode(&mut buf);
		10u64.encode(&mut buf);
		2u64.encode(&mut buf);
		11u64.encode(&mut buf);

		assert_eq!(Extensions::decode(&mut buf), Err(DecodeError::Duplicate));
	}

	#[test]
	fn test_too_many() {
		let mut buf = BytesMut::new();
		(MAX_EXTENSIONS + 1).encode(&mut buf);

		assert_eq!(Extensions::decode(&mut buf), Err(DecodeError::TooMany));
	}

	#[test]
	fn test_mistyped_value_is_short() {
		// A bytes extension whose length runs past the end of the buffer.
		let mut buf = BytesMut::new();
		1usize.encode(&mut buf);
		13u64.encode(&mut buf);
		100usize.encode(&mut buf);
		buf.extend_from_slice(b"abc");

		assert_eq!(Extensions::decode(&mut buf), Err(DecodeError::Short));
	}
}
