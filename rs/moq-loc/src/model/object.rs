use bytes::Bytes;

use crate::coding::{Decode, DecodeError, Encode};
use crate::model::{Extensions, Timestamp, TrackName};

/// The position of an object within a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
	/// Increments at every decodable boundary.
	pub group: u64,

	/// Resets to zero at the start of every group.
	pub object: u64,
}

impl Location {
	pub const fn new(group: u64, object: u64) -> Self {
		Self { group, object }
	}
}

impl Encode for Location {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.group.encode(w);
		self.object.encode(w);
	}
}

impl Decode for Location {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let group = u64::decode(r)?;
		let object = u64::decode(r)?;
		Ok(Self { group, object })
	}
}

/// The unit exchanged with the transport.
///
/// An object is created when the encoder produces output and is immutable afterwards.
/// It is consumed exactly once, either by the outgoing queue or by the receive dispatcher.
#[derive(Clone, derive_more::Debug)]
pub struct MediaObject {
	pub track: TrackName,
	pub location: Location,

	/// A scheduling hint for the transport, constant per track.
	pub priority: u8,

	/// The capture timestamp, boundary flag, and (sometimes) the decoder configuration.
	pub extensions: Extensions,

	/// The encoded media, which may be empty for header-only objects.
	#[debug("{} bytes", payload.len())]
	pub payload: Bytes,
}

impl MediaObject {
	pub fn group(&self) -> u64 {
		self.location.group
	}

	pub fn object(&self) -> u64 {
		self.location.object
	}

	/// Returns true if this object starts a decodable unit (ex. a keyframe).
	pub fn is_boundary(&self) -> bool {
		self.extensions.frame_marking().unwrap_or(false)
	}

	pub fn capture_timestamp(&self) -> Option<Timestamp> {
		self.extensions.capture_timestamp()
	}

	pub fn config(&self) -> Option<&Bytes> {
		self.extensions.video_config()
	}
}
