use std::sync::Arc;

use crate::coding::{Decode, DecodeError, Encode};

/// The stable identity of a logical media stream: a namespace and a name within it.
///
/// Both parts are reference counted so cloning the name onto every object is cheap.
#[derive(Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Debug)]
#[display("{namespace}/{name}")]
#[debug("{namespace:?}/{name:?}")]
pub struct TrackName {
	pub namespace: Arc<str>,
	pub name: Arc<str>,
}

impl TrackName {
	pub fn new(namespace: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}
}

impl Encode for TrackName {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.namespace.encode(w);
		self.name.encode(w);
	}
}

impl Decode for TrackName {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let namespace = Arc::<str>::decode(r)?;
		let name = Arc::<str>::decode(r)?;
		Ok(Self { namespace, name })
	}
}

/// A track and the scheduling priority used for every object within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Track {
	pub name: TrackName,

	/// A hint for the transport; higher values are delivered first.
	pub priority: u8,
}

impl Track {
	pub fn new(name: TrackName) -> Self {
		Self { name, priority: 0 }
	}

	pub fn with_priority(mut self, priority: u8) -> Self {
		self.priority = priority;
		self
	}
}

impl Encode for Track {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.name.encode(w);
		self.priority.encode(w);
	}
}

impl Decode for Track {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let name = TrackName::decode(r)?;
		let priority = u8::decode(r)?;
		Ok(Self { name, priority })
	}
}
