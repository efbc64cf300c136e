use crate::coding::{Decode, DecodeError, Encode, VarInt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("time overflow")]
pub struct TimeOverflow;

/// A capture timestamp in microseconds.
///
/// Timestamps are relative to the capture source, so zero for one track is not zero for another.
/// Values are constrained to fit within a QUIC VarInt (2^62) so they can be encoded as an extension.
#[derive(Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(VarInt);

impl Timestamp {
	/// The maximum representable timestamp.
	pub const MAX: Self = Self(VarInt::MAX);

	pub const ZERO: Self = Self(VarInt::ZERO);

	pub const fn from_micros(micros: u64) -> Result<Self, TimeOverflow> {
		match VarInt::from_u64(micros) {
			Some(varint) => Ok(Self(varint)),
			None => Err(TimeOverflow),
		}
	}

	pub const fn from_millis(millis: u64) -> Result<Self, TimeOverflow> {
		match millis.checked_mul(1_000) {
			Some(micros) => Self::from_micros(micros),
			None => Err(TimeOverflow),
		}
	}

	pub const fn from_secs(secs: u64) -> Result<Self, TimeOverflow> {
		match secs.checked_mul(1_000_000) {
			Some(micros) => Self::from_micros(micros),
			None => Err(TimeOverflow),
		}
	}

	pub const fn as_micros(self) -> u64 {
		self.0.into_inner()
	}

	pub const fn as_millis(self) -> u64 {
		self.0.into_inner() / 1_000
	}

	pub const fn as_secs(self) -> u64 {
		self.0.into_inner() / 1_000_000
	}

	pub const fn checked_add(self, rhs: Self) -> Result<Self, TimeOverflow> {
		match self.as_micros().checked_add(rhs.as_micros()) {
			Some(micros) => Self::from_micros(micros),
			None => Err(TimeOverflow),
		}
	}

	pub const fn checked_sub(self, rhs: Self) -> Result<Self, TimeOverflow> {
		match self.as_micros().checked_sub(rhs.as_micros()) {
			Some(micros) => Self::from_micros(micros),
			None => Err(TimeOverflow),
		}
	}

	pub const fn is_zero(self) -> bool {
		self.0.into_inner() == 0
	}
}

impl From<VarInt> for Timestamp {
	fn from(v: VarInt) -> Self {
		Self(v)
	}
}

impl TryFrom<std::time::Duration> for Timestamp {
	type Error = TimeOverflow;

	fn try_from(duration: std::time::Duration) -> Result<Self, Self::Error> {
		let micros = u64::try_from(duration.as_micros()).map_err(|_| TimeOverflow)?;
		Self::from_micros(micros)
	}
}

impl From<Timestamp> for std::time::Duration {
	fn from(time: Timestamp) -> Self {
		std::time::Duration::from_micros(time.as_micros())
	}
}

impl std::fmt::Debug for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let micros = self.as_micros();

		// Choose the largest unit where we don't need decimal places
		if micros.is_multiple_of(1_000_000) {
			write!(f, "{}s", micros / 1_000_000)
		} else if micros.is_multiple_of(1_000) {
			write!(f, "{}ms", micros / 1_000)
		} else {
			write!(f, "{}µs", micros)
		}
	}
}

impl Decode for Timestamp {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(Self)
	}
}

impl Encode for Timestamp {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w)
	}
}
