use std::fmt;

use crate::coding::{Decode, DecodeError, Encode};

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("value out of range")]
pub struct BoundsExceeded;

/// An integer less than 2^62, encoded as a QUIC variable-length integer.
///
/// The two most significant bits of the first byte encode the length: 1, 2, 4, or 8 bytes.
#[derive(Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarInt(u64);

impl VarInt {
	/// The largest representable value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The smallest representable value.
	pub const ZERO: Self = Self(0);

	pub const fn from_u32(x: u32) -> Self {
		Self(x as u64)
	}

	pub const fn from_u64(x: u64) -> Option<Self> {
		if x <= Self::MAX.0 { Some(Self(x)) } else { None }
	}

	pub const fn from_u128(x: u128) -> Option<Self> {
		if x <= Self::MAX.0 as u128 {
			Some(Self(x as u64))
		} else {
			None
		}
	}

	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes used to encode this value.
	pub const fn size(self) -> usize {
		if self.0 < (1 << 6) {
			1
		} else if self.0 < (1 << 14) {
			2
		} else if self.0 < (1 << 30) {
			4
		} else {
			8
		}
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x.into())
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self::from_u32(x)
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: u64) -> Result<Self, BoundsExceeded> {
		Self::from_u64(x).ok_or(BoundsExceeded)
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: usize) -> Result<Self, BoundsExceeded> {
		Self::try_from(x as u64)
	}
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Short);
		}

		// Peek at the tag before consuming anything, so a short read can be retried.
		let size = 1 << (r.chunk()[0] >> 6);
		if r.remaining() < size {
			return Err(DecodeError::Short);
		}

		let mut buf = [0u8; 8];
		r.copy_to_slice(&mut buf[8 - size..]);
		buf[8 - size] &= 0b0011_1111;

		Ok(Self(u64::from_be_bytes(buf)))
	}
}

impl Encode for VarInt {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		let x = self.0;
		match self.size() {
			1 => w.put_u8(x as u8),
			2 => w.put_u16((0b01 << 14) | x as u16),
			4 => w.put_u32((0b10 << 30) | x as u32),
			_ => w.put_u64((0b11 << 62) | x),
		}
	}
}
