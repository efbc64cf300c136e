use std::{string::FromUtf8Error, sync::Arc};
use thiserror::Error;

use crate::coding::VarInt;

/// Read the value from a buffer.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
pub trait Decode: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("invalid value")]
	InvalidValue,

	#[error("too many")]
	TooMany,

	#[error("bounds exceeded")]
	BoundsExceeded,

	#[error("duplicate")]
	Duplicate,
}

impl Decode for bool {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match u8::decode(r)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Decode for u8 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.has_remaining() {
			true => Ok(r.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(VarInt::into_inner)
	}
}

impl Decode for usize {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let v = u64::decode(r)?;
		usize::try_from(v).map_err(|_| DecodeError::BoundsExceeded)
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let v = bytes::Bytes::decode(r)?;
		let str = String::from_utf8(v.to_vec())?;

		Ok(str)
	}
}

impl Decode for Arc<str> {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		String::decode(r).map(Arc::from)
	}
}

impl Decode for bytes::Bytes {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let len = usize::decode(r)?;
		if r.remaining() < len {
			return Err(DecodeError::Short);
		}

		Ok(r.copy_to_bytes(len))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::coding::Encode;

	#[test]
	fn test_short_string() {
		let encoded = "hello".encode_bytes();
		let mut truncated = &encoded[..encoded.len() - 1];
		assert_eq!(String::decode(&mut truncated), Err(DecodeError::Short));
	}

	#[test]
	fn test_invalid_utf8() {
		let encoded = bytes::Bytes::from_static(&[0xff, 0xfe]).encode_bytes();
		assert!(matches!(
			String::decode(&mut encoded.as_ref()),
			Err(DecodeError::InvalidString(_))
		));
	}

	#[test]
	fn test_invalid_bool() {
		let mut buf: &[u8] = &[2];
		assert_eq!(bool::decode(&mut buf), Err(DecodeError::InvalidValue));
	}
}
