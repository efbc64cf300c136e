use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::coding::{Decode, DecodeError, Encode};
use crate::{Error, Extensions, Location, MediaObject, ObjectSink, ObjectSource, Track};

/// The largest object a reader will buffer.
pub const MAX_OBJECT_SIZE: usize = 16 * 1024 * 1024;

// A single object on the wire: a size prefix, then the location, extensions, and payload.
// The track and priority are sent once in the stream header.
struct ObjectFrame {
	location: Location,
	extensions: Extensions,
	payload: Bytes,
}

impl ObjectFrame {
	fn encode_object<W: BufMut>(object: &MediaObject, w: &mut W) {
		let mut body = BytesMut::new();
		object.location.encode(&mut body);
		object.extensions.encode(&mut body);

		(body.len() + object.payload.len()).encode(w);
		w.put(body);
		w.put_slice(&object.payload);
	}
}

impl Decode for ObjectFrame {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let size = usize::decode(r)?;
		if size > MAX_OBJECT_SIZE {
			return Err(DecodeError::BoundsExceeded);
		}

		if r.remaining() < size {
			return Err(DecodeError::Short);
		}

		let mut body = r.copy_to_bytes(size);
		let location = Location::decode(&mut body)?;
		let extensions = Extensions::decode(&mut body)?;

		Ok(Self {
			location,
			extensions,
			payload: body,
		})
	}
}

/// Writes a single track as a header followed by size-prefixed objects.
pub struct ObjectWriter<W: AsyncWrite + Unpin + Send> {
	writer: W,
	track: Track,
	header: bool,
	buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin + Send> ObjectWriter<W> {
	pub fn new(writer: W, track: Track) -> Self {
		Self {
			writer,
			track,
			header: false,
			buffer: Default::default(),
		}
	}

	fn encode_header(&mut self) {
		if !self.header {
			self.track.encode(&mut self.buffer);
			self.header = true;
		}
	}

	async fn write_buffer(&mut self) -> Result<(), Error> {
		self.writer.write_all_buf(&mut self.buffer).await?;
		self.writer.flush().await?;
		Ok(())
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl<W: AsyncWrite + Unpin + Send> ObjectSink for ObjectWriter<W> {
	async fn write_object(&mut self, object: MediaObject) -> Result<(), Error> {
		if object.track != self.track.name {
			return Err(Error::WrongTrack {
				expected: self.track.name.clone(),
				got: object.track,
			});
		}

		self.encode_header();
		ObjectFrame::encode_object(&object, &mut self.buffer);
		self.write_buffer().await
	}

	async fn finish(&mut self) -> Result<(), Error> {
		self.encode_header();
		self.write_buffer().await?;
		self.writer.shutdown().await?;
		Ok(())
	}
}

/// Reads objects written by an [ObjectWriter].
pub struct ObjectReader<R: AsyncRead + Unpin + Send> {
	reader: R,
	buffer: BytesMut,
	track: Option<Track>,
}

impl<R: AsyncRead + Unpin + Send> ObjectReader<R> {
	pub fn new(reader: R) -> Self {
		Self {
			reader,
			buffer: Default::default(),
			track: None,
		}
	}

	/// Read the stream header if needed, returning the track.
	pub async fn track(&mut self) -> Result<&Track, Error> {
		if self.track.is_none() {
			let track = match self.decode::<Track>().await? {
				Some(track) => track,
				None => return Err(Error::Closed),
			};

			tracing::debug!(track = %track.name, priority = track.priority, "reading track");
			self.track = Some(track);
		}

		self.track.as_ref().ok_or(Error::Closed)
	}

	// Decode the next message, or None if the stream ended cleanly between messages.
	async fn decode<T: Decode>(&mut self) -> Result<Option<T>, Error> {
		loop {
			let mut cursor = Cursor::new(&self.buffer);
			match T::decode(&mut cursor) {
				Ok(msg) => {
					self.buffer.advance(cursor.position() as usize);
					return Ok(Some(msg));
				}
				Err(DecodeError::Short) => {
					if self.reader.read_buf(&mut self.buffer).await? == 0 {
						return match self.buffer.is_empty() {
							true => Ok(None),
							// Stream closed while we still need more data
							false => Err(DecodeError::Short.into()),
						};
					}
				}
				Err(e) => return Err(e.into()),
			}
		}
	}
}

impl<R: AsyncRead + Unpin + Send> ObjectSource for ObjectReader<R> {
	async fn read_object(&mut self) -> Result<Option<MediaObject>, Error> {
		let track = self.track().await?.clone();

		let Some(frame) = self.decode::<ObjectFrame>().await? else {
			return Ok(None);
		};

		Ok(Some(MediaObject {
			track: track.name,
			location: frame.location,
			priority: track.priority,
			extensions: frame.extensions,
			payload: frame.payload,
		}))
	}
}
