//! Length-prefixed CBOR frames.
//!
//! Layout on the wire:
//! `[length: u32 big-endian] + [payload: length bytes of CBOR]`
//!
//! A `Frame` holds the raw payload only. [`Frame::from_message`] and
//! [`Frame::to_message`] convert between frames and typed messages.
//!
//! # Invariants
//!
//! - The length prefix always equals the payload length.
//! - No frame larger than [`Frame::MAX_PAYLOAD_SIZE`] is ever encoded or
//!   accepted, regardless of the caller-supplied limit.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Size of the length prefix in bytes.
    pub const PREFIX_SIZE: usize = 4;

    /// Hard ceiling on payload size (16 MiB).
    pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

    /// Wrap already-encoded payload bytes.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into() }
    }

    /// Raw CBOR payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Serialize a message into a frame.
    pub fn from_message<T: Serialize>(message: &T) -> Result<Self> {
        let mut buf = Vec::new();
        ciborium::into_writer(message, &mut buf)
            .map_err(|e| ProtocolError::Cbor(e.to_string()))?;
        Ok(Self::new(buf))
    }

    /// Deserialize the payload into a message.
    pub fn to_message<T: DeserializeOwned>(&self) -> Result<T> {
        ciborium::from_reader(&self.payload[..]).map_err(|e| ProtocolError::Cbor(e.to_string()))
    }

    /// Encode prefix and payload into `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds
    ///   [`Frame::MAX_PAYLOAD_SIZE`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let size = self.payload.len();
        if size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size, max: Self::MAX_PAYLOAD_SIZE });
        }

        dst.put_u32(size as u32);
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(Self::PREFIX_SIZE + self.payload.len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Payload length announced by a length prefix.
    ///
    /// The effective limit is the smaller of `max` and
    /// [`Frame::MAX_PAYLOAD_SIZE`].
    pub fn payload_len(prefix: [u8; Self::PREFIX_SIZE], max: usize) -> Result<usize> {
        let size = u32::from_be_bytes(prefix) as usize;
        let max = max.min(Self::MAX_PAYLOAD_SIZE);
        if size > max {
            return Err(ProtocolError::PayloadTooLarge { size, max });
        }
        Ok(size)
    }

    /// Decode the frame at the start of `src`.
    ///
    /// Bytes after the frame are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if `src` ends before the prefix or the
    ///   announced payload
    /// - `ProtocolError::PayloadTooLarge` if the prefix exceeds `max`
    pub fn decode(src: &[u8], max: usize) -> Result<Self> {
        if src.len() < Self::PREFIX_SIZE {
            return Err(ProtocolError::FrameTooShort {
                expected: Self::PREFIX_SIZE,
                actual: src.len(),
            });
        }

        let mut prefix = [0u8; Self::PREFIX_SIZE];
        prefix.copy_from_slice(&src[..Self::PREFIX_SIZE]);
        let size = Self::payload_len(prefix, max)?;

        let end = Self::PREFIX_SIZE + size;
        if src.len() < end {
            return Err(ProtocolError::FrameTooShort { expected: end, actual: src.len() });
        }

        Ok(Self::new(Bytes::copy_from_slice(&src[Self::PREFIX_SIZE..end])))
    }

    /// Split one complete frame off the front of a stream buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed; the buffer is left
    /// untouched in that case.
    pub fn split_from(buf: &mut BytesMut, max: usize) -> Result<Option<Self>> {
        if buf.len() < Self::PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; Self::PREFIX_SIZE];
        prefix.copy_from_slice(&buf[..Self::PREFIX_SIZE]);
        let size = Self::payload_len(prefix, max)?;

        if buf.len() < Self::PREFIX_SIZE + size {
            return Ok(None);
        }

        buf.advance(Self::PREFIX_SIZE);
        Ok(Some(Self::new(buf.split_to(size).freeze())))
    }
}
