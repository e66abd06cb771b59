//! Length-prefixed frame holding one encoded root object.
//!
//! Wire layout:
//!
//! | Offset | Size | Meaning                          |
//! |--------|------|----------------------------------|
//! | 0      | 1    | marker `0x80`                    |
//! | 1      | 2    | body length, big-endian          |
//! | 3      | 1    | root tag, always `0x12` (object) |
//! | 4      | 2    | root field count                 |
//! | 6      | ...  | root fields                      |

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    FramePrefix, TypeTag, WireObject,
    codec::{self, Decoded},
    errors::{ProtocolError, Result},
};

/// Transport frame: validated prefix plus raw body bytes.
///
/// The body is kept encoded so one broadcast frame can be written to many
/// connections without re-encoding.
///
/// # Invariants
///
/// - `body.len() <= FramePrefix::MAX_BODY`, enforced by every constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    body: Bytes,
}

impl Frame {
    /// Wrap an encoded body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooLarge` if the body exceeds 65535 bytes
    pub fn new(body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        if body.len() > FramePrefix::MAX_BODY {
            return Err(ProtocolError::FrameTooLarge { size: body.len(), max: FramePrefix::MAX_BODY });
        }
        Ok(Self { body })
    }

    /// Encode `root` as the frame body.
    pub fn from_object(root: &WireObject) -> Result<Self> {
        let mut body = BytesMut::with_capacity(64);
        body.put_u8(TypeTag::Object.to_u8());
        codec::encode_object(root, &mut body)?;
        Self::new(body.freeze())
    }

    /// Raw body bytes, starting at the root tag.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Total bytes on the wire.
    pub fn encoded_len(&self) -> usize {
        FramePrefix::SIZE + self.body.len()
    }

    /// Write prefix and body.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let prefix = FramePrefix::new(self.body.len())?;
        dst.put_slice(&prefix.to_bytes());
        dst.put_slice(&self.body);
        Ok(())
    }

    /// Prefix and body as one contiguous buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a frame from the start of `bytes`. Trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if the prefix is incomplete
    /// - `ProtocolError::InvalidMarker` if the marker byte is wrong
    /// - `ProtocolError::FrameTruncated` if the body is incomplete
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let prefix = FramePrefix::from_bytes(bytes)?;
        let body_len = prefix.body_len();

        let body = bytes
            .get(FramePrefix::SIZE..FramePrefix::SIZE + body_len)
            .ok_or(ProtocolError::FrameTruncated {
                expected: body_len,
                actual: bytes.len().saturating_sub(FramePrefix::SIZE),
            })?;

        Ok(Self { body: Bytes::copy_from_slice(body) })
    }

    /// Decode the root object.
    ///
    /// Skips the root tag and hands the rest to [`codec::decode_object`], so
    /// an unknown tag yields the fields before it rather than an error.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedRootTag` if the body is not an object
    pub fn root(&self) -> Result<Decoded> {
        let (&tag, rest) = self
            .body
            .split_first()
            .ok_or(ProtocolError::Truncated { needed: 1, remaining: 0 })?;
        if tag != TypeTag::Object.to_u8() {
            return Err(ProtocolError::UnexpectedRootTag(tag));
        }
        Ok(codec::decode_object(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_of_small_frame() {
        let frame = Frame::from_object(&WireObject::new().with("a", 29i16)).unwrap();
        let bytes = frame.to_bytes().unwrap();

        assert_eq!(bytes[0], 0x80);
        assert_eq!(u16::from_be_bytes([bytes[1], bytes[2]]) as usize, bytes.len() - 3);
        assert_eq!(bytes[3], 0x12);
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let frame = Frame::from_object(&WireObject::new().with("k", "v")).unwrap();
        let mut bytes = frame.to_bytes().unwrap().to_vec();
        bytes.extend_from_slice(&[0xDE, 0xAD]);

        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn truncated_body() {
        let frame = Frame::from_object(&WireObject::new().with("k", "value")).unwrap();
        let bytes = frame.to_bytes().unwrap();

        let err = Frame::decode(&bytes[..bytes.len() - 1]).unwrap_err();

        assert!(matches!(err, ProtocolError::FrameTruncated { .. }));
    }

    #[test]
    fn root_must_be_object() {
        let frame = Frame::new(Bytes::from_static(&[0x08, 0x00, 0x00])).unwrap();

        assert_eq!(frame.root().unwrap_err(), ProtocolError::UnexpectedRootTag(0x08));
    }

    #[test]
    fn oversized_body_rejected() {
        let err = Frame::new(vec![0u8; FramePrefix::MAX_BODY + 1]).unwrap_err();

        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }
}
