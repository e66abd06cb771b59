//! Fixed three-byte frame prefix with zero-copy parsing.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Marker byte plus big-endian body length.
///
/// # Security
///
/// The `#[repr(C, packed)]` layout with zerocopy traits means any three bytes
/// are a valid prefix, so untrusted input can be cast without copying. The
/// length is a `u16`, which caps every allocation driven by a peer at 64 KiB.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FramePrefix {
    marker: u8,
    length: [u8; 2],
}

impl FramePrefix {
    /// Serialized size.
    pub const SIZE: usize = 3;

    /// Binary, uncompressed, short-length frame.
    pub const MARKER: u8 = 0x80;

    /// Largest body the length field can describe.
    pub const MAX_BODY: usize = u16::MAX as usize;

    /// Prefix for a body of `len` bytes.
    pub fn new(len: usize) -> Result<Self> {
        let len = u16::try_from(len)
            .map_err(|_| ProtocolError::FrameTooLarge { size: len, max: Self::MAX_BODY })?;
        Ok(Self { marker: Self::MARKER, length: len.to_be_bytes() })
    }

    /// Cast a prefix from the start of `bytes`, validating the marker.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than three bytes
    /// - `ProtocolError::InvalidMarker` if the first byte is not `0x80`
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let prefix = Self::parse_lenient(bytes)?;
        if prefix.marker != Self::MARKER {
            return Err(ProtocolError::InvalidMarker(prefix.marker));
        }
        Ok(prefix)
    }

    /// Cast a prefix without looking at the marker.
    ///
    /// Stream readers use this to learn the body length of a frame they are
    /// going to discard, so the stream stays aligned.
    pub fn parse_lenient(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(bytes)
            .map(|(prefix, _)| prefix)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })
    }

    /// Marker byte as received.
    pub fn marker(&self) -> u8 {
        self.marker
    }

    /// Body length in bytes.
    pub fn body_len(&self) -> usize {
        u16::from_be_bytes(self.length) as usize
    }

    /// Raw prefix bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

impl std::fmt::Debug for FramePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePrefix")
            .field("marker", &format_args!("{:#04x}", self.marker))
            .field("body_len", &self.body_len())
            .finish()
    }
}
