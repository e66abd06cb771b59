//! Error types for wire object and frame parsing.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire objects and frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a fixed-size prefix
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// First byte of a frame was not the binary marker
    #[error("invalid frame marker {0:#04x}")]
    InvalidMarker(u8),

    /// Encoded body does not fit the 16-bit length prefix
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Body size in bytes
        size: usize,
        /// Maximum body size
        max: usize,
    },

    /// Frame body shorter than its length prefix claims
    #[error("frame truncated: expected {expected} body bytes, got {actual}")]
    FrameTruncated {
        /// Bytes claimed by the prefix
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// Ran out of input in the middle of a value
    #[error("truncated value: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the value needed
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Type tag outside the supported table
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// String bytes were not valid UTF-8
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// String longer than its 16-bit length prefix allows
    #[error("string too long: {0} bytes")]
    StringTooLong(usize),

    /// Array or object with more elements than its count prefix allows
    #[error("collection too large: {len} elements (max {max})")]
    CollectionTooLarge {
        /// Element count
        len: usize,
        /// Maximum encodable count
        max: usize,
    },

    /// Negative count prefix
    #[error("negative length prefix {0}")]
    NegativeLength(i32),

    /// Objects nested deeper than the decoder accepts
    #[error("nesting too deep (max {max})")]
    NestingTooDeep {
        /// Maximum nesting depth
        max: usize,
    },

    /// Frame body did not start with the object tag
    #[error("unexpected root tag {0:#04x}, expected object")]
    UnexpectedRootTag(u8),

    /// Required message field absent
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// Message field present with the wrong type
    #[error("field `{field}` has wrong type, expected {expected}")]
    WrongFieldType {
        /// Field name
        field: &'static str,
        /// Expected kind
        expected: &'static str,
    },
}

impl ProtocolError {
    /// Returns true if the error leaves the byte stream aligned.
    ///
    /// Framing errors that cannot be skipped over require the connection to
    /// be closed. Everything else is confined to one frame.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::FrameTooShort { .. } | Self::FrameTruncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ProtocolError::Truncated { needed: 4, remaining: 1 };
        assert_eq!(err.to_string(), "truncated value: needed 4 bytes, 1 remaining");

        let err = ProtocolError::UnknownTag(0x2a);
        assert_eq!(err.to_string(), "unknown type tag 0x2a");
    }

    #[test]
    fn recoverable_classification() {
        assert!(ProtocolError::UnknownTag(0x40).is_recoverable());
        assert!(ProtocolError::InvalidMarker(0).is_recoverable());
        assert!(!ProtocolError::FrameTruncated { expected: 10, actual: 2 }.is_recoverable());
    }
}
