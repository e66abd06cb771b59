//! One-byte type tags identifying each wire value kind.

/// Type tag written before every field value and heterogeneous array
/// element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// No value
    Null = 0x00,
    /// Single byte, zero or one
    Bool = 0x01,
    /// Unsigned 8-bit integer
    Byte = 0x02,
    /// Big-endian i16
    Short = 0x03,
    /// Big-endian i32
    Int = 0x04,
    /// Big-endian i64
    Long = 0x05,
    /// Big-endian IEEE-754 single
    Float = 0x06,
    /// Big-endian IEEE-754 double
    Double = 0x07,
    /// u16 length followed by UTF-8 bytes
    String = 0x08,
    /// i16 count of bools
    BoolArray = 0x09,
    /// i32 count of raw bytes
    ByteArray = 0x0A,
    /// i16 count of shorts
    ShortArray = 0x0B,
    /// i16 count of ints
    IntArray = 0x0C,
    /// i16 count of longs
    LongArray = 0x0D,
    /// i16 count of floats
    FloatArray = 0x0E,
    /// i16 count of doubles
    DoubleArray = 0x0F,
    /// i16 count of strings
    StringArray = 0x10,
    /// i16 count of self-tagged elements
    Array = 0x11,
    /// u16 field count followed by fields
    Object = 0x12,
}

impl TypeTag {
    /// Decode a tag byte, returning `None` for bytes outside the table.
    pub fn from_u8(byte: u8) -> Option<Self> {
        let tag = match byte {
            0x00 => Self::Null,
            0x01 => Self::Bool,
            0x02 => Self::Byte,
            0x03 => Self::Short,
            0x04 => Self::Int,
            0x05 => Self::Long,
            0x06 => Self::Float,
            0x07 => Self::Double,
            0x08 => Self::String,
            0x09 => Self::BoolArray,
            0x0A => Self::ByteArray,
            0x0B => Self::ShortArray,
            0x0C => Self::IntArray,
            0x0D => Self::LongArray,
            0x0E => Self::FloatArray,
            0x0F => Self::DoubleArray,
            0x10 => Self::StringArray,
            0x11 => Self::Array,
            0x12 => Self::Object,
            _ => return None,
        };
        Some(tag)
    }

    /// Raw tag byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}
