//! Encoder and decoder for tagged wire objects.
//!
//! Grammar, big-endian throughout:
//!
//! ```text
//! object  = u16 field_count, field*
//! field   = u16 name_len, name, u8 tag, value
//! value   = scalar | string | primitive_array | array | object
//! array   = i16 count, (u8 tag, value)*
//! ```
//!
//! Primitive arrays carry an `i16` count (byte arrays an `i32` count) and
//! raw elements with no per-element tag.
//!
//! Objects have no byte length, so a field with an unknown tag cannot be
//! skipped. [`decode_object`] therefore stops at the first bad field and
//! returns the fields decoded before it together with the error.
//!
//! A nested object that stops early is kept as the value of its field,
//! holding whatever fields it completed. The enclosing objects stop right
//! after it, since the reader no longer knows where that field ends, and
//! the error reaches the caller. Any other bad value is dropped whole.

use bytes::{BufMut, Bytes};

use crate::{
    TypeTag, WireObject, WireValue,
    errors::{ProtocolError, Result},
};

/// Largest count an `i16` prefix can carry.
pub const MAX_SHORT_COUNT: usize = i16::MAX as usize;

/// Largest field count or string length a `u16` prefix can carry.
pub const MAX_U16_LEN: usize = u16::MAX as usize;

/// Deepest object or array nesting the decoder follows.
pub const MAX_DEPTH: usize = 32;

/// Result of decoding an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Fields decoded, in wire order. After an abort the last field may be
    /// a partially decoded nested object.
    pub object: WireObject,
    /// Bytes consumed by the complete top-level fields and the count prefix
    pub consumed: usize,
    /// Why decoding stopped early, if it did
    pub error: Option<ProtocolError>,
}

impl Decoded {
    /// True when every announced field was decoded.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Converts a partial decode into an error.
    pub fn into_result(self) -> Result<(WireObject, usize)> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.object, self.consumed)),
        }
    }
}

/// Encode an object body (field count and fields, no leading tag).
pub fn encode_object(object: &WireObject, dst: &mut impl BufMut) -> Result<()> {
    if object.len() > MAX_U16_LEN {
        return Err(ProtocolError::CollectionTooLarge { len: object.len(), max: MAX_U16_LEN });
    }
    dst.put_u16(object.len() as u16);
    for (name, value) in object.iter() {
        put_string(name, dst)?;
        encode_value(value, dst)?;
    }
    Ok(())
}

/// Encode a tagged value (tag byte followed by the value).
pub fn encode_value(value: &WireValue, dst: &mut impl BufMut) -> Result<()> {
    dst.put_u8(value.tag().to_u8());
    match value {
        WireValue::Null => {},
        WireValue::Bool(v) => dst.put_u8(u8::from(*v)),
        WireValue::Byte(v) => dst.put_u8(*v),
        WireValue::Short(v) => dst.put_i16(*v),
        WireValue::Int(v) => dst.put_i32(*v),
        WireValue::Long(v) => dst.put_i64(*v),
        WireValue::Float(v) => dst.put_f32(*v),
        WireValue::Double(v) => dst.put_f64(*v),
        WireValue::String(v) => put_string(v, dst)?,
        WireValue::BoolArray(items) => {
            put_short_count(items.len(), dst)?;
            items.iter().for_each(|v| dst.put_u8(u8::from(*v)));
        },
        WireValue::ByteArray(bytes) => {
            let len = i32::try_from(bytes.len()).map_err(|_| ProtocolError::CollectionTooLarge {
                len: bytes.len(),
                max: i32::MAX as usize,
            })?;
            dst.put_i32(len);
            dst.put_slice(bytes);
        },
        WireValue::ShortArray(items) => {
            put_short_count(items.len(), dst)?;
            items.iter().for_each(|v| dst.put_i16(*v));
        },
        WireValue::IntArray(items) => {
            put_short_count(items.len(), dst)?;
            items.iter().for_each(|v| dst.put_i32(*v));
        },
        WireValue::LongArray(items) => {
            put_short_count(items.len(), dst)?;
            items.iter().for_each(|v| dst.put_i64(*v));
        },
        WireValue::FloatArray(items) => {
            put_short_count(items.len(), dst)?;
            items.iter().for_each(|v| dst.put_f32(*v));
        },
        WireValue::DoubleArray(items) => {
            put_short_count(items.len(), dst)?;
            items.iter().for_each(|v| dst.put_f64(*v));
        },
        WireValue::StringArray(items) => {
            put_short_count(items.len(), dst)?;
            for item in items {
                put_string(item, dst)?;
            }
        },
        WireValue::Array(items) => {
            put_short_count(items.len(), dst)?;
            for item in items {
                encode_value(item, dst)?;
            }
        },
        WireValue::Object(object) => encode_object(object, dst)?,
    }
    Ok(())
}

/// Decode an object body starting at its field count.
///
/// Never fails outright: a bad field ends decoding and is reported in
/// [`Decoded::error`] alongside the fields that preceded it.
pub fn decode_object(bytes: &[u8]) -> Decoded {
    let mut reader = Reader::new(bytes);
    let (object, error) = read_fields(&mut reader, 0);
    Decoded { object, consumed: reader.complete, error }
}

/// Decode one tagged value, returning it and the bytes consumed.
pub fn decode_value(bytes: &[u8]) -> Result<(WireValue, usize)> {
    let mut reader = Reader::new(bytes);
    let value = read_tagged(&mut reader, 0).map_err(|abort| abort.error)?;
    Ok((value, reader.pos))
}

fn put_string(s: &str, dst: &mut impl BufMut) -> Result<()> {
    if s.len() > MAX_U16_LEN {
        return Err(ProtocolError::StringTooLong(s.len()));
    }
    dst.put_u16(s.len() as u16);
    dst.put_slice(s.as_bytes());
    Ok(())
}

fn put_short_count(len: usize, dst: &mut impl BufMut) -> Result<()> {
    if len > MAX_SHORT_COUNT {
        return Err(ProtocolError::CollectionTooLarge { len, max: MAX_SHORT_COUNT });
    }
    dst.put_i16(len as i16);
    Ok(())
}

/// A value that stopped decoding partway.
struct Abort {
    /// What was decoded before the error, kept for nested objects only
    partial: Option<WireValue>,
    error: ProtocolError,
}

impl From<ProtocolError> for Abort {
    fn from(error: ProtocolError) -> Self {
        Self { partial: None, error }
    }
}

fn read_fields(reader: &mut Reader<'_>, depth: usize) -> (WireObject, Option<ProtocolError>) {
    let mut object = WireObject::new();
    let count = match reader.u16() {
        Ok(count) => count,
        Err(err) => return (object, Some(err)),
    };
    reader.mark_complete(depth);

    for _ in 0..count {
        let name = match reader.string() {
            Ok(name) => name,
            Err(err) => return (object, Some(err)),
        };
        match read_tagged(reader, depth) {
            Ok(value) => {
                object.insert(name, value);
                reader.mark_complete(depth);
            },
            Err(Abort { partial, error }) => {
                if let Some(value) = partial {
                    object.insert(name, value);
                }
                return (object, Some(error));
            },
        }
    }
    (object, None)
}

fn read_tagged(reader: &mut Reader<'_>, depth: usize) -> std::result::Result<WireValue, Abort> {
    let byte = reader.u8()?;
    let tag = TypeTag::from_u8(byte).ok_or(ProtocolError::UnknownTag(byte))?;
    read_body(tag, reader, depth)
}

fn read_body(tag: TypeTag, reader: &mut Reader<'_>, depth: usize) -> std::result::Result<WireValue, Abort> {
    let value = match tag {
        TypeTag::Null => WireValue::Null,
        TypeTag::Bool => WireValue::Bool(reader.u8()? != 0),
        TypeTag::Byte => WireValue::Byte(reader.u8()?),
        TypeTag::Short => WireValue::Short(reader.i16()?),
        TypeTag::Int => WireValue::Int(reader.i32()?),
        TypeTag::Long => WireValue::Long(reader.i64()?),
        TypeTag::Float => WireValue::Float(reader.f32()?),
        TypeTag::Double => WireValue::Double(reader.f64()?),
        TypeTag::String => WireValue::String(reader.string()?),
        TypeTag::BoolArray => WireValue::BoolArray(reader.repeat(|r| Ok(r.u8()? != 0))?),
        TypeTag::ByteArray => {
            let len = reader.i32()?;
            let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
            WireValue::ByteArray(Bytes::copy_from_slice(reader.take(len)?))
        },
        TypeTag::ShortArray => WireValue::ShortArray(reader.repeat(Reader::i16)?),
        TypeTag::IntArray => WireValue::IntArray(reader.repeat(Reader::i32)?),
        TypeTag::LongArray => WireValue::LongArray(reader.repeat(Reader::i64)?),
        TypeTag::FloatArray => WireValue::FloatArray(reader.repeat(Reader::f32)?),
        TypeTag::DoubleArray => WireValue::DoubleArray(reader.repeat(Reader::f64)?),
        TypeTag::StringArray => WireValue::StringArray(reader.repeat(Reader::string)?),
        TypeTag::Array => {
            let depth = descend(depth)?;
            WireValue::Array(reader.repeat(|r| read_tagged(r, depth).map_err(|abort| abort.error))?)
        },
        TypeTag::Object => {
            let depth = descend(depth)?;
            let (object, error) = read_fields(reader, depth);
            if let Some(error) = error {
                return Err(Abort { partial: Some(WireValue::Object(object)), error });
            }
            WireValue::Object(object)
        },
    };
    Ok(value)
}

fn descend(depth: usize) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(ProtocolError::NestingTooDeep { max: MAX_DEPTH });
    }
    Ok(depth + 1)
}

/// Bounds-checked big-endian cursor.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Position after the last complete top-level field
    complete: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, complete: 0 }
    }

    fn mark_complete(&mut self, depth: usize) {
        if depth == 0 {
            self.complete = self.pos;
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        let slice = self
            .buf
            .get(self.pos..self.pos.saturating_add(n))
            .ok_or(ProtocolError::Truncated { needed: n, remaining })?;
        self.pos += n;
        Ok(slice)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.fixed::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        self.fixed().map(u16::from_be_bytes)
    }

    fn i16(&mut self) -> Result<i16> {
        self.fixed().map(i16::from_be_bytes)
    }

    fn i32(&mut self) -> Result<i32> {
        self.fixed().map(i32::from_be_bytes)
    }

    fn i64(&mut self) -> Result<i64> {
        self.fixed().map(i64::from_be_bytes)
    }

    fn f32(&mut self) -> Result<f32> {
        self.fixed().map(f32::from_be_bytes)
    }

    fn f64(&mut self) -> Result<f64> {
        self.fixed().map(f64::from_be_bytes)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Read an `i16` count followed by that many elements.
    fn repeat<T>(&mut self, mut read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.i16()?;
        let count = usize::try_from(count).map_err(|_| ProtocolError::NegativeLength(i32::from(count)))?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}
