//! Width selection for integers whose wire type is chosen at runtime.
//!
//! Most fields have a declared width and use the matching [`WireValue`]
//! constructor directly. This policy applies only where the encoder picks a
//! tag from the value's magnitude, such as the message controller id.

use crate::WireValue;

/// Smallest tag able to hold `value`.
///
/// `[0, 255]` is a byte, `[-32768, 32767]` a short, anything else fitting
/// 32 bits an int, the rest a long.
pub fn narrow_integer(value: i64) -> WireValue {
    if let Ok(byte) = u8::try_from(value) {
        WireValue::Byte(byte)
    } else if let Ok(short) = i16::try_from(value) {
        WireValue::Short(short)
    } else if let Ok(int) = i32::try_from(value) {
        WireValue::Int(int)
    } else {
        WireValue::Long(value)
    }
}
