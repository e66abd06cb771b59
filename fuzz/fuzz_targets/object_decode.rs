//! Fuzz target for the partial object decoder.
//!
//! A completely decoded object must survive a second encode/decode pass
//! byte for byte. A partial decode must never report more bytes consumed
//! than it was given.

#![no_main]

use bytes::BytesMut;
use crashline_proto::codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let decoded = codec::decode_object(data);
    assert!(decoded.consumed <= data.len());

    if !decoded.is_complete() {
        return;
    }

    let mut first = BytesMut::new();
    if codec::encode_object(&decoded.object, &mut first).is_err() {
        return;
    }
    let again = codec::decode_object(&first);
    assert!(again.is_complete());
    assert_eq!(again.consumed, first.len());

    // compare bytes, not values: NaN doubles are not equal to themselves
    let mut second = BytesMut::new();
    assert!(codec::encode_object(&again.object, &mut second).is_ok());
    assert_eq!(first, second);
});
