//! Fuzz target for `Frame::decode` and envelope parsing.
//!
//! Arbitrary bytes must never panic: bad markers, lengths, tags, and
//! envelopes all come back as errors or partial objects.

#![no_main]

use crashline_proto::{ExtensionCall, Frame, Message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else { return };
    let Ok(decoded) = frame.root() else { return };

    assert!(decoded.consumed <= frame.body().len());

    if let Ok(message) = Message::from_object(&decoded.object) {
        let _ = ExtensionCall::from_payload(&message.payload);
    }
});
