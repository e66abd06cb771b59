//! Byte-exact layouts of canonical frames.
//!
//! Clients are built against these layouts, so any change here is a wire
//! compatibility break.

use crashline_proto::{ActionCode, Controller, Frame, Message, WireObject};

fn wire_hex(message: &Message) -> String {
    let frame = message.to_frame().expect("message fits a frame");
    hex::encode(frame.to_bytes().expect("frame encodes"))
}

#[test]
fn heartbeat_echo() {
    let message = Message::new(ActionCode::PingPong, Controller::SYSTEM, WireObject::new());

    insta::assert_snapshot!(wire_hex(&message), @"80001412000300017012000000016103001d0001630200");
}

#[test]
fn extension_balance_update() {
    let body = WireObject::new().with("code", 200i32).with("newBalance", 90.0f64);
    let message = Message::extension("newBalance", body, None);

    insta::assert_snapshot!(
        wire_hex(&message),
        @"80004a12000300017012000200016308000a6e657742616c616e63650001701200020004636f646504000000c8000a6e657742616c616e636507405680000000000000016103000d0001630201"
    );
}

#[test]
fn snapshot_bytes_decode_back() {
    let bytes = hex::decode("80001412000300017012000000016103001d0001630200").expect("valid hex");

    let frame = Frame::decode(&bytes).expect("valid frame");
    let root = frame.root().expect("object root");
    let message = Message::from_object(&root.object).expect("valid envelope");

    assert!(root.is_complete());
    assert_eq!(message.action_code(), Some(ActionCode::PingPong));
    assert!(message.payload.is_empty());
}
