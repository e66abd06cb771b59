//! Fuzz target for the server driver.
//!
//! Interleaves arbitrary frames, ticks, and disconnects across a few
//! sessions. The driver must never panic and must never leak a session.

#![no_main]

use arbitrary::Arbitrary;
use crashline_proto::Frame;
use crashline_server::{DriverConfig, ServerDriver, ServerEvent, SystemEnv};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Step {
    Connect,
    Frame { session: u8, body: Vec<u8> },
    Close { session: u8 },
    Tick,
}

fuzz_target!(|steps: Vec<Step>| {
    let mut driver = ServerDriver::new(SystemEnv::new(), DriverConfig::default());
    let mut next_session = 1u64;
    let mut open = Vec::new();

    for step in steps {
        let event = match step {
            Step::Connect => {
                let session_id = next_session;
                next_session += 1;
                open.push(session_id);
                ServerEvent::ConnectionAccepted { session_id }
            },
            Step::Frame { session, body } => {
                let Some(&session_id) = open.get(usize::from(session) % open.len().max(1)) else { continue };
                let Ok(frame) = Frame::new(body) else { continue };
                ServerEvent::FrameReceived { session_id, frame }
            },
            Step::Close { session } => {
                if open.is_empty() {
                    continue;
                }
                let session_id = open.swap_remove(usize::from(session) % open.len());
                ServerEvent::ConnectionClosed { session_id, reason: "fuzz".to_string() }
            },
            Step::Tick => ServerEvent::Tick,
        };
        let _ = driver.process_event(event);
    }

    assert_eq!(driver.connection_count(), open.len());
});
