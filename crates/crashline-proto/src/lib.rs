//! Crashline wire protocol.
//!
//! Every message on the wire is a self-describing tagged binary object
//! wrapped in a length-prefixed frame.
//!
//! # Components
//!
//! - [`WireValue`] / [`WireObject`]: value tree, one variant per type tag
//! - [`codec`]: recursive encoder and the partial-decoding object reader
//! - [`FramePrefix`] / [`Frame`]: `0x80` marker, 16-bit length, object body
//! - [`Message`]: the `p`/`a`/`c` envelope and [`ExtensionCall`] routing
//! - [`narrow_integer`]: runtime width selection for dynamic integers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod errors;
pub mod frame;
pub mod message;
pub mod numeric;
pub mod prefix;
pub mod tag;
pub mod value;

pub use codec::Decoded;
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use message::{ActionCode, Controller, ExtensionCall, Message};
pub use numeric::narrow_integer;
pub use prefix::FramePrefix;
pub use tag::TypeTag;
pub use value::{WireObject, WireValue};
