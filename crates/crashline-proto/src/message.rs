//! Root message envelope: payload `p`, action `a`, controller `c`.
//!
//! Every frame body is one object with exactly these three fields, written in
//! that order. Action 13 nests a second envelope inside `p` that names a
//! gameplay command, see [`ExtensionCall`].

use crate::{
    Frame, WireObject, WireValue,
    errors::{ProtocolError, Result},
    numeric::narrow_integer,
};

/// Top-level action codes the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCode {
    /// Session bootstrap
    Handshake,
    /// Identity assignment
    Login,
    /// Identity release, connection stays open
    Logout,
    /// Named gameplay command or response
    CallExtension,
    /// Heartbeat echo
    PingPong,
}

impl ActionCode {
    /// Decode a raw action code.
    pub fn from_i16(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Handshake),
            1 => Some(Self::Login),
            2 => Some(Self::Logout),
            13 => Some(Self::CallExtension),
            29 => Some(Self::PingPong),
            _ => None,
        }
    }

    /// Raw action code.
    pub fn to_i16(self) -> i16 {
        match self {
            Self::Handshake => 0,
            Self::Login => 1,
            Self::Logout => 2,
            Self::CallExtension => 13,
            Self::PingPong => 29,
        }
    }
}

/// Controller identifier carried in `c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controller {
    /// Numeric id, encoded with the narrowest integer tag
    Id(i64),
    /// Named controller
    Name(String),
    /// List of names
    Names(Vec<String>),
}

impl Controller {
    /// Controller used by system messages.
    pub const SYSTEM: Self = Self::Id(0);

    /// Controller used by extension messages.
    pub const EXTENSION: Self = Self::Id(1);

    fn to_value(&self) -> WireValue {
        match self {
            Self::Id(id) => narrow_integer(*id),
            Self::Name(name) => WireValue::String(name.clone()),
            Self::Names(names) => WireValue::StringArray(names.clone()),
        }
    }

    fn from_value(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::String(name) => Some(Self::Name(name.clone())),
            WireValue::StringArray(names) => Some(Self::Names(names.clone())),
            other => other.as_i64().map(Self::Id),
        }
    }
}

/// Decoded root message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Raw action code; may be one the server does not handle
    pub action: i16,
    /// Controller identifier
    pub controller: Controller,
    /// Action-specific payload
    pub payload: WireObject,
}

impl Message {
    /// Build a message for a known action.
    pub fn new(action: ActionCode, controller: Controller, payload: WireObject) -> Self {
        Self { action: action.to_i16(), controller, payload }
    }

    /// Build an extension response or broadcast named `command`.
    ///
    /// `request_id` echoes the caller's `r` when the message answers a call.
    pub fn extension(command: &str, body: WireObject, request_id: Option<i64>) -> Self {
        let mut payload = WireObject::new().with("c", command).with("p", body);
        if let Some(r) = request_id {
            payload.insert("r", narrow_integer(r));
        }
        Self::new(ActionCode::CallExtension, Controller::EXTENSION, payload)
    }

    /// Action code if it is one the server handles.
    pub fn action_code(&self) -> Option<ActionCode> {
        ActionCode::from_i16(self.action)
    }

    /// Root object in wire order: `p`, `a`, `c`.
    pub fn to_object(&self) -> WireObject {
        WireObject::new()
            .with("p", self.payload.clone())
            .with("a", self.action)
            .with("c", self.controller.to_value())
    }

    /// Encode into a frame.
    pub fn to_frame(&self) -> Result<Frame> {
        Frame::from_object(&self.to_object())
    }

    /// Interpret a decoded root object.
    ///
    /// `a` may arrive with any integer width; a missing `c` defaults to the
    /// system controller.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingField` if `a` or `p` is absent
    /// - `ProtocolError::WrongFieldType` if `a` is not an integer in `i16`
    ///   range or `p` is not an object
    pub fn from_object(root: &WireObject) -> Result<Self> {
        let action = root.get("a").ok_or(ProtocolError::MissingField("a"))?;
        let action = action
            .as_i64()
            .and_then(|a| i16::try_from(a).ok())
            .ok_or(ProtocolError::WrongFieldType { field: "a", expected: "short" })?;

        let payload = root
            .get("p")
            .ok_or(ProtocolError::MissingField("p"))?
            .as_object()
            .ok_or(ProtocolError::WrongFieldType { field: "p", expected: "object" })?
            .clone();

        let controller = root.get("c").and_then(Controller::from_value).unwrap_or(Controller::SYSTEM);

        Ok(Self { action, controller, payload })
    }
}

/// Action-13 call: command name, parameters, optional request id.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionCall {
    /// Command name, for example `betHandler`
    pub command: String,
    /// Command parameters; empty when the caller sent none
    pub params: WireObject,
    /// Caller-chosen request id
    pub request_id: Option<i64>,
}

impl ExtensionCall {
    /// Extract the call from an action-13 payload.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingField` if `c` is absent
    /// - `ProtocolError::WrongFieldType` if `c` is not a string or `p` is
    ///   present but not an object
    pub fn from_payload(payload: &WireObject) -> Result<Self> {
        let command = payload
            .get("c")
            .ok_or(ProtocolError::MissingField("c"))?
            .as_str()
            .ok_or(ProtocolError::WrongFieldType { field: "c", expected: "string" })?
            .to_owned();

        let params = match payload.get("p") {
            None => WireObject::new(),
            Some(value) => value
                .as_object()
                .ok_or(ProtocolError::WrongFieldType { field: "p", expected: "object" })?
                .clone(),
        };

        Ok(Self { command, params, request_id: payload.get_i64("r") })
    }

    /// Wrap as a root message, the inverse of [`ExtensionCall::from_payload`].
    pub fn into_message(self) -> Message {
        Message::extension(&self.command, self.params, self.request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_field_order_is_p_a_c() {
        let message = Message::new(ActionCode::PingPong, Controller::SYSTEM, WireObject::new());

        let names: Vec<_> = message.to_object().names().map(str::to_owned).collect();

        assert_eq!(names, ["p", "a", "c"]);
    }

    #[test]
    fn controller_id_is_narrowed() {
        let object = Message::new(ActionCode::Login, Controller::Id(1000), WireObject::new()).to_object();

        assert_eq!(object.get("c"), Some(&WireValue::Short(1000)));
        assert_eq!(object.get("a"), Some(&WireValue::Short(1)));
    }

    #[test]
    fn action_accepts_any_integer_width() {
        let root = WireObject::new().with("p", WireObject::new()).with("a", 13i32).with("c", 1u8);

        let message = Message::from_object(&root).unwrap();

        assert_eq!(message.action_code(), Some(ActionCode::CallExtension));
        assert_eq!(message.controller, Controller::Id(1));
    }

    #[test]
    fn missing_payload_is_an_error() {
        let root = WireObject::new().with("a", 0i16);

        assert_eq!(Message::from_object(&root), Err(ProtocolError::MissingField("p")));
    }

    #[test]
    fn unknown_action_decodes_but_has_no_code() {
        let root = WireObject::new().with("p", WireObject::new()).with("a", 77i16);

        let message = Message::from_object(&root).unwrap();

        assert_eq!(message.action, 77);
        assert_eq!(message.action_code(), None);
        assert_eq!(message.controller, Controller::SYSTEM);
    }

    #[test]
    fn extension_call_round_trip() {
        let call = ExtensionCall {
            command: "betHandler".to_owned(),
            params: WireObject::new().with("bet", 10.0f64).with("betId", 1u8),
            request_id: Some(4),
        };

        let message = call.clone().into_message();
        let parsed = ExtensionCall::from_payload(&message.payload).unwrap();

        assert_eq!(parsed, call);
    }

    #[test]
    fn extension_call_requires_string_command() {
        let payload = WireObject::new().with("c", 5i32);

        assert_eq!(
            ExtensionCall::from_payload(&payload),
            Err(ProtocolError::WrongFieldType { field: "c", expected: "string" })
        );
    }
}
