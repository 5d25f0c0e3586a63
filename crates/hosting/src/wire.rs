use serde::Deserialize;
use serde::Serialize;
use skr_core::ID;
use skr_core::Millis;
use skr_core::Seq;
use skr_core::UserId;
use skr_core::now_ms;
use skr_rules::ActionInput;
use skr_rules::Event;
use skr_rules::Session;

/// Machine-readable error codes for transport and auth failures. Rule
/// violations travel under their own kind strings from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AuthRequired,
    AuthFailed,
    InvalidMessage,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AuthFailed => "AUTH_FAILED",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages a client may send. Only `auth` and `ping` are accepted
/// before authentication.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Auth { token: String },
    Ping {},
    Action(ActionInput),
    Chat { text: String },
    JoinSession { session_id: ID<Session> },
    LeaveSession {},
    PauseToggle {},
}

/// One decoded client envelope. `seq` must be strictly increasing per
/// connection; the router rejects regressions.
#[derive(Debug, Deserialize)]
pub struct Inbound {
    #[serde(flatten)]
    pub message: ClientMessage,
    pub seq: Seq,
    #[serde(default)]
    pub ts: Millis,
}

/// Messages the server originates (everything except replayed game
/// events, which serialize under their own tags).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Pong {},
    AuthResult {
        user_id: UserId,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        picture: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reconnected_session_id: Option<ID<Session>>,
    },
    Error {
        code: String,
        message: String,
    },
    /// Positive reply for fire-and-forget client requests, so every
    /// client `seq` receives an answer.
    Ack {},
    /// Snapshot handed to a user entering a session; later events apply
    /// on top of it.
    SessionJoined {
        session_id: ID<Session>,
        snapshot: Session,
    },
    Chat {
        user_id: UserId,
        text: String,
    },
    PauseToggled {
        paused: bool,
    },
}

/// Anything that can ride the outbound envelope: server messages or
/// game events straight from a session's history.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Message {
    Server(ServerMessage),
    Event(Event),
}

impl From<ServerMessage> for Message {
    fn from(m: ServerMessage) -> Self {
        Self::Server(m)
    }
}
impl From<Event> for Message {
    fn from(e: Event) -> Self {
        Self::Event(e)
    }
}

/// One stamped server envelope, ready for the socket.
#[derive(Debug, Serialize)]
pub struct Outbound {
    #[serde(flatten)]
    pub message: Message,
    pub seq: Seq,
    pub ts: Millis,
    #[serde(skip_serializing_if = "Option::is_none", rename = "reqSeq")]
    pub req_seq: Option<Seq>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outbound {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("serialize outbound envelope")
    }
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.as_str().to_string(),
            message: message.into(),
        }
    }
    pub fn violation(kind: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: kind.to_string(),
            message: message.into(),
        }
    }
}

/// Stamp a message into an envelope. `seq` comes from the per-connection
/// counter; `ts` is wall-clock milliseconds.
pub fn envelope(
    message: Message,
    seq: Seq,
    req_seq: Option<Seq>,
    success: Option<bool>,
    error: Option<String>,
) -> Outbound {
    Outbound {
        message,
        seq,
        ts: now_ms(),
        req_seq,
        success,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_auth_parses() {
        let raw = r#"{"type":"auth","payload":{"token":"abc"},"seq":1,"ts":123}"#;
        let inbound: Inbound = serde_json::from_str(raw).expect("parse");
        assert_eq!(inbound.seq, 1);
        assert_eq!(
            inbound.message,
            ClientMessage::Auth {
                token: "abc".to_string()
            }
        );
    }

    #[test]
    fn client_action_nests_kind_payload() {
        let raw = r#"{"type":"action","payload":{"kind":"move","unitId":"P1","path":[{"x":0,"y":0},{"x":1,"y":0}]},"seq":7,"ts":0}"#;
        let inbound: Inbound = serde_json::from_str(raw).expect("parse");
        match inbound.message {
            ClientMessage::Action(ActionInput::Move { unit_id, path }) => {
                assert_eq!(unit_id, "P1");
                assert_eq!(path.len(), 2);
            }
            other => panic!("expected move action, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let raw = r#"{"type":"launch_missiles","payload":{},"seq":1,"ts":0}"#;
        assert!(serde_json::from_str::<Inbound>(raw).is_err());
    }

    #[test]
    fn outbound_event_keeps_its_own_tag() {
        let out = envelope(
            Event::TurnStarted {
                unit_id: "P1".to_string(),
                round: 1,
            }
            .into(),
            3,
            None,
            None,
            None,
        );
        let json: serde_json::Value = serde_json::from_str(&out.to_json()).expect("json");
        assert_eq!(json["type"], "turn_started");
        assert_eq!(json["payload"]["unitId"], "P1");
        assert_eq!(json["seq"], 3);
        assert!(json.get("reqSeq").is_none());
    }

    #[test]
    fn outbound_error_references_request() {
        let out = envelope(
            ServerMessage::error(ErrorCode::RateLimited, "slow down").into(),
            9,
            Some(41),
            None,
            Some("slow down".to_string()),
        );
        let json: serde_json::Value = serde_json::from_str(&out.to_json()).expect("json");
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["code"], "RATE_LIMITED");
        assert_eq!(json["reqSeq"], 41);
    }

    #[test]
    fn ping_with_empty_payload_parses() {
        let raw = r#"{"type":"ping","payload":{},"seq":2,"ts":0}"#;
        let inbound: Inbound = serde_json::from_str(raw).expect("parse");
        assert_eq!(inbound.message, ClientMessage::Ping {});
    }
}
