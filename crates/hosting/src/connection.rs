use super::Message;
use skr_core::ID;
use skr_core::Seq;
use skr_core::UserId;
use skr_rules::Session;
use tokio::sync::mpsc::UnboundedSender;

/// Marker type for connection identifiers.
#[derive(Debug)]
pub struct Connection;

/// One queued outbound item for a connection. The bridge task stamps the
/// envelope (`seq`, `ts`) at write time so server sequence numbers are
/// strictly increasing per connection.
#[derive(Debug)]
pub enum Frame {
    Message {
        message: Message,
        req_seq: Option<Seq>,
        success: Option<bool>,
        error: Option<String>,
    },
    /// Close the transport with a protocol code after flushing.
    Close { code: u16, reason: &'static str },
}

impl Frame {
    /// Fire-and-forget broadcast frame.
    pub fn push(message: impl Into<Message>) -> Self {
        Self::Message {
            message: message.into(),
            req_seq: None,
            success: None,
            error: None,
        }
    }
    /// Positive reply to the client message carrying `req_seq`.
    pub fn reply(message: impl Into<Message>, req_seq: Seq) -> Self {
        Self::Message {
            message: message.into(),
            req_seq: Some(req_seq),
            success: Some(true),
            error: None,
        }
    }
    /// Error reply; `req_seq` references the offending client message
    /// when it could be decoded.
    pub fn error(message: impl Into<Message>, req_seq: Option<Seq>, detail: String) -> Self {
        Self::Message {
            message: message.into(),
            req_seq,
            success: Some(false),
            error: Some(detail),
        }
    }
}

/// Registry entry for one live connection. Owned by the [`crate::Garrison`];
/// the bridge task holds the receiving half of `tx`.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ID<Connection>,
    pub user: Option<UserId>,
    pub session: Option<ID<Session>>,
    pub tx: UnboundedSender<Frame>,
}

impl ConnectionHandle {
    pub fn new(id: ID<Connection>, tx: UnboundedSender<Frame>) -> Self {
        Self {
            id,
            user: None,
            session: None,
            tx,
        }
    }
    pub fn send(&self, frame: Frame) {
        if self.tx.send(frame).is_err() {
            log::debug!("[conn {}] outbound queue closed", self.id);
        }
    }
}
