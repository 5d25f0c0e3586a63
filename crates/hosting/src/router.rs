use super::Category;
use super::ClientMessage;
use super::Connection;
use super::ErrorCode;
use super::Frame;
use super::Garrison;
use super::Inbound;
use super::RateLimiter;
use super::ServerMessage;
use super::SubmitError;
use skr_core::CHAT_MAX_CHARS;
use skr_core::CLOSE_AUTH_FAILED;
use skr_core::CLOSE_AUTH_TIMEOUT;
use skr_core::ID;
use skr_core::Seq;
use skr_core::UserId;
use skr_rules::ActionInput;
use skr_rules::Session;
use skr_session::SessionCommand;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Per-connection message pipeline.
///
/// Decodes envelopes, enforces sequencing, the pre-auth whitelist, and
/// rate limits, then dispatches to the garrison. Every reply and error
/// is enqueued as a [`Frame`]; the bridge task stamps and writes them.
pub struct Router {
    garrison: Arc<Garrison>,
    conn: ID<Connection>,
    tx: UnboundedSender<Frame>,
    user: Option<UserId>,
    session: Option<ID<Session>>,
    last_seq: Option<Seq>,
    // can drive an idle kick from this later
    #[allow(unused)]
    last_activity: skr_core::Millis,
    limiter: RateLimiter,
}

impl Router {
    pub fn new(garrison: Arc<Garrison>, conn: ID<Connection>, tx: UnboundedSender<Frame>) -> Self {
        Self {
            garrison,
            conn,
            tx,
            user: None,
            session: None,
            last_seq: None,
            last_activity: skr_core::now_ms(),
            limiter: RateLimiter::new(),
        }
    }

    pub fn authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The 5-second handshake window closed without an `auth`.
    pub fn auth_timeout(&self) {
        self.fail(ErrorCode::AuthRequired, "authentication deadline passed", None);
        self.push(Frame::Close {
            code: CLOSE_AUTH_TIMEOUT,
            reason: "authentication timeout",
        });
    }

    /// Transport gone; release the connection's bindings.
    pub async fn closed(self) {
        self.garrison.disconnected(self.conn).await;
    }

    /// Process one raw text frame from the client.
    pub async fn handle(&mut self, raw: &str) {
        self.last_activity = skr_core::now_ms();
        let inbound: Inbound = match serde_json::from_str(raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                let req = serde_json::from_str::<serde_json::Value>(raw)
                    .ok()
                    .and_then(|v| v.get("seq")?.as_u64());
                self.fail(ErrorCode::InvalidMessage, &format!("malformed message: {}", e), req);
                return;
            }
        };
        let seq = inbound.seq;
        if self.last_seq.map(|last| seq <= last).unwrap_or(false) {
            self.fail(
                ErrorCode::InvalidMessage,
                "seq must be strictly increasing",
                Some(seq),
            );
            return;
        }
        self.last_seq = Some(seq);
        match inbound.message {
            ClientMessage::Ping {} => self.push(Frame::reply(ServerMessage::Pong {}, seq)),
            ClientMessage::Auth { token } => self.auth(&token, seq).await,
            _ if self.user.is_none() => {
                self.fail(ErrorCode::AuthRequired, "authenticate first", Some(seq));
            }
            ClientMessage::Action(action) => self.action(action, seq).await,
            ClientMessage::Chat { text } => self.chat(text, seq).await,
            ClientMessage::JoinSession { session_id } => self.join(session_id, seq).await,
            ClientMessage::LeaveSession {} => {
                self.garrison.detach(self.conn).await;
                self.session = None;
                self.push(Frame::reply(ServerMessage::Ack {}, seq));
            }
            ClientMessage::PauseToggle {} => self.pause(seq).await,
        }
    }

    async fn auth(&mut self, token: &str, seq: Seq) {
        // Idempotent auth: a second bind attempt is an error, not a rebind.
        if self.user.is_some() {
            self.fail(ErrorCode::InvalidMessage, "already authenticated", Some(seq));
            return;
        }
        let info = match self.garrison.verify(token) {
            Some(info) => info,
            None => {
                self.fail(ErrorCode::AuthFailed, "token verification failed", Some(seq));
                self.push(Frame::Close {
                    code: CLOSE_AUTH_FAILED,
                    reason: "authentication failed",
                });
                return;
            }
        };
        let outcome = self.garrison.authenticate(self.conn, &info).await;
        log::info!("[conn {}] authenticated as {}", self.conn, info.sub);
        self.user = Some(info.sub.clone());
        self.session = outcome.reconnected_session;
        self.push(Frame::reply(
            ServerMessage::AuthResult {
                user_id: info.sub,
                name: info.name,
                picture: info.picture,
                reconnected_session_id: outcome.reconnected_session,
            },
            seq,
        ));
    }

    async fn action(&mut self, action: ActionInput, seq: Seq) {
        if !self.limiter.allow(Category::Action) {
            self.fail(ErrorCode::RateLimited, "action rate limit exceeded", Some(seq));
            return;
        }
        let sid = match self.session {
            Some(sid) => sid,
            None => {
                self.fail(ErrorCode::InvalidMessage, "join a session first", Some(seq));
                return;
            }
        };
        let user = self.user.clone().expect("dispatch is post-auth");
        match self.garrison.submit(sid, user, action).await {
            Ok(()) => self.push(Frame::reply(ServerMessage::Ack {}, seq)),
            Err(SubmitError::Rule(violation)) => self.push(Frame::error(
                ServerMessage::violation(violation.kind(), violation.message()),
                Some(seq),
                violation.message().to_string(),
            )),
            Err(SubmitError::NoSession) => {
                self.fail(ErrorCode::InvalidMessage, "session is gone", Some(seq));
            }
            Err(SubmitError::Internal) => {
                self.fail(ErrorCode::InternalError, "action failed internally", Some(seq));
            }
        }
    }

    async fn chat(&mut self, text: String, seq: Seq) {
        if !self.limiter.allow(Category::Chat) {
            self.fail(ErrorCode::RateLimited, "chat rate limit exceeded", Some(seq));
            return;
        }
        if text.chars().count() > CHAT_MAX_CHARS {
            self.fail(ErrorCode::InvalidMessage, "chat message too long", Some(seq));
            return;
        }
        let sid = match self.session {
            Some(sid) => sid,
            None => {
                self.fail(ErrorCode::InvalidMessage, "join a session first", Some(seq));
                return;
            }
        };
        let user = self.user.clone().expect("dispatch is post-auth");
        self.garrison
            .command(sid, SessionCommand::Chat { user, text })
            .await;
        self.push(Frame::reply(ServerMessage::Ack {}, seq));
    }

    async fn join(&mut self, sid: ID<Session>, seq: Seq) {
        match self.garrison.attach(self.conn, sid).await {
            Some(snapshot) => {
                self.session = Some(sid);
                self.push(Frame::reply(
                    ServerMessage::SessionJoined {
                        session_id: sid,
                        snapshot,
                    },
                    seq,
                ));
            }
            None => self.fail(ErrorCode::InvalidMessage, "no such session", Some(seq)),
        }
    }

    async fn pause(&mut self, seq: Seq) {
        let sid = match self.session {
            Some(sid) => sid,
            None => {
                self.fail(ErrorCode::InvalidMessage, "join a session first", Some(seq));
                return;
            }
        };
        let user = self.user.clone().expect("dispatch is post-auth");
        self.garrison
            .command(sid, SessionCommand::PauseToggle { user })
            .await;
        self.push(Frame::reply(ServerMessage::Ack {}, seq));
    }

    fn push(&self, frame: Frame) {
        if self.tx.send(frame).is_err() {
            log::debug!("[conn {}] outbound queue closed", self.conn);
        }
    }

    fn fail(&self, code: ErrorCode, message: &str, req_seq: Option<Seq>) {
        self.push(Frame::error(
            ServerMessage::error(code, message),
            req_seq,
            message.to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use skr_auth::TokenVerifier;
    use skr_auth::UserInfo;
    use skr_core::RATE_LIMIT_ACTION;
    use skr_rules::MonsterSpawn;
    use skr_rules::SessionConfig;
    use skr_rules::Stats;
    use skr_store::JsonFileStore;
    use skr_world::Position;
    use tokio::sync::mpsc;

    struct StubVerifier;
    impl TokenVerifier for StubVerifier {
        fn verify(&self, token: &str) -> Option<UserInfo> {
            token.strip_prefix("ok:").map(|sub| UserInfo {
                sub: sub.to_string(),
                name: sub.to_uppercase(),
                picture: None,
            })
        }
    }

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            players: 1,
            wall_density: 0.0,
            shop_offset: Position::new(1000, 1000),
            monsters: vec![MonsterSpawn {
                name: "Skeleton".to_string(),
                stats: Stats {
                    hp: 50,
                    max_hp: 50,
                    attack: 4,
                    defense: 0,
                    initiative: 8,
                    move_range: 3,
                    attack_range: 1,
                },
                position: Some(Position::new(10, 10)),
            }],
            ..SessionConfig::default()
        }
    }

    async fn router() -> (Router, mpsc::UnboundedReceiver<Frame>, Arc<Garrison>) {
        let garrison = Garrison::new(
            Arc::new(StubVerifier),
            Arc::new(JsonFileStore::new(std::env::temp_dir().join("skr-router-saves"))),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = garrison.register(tx.clone()).await;
        (Router::new(garrison.clone(), conn, tx), rx, garrison)
    }

    fn error_code(frame: &Frame) -> Option<String> {
        match frame {
            Frame::Message {
                message: Message::Server(ServerMessage::Error { code, .. }),
                ..
            } => Some(code.clone()),
            _ => None,
        }
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("frame expected")
            .expect("channel open")
    }

    #[tokio::test(start_paused = true)]
    async fn ping_is_allowed_before_auth() {
        let (mut router, mut rx, _g) = router().await;
        router.handle(r#"{"type":"ping","payload":{},"seq":1,"ts":0}"#).await;
        match recv(&mut rx).await {
            Frame::Message {
                message: Message::Server(ServerMessage::Pong {}),
                req_seq,
                ..
            } => assert_eq!(req_seq, Some(1)),
            other => panic!("expected pong, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn game_messages_require_auth() {
        let (mut router, mut rx, _g) = router().await;
        router
            .handle(r#"{"type":"chat","payload":{"text":"hi"},"seq":1,"ts":0}"#)
            .await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("AUTH_REQUIRED"));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_token_errors_then_closes() {
        let (mut router, mut rx, _g) = router().await;
        router
            .handle(r#"{"type":"auth","payload":{"token":"bad"},"seq":1,"ts":0}"#)
            .await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("AUTH_FAILED"));
        match recv(&mut rx).await {
            Frame::Close { code, .. } => assert_eq!(code, CLOSE_AUTH_FAILED),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_auth_is_a_noop_error() {
        let (mut router, mut rx, _g) = router().await;
        router
            .handle(r#"{"type":"auth","payload":{"token":"ok:alice"},"seq":1,"ts":0}"#)
            .await;
        match recv(&mut rx).await {
            Frame::Message {
                message: Message::Server(ServerMessage::AuthResult { user_id, .. }),
                ..
            } => assert_eq!(user_id, "alice"),
            other => panic!("expected auth result, got {:?}", other),
        }
        router
            .handle(r#"{"type":"auth","payload":{"token":"ok:mallory"},"seq":2,"ts":0}"#)
            .await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("INVALID_MESSAGE"));
        assert!(router.authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_seq_is_rejected() {
        let (mut router, mut rx, _g) = router().await;
        router.handle(r#"{"type":"ping","payload":{},"seq":5,"ts":0}"#).await;
        let _ = recv(&mut rx).await;
        router.handle(r#"{"type":"ping","payload":{},"seq":5,"ts":0}"#).await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("INVALID_MESSAGE"));
        router.handle(r#"{"type":"ping","payload":{},"seq":4,"ts":0}"#).await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("INVALID_MESSAGE"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_json_keeps_the_connection() {
        let (mut router, mut rx, _g) = router().await;
        router.handle("{nonsense").await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("INVALID_MESSAGE"));
        router.handle(r#"{"type":"ping","payload":{},"seq":1,"ts":0}"#).await;
        match recv(&mut rx).await {
            Frame::Message {
                message: Message::Server(ServerMessage::Pong {}),
                ..
            } => {}
            other => panic!("expected pong after recovery, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn join_unknown_session_fails() {
        let (mut router, mut rx, _g) = router().await;
        router
            .handle(r#"{"type":"auth","payload":{"token":"ok:alice"},"seq":1,"ts":0}"#)
            .await;
        let _ = recv(&mut rx).await;
        let raw = format!(
            r#"{{"type":"join_session","payload":{{"sessionId":"{}"}},"seq":2,"ts":0}}"#,
            uuid::Uuid::now_v7()
        );
        router.handle(&raw).await;
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("INVALID_MESSAGE"));
    }

    #[tokio::test(start_paused = true)]
    async fn join_replies_with_snapshot() {
        let (mut router, mut rx, g) = router().await;
        let sid = g.open_session(quiet_config(), Some(42)).await;
        router
            .handle(r#"{"type":"auth","payload":{"token":"ok:alice"},"seq":1,"ts":0}"#)
            .await;
        let _ = recv(&mut rx).await;
        let raw = format!(
            r#"{{"type":"join_session","payload":{{"sessionId":"{}"}},"seq":2,"ts":0}}"#,
            sid
        );
        router.handle(&raw).await;
        // Broadcast events and the snapshot reply race; find the reply.
        for _ in 0..16 {
            if let Frame::Message {
                message: Message::Server(ServerMessage::SessionJoined { session_id, snapshot }),
                req_seq,
                ..
            } = recv(&mut rx).await
            {
                assert_eq!(session_id, sid);
                assert_eq!(req_seq, Some(2));
                assert!(snapshot.members().contains_key("alice"));
                return;
            }
        }
        panic!("snapshot reply never arrived");
    }

    #[tokio::test(start_paused = true)]
    async fn the_thirty_first_action_is_rate_limited() {
        let (mut router, mut rx, g) = router().await;
        let sid = g.open_session(quiet_config(), Some(42)).await;
        router
            .handle(r#"{"type":"auth","payload":{"token":"ok:alice"},"seq":1,"ts":0}"#)
            .await;
        let raw = format!(
            r#"{{"type":"join_session","payload":{{"sessionId":"{}"}},"seq":2,"ts":0}}"#,
            sid
        );
        router.handle(&raw).await;
        let mut seq = 2;
        for _ in 0..RATE_LIMIT_ACTION {
            seq += 1;
            let raw = format!(
                r#"{{"type":"action","payload":{{"kind":"end_turn","unitId":"P1"}},"seq":{},"ts":0}}"#,
                seq
            );
            router.handle(&raw).await;
        }
        seq += 1;
        let raw = format!(
            r#"{{"type":"action","payload":{{"kind":"end_turn","unitId":"P1"}},"seq":{},"ts":0}}"#,
            seq
        );
        router.handle(&raw).await;
        // Drain until the rate-limit rejection; it references the last seq.
        let mut limited = None;
        while let Ok(Some(frame)) =
            tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await
        {
            if error_code(&frame).as_deref() == Some("RATE_LIMITED") {
                if let Frame::Message { req_seq, .. } = frame {
                    limited = req_seq;
                }
                break;
            }
        }
        assert_eq!(limited, Some(seq));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_timeout_errors_then_closes_4001() {
        let (router, mut rx, _g) = router().await;
        router.auth_timeout();
        assert_eq!(error_code(&recv(&mut rx).await).as_deref(), Some("AUTH_REQUIRED"));
        match recv(&mut rx).await {
            Frame::Close { code, .. } => assert_eq!(code, CLOSE_AUTH_TIMEOUT),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_chat_is_rejected() {
        let (mut router, mut rx, g) = router().await;
        let sid = g.open_session(quiet_config(), Some(42)).await;
        router
            .handle(r#"{"type":"auth","payload":{"token":"ok:alice"},"seq":1,"ts":0}"#)
            .await;
        let raw = format!(
            r#"{{"type":"join_session","payload":{{"sessionId":"{}"}},"seq":2,"ts":0}}"#,
            sid
        );
        router.handle(&raw).await;
        let long = "x".repeat(CHAT_MAX_CHARS + 1);
        let raw = format!(r#"{{"type":"chat","payload":{{"text":"{}"}},"seq":3,"ts":0}}"#, long);
        router.handle(&raw).await;
        let mut rejected = false;
        while let Ok(Some(frame)) =
            tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await
        {
            if error_code(&frame).as_deref() == Some("INVALID_MESSAGE") {
                rejected = true;
                break;
            }
        }
        assert!(rejected);
    }
}
