use super::Connection;
use super::ConnectionHandle;
use super::Frame;
use super::Message;
use super::ServerMessage;
use skr_auth::TokenVerifier;
use skr_auth::UserInfo;
use skr_core::CLOSE_REPLACED;
use skr_core::GRACE_PERIOD;
use skr_core::ID;
use skr_core::UserId;
use skr_rules::ActionInput;
use skr_rules::LeaveReason;
use skr_rules::RuleViolation;
use skr_rules::Session;
use skr_rules::SessionConfig;
use skr_session::ActError;
use skr_session::Outgoing;
use skr_session::SessionCommand;
use skr_session::SessionHandle;
use skr_session::SessionWorker;
use skr_store::SaveStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::oneshot;

/// Result of verifying a token on a connection.
#[derive(Debug)]
pub struct AuthOutcome {
    /// Session the user was carried back into, via grace reattachment or
    /// connection takeover.
    pub reconnected_session: Option<ID<Session>>,
}

/// Why an action submission produced no effect.
#[derive(Debug)]
pub enum SubmitError {
    NoSession,
    Rule(RuleViolation),
    Internal,
}

struct GraceTimer {
    session: ID<Session>,
    cancel: oneshot::Sender<()>,
}

/// Process-wide registry of session workers and live connections.
///
/// Owns the cross-component indexes (`connectionId -> conn`,
/// `userId -> connectionId`, `sessionId -> worker handle`) and the
/// reconnect grace timers. Session workers never see connections; they
/// emit [`Outgoing`] traffic and the garrison fans it out.
pub struct Garrison {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn SaveStore>,
    outgoing: UnboundedSender<Outgoing>,
    sessions: RwLock<HashMap<ID<Session>, SessionHandle>>,
    connections: RwLock<HashMap<ID<Connection>, ConnectionHandle>>,
    users: RwLock<HashMap<UserId, ID<Connection>>>,
    grace: Mutex<HashMap<UserId, GraceTimer>>,
}

impl Garrison {
    /// Build the registry and start its fan-out task.
    pub fn new(verifier: Arc<dyn TokenVerifier>, store: Arc<dyn SaveStore>) -> Arc<Self> {
        let (tx, rx) = unbounded_channel();
        let garrison = Arc::new(Self {
            verifier,
            store,
            outgoing: tx,
            sessions: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            grace: Mutex::new(HashMap::new()),
        });
        tokio::spawn(Self::fan_out(garrison.clone(), rx));
        garrison
    }

    pub fn verify(&self, token: &str) -> Option<UserInfo> {
        self.verifier.verify(token)
    }
    pub fn store(&self) -> Arc<dyn SaveStore> {
        self.store.clone()
    }

    // ---- session lifecycle -------------------------------------------------

    /// Open a fresh session. The seed defaults to process entropy but is
    /// pinned from then on; all simulation randomness derives from it.
    pub async fn open_session(&self, config: SessionConfig, seed: Option<u64>) -> ID<Session> {
        let seed = seed.unwrap_or_else(rand::random);
        let session = Session::new(ID::fresh(), seed, config);
        self.adopt(session).await
    }

    /// Spawn a worker around an existing state record (fresh or loaded).
    pub async fn adopt(&self, session: Session) -> ID<Session> {
        let handle = SessionWorker::spawn(session, self.outgoing.clone());
        let id = handle.id();
        self.sessions.write().await.insert(id, handle);
        log::info!("[garrison] session {} open", id);
        id
    }

    pub async fn close_session(&self, id: ID<Session>) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| log::info!("[garrison] session {} closed", id))
            .ok_or_else(|| anyhow::anyhow!("session not found"))
    }

    pub async fn session(&self, id: ID<Session>) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Full state snapshot, taken between actions by the worker.
    pub async fn snapshot(&self, id: ID<Session>) -> Option<Session> {
        let worker = self.session(id).await?;
        let (reply, rx) = oneshot::channel();
        if !worker.send(SessionCommand::Snapshot { reply }) {
            return None;
        }
        rx.await.ok()
    }

    // ---- connection lifecycle ----------------------------------------------

    /// Register a transport connection and return its id.
    pub async fn register(&self, tx: UnboundedSender<Frame>) -> ID<Connection> {
        let id = ID::fresh();
        self.connections
            .write()
            .await
            .insert(id, ConnectionHandle::new(id, tx));
        log::debug!("[garrison] connection {} registered", id);
        id
    }

    /// Bind a verified identity to a connection. Enforces one connection
    /// per user: an older connection is closed with 4003 and the new one
    /// takes over its session, including any pending grace reattachment.
    pub async fn authenticate(
        self: &Arc<Self>,
        conn: ID<Connection>,
        info: &UserInfo,
    ) -> AuthOutcome {
        let user = info.sub.clone();
        let prior = self.users.write().await.insert(user.clone(), conn);
        let mut inherited = None;
        if let Some(old) = prior.filter(|old| *old != conn) {
            let mut connections = self.connections.write().await;
            if let Some(handle) = connections.get_mut(&old) {
                inherited = handle.session.take();
                handle.user = None;
                handle.send(Frame::Close {
                    code: CLOSE_REPLACED,
                    reason: "replaced by new connection",
                });
                log::info!("[garrison] {} replaced connection {}", user, old);
            }
        }
        let session = match self.end_grace(&user).await {
            Some(reattached) => Some(reattached),
            None => inherited,
        };
        {
            let mut connections = self.connections.write().await;
            if let Some(handle) = connections.get_mut(&conn) {
                handle.user = Some(user.clone());
                handle.session = session;
            }
        }
        if let Some(sid) = session {
            if let Some(worker) = self.session(sid).await {
                worker.send(SessionCommand::Reconnect { user: user.clone() });
            }
        }
        AuthOutcome {
            reconnected_session: session,
        }
    }

    /// Enter a session: post the join, then hand back a state snapshot
    /// that already reflects it (the worker queue is FIFO).
    pub async fn attach(&self, conn: ID<Connection>, sid: ID<Session>) -> Option<Session> {
        let worker = self.session(sid).await?;
        let user = self
            .connections
            .read()
            .await
            .get(&conn)
            .and_then(|h| h.user.clone())?;
        worker.send(SessionCommand::Join { user });
        let (reply, rx) = oneshot::channel();
        worker.send(SessionCommand::Snapshot { reply });
        let snapshot = rx.await.ok()?;
        if let Some(handle) = self.connections.write().await.get_mut(&conn) {
            handle.session = Some(sid);
        }
        Some(snapshot)
    }

    /// Voluntarily leave the attached session.
    pub async fn detach(&self, conn: ID<Connection>) {
        let (user, session) = {
            let mut connections = self.connections.write().await;
            match connections.get_mut(&conn) {
                Some(handle) => (handle.user.clone(), handle.session.take()),
                None => return,
            }
        };
        if let (Some(user), Some(sid)) = (user, session) {
            if let Some(worker) = self.session(sid).await {
                worker.send(SessionCommand::Leave {
                    user,
                    reason: LeaveReason::Voluntary,
                });
            }
        }
    }

    /// Transport closed. An authenticated, attached player keeps their
    /// membership for the grace window; a replaced connection does not
    /// disturb the user's new binding.
    pub async fn disconnected(self: &Arc<Self>, conn: ID<Connection>) {
        let handle = self.connections.write().await.remove(&conn);
        let Some(handle) = handle else { return };
        let Some(user) = handle.user else { return };
        {
            let mut users = self.users.write().await;
            match users.get(&user) {
                Some(bound) if *bound == conn => {
                    users.remove(&user);
                }
                _ => return,
            }
        }
        if let Some(sid) = handle.session {
            if let Some(worker) = self.session(sid).await {
                worker.send(SessionCommand::Disconnect { user: user.clone() });
            }
            self.begin_grace(user, sid).await;
        }
    }

    // ---- command plumbing --------------------------------------------------

    /// Submit a game action and wait for the worker's verdict.
    pub async fn submit(
        &self,
        sid: ID<Session>,
        user: UserId,
        action: ActionInput,
    ) -> Result<(), SubmitError> {
        let worker = self.session(sid).await.ok_or(SubmitError::NoSession)?;
        let (reply, rx) = oneshot::channel();
        if !worker.send(SessionCommand::Act { user, action, reply }) {
            return Err(SubmitError::NoSession);
        }
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ActError::Rule(violation))) => Err(SubmitError::Rule(violation)),
            Ok(Err(ActError::Internal)) | Err(_) => Err(SubmitError::Internal),
        }
    }

    /// Post a fire-and-forget command to a session worker.
    pub async fn command(&self, sid: ID<Session>, command: SessionCommand) -> bool {
        match self.session(sid).await {
            Some(worker) => worker.send(command),
            None => false,
        }
    }

    // ---- fan-out -----------------------------------------------------------

    /// Deliver a message to every connection attached to `session`, with
    /// optional echo suppression.
    pub async fn broadcast(
        &self,
        session: ID<Session>,
        message: Message,
        exclude: Option<ID<Connection>>,
    ) {
        let connections = self.connections.read().await;
        for handle in connections
            .values()
            .filter(|h| h.session == Some(session))
            .filter(|h| Some(h.id) != exclude)
        {
            handle.send(Frame::push(message.clone()));
        }
    }

    async fn fan_out(self: Arc<Self>, mut rx: UnboundedReceiver<Outgoing>) {
        while let Some(outgoing) = rx.recv().await {
            match outgoing {
                Outgoing::Events { session, events } => {
                    for event in events {
                        self.broadcast(session, Message::Event(event), None).await;
                    }
                }
                Outgoing::Chat { session, user, text } => {
                    self.broadcast(
                        session,
                        Message::Server(ServerMessage::Chat {
                            user_id: user,
                            text,
                        }),
                        None,
                    )
                    .await;
                }
                Outgoing::PauseToggled { session, paused } => {
                    self.broadcast(
                        session,
                        Message::Server(ServerMessage::PauseToggled { paused }),
                        None,
                    )
                    .await;
                }
            }
        }
        log::debug!("[garrison] fan-out stopped");
    }

    // ---- reconnect grace ---------------------------------------------------

    async fn begin_grace(self: &Arc<Self>, user: UserId, session: ID<Session>) {
        let (cancel, cancelled) = oneshot::channel();
        self.grace
            .lock()
            .await
            .insert(user.clone(), GraceTimer { session, cancel });
        let garrison = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(GRACE_PERIOD) => garrison.expire_grace(&user).await,
                _ = cancelled => {}
            }
        });
        log::debug!("[garrison] grace window started");
    }

    /// Cancel a pending grace timer and return the session it guarded.
    async fn end_grace(&self, user: &UserId) -> Option<ID<Session>> {
        let timer = self.grace.lock().await.remove(user)?;
        let _ = timer.cancel.send(());
        Some(timer.session)
    }

    async fn expire_grace(&self, user: &UserId) {
        let timer = match self.grace.lock().await.remove(user) {
            Some(timer) => timer,
            None => return,
        };
        log::info!("[garrison] grace expired for {}", user);
        if let Some(worker) = self.session(timer.session).await {
            worker.send(SessionCommand::Leave {
                user: user.clone(),
                reason: LeaveReason::DisconnectTimeout,
            });
        }
    }
}
