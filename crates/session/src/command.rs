use skr_core::ID;
use skr_core::UserId;
use skr_rules::ActionInput;
use skr_rules::Event;
use skr_rules::LeaveReason;
use skr_rules::RuleViolation;
use skr_rules::Session;
use tokio::sync::oneshot;

/// Why a submitted action produced no state change.
#[derive(Debug)]
pub enum ActError {
    /// The rules engine rejected it; state untouched.
    Rule(RuleViolation),
    /// The action failed inside the worker; it was discarded, not
    /// partially applied.
    Internal,
}

pub type ActReply = oneshot::Sender<Result<(), ActError>>;

/// Messages posted to a session worker's queue. Timers, reconnect
/// handling, and clients all communicate with the worker this way; the
/// worker never suspends mid-command.
pub enum SessionCommand {
    Act {
        user: UserId,
        action: ActionInput,
        reply: ActReply,
    },
    Join {
        user: UserId,
    },
    Disconnect {
        user: UserId,
    },
    Reconnect {
        user: UserId,
    },
    Leave {
        user: UserId,
        reason: LeaveReason,
    },
    Chat {
        user: UserId,
        text: String,
    },
    PauseToggle {
        user: UserId,
    },
    /// Snapshot the full state, e.g. for the save store. Taken between
    /// actions, never mid-apply.
    Snapshot {
        reply: oneshot::Sender<Session>,
    },
}

/// Traffic from a session worker to the connection layer, which fans it
/// out to the session's members.
#[derive(Debug, Clone)]
pub enum Outgoing {
    Events {
        session: ID<Session>,
        events: Vec<Event>,
    },
    Chat {
        session: ID<Session>,
        user: UserId,
        text: String,
    },
    PauseToggled {
        session: ID<Session>,
        paused: bool,
    },
}
