//! User sessions: identity fields plus the per-connection state machine
//! (registration progress, penalty accounting, send queue).

use std::collections::HashSet;
use std::net::SocketAddr;

use tokio::sync::mpsc::Sender;

use crate::store::Uid;

/// Registration progress bitset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registration {
    /// `NICK` has been accepted.
    pub nick_received: bool,
    /// `USER` has been accepted.
    pub user_received: bool,
    /// Both prior flags were set and `on_user_register` ran without a
    /// `DENY` verdict.
    pub fully_connected: bool,
}

impl Registration {
    /// Whether both `NICK` and `USER` have landed (ready for the
    /// `on_user_register` transition).
    pub fn ready_to_register(&self) -> bool {
        self.nick_received && self.user_received && !self.fully_connected
    }
}

/// A connected client session. Combines the entity store's identity
/// record (nick, ident, host, ...) with the per-connection state
/// (registration progress, penalty, send queue).
pub struct User {
    /// Stable per-session identifier.
    pub uid: Uid,
    /// Current nickname (empty until `NICK` is accepted).
    pub nick: String,
    /// Username/"ident" from `USER`.
    pub ident: String,
    /// Connection-derived real host.
    pub real_host: String,
    /// Host shown to other users (may be cloaked).
    pub displayed_host: String,
    /// Real name ("gecos") from `USER`.
    pub real_name: String,
    /// Away message, if set via `AWAY`.
    pub away: Option<String>,
    /// User mode letters currently set (i, w, s, o, ...).
    pub modes: HashSet<char>,
    /// Oper account name, if this session has successfully `OPER`ed.
    pub oper_name: Option<String>,
    /// `PASS` sent before registration completed, checked against the
    /// server's configured connect password (if any) once NICK+USER land.
    pub pending_pass: Option<String>,
    /// Registration progress.
    pub registration: Registration,
    /// Whether this session is tearing down. `quit` is idempotent; this
    /// flag is what makes a second call a no-op.
    pub quitting: bool,
    /// Per-session penalty accumulator in milliseconds.
    pub penalty_ms: i64,
    /// Unix seconds at connect time.
    pub signon_time: i64,
    /// Unix seconds of the last command processed.
    pub idle_since: i64,
    /// Folded channel names this user currently belongs to. Mirrors each
    /// channel's member map exactly; a mismatch between the two is an
    /// invariant violation.
    pub channels: HashSet<String>,
    /// Remote socket address.
    pub addr: SocketAddr,
    /// Send queue: a bounded channel drained by the connection's writer
    /// task. `None` once the writer half has gone away. A full queue
    /// drops the message (`send_raw` reports it); the core loop quits
    /// sessions whose queue stays saturated.
    pub outbound: Option<Sender<Vec<u8>>>,
}

impl User {
    /// Create a new, pre-registration session.
    pub fn new(uid: Uid, addr: SocketAddr, real_host: String) -> Self {
        let now = unix_now();
        User {
            uid,
            nick: String::new(),
            ident: String::new(),
            real_host: real_host.clone(),
            displayed_host: real_host,
            real_name: String::new(),
            away: None,
            modes: HashSet::new(),
            oper_name: None,
            pending_pass: None,
            registration: Registration::default(),
            quitting: false,
            penalty_ms: 0,
            signon_time: now,
            idle_since: now,
            channels: HashSet::new(),
            addr,
            outbound: None,
        }
    }

    /// Builder helper used by tests to set a nick at construction time.
    pub fn with_nick(mut self, nick: String) -> Self {
        self.nick = nick;
        self.registration.nick_received = true;
        self
    }

    /// Whether this session has completed registration.
    pub fn is_registered(&self) -> bool {
        self.registration.fully_connected
    }

    /// Whether this session currently holds the oper privilege.
    pub fn is_oper(&self) -> bool {
        self.oper_name.is_some()
    }

    /// The client's `nick!user@host` hostmask, using the displayed host.
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.displayed_host)
    }

    /// Queue raw bytes for delivery. Returns `false` if the send queue is
    /// gone (writer half already closed) or full (client not draining).
    pub fn send_raw(&self, bytes: Vec<u8>) -> bool {
        match &self.outbound {
            Some(tx) => tx.try_send(bytes).is_ok(),
            None => false,
        }
    }

    /// Whether the send queue exists but has no remaining capacity. Such
    /// a session is quit with `SendQ exceeded`.
    pub fn sendq_saturated(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| tx.capacity() == 0)
    }

    /// Debit the per-command penalty.
    pub fn debit_penalty(&mut self, ms: i64) {
        self.penalty_ms += ms;
    }

    /// Decay accumulated penalty by wall-clock elapsed milliseconds,
    /// 1 ms of penalty per 1 ms elapsed.
    pub fn decay_penalty(&mut self, elapsed_ms: i64) {
        self.penalty_ms = (self.penalty_ms - elapsed_ms).max(0);
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
