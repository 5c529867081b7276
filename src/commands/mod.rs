//! Command handlers: the concrete `HandlerFn`s registered into
//! `dispatch::Registry`, grouped by concern (connection registration,
//! channel operations, the MODE command, messaging, oper/admin, and misc
//! session commands).
//!
//! A handler's `Vec<Message>` return is always a reply to the acting
//! session; messages bound for anyone else (channel broadcast, a PRIVMSG
//! target, a nick-change observer) are queued directly via [`send_to`]
//! inside the handler. This keeps delivery uniform with
//! `Channel::broadcast`, which already writes straight to each member's
//! send queue rather than funnelling through a caller-side router.

pub mod channel;
pub mod connection;
pub mod messaging;
pub mod misc;
pub mod mode;
pub mod oper;

use ember_proto::{IrcEncode, Message, Prefix};

use crate::dispatch::Registry;
use crate::error::HandlerError;
use crate::server::Server;
use crate::store::Uid;
use crate::user::User;

/// Build the full command registry, wiring every submodule's commands.
pub fn build_registry() -> Registry {
    let mut registry = Registry::new();
    connection::register(&mut registry);
    channel::register(&mut registry);
    mode::register(&mut registry);
    messaging::register(&mut registry);
    misc::register(&mut registry);
    oper::register(&mut registry);
    registry
}

/// The acting user's current nick, or `"*"` before one is set.
pub(crate) fn actor_nick(server: &Server, uid: &Uid) -> String {
    server
        .store
        .find_user_by_uid(uid)
        .map(|u| if u.nick.is_empty() { "*".to_string() } else { u.nick.clone() })
        .unwrap_or_else(|| "*".to_string())
}

/// Look up the acting user's session record. Only fails if `uid` has no
/// backing `User`, which should be structurally impossible: the dispatcher
/// only calls handlers with a `uid` it just found in the store.
pub(crate) fn actor<'s>(server: &'s Server, uid: &Uid) -> Result<&'s User, HandlerError> {
    server
        .store
        .find_user_by_uid(uid)
        .ok_or_else(|| HandlerError::Internal(format!("no session for {uid}")))
}

/// Build a `nick!user@host` prefix for the acting user, for sourcing
/// outbound JOIN/PART/NICK/MODE/KICK/TOPIC/QUIT-style messages.
pub(crate) fn actor_prefix(server: &Server, uid: &Uid) -> Result<Prefix, HandlerError> {
    let user = actor(server, uid)?;
    Ok(Prefix::new(user.nick.clone(), user.ident.clone(), user.displayed_host.clone()))
}

/// Build a message sourced from `prefix` with no tags. `ember_proto`
/// provides dedicated constructors only for PRIVMSG/NOTICE/numerics;
/// everything else (JOIN, PART, MODE, KICK, TOPIC, QUIT, NICK) is built
/// this way.
pub(crate) fn sourced(prefix: Prefix, command: &str, params: Vec<String>) -> Message {
    Message {
        tags: None,
        prefix: Some(prefix),
        command: command.to_string(),
        params,
    }
}

/// Deliver `message` directly to `uid`'s send queue, bypassing the
/// dispatcher's reply-to-actor return value. Returns `false` if the
/// session has no backing user or its send queue is already gone.
pub(crate) fn send_to(server: &Server, uid: &Uid, message: &Message) -> bool {
    match server.store.find_user_by_uid(uid) {
        Some(user) => user.send_raw(message.to_bytes()),
        None => false,
    }
}

/// Unix seconds now, for topic set-times, channel TS, and ban
/// timestamps.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Constant-time string equality, for channel keys and the connect
/// password. Length differences still leak through `subtle`'s slice
/// comparison, which is the accepted trade-off for variable-length
/// secrets.
pub(crate) fn secure_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
