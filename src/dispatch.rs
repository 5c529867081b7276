//! Command dispatching: registry, parameter parsing, penalty
//! accounting, and comma-list loop-calls.

use std::collections::HashMap;

use ember_proto::Message;

use crate::error::HandlerError;
use crate::events::EventKind;
use crate::server::Server;
use crate::store::Uid;

/// Small debit for lines that never reach a handler, so unknown-command
/// floods still cost something.
const UNKNOWN_COMMAND_PENALTY_MS: i64 = 500;

/// Who may invoke a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Any registered user.
    Normal,
    /// Requires the oper privilege.
    Operator,
}

/// A handler's result: applied directly by the dispatcher, never by the
/// handler reaching back into the connection layer.
pub type HandlerResult = Result<Vec<Message>, HandlerError>;

/// A command handler function. Receives the acting user's UID, the raw
/// parameter list (trailing already folded), and the server context.
pub type HandlerFn = fn(&mut Server, &Uid, &[String]) -> HandlerResult;

/// Registered command metadata.
pub struct CommandSpec {
    /// Upper-case command name.
    pub name: &'static str,
    /// Minimum parameter count.
    pub min_params: usize,
    /// Maximum parameter count consumed positionally; beyond this, extra
    /// tokens fold into the last parameter (`0` disables folding).
    pub max_params: usize,
    /// Access level required.
    pub access: Access,
    /// Whether this command may run before full registration.
    pub works_before_registration: bool,
    /// Penalty debited in ms on success.
    pub penalty_ms: i64,
    /// Keep an empty trailing parameter instead of popping it before the
    /// min-count check (USER's empty realname is the canonical case).
    pub allow_empty_last_param: bool,
    /// Index into `params` (after trailing-folding) that carries a
    /// comma-separated list subject to `LoopCall` iteration, if any.
    pub loop_call_index: Option<usize>,
    /// A second comma-list index paired with `loop_call_index` (e.g.
    /// JOIN's keys list), padded with empty strings when shorter.
    pub loop_call_paired_index: Option<usize>,
    /// The handler function.
    pub handler: HandlerFn,
}

/// The command registry.
#[derive(Default)]
pub struct Registry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, replacing any previous registration under the
    /// same name.
    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    /// Remove a command registration.
    pub fn unregister(&mut self, name: &str) {
        self.commands.remove(name);
    }

    /// Look up a command by name (case-insensitive on the wire, but
    /// callers are expected to have already upper-cased it; `Message`'s
    /// constructors do this).
    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }
}

/// Parse one wire line into a [`Message`] and hand it to the registry.
/// Returns the reply messages to send back to `uid`, plus whatever
/// broadcast messages the handler queued as part of its own `Vec<Message>`
/// return (this dispatcher does not distinguish unicast from broadcast;
/// callers route by inspecting each message's target).
pub fn process_line(
    server: &mut Server,
    registry: &Registry,
    uid: &Uid,
    line: &str,
) -> Vec<Message> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Vec::new();
    }

    let message: Message = match trimmed.parse() {
        Ok(m) => m,
        Err(_) => {
            return vec![Message::reply(
                ember_proto::Response::ERR_UNKNOWNCOMMAND,
                "*",
                vec!["*".to_string(), "Malformed command".to_string()],
            )]
        }
    };

    process_message(server, registry, uid, message, false)
}

fn process_message(
    server: &mut Server,
    registry: &Registry,
    uid: &Uid,
    message: Message,
    from_loop_call: bool,
) -> Vec<Message> {
    let Some(spec) = registry.find(&message.command) else {
        if let Some(user) = server.store.find_user_by_uid_mut(uid) {
            user.debit_penalty(UNKNOWN_COMMAND_PENALTY_MS);
        }
        return vec![Message::reply(
            ember_proto::Response::ERR_UNKNOWNCOMMAND,
            nick_or_star(server, uid),
            vec![message.command.clone(), "Unknown command".to_string()],
        )];
    };

    let is_registered = server
        .store
        .find_user_by_uid(uid)
        .map(|u| u.is_registered())
        .unwrap_or(false);
    if !is_registered && !spec.works_before_registration {
        return vec![Message::reply(
            ember_proto::Response::ERR_NOTREGISTERED,
            "*",
            vec!["You have not registered".to_string()],
        )];
    }

    if spec.access == Access::Operator {
        let is_oper = server
            .store
            .find_user_by_uid(uid)
            .map(|u| u.is_oper())
            .unwrap_or(false);
        if !is_oper {
            return vec![Message::reply(
                ember_proto::Response::ERR_NOPRIVILEGES,
                nick_or_star(server, uid),
                vec!["Permission Denied- You're not an IRC operator".to_string()],
            )];
        }
    }

    let mut params = fold_params(message.params, spec.max_params);
    if !spec.allow_empty_last_param && params.last().is_some_and(String::is_empty) {
        params.pop();
    }
    if params.len() < spec.min_params {
        return vec![Message::reply(
            ember_proto::Response::ERR_NEEDMOREPARAMS,
            nick_or_star(server, uid),
            vec![spec.name.to_string(), "Not enough parameters".to_string()],
        )];
    }

    let mut out = Vec::new();

    if !from_loop_call {
        server.events.fire(&EventKind::PreCommand {
            uid: uid.clone(),
            command: spec.name.to_string(),
        });
    }

    if let Some(idx) = spec.loop_call_index {
        out.extend(run_loop_call(server, spec, uid, &params, idx));
    } else {
        out.extend(run_single(server, spec, uid, &params));
    }

    if !from_loop_call {
        server.events.fire(&EventKind::PostCommand {
            uid: uid.clone(),
            command: spec.name.to_string(),
        });
    }

    out
}

fn run_single(server: &mut Server, spec: &CommandSpec, uid: &Uid, params: &[String]) -> Vec<Message> {
    match (spec.handler)(server, uid, params) {
        Ok(messages) => {
            if let Some(user) = server.store.find_user_by_uid_mut(uid) {
                user.debit_penalty(spec.penalty_ms);
            }
            messages
        }
        Err(err) => vec![Message::reply(
            err.to_irc_reply(),
            nick_or_star(server, uid),
            vec![err.to_string()],
        )],
    }
}

/// Iterate a comma-separated list at `list_index`, invoking the handler
/// once per unique token. A paired list (e.g.
/// JOIN's keys) is zipped in, padded with empty strings if shorter.
fn run_loop_call(
    server: &mut Server,
    spec: &CommandSpec,
    uid: &Uid,
    params: &[String],
    list_index: usize,
) -> Vec<Message> {
    let Some(list_param) = params.get(list_index) else {
        return run_single(server, spec, uid, params);
    };

    let fold = |s: &str| server.store.fold(s);
    let mut seen = std::collections::HashSet::new();
    let tokens: Vec<&str> = list_param
        .split(',')
        .filter(|t| seen.insert(fold(t)))
        .collect();

    let paired: Vec<&str> = spec
        .loop_call_paired_index
        .and_then(|i| params.get(i))
        .map(|s| s.split(',').collect())
        .unwrap_or_default();

    let mut out = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let mut call_params = params.to_vec();
        call_params[list_index] = token.to_string();
        if let Some(paired_index) = spec.loop_call_paired_index {
            let value = paired.get(i).copied().unwrap_or("").to_string();
            // The paired list may be absent entirely (JOIN without keys);
            // pad the call out to it.
            while call_params.len() <= paired_index {
                call_params.push(String::new());
            }
            call_params[paired_index] = value;
        }
        out.extend(run_single(server, spec, uid, &call_params));
    }
    out
}

/// Fold extra positional tokens into the last parameter when `max_params`
/// caps positional consumption, matching a `:trailing`-style collapse for
/// commands whose wire params already exceed `max_params`.
fn fold_params(mut params: Vec<String>, max_params: usize) -> Vec<String> {
    if max_params == 0 || params.len() <= max_params {
        return params;
    }
    let tail = params.split_off(max_params - 1).join(" ");
    params.push(tail);
    params
}

fn nick_or_star(server: &Server, uid: &Uid) -> String {
    server
        .store
        .find_user_by_uid(uid)
        .map(|u| if u.nick.is_empty() { "*".to_string() } else { u.nick.clone() })
        .unwrap_or_else(|| "*".to_string())
}
