//! Connection and registration handlers: NICK, USER, PASS, PING, PONG,
//! QUIT, plus the registration transition and the shared quit path the
//! network layer reuses when a socket drops.

use std::collections::HashSet;

use ember_proto::nick::is_valid_nick;
use ember_proto::{
    ChanModesBuilder, IsupportBuilder, Message, Prefix, Response, DEFAULT_CHANNEL_MODES,
    DEFAULT_USER_MODES,
};
use tracing::{debug, info};

use super::{actor, actor_nick, actor_prefix, secure_eq, send_to, sourced};
use crate::channel::Channel;
use crate::dispatch::{Access, CommandSpec, HandlerResult, Registry};
use crate::error::HandlerError;
use crate::events::{EventKind, Verdict};
use crate::server::Server;
use crate::store::{StoreError, Uid};

/// Register NICK/USER/PASS/PING/PONG/QUIT.
pub fn register(registry: &mut Registry) {
    registry.register(CommandSpec {
        name: "NICK",
        min_params: 1,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: true,
        penalty_ms: 0,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_nick,
    });
    registry.register(CommandSpec {
        name: "USER",
        min_params: 4,
        max_params: 4,
        access: Access::Normal,
        works_before_registration: true,
        penalty_ms: 0,
        allow_empty_last_param: true,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_user,
    });
    registry.register(CommandSpec {
        name: "PASS",
        min_params: 1,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: true,
        penalty_ms: 0,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_pass,
    });
    registry.register(CommandSpec {
        name: "PING",
        min_params: 0,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: true,
        penalty_ms: 0,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_ping,
    });
    registry.register(CommandSpec {
        name: "PONG",
        min_params: 0,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: true,
        penalty_ms: 0,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_pong,
    });
    registry.register(CommandSpec {
        name: "QUIT",
        min_params: 0,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: true,
        penalty_ms: 0,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_quit,
    });
}

fn handle_nick(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let new_nick = params[0].clone();
    let config = server.config();

    if !is_valid_nick(&new_nick, config.limits.nick_max) {
        return Ok(vec![Message::reply(
            Response::ERR_ERRONEOUSNICKNAME,
            actor_nick(server, uid),
            vec![new_nick, "Erroneous nickname".to_string()],
        )]);
    }

    if let Some(holder) = server.store.find_user_by_nick(&new_nick) {
        if &holder.uid != uid {
            return Ok(vec![Message::reply(
                Response::ERR_NICKNAMEINUSE,
                actor_nick(server, uid),
                vec![new_nick, "Nickname is already in use".to_string()],
            )]);
        }
    }

    let registered = actor(server, uid)?.is_registered();
    if registered {
        let verdict = server.events.fire(&EventKind::PreNick {
            uid: uid.clone(),
            new_nick: new_nick.clone(),
        });
        if verdict == Verdict::Deny {
            return Ok(Vec::new());
        }
    }

    let old_prefix = actor_prefix(server, uid)?;
    let old_nick = match server.store.rename_user(uid, &new_nick) {
        Ok(old) => old,
        Err(StoreError::NickInUse) => return Err(HandlerError::NickInUse),
        Err(_) => return Err(HandlerError::ErroneousNickname),
    };

    if registered {
        // Neighbors get the broadcast; the actor gets the echo as the
        // handler reply, so exclude them here to avoid a double send.
        let change = sourced(old_prefix, "NICK", vec![new_nick.clone()]);
        for recipient in channel_neighbors(server, uid) {
            send_to(server, &recipient, &change);
        }
        server.events.fire(&EventKind::PostNick {
            uid: uid.clone(),
            old_nick,
        });
        return Ok(vec![change]);
    }

    debug!(uid = %uid, nick = %new_nick, "nick set");
    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.registration.nick_received = true;
    }
    try_complete_registration(server, uid)
}

fn handle_user(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    if actor(server, uid)?.is_registered() {
        return Ok(vec![Message::reply(
            Response::ERR_ALREADYREGISTERED,
            actor_nick(server, uid),
            vec!["You may not reregister".to_string()],
        )]);
    }

    let ident = params[0].clone();
    let real_name = params[3].clone();
    if ident.is_empty() {
        return Err(HandlerError::NeedMoreParams);
    }

    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.ident = ident;
        user.real_name = real_name;
        user.registration.user_received = true;
    }
    try_complete_registration(server, uid)
}

fn handle_pass(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    if actor(server, uid)?.is_registered() {
        return Ok(vec![Message::reply(
            Response::ERR_ALREADYREGISTERED,
            actor_nick(server, uid),
            vec!["You may not reregister".to_string()],
        )]);
    }
    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.pending_pass = Some(params[0].clone());
    }
    Ok(Vec::new())
}

fn handle_ping(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let Some(token) = params.first() else {
        return Ok(vec![Message::reply(
            Response::ERR_NOORIGIN,
            actor_nick(server, uid),
            vec!["No origin specified".to_string()],
        )]);
    };
    let server_name = server.config().server.name.clone();
    Ok(vec![Message {
        tags: None,
        prefix: Some(Prefix::ServerName(server_name.clone())),
        command: "PONG".to_string(),
        params: vec![server_name, token.clone()],
    }])
}

fn handle_pong(_server: &mut Server, _uid: &Uid, _params: &[String]) -> HandlerResult {
    // Any inbound line already counts as liveness for the idle-ping
    // protocol; nothing else to do.
    Ok(Vec::new())
}

fn handle_quit(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let reason = params
        .first()
        .filter(|r| !r.is_empty())
        .map(|r| format!("Quit: {r}"))
        .unwrap_or_else(|| "Client quit".to_string());
    let host = actor(server, uid)?.real_host.clone();
    quit_user(server, uid, &reason);
    Ok(vec![Message {
        tags: None,
        prefix: None,
        command: "ERROR".to_string(),
        params: vec![format!("Closing link: ({host}) [{reason}]")],
    }])
}

/// Tear a session down: fire the quit event, broadcast one `QUIT` to the
/// union of the channels the user was on, drain its memberships, and erase
/// it from the store. Idempotent — a second call (socket error racing an
/// explicit QUIT) is a no-op. Returns whether this call did the teardown.
pub fn quit_user(server: &mut Server, uid: &Uid, reason: &str) -> bool {
    let Some(user) = server.store.find_user_by_uid_mut(uid) else {
        return false;
    };
    if user.quitting {
        return false;
    }
    user.quitting = true;
    let nick = user.nick.clone();
    let prefix = Prefix::new(
        user.nick.clone(),
        user.ident.clone(),
        user.displayed_host.clone(),
    );
    let channels: Vec<String> = user.channels.iter().cloned().collect();

    server.events.fire(&EventKind::UserQuit {
        uid: uid.clone(),
        reason: reason.to_string(),
    });

    let quit_msg = sourced(prefix, "QUIT", vec![reason.to_string()]);
    for recipient in channel_neighbors(server, uid) {
        send_to(server, &recipient, &quit_msg);
    }

    for folded in channels {
        if let Some(channel) = server.store.find_channel_mut(&folded) {
            if channel.remove_member(uid).is_none() {
                debug_assert!(false, "membership back-pointer desync for {uid}");
                tracing::error!(
                    invariant = "membership-backpointer",
                    uid = %uid,
                    channel = %folded,
                    "user listed a channel it was not a member of"
                );
            }
        }
        super::channel::check_destroy(server, &folded);
    }

    server.store.remove_user(uid);
    info!(uid = %uid, nick = %nick, reason = %reason, "client quit");
    true
}

/// The distinct users sharing at least one channel with `uid`, excluding
/// `uid` itself. Used for NICK/QUIT fan-out, which goes to the union of
/// neighbors exactly once regardless of shared-channel count.
fn channel_neighbors(server: &Server, uid: &Uid) -> Vec<Uid> {
    let Some(user) = server.store.find_user_by_uid(uid) else {
        return Vec::new();
    };
    let mut seen: HashSet<Uid> = HashSet::new();
    for folded in &user.channels {
        if let Some(channel) = server.store.find_channel(folded) {
            seen.extend(channel.members.keys().cloned());
        }
    }
    seen.remove(uid);
    seen.into_iter().collect()
}

/// Run the CONNECTED → FULLY_CONNECTED transition if both NICK and USER
/// have landed: connect-password check, `on_user_pre_register` veto,
/// then the welcome burst (001-005 + MOTD).
fn try_complete_registration(server: &mut Server, uid: &Uid) -> HandlerResult {
    let user = actor(server, uid)?;
    if !user.registration.ready_to_register() {
        return Ok(Vec::new());
    }
    let nick = user.nick.clone();
    let pending_pass = user.pending_pass.clone();
    let config = server.config();

    if let Some(expected) = &config.server.connect_password {
        let given = pending_pass.unwrap_or_default();
        if !secure_eq(expected, &given) {
            quit_user(server, uid, "Bad password");
            return Ok(vec![
                Message::reply(
                    Response::ERR_PASSWDMISMATCH,
                    nick,
                    vec!["Password incorrect".to_string()],
                ),
                Message {
                    tags: None,
                    prefix: None,
                    command: "ERROR".to_string(),
                    params: vec!["Closing link: [Bad password]".to_string()],
                },
            ]);
        }
    }

    let verdict = server.events.fire(&EventKind::UserPreRegister { uid: uid.clone() });
    if verdict == Verdict::Deny {
        quit_user(server, uid, "Registration denied");
        return Ok(vec![Message {
            tags: None,
            prefix: None,
            command: "ERROR".to_string(),
            params: vec!["Closing link: [Registration denied]".to_string()],
        }]);
    }

    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.registration.fully_connected = true;
        // Clear the password once it has served its purpose.
        user.pending_pass = None;
    }
    server.events.fire(&EventKind::UserRegister { uid: uid.clone() });
    info!(uid = %uid, nick = %nick, "registration complete");

    Ok(welcome_burst(server, &nick))
}

/// The 001-005 burst plus MOTD.
fn welcome_burst(server: &Server, nick: &str) -> Vec<Message> {
    let config = server.config();
    let version = concat!("emberd-", env!("CARGO_PKG_VERSION"));
    let created = chrono::DateTime::from_timestamp(server.start_time, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let user_modes: String = DEFAULT_USER_MODES.iter().map(|m| m.letter).collect();
    let chan_modes: String = DEFAULT_CHANNEL_MODES.iter().map(|m| m.letter).collect();

    let mut out = vec![
        Message::reply(
            Response::RPL_WELCOME,
            nick,
            vec![format!(
                "Welcome to the {} Network, {nick}",
                config.server.network
            )],
        ),
        Message::reply(
            Response::RPL_YOURHOST,
            nick,
            vec![format!(
                "Your host is {}, running version {version}",
                config.server.name
            )],
        ),
        Message::reply(
            Response::RPL_CREATED,
            nick,
            vec![format!("This server was created {created}")],
        ),
        Message::reply(
            Response::RPL_MYINFO,
            nick,
            vec![
                config.server.name.clone(),
                version.to_string(),
                user_modes,
                chan_modes,
            ],
        ),
    ];

    for tokens in isupport_tokens(server).build_lines(13) {
        let mut params: Vec<String> = tokens.split(' ').map(str::to_string).collect();
        params.push("are supported by this server".to_string());
        out.push(Message::reply(Response::RPL_ISUPPORT, nick, params));
    }

    out.extend(super::misc::motd_numerics(server, nick));
    out
}

/// The 005 token set.
fn isupport_tokens(server: &Server) -> IsupportBuilder {
    let config = server.config();
    let prefix_letters = "qaohv";
    let sigils = Channel::status_prefix_order();
    IsupportBuilder::new()
        .network(&config.server.network)
        .casemapping(server.store.casemap().token())
        .chantypes("#")
        .prefix(&sigils, prefix_letters)
        .chanmodes_typed(
            ChanModesBuilder::new()
                .list_modes("beI")
                .param_always("k")
                .param_set("l")
                .no_param("imnpst"),
        )
        .modes_count(config.limits.max_modes_per_line as u32)
        .max_channels(config.limits.max_channels as u32)
        .max_nick_length(config.limits.nick_max as u32)
        .max_channel_length(config.limits.chan_max as u32)
        .max_topic_length(config.limits.topic_max as u32)
        .max_key_length(config.limits.key_max as u32)
        .max_list("beI", config.limits.maxlist as u32)
        .status_msg(&sigils)
        .excepts(Some('e'))
        .invex(Some('I'))
}
