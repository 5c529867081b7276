//! Channel operation handlers: JOIN, PART, NAMES, TOPIC, KICK, INVITE.
//!
//! JOIN implements the full `attempt_join` sequence: channel-count cap,
//! name truncation, hook-gated key/invite/limit/ban checks, creation with
//! default modes, then hooks-first / topic / NAMES reply ordering.

use std::collections::HashSet;

use ember_proto::chan::is_valid_channel;
use ember_proto::mode::PrefixRank;
use ember_proto::util::truncate_utf8_safe;
use ember_proto::{Message, Response};
use tracing::{debug, info};

use super::{actor, actor_nick, actor_prefix, secure_eq, send_to, sourced, unix_now};
use crate::dispatch::{Access, CommandSpec, HandlerResult, Registry};
use crate::error::HandlerError;
use crate::events::{EventKind, Verdict};
use crate::reply::NumericListBuilder;
use crate::server::Server;
use crate::store::Uid;

/// Register JOIN/PART/NAMES/TOPIC/KICK/INVITE.
pub fn register(registry: &mut Registry) {
    registry.register(CommandSpec {
        name: "JOIN",
        min_params: 1,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: Some(0),
        loop_call_paired_index: Some(1),
        handler: handle_join,
    });
    registry.register(CommandSpec {
        name: "PART",
        min_params: 1,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: Some(0),
        loop_call_paired_index: None,
        handler: handle_part,
    });
    registry.register(CommandSpec {
        name: "NAMES",
        min_params: 0,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: Some(0),
        loop_call_paired_index: None,
        handler: handle_names,
    });
    registry.register(CommandSpec {
        name: "TOPIC",
        min_params: 1,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: true,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_topic,
    });
    registry.register(CommandSpec {
        name: "KICK",
        min_params: 2,
        max_params: 3,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: Some(1),
        loop_call_paired_index: None,
        handler: handle_kick,
    });
    registry.register(CommandSpec {
        name: "INVITE",
        min_params: 2,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_invite,
    });
}

fn handle_join(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let key = params.get(1).cloned().unwrap_or_default();

    // `JOIN 0` parts every channel, oldest-first semantics don't matter
    // since each part is independent.
    if params[0] == "0" {
        let channels: Vec<String> = actor(server, uid)?.channels.iter().cloned().collect();
        let mut out = Vec::new();
        for folded in channels {
            out.extend(part_channel(server, uid, &folded, None)?);
        }
        return Ok(out);
    }

    let config = server.config();
    let nick = actor_nick(server, uid);
    let name = truncate_utf8_safe(&params[0], config.limits.chan_max).to_string();

    if !is_valid_channel(&name, "#", config.limits.chan_max) {
        return Ok(vec![Message::reply(
            Response::ERR_BADCHANMASK,
            nick,
            vec![name, "Bad Channel Mask".to_string()],
        )]);
    }

    // Channel-count cap, possibly raised by the oper account.
    let user = actor(server, uid)?;
    let cap = user
        .oper_name
        .as_ref()
        .and_then(|name| config.operators.iter().find(|op| &op.name == name))
        .and_then(|op| op.maxchans)
        .unwrap_or(config.limits.max_channels);
    if user.channels.len() >= cap {
        return Ok(vec![Message::reply(
            Response::ERR_TOOMANYCHANNELS,
            nick,
            vec![name, "You have joined too many channels".to_string()],
        )]);
    }

    let folded = server.store.fold(&name);
    let exists = server.store.find_channel(&folded).is_some();

    if exists {
        if server
            .store
            .find_channel(&folded)
            .is_some_and(|c| c.has_member(uid))
        {
            return Ok(Vec::new());
        }
        if let Some(denial) = check_join_gates(server, uid, &folded, &name, &key, &nick) {
            return Ok(vec![denial]);
        }
    } else {
        let verdict = server.events.fire(&EventKind::PreJoin {
            uid: uid.clone(),
            channel: name.clone(),
        });
        if verdict == Verdict::Deny {
            // The hook is expected to have messaged the user already.
            return Ok(Vec::new());
        }
        let mut channel = crate::channel::Channel::new(name.clone(), unix_now());
        for letter in config.channels.default_modes.chars() {
            if ember_proto::find_channel_mode(letter)
                .is_some_and(|s| s.shape == ember_proto::ModeShape::NoParam)
            {
                channel.flags.insert(letter);
            }
        }
        server.store.insert_channel(channel);
        info!(channel = %name, by = %nick, "channel created");
    }

    // Insert the membership; the creator gets op.
    let folded_nick = server.store.fold(&nick);
    if let Some(channel) = server.store.find_channel_mut(&folded) {
        let membership = channel.join(uid.clone());
        if !exists {
            membership.grant('o');
        }
        channel.invites.remove(&folded_nick);
    }
    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.channels.insert(folded.clone());
    }

    // Broadcast the join to everyone already there; the joiner gets the
    // echo as the first reply line.
    let prefix = actor_prefix(server, uid)?;
    let join_msg = sourced(prefix, "JOIN", vec![name.clone()]);
    if let Some(channel) = server.store.find_channel(&folded) {
        let except: HashSet<Uid> = [uid.clone()].into();
        channel.broadcast(&server.store, &join_msg, 0, &except);
    }

    // Hooks first, then topic, then NAMES.
    server.events.fire(&EventKind::PostJoin {
        uid: uid.clone(),
        channel: name.clone(),
    });

    let mut out = vec![join_msg];
    out.extend(topic_numerics(server, &nick, &folded, false));
    out.extend(names_numerics(server, uid, &nick, &folded));
    Ok(out)
}

/// Steps 4 of `attempt_join`: key, invite-only, limit, and ban, each
/// gated by its hook. Returns the denial numeric, or `None` to admit.
fn check_join_gates(
    server: &Server,
    uid: &Uid,
    folded: &str,
    name: &str,
    key: &str,
    nick: &str,
) -> Option<Message> {
    let channel = server.store.find_channel(folded)?;
    let user = server.store.find_user_by_uid(uid)?;
    let folded_nick = server.store.fold(nick);

    if let Some(required) = &channel.key {
        match server.events.fire(&EventKind::CheckKey {
            uid: uid.clone(),
            channel: name.to_string(),
        }) {
            Verdict::Allow => {}
            Verdict::Deny => {
                return Some(bad_key(nick, name));
            }
            Verdict::Passthru => {
                if !secure_eq(required, key) {
                    return Some(bad_key(nick, name));
                }
            }
        }
    }

    if channel.flags.contains(&'i') {
        match server.events.fire(&EventKind::CheckInvite {
            uid: uid.clone(),
            channel: name.to_string(),
        }) {
            Verdict::Allow => {}
            Verdict::Deny => return Some(invite_only(nick, name)),
            Verdict::Passthru => {
                let invited = channel.invites.contains_key(&folded_nick);
                let invexed = channel
                    .invex
                    .iter()
                    .any(|e| crate::channel::ban_matches(&e.mask, user, server.store.casemap()));
                if !invited && !invexed {
                    return Some(invite_only(nick, name));
                }
            }
        }
    }

    if let Some(limit) = channel.limit {
        match server.events.fire(&EventKind::CheckLimit {
            uid: uid.clone(),
            channel: name.to_string(),
        }) {
            Verdict::Allow => {}
            Verdict::Deny => return Some(channel_full(nick, name)),
            Verdict::Passthru => {
                if channel.members.len() >= limit as usize {
                    return Some(channel_full(nick, name));
                }
            }
        }
    }

    match server.events.fire(&EventKind::CheckBan {
        uid: uid.clone(),
        channel: name.to_string(),
    }) {
        Verdict::Allow => {}
        Verdict::Deny => return Some(banned(nick, name)),
        Verdict::Passthru => {
            if channel.is_banned(user, server.store.casemap()) {
                return Some(banned(nick, name));
            }
        }
    }

    None
}

fn bad_key(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_BADCHANNELKEY,
        nick,
        vec![
            name.to_string(),
            "Cannot join channel (incorrect channel key)".to_string(),
        ],
    )
}

fn invite_only(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_INVITEONLYCHAN,
        nick,
        vec![
            name.to_string(),
            "Cannot join channel (invite only)".to_string(),
        ],
    )
}

fn channel_full(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_CHANNELISFULL,
        nick,
        vec![
            name.to_string(),
            "Cannot join channel (channel is full)".to_string(),
        ],
    )
}

fn banned(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_BANNEDFROMCHAN,
        nick,
        vec![
            name.to_string(),
            "Cannot join channel (you're banned)".to_string(),
        ],
    )
}

fn handle_part(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let folded = server.store.fold(&params[0]);
    part_channel(server, uid, &folded, params.get(1).map(String::as_str))
}

/// The shared PART path, also used by `JOIN 0`.
fn part_channel(
    server: &mut Server,
    uid: &Uid,
    folded: &str,
    reason: Option<&str>,
) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let Some(channel) = server.store.find_channel(folded) else {
        return Ok(vec![no_such_channel(&nick, folded)]);
    };
    let name = channel.name.clone();
    if !channel.has_member(uid) {
        return Ok(vec![not_on_channel(&nick, &name)]);
    }

    let verdict = server.events.fire(&EventKind::PrePart {
        uid: uid.clone(),
        channel: name.clone(),
    });
    if verdict == Verdict::Deny {
        return Ok(Vec::new());
    }

    let config = server.config();
    let reason = reason.filter(|r| !r.is_empty()).map(|r| {
        format!(
            "{}{}{}",
            config.channels.part_prefix.as_deref().unwrap_or(""),
            r,
            config.channels.part_suffix.as_deref().unwrap_or(""),
        )
    });

    let prefix = actor_prefix(server, uid)?;
    let mut part_params = vec![name.clone()];
    if let Some(r) = &reason {
        part_params.push(r.clone());
    }
    let part_msg = sourced(prefix, "PART", part_params);
    if let Some(channel) = server.store.find_channel(folded) {
        let except: HashSet<Uid> = [uid.clone()].into();
        channel.broadcast(&server.store, &part_msg, 0, &except);
    }

    if let Some(channel) = server.store.find_channel_mut(folded) {
        channel.remove_member(uid);
    }
    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.channels.remove(folded);
    }
    server.events.fire(&EventKind::PostPart {
        uid: uid.clone(),
        channel: name.clone(),
    });
    check_destroy(server, folded);
    Ok(vec![part_msg])
}

fn handle_names(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    match params.first() {
        Some(target) => {
            let folded = server.store.fold(target);
            Ok(names_numerics(server, uid, &nick, &folded))
        }
        None => {
            // Without a target: every channel visible to the caller.
            let visible: Vec<String> = server
                .store
                .channels()
                .filter(|c| !c.flags.contains(&'s') || c.has_member(uid))
                .map(|c| server.store.fold(&c.name))
                .collect();
            let mut out = Vec::new();
            for folded in visible {
                out.extend(names_numerics(server, uid, &nick, &folded));
            }
            Ok(out)
        }
    }
}

/// 353/366 for one channel. Non-members don't see invisible (+i) users
/// and get nothing at all for secret channels.
pub(crate) fn names_numerics(
    server: &Server,
    uid: &Uid,
    nick: &str,
    folded: &str,
) -> Vec<Message> {
    let max_line = server.config().limits.max_line_length;
    let Some(channel) = server.store.find_channel(folded) else {
        return vec![Message::reply(
            Response::ERR_NOSUCHCHANNEL,
            nick,
            vec![folded.to_string(), "No such channel".to_string()],
        )];
    };
    let is_member = channel.has_member(uid);
    if channel.flags.contains(&'s') && !is_member {
        return vec![end_of_names(nick, &channel.name)];
    }

    let symbol = if channel.flags.contains(&'s') {
        "@"
    } else if channel.flags.contains(&'p') {
        "*"
    } else {
        "="
    };

    let mut builder = NumericListBuilder::new(
        Response::RPL_NAMREPLY,
        nick,
        vec![symbol.to_string(), channel.name.clone()],
        " ",
        max_line,
    );
    for (member_uid, membership) in &channel.members {
        let Some(member) = server.store.find_user_by_uid(member_uid) else {
            debug_assert!(false, "member map holds unknown uid {member_uid}");
            tracing::error!(
                invariant = "member-map-uid",
                uid = %member_uid,
                channel = %channel.name,
                "member map entry has no backing user"
            );
            continue;
        };
        if !is_member && member.modes.contains(&'i') {
            continue;
        }
        match membership.status_sigil() {
            Some(sigil) => builder.push(format!("{sigil}{}", member.nick)),
            None => builder.push(member.nick.clone()),
        }
    }
    let mut out = builder.build();
    out.push(end_of_names(nick, &channel.name));
    out
}

fn end_of_names(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::RPL_ENDOFNAMES,
        nick,
        vec![name.to_string(), "End of /NAMES list".to_string()],
    )
}

fn handle_topic(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let folded = server.store.fold(&params[0]);
    let Some(channel) = server.store.find_channel(&folded) else {
        return Ok(vec![no_such_channel(&nick, &params[0])]);
    };
    let name = channel.name.clone();
    let is_member = channel.has_member(uid);

    if params.len() < 2 {
        // View: members always; non-members only for non-secret channels.
        if !is_member && channel.flags.contains(&'s') {
            return Ok(vec![not_on_channel(&nick, &name)]);
        }
        return Ok(topic_numerics(server, &nick, &folded, true));
    }

    if !is_member {
        return Ok(vec![not_on_channel(&nick, &name)]);
    }
    let rank = channel
        .members
        .get(uid)
        .map(|m| m.highest_rank())
        .unwrap_or(0);
    if channel.flags.contains(&'t') && rank < PrefixRank::HALFOP.0 {
        return Ok(vec![chanop_needed(&nick, &name)]);
    }

    let config = server.config();
    let text = truncate_utf8_safe(&params[1], config.limits.topic_max).to_string();
    let setter = actor(server, uid)?.hostmask();
    let prefix = actor_prefix(server, uid)?;

    if let Some(channel) = server.store.find_channel_mut(&folded) {
        channel.topic = if text.is_empty() {
            None
        } else {
            Some(crate::channel::Topic {
                text: text.clone(),
                setter,
                set_time: unix_now(),
            })
        };
    }

    let topic_msg = sourced(prefix, "TOPIC", vec![name, text]);
    if let Some(channel) = server.store.find_channel(&folded) {
        let except: HashSet<Uid> = [uid.clone()].into();
        channel.broadcast(&server.store, &topic_msg, 0, &except);
    }
    Ok(vec![topic_msg])
}

/// 332/333 if a topic is set; 331 only when explicitly queried.
pub(crate) fn topic_numerics(
    server: &Server,
    nick: &str,
    folded: &str,
    send_no_topic: bool,
) -> Vec<Message> {
    let Some(channel) = server.store.find_channel(folded) else {
        return Vec::new();
    };
    match &channel.topic {
        Some(topic) => vec![
            Message::reply(
                Response::RPL_TOPIC,
                nick,
                vec![channel.name.clone(), topic.text.clone()],
            ),
            Message::reply(
                Response::RPL_TOPICWHOTIME,
                nick,
                vec![
                    channel.name.clone(),
                    topic.setter.clone(),
                    topic.set_time.to_string(),
                ],
            ),
        ],
        None if send_no_topic => vec![Message::reply(
            Response::RPL_NOTOPIC,
            nick,
            vec![channel.name.clone(), "No topic is set".to_string()],
        )],
        None => Vec::new(),
    }
}

fn handle_kick(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let folded = server.store.fold(&params[0]);
    let target_nick = params[1].clone();
    let reason = params.get(2).cloned().unwrap_or_else(|| nick.clone());

    let Some(channel) = server.store.find_channel(&folded) else {
        return Ok(vec![no_such_channel(&nick, &params[0])]);
    };
    let name = channel.name.clone();
    if !channel.has_member(uid) {
        return Ok(vec![not_on_channel(&nick, &name)]);
    }

    let Some(target) = server.store.find_user_by_nick(&target_nick) else {
        return Ok(vec![Message::reply(
            Response::ERR_NOSUCHNICK,
            nick,
            vec![target_nick, "No such nick".to_string()],
        )]);
    };
    let target_uid = target.uid.clone();
    let target_name = target.nick.clone();

    let channel = server
        .store
        .find_channel(&folded)
        .ok_or_else(|| HandlerError::Internal(format!("channel {folded} vanished mid-kick")))?;
    let Some(target_membership) = channel.members.get(&target_uid) else {
        return Ok(vec![Message::reply(
            Response::ERR_USERNOTINCHANNEL,
            nick,
            vec![
                target_name,
                name,
                "They aren't on that channel".to_string(),
            ],
        )]);
    };

    // Rank gate: at least halfop, and never kick upward. Opers with the
    // channel-override privilege bypass.
    let source_rank = channel.members.get(uid).map(|m| m.highest_rank()).unwrap_or(0);
    let target_rank = target_membership.highest_rank();
    let is_oper = actor(server, uid)?.is_oper();
    if !is_oper && (source_rank < PrefixRank::HALFOP.0 || source_rank < target_rank) {
        return Ok(vec![chanop_needed(&nick, &name)]);
    }

    let prefix = actor_prefix(server, uid)?;
    let kick_msg = sourced(
        prefix,
        "KICK",
        vec![name.clone(), target_name.clone(), reason],
    );
    if let Some(channel) = server.store.find_channel(&folded) {
        let except: HashSet<Uid> = [uid.clone()].into();
        channel.broadcast(&server.store, &kick_msg, 0, &except);
    }

    if let Some(channel) = server.store.find_channel_mut(&folded) {
        channel.remove_member(&target_uid);
    }
    if let Some(user) = server.store.find_user_by_uid_mut(&target_uid) {
        user.channels.remove(&folded);
    }
    debug!(channel = %name, target = %target_name, by = %nick, "member kicked");
    check_destroy(server, &folded);
    Ok(vec![kick_msg])
}

fn handle_invite(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let target_nick = params[0].clone();
    let folded = server.store.fold(&params[1]);

    let Some(target) = server.store.find_user_by_nick(&target_nick) else {
        return Ok(vec![Message::reply(
            Response::ERR_NOSUCHNICK,
            nick,
            vec![target_nick, "No such nick".to_string()],
        )]);
    };
    let target_uid = target.uid.clone();
    let target_name = target.nick.clone();
    let target_away = target.away.clone();

    let Some(channel) = server.store.find_channel(&folded) else {
        return Ok(vec![no_such_channel(&nick, &params[1])]);
    };
    let name = channel.name.clone();
    if !channel.has_member(uid) {
        return Ok(vec![not_on_channel(&nick, &name)]);
    }
    if channel.has_member(&target_uid) {
        return Ok(vec![Message::reply(
            Response::ERR_USERONCHANNEL,
            nick,
            vec![
                target_name,
                name,
                "is already on channel".to_string(),
            ],
        )]);
    }
    let rank = channel.members.get(uid).map(|m| m.highest_rank()).unwrap_or(0);
    if channel.flags.contains(&'i') && rank < PrefixRank::HALFOP.0 {
        return Ok(vec![chanop_needed(&nick, &name)]);
    }

    let folded_target = server.store.fold(&target_name);
    if let Some(channel) = server.store.find_channel_mut(&folded) {
        channel.invites.insert(folded_target, unix_now());
    }

    let prefix = actor_prefix(server, uid)?;
    let invite_msg = sourced(prefix, "INVITE", vec![target_name.clone(), name.clone()]);
    send_to(server, &target_uid, &invite_msg);

    let mut out = vec![Message::reply(
        Response::RPL_INVITING,
        nick.clone(),
        vec![target_name.clone(), name],
    )];
    if let Some(away) = target_away {
        out.push(Message::reply(
            Response::RPL_AWAY,
            nick,
            vec![target_name, away],
        ));
    }
    Ok(out)
}

/// Destroy the channel if it has just emptied and no hook defers it,
/// in the same event tick that emptied it.
pub(crate) fn check_destroy(server: &mut Server, folded: &str) {
    let Some(channel) = server.store.find_channel(folded) else {
        return;
    };
    if !channel.is_empty() {
        return;
    }
    let name = channel.name.clone();
    let verdict = server.events.fire(&EventKind::ChannelPreDelete {
        channel: name.clone(),
    });
    if verdict == Verdict::Deny {
        debug!(channel = %name, "empty-channel destruction deferred by hook");
        return;
    }
    server.store.remove_channel(folded);
    server.events.fire(&EventKind::ChannelDelete { channel: name.clone() });
    info!(channel = %name, "channel destroyed");
}

fn no_such_channel(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_NOSUCHCHANNEL,
        nick,
        vec![name.to_string(), "No such channel".to_string()],
    )
}

fn not_on_channel(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_NOTONCHANNEL,
        nick,
        vec![name.to_string(), "You're not on that channel".to_string()],
    )
}

fn chanop_needed(nick: &str, name: &str) -> Message {
    Message::reply(
        Response::ERR_CHANOPRIVSNEEDED,
        nick,
        vec![
            name.to_string(),
            "You're not a channel operator".to_string(),
        ],
    )
}
