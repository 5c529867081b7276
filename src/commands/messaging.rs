//! PRIVMSG and NOTICE.
//!
//! Both share one delivery path; the difference is that NOTICE never
//! generates error numerics (so automated responders can't loop) and
//! never triggers the away auto-reply.

use std::collections::HashSet;

use ember_proto::mode::PrefixRank;
use ember_proto::{Message, Response, DEFAULT_CHANNEL_MODES};

use super::{actor, actor_nick, actor_prefix, sourced, unix_now};
use crate::dispatch::{Access, CommandSpec, HandlerResult, Registry};
use crate::events::{EventKind, Verdict};
use crate::server::Server;
use crate::store::Uid;

/// Register PRIVMSG/NOTICE.
pub fn register(registry: &mut Registry) {
    registry.register(CommandSpec {
        name: "PRIVMSG",
        min_params: 0,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: Some(0),
        loop_call_paired_index: None,
        handler: |server, uid, params| handle_message(server, uid, params, true),
    });
    registry.register(CommandSpec {
        name: "NOTICE",
        min_params: 0,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: Some(0),
        loop_call_paired_index: None,
        handler: |server, uid, params| handle_message(server, uid, params, false),
    });
}

fn handle_message(
    server: &mut Server,
    uid: &Uid,
    params: &[String],
    is_privmsg: bool,
) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let command = if is_privmsg { "PRIVMSG" } else { "NOTICE" };

    let Some(target) = params.first().filter(|t| !t.is_empty()) else {
        if !is_privmsg {
            return Ok(Vec::new());
        }
        return Ok(vec![Message::reply(
            Response::ERR_NORECIPIENT,
            nick,
            vec![format!("No recipient given ({command})")],
        )]);
    };
    let target = target.clone();

    let Some(text) = params.get(1).filter(|t| !t.is_empty()).cloned() else {
        if !is_privmsg {
            return Ok(Vec::new());
        }
        return Ok(vec![Message::reply(
            Response::ERR_NOTEXTTOSEND,
            nick,
            vec!["No text to send".to_string()],
        )]);
    };

    // PRIVMSG resets the idle clock; NOTICE traditionally doesn't.
    if is_privmsg {
        if let Some(user) = server.store.find_user_by_uid_mut(uid) {
            user.idle_since = unix_now();
        }
    }

    let verdict = server.events.fire(&EventKind::PreMessage {
        uid: uid.clone(),
        target: target.clone(),
    });
    if verdict == Verdict::Deny {
        return Ok(Vec::new());
    }
    let bypass_gates = verdict == Verdict::Allow;

    // `@#chan`-style status targets narrow delivery to a minimum rank.
    let (min_rank, bare_target) = strip_status_prefix(&target);
    let out = if bare_target.starts_with('#') {
        channel_message(
            server, uid, &nick, command, &target, bare_target, &text, min_rank, is_privmsg,
            bypass_gates,
        )?
    } else {
        nick_message(server, uid, &nick, command, bare_target, &text, is_privmsg)?
    };

    server.events.fire(&EventKind::PostMessage {
        uid: uid.clone(),
        target,
    });
    Ok(out)
}

/// Split `@#chan` / `+#chan` into the minimum delivery rank and the bare
/// channel name. Unprefixed targets deliver to everyone (rank 0).
fn strip_status_prefix(target: &str) -> (u8, &str) {
    let mut min_rank = 0u8;
    let mut rest = target;
    while let Some(first) = rest.chars().next() {
        let Some(spec) = DEFAULT_CHANNEL_MODES
            .iter()
            .find(|m| m.prefix_sigil == Some(first))
        else {
            break;
        };
        min_rank = min_rank.max(spec.rank.map(|r| r.0).unwrap_or(0));
        rest = &rest[first.len_utf8()..];
    }
    (min_rank, rest)
}

#[allow(clippy::too_many_arguments)]
fn channel_message(
    server: &mut Server,
    uid: &Uid,
    nick: &str,
    command: &str,
    wire_target: &str,
    bare_target: &str,
    text: &str,
    min_rank: u8,
    is_privmsg: bool,
    bypass_gates: bool,
) -> HandlerResult {
    let folded = server.store.fold(bare_target);
    let Some(channel) = server.store.find_channel(&folded) else {
        if !is_privmsg {
            return Ok(Vec::new());
        }
        return Ok(vec![Message::reply(
            Response::ERR_NOSUCHNICK,
            nick,
            vec![bare_target.to_string(), "No such nick/channel".to_string()],
        )]);
    };

    let is_member = channel.has_member(uid);
    let rank = channel.members.get(uid).map(|m| m.highest_rank()).unwrap_or(0);

    if !bypass_gates {
        let denial = if channel.flags.contains(&'n') && !is_member {
            Some("Cannot send to channel (no external messages)")
        } else if channel.flags.contains(&'m') && rank < PrefixRank::VOICE.0 {
            Some("Cannot send to channel (+m)")
        } else if rank < PrefixRank::VOICE.0 && {
            let user = actor(server, uid)?;
            channel.is_banned(user, server.store.casemap())
        } {
            Some("Cannot send to channel (you're banned)")
        } else {
            None
        };
        if let Some(reason) = denial {
            if !is_privmsg {
                return Ok(Vec::new());
            }
            return Ok(vec![Message::reply(
                Response::ERR_CANNOTSENDTOCHAN,
                nick,
                vec![bare_target.to_string(), reason.to_string()],
            )]);
        }
    }

    let prefix = actor_prefix(server, uid)?;
    let msg = sourced(prefix, command, vec![wire_target.to_string(), text.to_string()]);
    if let Some(channel) = server.store.find_channel(&folded) {
        let except: HashSet<Uid> = [uid.clone()].into();
        channel.broadcast(&server.store, &msg, min_rank, &except);
    }
    Ok(Vec::new())
}

fn nick_message(
    server: &mut Server,
    uid: &Uid,
    nick: &str,
    command: &str,
    target: &str,
    text: &str,
    is_privmsg: bool,
) -> HandlerResult {
    let Some(recipient) = server.store.find_user_by_nick(target) else {
        if !is_privmsg {
            return Ok(Vec::new());
        }
        return Ok(vec![Message::reply(
            Response::ERR_NOSUCHNICK,
            nick,
            vec![target.to_string(), "No such nick/channel".to_string()],
        )]);
    };
    let recipient_uid = recipient.uid.clone();
    let recipient_nick = recipient.nick.clone();
    let away = recipient.away.clone();

    let prefix = actor_prefix(server, uid)?;
    let msg = sourced(
        prefix,
        command,
        vec![recipient_nick.clone(), text.to_string()],
    );
    super::send_to(server, &recipient_uid, &msg);

    let mut out = Vec::new();
    if is_privmsg {
        if let Some(away_text) = away {
            out.push(Message::reply(
                Response::RPL_AWAY,
                nick,
                vec![recipient_nick, away_text],
            ));
        }
    }
    Ok(out)
}
