//! The MODE command, over both targets: channel modes (query, list-mode
//! queries, and change lists) and user modes.

use std::collections::HashMap;
use std::collections::HashSet;

use ember_proto::mode::{parse_mode_changes, ModeShape};
use ember_proto::{find_user_mode, Message, Response};
use tracing::debug;

use super::{actor, actor_nick, actor_prefix, sourced, unix_now};
use crate::dispatch::{Access, CommandSpec, HandlerResult, Registry};
use crate::events::{EventKind, Verdict};
use crate::mode::{apply_channel_changes, channel_mode_lookup, fold_mode_line, ModeLimits};
use crate::server::Server;
use crate::store::Uid;

/// Register MODE.
pub fn register(registry: &mut Registry) {
    registry.register(CommandSpec {
        name: "MODE",
        min_params: 1,
        // No folding: a change list carries a variable parameter tail.
        max_params: 0,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_mode,
    });
}

fn handle_mode(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    if params[0].starts_with('#') {
        channel_mode(server, uid, params)
    } else {
        user_mode(server, uid, params)
    }
}

fn channel_mode(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let folded = server.store.fold(&params[0]);
    let Some(channel) = server.store.find_channel(&folded) else {
        return Ok(vec![Message::reply(
            Response::ERR_NOSUCHCHANNEL,
            nick,
            vec![params[0].clone(), "No such channel".to_string()],
        )]);
    };
    let name = channel.name.clone();
    let is_member = channel.has_member(uid);

    // Plain query: 324 + 329.
    if params.len() == 1 {
        return Ok(mode_query(server, &nick, &folded, is_member));
    }

    let modestring = params[1].as_str();

    // A bare list-mode letter queries the list instead of changing it.
    if let Some(list_letter) = bare_list_query(modestring, params.len()) {
        return Ok(list_query(server, &nick, &folded, list_letter));
    }

    let verdict = server.events.fire(&EventKind::PreMode {
        uid: uid.clone(),
        target: name.clone(),
    });
    if verdict == Verdict::Deny {
        return Ok(Vec::new());
    }

    // Parse first so prefix-mode nick parameters can be mapped onto UIDs
    // before the apply step (memberships are keyed by UID).
    let outcome = parse_mode_changes(modestring, &params[2..], channel_mode_lookup);
    let mut out = Vec::new();
    for letter in &outcome.unknown {
        out.push(Message::reply(
            Response::ERR_UNKNOWNMODE,
            nick.clone(),
            vec![letter.to_string(), "is unknown mode char to me".to_string()],
        ));
    }

    let mut uid_to_nick: HashMap<String, String> = HashMap::new();
    let mut changes = Vec::new();
    for mut change in outcome.changes {
        let is_prefix = channel_mode_lookup(change.letter)
            .is_some_and(|s| s.shape == ModeShape::Prefix);
        if is_prefix {
            let Some(target_nick) = change.param.as_deref() else {
                continue;
            };
            let Some(target) = server.store.find_user_by_nick(target_nick) else {
                out.push(Message::reply(
                    Response::ERR_NOSUCHNICK,
                    nick.clone(),
                    vec![target_nick.to_string(), "No such nick".to_string()],
                ));
                continue;
            };
            uid_to_nick.insert(target.uid.0.clone(), target.nick.clone());
            change.param = Some(target.uid.0.clone());
        }
        changes.push(change);
    }

    let (source_rank, source_hostmask) = {
        let user = actor(server, uid)?;
        let member_rank = server
            .store
            .find_channel(&folded)
            .and_then(|c| c.members.get(uid))
            .map(|m| m.highest_rank())
            .unwrap_or(0);
        // Opers carry the override privilege: treat them as outranking
        // every prefix.
        let rank = if user.is_oper() {
            u8::MAX
        } else {
            member_rank
        };
        (rank, user.hostmask())
    };

    let config = server.config();
    let result = {
        let Some(channel) = server.store.find_channel_mut(&folded) else {
            return Ok(out);
        };
        apply_channel_changes(
            channel,
            changes,
            &source_hostmask,
            source_rank,
            uid,
            ModeLimits {
                maxlist: config.limits.maxlist,
                key_max: config.limits.key_max,
            },
            unix_now(),
        )
    };

    for code in result.denials {
        out.push(denial_reply(code, &nick, &name));
    }

    if !result.applied.is_empty() {
        let prefix = actor_prefix(server, uid)?;
        for (modestring, line_params) in
            fold_mode_line(&result.applied, config.limits.max_modes_per_line)
        {
            let mut msg_params = vec![name.clone(), modestring];
            msg_params.extend(
                line_params
                    .into_iter()
                    .map(|p| uid_to_nick.get(&p).cloned().unwrap_or(p)),
            );
            let mode_msg = sourced(prefix.clone(), "MODE", msg_params);
            if let Some(channel) = server.store.find_channel(&folded) {
                let except: HashSet<Uid> = [uid.clone()].into();
                channel.broadcast(&server.store, &mode_msg, 0, &except);
            }
            out.push(mode_msg);
        }
        debug!(channel = %name, by = %nick, "channel modes changed");
        server.events.fire(&EventKind::PostMode {
            uid: uid.clone(),
            target: name,
        });
    }

    Ok(out)
}

/// 324/329 for a plain `MODE #channel` query. A secret-flagged parameter
/// value (the key) renders as `<key>` to non-members.
fn mode_query(server: &Server, nick: &str, folded: &str, is_member: bool) -> Vec<Message> {
    let Some(channel) = server.store.find_channel(folded) else {
        return Vec::new();
    };
    let mut letters: Vec<char> = channel.flags.iter().copied().collect();
    letters.sort_unstable();
    let mut modestring: String = "+".chars().chain(letters).collect();
    let mut mode_params = Vec::new();
    if channel.key.is_some() {
        modestring.push('k');
        let rendered = if is_member {
            channel.key.clone().unwrap_or_default()
        } else {
            "<key>".to_string()
        };
        mode_params.push(rendered);
    }
    if let Some(limit) = channel.limit {
        modestring.push('l');
        mode_params.push(limit.to_string());
    }

    let mut params = vec![channel.name.clone(), modestring];
    params.extend(mode_params);
    vec![
        Message::reply(Response::RPL_CHANNELMODEIS, nick, params),
        Message::reply(
            Response::RPL_CREATIONTIME,
            nick,
            vec![channel.name.clone(), channel.created.to_string()],
        ),
    ]
}

/// `MODE #c b` (optionally signed, no mask parameter) is a list query.
fn bare_list_query(modestring: &str, param_count: usize) -> Option<char> {
    if param_count > 2 {
        return None;
    }
    let stripped = modestring.trim_start_matches('+');
    let mut chars = stripped.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    matches!(letter, 'b' | 'e' | 'I').then_some(letter)
}

fn list_query(server: &Server, nick: &str, folded: &str, letter: char) -> Vec<Message> {
    let Some(channel) = server.store.find_channel(folded) else {
        return Vec::new();
    };
    let (entries, item, end, end_text) = match letter {
        'b' => (
            &channel.bans,
            Response::RPL_BANLIST,
            Response::RPL_ENDOFBANLIST,
            "End of channel ban list",
        ),
        'e' => (
            &channel.excepts,
            Response::RPL_EXCEPTLIST,
            Response::RPL_ENDOFEXCEPTLIST,
            "End of channel exception list",
        ),
        _ => (
            &channel.invex,
            Response::RPL_INVITELIST,
            Response::RPL_ENDOFINVITELIST,
            "End of channel invite exception list",
        ),
    };
    let mut out: Vec<Message> = entries
        .iter()
        .map(|entry| {
            Message::reply(
                item,
                nick,
                vec![
                    channel.name.clone(),
                    entry.mask.clone(),
                    entry.set_by.clone(),
                    entry.set_at.to_string(),
                ],
            )
        })
        .collect();
    out.push(Message::reply(
        end,
        nick,
        vec![channel.name.clone(), end_text.to_string()],
    ));
    out
}

/// Render a denial code with the channel context the mode engine lacks.
fn denial_reply(code: Response, nick: &str, name: &str) -> Message {
    let text = match code {
        Response::ERR_CHANOPRIVSNEEDED => "You're not a channel operator",
        Response::ERR_KEYSET => "Channel key already set",
        Response::ERR_USERNOTINCHANNEL => "They aren't on that channel",
        _ => "Cannot change mode",
    };
    Message::reply(code, nick, vec![name.to_string(), text.to_string()])
}

fn user_mode(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let user = actor(server, uid)?;
    let nick = user.nick.clone();
    if !server.store.casemap().eq(&params[0], &nick) {
        let code = if server.store.find_user_by_nick(&params[0]).is_some() {
            Response::ERR_USERSDONTMATCH
        } else {
            Response::ERR_NOSUCHNICK
        };
        let text = match code {
            Response::ERR_USERSDONTMATCH => "Can't change mode for other users",
            _ => "No such nick",
        };
        return Ok(vec![Message::reply(
            code,
            nick,
            vec![params[0].clone(), text.to_string()],
        )]);
    }

    if params.len() == 1 {
        let mut letters: Vec<char> = user.modes.iter().copied().collect();
        letters.sort_unstable();
        let modestring: String = "+".chars().chain(letters).collect();
        return Ok(vec![Message::reply(
            Response::RPL_UMODEIS,
            nick,
            vec![modestring],
        )]);
    }

    let outcome = parse_mode_changes(&params[1], &[], find_user_mode);
    let mut out = Vec::new();
    if !outcome.unknown.is_empty() {
        out.push(Message::reply(
            Response::ERR_UMODEUNKNOWNFLAG,
            nick.clone(),
            vec!["Unknown MODE flag".to_string()],
        ));
    }

    let mut applied = Vec::new();
    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        for change in outcome.changes {
            // `+o` is granted by OPER alone; a client may only drop it.
            if change.letter == 'o' && change.add {
                continue;
            }
            let had = user.modes.contains(&change.letter);
            if change.add == had {
                continue;
            }
            if change.add {
                user.modes.insert(change.letter);
            } else {
                user.modes.remove(&change.letter);
                if change.letter == 'o' {
                    user.oper_name = None;
                }
            }
            applied.push(change);
        }
    }

    if !applied.is_empty() {
        let prefix = actor_prefix(server, uid)?;
        for (modestring, _) in fold_mode_line(&applied, usize::MAX) {
            out.push(sourced(
                prefix.clone(),
                "MODE",
                vec![nick.clone(), modestring],
            ));
        }
    }
    Ok(out)
}
