//! Mode engine mutation layer: access checks, state mutation, and
//! output rendering atop `ember_proto::mode`'s table-driven parser.

use ember_proto::mode::{
    find_channel_mode, parse_mode_changes, ModeChange, ModeShape, PrefixRank,
};

use crate::channel::{BanEntry, Channel};
use crate::store::Uid;

/// Per-letter half-op-or-above default rank required to set list modes
/// when the letter itself (a prefix mode) doesn't supply one.
const HALFOP_RANK: u8 = PrefixRank::HALFOP.0;

/// Outcome of applying one resolved `ModeChange`.
#[derive(Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Change was applied and should be echoed in the output MODE line.
    Applied,
    /// Change was a silent no-op (already set/unset, duplicate mask, ...).
    NoOp,
    /// Change was rejected; caller should emit the given numeric.
    Denied(ember_proto::Response),
}

/// The result of processing a full `MODE` command: the accepted changes
/// (for building the output line) plus any unknown letters seen.
pub struct ModeResult {
    /// Changes actually applied, in order.
    pub applied: Vec<ModeChange>,
    /// Letters not found in the table (`ERR_UNKNOWNMODE` candidates).
    pub unknown: Vec<char>,
    /// Numeric replies produced by denied changes, in order.
    pub denials: Vec<ember_proto::Response>,
}

/// The configured bounds the apply step enforces (from `[limits]`).
#[derive(Clone, Copy, Debug)]
pub struct ModeLimits {
    /// Per-list-mode maximum entry count.
    pub maxlist: usize,
    /// `+k` parameter truncation length.
    pub key_max: usize,
}

/// The channel-mode table lookup, with `k` widened to `ParamAlways`:
/// it's tabled as ParamOnSet (param only while adding), but a `-k` with
/// the wrong parameter must be rejected, which means unset consumes one
/// too. Widened here rather than in the shared table.
pub fn channel_mode_lookup(letter: char) -> Option<ember_proto::ModeSpec> {
    find_channel_mode(letter).map(|mut spec| {
        if letter == 'k' {
            spec.shape = ModeShape::ParamAlways;
        }
        spec
    })
}

/// Parse and apply a channel mode change list in one step.
#[allow(clippy::too_many_arguments)]
pub fn apply_channel_modes(
    channel: &mut Channel,
    modestring: &str,
    params: &[String],
    source_hostmask: &str,
    source_rank: u8,
    source_uid: &Uid,
    limits: ModeLimits,
    now: i64,
) -> ModeResult {
    let outcome = parse_mode_changes(modestring, params, channel_mode_lookup);
    let mut result = apply_channel_changes(
        channel,
        outcome.changes,
        source_hostmask,
        source_rank,
        source_uid,
        limits,
        now,
    );
    result.unknown = outcome.unknown;
    result
}

/// Apply an already-parsed change list (the MODE handler parses first so
/// it can map prefix-mode nick parameters onto UIDs).
///
/// `source_rank` is the acting user's highest held prefix rank (0 if
/// none); `limits` bounds list length and key size.
#[allow(clippy::too_many_arguments)]
pub fn apply_channel_changes(
    channel: &mut Channel,
    changes: Vec<ModeChange>,
    source_hostmask: &str,
    source_rank: u8,
    source_uid: &Uid,
    limits: ModeLimits,
    now: i64,
) -> ModeResult {
    let mut applied = Vec::new();
    let mut denials = Vec::new();

    for change in changes {
        let spec = match find_channel_mode(change.letter) {
            Some(s) => s,
            None => continue,
        };

        let required_rank = match spec.shape {
            ModeShape::Prefix => spec.rank.map(|r| r.0).unwrap_or(HALFOP_RANK),
            ModeShape::List => HALFOP_RANK,
            _ => PrefixRank::OP.0,
        };

        let self_target = spec.shape == ModeShape::Prefix
            && change.param.as_deref() == Some(source_uid.0.as_str());
        // founder/admin can't drop their own status; the shared prefix
        // table defaults self_remove true for every letter, so override it
        // here rather than in the read-only parser.
        let self_remove_allowed = spec.self_remove && !matches!(change.letter, 'q' | 'a');
        let allowed_by_self_remove = self_target && !change.add && self_remove_allowed;

        if source_rank < required_rank && !allowed_by_self_remove {
            denials.push(ember_proto::Response::ERR_CHANOPRIVSNEEDED);
            continue;
        }

        let result = match change.letter {
            'k' => apply_key(channel, change.add, change.param.as_deref(), limits.key_max),
            'l' => apply_limit(channel, change.add, change.param.as_deref()),
            _ => match spec.shape {
                ModeShape::NoParam => apply_flag(channel, change.letter, change.add),
                ModeShape::List => apply_list(
                    channel,
                    change.letter,
                    change.add,
                    change.param.as_deref(),
                    source_hostmask,
                    limits.maxlist,
                    now,
                ),
                ModeShape::Prefix => apply_prefix(channel, &change),
                ModeShape::ParamOnSet | ModeShape::ParamAlways => ApplyOutcome::NoOp,
            },
        };

        match result {
            ApplyOutcome::Applied => applied.push(change),
            ApplyOutcome::NoOp => {}
            ApplyOutcome::Denied(code) => denials.push(code),
        }
    }

    ModeResult {
        applied,
        unknown: Vec::new(),
        denials,
    }
}

fn apply_flag(channel: &mut Channel, letter: char, add: bool) -> ApplyOutcome {
    let was_set = channel.flags.contains(&letter);
    if add == was_set {
        return ApplyOutcome::NoOp;
    }
    if add {
        channel.flags.insert(letter);
    } else {
        channel.flags.remove(&letter);
    }
    ApplyOutcome::Applied
}

/// `+k`/`-k`: no commas, truncated to the key budget, wrong-parameter
/// unset rejected with `ERR_KEYSET`.
fn apply_key(channel: &mut Channel, add: bool, param: Option<&str>, key_max: usize) -> ApplyOutcome {
    if add {
        let Some(key) = param else {
            return ApplyOutcome::NoOp;
        };
        if key.contains(',') {
            return ApplyOutcome::NoOp;
        }
        if channel.key.is_some() {
            return ApplyOutcome::Denied(ember_proto::Response::ERR_KEYSET);
        }
        channel.key = Some(key.chars().take(key_max).collect());
        ApplyOutcome::Applied
    } else {
        match (&channel.key, param) {
            (Some(current), Some(given)) if current == given => {
                channel.key = None;
                ApplyOutcome::Applied
            }
            (Some(_), _) => ApplyOutcome::Denied(ember_proto::Response::ERR_KEYSET),
            (None, _) => ApplyOutcome::NoOp,
        }
    }
}

/// `+l`/`-l`.
fn apply_limit(channel: &mut Channel, add: bool, param: Option<&str>) -> ApplyOutcome {
    if add {
        let Some(n) = param.and_then(|p| p.parse::<u32>().ok()) else {
            return ApplyOutcome::NoOp;
        };
        if channel.limit == Some(n) {
            return ApplyOutcome::NoOp;
        }
        channel.limit = Some(n);
        ApplyOutcome::Applied
    } else {
        if channel.limit.is_none() {
            return ApplyOutcome::NoOp;
        }
        channel.limit = None;
        ApplyOutcome::Applied
    }
}

/// `+b`/`+e`/`+I`: duplicate masks are silent no-ops, list length is
/// capped by `maxlist`.
fn apply_list(
    channel: &mut Channel,
    letter: char,
    add: bool,
    param: Option<&str>,
    set_by: &str,
    maxlist: usize,
    now: i64,
) -> ApplyOutcome {
    let Some(mask) = param else {
        return ApplyOutcome::NoOp;
    };
    let list = match letter {
        'b' => &mut channel.bans,
        'e' => &mut channel.excepts,
        'I' => &mut channel.invex,
        _ => return ApplyOutcome::NoOp,
    };

    if add {
        if list.iter().any(|b| b.mask == mask) {
            return ApplyOutcome::NoOp;
        }
        if list.len() >= maxlist {
            return ApplyOutcome::Denied(ember_proto::Response::ERR_UNKNOWNERROR);
        }
        list.push(BanEntry {
            mask: mask.to_string(),
            set_by: set_by.to_string(),
            set_at: now,
        });
        ApplyOutcome::Applied
    } else {
        let before = list.len();
        list.retain(|b| b.mask != mask);
        if list.len() == before {
            ApplyOutcome::NoOp
        } else {
            ApplyOutcome::Applied
        }
    }
}

/// `+o`/`+h`/`+v`/...: grant or revoke a prefix on a member.
fn apply_prefix(channel: &mut Channel, change: &ModeChange) -> ApplyOutcome {
    let Some(target_uid) = change.param.as_deref() else {
        return ApplyOutcome::NoOp;
    };
    let Some(membership) = channel.members.get_mut(&Uid(target_uid.to_string())) else {
        return ApplyOutcome::Denied(ember_proto::Response::ERR_USERNOTINCHANNEL);
    };
    let had = membership.prefixes.contains(&change.letter);
    if change.add == had {
        return ApplyOutcome::NoOp;
    }
    if change.add {
        membership.grant(change.letter);
    } else {
        membership.revoke(change.letter);
    }
    ApplyOutcome::Applied
}

/// Fold an accepted change list into one or more MODE-line modestrings,
/// each carrying at most `max_per_line` letters. Returns
/// `(modestring, params)` pairs.
pub fn fold_mode_line(changes: &[ModeChange], max_per_line: usize) -> Vec<(String, Vec<String>)> {
    let mut lines = Vec::new();
    for chunk in changes.chunks(max_per_line.max(1)) {
        let mut modestring = String::new();
        let mut params = Vec::new();
        let mut last_add: Option<bool> = None;
        for change in chunk {
            if last_add != Some(change.add) {
                modestring.push(if change.add { '+' } else { '-' });
                last_add = Some(change.add);
            }
            modestring.push(change.letter);
            if let Some(p) = &change.param {
                params.push(p.clone());
            }
        }
        lines.push((modestring, params));
    }
    lines
}
