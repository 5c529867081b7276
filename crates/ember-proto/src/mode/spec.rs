//! Mode letter metadata.
//!
//! A mode handler used to be one enum variant per letter (`ChannelMode::Ban`,
//! `UserMode::Invisible`, ...). Here a letter is described by a small
//! [`ModeSpec`] record; the engine only needs to know a letter's
//! [`ModeShape`] to parse a change list, and its rank/oper-only/self-remove
//! flags to run the access check in C6.

/// Which state a mode letter applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModeKind {
    /// A per-user mode (`+i`, `+o`, ...), set with `MODE <nick> ...`.
    User,
    /// A per-channel mode (`+n`, `+k`, ...), set with `MODE <channel> ...`.
    Channel,
}

/// How a mode letter consumes (or doesn't) a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModeShape {
    /// Plain flag, never takes a parameter (`+i`, `+n`, `+t`).
    NoParam,
    /// Takes a parameter only when being set, not when being unset (`+k`,
    /// `+l` in some implementations; ember uses this for `+k`/`+l`).
    ParamOnSet,
    /// Always takes a parameter, set or unset (no ember default uses this,
    /// reserved for custom handlers).
    ParamAlways,
    /// A list mode: every change (add or remove) takes a mask parameter,
    /// and the handler tracks a set of entries rather than one value
    /// (`+b`, `+e`, `+I`, `+q`-as-quiet-list).
    List,
    /// A prefix mode: every change takes a target-nickname parameter and
    /// has an associated [`PrefixRank`] (`+o`, `+h`, `+v`).
    Prefix,
}

/// Rank of a prefix mode, used for access checks and display ordering.
/// Higher outranks lower; `Founder` is the highest default rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrefixRank(pub u8);

impl PrefixRank {
    /// `+q` founder, the highest default rank.
    pub const FOUNDER: PrefixRank = PrefixRank(50);
    /// `+a` protected/admin.
    pub const ADMIN: PrefixRank = PrefixRank(40);
    /// `+o` operator.
    pub const OP: PrefixRank = PrefixRank(30);
    /// `+h` half-operator.
    pub const HALFOP: PrefixRank = PrefixRank(20);
    /// `+v` voice.
    pub const VOICE: PrefixRank = PrefixRank(10);
}

/// Metadata describing one mode letter.
#[derive(Clone, Copy, Debug)]
pub struct ModeSpec {
    /// The mode letter, e.g. `'o'`.
    pub letter: char,
    /// Symbolic name, e.g. `"op"`.
    pub name: &'static str,
    /// Which state this mode applies to.
    pub kind: ModeKind,
    /// Parameter-consumption shape.
    pub shape: ModeShape,
    /// Rank, for `Prefix` shape only.
    pub rank: Option<PrefixRank>,
    /// Display prefix sigil for `Prefix` shape only (e.g. `'@'` for op).
    pub prefix_sigil: Option<char>,
    /// Only an operator may set this mode on someone else.
    pub oper_only: bool,
    /// Whether a member may remove this mode from themself even without
    /// the rank normally required to unset it (prefix modes only).
    pub self_remove: bool,
    /// `PARAM_ALWAYS`/list handlers that hide their value from non-members
    /// (rendered as the bare mode name instead).
    pub secret: bool,
}

const fn flag(letter: char, name: &'static str, kind: ModeKind) -> ModeSpec {
    ModeSpec {
        letter,
        name,
        kind,
        shape: ModeShape::NoParam,
        rank: None,
        prefix_sigil: None,
        oper_only: false,
        self_remove: false,
        secret: false,
    }
}

const fn prefix(letter: char, name: &'static str, rank: PrefixRank, sigil: char) -> ModeSpec {
    ModeSpec {
        letter,
        name,
        kind: ModeKind::Channel,
        shape: ModeShape::Prefix,
        rank: Some(rank),
        prefix_sigil: Some(sigil),
        oper_only: false,
        self_remove: true,
        secret: false,
    }
}

/// Default channel mode table: `n`, `t`, `s`, `i`, `m`, `p`, `k`, `l`, `b`,
/// `e`, `I`, and the prefix modes `q`/`a`/`o`/`h`/`v`.
pub const DEFAULT_CHANNEL_MODES: &[ModeSpec] = &[
    flag('n', "no-external-messages", ModeKind::Channel),
    flag('t', "protected-topic", ModeKind::Channel),
    flag('s', "secret", ModeKind::Channel),
    flag('i', "invite-only", ModeKind::Channel),
    flag('m', "moderated", ModeKind::Channel),
    flag('p', "private", ModeKind::Channel),
    ModeSpec {
        shape: ModeShape::ParamOnSet,
        secret: true,
        ..flag('k', "key", ModeKind::Channel)
    },
    ModeSpec {
        shape: ModeShape::ParamOnSet,
        ..flag('l', "limit", ModeKind::Channel)
    },
    ModeSpec {
        shape: ModeShape::List,
        ..flag('b', "ban", ModeKind::Channel)
    },
    ModeSpec {
        shape: ModeShape::List,
        ..flag('e', "except", ModeKind::Channel)
    },
    ModeSpec {
        shape: ModeShape::List,
        ..flag('I', "invex", ModeKind::Channel)
    },
    prefix('q', "founder", PrefixRank::FOUNDER, '~'),
    prefix('a', "admin", PrefixRank::ADMIN, '&'),
    prefix('o', "op", PrefixRank::OP, '@'),
    prefix('h', "halfop", PrefixRank::HALFOP, '%'),
    prefix('v', "voice", PrefixRank::VOICE, '+'),
];

/// Default user mode table: `i`, `w`, `s`, `o` (the last is server-granted
/// only and rejected if a client tries to self-set it, enforced by C6/C8,
/// not by this table).
pub const DEFAULT_USER_MODES: &[ModeSpec] = &[
    flag('i', "invisible", ModeKind::User),
    flag('w', "wallops", ModeKind::User),
    flag('s', "server-notices", ModeKind::User),
    ModeSpec {
        oper_only: true,
        ..flag('o', "oper", ModeKind::User)
    },
];

/// Look up a channel mode letter in the default table.
pub fn find_channel_mode(letter: char) -> Option<ModeSpec> {
    DEFAULT_CHANNEL_MODES
        .iter()
        .find(|m| m.letter == letter)
        .copied()
}

/// Look up a user mode letter in the default table.
pub fn find_user_mode(letter: char) -> Option<ModeSpec> {
    DEFAULT_USER_MODES.iter().find(|m| m.letter == letter).copied()
}

/// Prefix sigils in descending rank order, e.g. `"~&@%+"`, used to render
/// a member's displayed prefix and to parse `PREFIX=` ISUPPORT values.
pub fn channel_prefix_sigils() -> String {
    let mut specs: Vec<&ModeSpec> = DEFAULT_CHANNEL_MODES
        .iter()
        .filter(|m| m.shape == ModeShape::Prefix)
        .collect();
    specs.sort_by(|a, b| b.rank.cmp(&a.rank));
    specs.into_iter().filter_map(|m| m.prefix_sigil).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_letters() {
        let op = find_channel_mode('o').unwrap();
        assert_eq!(op.shape, ModeShape::Prefix);
        assert_eq!(op.rank, Some(PrefixRank::OP));

        let key = find_channel_mode('k').unwrap();
        assert_eq!(key.shape, ModeShape::ParamOnSet);
        assert!(key.secret);
    }

    #[test]
    fn unknown_letter_is_none() {
        assert!(find_channel_mode('Z').is_none());
        assert!(find_user_mode('Z').is_none());
    }

    #[test]
    fn prefix_sigils_in_rank_order() {
        assert_eq!(channel_prefix_sigils(), "~&@%+");
    }

    #[test]
    fn oper_only_user_mode_flagged() {
        assert!(find_user_mode('o').unwrap().oper_only);
        assert!(!find_user_mode('i').unwrap().oper_only);
    }
}
