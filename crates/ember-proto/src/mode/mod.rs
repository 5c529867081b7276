//! Mode engine front half: table-driven mode letter metadata and change-list
//! parsing. Access checks and state mutation live in the daemon, which
//! owns channel/user state; this module only knows about the wire-level
//! shape of a mode letter.

mod parse;
mod spec;

pub use parse::{parse_mode_changes, ModeChange, ModeParseOutcome};
pub use spec::{
    channel_prefix_sigils, find_channel_mode, find_user_mode, ModeKind, ModeSpec, ModeShape,
    PrefixRank, DEFAULT_CHANNEL_MODES, DEFAULT_USER_MODES,
};
