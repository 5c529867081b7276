//! Mode change-list parsing.
//!
//! Parses the `<modestring> [params...]` tail of a `MODE` command into an
//! ordered list of per-letter changes, without knowing anything about
//! channel/user state — access checks and mutation belong to the server.

use super::spec::{ModeShape, ModeSpec};

/// One resolved change out of a mode string: `+o nick` becomes
/// `ModeChange { letter: 'o', add: true, param: Some("nick") }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    /// The mode letter.
    pub letter: char,
    /// `true` for `+`, `false` for `-`.
    pub add: bool,
    /// The consumed parameter, if this letter's shape takes one in this
    /// direction.
    pub param: Option<String>,
}

/// Result of parsing a mode change list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeParseOutcome {
    /// Changes for letters found in the lookup table, in wire order.
    pub changes: Vec<ModeChange>,
    /// Letters not found in the lookup table, in wire order (deduplicated
    /// per RFC: caller reports `ERR_UNKNOWNMODE` once per letter).
    pub unknown: Vec<char>,
}

/// Parse a mode string (e.g. `"+o-v+k"`) against `params` using `lookup` to
/// resolve each letter's shape.
///
/// A letter whose shape needs a parameter but finds none available is
/// dropped silently (the handler's caller is expected to have already
/// validated `ERR_NEEDMOREPARAMS` against the command's param count before
/// calling this).
pub fn parse_mode_changes(
    modestring: &str,
    params: &[String],
    lookup: impl Fn(char) -> Option<ModeSpec>,
) -> ModeParseOutcome {
    let mut out = ModeParseOutcome::default();
    let mut add = true;
    let mut param_idx = 0;

    for c in modestring.chars() {
        match c {
            '+' => add = true,
            '-' => add = false,
            _ => {
                let Some(spec) = lookup(c) else {
                    if !out.unknown.contains(&c) {
                        out.unknown.push(c);
                    }
                    continue;
                };

                let takes_param = match spec.shape {
                    ModeShape::NoParam => false,
                    ModeShape::ParamOnSet => add,
                    ModeShape::ParamAlways | ModeShape::List | ModeShape::Prefix => true,
                };

                let param = if takes_param {
                    let p = params.get(param_idx).cloned();
                    if p.is_some() {
                        param_idx += 1;
                    }
                    p
                } else {
                    None
                };

                if takes_param && param.is_none() {
                    // Parameter required but exhausted: drop this change.
                    continue;
                }

                out.changes.push(ModeChange {
                    letter: c,
                    add,
                    param,
                });
            }
        }
    }

    out
}
