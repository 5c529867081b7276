//! IRC case-mapping functions.
//!
//! IRC uses a special case-insensitive comparison where some characters
//! are considered equivalent (e.g., `[` and `{`). Which characters fold
//! together is a per-network configuration choice advertised in
//! `CASEMAPPING` (005/ISUPPORT); this module implements the four maps
//! defined by the Modern IRC docs rather than hardcoding one.

use std::fmt;

/// A selectable case-folding scheme.
///
/// `Default` is `Rfc1459`, matching the historical wire default; the
/// active map is a config/rehash-time choice (see `is_valid_nick`/glob
/// callers, which always take a `Casemap` explicitly rather than reading
/// a global).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Casemap {
    /// `[`↔`{`, `]`↔`}`, `\`↔`|`, `~`↔`^`, plus ASCII case-fold. The
    /// historical RFC 1459 default.
    #[default]
    Rfc1459,
    /// Same as `Rfc1459` but without the `~`↔`^` mapping.
    StrictRfc1459,
    /// Plain ASCII case-fold only; none of the bracket mappings apply.
    Ascii,
    /// ASCII case-fold plus best-effort Unicode case-fold for non-ASCII
    /// scalar values (simple `char::to_lowercase`). Bracket mappings do
    /// not apply since they are ASCII-specific IRC conventions.
    PermissiveUnicode,
}

impl Casemap {
    /// Parse the `CASEMAPPING` token spelling used on the wire/in config.
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "rfc1459" => Some(Self::Rfc1459),
            "strict-rfc1459" => Some(Self::StrictRfc1459),
            "ascii" => Some(Self::Ascii),
            "permissive-unicode" => Some(Self::PermissiveUnicode),
            _ => None,
        }
    }

    /// The `CASEMAPPING` token spelling for ISUPPORT.
    pub fn token(self) -> &'static str {
        match self {
            Self::Rfc1459 => "rfc1459",
            Self::StrictRfc1459 => "strict-rfc1459",
            Self::Ascii => "ascii",
            Self::PermissiveUnicode => "permissive-unicode",
        }
    }

    /// Fold one character under this casemap.
    #[inline]
    pub fn fold_char(self, c: char) -> char {
        match self {
            Self::Rfc1459 => match c {
                '[' => '{',
                ']' => '}',
                '\\' => '|',
                '~' => '^',
                'A'..='Z' => (c as u8 + 32) as char,
                _ => c,
            },
            Self::StrictRfc1459 => match c {
                '[' => '{',
                ']' => '}',
                '\\' => '|',
                'A'..='Z' => (c as u8 + 32) as char,
                _ => c,
            },
            Self::Ascii => match c {
                'A'..='Z' => (c as u8 + 32) as char,
                _ => c,
            },
            Self::PermissiveUnicode => {
                if c.is_ascii_uppercase() {
                    (c as u8 + 32) as char
                } else {
                    c.to_lowercase().next().unwrap_or(c)
                }
            }
        }
    }

    /// Fold an entire string under this casemap.
    pub fn fold(self, s: &str) -> String {
        s.chars().map(|c| self.fold_char(c)).collect()
    }

    /// Case-insensitive equality under this casemap.
    pub fn eq(self, a: &str, b: &str) -> bool {
        let mut ai = a.chars();
        let mut bi = b.chars();
        loop {
            match (ai.next(), bi.next()) {
                (None, None) => return true,
                (Some(ca), Some(cb)) => {
                    if self.fold_char(ca) != self.fold_char(cb) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl fmt::Display for Casemap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Convert a single character to IRC lowercase using the default
/// (RFC 1459) case mapping. Kept for call sites that don't yet carry an
/// explicit [`Casemap`]; new code should prefer `Casemap::fold_char`.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Convert a string to IRC lowercase using the default casemap.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Compare two strings using the default casemap.
pub fn irc_eq(a: &str, b: &str) -> bool {
    Casemap::Rfc1459.eq(a, b)
}
