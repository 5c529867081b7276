//! Utility functions for IRC protocol handling: length budgeting, and
//! the glob/CIDR matchers used by C1 (string/case engine) and C5 (ban
//! matching).

use crate::casemap::Casemap;
use std::net::IpAddr;

/// Maximum length for IRC tags section (per IRCv3 spec).
pub const MAX_TAGS_LENGTH: usize = 8191;

/// Maximum length for client-originated tag data.
pub const MAX_CLIENT_TAG_DATA: usize = 4094;

/// Maximum length for server-originated tag data.
pub const MAX_SERVER_TAG_DATA: usize = 4094;

/// Maximum length for an IRC message body (excluding tags), per RFC 2812.
pub const MAX_MESSAGE_BODY: usize = 512;

/// Truncates a string to at most `max_bytes` bytes without splitting a
/// multi-byte UTF-8 codepoint.
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncates a string to at most `max_chars` Unicode scalar values.
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Returns `Some(len)` if `s` would exceed the 510-byte IRC message body
/// limit (512 minus the trailing CRLF), else `None`.
#[inline]
pub fn check_body_length(s: &str) -> Option<usize> {
    const MAX_BODY_CONTENT: usize = 510;
    (s.len() > MAX_BODY_CONTENT).then_some(s.len())
}

/// Returns `Some(len)` if a tags section would exceed [`MAX_TAGS_LENGTH`].
#[inline]
pub fn check_tags_length(tags: &str) -> Option<usize> {
    (tags.len() > MAX_TAGS_LENGTH).then_some(tags.len())
}

/// Splits a long message into chunks of at most `max_bytes`, never
/// splitting a multi-byte UTF-8 character.
pub fn split_message(s: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    SplitMessage {
        remaining: s,
        max_bytes,
    }
}

struct SplitMessage<'a> {
    remaining: &'a str,
    max_bytes: usize,
}

impl<'a> Iterator for SplitMessage<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let chunk = truncate_utf8_safe(self.remaining, self.max_bytes);
        self.remaining = &self.remaining[chunk.len()..];
        Some(chunk)
    }
}

/// Match a string against a wildcard pattern (`*`, `?`) under the default
/// (RFC 1459) casemap. See [`wildcard_match_cm`] to select a different
/// casemap at rehash time.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    wildcard_match_cm(pattern, text, Casemap::Rfc1459)
}

/// Match a string against a wildcard pattern (`*` matches zero or more
/// characters, `?` matches exactly one) under an explicit casemap.
///
/// The matcher is linear and greedy: backtracking over `*` is bounded by
/// iteration over the text, never recursion, so pathological patterns
/// (`"*a*a*a*...*"`) cannot blow the stack. `*` never treats `/` or any
/// other byte specially.
pub fn wildcard_match_cm(pattern: &str, text: &str, cm: Casemap) -> bool {
    let pattern_folded: Vec<char> = pattern.chars().map(|c| cm.fold_char(c)).collect();
    let text_folded: Vec<char> = text.chars().map(|c| cm.fold_char(c)).collect();
    wildcard_match_impl(&pattern_folded, &text_folded)
}

/// Iterative glob matcher over already-folded char slices.
fn wildcard_match_impl(pattern: &[char], text: &[char]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star_p = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Match an IRC hostmask pattern (`nick!user@host`, possibly with `*`/`?`)
/// against a candidate `nick!user@host` string.
#[inline]
pub fn matches_hostmask(pattern: &str, hostmask: &str) -> bool {
    wildcard_match(pattern, hostmask)
}

/// Check whether `addr` falls within a CIDR mask `base/prefix_len`.
///
/// Returns `false` (rather than erroring) on a malformed mask string or
/// an address-family mismatch between `addr` and `base`; callers treat a
/// non-match the same as a failed ban check either way.
pub fn cidr_match(addr: IpAddr, mask: &str) -> bool {
    match mask.parse::<ipnet::IpNet>() {
        Ok(net) => net.contains(&addr),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_safe_ascii() {
        assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
        assert_eq!(truncate_utf8_safe("hello", 10), "hello");
        assert_eq!(truncate_utf8_safe("", 5), "");
    }

    #[test]
    fn test_truncate_utf8_safe_multibyte() {
        let s = "café";
        assert_eq!(truncate_utf8_safe(s, 4), "caf");
        assert_eq!(truncate_utf8_safe(s, 5), "café");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_split_message() {
        let chunks: Vec<_> = split_message("hello world", 5).collect();
        assert_eq!(chunks, vec!["hello", " worl", "d"]);
        let chunks: Vec<_> = split_message("", 5).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_check_body_length() {
        assert!(check_body_length("short").is_none());
        let long = "x".repeat(600);
        assert_eq!(check_body_length(&long), Some(600));
    }

    #[test]
    fn test_wildcard_match_basic() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("test*", "testing"));
        assert!(wildcard_match("*test", "unittest"));
        assert!(wildcard_match("*test*", "unittesting"));
        assert!(wildcard_match("te?t", "test"));
        assert!(!wildcard_match("te?t", "tests"));
        assert!(wildcard_match("*!*@*.net", "nick!user@irc.example.net"));
    }

    #[test]
    fn test_wildcard_match_case_insensitive() {
        assert!(wildcard_match("TEST*", "testing"));
        assert!(wildcard_match("#channel[*]", "#CHANNEL{test}"));
    }

    #[test]
    fn test_wildcard_match_edge_cases() {
        assert!(wildcard_match("exact", "exact"));
        assert!(!wildcard_match("exact", "exactx"));
        assert!(wildcard_match("*a*b*c*", "xaybzc"));
        assert!(wildcard_match("", ""));
        assert!(!wildcard_match("", "something"));
    }

    #[test]
    fn wildcard_match_pathological_star_run_is_linear_not_recursive() {
        let pattern = format!("{}b", "*a".repeat(200));
        let text = "a".repeat(400) + "x"; // never matches 'b'; must terminate fast
        assert!(!wildcard_match(&pattern, &text));
    }

    #[test]
    fn strict_rfc1459_casemap_does_not_fold_tilde_in_glob() {
        assert!(wildcard_match_cm("a~*", "a~b", Casemap::StrictRfc1459));
        assert!(!wildcard_match_cm("a^*", "a~b", Casemap::StrictRfc1459));
    }

    #[test]
    fn test_cidr_match() {
        let addr: IpAddr = "192.168.1.42".parse().unwrap();
        assert!(cidr_match(addr, "192.168.1.0/24"));
        assert!(!cidr_match(addr, "192.168.2.0/24"));
        assert!(!cidr_match(addr, "not-a-cidr"));
    }

    #[test]
    fn test_cidr_match_v6() {
        let addr: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(cidr_match(addr, "2001:db8::/32"));
        assert!(!cidr_match(addr, "2001:db9::/32"));
    }
}
