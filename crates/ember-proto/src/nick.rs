//! Nickname validation utilities.
//!
//! # Reference
//! - RFC 2812 Section 2.3.1: Message format (nickname definition)

/// Extension trait for checking if a string is a valid IRC nickname.
pub trait NickExt {
    /// Check if this string is a valid IRC nickname under the default
    /// (30-byte) length limit.
    ///
    /// - First character: letter (a-z, A-Z) or special `[\]^_`{|}`
    /// - Subsequent characters: letter, digit (0-9), special, or `-`
    ///
    /// # Examples
    ///
    /// ```
    /// use ember_proto::NickExt;
    ///
    /// assert!("nick".is_valid_nick());
    /// assert!("[cool]".is_valid_nick());
    /// assert!(!"123nick".is_valid_nick());
    /// assert!(!"nick name".is_valid_nick());
    /// ```
    fn is_valid_nick(&self) -> bool;

    /// Check if this string is a valid IRC nickname with a custom max
    /// length (from the server's configured `nick_max`, advertised as
    /// `NICKLEN` in ISUPPORT).
    fn is_valid_nick_len(&self, max_len: usize) -> bool;
}

/// Default maximum nickname length per RFC 2812.
pub const DEFAULT_NICK_MAX_LEN: usize = 30;

/// `[ ] \ ` ^ _ { | }`, the "special" characters allowed in nicknames.
#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

/// Validate a nickname against an explicit max length.
pub fn is_valid_nick(s: &str, max_len: usize) -> bool {
    if s.is_empty() || s.len() > max_len {
        return false;
    }
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_alphabetic() && !is_special(first) {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
}

impl NickExt for str {
    fn is_valid_nick(&self) -> bool {
        is_valid_nick(self, DEFAULT_NICK_MAX_LEN)
    }

    fn is_valid_nick_len(&self, max_len: usize) -> bool {
        is_valid_nick(self, max_len)
    }
}

impl NickExt for String {
    fn is_valid_nick(&self) -> bool {
        self.as_str().is_valid_nick()
    }

    fn is_valid_nick_len(&self, max_len: usize) -> bool {
        self.as_str().is_valid_nick_len(max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nicks() {
        assert!("nick".is_valid_nick());
        assert!("Nick".is_valid_nick());
        assert!("nick123".is_valid_nick());
        assert!("n".is_valid_nick());
        assert!("nick-name".is_valid_nick());
    }

    #[test]
    fn test_special_chars() {
        assert!("[nick]".is_valid_nick());
        assert!("nick\\test".is_valid_nick());
        assert!("_nick_".is_valid_nick());
        assert!("^nick^".is_valid_nick());
        assert!("{nick}".is_valid_nick());
        assert!("|nick|".is_valid_nick());
        assert!("`nick`".is_valid_nick());
    }

    #[test]
    fn test_invalid_nicks() {
        assert!(!"".is_valid_nick());
        assert!(!"123nick".is_valid_nick());
        assert!(!"nick name".is_valid_nick());
        assert!(!"-nick".is_valid_nick());
        assert!(!"nick@host".is_valid_nick());
        assert!(!"nick!user".is_valid_nick());
    }

    #[test]
    fn test_length_limits() {
        let long_nick = "a".repeat(31);
        assert!(!long_nick.as_str().is_valid_nick());
        let max_nick = "a".repeat(30);
        assert!(max_nick.as_str().is_valid_nick());
        assert!(!"abcdef".is_valid_nick_len(5));
        assert!("abcde".is_valid_nick_len(5));
    }
}
