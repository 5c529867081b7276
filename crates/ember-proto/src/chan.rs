//! Channel name validation.
//!
//! # Reference
//! - RFC 2812 Section 1.3: Channel names

/// Default channel sigils accepted when a server doesn't configure a
/// narrower set: `#`, `&`, `+`, `!`.
pub const DEFAULT_CHAN_SIGILS: &str = "#&+!";

/// Default maximum channel name length (RFC 2812 default, including the
/// sigil). Configurable as `chan_max`.
pub const DEFAULT_CHAN_MAX: usize = 50;

/// Extension trait for a quick, default-config channel-name check.
///
/// Uses [`DEFAULT_CHAN_SIGILS`]/[`DEFAULT_CHAN_MAX`]; a server applying a
/// rehashed configuration should call [`is_valid_channel`] directly with
/// its own sigil set and length limit instead.
pub trait ChannelExt {
    /// Check if this string is a valid IRC channel name under default
    /// configuration (sigils `#&+!`, max 50 bytes).
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for str {
    fn is_channel_name(&self) -> bool {
        is_valid_channel(self, DEFAULT_CHAN_SIGILS, DEFAULT_CHAN_MAX)
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}

/// Validate a channel name against a configured sigil set and maximum
/// length.
///
/// A channel name must:
/// - begin with one of `sigils`,
/// - contain no space, comma, or control character,
/// - be at most `max_len` bytes (including the sigil).
pub fn is_valid_channel(s: &str, sigils: &str, max_len: usize) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !sigils.contains(first) {
        return false;
    }
    if s.len() > max_len {
        return false;
    }
    chars.all(|c| c != ' ' && c != ',' && c != '\x07' && !c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_channels() {
        assert!("#channel".is_channel_name());
        assert!("&local".is_channel_name());
        assert!("+modeless".is_channel_name());
        assert!("!safe12345".is_channel_name());
    }

    #[test]
    fn test_invalid_channels() {
        assert!(!"channel".is_channel_name());
        assert!(!"#chan nel".is_channel_name());
        assert!(!"#chan,nel".is_channel_name());
        assert!(!"".is_channel_name());
    }

    #[test]
    fn configured_sigil_set_is_honored() {
        assert!(is_valid_channel("#chan", "#", 50));
        assert!(!is_valid_channel("&chan", "#", 50));
    }

    #[test]
    fn max_len_boundary() {
        let name = format!("#{}", "a".repeat(49));
        assert_eq!(name.len(), 50);
        assert!(is_valid_channel(&name, DEFAULT_CHAN_SIGILS, 50));
        let too_long = format!("#{}", "a".repeat(50));
        assert!(!is_valid_channel(&too_long, DEFAULT_CHAN_SIGILS, 50));
    }
}
