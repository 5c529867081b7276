//! Zero-copy encoding for IRC messages.
//!
//! [`Display`](std::fmt::Display) formats to a `String`, which allocates.
//! For a server writing thousands of messages a second to a send queue,
//! [`IrcEncode`] writes directly to any [`Write`] implementor instead.
//!
//! # Example
//!
//! ```
//! use ember_proto::encode::IrcEncode;
//! use ember_proto::Message;
//!
//! let msg = Message::privmsg("#channel", "Hello!");
//! let mut buf = Vec::new();
//! msg.encode(&mut buf).unwrap();
//!
//! assert_eq!(&buf, b"PRIVMSG #channel :Hello!\r\n");
//! ```

use std::io::{self, Write};

mod message;

/// Encode an IRC protocol element directly to a byte stream.
pub trait IrcEncode {
    /// Encode this value to the given writer, returning the byte count
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<usize>;

    /// Encode this value to a new `Vec<u8>`.
    #[must_use]
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        let _ = self.encode(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::prefix::Prefix;

    #[test]
    fn encode_privmsg() {
        let msg = Message::privmsg("#channel", "Hello world!");
        assert_eq!(&msg.to_bytes(), b"PRIVMSG #channel :Hello world!\r\n");
    }

    #[test]
    fn encode_simple_command() {
        let msg = Message::new(None, "NICK", vec!["testnick".into()]).unwrap();
        assert_eq!(&msg.to_bytes(), b"NICK testnick\r\n");
    }

    #[test]
    fn encode_with_prefix() {
        let msg =
            Message::privmsg("#test", "Hello").with_prefix(Prefix::new_from_str("nick!user@host"));
        assert_eq!(&msg.to_bytes(), b":nick!user@host PRIVMSG #test :Hello\r\n");
    }

    #[test]
    fn encode_with_tags() {
        let msg = Message::privmsg("#test", "Hi").with_tag("time", Some("2023-01-01T00:00:00Z"));
        assert_eq!(
            &msg.to_bytes(),
            b"@time=2023-01-01T00:00:00Z PRIVMSG #test :Hi\r\n"
        );
    }

    #[test]
    fn encode_returns_byte_count() {
        let msg = Message::new(None, "PING", vec!["server".into()]).unwrap();
        let mut buf = Vec::new();
        let written = msg.encode(&mut buf).unwrap();
        assert_eq!(written, buf.len());
    }
}
