//! # ember-proto
//!
//! IRC wire protocol: message parsing/serialization with IRCv3 tags,
//! case-mapping, nick/channel name validation, a table-driven mode
//! engine, ISUPPORT token construction, and numeric replies.
//!
//! ## Quick Start
//!
//! ### Creating IRC Messages
//!
//! ```rust
//! use ember_proto::{Message, Prefix};
//!
//! let privmsg = Message::privmsg("#rust", "Hello, world!");
//! let notice = Message::notice("nick", "Server notice");
//!
//! let tagged_msg = Message::privmsg("#dev", "Tagged message")
//!     .with_tag("time", Some("2023-01-01T12:00:00Z"))
//!     .with_tag("msgid", Some("abc123"))
//!     .with_prefix(Prefix::new_from_str("bot!bot@example.com"));
//!
//! println!("{}", tagged_msg); // serializes to IRC wire format
//! ```
//!
//! ### Parsing IRC Messages
//!
//! ```rust
//! use ember_proto::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: Message = raw.parse().expect("valid IRC message");
//!
//! if let Some(tags) = &message.tags {
//!     println!("message has {} tags", tags.len());
//! }
//! ```
//!
//! ## Acknowledgments
//!
//! This project was inspired by the architectural patterns established by
//! [Aaron Weiss (aatxe)](https://github.com/aatxe) in the
//! [irc](https://github.com/aatxe/irc) crate. We are grateful for Aaron's
//! foundational work on IRC protocol handling in Rust.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod chan;
pub mod encode;
pub mod error;
pub mod isupport;
pub mod message;
pub mod mode;
pub mod nick;
pub mod prefix;
pub mod response;
pub mod util;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower, Casemap};
pub use self::chan::ChannelExt;
pub use self::encode::IrcEncode;
pub use self::error::{MessageParseError, ModeParseError, ProtocolError};
pub use self::isupport::{ChanModesBuilder, IsupportBuilder, TargMaxBuilder};
pub use self::message::{Message, Tag};
pub use self::mode::{
    channel_prefix_sigils, find_channel_mode, find_user_mode, ModeChange, ModeKind,
    ModeParseOutcome, ModeShape, ModeSpec, PrefixRank, DEFAULT_CHANNEL_MODES, DEFAULT_USER_MODES,
};
pub use self::nick::{NickExt, DEFAULT_NICK_MAX_LEN};
pub use self::prefix::{Prefix, PrefixRef};
pub use self::response::{ParseResponseError, Response};
pub use self::util::{cidr_match, matches_hostmask, wildcard_match, wildcard_match_cm};
