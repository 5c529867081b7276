//! Message parsing implementation: `FromStr` for `Message`, built on the
//! nom-based tag/prefix/command splitter in [`super::nom_parser`].

use std::borrow::Cow;
use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};

use super::nom_parser::ParsedMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

/// Intern common tag keys to avoid allocations.
#[inline]
fn intern_tag_key(key: &str) -> Cow<'static, str> {
    match key {
        "msgid" => Cow::Borrowed("msgid"),
        "time" => Cow::Borrowed("time"),
        "batch" => Cow::Borrowed("batch"),
        "account" => Cow::Borrowed("account"),
        "label" => Cow::Borrowed("label"),
        "echo-message" => Cow::Borrowed("echo-message"),
        "+typing" => Cow::Borrowed("+typing"),
        _ => Cow::Owned(key.to_owned()),
    }
}

/// Parse a raw tags string (without the leading `@`) into `Tag`s.
fn parse_tags_string(tags_str: &str) -> Vec<Tag> {
    tags_str
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|tag| {
            let mut iter = tag.splitn(2, '=');
            let key = iter.next().unwrap_or("");
            let value = iter.next().map(unescape_tag_value);
            let interned_key = if key.is_empty() {
                Cow::Owned(String::new())
            } else {
                intern_tag_key(key)
            };
            Tag(interned_key, value)
        })
        .collect()
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        if s.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let parsed = ParsedMessage::parse(s).map_err(|parse_err| {
            let cause = MessageParseError::ParseContext {
                position: parse_err.position,
                context: format!("parse error: {:?}", parse_err.kind),
                source: None,
                source_message: None,
            };
            ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause,
            }
        })?;

        let tags = parsed.tags.map(parse_tags_string);
        let params = parsed.params.iter().map(|p| p.to_string()).collect();

        Message::with_tags(tags, parsed.prefix, parsed.command, params).map_err(|cause| {
            ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause,
            }
        })
    }
}
