use std::borrow::Cow;

use crate::error::MessageParseError;
use crate::prefix::Prefix;
use crate::response::Response;

/// An owned IRC message: optional IRCv3 tags, optional prefix/source, a
/// command name, and its parameters.
///
/// Unlike a per-command enum, `command` is a plain string and `params` a
/// plain vector: the server's command registry is what gives a command
/// meaning (arity, access level, handler), not the wire type. This keeps
/// `Message` usable for the entire command surface, including numerics
/// and commands the registry doesn't yet recognize (`ERR_UNKNOWNCOMMAND`
/// is a dispatcher decision, not a parse error).
///
/// # Example
///
/// ```
/// use ember_proto::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.command, "PRIVMSG");
///
/// let reply = Message::privmsg("#channel", "Hello!");
/// assert_eq!(reply.to_string(), "PRIVMSG #channel :Hello!\r\n");
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    /// IRCv3 message tags (e.g., `time`, `msgid`).
    pub tags: Option<Vec<Tag>>,
    /// Message prefix/source (e.g., `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// The command name, upper-cased on the wire (`"PRIVMSG"`) or a
    /// three-digit numeric (`"001"`).
    pub command: String,
    /// Command parameters, in wire order. The last element was the
    /// trailing (`:`-prefixed) parameter if one was present.
    pub params: Vec<String>,
}

impl Message {
    /// Build a message from raw components, validating the command
    /// grammar (RFC 2812: 1*letter or 3digit) and the prefix if given.
    #[must_use = "message creation result should be handled"]
    pub fn new(
        prefix: Option<&str>,
        command: &str,
        params: Vec<String>,
    ) -> Result<Message, MessageParseError> {
        Message::with_tags(None, prefix, command, params)
    }

    /// Build a message with tags from raw components.
    #[must_use = "message creation result should be handled"]
    pub fn with_tags(
        tags: Option<Vec<Tag>>,
        prefix: Option<&str>,
        command: &str,
        params: Vec<String>,
    ) -> Result<Message, MessageParseError> {
        if !is_valid_command_token(command) {
            return Err(MessageParseError::InvalidCommand);
        }
        let prefix = prefix.map(Prefix::try_from_str).transpose()?;

        Ok(Message {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Build a message from a command string known to be valid (internal
    /// reply construction). Panics in debug builds on a malformed command
    /// name; intended for call sites building messages from constants.
    fn raw(command: impl Into<String>, params: Vec<String>) -> Self {
        let command = command.into();
        debug_assert!(
            is_valid_command_token(&command),
            "invalid internally-constructed command: {command:?}"
        );
        Message {
            tags: None,
            prefix: None,
            command,
            params,
        }
    }

    /// Build a `PRIVMSG` to `target` with `text`.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::raw("PRIVMSG", vec![target.into(), text.into()])
    }

    /// Build a `NOTICE` to `target` with `text`.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::raw("NOTICE", vec![target.into(), text.into()])
    }

    /// Build a numeric reply: `<code> <target> <params...>`.
    #[must_use]
    pub fn reply(code: Response, target: impl Into<String>, params: Vec<String>) -> Self {
        let mut all = vec![target.into()];
        all.extend(params);
        Message::raw(format!("{code}"), all)
    }

    /// Get the nickname from the message prefix, if present.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(|p| p.nick())
    }

    /// The trailing (last) parameter, if any.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Case-insensitive check of whether `command` names this message's
    /// command (commands are always matched ASCII-case-insensitively).
    pub fn is_command(&self, command: &str) -> bool {
        self.command.eq_ignore_ascii_case(command)
    }

    /// Get the value of an IRCv3 tag by key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k.as_ref() == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// The `time` tag value (IRCv3 server-time).
    pub fn server_time(&self) -> Option<&str> {
        self.tag_value("time")
    }

    /// The `label` tag value (IRCv3 labeled-response).
    pub fn label(&self) -> Option<&str> {
        self.tag_value("label")
    }

    /// The `msgid` tag value.
    pub fn msgid(&self) -> Option<&str> {
        self.tag_value("msgid")
    }

    /// Add IRCv3 tags to this message.
    #[must_use]
    pub fn with_message_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Add a single IRCv3 tag to this message.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        let tag = Tag::new(key, value.map(Into::into));
        match self.tags {
            Some(ref mut tags) => tags.push(tag),
            None => self.tags = Some(vec![tag]),
        }
        self
    }

    /// Set the prefix/source of this message.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// `command = 1*letter / 3digit`, per RFC 2812.
fn is_valid_command_token(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let all_letters = s.chars().all(|c| c.is_ascii_alphabetic());
    let three_digits = s.len() == 3 && s.chars().all(|c| c.is_ascii_digit());
    all_letters || three_digits
}

/// An IRCv3 message tag: a key and an optional value (some tags are
/// presence-only flags, e.g. `+typing`).
#[derive(Clone, PartialEq, Debug)]
pub struct Tag(
    /// Tag key (e.g., `time`, `msgid`).
    pub Cow<'static, str>,
    /// Optional tag value.
    pub Option<String>,
);

impl Tag {
    /// Create a new tag with a key and optional value.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Tag(Cow::Owned(key.into()), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privmsg_constructor() {
        let msg = Message::privmsg("#channel", "Hello, world!");
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#channel", "Hello, world!"]);
        assert!(msg.tags.is_none());
        assert!(msg.prefix.is_none());
    }

    #[test]
    fn notice_constructor() {
        let msg = Message::notice("nickname", "This is a notice");
        assert_eq!(msg.command, "NOTICE");
        assert_eq!(msg.params, vec!["nickname", "This is a notice"]);
    }

    #[test]
    fn numeric_reply_constructor() {
        let msg = Message::reply(
            Response::ERR_NICKNAMEINUSE,
            "*",
            vec!["baduser".into(), "Nickname is already in use".into()],
        );
        assert_eq!(msg.command, "433");
        assert_eq!(msg.params, vec!["*", "baduser", "Nickname is already in use"]);
    }

    #[test]
    fn rejects_malformed_command_token() {
        assert!(Message::new(None, "PING123", vec![]).is_err());
        assert!(Message::new(None, "12", vec![]).is_err());
        assert!(Message::new(None, "PING", vec![]).is_ok());
        assert!(Message::new(None, "001", vec![]).is_ok());
    }

    #[test]
    fn command_uppercased_on_construction() {
        let msg = Message::new(None, "ping", vec!["server".into()]).unwrap();
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn is_command_is_case_insensitive() {
        let msg = Message::privmsg("#c", "hi");
        assert!(msg.is_command("privmsg"));
        assert!(msg.is_command("PRIVMSG"));
        assert!(!msg.is_command("NOTICE"));
    }

    #[test]
    fn trailing_returns_last_param() {
        let msg = Message::privmsg("#c", "hello there");
        assert_eq!(msg.trailing(), Some("hello there"));
        let msg = Message::new(None, "PING", vec![]).unwrap();
        assert_eq!(msg.trailing(), None);
    }

    #[test]
    fn with_message_tags() {
        let msg = Message::privmsg("#test", "Hello").with_message_tags(vec![
            Tag::new("time", Some("2023-01-01T00:00:00Z".to_string())),
            Tag::new("msgid", Some("abc123".to_string())),
        ]);

        let tags = msg.tags.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].0.as_ref(), "time");
        assert_eq!(tags[1].0.as_ref(), "msgid");
    }

    #[test]
    fn with_tag_appends_incrementally() {
        let msg = Message::privmsg("#test", "Hello")
            .with_tag("time", Some("2023-01-01T00:00:00Z"))
            .with_tag("msgid", Some("abc123"))
            .with_tag("bot", None::<String>);

        let tags = msg.tags.unwrap();
        assert_eq!(tags.len(), 3);
        assert!(tags[2].1.is_none());
    }

    #[test]
    fn with_prefix() {
        let prefix = Prefix::new_from_str("nick!user@host");
        let msg = Message::privmsg("#test", "Hello").with_prefix(prefix.clone());
        assert_eq!(msg.prefix, Some(prefix));
    }

    #[test]
    fn chaining_tag_and_prefix() {
        let msg = Message::privmsg("#test", "Hello")
            .with_tag("time", Some("2023-01-01T00:00:00Z"))
            .with_prefix(Prefix::new_from_str("bot!bot@example.com"));

        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.tags.unwrap().len(), 1);
        assert!(msg.prefix.is_some());
    }

    #[test]
    fn message_round_trips_through_parse_and_serialize() {
        let original = Message::privmsg("#test", "Hello, world!")
            .with_tag("time", Some("2023-01-01T00:00:00Z"))
            .with_tag("msgid", Some("abc123"));

        let serialized = original.to_string();
        let parsed: Message = serialized.parse().expect("should parse successfully");
        assert_eq!(original, parsed);
    }
}
