use std::fmt::{self, Display, Formatter};

use super::tags::escape_tag_value;
use super::types::Message;

/// A parameter needs the trailing (`:`-prefixed) form if it's empty,
/// starts with `:`, or contains a space — otherwise it would be
/// misread as a separate (or absent) parameter on the wire.
fn needs_trailing_form(param: &str) -> bool {
    param.is_empty() || param.starts_with(':') || param.contains(' ')
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref tags) = self.tags {
            write!(f, "@")?;
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    write!(f, ";")?;
                }
                write!(f, "{}", tag.0)?;
                if let Some(ref value) = tag.1 {
                    write!(f, "=")?;
                    escape_tag_value(f, value)?;
                }
            }
            write!(f, " ")?;
        }

        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }

        write!(f, "{}", self.command)?;

        for (i, param) in self.params.iter().enumerate() {
            let is_last = i == self.params.len() - 1;
            if is_last && needs_trailing_form(param) {
                write!(f, " :{}", param)?;
            } else {
                write!(f, " {}", param)?;
            }
        }

        write!(f, "\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message as M;

    #[test]
    fn serializes_simple_command() {
        assert_eq!(
            M::new(None, "NICK", vec!["newnick".into()]).unwrap().to_string(),
            "NICK newnick\r\n"
        );
    }

    #[test]
    fn serializes_trailing_param_with_spaces() {
        assert_eq!(
            M::privmsg("#channel", "Hello world!").to_string(),
            "PRIVMSG #channel :Hello world!\r\n"
        );
    }

    #[test]
    fn serializes_empty_trailing_param() {
        assert_eq!(
            M::new(None, "MODE", vec!["#chan".into(), "+k".into(), "".into()])
                .unwrap()
                .to_string(),
            "MODE #chan +k :\r\n"
        );
    }
}
