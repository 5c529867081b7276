//! Encoding implementations for IRC messages and prefixes.

use std::io::{self, Write};

use crate::message::tags::escape_tag_value_to_writer;
use crate::message::{Message, Tag};
use crate::prefix::Prefix;

use super::IrcEncode;

fn encode_tag<W: Write>(w: &mut W, tag: &Tag) -> io::Result<usize> {
    let mut written = w.write(tag.0.as_bytes())?;
    if let Some(ref value) = tag.1 {
        written += w.write(b"=")?;
        written += escape_tag_value_to_writer(w, value)?;
    }
    Ok(written)
}

/// Same rule [`crate::message`]'s `Display` impl uses: a parameter needs
/// the trailing (`:`-prefixed) form if it's empty, starts with `:`, or
/// contains a space.
fn needs_trailing_form(param: &str) -> bool {
    param.is_empty() || param.starts_with(':') || param.contains(' ')
}

impl IrcEncode for Message {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<usize> {
        let mut written = 0;

        if let Some(ref tags) = self.tags {
            written += w.write(b"@")?;
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    written += w.write(b";")?;
                }
                written += encode_tag(w, tag)?;
            }
            written += w.write(b" ")?;
        }

        if let Some(ref prefix) = self.prefix {
            written += w.write(b":")?;
            written += prefix.encode(w)?;
            written += w.write(b" ")?;
        }

        written += w.write(self.command.as_bytes())?;

        for (i, param) in self.params.iter().enumerate() {
            written += w.write(b" ")?;
            let is_last = i == self.params.len() - 1;
            if is_last && needs_trailing_form(param) {
                written += w.write(b":")?;
            }
            written += w.write(param.as_bytes())?;
        }

        written += w.write(b"\r\n")?;
        Ok(written)
    }
}

impl IrcEncode for Prefix {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<usize> {
        match self {
            Prefix::ServerName(name) => w.write(name.as_bytes()),
            Prefix::Nickname(nick, user, host) => {
                let mut written = w.write(nick.as_bytes())?;
                if !user.is_empty() {
                    written += w.write(b"!")?;
                    written += w.write(user.as_bytes())?;
                }
                if !host.is_empty() {
                    written += w.write(b"@")?;
                    written += w.write(host.as_bytes())?;
                }
                Ok(written)
            }
        }
    }
}
