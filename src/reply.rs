//! Numeric reply building: line-length budgeting with a list-builder
//! variant for NAMES/banlist-style responses.

use ember_proto::{Message, Response};

/// Accumulates tokens for a numeric whose trailing parameter is itself a
/// delimited list (NAMES' space-separated nick list, banlist-style
/// multi-line replies), flushing to a fresh line when the next token
/// would exceed the configured wire budget.
pub struct NumericListBuilder<'a> {
    code: Response,
    target: String,
    leading: Vec<String>,
    separator: &'a str,
    max_line_length: usize,
    lines: Vec<Vec<String>>,
    current: Vec<String>,
    current_len: usize,
}

impl<'a> NumericListBuilder<'a> {
    /// Start a new list builder. `leading` are the parameters repeated
    /// verbatim on every produced line before the trailing list.
    pub fn new(
        code: Response,
        target: impl Into<String>,
        leading: Vec<String>,
        separator: &'a str,
        max_line_length: usize,
    ) -> Self {
        NumericListBuilder {
            code,
            target: target.into(),
            leading,
            separator,
            max_line_length,
            lines: Vec::new(),
            current: Vec::new(),
            current_len: 0,
        }
    }

    /// The byte budget already consumed by `code`, `target`, and
    /// `leading` on any line, before the trailing list starts.
    fn fixed_overhead(&self) -> usize {
        // ":<server> <code> <target> " + each leading param + a trailing ':'
        let mut n = 1 + 3 + 1 + self.target.len() + 1;
        for p in &self.leading {
            n += p.len() + 1;
        }
        n + 1
    }

    /// Add one token to the list, flushing the current line first if the
    /// token would overflow the budget.
    pub fn push(&mut self, token: impl Into<String>) {
        let token = token.into();
        let added = token.len() + if self.current.is_empty() { 0 } else { self.separator.len() };
        if !self.current.is_empty()
            && self.fixed_overhead() + self.current_len + added > self.max_line_length
        {
            self.flush();
        }
        self.current_len += token.len() + if self.current.is_empty() { 0 } else { self.separator.len() };
        self.current.push(token);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
            self.current_len = 0;
        }
    }

    /// Finish building, returning one [`Message`] per produced line.
    pub fn build(mut self) -> Vec<Message> {
        self.flush();
        self.lines
            .into_iter()
            .map(|tokens| {
                let mut params = self.leading.clone();
                params.push(tokens.join(self.separator));
                Message::reply(self.code, self.target.clone(), params)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_list_fits_one_line() {
        let mut b = NumericListBuilder::new(
            Response::RPL_NAMREPLY,
            "alice",
            vec!["=".into(), "#test".into()],
            " ",
            512,
        );
        b.push("@alice");
        b.push("bob");
        let lines = b.build();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].params, vec!["alice", "=", "#test", "@alice bob"]);
    }

    #[test]
    fn overflowing_list_splits_and_repeats_leading_params() {
        let mut b = NumericListBuilder::new(
            Response::RPL_NAMREPLY,
            "alice",
            vec!["=".into(), "#test".into()],
            " ",
            40,
        );
        for i in 0..10 {
            b.push(format!("user{i}"));
        }
        let lines = b.build();
        assert!(lines.len() > 1);
        for line in &lines {
            assert_eq!(&line.params[0..3], &["alice", "=", "#test"]);
        }
    }

    #[test]
    fn empty_builder_produces_no_lines() {
        let b = NumericListBuilder::new(Response::RPL_ENDOFBANLIST, "alice", vec![], " ", 512);
        assert!(b.build().is_empty());
    }
}
