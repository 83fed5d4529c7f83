//! Bracket-link scanner for wiki markup.
//!
//! Recognized forms:
//!
//! ```text
//! [Target]                 link to Target
//! [label|Target]           link to Target with a label
//! [label|Target|attrs]     attributes are ignored
//! [[not a link]            `[[` is a literal bracket
//! ~[not a link]            `~` escapes the next character
//! [{Plugin arg=1}]         plugin invocation, not a link
//! {{{ [not a link] }}}     preformatted block
//! ```

use super::{ExtractionIgnored, IgnoreReason};
use crate::core::LinkKind;

const PRE_OPEN: &str = "{{{";
const PRE_CLOSE: &str = "}}}";
const PLUGIN_CLOSE: &str = "}]";

/// Lazy iterator over wiki link targets.
#[derive(Debug, Clone)]
pub struct WikiLinks<'a> {
    text: &'a str,
    pos: usize,
    ignored: Vec<ExtractionIgnored>,
}

impl<'a> WikiLinks<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            ignored: Vec::new(),
        }
    }

    pub fn ignored(&self) -> &[ExtractionIgnored] {
        &self.ignored
    }

    fn ignore(&mut self, offset: usize, reason: IgnoreReason) {
        self.ignored.push(ExtractionIgnored { offset, reason });
    }

    /// Skip a preformatted block starting at `start`.
    fn skip_preformatted(&mut self, start: usize) {
        let body = start + PRE_OPEN.len();
        match self.text[body..].find(PRE_CLOSE) {
            Some(rel) => self.pos = body + rel + PRE_CLOSE.len(),
            None => {
                self.ignore(start, IgnoreReason::UnclosedPreformatted);
                self.pos = self.text.len();
            }
        }
    }

    /// Skip a plugin invocation `[{...}]` starting at `start`.
    fn skip_plugin(&mut self, start: usize) {
        let body = start + 2;
        match self.text[body..].find(PLUGIN_CLOSE) {
            Some(rel) => self.pos = body + rel + PLUGIN_CLOSE.len(),
            None => {
                self.ignore(start, IgnoreReason::UnclosedPlugin);
                self.pos = body;
            }
        }
    }

    /// Parse a bracket link starting at `start` (the `[`).
    ///
    /// Returns the raw target, or `None` if the bracket is not a page link.
    fn bracket(&mut self, start: usize) -> Option<&'a str> {
        let text = self.text;
        let body = start + 1;
        let close = text[body..]
            .find([']', '\n'])
            .map(|rel| body + rel)
            .filter(|&idx| text.as_bytes()[idx] == b']');

        let Some(close) = close else {
            self.ignore(start, IgnoreReason::UnclosedLink);
            self.pos = body;
            return None;
        };
        self.pos = close + 1;

        let content = &text[body..close];
        let target = content.split('|').nth(1).unwrap_or(content).trim();
        if target.is_empty() {
            self.ignore(start, IgnoreReason::EmptyTarget);
            return None;
        }
        LinkKind::parse(target).page_target()
    }
}

impl<'a> Iterator for WikiLinks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let text = self.text;
        let bytes = text.as_bytes();

        while self.pos < text.len() {
            let rel = text[self.pos..].find(['[', '{', '~'])?;
            let at = self.pos + rel;

            match bytes[at] {
                b'~' => {
                    // Skip the escape and the escaped character
                    let next_len = text[at + 1..].chars().next().map_or(0, char::len_utf8);
                    self.pos = at + 1 + next_len;
                }
                b'{' => {
                    if text[at..].starts_with(PRE_OPEN) {
                        self.skip_preformatted(at);
                    } else {
                        self.pos = at + 1;
                    }
                }
                _ => match bytes.get(at + 1) {
                    Some(b'[') => self.pos = at + 2,
                    Some(b'{') => self.skip_plugin(at),
                    _ => {
                        if let Some(target) = self.bracket(at) {
                            return Some(target);
                        }
                    }
                },
            }
        }
        None
    }
}
