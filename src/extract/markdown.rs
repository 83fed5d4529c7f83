//! Inline-link extraction for Markdown pages.

use percent_encoding::percent_decode_str;
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};

use crate::core::LinkKind;

/// Lazy iterator over Markdown link targets.
///
/// Only inline links (`[label](Target)`) count. Autolinks, e-mail links and
/// reference-style links are skipped.
pub struct MarkdownLinks<'a> {
    parser: Parser<'a>,
}

impl<'a> MarkdownLinks<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            parser: Parser::new_ext(text, Options::empty()),
        }
    }
}

impl Iterator for MarkdownLinks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for event in self.parser.by_ref() {
            if let Event::Start(Tag::Link {
                link_type: LinkType::Inline,
                dest_url,
                ..
            }) = event
                && let Some(target) = page_target(&dest_url)
            {
                return Some(target);
            }
        }
        None
    }
}

/// Normalize a link destination into a page name.
fn page_target(dest: &str) -> Option<String> {
    let decoded = percent_decode_str(dest)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| dest.to_string());

    let name = LinkKind::parse(&decoded).page_target()?;
    let name = name.strip_suffix(".md").unwrap_or(name).trim();
    (!name.is_empty()).then(|| name.to_string())
}
