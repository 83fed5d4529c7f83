//! Outbound link extraction from raw page markup.
//!
//! | Dialect    | Link forms                                  |
//! |------------|---------------------------------------------|
//! | `wiki`     | `[Target]`, `[label|Target]`, `[label|Target|attrs]` |
//! | `markdown` | `[label](Target)` (inline links only)       |
//!
//! Extraction is lazy: [`LinkExtractor::links`] returns an iterator that scans
//! the text as it is consumed. Calling it again restarts from the beginning.
//! Duplicates are yielded as often as the author wrote them.

mod markdown;
mod wiki;

use serde::{Deserialize, Serialize};

pub use markdown::MarkdownLinks;
pub use wiki::WikiLinks;

/// Markup dialect of page sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    /// Bracket links: `[Target]`, `[label|Target]`.
    #[default]
    Wiki,
    /// CommonMark inline links: `[label](Target)`.
    Markdown,
}

/// A markup fragment skipped during extraction.
///
/// Never an error for the caller: the fragment just contributes no link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionIgnored {
    /// Byte offset of the fragment in the page text.
    pub offset: usize,
    pub reason: IgnoreReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `[` without a closing `]` on the same line.
    UnclosedLink,
    /// `[]` or `[label|]`.
    EmptyTarget,
    /// `[{` without a closing `}]`.
    UnclosedPlugin,
    /// `{{{` without a closing `}}}`.
    UnclosedPreformatted,
}

/// Stateless link extractor for one markup dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkExtractor {
    syntax: Syntax,
}

impl LinkExtractor {
    pub const fn new(syntax: Syntax) -> Self {
        Self { syntax }
    }

    /// Scan `text` for raw link targets, in document order.
    pub fn links<'a>(&self, text: &'a str) -> Links<'a> {
        match self.syntax {
            Syntax::Wiki => Links::Wiki(WikiLinks::new(text)),
            Syntax::Markdown => Links::Markdown(MarkdownLinks::new(text)),
        }
    }
}

/// Lazy iterator over raw link targets.
pub enum Links<'a> {
    Wiki(WikiLinks<'a>),
    Markdown(MarkdownLinks<'a>),
}

impl Links<'_> {
    /// Fragments skipped so far.
    pub fn ignored(&self) -> &[ExtractionIgnored] {
        match self {
            Self::Wiki(links) => links.ignored(),
            Self::Markdown(_) => &[],
        }
    }
}

impl Iterator for Links<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self {
            Self::Wiki(links) => links.next().map(str::to_string),
            Self::Markdown(links) => links.next(),
        }
    }
}
