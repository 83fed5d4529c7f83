//! Link classification utilities.

/// Syntactic classification of link targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind<'a> {
    /// External link with URL scheme (https://, mailto:, interwiki `Wikipedia:Foo`, ...)
    External(&'a str),
    /// Pure fragment/anchor link (#section). Value is anchor without `#`.
    Fragment(&'a str),
    /// Pure footnote reference (`1`, `#1`). Value is the number.
    Footnote(&'a str),
    /// Site-root-relative path (/About).
    SiteRoot(&'a str),
    /// Plain page name or relative path (Main, ./Other).
    Page(&'a str),
}

impl<'a> LinkKind<'a> {
    /// Parse a link target into its syntactic kind.
    #[inline]
    pub fn parse(link: &'a str) -> Self {
        if is_external_link(link) {
            Self::External(link)
        } else if is_footnote(link) {
            Self::Footnote(link.trim_start_matches('#'))
        } else if let Some(anchor) = link.strip_prefix('#') {
            Self::Fragment(anchor)
        } else if let Some(anchor) = link.strip_prefix("./#") {
            // ./#fragment is semantically equivalent to #fragment (current page anchor)
            Self::Fragment(anchor)
        } else if link.starts_with('/') {
            Self::SiteRoot(link)
        } else {
            Self::Page(link)
        }
    }

    /// Page name this link points at, with any `#section` suffix dropped.
    ///
    /// Returns `None` for external, anchor and footnote links, and for targets
    /// that are empty once the section is removed.
    pub fn page_target(self) -> Option<&'a str> {
        let raw = match self {
            Self::SiteRoot(path) => path.trim_start_matches('/'),
            Self::Page(path) => path.strip_prefix("./").unwrap_or(path),
            Self::External(_) | Self::Fragment(_) | Self::Footnote(_) => return None,
        };
        let name = split_path_fragment(raw).0.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Check whether a link has a URL scheme (`scheme:` prefix).
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split a target into path and fragment parts
#[inline]
pub fn split_path_fragment(target: &str) -> (&str, &str) {
    target.split_once('#').unwrap_or((target, ""))
}

fn is_footnote(link: &str) -> bool {
    let digits = link.strip_prefix('#').unwrap_or(link);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
