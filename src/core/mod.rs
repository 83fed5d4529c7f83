//! Core types - pure abstractions shared across the codebase.

mod link;
mod name;

pub use link::{LinkKind, is_external_link, split_path_fragment};
pub use name::PageName;

/// Set of page names, as stored per node in either direction.
pub type PageSet = rustc_hash::FxHashSet<PageName>;
