//! Page content collaborators.
//!
//! The index never owns page text. It reads it through a [`PageSource`],
//! which lists the pages that currently exist and returns their text.

mod dir;
mod memory;

pub use dir::DirPageSource;
pub use memory::MemoryPages;

use std::io;

use crate::core::PageName;

/// Read access to the wiki's pages.
pub trait PageSource: Send + Sync {
    /// Names of every page that currently exists.
    fn page_names(&self) -> io::Result<Vec<PageName>>;

    /// Current text of `name`, or `None` if no such page exists.
    fn read(&self, name: &PageName) -> io::Result<Option<String>>;
}
