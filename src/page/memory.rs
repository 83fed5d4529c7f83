use std::collections::BTreeMap;
use std::io;

use parking_lot::RwLock;

use super::PageSource;
use crate::core::PageName;

/// In-memory page set, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPages {
    pages: RwLock<BTreeMap<PageName, String>>,
}

impl MemoryPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, text)` pairs.
    pub fn with_pages<'a>(pages: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let source = Self::new();
        for (name, text) in pages {
            source.write(name, text);
        }
        source
    }

    pub fn write(&self, name: &str, text: &str) {
        self.pages.write().insert(name.into(), text.to_string());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.pages.write().remove(name)
    }

    /// Move the text of `old` to `new`. Returns `false` if `old` is missing.
    pub fn rename(&self, old: &str, new: &str) -> bool {
        let mut pages = self.pages.write();
        match pages.remove(old) {
            Some(text) => {
                pages.insert(new.into(), text);
                true
            }
            None => false,
        }
    }
}

impl PageSource for MemoryPages {
    fn page_names(&self) -> io::Result<Vec<PageName>> {
        Ok(self.pages.read().keys().cloned().collect())
    }

    fn read(&self, name: &PageName) -> io::Result<Option<String>> {
        Ok(self.pages.read().get(name).cloned())
    }
}
