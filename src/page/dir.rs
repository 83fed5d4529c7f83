//! Pages stored as files under a directory.
//!
//! `pages/Main.txt` is the page `Main`; `pages/Team/Alice.txt` is
//! `Team/Alice`. Files with another extension are ignored.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::PageSource;
use crate::core::PageName;

#[derive(Debug, Clone)]
pub struct DirPageSource {
    dir: PathBuf,
    extension: String,
}

impl DirPageSource {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `name`, or `None` if the name cannot map to a file
    /// inside the pages directory.
    pub fn path_for(&self, name: &PageName) -> Option<PathBuf> {
        let relative = Path::new(name.as_str());
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return None;
        }
        Some(self.dir.join(format!("{}.{}", name, self.extension)))
    }

    /// Write the text of `name`, creating parent directories.
    pub fn write(&self, name: &PageName, text: &str) -> io::Result<()> {
        let path = self.checked_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    }

    /// Delete the file backing `name`. Returns `false` if it did not exist.
    pub fn remove(&self, name: &PageName) -> io::Result<bool> {
        let path = self.checked_path(name)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Move the file backing `old` to `new`. Fails if `new` already exists.
    pub fn rename(&self, old: &PageName, new: &PageName) -> io::Result<()> {
        let from = self.checked_path(old)?;
        let to = self.checked_path(new)?;
        if to.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("page `{new}` already exists"),
            ));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)
    }

    fn checked_path(&self, name: &PageName) -> io::Result<PathBuf> {
        self.path_for(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("`{name}` is not a valid page file name"),
            )
        })
    }

    fn collect(&self, dir: &Path, out: &mut Vec<PageName>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect(&path, out)?;
                continue;
            }
            if path.extension().is_none_or(|ext| ext != self.extension.as_str()) {
                continue;
            }
            let stem = path.with_extension("");
            let Ok(relative) = stem.strip_prefix(&self.dir) else {
                continue;
            };
            let parts: Option<Vec<&str>> = relative
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect();
            if let Some(parts) = parts
                && let Some(name) = PageName::new(&parts.join("/"))
            {
                out.push(name);
            }
        }
        Ok(())
    }
}

impl PageSource for DirPageSource {
    fn page_names(&self) -> io::Result<Vec<PageName>> {
        let mut names = Vec::new();
        if self.dir.is_dir() {
            self.collect(&self.dir, &mut names)?;
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &PageName) -> io::Result<Option<String>> {
        let Some(path) = self.path_for(name) else {
            return Ok(None);
        };
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
