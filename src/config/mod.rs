//! Wiki configuration management for `wikiref.toml`.
//!
//! # Sections
//!
//! | Section   | Purpose                                        |
//! |-----------|------------------------------------------------|
//! | `[pages]` | Pages directory and page file extension        |
//! | `[index]` | Markup dialect and singular/plural matching    |
//! | `[store]` | Reference store location                       |
//!
//! Every field has a default, so a wiki works without a config file. Paths
//! are relative to the directory containing `wikiref.toml` (or the current
//! directory when there is none). CLI flags override the file.

mod error;
mod section;
mod util;

pub use error::ConfigError;
pub use section::{IndexConfig, PagesConfig, StoreConfig};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::{debug, log};
use util::{find_config_file, normalize_path};

/// Root configuration structure representing wikiref.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Wiki root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub pages: PagesConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl WikiConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file. The wiki root is the
    /// config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
                config.config_path = path;
                config
            }
            None => {
                debug!("config"; "{} not found, using defaults", cli.config.display());
                Self {
                    config_path: cwd.join(&cli.config),
                    root: cwd,
                    ..Self::default()
                }
            }
        };

        config.apply_cli(cli);
        config.normalize_paths();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply global CLI overrides.
    fn apply_cli(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        Self::update_option(&mut self.pages.dir, cli.pages.as_ref());
        Self::update_option(&mut self.store.dir, cli.store.as_ref());
        Self::update_option(&mut self.index.syntax, cli.syntax.as_ref());
        if cli.no_plurals {
            self.index.match_plurals = false;
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve directories against the wiki root.
    fn normalize_paths(&mut self) {
        self.root = normalize_path(&self.root);
        self.pages.dir = self.root.join(&self.pages.dir);
        self.store.dir = self.root.join(&self.store.dir);
        self.pages.extension = self.pages.extension.trim_start_matches('.').to_string();
    }

    // ========================================================================
    // validation
    // ========================================================================

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.pages.extension;
        if ext.is_empty() {
            return Err(ConfigError::Validation("pages.extension must not be empty".into()));
        }
        if ext.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "pages.extension `{ext}` must not contain path separators"
            )));
        }
        // Node files would be listed as pages
        let store_in_pages = self.store.dir.starts_with(&self.pages.dir) && ext == "json";
        if self.pages.dir == self.store.dir || store_in_pages {
            return Err(ConfigError::Validation(format!(
                "store.dir `{}` overlaps the pages directory",
                self.store.dir.display()
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn pages_dir(&self) -> &Path {
        &self.pages.dir
    }

    #[inline]
    pub fn store_dir(&self) -> &Path {
        &self.store.dir
    }
}
