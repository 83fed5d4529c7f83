//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::extract::Syntax;

/// Wiki reference index: who links to what, dangling links and orphan pages
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: wikiref.toml, searched upward from cwd)
    #[arg(short = 'C', long, global = true, default_value = "wikiref.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Pages directory (relative to the wiki root)
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub pages: Option<PathBuf>,

    /// Reference store directory (relative to the wiki root)
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub store: Option<PathBuf>,

    /// Markup dialect of the pages
    #[arg(long, global = true, value_enum)]
    pub syntax: Option<Syntax>,

    /// Only match link names exactly (no singular/plural aliasing)
    #[arg(long, global = true)]
    pub no_plurals: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Rebuild the whole index from the pages directory
    Rebuild,

    /// Re-index pages that changed since the index was last written
    Sync,

    /// Index a page after it was created or edited
    Save {
        /// Page name
        page: String,
    },

    /// Delete a page file and drop it from the index
    Delete {
        /// Page name
        page: String,
    },

    /// Rename a page file and repoint references to it
    Rename {
        /// Current page name
        old: String,
        /// New page name
        new: String,
    },

    /// List pages a page links to
    #[command(visible_alias = "out")]
    RefersTo {
        /// Page name
        page: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List pages linking to a page
    #[command(visible_alias = "in")]
    ReferredBy {
        /// Page name
        page: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List link targets that have no page
    Uncreated {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List pages nothing links to
    Unreferenced {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print index statistics
    Stats {
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Output options shared by query commands.
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct OutputArgs {
    /// Print JSON instead of one name per line
    #[arg(short, long)]
    pub json: bool,
}
