//! wikiref - a persistent reference index for wiki pages.

#![allow(dead_code)]

mod cli;
mod config;
mod core;
mod extract;
mod index;
mod logger;
mod page;
mod resolve;
mod store;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::WikiConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = WikiConfig::load(&cli)?;

    match &cli.command {
        Commands::Rebuild => cli::maintain::rebuild(&config),
        Commands::Sync => cli::maintain::sync(&config),
        Commands::Save { page } => cli::maintain::save(&config, page),
        Commands::Delete { page } => cli::maintain::delete(&config, page),
        Commands::Rename { old, new } => cli::maintain::rename(&config, old, new),
        Commands::RefersTo { page, output } => cli::query::refers_to(&config, page, *output),
        Commands::ReferredBy { page, output } => cli::query::referred_by(&config, page, *output),
        Commands::Uncreated { output } => cli::query::uncreated(&config, *output),
        Commands::Unreferenced { output } => cli::query::unreferenced(&config, *output),
        Commands::Stats { output } => cli::query::stats(&config, *output),
    }
}
