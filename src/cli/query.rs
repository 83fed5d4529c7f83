//! Read-only query commands.
//!
//! Plain output is one page name per line, sorted; `--json` prints a JSON
//! array (or object for `stats`) so the output can be piped into other tools.

use std::io::{self, Write};

use anyhow::Result;

use super::args::OutputArgs;
use super::common::{open_index, page_name};
use crate::config::WikiConfig;
use crate::core::PageName;

pub fn refers_to(config: &WikiConfig, page: &str, output: OutputArgs) -> Result<()> {
    let name = page_name(page)?;
    let (index, _) = open_index(config)?;
    print_names(&index.get_refers_to(name.as_str()), output)
}

pub fn referred_by(config: &WikiConfig, page: &str, output: OutputArgs) -> Result<()> {
    let name = page_name(page)?;
    let (index, _) = open_index(config)?;
    print_names(&index.get_referred_by(name.as_str()), output)
}

pub fn uncreated(config: &WikiConfig, output: OutputArgs) -> Result<()> {
    let (index, _) = open_index(config)?;
    print_names(&index.find_uncreated(), output)
}

pub fn unreferenced(config: &WikiConfig, output: OutputArgs) -> Result<()> {
    let (index, _) = open_index(config)?;
    print_names(&index.find_unreferenced(), output)
}

pub fn stats(config: &WikiConfig, output: OutputArgs) -> Result<()> {
    let (index, _) = open_index(config)?;
    let stats = index.stats();

    let mut out = io::stdout().lock();
    if output.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
    } else {
        writeln!(out, "pages:        {}", stats.pages)?;
        writeln!(out, "references:   {}", stats.edges)?;
        writeln!(out, "uncreated:    {}", stats.uncreated)?;
        writeln!(out, "unreferenced: {}", stats.unreferenced)?;
    }
    Ok(())
}

fn print_names(names: &[PageName], output: OutputArgs) -> Result<()> {
    let mut out = io::stdout().lock();
    write_names(&mut out, names, output)?;
    Ok(())
}

fn write_names(out: &mut impl Write, names: &[PageName], output: OutputArgs) -> Result<()> {
    if output.json {
        writeln!(out, "{}", serde_json::to_string(names)?)?;
    } else {
        for name in names {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}
