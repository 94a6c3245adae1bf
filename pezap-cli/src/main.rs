mod app;
mod output;

use anyhow::Context;
use clap::Parser;

use pezap::{PatchOptions, Patcher};

use crate::{app::Cli, output::PatchSummary};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show pezap info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("pezap", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    let options = PatchOptions {
        dry_run: cli.dry_run,
    };
    let pdb = cli.pdb.as_deref();

    let report = Patcher::new(options)
        .run(&cli.image, pdb)
        .with_context(|| format!("failed to patch '{}'", cli.image.display()))?;

    let summary = PatchSummary::new(&cli.image, pdb, &report);
    if cli.global.json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{}", summary.to_text());
    }
    Ok(())
}
