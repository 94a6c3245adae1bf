use std::path::PathBuf;

use clap::Parser;

/// pezap - make Windows PE images and their PDB files reproducible
#[derive(Debug, Parser)]
#[command(name = "pezap", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Path to the PE image (EXE or DLL) to patch in place.
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Path to the PDB belonging to the image. Rewritten to match the patched image.
    #[arg(value_name = "PDB")]
    pub pdb: Option<PathBuf>,

    /// Run every check and report what would change, without modifying any file.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Options controlling output.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
