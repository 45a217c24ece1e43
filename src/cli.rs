use crate::config::harness::HarnessConfig;
use crate::harness::{self, Signal, TARGETS};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Harness configuration (JSON); defaults apply to missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay corpus files through a harness
    Run {
        /// Harness name (see `list`)
        target: String,
        /// Input files, one run each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List harnesses and their minimum input lengths
    List,
}

fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("loading harness config {}", path.display())),
        None => Ok(HarnessConfig::default()),
    }
}

/// Replay each file and report the signal per file.
fn replay(target: &str, files: &[PathBuf], config: &HarnessConfig) -> Result<Vec<(PathBuf, Signal)>> {
    let harness = harness::by_name(target, config).ok_or_else(|| {
        anyhow::anyhow!("unknown target {:?} (expected one of {})", target, TARGETS.join(", "))
    })?;

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        log::debug!("replaying {} ({} bytes) through {}", file.display(), data.len(), target);
        results.push((file.clone(), harness.run(&data)));
    }
    Ok(results)
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run { target, files } => {
            for (file, signal) in replay(&target, &files, &config)? {
                println!("{}: {}", file.display(), signal);
            }
        }
        Commands::List => {
            for name in TARGETS {
                if let Some(harness) = harness::by_name(name, &config) {
                    println!("{:<10} min_len={}", harness.name(), harness.min_len());
                }
            }
        }
    }

    Ok(())
}
