use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use kiln_compile::Precompiler;
use kiln_config::Manifest;

use super::UnwrapOrExit;
use crate::backend;

#[derive(Args)]
pub struct BuildCommand {
    /// Path to kiln.toml (defaults to ./kiln.toml)
    #[arg(short, long, default_value = "kiln.toml")]
    pub config: PathBuf,

    /// Transformation worker count (defaults to available parallelism)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the run report as JSON instead of human-readable output
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub fn run(&self) -> Result<()> {
        let manifest = Manifest::from_file(&self.config).unwrap_or_exit();

        let precompiler = Precompiler::new(backend::engine(), backend::emitter())
            .with_registry(backend::registry());
        let report = precompiler.run(&backend::compile_options(&manifest, self.jobs));

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            // Diagnostics go to stderr, one per line; stdout is reserved
            // for the outcome.
            for diag in report.diagnostics.iter().filter(|d| d.is_reportable()) {
                eprintln!("{diag}");
            }
            if report.success {
                for path in &report.written {
                    println!("wrote {}", path.display());
                }
                println!("✓ built '{}'", manifest.unit.name);
            } else {
                eprintln!("✗ build of '{}' failed", manifest.unit.name);
            }
        }

        if !report.success {
            std::process::exit(1);
        }
        Ok(())
    }
}
