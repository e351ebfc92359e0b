use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use kiln_config::Manifest;
use kiln_core::SourceKind;

use super::UnwrapOrExit;
use crate::backend;

#[derive(Args)]
pub struct CheckCommand {
    /// Path to kiln.toml (defaults to ./kiln.toml)
    #[arg(short, long, default_value = "kiln.toml")]
    pub config: PathBuf,
}

impl CheckCommand {
    /// Run the check command
    pub fn run(&self) -> Result<()> {
        let manifest = Manifest::from_file(&self.config).unwrap_or_exit();
        let classifier = manifest.classifier();
        let registry = backend::registry();

        let mut problems = 0usize;
        let mut natives = 0usize;
        let mut templates = 0usize;
        for path in &manifest.sources.include {
            match classifier.classify(path) {
                Some(SourceKind::Native) => natives += 1,
                Some(SourceKind::Template) => templates += 1,
                None => {
                    problems += 1;
                    eprintln!("warning: unknown file type for '{}'", path.display());
                }
            }
            if !path.exists() {
                problems += 1;
                eprintln!("error: '{}' does not exist", path.display());
            }
        }
        for module in &manifest.modules.order {
            if !registry.contains(module) {
                problems += 1;
                eprintln!("error: unknown compile module '{module}'");
            }
        }

        if problems > 0 {
            eprintln!("✗ {} problem(s) in {}", problems, self.config.display());
            std::process::exit(1);
        }

        println!("✓ {} is valid\n", self.config.display());
        println!("  unit '{}'", manifest.unit.name);
        println!("  {natives} native source(s), {templates} template(s)");
        if !manifest.modules.order.is_empty() {
            println!("  modules: {}", manifest.modules.order.join(", "));
        }
        match &manifest.cache.dir {
            Some(dir) => println!("  cache at {}", dir.display()),
            None => println!("  cache disabled"),
        }
        Ok(())
    }
}
