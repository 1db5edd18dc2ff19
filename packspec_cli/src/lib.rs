//! packspec CLI
//!
//! Command line runner for packspec specifications. Crates under test embed
//! it by registering their packages and calling [`run`] from their own `main`.

use clap::Parser;
use packspec_core::{
    ConsoleReporter, ExtensionRegistry, PackageRegistry, Reporter, Result, RunnerConfig,
    SpecExecutor, SpecLoader,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Configuration file picked up from the working directory
pub const CONFIG_FILE: &str = "packspec.yml";

#[derive(Parser, Debug)]
#[command(name = "packspec")]
#[command(about = "Run packspec contract specifications")]
pub struct Cli {
    /// Specification file or directory
    pub path: Option<PathBuf>,

    /// Runtime tag used to select tagged features
    #[arg(long)]
    pub tag: Option<String>,

    /// Stop at the first failing feature
    #[arg(short = 'x', long)]
    pub exit_first: bool,

    /// Configuration file (defaults to packspec.yml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Runner settings: config file first, then command line overrides
    pub fn runner_config(&self) -> Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load_file(path)?,
            None if Path::new(CONFIG_FILE).is_file() => RunnerConfig::load_file(CONFIG_FILE)?,
            None => RunnerConfig::default(),
        };
        if let Some(tag) = &self.tag {
            config.runtime_tag = tag.clone();
        }
        config.exit_first |= self.exit_first;
        Ok(config)
    }
}

/// Parse arguments, run, and map overall success to the exit status
pub fn run(packages: PackageRegistry, extensions: ExtensionRegistry) -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let mut reporter = ConsoleReporter::stdout();
    match execute(&cli, packages, extensions, &mut reporter) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{}", err);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Load and run the specifications `cli` points at
pub fn execute(
    cli: &Cli,
    packages: PackageRegistry,
    extensions: ExtensionRegistry,
    reporter: &mut dyn Reporter,
) -> Result<bool> {
    let config = cli.runner_config()?;
    let specs = SpecLoader::new(&config)?
        .with_packages(packages)
        .with_extensions(extensions)
        .load_path(cli.path.as_deref())?;
    tracing::info!("Running {} specifications", specs.len());
    SpecExecutor::new(config).run_all(specs, reporter)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
