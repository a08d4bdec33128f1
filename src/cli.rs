use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "depmon",
    about = "Runtime dependency inventory collector for Node.js applications",
    version
)]
pub struct Cli {
    /// Run mode: development serves the collector API; production runs the
    /// bundler build and scrapes its stats report
    #[arg(default_value = "development", value_name = "MODE")]
    pub mode: Mode,

    /// Node application root (where node_modules is searched from)
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Collector API port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Config file [default: ./.depmon/config.toml, fallback ~/.config/depmon/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dependency store file, relative to the project path (overrides config)
    #[arg(long, value_name = "FILE")]
    pub store: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the production summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Development,
    Production,
}
