use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

/// Root configuration structure, deserialized from `.depmon/config.toml`.
/// Every field has a default, so an absent file means a usable config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Collector API listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Override for the host Node.js version string; when unset it is probed
    /// via `node --version` at startup.
    #[serde(default)]
    pub node_version: Option<String>,

    /// Dynamic dependency store file, relative to the project path.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Production bundled-module records file, relative to the project path.
    #[serde(default = "default_production_modules_file")]
    pub production_modules_file: String,

    /// Production extracted-package summary file, relative to the project path.
    #[serde(default = "default_production_summary_file")]
    pub production_summary_file: String,

    /// Optional newline-delimited list of already-resolved module file paths
    /// (the host's module cache, dumped by a loader hook). When present,
    /// development mode runs the backward cache scan over it.
    #[serde(default)]
    pub module_cache_file: Option<PathBuf>,

    /// Bundler build command run in production mode. Non-zero exit is fatal.
    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,

    /// Bundler stats report the production scan reads after the build.
    #[serde(default = "default_stats_file")]
    pub stats_file: String,

    /// Out-of-process test script fired by POST /monitor/run-tests.
    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,
}

fn default_port() -> u16 {
    4001
}

fn default_store_file() -> String {
    "dynamic-dependencies.json".to_string()
}

fn default_production_modules_file() -> String {
    "production-dependencies.json".to_string()
}

fn default_production_summary_file() -> String {
    "extracted-packages.json".to_string()
}

fn default_build_command() -> Vec<String> {
    vec!["npm".to_string(), "run".to_string(), "build".to_string()]
}

fn default_stats_file() -> String {
    "build/bundle-stats.json".to_string()
}

fn default_test_command() -> Vec<String> {
    vec!["node".to_string(), "server-test-runner.js".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_port(),
            node_version: None,
            store_file: default_store_file(),
            production_modules_file: default_production_modules_file(),
            production_summary_file: default_production_summary_file(),
            module_cache_file: None,
            build_command: default_build_command(),
            stats_file: default_stats_file(),
            test_command: default_test_command(),
        }
    }
}

impl Config {
    pub fn store_path(&self, project_path: &Path) -> PathBuf {
        project_path.join(&self.store_file)
    }

    pub fn production_modules_path(&self, project_path: &Path) -> PathBuf {
        project_path.join(&self.production_modules_file)
    }

    pub fn production_summary_path(&self, project_path: &Path) -> PathBuf {
        project_path.join(&self.production_summary_file)
    }

    pub fn stats_path(&self, project_path: &Path) -> PathBuf {
        project_path.join(&self.stats_file)
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.depmon/config.toml`
/// 3. `~/.config/depmon/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_path.join(".depmon").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("depmon").join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(Config::default())
}
