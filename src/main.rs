//! `depmon` — runtime dependency inventory collector for Node.js applications.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`config::load_config`]).
//! 3. Probe the host Node.js version ([`builtins::detect_node_version`]).
//! 4. Development mode: open the store ([`store`]), run the backward cache
//!    scan and forward builtin scan ([`interceptor`]), serve the collector
//!    API ([`server`]).
//! 5. Production mode: run the bundler build, scrape its stats report
//!    ([`bundle`]), write the production inventory, render the summary
//!    ([`report`]), and exit. A failed build is fatal.

mod builtins;
mod bundle;
mod classifier;
mod cli;
mod config;
mod interceptor;
mod models;
mod report;
mod server;
mod store;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use classifier::Classifier;
use cli::{Cli, Mode};
use config::Config;
use interceptor::Interceptor;
use server::AppState;
use store::DependencyStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let path = cli.path.canonicalize().unwrap_or_else(|_| cli.path.clone());

    let mut config = config::load_config(&path, cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(store_file) = cli.store {
        config.store_file = store_file;
    }

    let node_version = config.node_version.clone().or_else(builtins::detect_node_version);
    match &node_version {
        Some(version) => tracing::info!("host Node.js version: {version}"),
        None => tracing::warn!("could not detect Node.js version; builtin records will carry 'unknown'"),
    }
    let classifier = Classifier::new(&path, node_version);

    match cli.mode {
        Mode::Development => run_development(config, &path, classifier).await,
        Mode::Production => {
            let summary = bundle::run_production_scan(&config, &path, &classifier, cli.quiet).await?;
            report::render_production(&summary, &path, cli.quiet);
            Ok(())
        }
    }
}

/// Start the collector: open the store, run the startup scans, serve HTTP.
async fn run_development(config: Config, path: &Path, classifier: Classifier) -> Result<()> {
    let store = DependencyStore::initialize(config.store_path(path));
    tracing::info!("dependency store: {}", store.path().display());
    let store = Arc::new(Mutex::new(store));

    let interceptor = Interceptor::new(classifier, store);

    // Backward scan: module paths the host resolved before the monitor ran
    if let Some(cache_file) = &config.module_cache_file {
        let cache_path = path.join(cache_file);
        match std::fs::read_to_string(&cache_path) {
            Ok(content) => {
                let observed = interceptor.scan_cache(content.lines()).await;
                tracing::info!(
                    "module cache scan observed {observed} new dependencies from {}",
                    cache_path.display()
                );
            }
            Err(e) => {
                tracing::warn!("could not read module cache {}: {e}", cache_path.display())
            }
        }
    }

    // Forward scan: every known builtin, imported or not
    let observed = interceptor.scan_builtins().await;
    tracing::info!(
        "builtin scan observed {observed} of {} built-in modules",
        builtins::NODE_BUILTINS.len()
    );

    {
        let store = interceptor.store().lock().await;
        tracing::info!("currently tracking {} dependencies", store.tracked_count());
    }

    let port = config.port;
    let state = Arc::new(AppState {
        interceptor,
        config,
        project_path: path.to_path_buf(),
    });
    server::start_server(port, state).await
}
