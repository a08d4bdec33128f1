use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::models::{BundledModule, ProductionSummary};

pub mod webpack;

/// Best-effort adapter over one bundler's module-size report. The extraction
/// is inherently heuristic and bundler-version-dependent, which is why it
/// lives behind this seam instead of inside the core classifier.
pub trait BundleAnalyzer {
    /// Read the bundler's stats report and return the third-party modules it
    /// bundled (their internal path strings plus sizes).
    fn analyze(&self, stats_path: &Path) -> Result<Vec<BundledModule>>;
}

/// Extract distinct base package names from bundler-internal module path
/// strings like `./node_modules/@babel/runtime/helpers/esm/extends.js`.
pub fn extract_package_names(modules: &[BundledModule]) -> Result<Vec<String>> {
    let package_re = Regex::new(r"node_modules[/\\]((?:@[^/\\]+[/\\])?[^/\\]+)")?;
    let mut names = Vec::new();
    for module in modules {
        if let Some(caps) = package_re.captures(&module.name) {
            let name = caps[1].replace('\\', "/");
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}

/// Run the full production scan: build, scrape the stats report, persist the
/// module and package inventories.
///
/// The build subprocess is the one fatal path in the pipeline — a non-zero
/// exit aborts the scan with an error instead of degrading.
pub async fn run_production_scan(
    config: &Config,
    project_path: &Path,
    classifier: &Classifier,
    quiet: bool,
) -> Result<ProductionSummary> {
    run_build(&config.build_command, project_path, quiet).await?;

    let analyzer = webpack::WebpackStatsAnalyzer;
    let stats_path = config.stats_path(project_path);
    let modules = analyzer
        .analyze(&stats_path)
        .with_context(|| format!("reading bundler stats at {}", stats_path.display()))?;
    tracing::info!("bundle stats list {} third-party modules", modules.len());

    let modules_path = config.production_modules_path(project_path);
    std::fs::write(&modules_path, serde_json::to_string_pretty(&modules)?)
        .with_context(|| format!("writing {}", modules_path.display()))?;

    let packages = extract_package_names(&modules)?
        .iter()
        .filter_map(|name| classifier.classify(name, "production-build"))
        .collect();
    let summary = ProductionSummary {
        generated_at: Utc::now(),
        module_count: modules.len(),
        packages,
    };

    let summary_path = config.production_summary_path(project_path);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    Ok(summary)
}

async fn run_build(command: &[String], project_path: &Path, quiet: bool) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("build command is empty");
    };

    let spinner = if !quiet {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Running build: {}", command.join(" ")));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(project_path)
        .output()
        .await
        .with_context(|| format!("spawning build command `{program}`"))?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "build command `{}` failed with {}: {}",
            command.join(" "),
            output.status,
            stderr.trim_end()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> BundledModule {
        BundledModule {
            name: name.to_string(),
            size: 1024,
        }
    }

    #[test]
    fn test_extract_package_names() {
        let modules = vec![
            module("./node_modules/react/index.js"),
            module("./node_modules/react/cjs/react.production.min.js"),
            module("./node_modules/@babel/runtime/helpers/esm/extends.js"),
            module("./src/App.js"),
        ];
        let names = extract_package_names(&modules).unwrap();
        assert_eq!(names, vec!["react", "@babel/runtime"]);
    }

    #[test]
    fn test_extract_handles_windows_separators() {
        let modules = vec![module(r".\node_modules\lodash\lodash.js")];
        let names = extract_package_names(&modules).unwrap();
        assert_eq!(names, vec!["lodash"]);
    }
}
