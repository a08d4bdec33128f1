use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::BundleAnalyzer;
use crate::models::BundledModule;

/// Reads a webpack `--json` stats document and keeps the modules that came
/// out of `node_modules`. Tied to webpack's internal naming conventions;
/// other bundlers get their own [`BundleAnalyzer`].
pub struct WebpackStatsAnalyzer;

impl BundleAnalyzer for WebpackStatsAnalyzer {
    fn analyze(&self, stats_path: &Path) -> Result<Vec<BundledModule>> {
        let content = std::fs::read_to_string(stats_path)
            .with_context(|| format!("reading {}", stats_path.display()))?;
        let stats: Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", stats_path.display()))?;

        let mut modules = Vec::new();
        collect_modules(&stats, &mut modules);
        Ok(modules)
    }
}

/// Walk a stats document for module entries. Multi-compilation builds nest
/// their stats under `children`, so recurse into those as well.
fn collect_modules(stats: &Value, out: &mut Vec<BundledModule>) {
    if let Some(list) = stats.get("modules").and_then(|m| m.as_array()) {
        for entry in list {
            let name = entry
                .get("name")
                .or_else(|| entry.get("identifier"))
                .and_then(|n| n.as_str());
            let Some(name) = name else { continue };
            if !name.contains("node_modules") {
                continue;
            }
            let size = entry
                .get("size")
                .and_then(|s| s.as_f64())
                .unwrap_or(0.0)
                .max(0.0) as u64;
            out.push(BundledModule {
                name: name.to_string(),
                size,
            });
        }
    }

    if let Some(children) = stats.get("children").and_then(|c| c.as_array()) {
        for child in children {
            collect_modules(child, out);
        }
    }
}
