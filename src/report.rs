use std::path::Path;

use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use crate::models::{ModuleType, ProductionSummary};

/// Render the production scan summary to the terminal.
pub fn render_production(summary: &ProductionSummary, path: &Path, quiet: bool) {
    let resolved = summary
        .packages
        .iter()
        .filter(|p| p.module_type == ModuleType::ThirdParty && p.version != "unknown")
        .count();
    let unresolved = summary.packages.len() - resolved;

    if quiet {
        println!(
            "Modules: {}  Packages: {}  Resolved: {}  Unresolved: {}",
            summary.module_count,
            summary.packages.len(),
            resolved.to_string().green(),
            unresolved.to_string().yellow(),
        );
        return;
    }

    println!("\n {} v{}", "depmon".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Production scan: {}\n", path.display());
    println!(
        " {} bundled modules, {} distinct packages ({} resolved, {} without metadata)\n",
        summary.module_count,
        summary.packages.len(),
        resolved.to_string().green(),
        unresolved.to_string().yellow(),
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Package", "Version", "License", "Type"]);

    for package in &summary.packages {
        table.add_row(vec![
            Cell::new(&package.name),
            Cell::new(&package.version),
            Cell::new(&package.license),
            Cell::new(package.module_type.to_string()),
        ]);
    }

    println!("{table}");
}
