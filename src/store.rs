use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::models::{DependencyRecord, GroupedDependencies, ModuleType};

/// Outcome of [`DependencyStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// First observation of this base name; a record was appended.
    Added,
    /// The name was already tracked; first classification wins.
    Duplicate,
}

/// Filter options for [`DependencyStore::query`], mapped from the
/// `/monitor/dependencies` query parameters.
#[derive(Debug, Default, Clone)]
pub struct QueryFilter {
    pub module_type: Option<ModuleType>,
    pub exclude_builtins: bool,
}

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub total: usize,
    pub grouped: GroupedDependencies,
    pub dependencies: Vec<DependencyRecord>,
}

/// Append-only, deduplicated JSON-array store of dependency records.
///
/// Deduplication is by base package name only, independent of record type,
/// so mixed historical schemas cannot produce double entries. Writes are
/// whole-file read-modify-write; callers serialize access through one lock
/// (see `AppState`), which is what makes concurrent adds of distinct names
/// both land. I/O failures are logged and absorbed — this is a best-effort
/// observability store, not a durable ledger.
#[derive(Debug)]
pub struct DependencyStore {
    path: PathBuf,
    tracked: HashSet<String>,
}

impl DependencyStore {
    /// Open the store, creating the backing file as an empty collection if
    /// absent, and seed the in-memory dedup set from stored names. A file
    /// that fails to parse is treated as empty. Never fails.
    pub fn initialize(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tracked = HashSet::new();

        if !path.exists() {
            if let Err(e) = std::fs::write(&path, "[]") {
                tracing::error!("could not create store file {}: {e}", path.display());
            } else {
                tracing::info!("created dependency store at {}", path.display());
            }
        } else {
            // Seed tolerantly: accept the legacy `package` field as a name
            // alias so older store files still deduplicate correctly
            match read_raw_entries(&path) {
                Ok(entries) => {
                    for entry in &entries {
                        let name = entry
                            .get("name")
                            .or_else(|| entry.get("package"))
                            .and_then(|v| v.as_str());
                        if let Some(name) = name {
                            tracked.insert(name.to_string());
                        }
                    }
                    tracing::info!(
                        "loaded {} existing dependencies from {}",
                        tracked.len(),
                        path.display()
                    );
                }
                Err(e) => {
                    tracing::warn!("could not load existing store {}: {e}", path.display());
                }
            }
        }

        DependencyStore { path, tracked }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tracked.contains(name)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn tracked_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tracked.iter().cloned().collect();
        names.sort();
        names
    }

    /// Append a record unless its name is already tracked.
    ///
    /// The file is handled as a raw JSON array so legacy and mixed-schema
    /// entries pass through untouched; the new record is appended to
    /// whatever is already there. The name enters the dedup set before the
    /// file write, so a failed write silently drops the record (accepted
    /// lossy-write policy) rather than retrying or erroring.
    pub fn add(&mut self, record: DependencyRecord) -> AddOutcome {
        if !self.tracked.insert(record.name.clone()) {
            return AddOutcome::Duplicate;
        }

        let mut entries = match read_raw_entries(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    "error reading store {}, treating as empty: {e}",
                    self.path.display()
                );
                Vec::new()
            }
        };
        let stored_name = |entry: &Value| {
            entry
                .get("name")
                .or_else(|| entry.get("package"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        if entries.iter().any(|e| stored_name(e).as_deref() == Some(&record.name)) {
            return AddOutcome::Duplicate;
        }

        tracing::info!(
            "added dynamic dependency: {}@{} ({})",
            record.name,
            record.version,
            record.module_type
        );
        match serde_json::to_value(&record) {
            Ok(value) => entries.push(value),
            Err(e) => {
                tracing::error!("error serializing record {}: {e}", record.name);
                return AddOutcome::Added;
            }
        }

        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::error!("error writing store {}: {e}", self.path.display());
                }
            }
            Err(e) => tracing::error!("error serializing store: {e}"),
        }

        AddOutcome::Added
    }

    /// Read the whole store and return records matching `filter`, grouped by
    /// module type.
    pub fn query(&self, filter: &QueryFilter) -> QueryResult {
        let mut records = self.read_records();

        if let Some(module_type) = filter.module_type {
            records.retain(|r| r.module_type == module_type);
        }
        if filter.exclude_builtins {
            records.retain(|r| r.module_type != ModuleType::Builtin);
        }

        QueryResult {
            total: records.len(),
            grouped: GroupedDependencies::from_records(&records),
            dependencies: records,
        }
    }

    /// Records grouped by their `detected_by` observation source.
    pub fn query_by_context(&self) -> BTreeMap<String, Vec<DependencyRecord>> {
        let mut by_context: BTreeMap<String, Vec<DependencyRecord>> = BTreeMap::new();
        for record in self.read_records() {
            by_context
                .entry(record.detected_by.clone())
                .or_default()
                .push(record);
        }
        by_context
    }

    /// Parse the backing file, treating a read or whole-file parse failure
    /// as an empty collection. Entries are deserialized one at a time so a
    /// single legacy or malformed entry drops only itself, never the rest of
    /// the store.
    fn read_records(&self) -> Vec<DependencyRecord> {
        let entries = match read_raw_entries(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("error reading store {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value(entry) {
                Ok(record) => records.push(record),
                Err(e) => tracing::debug!("skipping unreadable store entry: {e}"),
            }
        }
        records
    }
}

fn read_raw_entries(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}
