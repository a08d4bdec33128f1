use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::builtins;
use crate::models::{unknown, DependencyRecord, ModuleType};

/// Why classification degraded instead of producing full metadata.
///
/// Mirrors the two failure taxonomy entries that end up in records: a package
/// whose manifest cannot be located stays `third-party` with version
/// `unknown`; a manifest that exists but cannot be read or parsed demotes the
/// record to `unresolved`.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("could not resolve module: {0}")]
    ManifestNotFound(String),
    #[error("failed to extract metadata: {0}")]
    ManifestUnreadable(String),
}

/// Turns raw module identifiers into [`DependencyRecord`]s.
///
/// Classification never returns an error: every failure path degrades to a
/// best-effort record. The only identifiers that produce no record at all are
/// relative or absolute paths, which name files rather than packages.
#[derive(Debug, Clone)]
pub struct Classifier {
    project_root: PathBuf,
    node_version: String,
}

impl Classifier {
    pub fn new(project_root: impl Into<PathBuf>, node_version: Option<String>) -> Self {
        Classifier {
            project_root: project_root.into(),
            node_version: node_version.unwrap_or_else(unknown),
        }
    }

    pub fn node_version(&self) -> &str {
        &self.node_version
    }

    /// Extract the base package name from an identifier.
    ///
    /// `lodash/fp` → `lodash`, `@scope/pkg/util` → `@scope/pkg`,
    /// `node:fs` → `fs`. Returns `None` for relative/absolute paths and
    /// empty strings.
    pub fn base_name(identifier: &str) -> Option<String> {
        let identifier = identifier.strip_prefix("node:").unwrap_or(identifier);
        if identifier.is_empty() || identifier.starts_with('.') || identifier.starts_with('/') {
            return None;
        }

        let base = if let Some(rest) = identifier.strip_prefix('@') {
            // Scoped name: "@scope/name" is one unit
            let mut parts = rest.splitn(3, '/');
            let scope = parts.next()?;
            match parts.next() {
                Some(name) if !name.is_empty() => format!("@{scope}/{name}"),
                _ => return None,
            }
        } else {
            identifier.split('/').next()?.to_string()
        };

        Some(base)
    }

    /// Classify an identifier into a full metadata record.
    ///
    /// Returns `None` only for identifiers that are not package names
    /// (relative/absolute paths).
    pub fn classify(&self, identifier: &str, detected_by: &str) -> Option<DependencyRecord> {
        let base = Self::base_name(identifier)?;

        if builtins::is_builtin(&base) {
            return Some(self.builtin_record(&base, detected_by));
        }

        Some(match self.read_manifest(&base) {
            Ok(manifest) => self.manifest_record(&base, detected_by, &manifest),
            Err(err @ ClassifyError::ManifestNotFound(_)) => {
                let mut record = self.bare_record(&base, detected_by, ModuleType::ThirdParty);
                record.error = Some(err.to_string());
                record
            }
            Err(err @ ClassifyError::ManifestUnreadable(_)) => {
                let mut record = self.bare_record(&base, detected_by, ModuleType::Unresolved);
                record.error = Some(err.to_string());
                record
            }
        })
    }

    fn builtin_record(&self, name: &str, detected_by: &str) -> DependencyRecord {
        DependencyRecord {
            name: name.to_string(),
            version: self.node_version.clone(),
            license: unknown(),
            record_type: "runtime".to_string(),
            timestamp: Utc::now(),
            detected_by: detected_by.to_string(),
            module_type: ModuleType::Builtin,
            author: None,
            repository: None,
            purl: Some(format!("pkg:nodejs/{name}@{}", self.node_version)),
            description: "Node.js built-in module".to_string(),
            node_version: Some(self.node_version.clone()),
            error: None,
        }
    }

    fn bare_record(&self, name: &str, detected_by: &str, module_type: ModuleType) -> DependencyRecord {
        DependencyRecord {
            name: name.to_string(),
            version: unknown(),
            license: unknown(),
            record_type: "runtime".to_string(),
            timestamp: Utc::now(),
            detected_by: detected_by.to_string(),
            module_type,
            author: None,
            repository: None,
            purl: None,
            description: String::new(),
            node_version: None,
            error: None,
        }
    }

    fn manifest_record(&self, name: &str, detected_by: &str, manifest: &Value) -> DependencyRecord {
        let version = manifest
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let license = manifest
            .get("license")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let description = manifest
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        DependencyRecord {
            name: name.to_string(),
            version: version.clone(),
            license,
            record_type: "runtime".to_string(),
            timestamp: Utc::now(),
            detected_by: detected_by.to_string(),
            module_type: ModuleType::ThirdParty,
            author: manifest.get("author").map(person_string),
            repository: manifest.get("repository").map(repository_string),
            purl: Some(format!("pkg:npm/{name}@{version}")),
            description,
            node_version: None,
            error: None,
        }
    }

    /// Locate and parse a package manifest the way Node's resolution search
    /// would: try `node_modules/<name>/package.json` in the project root and
    /// each ancestor directory; if the manifest file itself is missing, fall
    /// back to locating the package directory by its entry file and deriving
    /// the manifest path from it.
    fn read_manifest(&self, name: &str) -> Result<Value, ClassifyError> {
        let manifest_path = self.find_manifest(name)?;
        let content = std::fs::read_to_string(&manifest_path)
            .map_err(|e| ClassifyError::ManifestUnreadable(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ClassifyError::ManifestUnreadable(e.to_string()))
    }

    fn find_manifest(&self, name: &str) -> Result<PathBuf, ClassifyError> {
        for dir in self.project_root.ancestors() {
            let package_dir = dir.join("node_modules").join(name);
            let manifest = package_dir.join("package.json");
            if manifest.exists() {
                return Ok(manifest);
            }
            // Package installed but manifest missing at the expected spot:
            // derive it from the resolved entry file's directory
            if let Some(entry) = resolve_entry(&package_dir) {
                let derived = entry
                    .parent()
                    .map(|p| p.join("package.json"))
                    .unwrap_or(manifest);
                return Ok(derived);
            }
        }
        Err(ClassifyError::ManifestNotFound(format!(
            "no node_modules/{name} under {} or its ancestors",
            self.project_root.display()
        )))
    }
}

/// Resolve a package directory to its main entry file, if any.
fn resolve_entry(package_dir: &Path) -> Option<PathBuf> {
    for entry in ["index.js", "index.mjs", "index.cjs"] {
        let candidate = package_dir.join(entry);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Render a manifest `author` field, which may be a plain string or an
/// object with `name`/`email`.
fn person_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let name = map.get("name").and_then(|v| v.as_str()).unwrap_or("");
            match map.get("email").and_then(|v| v.as_str()) {
                Some(email) if !name.is_empty() => format!("{name} <{email}>"),
                _ if !name.is_empty() => name.to_string(),
                _ => value.to_string(),
            }
        }
        other => other.to_string(),
    }
}

/// Render a manifest `repository` field, which may be a plain string or an
/// object carrying a `url`.
fn repository_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}
