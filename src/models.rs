use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inventory entry per distinct base package name ever observed.
///
/// Serialized field names match the on-disk store schema. Deserialization is
/// deliberately lenient: older store files may carry a `package` field
/// instead of `name` and may lack most metadata fields, and such entries
/// must still round-trip through the store without being dropped or
/// rewritten (see [`crate::store`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(alias = "package")]
    pub name: String,
    #[serde(default = "unknown")]
    pub version: String,
    #[serde(default = "unknown")]
    pub license: String,
    /// Always `"runtime"`; kept for compatibility with mixed historical schemas.
    #[serde(rename = "type", default = "runtime_kind")]
    pub record_type: String,
    #[serde(default = "epoch")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "unknown")]
    pub detected_by: String,
    /// Entries predating type classification default to `unresolved`.
    #[serde(default = "default_module_type")]
    pub module_type: ModuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    /// Resolution or parse error text for degraded records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn unknown() -> String {
    "unknown".to_string()
}

fn runtime_kind() -> String {
    "runtime".to_string()
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_module_type() -> ModuleType {
    ModuleType::Unresolved
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleType {
    #[serde(rename = "builtin")]
    Builtin,
    #[serde(rename = "third-party")]
    ThirdParty,
    #[serde(rename = "unresolved")]
    Unresolved,
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleType::Builtin => write!(f, "builtin"),
            ModuleType::ThirdParty => write!(f, "third-party"),
            ModuleType::Unresolved => write!(f, "unresolved"),
        }
    }
}

impl std::str::FromStr for ModuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builtin" => Ok(ModuleType::Builtin),
            "third-party" => Ok(ModuleType::ThirdParty),
            "unresolved" => Ok(ModuleType::Unresolved),
            other => Err(format!("unknown module type: {other}")),
        }
    }
}

/// Inventory records bucketed by [`ModuleType`], as served by the
/// `/monitor/dependencies` endpoint.
#[derive(Debug, Default, Serialize)]
pub struct GroupedDependencies {
    pub built_in: Vec<DependencyRecord>,
    pub third_party: Vec<DependencyRecord>,
    pub unresolved: Vec<DependencyRecord>,
}

impl GroupedDependencies {
    pub fn from_records(records: &[DependencyRecord]) -> Self {
        let mut grouped = GroupedDependencies::default();
        for record in records {
            match record.module_type {
                ModuleType::Builtin => grouped.built_in.push(record.clone()),
                ModuleType::ThirdParty => grouped.third_party.push(record.clone()),
                ModuleType::Unresolved => grouped.unresolved.push(record.clone()),
            }
        }
        grouped
    }
}

/// One bundled module from a production stats report: the bundler-internal
/// path string plus its size in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundledModule {
    pub name: String,
    pub size: u64,
}

/// Summary written after a production scan: the packages extracted from the
/// bundled module paths, fully classified.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductionSummary {
    pub generated_at: DateTime<Utc>,
    pub module_count: usize,
    pub packages: Vec<DependencyRecord>,
}
