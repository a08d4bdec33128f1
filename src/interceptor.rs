use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::builtins;
use crate::classifier::Classifier;
use crate::models::DependencyRecord;
use crate::store::{AddOutcome, DependencyStore};

/// A module resolver the interceptor can wrap. The seam exists so resolution
/// backends (and test doubles) stay independent of the observation path.
pub trait Resolver {
    fn resolve(&self, specifier: &str) -> anyhow::Result<PathBuf>;
}

/// Observes module identifiers and feeds them through the classify + persist
/// pipeline.
///
/// One interceptor is constructed at process start and shared by reference
/// with every consumer (HTTP handlers, startup scans). It owns no global
/// state, so tests can run isolated instances side by side. Observation is a
/// pure passthrough: it never alters a wrapped resolution result and never
/// errors on its own account.
#[derive(Clone)]
pub struct Interceptor {
    classifier: Classifier,
    store: Arc<Mutex<DependencyStore>>,
}

impl Interceptor {
    pub fn new(classifier: Classifier, store: Arc<Mutex<DependencyStore>>) -> Self {
        Interceptor { classifier, store }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<Mutex<DependencyStore>> {
        &self.store
    }

    /// Observe one identifier: classify it and persist the record unless the
    /// base name is already tracked. Returns `None` for identifiers that are
    /// not package names (relative/absolute paths).
    pub async fn observe(&self, identifier: &str, source: &str) -> Option<AddOutcome> {
        let record = self.classify(identifier, source)?;
        let mut store = self.store.lock().await;
        Some(store.add(record))
    }

    /// Classification without persistence, for callers that batch their own
    /// store access.
    pub fn classify(&self, identifier: &str, source: &str) -> Option<DependencyRecord> {
        self.classifier.classify(identifier, source)
    }

    /// Observe an identifier, then delegate to the wrapped resolver. The
    /// resolver's result — success or error — passes through unchanged.
    pub async fn resolve_through<R: Resolver>(
        &self,
        resolver: &R,
        specifier: &str,
    ) -> anyhow::Result<PathBuf> {
        self.observe(specifier, "node-monitor").await;
        resolver.resolve(specifier)
    }

    /// Backward scan over module file paths the host had already resolved
    /// before observation started (its module cache). Derives builtin and
    /// package names from the paths and observes each.
    pub async fn scan_cache<I, S>(&self, module_paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut observed = 0;
        for path in module_paths {
            let Some(name) = cached_module_name(path.as_ref()) else {
                continue;
            };
            if self.observe(&name, "require-cache").await == Some(AddOutcome::Added) {
                observed += 1;
            }
        }
        observed
    }

    /// Forward scan: observe every known builtin name regardless of whether
    /// it was ever actually imported.
    pub async fn scan_builtins(&self) -> usize {
        let mut observed = 0;
        for name in builtins::NODE_BUILTINS {
            if self.observe(name, "builtin-scan").await == Some(AddOutcome::Added) {
                observed += 1;
            }
        }
        observed
    }
}

/// Derive an observable module name from a cached module file path.
///
/// `node_modules` entries yield the package name (scoped packages kept as
/// one unit); other paths count only when their file stem names a builtin.
fn cached_module_name(path: &str) -> Option<String> {
    if let Some((_, tail)) = path.split_once("node_modules/") {
        let mut segments = tail.split('/');
        let first = segments.next()?;
        let name = if first.starts_with('@') {
            format!("{first}/{}", segments.next()?)
        } else {
            first.to_string()
        };
        if name.is_empty() {
            return None;
        }
        return Some(name);
    }

    let stem = path.rsplit('/').next()?.trim_end_matches(".js");
    if builtins::is_builtin(stem) {
        Some(stem.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleType;
    use crate::store::QueryFilter;
    use tempfile::TempDir;

    fn interceptor_in(tmp: &TempDir) -> Interceptor {
        let store = DependencyStore::initialize(tmp.path().join("deps.json"));
        Interceptor::new(
            Classifier::new(tmp.path(), Some("v20.0.0".to_string())),
            Arc::new(Mutex::new(store)),
        )
    }

    #[test]
    fn test_cached_module_name() {
        assert_eq!(
            cached_module_name("/app/node_modules/lodash/index.js"),
            Some("lodash".to_string())
        );
        assert_eq!(
            cached_module_name("/app/node_modules/@babel/core/lib/index.js"),
            Some("@babel/core".to_string())
        );
        assert_eq!(
            cached_module_name("internal/modules/fs.js"),
            Some("fs".to_string())
        );
        assert_eq!(cached_module_name("/app/src/index.js"), None);
    }

    #[tokio::test]
    async fn test_observe_filters_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let interceptor = interceptor_in(&tmp);
        assert_eq!(interceptor.observe("./local", "node-monitor").await, None);
        assert_eq!(interceptor.observe("/abs", "node-monitor").await, None);
        let store = interceptor.store().lock().await;
        assert_eq!(store.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_observe_deduplicates_by_base_name() {
        let tmp = TempDir::new().unwrap();
        let interceptor = interceptor_in(&tmp);
        assert_eq!(
            interceptor.observe("lodash/fp", "node-monitor").await,
            Some(AddOutcome::Added)
        );
        assert_eq!(
            interceptor.observe("lodash/merge", "node-monitor").await,
            Some(AddOutcome::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_builtin_scan_covers_whole_set() {
        let tmp = TempDir::new().unwrap();
        let interceptor = interceptor_in(&tmp);
        let observed = interceptor.scan_builtins().await;
        assert_eq!(observed, builtins::NODE_BUILTINS.len());

        let store = interceptor.store().lock().await;
        let result = store.query(&QueryFilter::default());
        assert!(result
            .dependencies
            .iter()
            .all(|r| r.module_type == ModuleType::Builtin
                && r.detected_by == "builtin-scan"
                && r.version == "v20.0.0"));
    }

    #[tokio::test]
    async fn test_cache_scan_observes_packages_and_builtins() {
        let tmp = TempDir::new().unwrap();
        let interceptor = interceptor_in(&tmp);
        let observed = interceptor
            .scan_cache([
                "/app/node_modules/express/lib/express.js",
                "/app/node_modules/express/lib/router.js",
                "internal/modules/path.js",
                "/app/src/index.js",
            ])
            .await;
        assert_eq!(observed, 2);

        let store = interceptor.store().lock().await;
        assert!(store.contains("express"));
        assert!(store.contains("path"));
    }

    #[tokio::test]
    async fn test_concurrent_adds_of_distinct_names_both_land() {
        let tmp = TempDir::new().unwrap();
        let interceptor = interceptor_in(&tmp);

        let a = {
            let interceptor = interceptor.clone();
            tokio::spawn(async move { interceptor.observe("dayjs", "node-monitor").await })
        };
        let b = {
            let interceptor = interceptor.clone();
            tokio::spawn(async move { interceptor.observe("moment", "node-monitor").await })
        };
        assert_eq!(a.await.unwrap(), Some(AddOutcome::Added));
        assert_eq!(b.await.unwrap(), Some(AddOutcome::Added));

        let store = interceptor.store().lock().await;
        let result = store.query(&QueryFilter::default());
        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn test_resolver_passthrough_preserves_result() {
        struct FixedResolver(PathBuf);
        impl Resolver for FixedResolver {
            fn resolve(&self, _specifier: &str) -> anyhow::Result<PathBuf> {
                Ok(self.0.clone())
            }
        }
        struct FailingResolver;
        impl Resolver for FailingResolver {
            fn resolve(&self, specifier: &str) -> anyhow::Result<PathBuf> {
                anyhow::bail!("cannot find module '{specifier}'")
            }
        }

        let tmp = TempDir::new().unwrap();
        let interceptor = interceptor_in(&tmp);

        let resolved = interceptor
            .resolve_through(&FixedResolver(PathBuf::from("/resolved/lodash.js")), "lodash")
            .await
            .unwrap();
        assert_eq!(resolved, PathBuf::from("/resolved/lodash.js"));

        // The wrapped resolver's error passes through, but the observation
        // still happened
        let err = interceptor
            .resolve_through(&FailingResolver, "left-pad")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("left-pad"));
        let store = interceptor.store().lock().await;
        assert!(store.contains("lodash"));
        assert!(store.contains("left-pad"));
    }
}
