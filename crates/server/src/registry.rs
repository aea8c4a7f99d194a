use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Registry holds the process-wide namespace state: the set of namespaces
/// bootstrapped by this process, their search schemas, and the set of
/// namespaces with a reindex in flight. It is owned by the Coordinator and
/// shared with the reindex handler; all mutation goes through these methods.
#[derive(Debug, Default)]
pub struct Registry {
    namespaces: Mutex<BTreeSet<String>>,
    schemas: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    reindexing: Mutex<BTreeSet<String>>,
}

impl Registry {
    /// Record a namespace, returning true when it was not yet known.
    pub fn insert_namespace(&self, namespace: &str) -> bool {
        self.namespaces
            .lock()
            .unwrap()
            .insert(namespace.to_string())
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.lock().unwrap().contains(namespace)
    }

    /// All known namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.lock().unwrap().iter().cloned().collect()
    }

    pub fn schema(&self, namespace: &str) -> Option<BTreeMap<String, String>> {
        self.schemas.lock().unwrap().get(namespace).cloned()
    }

    pub fn set_schema(&self, namespace: &str, schema: BTreeMap<String, String>) {
        self.schemas
            .lock()
            .unwrap()
            .insert(namespace.to_string(), schema);
    }

    /// Check-and-set of the reindex-in-progress flag. Returns true when this
    /// caller acquired the flag, false when a reindex is already running.
    pub fn begin_reindex(&self, namespace: &str) -> bool {
        self.reindexing
            .lock()
            .unwrap()
            .insert(namespace.to_string())
    }

    pub fn end_reindex(&self, namespace: &str) {
        self.reindexing.lock().unwrap().remove(namespace);
    }
}

#[cfg(test)]
mod test {
    use super::Registry;

    #[test]
    fn namespaces_are_deduplicated_and_sorted() {
        let registry = Registry::default();
        assert!(registry.insert_namespace("zeta"));
        assert!(registry.insert_namespace("alpha"));
        assert!(!registry.insert_namespace("zeta"));
        assert_eq!(registry.namespaces(), vec!["alpha", "zeta"]);
        assert!(registry.contains_namespace("alpha"));
        assert!(!registry.contains_namespace("beta"));
    }

    #[test]
    fn reindex_flag_is_check_and_set() {
        let registry = Registry::default();
        assert!(registry.begin_reindex("ns"));
        assert!(!registry.begin_reindex("ns"));
        registry.end_reindex("ns");
        assert!(registry.begin_reindex("ns"));
    }
}
