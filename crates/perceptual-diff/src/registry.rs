//! Diff records of the current run

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::identity::StepIdentity;

/// Step identity to base-relative diff image path.
///
/// Only steps whose comparison ended in a difference have an entry. Writes
/// take the lock per call, so a reporter can read through a shared handle
/// while steps are being compared.
#[derive(Debug, Default)]
pub struct DiffRegistry {
    records: RwLock<BTreeMap<StepIdentity, PathBuf>>,
}

impl DiffRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, identity: StepIdentity, path: PathBuf) {
        self.records.write().insert(identity, path);
    }

    pub fn lookup(&self, identity: &StepIdentity) -> Option<PathBuf> {
        self.records.read().get(identity).cloned()
    }

    /// Drop the record of `identity`, returning its path if there was one
    pub fn remove(&self, identity: &StepIdentity) -> Option<PathBuf> {
        self.records.write().remove(identity)
    }

    /// Snapshot of every record, ordered by identity
    pub fn all(&self) -> BTreeMap<StepIdentity, PathBuf> {
        self.records.read().clone()
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lookup_count() {
        let registry = DiffRegistry::new();
        let step = StepIdentity::new("Login", "Valid credentials", 1, "I see the dashboard");
        assert!(registry.lookup(&step).is_none());
        assert!(registry.is_empty());

        registry.record(step.clone(), PathBuf::from("20240101000000/diff/Login/x.png"));
        assert_eq!(
            registry.lookup(&step),
            Some(PathBuf::from("20240101000000/diff/Login/x.png"))
        );
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn test_remove_single_record() {
        let registry = DiffRegistry::new();
        let first = StepIdentity::new("F", "S", 1, "step");
        let second = StepIdentity::new("F", "S", 2, "step");
        registry.record(first.clone(), PathBuf::from("1.png"));
        registry.record(second.clone(), PathBuf::from("2.png"));

        assert_eq!(registry.remove(&first), Some(PathBuf::from("1.png")));
        assert_eq!(registry.remove(&first), None);
        assert!(registry.lookup(&first).is_none());
        assert_eq!(registry.lookup(&second), Some(PathBuf::from("2.png")));
    }

    #[test]
    fn test_clear_hides_previous_run() {
        let registry = DiffRegistry::new();
        let step = StepIdentity::new("F", "S", 1, "step");
        registry.record(step.clone(), PathBuf::from("a.png"));

        registry.clear();
        assert!(registry.lookup(&step).is_none());
        assert!(registry.all().is_empty());
        assert_eq!(registry.count(), 0);
    }
}
