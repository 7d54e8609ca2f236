//! Process-lifetime index of successful builds.

use std::sync::Arc;

use dashmap::DashMap;

use super::BuildRecord;

/// Package reference -> last registered build.
///
/// Records are replaced whole, so a reader sees either the previous or the
/// new record, never a mix.
#[derive(Default)]
pub struct Registry {
    records: DashMap<String, Arc<BuildRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: BuildRecord) -> Arc<BuildRecord> {
        let record = Arc::new(record);
        self.records
            .insert(record.pkg.clone(), Arc::clone(&record));
        record
    }

    pub fn get(&self, pkg: &str) -> Option<Arc<BuildRecord>> {
        self.records.get(pkg).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, pkg: &str) -> bool {
        self.records.contains_key(pkg)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Split `path` into the longest registered package prefix and the rest.
    ///
    /// The split only happens at `/` boundaries, so `github.com/x/Game/res/a.png`
    /// yields `("github.com/x/Game", "res/a.png")` when `github.com/x/Game` is
    /// registered, and `github.com/x/GameOver/...` never matches it.
    pub fn split<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        path.rmatch_indices('/')
            .map(|(idx, _)| (&path[..idx], &path[idx + 1..]))
            .find(|(pkg, _)| self.contains(pkg))
    }
}
