//! Session-wide file overlay
//!
//! Maps file names to content that exists before the module asks for it: the
//! staged input document, plus anything fetched from the resource store on an
//! earlier miss. Lookups hand out copies, so no two handles ever share a buffer.

use crate::resources::{EmptyStore, ResourceStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Pre-populated and lazily cached file content
#[derive(Clone)]
pub struct Overlay {
    entries: HashMap<String, Vec<u8>>,
    store: Arc<dyn ResourceStore>,
}

impl Overlay {
    /// An overlay backed by `store`
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            entries: HashMap::new(),
            store,
        }
    }

    /// Stage `content` under `name`, replacing any earlier entry
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), content.into());
    }

    /// Whether `name` is staged or cached
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `name`, consulting the resource store on a miss
    ///
    /// A successful store lookup is cached, so the store sees each name at most
    /// once per session.
    pub fn resolve(&mut self, name: &str) -> Option<Vec<u8>> {
        if let Some(content) = self.entries.get(name) {
            return Some(content.clone());
        }

        let content = self.store.fetch(name)?;
        tracing::debug!(name, bytes = content.len(), "Resource cached");
        self.entries.insert(name.to_string(), content.clone());
        Some(content)
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new(Arc::new(EmptyStore))
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Overlay").field("entries", &names).finish()
    }
}
