//! Clip name cache
//!
//! Names resolved through the single-clip fallback lookup are kept for the
//! lifetime of the process. Entries are write-once: the first resolution of a
//! clip identifier wins and is never replaced or evicted.

use std::collections::HashMap;

use crate::model::ClipId;

#[derive(Debug, Default)]
pub struct ClipNameCache {
    names: HashMap<ClipId, String>,
}

impl ClipNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached name for `clip_id`
    pub fn resolve(&self, clip_id: &ClipId) -> Option<&str> {
        self.names.get(clip_id).map(String::as_str)
    }

    /// Record a resolved name
    ///
    /// Returns `false` without changing anything when the identifier already
    /// has a name or `name` is empty.
    pub fn record(&mut self, clip_id: ClipId, name: String) -> bool {
        if name.is_empty() || self.names.contains_key(&clip_id) {
            return false;
        }
        self.names.insert(clip_id, name);
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
