// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lookup table over the top-level `included` array for one call.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::DeserializedResource;

pub(super) struct IncludedEntry<'v> {
    pub(super) index: usize,
    pub(super) raw: &'v Value,
    processed: HashMap<String, Arc<DeserializedResource>>,
}

/// Included resources keyed by `(type, id)`, with the flattened result of
/// each resource cached per relationship path.
pub(super) struct IncludedMap<'v> {
    entries: HashMap<(String, String), IncludedEntry<'v>>,
}

impl<'v> IncludedMap<'v> {
    /// Index the validated `included` member. A later duplicate replaces an
    /// earlier one.
    pub(super) fn new(included: Option<&'v Value>) -> Self {
        let resources = included
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let entries: HashMap<_, _> = resources
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let resource_type = raw.get("type")?.as_str()?;
                let id = raw.get("id")?.as_str()?;
                Some((
                    (resource_type.to_owned(), id.to_owned()),
                    IncludedEntry {
                        index,
                        raw,
                        processed: HashMap::new(),
                    },
                ))
            })
            .collect();

        debug!(resources = entries.len(), "built included map");
        Self { entries }
    }

    pub(super) fn get(&self, resource_type: &str, id: &str) -> Option<&IncludedEntry<'v>> {
        self.entries
            .get(&(resource_type.to_owned(), id.to_owned()))
    }

    /// Record the flattened form of `(type, id)` reached through `path`.
    pub(super) fn store(
        &mut self,
        resource_type: &str,
        id: &str,
        path: String,
        resource: Arc<DeserializedResource>,
    ) {
        if let Some(entry) = self
            .entries
            .get_mut(&(resource_type.to_owned(), id.to_owned()))
        {
            entry.processed.insert(path, resource);
        }
    }
}

impl IncludedEntry<'_> {
    pub(super) fn processed(&self, path: &str) -> Option<Arc<DeserializedResource>> {
        self.processed.get(path).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_keep_original_index() {
        let included = json!([
            { "id": "1", "type": "pet" },
            { "id": "1", "type": "user" },
            { "id": "2", "type": "pet" }
        ]);
        let map = IncludedMap::new(Some(&included));

        assert_eq!(map.get("pet", "2").map(|entry| entry.index), Some(2));
        assert_eq!(map.get("user", "1").map(|entry| entry.index), Some(1));
        assert!(map.get("user", "2").is_none());
    }

    #[test]
    fn absent_included_is_empty() {
        let map = IncludedMap::new(None);
        assert!(map.get("pet", "1").is_none());
    }

    #[test]
    fn processed_results_are_per_path() {
        let included = json!([{ "id": "1", "type": "pet" }]);
        let mut map = IncludedMap::new(Some(&included));
        let pet = Arc::new(DeserializedResource::reference("1"));

        map.store("pet", "1", "owner.pet".to_owned(), Arc::clone(&pet));

        let entry = map.get("pet", "1").map(|entry| entry.processed("owner.pet"));
        assert!(matches!(entry, Some(Some(cached)) if Arc::ptr_eq(&cached, &pet)));
        assert!(map
            .get("pet", "1")
            .and_then(|entry| entry.processed("pet"))
            .is_none());
    }
}
