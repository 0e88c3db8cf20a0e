//! Two-layer field store: committed snapshot + pending changes.
//!
//! Reads prefer pending changes over the snapshot; writes only ever
//! touch the pending layer. `commit` merges the pending layer into the
//! snapshot key-wise and clears it, which is what lets `save` tell
//! "nothing to update" apart from "must call update".

use serde_json::{Map, Value};

/// Reserved pending-changes key holding staged relationship lists.
pub const RELATIONSHIPS_KEY: &str = "relationships";

/// The raw/changes overlay for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    raw: Map<String, Value>,
    changes: Map<String, Value>,
}

impl Overlay {
    /// Build an overlay over an initial snapshot.
    #[must_use]
    pub fn new(raw: Map<String, Value>) -> Self {
        Self {
            raw,
            changes: Map::new(),
        }
    }

    /// The committed snapshot.
    #[must_use]
    pub const fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// The uncommitted pending changes.
    #[must_use]
    pub const fn changes(&self) -> &Map<String, Value> {
        &self.changes
    }

    /// Read a wire field, preferring pending changes.
    ///
    /// A `null` entry counts as absent in either layer, so a `null`
    /// pending value does not shadow a committed one.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self.changes.get(field) {
            Some(Value::Null) | None => match self.raw.get(field) {
                Some(Value::Null) | None => None,
                present => present,
            },
            present => present,
        }
    }

    /// Stage a wire field into the pending layer.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.changes.insert(field.into(), value);
    }

    /// Whether any pending change (including staged relationships) exists.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Merge pending changes over the snapshot and clear them.
    ///
    /// Nested objects merge key-wise; arrays and scalars replace.
    pub fn commit(&mut self) {
        let changes = std::mem::take(&mut self.changes);
        merge_into(&mut self.raw, &changes);
    }

    /// Replace the snapshot wholesale (create response or refresh).
    pub fn replace_raw(&mut self, raw: Map<String, Value>) {
        self.raw = raw;
    }

    /// Write directly into the snapshot (identifier assignment only).
    pub fn raw_insert(&mut self, field: impl Into<String>, value: Value) {
        self.raw.insert(field.into(), value);
    }

    /// Discard all pending changes.
    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    /// The staged relationship map, if any relationships are staged.
    #[must_use]
    pub fn staged_relationships(&self) -> Option<&Map<String, Value>> {
        self.changes.get(RELATIONSHIPS_KEY).and_then(Value::as_object)
    }

    /// The staged list for one relation name.
    #[must_use]
    pub fn staged_relationship(&self, name: &str) -> Option<&Vec<Value>> {
        match self.staged_relationships()?.get(name) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }
    }

    /// Replace the staged list for one relation name.
    pub fn stage_relationship(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let slot = self
            .changes
            .entry(RELATIONSHIPS_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = slot {
            map.insert(name.into(), Value::Array(values));
        }
    }

    /// Append to the staged list for one relation name, skipping values
    /// that are already present.
    pub fn push_staged_relationship(&mut self, name: &str, value: Value) {
        let slot = self
            .changes
            .entry(RELATIONSHIPS_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = slot {
            let entry = map
                .entry(name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                if !items.contains(&value) {
                    items.push(value);
                }
            }
        }
    }
}

/// Merge `overlay` into `base` key-wise, recursing into objects.
pub(crate) fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_into(base_map, overlay_map);
        }
        (slot, value) => *slot = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Overlay, merge_into};
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    fn overlay_with(raw: Value) -> Overlay {
        match raw {
            Value::Object(map) => Overlay::new(map),
            _ => panic!("raw fixture must be an object"),
        }
    }

    #[test]
    fn changes_take_precedence_over_raw() {
        let mut overlay = overlay_with(json!({ "summary": "original" }));
        assert_eq!(
            overlay.get("summary"),
            Some(&Value::String("original".to_string()))
        );

        overlay.set("summary", json!("updated"));
        assert_eq!(
            overlay.get("summary"),
            Some(&Value::String("updated".to_string()))
        );

        overlay.commit();
        assert_eq!(
            overlay.raw().get("summary"),
            Some(&Value::String("updated".to_string()))
        );
        assert!(!overlay.has_pending_changes());
    }

    #[test]
    fn null_counts_as_absent_in_both_layers() {
        let mut overlay = overlay_with(json!({ "notes": "kept", "stage": null }));
        assert_eq!(overlay.get("stage"), None);

        overlay.set("notes", Value::Null);
        assert_eq!(
            overlay.get("notes"),
            Some(&Value::String("kept".to_string()))
        );

        assert_eq!(overlay.get("missing"), None);
    }

    #[test]
    fn commit_merges_nested_objects_key_wise() {
        let mut overlay = overlay_with(json!({
            "relationships": { "businessServices": ["ABC_DE"] },
            "summary": "original",
        }));
        overlay.set("relationships", json!({ "instanceIds": ["OI-1"] }));

        overlay.commit();

        assert_eq!(
            overlay.raw().get("relationships"),
            Some(&json!({
                "businessServices": ["ABC_DE"],
                "instanceIds": ["OI-1"],
            }))
        );
        assert_eq!(
            overlay.raw().get("summary"),
            Some(&Value::String("original".to_string()))
        );
    }

    #[test]
    fn arrays_replace_rather_than_merge() {
        let mut base = Map::new();
        base.insert("list".to_string(), json!([1, 2, 3]));

        let mut overlay = Map::new();
        overlay.insert("list".to_string(), json!([9]));

        merge_into(&mut base, &overlay);
        assert_eq!(base.get("list"), Some(&json!([9])));
    }

    #[test]
    fn staged_relationships_replace_and_dedupe() {
        let mut overlay = Overlay::default();
        overlay.stage_relationship("businessServices", vec![json!("ABC_DE")]);
        overlay.stage_relationship("businessServices", vec![json!("XYZ_99")]);

        assert_eq!(
            overlay.staged_relationship("businessServices"),
            Some(&vec![json!("XYZ_99")])
        );

        overlay.push_staged_relationship("instanceIds", json!("OI-1"));
        overlay.push_staged_relationship("instanceIds", json!("OI-1"));
        overlay.push_staged_relationship("instanceIds", json!("OI-2"));

        assert_eq!(
            overlay.staged_relationship("instanceIds"),
            Some(&vec![json!("OI-1"), json!("OI-2")])
        );
    }

    #[test]
    fn clear_changes_keeps_snapshot() {
        let mut overlay = overlay_with(json!({ "summary": "original" }));
        overlay.set("summary", json!("staged"));
        overlay.clear_changes();

        assert!(!overlay.has_pending_changes());
        assert_eq!(
            overlay.get("summary"),
            Some(&Value::String("original".to_string()))
        );
    }

    proptest! {
        /// After a commit, every field reads the same value it read
        /// before the commit, and nothing is left pending.
        #[test]
        fn commit_preserves_resolved_values(
            raw in proptest::collection::hash_map("[a-d]{1,4}", "[a-z]{0,6}", 0..8),
            staged in proptest::collection::hash_map("[a-d]{1,4}", "[a-z]{0,6}", 0..8),
        ) {
            let mut overlay = Overlay::new(
                raw.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            );
            for (key, value) in &staged {
                overlay.set(key.clone(), Value::String(value.clone()));
            }

            let keys: Vec<String> = raw.keys().chain(staged.keys()).cloned().collect();
            let before: Vec<Option<Value>> =
                keys.iter().map(|k| overlay.get(k).cloned()).collect();

            overlay.commit();

            let after: Vec<Option<Value>> =
                keys.iter().map(|k| overlay.get(k).cloned()).collect();
            prop_assert_eq!(before, after);
            prop_assert!(!overlay.has_pending_changes());
        }
    }
}
