//! Create/update body building, save dispatch, and refresh.

use serde_json::{Map, Value};

use crate::error::ChangeError;
use crate::overlay::{RELATIONSHIPS_KEY, merge_into};
use crate::remote::TransportError;

use super::ChangeRequest;

impl ChangeRequest {
    /// The request body for a create call: pending changes deep-merged
    /// over the snapshot, staged relationships stripped, and split
    /// `<base>`/`<base>String` pairs collapsed onto the base key.
    #[must_use]
    pub fn create_body(&self) -> Map<String, Value> {
        let mut changes = self.overlay().changes().clone();
        changes.remove(RELATIONSHIPS_KEY);

        let mut body = self.overlay().raw().clone();
        merge_into(&mut body, &changes);
        normalize_string_keys(body)
    }

    /// The request body for an update call: pending changes only, same
    /// suffix normalization, empty when nothing is staged.
    #[must_use]
    pub fn update_body(&self) -> Map<String, Value> {
        let mut changes = self.overlay().changes().clone();
        changes.remove(RELATIONSHIPS_KEY);
        normalize_string_keys(changes)
    }

    /// Persist pending changes.
    ///
    /// An uncreated change request is created and adopts the returned
    /// id; a created one is updated only when something is staged. In
    /// both cases staged relationships are synchronized after the id is
    /// known and before the overlay commits, so staged instance ids are
    /// still visible to the synchronizer.
    pub fn save(&mut self) -> Result<(), ChangeError> {
        let backend = self.backend()?.clone();

        if self.change_id().is_none() {
            let body = self.create_body();
            let change_id = backend.changes().create(&body)?;
            tracing::debug!(change_id = %change_id, "created change request");
            self.overlay_mut()
                .raw_insert("changeId", Value::String(change_id));

            self.sync_relationships(&backend)?;
            self.overlay_mut().commit();
            return Ok(());
        }

        if !self.overlay().has_pending_changes() {
            return Ok(());
        }

        let body = self.update_body();
        if !body.is_empty() {
            let change_id = self.change_id().ok_or(ChangeError::NotYetCreated {
                operation: "update",
            })?;
            backend.changes().update(&change_id, &body)?;
            tracing::debug!(change_id = %change_id, fields = body.len(), "updated change request");
        }

        self.sync_relationships(&backend)?;
        self.overlay_mut().commit();
        Ok(())
    }

    /// Replace the snapshot with the server's canonical state.
    ///
    /// Pending changes are cleared when `reset_changes` is true; the
    /// status helpers pass false while probing so staged fields survive
    /// the probe.
    pub fn refresh(&mut self, reset_changes: bool) -> Result<(), ChangeError> {
        let change_id = self.change_id().ok_or(ChangeError::NotYetCreated {
            operation: "refresh",
        })?;
        let backend = self.backend()?.clone();

        let raw = backend.changes().fetch(&change_id)?.ok_or_else(|| {
            ChangeError::Transport(TransportError::NotFound(format!(
                "change request {change_id}"
            )))
        })?;

        self.overlay_mut().replace_raw(raw);
        if reset_changes {
            self.overlay_mut().clear_changes();
        }
        Ok(())
    }
}

/// Rewrite every `<base>String` key onto `<base>`.
///
/// When both spellings exist the `String` variant wins: the label text
/// is what the API accepts on writes.
fn normalize_string_keys(mut body: Map<String, Value>) -> Map<String, Value> {
    let suffixed: Vec<String> = body
        .keys()
        .filter(|key| key.ends_with("String"))
        .cloned()
        .collect();

    for key in suffixed {
        if let Some(value) = body.remove(&key) {
            let base = key[..key.len() - "String".len()].to_string();
            body.insert(base, value);
        }
    }

    body
}
