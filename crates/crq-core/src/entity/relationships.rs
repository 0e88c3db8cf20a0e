//! Relationship alias resolution and linking.
//!
//! Staged business services and computer systems are human-friendly
//! aliases; the relationship API only accepts canonical instance ids.
//! Resolution runs during `save`, after the change id is known and
//! before the overlay commits. A reference that fails to resolve is
//! skipped, not fatal: one bad alias must not block an otherwise valid
//! save.

use serde_json::Value;

use crate::error::ChangeError;
use crate::remote::Backend;

use super::ChangeRequest;

impl ChangeRequest {
    pub(crate) fn sync_relationships(&mut self, backend: &Backend) -> Result<(), ChangeError> {
        let staged = self
            .overlay()
            .staged_relationships()
            .is_some_and(|map| !map.is_empty());
        if !staged {
            return Ok(());
        }

        self.resolve_business_services(backend);
        self.resolve_computer_systems(backend);
        self.link_staged_instances(backend)
    }

    fn resolve_business_services(&mut self, backend: &Backend) {
        let matcher = backend.business_service_matcher().to_string();
        for company in self.staged_texts("businessServices") {
            match backend.config_items().business_service(&company, &matcher) {
                Ok(Some(item)) => {
                    self.overlay_mut()
                        .push_staged_relationship("instanceIds", Value::String(item.instance_id));
                }
                Ok(None) => {
                    tracing::warn!(company = %company, "no business service found, skipping relationship");
                }
                Err(err) => {
                    tracing::warn!(company = %company, error = %err, "business service lookup failed, skipping relationship");
                }
            }
        }
    }

    fn resolve_computer_systems(&mut self, backend: &Backend) {
        for system_id in self.staged_texts("computerSystems") {
            match backend.config_items().computer_system_by_system_id(&system_id) {
                Ok(Some(item)) => {
                    self.overlay_mut()
                        .push_staged_relationship("instanceIds", Value::String(item.instance_id));
                }
                Ok(None) => {
                    tracing::warn!(system_id = %system_id, "no computer system found, skipping relationship");
                }
                Err(err) => {
                    tracing::warn!(system_id = %system_id, error = %err, "computer system lookup failed, skipping relationship");
                }
            }
        }
    }

    fn link_staged_instances(&mut self, backend: &Backend) -> Result<(), ChangeError> {
        let instance_ids = self.staged_texts("instanceIds");
        if instance_ids.is_empty() {
            return Ok(());
        }

        let change_id = self.change_id().ok_or(ChangeError::NotYetCreated {
            operation: "link relationships",
        })?;

        for instance_id in instance_ids {
            backend.config_items().link_instance(&change_id, &instance_id)?;
            tracing::debug!(change_id = %change_id, instance_id = %instance_id, "linked configuration item");
        }
        Ok(())
    }

    /// Clone the textual entries of a staged relationship list.
    fn staged_texts(&self, name: &str) -> Vec<String> {
        self.overlay()
            .staged_relationship(name)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
