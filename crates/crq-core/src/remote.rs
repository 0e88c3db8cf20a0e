//! Collaborator seams.
//!
//! The entity model never talks HTTP directly: it calls these traits.
//! `crq-client` provides REST implementations; tests provide in-memory
//! fakes. Lookup-style calls return `Ok(None)` for "not found" rather
//! than an error; mutating calls treat every non-success as fatal.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::worklog::Worklog;

/// Matcher appended to business-service lookups when none is configured.
pub const DEFAULT_BUSINESS_SERVICE_MATCHER: &str = "_CORE_SERVICES";

/// Errors surfaced by remote collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status code.
    #[error("unexpected status {code} from {path}: {body}")]
    Status { code: u16, path: String, body: String },

    /// The request never completed (connect, TLS, timeout, ...).
    #[error("transport failure for {path}: {detail}")]
    Network { path: String, detail: String },

    /// The response body could not be decoded.
    #[error("failed to decode response from {path}: {detail}")]
    Decode { path: String, detail: String },

    /// A record that must exist is gone.
    #[error("{0} was not found")]
    NotFound(String),

    /// The client was configured incorrectly.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Whether a retry could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { code, .. } => *code >= 500,
            Self::Decode { .. } | Self::NotFound(_) | Self::Config(_) => false,
        }
    }
}

/// Change-request persistence operations.
pub trait ChangeApi: Send + Sync {
    /// Create a change request and return its assigned id.
    fn create(&self, body: &Map<String, Value>) -> Result<String, TransportError>;

    /// Update an existing change request.
    fn update(&self, change_id: &str, body: &Map<String, Value>) -> Result<(), TransportError>;

    /// Fetch the canonical state of a change request, or `None` when the
    /// id is unknown to the server.
    fn fetch(&self, change_id: &str) -> Result<Option<Map<String, Value>>, TransportError>;

    /// Look a change request up by universal ticket number.
    fn fetch_by_ticket_number(&self, ticket_number: &str)
    -> Result<Option<Value>, TransportError>;

    /// Append a worklog entry to an existing change request.
    fn add_worklog(&self, change_id: &str, worklog: &Worklog) -> Result<Value, TransportError>;
}

/// A configuration item reference resolved from a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItemRef {
    /// Canonical instance id accepted by the relationship API.
    pub instance_id: String,
    /// Display name, when the lookup returns one.
    pub name: Option<String>,
}

/// Configuration-item resolution and linking.
pub trait ConfigItemLookup: Send + Sync {
    /// Resolve a company's business service whose name matches
    /// `name_matcher`.
    fn business_service(
        &self,
        company: &str,
        name_matcher: &str,
    ) -> Result<Option<ConfigItemRef>, TransportError>;

    /// Resolve a computer system by its system identifier.
    fn computer_system_by_system_id(
        &self,
        system_id: &str,
    ) -> Result<Option<ConfigItemRef>, TransportError>;

    /// Associate a configuration-item instance with a change request.
    fn link_instance(&self, change_id: &str, instance_id: &str) -> Result<(), TransportError>;
}

/// A support group a person belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupportGroup {
    pub support_group_name: String,
    pub support_organization: Option<String>,
    pub company: Option<String>,
}

/// People-directory queries.
pub trait PeopleLookup: Send + Sync {
    /// Support groups for a login id, most specific first as returned by
    /// the directory.
    fn support_groups_by_login_id(
        &self,
        login_id: &str,
    ) -> Result<Vec<SupportGroup>, TransportError>;
}

/// The collaborator handle bound to a [`crate::ChangeRequest`].
///
/// Cloning is cheap: the services are shared.
#[derive(Clone)]
pub struct Backend {
    changes: Arc<dyn ChangeApi>,
    config_items: Arc<dyn ConfigItemLookup>,
    business_service_matcher: String,
}

impl Backend {
    /// Bundle the change and configuration-item services.
    #[must_use]
    pub fn new(changes: Arc<dyn ChangeApi>, config_items: Arc<dyn ConfigItemLookup>) -> Self {
        Self {
            changes,
            config_items,
            business_service_matcher: DEFAULT_BUSINESS_SERVICE_MATCHER.to_string(),
        }
    }

    /// Override the business-service name matcher used during
    /// relationship resolution.
    #[must_use]
    pub fn with_business_service_matcher(mut self, matcher: impl Into<String>) -> Self {
        self.business_service_matcher = matcher.into();
        self
    }

    /// The change-request persistence service.
    #[must_use]
    pub fn changes(&self) -> &dyn ChangeApi {
        self.changes.as_ref()
    }

    /// The configuration-item lookup service.
    #[must_use]
    pub fn config_items(&self) -> &dyn ConfigItemLookup {
        self.config_items.as_ref()
    }

    /// The configured business-service name matcher.
    #[must_use]
    pub fn business_service_matcher(&self) -> &str {
        &self.business_service_matcher
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("business_service_matcher", &self.business_service_matcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::TransportError;

    #[test]
    fn retryable_classification() {
        let server = TransportError::Status {
            code: 503,
            path: "changes/".to_string(),
            body: String::new(),
        };
        let client = TransportError::Status {
            code: 404,
            path: "changes/CRQ1".to_string(),
            body: String::new(),
        };
        let network = TransportError::Network {
            path: "changes/".to_string(),
            detail: "connection reset".to_string(),
        };

        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(network.is_retryable());
        assert!(!TransportError::NotFound("change request CRQ1".to_string()).is_retryable());
    }
}
