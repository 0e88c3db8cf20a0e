//! Change-request persistence service.
//!
//! Implements [`ChangeApi`] over the modify (`change-svc/v2`) and query
//! (`change-query-svc/v1`) endpoints. Create and update bodies are
//! coerced into the formats the API insists on (lowercased login ids,
//! defaulted location company), and create additionally populates the
//! manager and coordinator support groups from the people directory
//! when the caller left them unset.

use std::sync::Arc;

use crq_core::{ChangeApi, PeopleLookup, SupportGroup, TransportError, Worklog};
use serde_json::{Map, Value};

use crate::transport::Transport;

const MODIFY_PATH: &str = "change-svc/v2";
const QUERY_PATH: &str = "change-query-svc/v1";

/// REST implementation of [`ChangeApi`].
pub struct ChangeService {
    transport: Arc<dyn Transport>,
    people: Arc<dyn PeopleLookup>,
    group_prefixes: Vec<String>,
}

impl ChangeService {
    /// Build the service over a shared transport and people directory.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        people: Arc<dyn PeopleLookup>,
        group_prefixes: Vec<String>,
    ) -> Self {
        Self {
            transport,
            people,
            group_prefixes,
        }
    }

    /// Fill `changeManagerSupportGroup` / `coordinatorSupportGroup` (and
    /// their organization/company companions) from the people directory
    /// when unset. The configured prefixes are tried in order; the first
    /// group matching a prefix wins. A login id with no matching group
    /// leaves the fields unset for the server to reject or default.
    fn populate_support_groups(&self, body: &mut Map<String, Value>) {
        if !is_set(body, "changeManagerSupportGroup") {
            if let Some(group) = self.lookup_group(body, "changeManagerLoginId") {
                insert_text(body, "changeManagerSupportGroup", Some(group.support_group_name));
                insert_text(
                    body,
                    "changeManagerSupportOrganization",
                    group.support_organization,
                );
                insert_text(body, "changeManagerSupportCompany", group.company);
            }
        }

        if !is_set(body, "coordinatorSupportGroup") {
            if let Some(group) = self.lookup_group(body, "coordinatorLoginId") {
                insert_text(body, "coordinatorSupportGroup", Some(group.support_group_name));
                insert_text(
                    body,
                    "coordinatorSupportOrganization",
                    group.support_organization,
                );
                insert_text(body, "coordinatorCompany", group.company);
            }
        }
    }

    fn lookup_group(&self, body: &Map<String, Value>, login_field: &str) -> Option<SupportGroup> {
        let login = body.get(login_field).and_then(Value::as_str)?;
        let found = self.gather_group(login);
        if found.is_none() {
            tracing::warn!(login_id = %login, "no prefixed support group found");
        }
        found
    }

    fn gather_group(&self, login_id: &str) -> Option<SupportGroup> {
        let groups = match self.people.support_groups_by_login_id(login_id) {
            Ok(groups) => groups,
            Err(err) => {
                tracing::warn!(login_id = %login_id, error = %err, "support group lookup failed");
                return None;
            }
        };

        for prefix in &self.group_prefixes {
            for group in &groups {
                if group
                    .support_group_name
                    .to_lowercase()
                    .starts_with(prefix.as_str())
                {
                    return Some(group.clone());
                }
            }
        }
        None
    }
}

impl ChangeApi for ChangeService {
    fn create(&self, body: &Map<String, Value>) -> Result<String, TransportError> {
        let mut body = coerce_params(body.clone());
        self.populate_support_groups(&mut body);

        let path = format!("{MODIFY_PATH}/changes/");
        let response = self.transport.post(&path, &Value::Object(body))?;

        response
            .get("changeId")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| TransportError::Decode {
                path,
                detail: "create response carried no changeId".to_string(),
            })
    }

    fn update(&self, change_id: &str, body: &Map<String, Value>) -> Result<(), TransportError> {
        let body = coerce_params(body.clone());
        let path = format!("{MODIFY_PATH}/changes/{change_id}");
        self.transport.put(&path, &Value::Object(body))?;
        Ok(())
    }

    fn fetch(&self, change_id: &str) -> Result<Option<Map<String, Value>>, TransportError> {
        let path = format!("{QUERY_PATH}/changes/{change_id}/all");
        match self.transport.get(&path, &[]) {
            Ok(Value::Object(raw)) => Ok(Some(raw)),
            Ok(other) => Err(TransportError::Decode {
                path,
                detail: format!("expected an object, got {other}"),
            }),
            Err(TransportError::Status { code: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn fetch_by_ticket_number(
        &self,
        ticket_number: &str,
    ) -> Result<Option<Value>, TransportError> {
        let path = format!("{QUERY_PATH}/changes");
        match self
            .transport
            .get(&path, &[("universalTicketNumber", ticket_number)])
        {
            Ok(Value::Null) => Ok(None),
            Ok(body) => Ok(Some(body)),
            Err(TransportError::Status { code: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn add_worklog(&self, change_id: &str, worklog: &Worklog) -> Result<Value, TransportError> {
        let path = format!("{MODIFY_PATH}/changes/{change_id}/worklogs");
        let body = serde_json::to_value(worklog).map_err(|err| TransportError::Decode {
            path: path.clone(),
            detail: err.to_string(),
        })?;
        self.transport.post(&path, &body)
    }
}

/// Coerce upsert parameters into the formats the API accepts: login ids
/// lowercased, `locationCompany` defaulted from `company`.
fn coerce_params(mut body: Map<String, Value>) -> Map<String, Value> {
    for field in ["coordinatorLoginId", "changeManagerLoginId"] {
        if let Some(Value::String(login)) = body.get(field) {
            let lowered = login.to_lowercase();
            body.insert(field.to_string(), Value::String(lowered));
        }
    }

    if !is_set(&body, "locationCompany") {
        if let Some(company) = body.get("company").cloned() {
            body.insert("locationCompany".to_string(), company);
        }
    }
    body
}

fn is_set(body: &Map<String, Value>, field: &str) -> bool {
    matches!(body.get(field), Some(value) if !value.is_null())
}

fn insert_text(body: &mut Map<String, Value>, field: &str, value: Option<String>) {
    if let Some(text) = value {
        body.insert(field.to_string(), Value::String(text));
    }
}
