//! People-directory queries.

use std::sync::Arc;

use crq_core::{PeopleLookup, SupportGroup, TransportError};
use serde_json::Value;

use crate::transport::Transport;

const QUERY_PATH: &str = "people-query-svc/v1";

/// REST implementation of [`PeopleLookup`].
pub struct PeopleService {
    transport: Arc<dyn Transport>,
}

impl PeopleService {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl PeopleLookup for PeopleService {
    fn support_groups_by_login_id(
        &self,
        login_id: &str,
    ) -> Result<Vec<SupportGroup>, TransportError> {
        let path = format!("{QUERY_PATH}/people/{login_id}/support-groups");
        let body = match self.transport.get(&path, &[]) {
            Ok(body) => body,
            // An unknown login simply has no groups.
            Err(TransportError::Status { code: 404, .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        match body {
            Value::Array(records) => records
                .into_iter()
                .map(|record| {
                    serde_json::from_value(record).map_err(|err| TransportError::Decode {
                        path: path.clone(),
                        detail: err.to_string(),
                    })
                })
                .collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(TransportError::Decode {
                path,
                detail: format!("expected an array of support groups, got {other}"),
            }),
        }
    }
}
