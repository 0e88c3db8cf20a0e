//! Work-log entries attached to a change request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChangeError;

/// A single work-log entry.
///
/// Decoded leniently: the server omits most fields on historical
/// entries, so everything defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Worklog {
    pub work_log_id: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub work_log_type: Option<String>,
    pub submitter: Option<String>,
    pub submit_date: Option<String>,
    pub view_access: Option<String>,
}

impl Worklog {
    /// A worklog carrying only summary text.
    #[must_use]
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }

    /// Decode one raw `workLogs` entry.
    pub fn from_raw(value: &Value) -> Result<Self, ChangeError> {
        serde_json::from_value(value.clone()).map_err(|err| ChangeError::Malformed {
            field: "worklogs".to_string(),
            detail: err.to_string(),
        })
    }
}
