//! Default snapshot values for freshly constructed change requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field values seeded into a new change request's snapshot.
///
/// The shipped defaults describe the common case (a normal, internal,
/// low-impact draft); override individual fields before construction to
/// match site conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDefaults {
    pub change_class: String,
    pub change_type: String,
    pub client_viewable: String,
    pub company: String,
    pub coordinator_company: String,
    pub impact: String,
    pub manager_company: String,
    pub review_for_phi: bool,
    pub risk_level: String,
    pub status: String,
    pub summary: String,
    pub urgency: String,
}

impl Default for EntityDefaults {
    fn default() -> Self {
        Self {
            change_class: "Normal".to_string(),
            change_type: "Change".to_string(),
            client_viewable: "No".to_string(),
            company: "Acme".to_string(),
            coordinator_company: "Acme".to_string(),
            impact: "4-Minor/Localized".to_string(),
            manager_company: "Acme".to_string(),
            review_for_phi: false,
            risk_level: "1".to_string(),
            status: "Draft".to_string(),
            summary: String::new(),
            urgency: "4-Low".to_string(),
        }
    }
}

impl EntityDefaults {
    /// Render these defaults as an initial wire snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut raw = Map::new();
        raw.insert("changeClass".to_string(), Value::String(self.change_class.clone()));
        raw.insert(
            "changeTypeString".to_string(),
            Value::String(self.change_type.clone()),
        );
        raw.insert(
            "changeManagerSupportCompany".to_string(),
            Value::String(self.manager_company.clone()),
        );
        raw.insert(
            "clientViewableString".to_string(),
            Value::String(self.client_viewable.clone()),
        );
        raw.insert(
            "coordinatorCompany".to_string(),
            Value::String(self.coordinator_company.clone()),
        );
        raw.insert("impactString".to_string(), Value::String(self.impact.clone()));
        raw.insert("company".to_string(), Value::String(self.company.clone()));
        raw.insert("statusString".to_string(), Value::String(self.status.clone()));
        raw.insert("summary".to_string(), Value::String(self.summary.clone()));
        raw.insert(
            "reviewForPHI".to_string(),
            Value::String(if self.review_for_phi { "True" } else { "False" }.to_string()),
        );
        raw.insert("urgencyString".to_string(), Value::String(self.urgency.clone()));
        raw.insert("riskLevel".to_string(), Value::String(self.risk_level.clone()));
        raw
    }
}
