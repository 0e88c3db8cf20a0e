//! Declarative field registry.
//!
//! Every logical field a caller can touch has exactly one entry here.
//! The entry's [`FieldKind`] drives both the getter and the setter on
//! [`crate::ChangeRequest`], so adding a field is a one-line change and
//! an unhandled kind is a compile error, not a runtime surprise.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::ChangeError;
use crate::person::{CoordinatorData, ManagerData, Person};
use crate::worklog::Worklog;

/// Valid impact labels, least to most severe.
pub const IMPACTS: &[&str] = &[
    "4-Minor/Localized",
    "3-Moderate/Limited",
    "2-Significant/Large",
    "1-Extensive/Widespread",
];

/// Valid urgency labels, least to most urgent.
pub const URGENCIES: &[&str] = &["4-Low", "3-Medium", "2-High", "1-Critical"];

/// Valid change timings.
pub const CHANGE_TIMINGS: &[&str] = &["Standard", "Normal", "Emergency"];

/// Valid lifecycle statuses.
pub const STATUSES: &[&str] = &[
    "Cancelled",
    "Closed",
    "Completed",
    "Draft",
    "Implementation In Progress",
    "Pending",
    "Planning In Progress",
    "Rejected",
    "Request For Authorization",
    "Scheduled",
    "Scheduled For Approval",
    "Scheduled For Review",
];

/// One of the fixed valid-value sets used by enumerated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumSet {
    Impact,
    Urgency,
    ChangeTiming,
    Status,
}

impl EnumSet {
    /// The ordered members of the set.
    #[must_use]
    pub const fn values(self) -> &'static [&'static str] {
        match self {
            Self::Impact => IMPACTS,
            Self::Urgency => URGENCIES,
            Self::ChangeTiming => CHANGE_TIMINGS,
            Self::Status => STATUSES,
        }
    }
}

/// How a logical field maps onto the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Stored under the logical name as-is.
    Plain,
    /// Stored under the logical name, lowercased on write (login ids).
    Lowercased,
    /// Alias of the `changeId` wire field.
    ChangeId,
    /// Integer projection of the wire field named by stripping the `Id`
    /// suffix from the logical name. Read-only by construction.
    IdProjection,
    /// Boolean encoded as the literal strings `"True"` / `"False"`.
    BoolString,
    /// Epoch seconds or a date/time string, decoded to a calendar date.
    Date,
    /// Stored under `<name>String` with no validation.
    DerivedString,
    /// Stored under `<name>String` after aliasing against a valid set.
    Enumerated(EnumSet),
    /// Stored under `<name>String`; boolean input becomes `"Yes"`/`"No"`.
    YesNo,
    /// Merged relationship list; writes stage a pending relationship.
    Relationship,
    /// Contact record materialized from prefixed wire fields.
    Contact,
    /// The change-manager projection.
    ManagerRecord,
    /// The change-coordinator projection.
    CoordinatorRecord,
    /// Template name, preferring `changeTemplateName` over `template`.
    Template,
    /// Structured work-log entries from the raw `workLogs` list.
    Worklogs,
}

/// Registry entry for one logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    pub read_only: bool,
}

const FIELDS: &[(&str, FieldKind)] = &[
    ("computerSystems", FieldKind::Relationship),
    ("businessServices", FieldKind::Relationship),
    ("instanceIds", FieldKind::Relationship),
    ("actualEndDate", FieldKind::Date),
    ("actualStartDate", FieldKind::Date),
    ("alternateContact", FieldKind::Contact),
    ("changeClass", FieldKind::Plain),
    ("changeId", FieldKind::Plain),
    ("id", FieldKind::ChangeId),
    ("number", FieldKind::ChangeId),
    ("changeManager", FieldKind::ManagerRecord),
    ("manager", FieldKind::ManagerRecord),
    ("changeTiming", FieldKind::Enumerated(EnumSet::ChangeTiming)),
    ("changeTimingId", FieldKind::IdProjection),
    ("changeType", FieldKind::DerivedString),
    ("changeTypeId", FieldKind::IdProjection),
    ("clientReferenceId", FieldKind::Plain),
    ("clientViewable", FieldKind::YesNo),
    ("clientViewableId", FieldKind::IdProjection),
    ("closedDate", FieldKind::Date),
    ("coordinator", FieldKind::CoordinatorRecord),
    ("changeCoordinator", FieldKind::CoordinatorRecord),
    ("company", FieldKind::Plain),
    ("completedDate", FieldKind::Date),
    ("contact", FieldKind::Contact),
    ("corporateId", FieldKind::Lowercased),
    ("environment", FieldKind::Plain),
    ("impact", FieldKind::Enumerated(EnumSet::Impact)),
    ("impactId", FieldKind::IdProjection),
    ("integrationId", FieldKind::Plain),
    ("lastModifiedBy", FieldKind::Plain),
    ("lastModifiedDate", FieldKind::Date),
    ("leadTime", FieldKind::Plain),
    ("locationCompany", FieldKind::Plain),
    ("locationSite", FieldKind::Plain),
    ("manufacturer", FieldKind::Plain),
    ("modelVersion", FieldKind::Plain),
    ("notes", FieldKind::Plain),
    ("operationalCategorizationTier1", FieldKind::Plain),
    ("operationalCategorizationTier2", FieldKind::Plain),
    ("operationalCategorizationTier3", FieldKind::Plain),
    ("originationDate", FieldKind::Date),
    ("performanceRating", FieldKind::Plain),
    ("portalSolution", FieldKind::Plain),
    ("portalSolutionFamily", FieldKind::Plain),
    ("previousStatus", FieldKind::DerivedString),
    ("previousStatusId", FieldKind::IdProjection),
    ("priority", FieldKind::DerivedString),
    ("priorityId", FieldKind::IdProjection),
    ("productCategorizationTier1", FieldKind::Plain),
    ("productCategorizationTier2", FieldKind::Plain),
    ("productCategorizationTier3", FieldKind::Plain),
    ("productName", FieldKind::Plain),
    ("requestedBy", FieldKind::Plain),
    ("requestedEndDate", FieldKind::Date),
    ("requestedStartDate", FieldKind::Date),
    ("requestId", FieldKind::Plain),
    ("reviewer", FieldKind::Plain),
    ("reviewerLogin", FieldKind::Plain),
    ("reviewForPHI", FieldKind::BoolString),
    ("riskLevel", FieldKind::Plain),
    ("scheduledEndDate", FieldKind::Date),
    ("scheduledStartDate", FieldKind::Date),
    ("stage", FieldKind::Plain),
    ("status", FieldKind::Enumerated(EnumSet::Status)),
    ("statusId", FieldKind::IdProjection),
    ("submitDate", FieldKind::Date),
    ("submitter", FieldKind::Plain),
    ("summary", FieldKind::Plain),
    ("targetDate", FieldKind::Date),
    ("template", FieldKind::Template),
    ("universalTicketNumber", FieldKind::Plain),
    ("urgency", FieldKind::Enumerated(EnumSet::Urgency)),
    ("urgencyId", FieldKind::IdProjection),
    ("vendorCompany", FieldKind::Plain),
    ("vendorGroup", FieldKind::Plain),
    ("vendorOrganization", FieldKind::Plain),
    ("vendorTicketNumber", FieldKind::Plain),
    ("worklogs", FieldKind::Worklogs),
];

const READ_ONLY: &[&str] = &[
    "changeId",
    "id",
    "number",
    "changeManager",
    "manager",
    "changeTimingId",
    "changeTypeId",
    "clientViewableId",
    "closedDate",
    "coordinator",
    "changeCoordinator",
    "completedDate",
    "impactId",
    "lastModifiedBy",
    "lastModifiedDate",
    "locationCompany",
    "locationSite",
    "originationDate",
    "previousStatus",
    "previousStatusId",
    "priority",
    "priorityId",
    "requestId",
    "reviewer",
    "reviewerLogin",
    "stage",
    "status",
    "statusId",
    "submitDate",
    "submitter",
    "universalTicketNumber",
    "urgencyId",
    "vendorOrganization",
    "worklogs",
];

/// Look a logical field up in the registry.
#[must_use]
pub fn descriptor(name: &str) -> Option<FieldDescriptor> {
    FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|&(field, kind)| FieldDescriptor {
            kind,
            read_only: READ_ONLY.contains(&field),
        })
}

/// All declared logical field names, in registry order.
pub fn logical_fields() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|(name, _)| *name)
}

/// Alias free-text input to a member of `valid`.
///
/// The first member whose lowercased text contains the lowercased input
/// wins; empty input and unmatched input are rejected.
pub fn alias_value(field: &str, valid: &[&str], input: &str) -> Result<String, ChangeError> {
    if input.is_empty() {
        return Err(ChangeError::InvalidEnumValue {
            field: field.to_string(),
            value: input.to_string(),
        });
    }

    let needle = input.to_lowercase();
    valid
        .iter()
        .find(|candidate| candidate.to_lowercase().contains(&needle))
        .map(|candidate| (*candidate).to_string())
        .ok_or_else(|| ChangeError::InvalidEnumValue {
            field: field.to_string(),
            value: input.to_string(),
        })
}

/// A resolved field value.
///
/// `Absent` means the field has no value in either overlay layer. It is
/// distinct from an empty string or an empty list: an empty worklog list
/// is a present, empty sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Absent,
    Text(String),
    Int(i64),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Contact(Person),
    Manager(ManagerData),
    Coordinator(CoordinatorData),
    Worklogs(Vec<Worklog>),
    Raw(Value),
}

impl FieldValue {
    /// Whether this value is the absent sentinel.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Borrow the text of a `Text` or textual `Raw` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Raw(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    /// The calendar date of a `Date` value.
    #[must_use]
    pub const fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Render this value as JSON for serialization.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Text(text) => Value::String(text.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Date(date) => {
                Value::String(date.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Self::List(items) => Value::Array(items.clone()),
            Self::Contact(person) => serde_json::to_value(person).unwrap_or(Value::Null),
            Self::Manager(manager) => serde_json::to_value(manager).unwrap_or(Value::Null),
            Self::Coordinator(coordinator) => {
                serde_json::to_value(coordinator).unwrap_or(Value::Null)
            }
            Self::Worklogs(worklogs) => serde_json::to_value(worklogs).unwrap_or(Value::Null),
            Self::Raw(value) => value.clone(),
        }
    }
}

/// A caller-supplied value for a typed setter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text(String),
    Flag(bool),
    List(Vec<String>),
    Json(Value),
}

impl FieldInput {
    /// Convert to the raw wire value for plain staging.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Flag(flag) => Value::Bool(flag),
            Self::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
            Self::Json(value) => value,
        }
    }
}

impl From<&str> for FieldInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldInput {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Vec<String>> for FieldInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<&[&str]> for FieldInput {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(ToString::to_string).collect())
    }
}

impl From<Value> for FieldInput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<DateTime<Utc>> for FieldInput {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Text(value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl From<&Person> for FieldInput {
    /// A person used as setter input contributes their login id.
    fn from(person: &Person) -> Self {
        Self::Text(person.login_id.clone().unwrap_or_default())
    }
}
