//! The change-request entity.
//!
//! A `ChangeRequest` is a local view of a remote record: the committed
//! snapshot plus an overlay of staged mutations. Typed access goes
//! through the field registry, persistence through the bound backend.
//!
//! Reads never hit the network; `save`, `refresh`, the status helpers,
//! and `add_worklog` are the only operations that do.

mod persist;
mod relationships;
mod status;

pub use status::PollWait;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::clock::{Clock, SystemClock};
use crate::dates::parse_date_value;
use crate::defaults::EntityDefaults;
use crate::error::ChangeError;
use crate::field::{self, EnumSet, FieldInput, FieldKind, FieldValue};
use crate::overlay::Overlay;
use crate::person::{CoordinatorData, CoordinatorMut, ManagerData, ManagerMut, Person};
use crate::remote::Backend;
use crate::worklog::Worklog;

/// A change request staged locally against remote state.
pub struct ChangeRequest {
    overlay: Overlay,
    backend: Option<Backend>,
    clock: Arc<dyn Clock>,
}

impl ChangeRequest {
    /// A new, uncreated change request seeded with the stock defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_defaults(&EntityDefaults::default())
    }

    /// A new, uncreated change request seeded from `defaults`.
    #[must_use]
    pub fn with_defaults(defaults: &EntityDefaults) -> Self {
        Self {
            overlay: Overlay::new(defaults.snapshot()),
            backend: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Wrap a server response as the committed snapshot.
    #[must_use]
    pub fn from_response(raw: Map<String, Value>) -> Self {
        Self {
            overlay: Overlay::new(raw),
            backend: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Bind the remote collaborators used by persistence operations.
    pub fn bind(&mut self, backend: Backend) {
        self.backend = Some(backend);
    }

    /// Builder-style [`bind`](Self::bind).
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the clock used for status polling. Intended for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a backend is bound.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    /// The committed snapshot, as last seen from the server.
    #[must_use]
    pub const fn raw(&self) -> &Map<String, Value> {
        self.overlay.raw()
    }

    /// The uncommitted pending changes.
    #[must_use]
    pub const fn changes(&self) -> &Map<String, Value> {
        self.overlay.changes()
    }

    /// The assigned change id, once the record has been created.
    #[must_use]
    pub fn change_id(&self) -> Option<String> {
        self.overlay
            .raw()
            .get("changeId")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    pub(crate) fn backend(&self) -> Result<&Backend, ChangeError> {
        self.backend.as_ref().ok_or(ChangeError::NoClientBound)
    }

    pub(crate) const fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    pub(crate) const fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Read a wire field through the overlay.
    pub(crate) fn value_of(&self, wire: &str) -> Option<&Value> {
        self.overlay.get(wire)
    }

    /// Read a wire field as text.
    pub(crate) fn text_of(&self, wire: &str) -> Option<String> {
        self.value_of(wire)
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    /// Stage a raw wire field, bypassing the registry. Sub-records and
    /// internal lifecycle steps use this; callers go through [`set`](Self::set).
    pub(crate) fn stage_wire(&mut self, wire: impl Into<String>, value: Value) {
        self.overlay.set(wire, value);
    }

    // -----------------------------------------------------------------
    // Typed access
    // -----------------------------------------------------------------

    /// Resolve a logical field.
    ///
    /// # Errors
    ///
    /// `UnknownField` for undeclared names; `Malformed` when a stored
    /// value cannot be decoded as its declared kind.
    pub fn get(&self, name: &str) -> Result<FieldValue, ChangeError> {
        let descriptor =
            field::descriptor(name).ok_or_else(|| ChangeError::UnknownField(name.to_string()))?;

        Ok(match descriptor.kind {
            FieldKind::Plain | FieldKind::Lowercased => self.plain_value(name),
            FieldKind::ChangeId => self.plain_value("changeId"),
            FieldKind::IdProjection => self.id_value(name)?,
            FieldKind::BoolString => FieldValue::Bool(self.bool_value(name)),
            FieldKind::Date => match self.date_of(name)? {
                Some(date) => FieldValue::Date(date),
                None => FieldValue::Absent,
            },
            FieldKind::DerivedString | FieldKind::Enumerated(_) | FieldKind::YesNo => {
                self.derived_string_value(name)
            }
            FieldKind::Relationship => FieldValue::List(self.relationship_value(name)),
            FieldKind::Contact => FieldValue::Contact(self.contact_value(name)),
            FieldKind::ManagerRecord => FieldValue::Manager(self.manager()),
            FieldKind::CoordinatorRecord => FieldValue::Coordinator(self.coordinator()),
            FieldKind::Template => self.template_value(),
            FieldKind::Worklogs => FieldValue::Worklogs(self.worklogs()?),
        })
    }

    /// Stage a new value for a logical field.
    ///
    /// # Errors
    ///
    /// `UnknownField` / `ReadOnlyField` for registry violations,
    /// `InvalidEnumValue` when aliasing fails, `Malformed` when the
    /// input shape does not fit the field kind.
    pub fn set(&mut self, name: &str, value: impl Into<FieldInput>) -> Result<(), ChangeError> {
        self.set_field(name, value.into())
    }

    /// Whether a logical field resolves to a present value.
    ///
    /// Any error during resolution reads as `false`; this never
    /// propagates accessor errors.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok_and(|value| !value.is_absent())
    }

    /// Resolve every declared logical field into a flat mapping.
    ///
    /// The first field that fails to resolve fails the whole
    /// serialization; nothing is silently substituted.
    pub fn to_map(&self) -> Result<Map<String, Value>, ChangeError> {
        let mut out = Map::new();
        for name in field::logical_fields() {
            out.insert(name.to_string(), self.get(name)?.to_json());
        }
        Ok(out)
    }

    fn set_field(&mut self, name: &str, input: FieldInput) -> Result<(), ChangeError> {
        let descriptor =
            field::descriptor(name).ok_or_else(|| ChangeError::UnknownField(name.to_string()))?;
        if descriptor.read_only {
            return Err(ChangeError::ReadOnlyField(name.to_string()));
        }

        match descriptor.kind {
            FieldKind::Plain | FieldKind::Date => {
                self.stage_wire(name, input.into_value());
                Ok(())
            }
            FieldKind::Lowercased => match input {
                FieldInput::Text(text) => {
                    self.stage_wire(name, Value::String(text.to_lowercase()));
                    Ok(())
                }
                other => Err(ChangeError::Malformed {
                    field: name.to_string(),
                    detail: format!("expected text, got {other:?}"),
                }),
            },
            FieldKind::Template => {
                self.stage_wire("changeTemplateName", input.into_value());
                Ok(())
            }
            FieldKind::BoolString => {
                let flag = bool_input(name, &input)?;
                self.stage_wire(name, Value::String(bool_wire(flag).to_string()));
                Ok(())
            }
            FieldKind::DerivedString => {
                self.stage_wire(format!("{name}String"), input.into_value());
                Ok(())
            }
            FieldKind::Enumerated(set) => {
                let FieldInput::Text(text) = input else {
                    return Err(ChangeError::InvalidEnumValue {
                        field: name.to_string(),
                        value: input_display(&input),
                    });
                };
                let aliased = field::alias_value(name, set.values(), &text)?;
                self.stage_wire(format!("{name}String"), Value::String(aliased));
                Ok(())
            }
            FieldKind::YesNo => {
                let value = match input {
                    FieldInput::Flag(flag) => {
                        Value::String(if flag { "Yes" } else { "No" }.to_string())
                    }
                    other => other.into_value(),
                };
                self.stage_wire(format!("{name}String"), value);
                Ok(())
            }
            FieldKind::Relationship => {
                self.overlay.stage_relationship(name, relationship_items(input));
                Ok(())
            }
            FieldKind::Contact => {
                let FieldInput::Text(login) = input else {
                    return Err(ChangeError::Malformed {
                        field: name.to_string(),
                        detail: "expected a login id".to_string(),
                    });
                };
                let wire = if name == "contact" {
                    "corporateId".to_string()
                } else {
                    format!("{name}Id")
                };
                self.stage_wire(wire, Value::String(login.to_lowercase()));
                Ok(())
            }
            FieldKind::ChangeId
            | FieldKind::IdProjection
            | FieldKind::ManagerRecord
            | FieldKind::CoordinatorRecord
            | FieldKind::Worklogs => Err(ChangeError::ReadOnlyField(name.to_string())),
        }
    }

    // -----------------------------------------------------------------
    // Named accessors
    // -----------------------------------------------------------------

    /// Stage the corporate id (lowercased).
    pub fn set_corporate_id(&mut self, value: impl Into<String>) {
        self.stage_wire("corporateId", Value::String(value.into().to_lowercase()));
    }

    /// Stage the change-template name.
    pub fn set_template(&mut self, value: impl Into<String>) {
        self.stage_wire("changeTemplateName", Value::String(value.into()));
    }

    /// The primary contact, materialized from the prefixed wire fields.
    #[must_use]
    pub fn contact(&self) -> Person {
        self.contact_value("contact")
    }

    /// The alternate contact.
    #[must_use]
    pub fn alternate_contact(&self) -> Person {
        self.contact_value("alternateContact")
    }

    /// The change manager, as currently resolved.
    #[must_use]
    pub fn manager(&self) -> ManagerData {
        ManagerData::from_entity(self)
    }

    /// Write-through handle for the change-manager fields.
    pub fn manager_mut(&mut self) -> ManagerMut<'_> {
        ManagerMut::new(self)
    }

    /// The change coordinator, as currently resolved.
    #[must_use]
    pub fn coordinator(&self) -> CoordinatorData {
        CoordinatorData::from_entity(self)
    }

    /// Write-through handle for the change-coordinator fields.
    pub fn coordinator_mut(&mut self) -> CoordinatorMut<'_> {
        CoordinatorMut::new(self)
    }

    /// All work-log entries from the committed snapshot.
    ///
    /// An empty sequence, not absent, when the record has none.
    pub fn worklogs(&self) -> Result<Vec<Worklog>, ChangeError> {
        let Some(Value::Array(entries)) = self.overlay.raw().get("workLogs") else {
            return Ok(Vec::new());
        };
        entries.iter().map(Worklog::from_raw).collect()
    }

    /// Append a worklog to the persisted record.
    ///
    /// Does not touch the overlay: worklogs live outside the staged
    /// field model.
    pub fn add_worklog(&self, worklog: &Worklog) -> Result<Value, ChangeError> {
        let change_id = self.change_id().ok_or(ChangeError::NotYetCreated {
            operation: "add a worklog",
        })?;
        let response = self.backend()?.changes().add_worklog(&change_id, worklog)?;
        Ok(response)
    }

    // -----------------------------------------------------------------
    // Kind-specific readers
    // -----------------------------------------------------------------

    fn plain_value(&self, wire: &str) -> FieldValue {
        match self.value_of(wire) {
            None => FieldValue::Absent,
            Some(Value::String(text)) => FieldValue::Text(text.clone()),
            Some(other) => FieldValue::Raw(other.clone()),
        }
    }

    fn id_value(&self, name: &str) -> Result<FieldValue, ChangeError> {
        let base = name.strip_suffix("Id").unwrap_or(name);
        match self.value_of(base) {
            None => Ok(FieldValue::Absent),
            Some(Value::Number(number)) => number.as_i64().map(FieldValue::Int).ok_or_else(|| {
                ChangeError::Malformed {
                    field: name.to_string(),
                    detail: "numeric value does not fit an integer".to_string(),
                }
            }),
            Some(Value::String(text)) => {
                text.parse::<i64>()
                    .map(FieldValue::Int)
                    .map_err(|_| ChangeError::Malformed {
                        field: name.to_string(),
                        detail: format!("{text:?} is not an integer"),
                    })
            }
            Some(other) => Err(ChangeError::Malformed {
                field: name.to_string(),
                detail: format!("expected an integer, got {other}"),
            }),
        }
    }

    fn bool_value(&self, wire: &str) -> bool {
        self.value_of(wire).and_then(Value::as_str) == Some("True")
    }

    pub(crate) fn date_of(&self, wire: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>, ChangeError> {
        match self.value_of(wire) {
            None => Ok(None),
            Some(value) => parse_date_value(wire, value).map(Some),
        }
    }

    fn derived_string_value(&self, name: &str) -> FieldValue {
        self.plain_value(&format!("{name}String"))
    }

    fn template_value(&self) -> FieldValue {
        match self.text_of("changeTemplateName").filter(|t| !t.is_empty()) {
            Some(template) => FieldValue::Text(template),
            None => self.plain_value("template"),
        }
    }

    /// The current status label, with pending changes applied.
    pub(crate) fn status_label(&self) -> Option<String> {
        self.text_of("statusString")
    }

    /// Stage a status change. Statuses are read-only to callers; the
    /// lifecycle helpers come through here.
    pub(crate) fn stage_status(&mut self, label: &str) -> Result<(), ChangeError> {
        let aliased = field::alias_value("status", EnumSet::Status.values(), label)?;
        self.stage_wire("statusString", Value::String(aliased));
        Ok(())
    }

    fn contact_value(&self, prefix: &str) -> Person {
        let text = |suffix: &str| self.text_of(&format!("{prefix}{suffix}"));

        let mut person = Person {
            company: text("Company")
                .filter(|company| !company.is_empty())
                .or_else(|| self.text_of("company")),
            department: text("Department"),
            email: text("Email"),
            first_name: text("FirstName"),
            last_name: text("LastName"),
            login_id: text("Id"),
            organization: text("Organization"),
            people_id: text("PeopleId"),
            phone_number: text("PhoneNumber"),
            site: text("Site"),
            site_group: text("SiteGroup"),
            site_id: text("SiteId"),
        };

        // The primary contact prefers the corporate id over the generic
        // login-id field.
        if prefix == "contact" {
            person.login_id = self
                .text_of("corporateId")
                .filter(|id| !id.is_empty())
                .or_else(|| text("LoginId"));
        }

        person
    }

    fn relationship_value(&self, name: &str) -> Vec<Value> {
        let mut merged = Vec::new();
        let raw = self.overlay.raw();

        // Relationship lists cached by an earlier commit are keyed by
        // relation name.
        if let Some(Value::Object(cached)) = raw.get("relationships") {
            if let Some(Value::Array(items)) = cached.get(name) {
                merged.extend(items.iter().cloned());
            }
        }

        // Server responses carry business services as impacted areas.
        if name == "businessServices" {
            if let Some(Value::Array(areas)) = raw.get("impactedAreas") {
                merged.extend(areas.iter().filter_map(|area| area.get("company")).cloned());
            }
        }

        // Server responses carry computer systems as a flat relationship
        // list with a request summary per entry.
        if name == "computerSystems" {
            if let Some(Value::Array(records)) = raw.get("relationships") {
                merged.extend(
                    records
                        .iter()
                        .filter_map(|record| record.get("requestSummary"))
                        .cloned(),
                );
            }
        }

        if let Some(staged) = self.overlay.staged_relationship(name) {
            merged.extend(staged.iter().cloned());
        }

        merged
    }
}

impl Default for ChangeRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRequest")
            .field("change_id", &self.change_id())
            .field("pending_changes", &self.overlay.changes().len())
            .field("bound", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}

const fn bool_wire(flag: bool) -> &'static str {
    if flag { "True" } else { "False" }
}

fn bool_input(field: &str, input: &FieldInput) -> Result<bool, ChangeError> {
    match input {
        FieldInput::Flag(flag) => Ok(*flag),
        FieldInput::Text(text) if text.eq_ignore_ascii_case("true") => Ok(true),
        FieldInput::Text(text) if text.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(ChangeError::InvalidEnumValue {
            field: field.to_string(),
            value: input_display(other),
        }),
    }
}

fn input_display(input: &FieldInput) -> String {
    match input {
        FieldInput::Text(text) => text.clone(),
        FieldInput::Flag(flag) => flag.to_string(),
        FieldInput::List(items) => items.join(", "),
        FieldInput::Json(value) => value.to_string(),
    }
}

fn relationship_items(input: FieldInput) -> Vec<Value> {
    match input {
        FieldInput::Text(text) => vec![Value::String(text)],
        FieldInput::Flag(flag) => vec![Value::Bool(flag)],
        FieldInput::List(items) => items.into_iter().map(Value::String).collect(),
        FieldInput::Json(Value::Array(items)) => items,
        FieldInput::Json(other) => vec![other],
    }
}
