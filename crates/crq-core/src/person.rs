//! Contact, manager, and coordinator projections.
//!
//! These records have no storage of their own: reads materialize from
//! the owning change request's overlay, and the `*Mut` handles write
//! through to the owner's pending change set, so there is exactly one
//! mutation point per entity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::ChangeRequest;

/// A person referenced by a change request (contact records).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub company: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub login_id: Option<String>,
    pub organization: Option<String>,
    pub people_id: Option<String>,
    pub phone_number: Option<String>,
    pub site: Option<String>,
    pub site_group: Option<String>,
    pub site_id: Option<String>,
}

/// Wire fields behind the change-manager projection.
const MANAGER_FIELDS: &[(&str, &str)] = &[
    ("company", "changeManagerSupportCompany"),
    ("organization", "changeManagerSupportOrganization"),
    ("group", "changeManagerSupportGroup"),
    ("name", "changeManager"),
    ("loginId", "changeManagerLoginId"),
];

/// Wire fields behind the change-coordinator projection.
const COORDINATOR_FIELDS: &[(&str, &str)] = &[
    ("company", "coordinatorCompany"),
    ("organization", "coordinatorSupportOrganization"),
    ("group", "coordinatorSupportGroup"),
    ("groupId", "coordinatorSupportGroupId"),
    ("name", "coordinator"),
    ("loginId", "coordinatorLoginId"),
];

/// Snapshot of the change-manager fields at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerData {
    pub company: Option<String>,
    pub organization: Option<String>,
    pub group: Option<String>,
    pub name: Option<String>,
    pub login_id: Option<String>,
}

impl ManagerData {
    pub(crate) fn from_entity(entity: &ChangeRequest) -> Self {
        let mut data = Self::default();
        for &(field, wire) in MANAGER_FIELDS {
            let value = entity.text_of(wire);
            match field {
                "company" => data.company = value,
                "organization" => data.organization = value,
                "group" => data.group = value,
                "name" => data.name = value,
                _ => data.login_id = value,
            }
        }
        data
    }
}

/// Snapshot of the change-coordinator fields at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorData {
    pub company: Option<String>,
    pub organization: Option<String>,
    pub group: Option<String>,
    pub group_id: Option<String>,
    pub name: Option<String>,
    pub login_id: Option<String>,
}

impl CoordinatorData {
    pub(crate) fn from_entity(entity: &ChangeRequest) -> Self {
        let mut data = Self::default();
        for &(field, wire) in COORDINATOR_FIELDS {
            let value = entity.text_of(wire);
            match field {
                "company" => data.company = value,
                "organization" => data.organization = value,
                "group" => data.group = value,
                "groupId" => data.group_id = value,
                "name" => data.name = value,
                _ => data.login_id = value,
            }
        }
        data
    }
}

/// Write-through handle for the change-manager fields.
///
/// Every setter stages the mapped wire field on the owning change
/// request; nothing is persisted until the owner's `save`.
#[derive(Debug)]
pub struct ManagerMut<'a> {
    owner: &'a mut ChangeRequest,
}

impl<'a> ManagerMut<'a> {
    pub(crate) const fn new(owner: &'a mut ChangeRequest) -> Self {
        Self { owner }
    }

    /// Current values, with pending changes applied.
    #[must_use]
    pub fn data(&self) -> ManagerData {
        ManagerData::from_entity(self.owner)
    }

    pub fn set_company(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("changeManagerSupportCompany", Value::String(value.into()));
    }

    pub fn set_organization(&mut self, value: impl Into<String>) {
        self.owner.stage_wire(
            "changeManagerSupportOrganization",
            Value::String(value.into()),
        );
    }

    pub fn set_group(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("changeManagerSupportGroup", Value::String(value.into()));
    }

    pub fn set_name(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("changeManager", Value::String(value.into()));
    }

    pub fn set_login_id(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("changeManagerLoginId", Value::String(value.into()));
    }
}

/// Write-through handle for the change-coordinator fields.
#[derive(Debug)]
pub struct CoordinatorMut<'a> {
    owner: &'a mut ChangeRequest,
}

impl<'a> CoordinatorMut<'a> {
    pub(crate) const fn new(owner: &'a mut ChangeRequest) -> Self {
        Self { owner }
    }

    /// Current values, with pending changes applied.
    #[must_use]
    pub fn data(&self) -> CoordinatorData {
        CoordinatorData::from_entity(self.owner)
    }

    pub fn set_company(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("coordinatorCompany", Value::String(value.into()));
    }

    pub fn set_organization(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("coordinatorSupportOrganization", Value::String(value.into()));
    }

    pub fn set_group(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("coordinatorSupportGroup", Value::String(value.into()));
    }

    pub fn set_group_id(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("coordinatorSupportGroupId", Value::String(value.into()));
    }

    pub fn set_name(&mut self, value: impl Into<String>) {
        self.owner.stage_wire("coordinator", Value::String(value.into()));
    }

    pub fn set_login_id(&mut self, value: impl Into<String>) {
        self.owner
            .stage_wire("coordinatorLoginId", Value::String(value.into()));
    }
}
