use crate::remote::TransportError;

/// Errors raised while reading, mutating, or persisting a change request.
///
/// Field-taxonomy errors (`UnknownField`, `ReadOnlyField`,
/// `InvalidEnumValue`) and lifecycle guard errors are caller errors and
/// are never retried internally. Transport failures bubble up from the
/// bound collaborators unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    /// The logical field name is not declared in the field registry.
    #[error("{0} is not a valid field")]
    UnknownField(String),

    /// A write was attempted on a read-only field.
    #[error("{0} is a read-only field")]
    ReadOnlyField(String),

    /// The supplied value could not be aliased to a member of the
    /// field's valid-value set.
    #[error("could not alias {value:?} to a valid value for {field}")]
    InvalidEnumValue { field: String, value: String },

    /// An operation that requires a persisted record was invoked before
    /// the change request was created remotely.
    #[error("change request has no id yet: cannot {operation}")]
    NotYetCreated { operation: &'static str },

    /// A persistence operation was attempted with no bound client.
    #[error("no client is bound to this change request")]
    NoClientBound,

    /// A status transition was requested from a status outside the
    /// transition's allowed starting set.
    #[error("{current} is not a valid initial status when moving to {target}; valid statuses: {allowed}")]
    GuardViolation {
        current: String,
        target: String,
        allowed: String,
    },

    /// Polling exhausted the caller's time budget before the status
    /// reached an allowed end status.
    #[error("timed out waiting for change request {change_id} to transition to {target}")]
    TransitionTimeout { change_id: String, target: String },

    /// `scheduledStartDate` and `scheduledEndDate` must both be set
    /// before a change request can be scheduled.
    #[error("scheduledStartDate and scheduledEndDate must be set prior to scheduling")]
    MissingSchedule,

    /// `actualStartDate` must be set before a change request can be
    /// completed.
    #[error("actualStartDate must be set prior to completion")]
    MissingActualStart,

    /// A stored wire value could not be decoded as its declared kind.
    #[error("malformed value in field {field}: {detail}")]
    Malformed { field: String, detail: String },

    /// A collaborator call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
