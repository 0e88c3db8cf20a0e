//! Core change-request model.
//!
//! A [`ChangeRequest`] is a local view of a record whose canonical state
//! lives behind a REST API: a committed snapshot plus an overlay of
//! staged mutations. Callers read and write logical fields through the
//! declarative registry in [`field`], persist staged changes in a single
//! round-trip with [`ChangeRequest::save`], and drive the record through
//! its lifecycle with the polled status helpers.
//!
//! Network collaborators are traits ([`remote`]); `crq-client` provides
//! the REST implementations, and tests bind in-memory fakes.
//!
//! ```no_run
//! use crq_core::{ChangeRequest, PollWait};
//! # fn backend() -> crq_core::Backend { unimplemented!() }
//!
//! # fn main() -> Result<(), crq_core::ChangeError> {
//! let mut cr = ChangeRequest::new().with_backend(backend());
//! cr.set("summary", "swap core switch")?;
//! cr.set("impact", "moderate")?;
//! cr.set("businessServices", vec!["ABC_DE".to_string()])?;
//! cr.save()?;
//! cr.to_planning_in_progress(PollWait::default())?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod dates;
pub mod defaults;
mod entity;
pub mod error;
pub mod field;
pub mod overlay;
pub mod person;
pub mod remote;
pub mod worklog;

pub use clock::{Clock, ManualClock, SystemClock};
pub use defaults::EntityDefaults;
pub use entity::{ChangeRequest, PollWait};
pub use error::ChangeError;
pub use field::{FieldInput, FieldKind, FieldValue};
pub use overlay::Overlay;
pub use person::{CoordinatorData, CoordinatorMut, ManagerData, ManagerMut, Person};
pub use remote::{
    Backend, ChangeApi, ConfigItemLookup, ConfigItemRef, PeopleLookup, SupportGroup,
    TransportError,
};
pub use worklog::Worklog;
