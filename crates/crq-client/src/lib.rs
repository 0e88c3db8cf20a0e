//! REST collaborators for `crq-core`.
//!
//! [`CrqClient`] bundles the change, configuration-item, company, and
//! people services over one shared token-authenticated transport.
//! Its [`backend`](CrqClient::backend) handle is what a
//! `crq_core::ChangeRequest` binds to.
//!
//! ```no_run
//! use crq_client::{ClientConfig, CrqClient};
//! use crq_core::ChangeRequest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CrqClient::new(ClientConfig::from_env()?);
//! let mut cr = ChangeRequest::new().with_backend(client.backend());
//! cr.set("summary", "swap core switch")?;
//! cr.save()?;
//! # Ok(())
//! # }
//! ```

mod changes;
mod companies;
mod config;
mod config_items;
mod people;
mod token;
mod transport;

pub use changes::ChangeService;
pub use companies::{Company, CompanyService};
pub use config::{ClientConfig, DEFAULT_GROUP_PREFIXES};
pub use config_items::{ConfigItemService, SystemFilters};
pub use people::PeopleService;
pub use transport::{RestTransport, Transport};

use std::sync::Arc;

use crq_core::Backend;

/// All service clients over one shared transport.
pub struct CrqClient {
    changes: Arc<ChangeService>,
    config_items: Arc<ConfigItemService>,
    companies: CompanyService,
    people: Arc<PeopleService>,
    business_service_matcher: String,
}

impl CrqClient {
    /// Build every service client from one configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let group_prefixes = config.group_prefixes.clone();
        let business_service_matcher = config.business_service_matcher.clone();
        let transport: Arc<dyn Transport> = Arc::new(RestTransport::new(config));
        Self::over_transport(transport, group_prefixes, business_service_matcher)
    }

    /// Build the services over an existing transport. Tests use this to
    /// drive the whole client against an in-memory fake.
    #[must_use]
    pub fn over_transport(
        transport: Arc<dyn Transport>,
        group_prefixes: Vec<String>,
        business_service_matcher: String,
    ) -> Self {
        let people = Arc::new(PeopleService::new(Arc::clone(&transport)));
        let changes = Arc::new(ChangeService::new(
            Arc::clone(&transport),
            Arc::clone(&people) as Arc<dyn crq_core::PeopleLookup>,
            group_prefixes,
        ));
        let config_items = Arc::new(ConfigItemService::new(Arc::clone(&transport)));
        let companies = CompanyService::new(transport);

        Self {
            changes,
            config_items,
            companies,
            people,
            business_service_matcher,
        }
    }

    /// The change-request persistence service.
    #[must_use]
    pub fn changes(&self) -> &ChangeService {
        &self.changes
    }

    /// The configuration-item service.
    #[must_use]
    pub fn config_items(&self) -> &ConfigItemService {
        &self.config_items
    }

    /// The company query service.
    #[must_use]
    pub const fn companies(&self) -> &CompanyService {
        &self.companies
    }

    /// The people-directory service.
    #[must_use]
    pub fn people(&self) -> &PeopleService {
        &self.people
    }

    /// The collaborator handle a `ChangeRequest` binds to.
    #[must_use]
    pub fn backend(&self) -> Backend {
        Backend::new(
            Arc::clone(&self.changes) as Arc<dyn crq_core::ChangeApi>,
            Arc::clone(&self.config_items) as Arc<dyn crq_core::ConfigItemLookup>,
        )
        .with_business_service_matcher(self.business_service_matcher.clone())
    }
}
