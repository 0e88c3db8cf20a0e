//! Configuration-item queries and change-request linking.
//!
//! Implements [`ConfigItemLookup`] over the asset query service, plus
//! the wider computer-system and domain queries built on the generic
//! relationship endpoint. Several of those queries answer "which
//! company / site does this system belong to" by taking the most common
//! value across the returned relationships; ties break by first
//! occurrence in response order.

use std::sync::Arc;

use crq_core::{ConfigItemLookup, ConfigItemRef, TransportError};
use serde_json::Value;

use crate::transport::Transport;

const QUERY_PATH: &str = "asset-query-svc/v1";
const MODIFY_PATH: &str = "asset-svc/v1";

const BUSINESS_SERVICE_CLASS: &str = "BMC.CORE:BMC_BUSINESSSERVICE";
const COMPUTER_SYSTEM_CLASS: &str = "BMC.CORE:BMC_COMPUTERSYSTEM";
const DOMAIN_CLASS: &str = "BMC.CORE:BMC_DOMAIN";

/// Optional filters for [`ConfigItemService::computer_systems`].
#[derive(Debug, Clone, Default)]
pub struct SystemFilters {
    /// Restrict to one domain (`p123`).
    pub domain: Option<String>,
    /// Operating-system substring (`linux`).
    pub os: Option<String>,
    /// Host-name substring (`abcdeapp1`).
    pub fqdn: Option<String>,
    /// Required primary usage (`Backend`).
    pub usage: Option<String>,
    /// Excluded primary usages.
    pub not_usage: Vec<String>,
}

/// REST implementation of [`ConfigItemLookup`] and the wider asset
/// queries.
pub struct ConfigItemService {
    transport: Arc<dyn Transport>,
}

impl ConfigItemService {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Whether the named computer system's records report it deployed.
    ///
    /// Multiple records can exist for one host; the most common status
    /// value decides.
    pub fn computer_system_is_deployed(&self, fqdn: &str) -> Result<bool, TransportError> {
        let records = self.computer_system_records(fqdn)?;
        let statuses = records
            .iter()
            .filter_map(|record| record.get("status").and_then(Value::as_str))
            .map(ToString::to_string);
        Ok(most_common(statuses).is_some_and(|status| status == "Deployed"))
    }

    /// The company owning a computer system, selected as the most common
    /// company across its domain relationships.
    pub fn computer_system_company(&self, fqdn: &str) -> Result<Option<String>, TransportError> {
        let relationships = self.computer_system_domains(fqdn)?;
        let companies = relationships
            .iter()
            .filter_map(|rel| {
                rel.get("source")
                    .and_then(|source| source.get("company"))
                    .and_then(Value::as_str)
            })
            .map(ToString::to_string);
        Ok(most_common(companies))
    }

    /// The client mnemonic for a computer system: the company with the
    /// `-site` suffix stripped (`ABC_DE-1234` becomes `ABC_DE`).
    pub fn computer_system_mnemonic(&self, fqdn: &str) -> Result<Option<String>, TransportError> {
        Ok(self.computer_system_company(fqdn)?.map(|company| {
            company
                .split('-')
                .next()
                .unwrap_or(company.as_str())
                .to_string()
        }))
    }

    /// The most common destination site across a domain's relationships.
    pub fn domain_site(
        &self,
        company: &str,
        domain: &str,
    ) -> Result<Option<String>, TransportError> {
        let params = vec![
            param("relationship.markAsDeleted", "No"),
            param("source.classId", DOMAIN_CLASS),
            param("source.company", company),
            param("source.name", domain),
            param("destination.hostNameExists", "true"),
        ];
        let relationships = self.relationships(&params)?;

        let sites = relationships
            .iter()
            .filter_map(|rel| {
                rel.get("destination")
                    .and_then(|destination| destination.get("site"))
                    .and_then(Value::as_str)
            })
            .map(ToString::to_string);
        Ok(most_common(sites))
    }

    /// Whether any system in the domain carries the given primary usage.
    pub fn domain_has_usage(
        &self,
        company: &str,
        domain: &str,
        usage: &str,
    ) -> Result<bool, TransportError> {
        let params = vec![
            param("relationship.markAsDeleted", "No"),
            param("source.name", domain),
            param("source.company", company),
            param("destination.primaryUsageLike", usage),
        ];
        Ok(!self.relationships(&params)?.is_empty())
    }

    /// Computer systems related to a company's domains, optionally
    /// filtered. Returns the destination (system) record of each
    /// relationship.
    pub fn computer_systems(
        &self,
        company: &str,
        filters: &SystemFilters,
    ) -> Result<Vec<Value>, TransportError> {
        let mut params = vec![
            param("relationship.markAsDeleted", "No"),
            param("source.classId", DOMAIN_CLASS),
            param("source.company", company),
            param("destination.hostNameExists", "true"),
        ];

        if let Some(domain) = &filters.domain {
            params.push(param("source.name", domain));
        }
        if let Some(os) = &filters.os {
            params.push(param("destination.operatingSystemLike", os));
        }
        if let Some(fqdn) = &filters.fqdn {
            params.push(param("destination.hostNameLike", fqdn));
        }
        if let Some(usage) = &filters.usage {
            params.push(param("destination.primaryUsageLike", usage));
        }
        if !filters.not_usage.is_empty() {
            params.push(param(
                "destination.primaryUsageNotIn",
                &filters.not_usage.join("|"),
            ));
        }

        let relationships = self.relationships(&params)?;
        Ok(relationships
            .into_iter()
            .filter_map(|mut rel| rel.get_mut("destination").map(Value::take))
            .collect())
    }

    /// Asset records for a host, trying `hostName` then `name`.
    fn computer_system_records(&self, fqdn: &str) -> Result<Vec<Value>, TransportError> {
        for field in ["hostName", "name"] {
            let params = vec![
                param("classId", COMPUTER_SYSTEM_CLASS),
                param("markAsDeleted", "No"),
                param(field, fqdn),
            ];
            let records = self.assets(&params)?;
            if !records.is_empty() {
                return Ok(records);
            }
        }
        Ok(Vec::new())
    }

    /// Domain relationships for a computer system, trying `hostName`
    /// then `name` on the destination side.
    fn computer_system_domains(&self, fqdn: &str) -> Result<Vec<Value>, TransportError> {
        for field in ["hostName", "name"] {
            let params = vec![
                param("relationship.markAsDeleted", "No"),
                param("source.classId", DOMAIN_CLASS),
                param(&format!("destination.{field}"), fqdn),
            ];
            let relationships = self.relationships(&params)?;
            if !relationships.is_empty() {
                return Ok(relationships);
            }
        }
        Ok(Vec::new())
    }

    fn assets(&self, params: &[(String, String)]) -> Result<Vec<Value>, TransportError> {
        self.get_items(&format!("{QUERY_PATH}/assets"), params)
    }

    fn relationships(&self, params: &[(String, String)]) -> Result<Vec<Value>, TransportError> {
        self.get_items(&format!("{QUERY_PATH}/assets/-/relationships"), params)
    }

    fn get_items(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Value>, TransportError> {
        let borrowed: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        match self.transport.get(path, &borrowed) {
            Ok(body) => Ok(items(body)),
            Err(TransportError::Status { code: 404, .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

impl ConfigItemLookup for ConfigItemService {
    fn business_service(
        &self,
        company: &str,
        name_matcher: &str,
    ) -> Result<Option<ConfigItemRef>, TransportError> {
        let params = vec![
            param("classId", BUSINESS_SERVICE_CLASS),
            param("markAsDeleted", "No"),
            param("company", company),
            param("nameLike", name_matcher),
        ];
        Ok(self.assets(&params)?.first().and_then(item_ref))
    }

    fn computer_system_by_system_id(
        &self,
        system_id: &str,
    ) -> Result<Option<ConfigItemRef>, TransportError> {
        let records = self.computer_system_records(system_id)?;
        Ok(records.first().and_then(item_ref))
    }

    fn link_instance(&self, change_id: &str, instance_id: &str) -> Result<(), TransportError> {
        let path = format!("{MODIFY_PATH}/changes/{change_id}/relationships");
        let body = serde_json::json!({ "instanceId": instance_id });
        self.transport.post(&path, &body)?;
        Ok(())
    }
}

fn param(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Normalize a query response into its record list: either a bare JSON
/// array or a paged object with a `content` array.
fn items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.get_mut("content") {
            Some(Value::Array(records)) => std::mem::take(records),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn item_ref(record: &Value) -> Option<ConfigItemRef> {
    let instance_id = record.get("instanceId")?.as_str()?.to_string();
    Some(ConfigItemRef {
        instance_id,
        name: record
            .get("name")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    })
}

/// The most frequent value, ties broken by first occurrence.
fn most_common(values: impl IntoIterator<Item = String>) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (value, count) in counts {
        match &best {
            Some((_, top)) if count <= *top => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::{ConfigItemService, SystemFilters, most_common};
    use crate::transport::Transport;
    use crq_core::{ConfigItemLookup, TransportError};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    /// Replays canned GET responses in order and records every request.
    #[derive(Default)]
    struct FakeTransport {
        gets: Mutex<Vec<(String, Vec<(String, String)>)>>,
        responses: Mutex<Vec<Value>>,
        posts: Mutex<Vec<(String, Value)>>,
    }

    impl FakeTransport {
        fn respond_with(responses: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                ..Self::default()
            })
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
            self.gets.lock().expect("lock").push((
                path.to_string(),
                params
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ));
            let mut responses = self.responses.lock().expect("lock");
            if responses.is_empty() {
                Ok(json!([]))
            } else {
                Ok(responses.remove(0))
            }
        }

        fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
            self.posts
                .lock()
                .expect("lock")
                .push((path.to_string(), body.clone()));
            Ok(Value::Null)
        }

        fn put(&self, _path: &str, _body: &Value) -> Result<Value, TransportError> {
            Ok(Value::Null)
        }

        fn delete(&self, _path: &str) -> Result<Value, TransportError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn most_common_breaks_ties_by_first_occurrence() {
        let values = ["b", "a", "a", "b", "c"].map(ToString::to_string);
        assert_eq!(most_common(values), Some("b".to_string()));

        assert_eq!(most_common(Vec::new()), None);
    }

    #[test]
    fn business_service_takes_the_first_record() {
        let transport = FakeTransport::respond_with(vec![json!([
            { "instanceId": "OI-1", "name": "ABC_DE_CORE_SERVICES" },
            { "instanceId": "OI-2", "name": "ABC_DE_CORE_SERVICES_OLD" },
        ])]);
        let service = ConfigItemService::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let found = service
            .business_service("ABC_DE", "_CORE_SERVICES")
            .expect("lookup")
            .expect("present");
        assert_eq!(found.instance_id, "OI-1");
        assert_eq!(found.name.as_deref(), Some("ABC_DE_CORE_SERVICES"));

        let gets = transport.gets.lock().expect("lock");
        assert_eq!(gets[0].0, "asset-query-svc/v1/assets");
        assert!(gets[0].1.contains(&("company".to_string(), "ABC_DE".to_string())));
    }

    #[test]
    fn computer_system_lookup_falls_back_to_name() {
        // First query (hostName) comes back empty; second (name) hits.
        let transport = FakeTransport::respond_with(vec![
            json!([]),
            json!([{ "instanceId": "OI-9", "name": "abcdeapp1" }]),
        ]);
        let service = ConfigItemService::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let found = service
            .computer_system_by_system_id("abcdeapp1")
            .expect("lookup")
            .expect("present");
        assert_eq!(found.instance_id, "OI-9");

        let gets = transport.gets.lock().expect("lock");
        assert!(gets[0].1.contains(&("hostName".to_string(), "abcdeapp1".to_string())));
        assert!(gets[1].1.contains(&("name".to_string(), "abcdeapp1".to_string())));
    }

    #[test]
    fn company_selection_takes_the_mode() {
        let transport = FakeTransport::respond_with(vec![json!([
            { "source": { "company": "ABC_DE-1" } },
            { "source": { "company": "XYZ_99-2" } },
            { "source": { "company": "ABC_DE-1" } },
            { "source": {} },
        ])]);
        let service = ConfigItemService::new(transport as Arc<dyn Transport>);

        let company = service
            .computer_system_company("abcdeapp1.example.com")
            .expect("lookup");
        assert_eq!(company.as_deref(), Some("ABC_DE-1"));
    }

    #[test]
    fn mnemonic_strips_the_site_suffix() {
        let transport = FakeTransport::respond_with(vec![json!([
            { "source": { "company": "ABC_DE-1234" } },
        ])]);
        let service = ConfigItemService::new(transport as Arc<dyn Transport>);

        let mnemonic = service
            .computer_system_mnemonic("abcdeapp1.example.com")
            .expect("lookup");
        assert_eq!(mnemonic.as_deref(), Some("ABC_DE"));
    }

    #[test]
    fn system_filters_become_query_params() {
        let transport = FakeTransport::respond_with(vec![json!([])]);
        let service = ConfigItemService::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let filters = SystemFilters {
            domain: Some("p123".to_string()),
            os: Some("linux".to_string()),
            not_usage: vec!["Frontend".to_string(), "Lab".to_string()],
            ..SystemFilters::default()
        };
        service
            .computer_systems("ABC_DE", &filters)
            .expect("query");

        let gets = transport.gets.lock().expect("lock");
        let params = &gets[0].1;
        assert!(params.contains(&("source.name".to_string(), "p123".to_string())));
        assert!(params.contains(&(
            "destination.operatingSystemLike".to_string(),
            "linux".to_string()
        )));
        assert!(params.contains(&(
            "destination.primaryUsageNotIn".to_string(),
            "Frontend|Lab".to_string()
        )));
    }

    #[test]
    fn computer_systems_returns_destination_records() {
        let transport = FakeTransport::respond_with(vec![json!([
            { "source": { "name": "p123" }, "destination": { "hostName": "a.example.com" } },
            { "source": { "name": "p123" }, "destination": { "hostName": "b.example.com" } },
        ])]);
        let service = ConfigItemService::new(transport as Arc<dyn Transport>);

        let systems = service
            .computer_systems("ABC_DE", &SystemFilters::default())
            .expect("query");
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0].get("hostName"), Some(&json!("a.example.com")));
    }

    #[test]
    fn deployment_check_uses_the_most_common_status() {
        let transport = FakeTransport::respond_with(vec![json!([
            { "status": "Deployed" },
            { "status": "End of Life" },
            { "status": "Deployed" },
        ])]);
        let service = ConfigItemService::new(transport as Arc<dyn Transport>);

        assert!(service
            .computer_system_is_deployed("abcdeapp1.example.com")
            .expect("lookup"));
    }

    #[test]
    fn link_posts_the_instance_id() {
        let transport = Arc::new(FakeTransport::default());
        let service = ConfigItemService::new(Arc::clone(&transport) as Arc<dyn Transport>);

        service
            .link_instance("CRQ000000001234", "OI-1")
            .expect("link");

        let posts = transport.posts.lock().expect("lock");
        assert_eq!(
            posts[0].0,
            "asset-svc/v1/changes/CRQ000000001234/relationships"
        );
        assert_eq!(posts[0].1, json!({ "instanceId": "OI-1" }));
    }

    #[test]
    fn paged_content_objects_also_decode() {
        let transport = FakeTransport::respond_with(vec![json!({
            "content": [{ "instanceId": "OI-3" }],
            "totalPages": 1,
        })]);
        let service = ConfigItemService::new(transport as Arc<dyn Transport>);

        let found = service
            .business_service("ABC_DE", "_CORE_SERVICES")
            .expect("lookup");
        assert_eq!(found.expect("present").instance_id, "OI-3");
    }
}
