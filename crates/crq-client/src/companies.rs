//! Company queries over the paginated company API.

use std::sync::Arc;

use crq_core::TransportError;
use serde_json::{Map, Value};

use crate::transport::Transport;

const QUERY_PATH: &str = "company-query-svc/v1";
const PAGE_SIZE: &str = "1000";

/// A company record, kept as the raw response object.
#[derive(Debug, Clone, PartialEq)]
pub struct Company(pub Map<String, Value>);

impl Company {
    /// The company name, when present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// The client mnemonic, when present.
    #[must_use]
    pub fn mnemonic(&self) -> Option<&str> {
        self.0.get("mnemonic").and_then(Value::as_str)
    }
}

/// REST client for the company query service.
pub struct CompanyService {
    transport: Arc<dyn Transport>,
}

impl CompanyService {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Active client companies, optionally restricted to `mnemonics` and
    /// post-filtered by substring matches on response fields.
    ///
    /// The company API pages at a fixed size; every page up to the
    /// reported `totalPages` is fetched and filtered before the next
    /// request.
    pub fn client_companies(
        &self,
        mnemonics: &[&str],
        filters: &[(&str, &str)],
    ) -> Result<Vec<Company>, TransportError> {
        let path = format!("{QUERY_PATH}/companies");
        let mnemonic_in = mnemonics.join("|");

        let mut companies = Vec::new();
        let mut page = 0_u64;
        let mut total_pages = 1_u64;

        while page < total_pages {
            let page_text = page.to_string();
            let mut params = vec![
                ("companyTypeIn", "Customer"),
                ("statusIn", "1"),
                ("size", PAGE_SIZE),
                ("page", page_text.as_str()),
            ];
            if !mnemonic_in.is_empty() {
                params.push(("mnemonicIn", mnemonic_in.as_str()));
            }

            let body = self.transport.get(&path, &params)?;
            total_pages = body
                .get("totalPages")
                .and_then(Value::as_u64)
                .unwrap_or(1);

            let content = match body.get("content") {
                Some(Value::Array(records)) => records.clone(),
                _ => Vec::new(),
            };
            companies.extend(
                content
                    .into_iter()
                    .filter_map(|record| match record {
                        Value::Object(map) => Some(Company(map)),
                        _ => None,
                    })
                    .filter(|company| matches_filters(company, filters)),
            );

            page += 1;
        }

        Ok(companies)
    }
}

/// Substring filter: every filter field must exist and contain the
/// filter value.
fn matches_filters(company: &Company, filters: &[(&str, &str)]) -> bool {
    filters.iter().all(|(field, needle)| {
        company
            .0
            .get(*field)
            .and_then(Value::as_str)
            .is_some_and(|text| text.contains(needle))
    })
}
