//! Client configuration.

use std::env;
use std::time::Duration;

use crq_core::TransportError;
use crq_core::remote::DEFAULT_BUSINESS_SERVICE_MATCHER;

/// Support-group prefixes tried, in order, when populating manager and
/// coordinator groups on create.
pub const DEFAULT_GROUP_PREFIXES: &[&str] = &["clientops_", "ehosting_", "cwx_"];

/// Connection and behavior settings for [`crate::CrqClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway base URL, no trailing slash (`https://api.example.com:8243`).
    pub base_url: String,
    /// Consumer key for the subscribed application.
    pub key: String,
    /// Consumer secret for the subscribed application.
    pub secret: String,
    /// Optional user web token; when set, tokens are requested with the
    /// JWT-bearer assertion grant instead of client credentials.
    pub user_web_token: Option<String>,
    /// Times a failed transport-level request is retried.
    pub retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Support-group prefixes used to pick manager/coordinator groups.
    pub group_prefixes: Vec<String>,
    /// Name matcher for business-service resolution.
    pub business_service_matcher: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            key: String::new(),
            secret: String::new(),
            user_web_token: None,
            retries: 3,
            timeout: Duration::from_secs(600),
            group_prefixes: DEFAULT_GROUP_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            business_service_matcher: DEFAULT_BUSINESS_SERVICE_MATCHER.to_string(),
        }
    }
}

impl ClientConfig {
    /// A config pointing at `base_url` with the given credentials.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Read the connection settings from the environment.
    ///
    /// `CRQ_BASE_URL`, `CRQ_KEY`, and `CRQ_SECRET` are required;
    /// `CRQ_USER_WEB_TOKEN` is optional.
    pub fn from_env() -> Result<Self, TransportError> {
        let required = |name: &str| {
            env::var(name).map_err(|_| {
                TransportError::Config(format!("{name} environment variable must be set"))
            })
        };

        let mut config = Self::new(required("CRQ_BASE_URL")?, required("CRQ_KEY")?, required("CRQ_SECRET")?);
        config.user_web_token = env::var("CRQ_USER_WEB_TOKEN").ok().filter(|t| !t.is_empty());
        Ok(config)
    }

    /// Override the user web token.
    #[must_use]
    pub fn with_user_web_token(mut self, token: impl Into<String>) -> Self {
        self.user_web_token = Some(token.into());
        self
    }

    /// Override the retry count.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;

    #[test]
    fn defaults_cover_retries_prefixes_and_matcher() {
        let config = ClientConfig::default();
        assert_eq!(config.retries, 3);
        assert_eq!(config.timeout.as_secs(), 600);
        assert_eq!(config.group_prefixes[0], "clientops_");
        assert_eq!(config.business_service_matcher, "_CORE_SERVICES");
    }

    #[test]
    fn new_strips_trailing_slashes() {
        let config = ClientConfig::new("https://api.example.com:8243/", "key", "secret");
        assert_eq!(config.base_url, "https://api.example.com:8243");
    }
}
