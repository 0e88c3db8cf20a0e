//! Blocking REST transport with bearer-token authentication.
//!
//! One [`RestTransport`] is shared by every service client. Tokens are
//! fetched lazily from `<base>/token`, cached until expiry, and renewed
//! with the refresh-token grant when the gateway issued one. Transport
//! failures and 5xx responses are retried up to the configured count;
//! 4xx responses are not.

use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use crq_core::TransportError;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::token::{self, Token};

/// Abstract HTTP seam consumed by the service clients.
///
/// Paths are relative to the gateway base URL and include the service
/// prefix (`change-svc/v2/changes/`). Lookup-style callers translate
/// 404 responses themselves; everything else is an error.
pub trait Transport: Send + Sync {
    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError>;
    fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError>;
    fn put(&self, path: &str, body: &Value) -> Result<Value, TransportError>;
    fn delete(&self, path: &str) -> Result<Value, TransportError>;
}

/// The production transport over a blocking `ureq` agent.
pub struct RestTransport {
    agent: ureq::Agent,
    config: ClientConfig,
    token: Mutex<Option<Token>>,
}

impl RestTransport {
    /// Build a transport from connection settings.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .build();
        Self {
            agent,
            config,
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// The `Authorization` header for the current request, fetching or
    /// renewing the cached token first when needed.
    fn authorization(&self) -> Result<String, TransportError> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| TransportError::Config("token cache poisoned".to_string()))?;

        let now = Utc::now();
        if let Some(cached) = slot.as_ref() {
            if cached.is_valid(now) {
                return Ok(cached.authorization_header());
            }
        }

        let refresh = slot
            .as_ref()
            .and_then(|cached| cached.refresh_token.clone());
        let fresh = match refresh {
            Some(refresh_token) => self
                .fetch_token(&token::refresh_params(&refresh_token))
                .or_else(|err| {
                    tracing::warn!(error = %err, "token refresh failed, requesting a new token");
                    self.fetch_token(&token::grant_params(self.config.user_web_token.as_deref()))
                })?,
            None => {
                self.fetch_token(&token::grant_params(self.config.user_web_token.as_deref()))?
            }
        };

        let header = fresh.authorization_header();
        *slot = Some(fresh);
        Ok(header)
    }

    fn fetch_token(&self, params: &[(&'static str, String)]) -> Result<Token, TransportError> {
        let path = "token";
        let url = self.url(path);
        let basic = BASE64.encode(format!("{}:{}", self.config.key, self.config.secret));

        let form: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Basic {basic}"))
            .send_form(&form)
            .map_err(|err| classify(path, err))?;

        let mut fetched: Token = response.into_json().map_err(|err| TransportError::Decode {
            path: path.to_string(),
            detail: err.to_string(),
        })?;
        fetched.stamp_expiry(Utc::now());
        Ok(fetched)
    }

    /// Run `request` with bounded retry on retryable failures.
    fn with_retries<F>(&self, path: &str, request: F) -> Result<Value, TransportError>
    where
        F: Fn(&str) -> Result<Value, TransportError>,
    {
        let mut attempt = 0;
        loop {
            let auth = self.authorization()?;
            match request(&auth) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    tracing::warn!(
                        path = %path,
                        attempt,
                        error = %err,
                        "request failed, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Transport for RestTransport {
    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        let url = self.url(path);
        self.with_retries(path, |auth| {
            let mut request = self
                .agent
                .get(&url)
                .set("Accept", "application/json")
                .set("Authorization", auth);
            for &(key, value) in params {
                request = request.query(key, value);
            }
            decode(path, request.call())
        })
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(path);
        self.with_retries(path, |auth| {
            let request = self
                .agent
                .post(&url)
                .set("Accept", "application/json")
                .set("Authorization", auth);
            decode(path, request.send_json(body.clone()))
        })
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(path);
        self.with_retries(path, |auth| {
            let request = self
                .agent
                .put(&url)
                .set("Accept", "application/json")
                .set("Authorization", auth);
            decode(path, request.send_json(body.clone()))
        })
    }

    fn delete(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        self.with_retries(path, |auth| {
            let request = self
                .agent
                .delete(&url)
                .set("Accept", "application/json")
                .set("Authorization", auth);
            decode(path, request.call())
        })
    }
}

/// Decode a response body, tolerating empty bodies from mutating calls.
fn decode(
    path: &str,
    result: Result<ureq::Response, ureq::Error>,
) -> Result<Value, TransportError> {
    let response = result.map_err(|err| classify(path, err))?;
    let text = response
        .into_string()
        .map_err(|err| TransportError::Decode {
            path: path.to_string(),
            detail: err.to_string(),
        })?;

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|err| TransportError::Decode {
        path: path.to_string(),
        detail: err.to_string(),
    })
}

fn classify(path: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(code, response) => {
            let mut body = response.into_string().unwrap_or_default();
            body.truncate(512);
            TransportError::Status {
                code,
                path: path.to_string(),
                body,
            }
        }
        ureq::Error::Transport(transport) => TransportError::Network {
            path: path.to_string(),
            detail: transport.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::RestTransport;
    use crate::config::ClientConfig;

    #[test]
    fn urls_join_without_duplicate_slashes() {
        let transport = RestTransport::new(ClientConfig::new(
            "https://api.example.com:8243/",
            "key",
            "secret",
        ));
        assert_eq!(
            transport.url("/change-svc/v2/changes/"),
            "https://api.example.com:8243/change-svc/v2/changes/"
        );
        assert_eq!(
            transport.url("token"),
            "https://api.example.com:8243/token"
        );
    }
}
