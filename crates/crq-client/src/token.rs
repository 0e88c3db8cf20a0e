//! OAuth2 bearer tokens for the REST transport.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// A bearer token issued by the gateway's `/token` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    #[serde(rename = "access_token")]
    pub value: String,
    #[serde(rename = "expires_in")]
    pub expires_in: i64,
    #[serde(rename = "token_type")]
    pub token_type: String,
    #[serde(rename = "refresh_token", default)]
    pub refresh_token: Option<String>,
    #[serde(skip, default = "Utc::now")]
    pub expire_time: DateTime<Utc>,
}

impl Token {
    /// Stamp the expiry from `expires_in`, relative to `now`.
    pub fn stamp_expiry(&mut self, now: DateTime<Utc>) {
        self.expire_time = now + Duration::seconds(self.expires_in);
    }

    /// Whether the token is still usable at `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expire_time
    }

    /// The `Authorization` header value for this token.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }
}

/// Form parameters for the initial token grant.
///
/// With a user web token configured the gateway expects the JWT-bearer
/// assertion grant; otherwise plain client credentials.
#[must_use]
pub fn grant_params(user_web_token: Option<&str>) -> Vec<(&'static str, String)> {
    user_web_token.map_or_else(
        || {
            vec![
                ("grant_type", "client_credentials".to_string()),
                ("scope", "am_application_scope,default".to_string()),
            ]
        },
        |assertion| {
            vec![
                (
                    "grant_type",
                    "urn:ietf:params:oauth:grant-type:jwt-bearer".to_string(),
                ),
                ("assertion", assertion.to_string()),
            ]
        },
    )
}

/// Form parameters for the refresh-token grant.
#[must_use]
pub fn refresh_params(refresh_token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
    ]
}
