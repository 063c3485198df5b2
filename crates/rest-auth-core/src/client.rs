//! Identity service client

use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

/// What the identity service said about a set of credentials.
#[derive(Debug, Clone)]
pub enum CredentialCheck {
    /// 2xx with a JSON object body
    Accepted(Map<String, Value>),
    /// Any other non-5xx status
    Declined(StatusCode),
    /// Transport failure, 5xx, or a success body that is not a JSON object
    Unavailable(String),
}

/// Posts credentials to `{endpoint}{loginPath}`.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: Client,
    login_url: Url,
}

impl IdentityClient {
    pub fn new(login_url: Url) -> Self {
        Self::with_client(Client::new(), login_url)
    }

    pub fn with_client(http: Client, login_url: Url) -> Self {
        Self { http, login_url }
    }

    pub async fn check_credentials(&self, body: &Map<String, Value>) -> CredentialCheck {
        let response = match self.http.post(self.login_url.clone()).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Identity service request to {} failed: {}", self.login_url, e);
                return CredentialCheck::Unavailable(e.to_string());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            warn!("Identity service returned {}", status);
            return CredentialCheck::Unavailable(format!("identity service returned {}", status));
        }
        if !status.is_success() {
            debug!("Identity service declined credentials with {}", status);
            return CredentialCheck::Declined(status);
        }

        match response.json::<Value>().await {
            Ok(Value::Object(profile)) => CredentialCheck::Accepted(profile),
            Ok(_) => {
                warn!("Identity service response is not a JSON object");
                CredentialCheck::Unavailable("response body is not a JSON object".to_string())
            }
            Err(e) => {
                warn!("Failed to decode identity service response: {}", e);
                CredentialCheck::Unavailable(format!("invalid response body: {}", e))
            }
        }
    }
}
