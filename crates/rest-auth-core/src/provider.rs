//! The authentication delegate
//!
//! [`RestAuthProvider`] checks credentials against the identity service and,
//! when they are accepted, makes sure a matching local account exists. The
//! order of host calls is fixed: existence check, then (if needed) policy
//! check and registration, then display-name sync, then 3PID sync.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::{CredentialCheck, IdentityClient};
use crate::config::RestAuthConfig;
use crate::error::Result;
use crate::host::{AccountHandler, EMAIL_MEDIUM};
use crate::types::{localpart, AuthOutcome, RejectReason};

pub struct RestAuthProvider {
    config: RestAuthConfig,
    account_handler: Arc<dyn AccountHandler>,
    client: IdentityClient,
}

impl RestAuthProvider {
    pub fn new(config: RestAuthConfig, account_handler: Arc<dyn AccountHandler>) -> Self {
        info!("Endpoint: {}", config.endpoint);
        info!(
            "Enforce lowercase username during registration: {}",
            config.enforce_lowercase_on_register
        );
        debug!(
            "Profile name sync on register: {}, on login: {}; threepid update: {}, replace: {}",
            config.set_name_on_register,
            config.set_name_on_login,
            config.update_threepid,
            config.replace_threepid
        );

        let client = IdentityClient::new(config.login_url.clone());
        Self {
            config,
            account_handler,
            client,
        }
    }

    /// Use a preconfigured HTTP client, e.g. one with timeouts.
    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.client = IdentityClient::with_client(http, self.config.login_url.clone());
        self
    }

    /// Validate a raw configuration block.
    pub fn parse_config(raw: &serde_yaml::Value) -> Result<RestAuthConfig> {
        RestAuthConfig::parse(raw)
    }

    pub fn config(&self) -> &RestAuthConfig {
        &self.config
    }

    /// Password login. `Ok(false)` for rejected credentials or a blocked
    /// registration, `Err` when the identity service is unavailable.
    pub async fn check_password(&self, user_id: &str, password: &str) -> Result<bool> {
        self.authenticate_password(user_id, password)
            .await?
            .into_decision()
    }

    /// Third-party login. `Ok(None)` for any medium other than email, so the
    /// host can try other providers.
    pub async fn check_3pid_auth(
        &self,
        medium: &str,
        address: &str,
        password: &str,
    ) -> Result<Option<bool>> {
        match self.authenticate_3pid(medium, address, password).await? {
            Some(outcome) => outcome.into_decision().map(Some),
            None => Ok(None),
        }
    }

    pub async fn authenticate_password(&self, user_id: &str, password: &str) -> Result<AuthOutcome> {
        info!("Got password check for {}", user_id);

        let rest = &self.config.rest_fields;
        let mut body = Map::new();
        body.insert(rest.name("user_id").to_string(), Value::from(user_id));
        body.insert(rest.name("password").to_string(), Value::from(password));

        let profile = match self.client.check_credentials(&body).await {
            CredentialCheck::Accepted(profile) => profile,
            CredentialCheck::Declined(status) => {
                info!("User {} not authenticated", user_id);
                return Ok(AuthOutcome::Rejected {
                    reason: RejectReason::Credentials { status: status.as_u16() },
                });
            }
            CredentialCheck::Unavailable(message) => return Ok(AuthOutcome::ServiceError { message }),
        };
        info!("User {} authenticated", user_id);

        let email = self.attribute(&profile, "email");
        self.provision(user_id, localpart(user_id), &profile, email).await
    }

    pub async fn authenticate_3pid(
        &self,
        medium: &str,
        address: &str,
        password: &str,
    ) -> Result<Option<AuthOutcome>> {
        if medium != EMAIL_MEDIUM {
            debug!("Medium {} not supported, skipping", medium);
            return Ok(None);
        }
        info!("Got 3pid check for {}", address);

        let rest = &self.config.rest_fields;
        let mut body = Map::new();
        body.insert(rest.name("email").to_string(), Value::from(address));
        body.insert(rest.name("password").to_string(), Value::from(password));

        let profile = match self.client.check_credentials(&body).await {
            CredentialCheck::Accepted(profile) => profile,
            CredentialCheck::Declined(status) => {
                info!("User with {} not authenticated", address);
                return Ok(Some(AuthOutcome::Rejected {
                    reason: RejectReason::Credentials { status: status.as_u16() },
                }));
            }
            CredentialCheck::Unavailable(message) => {
                return Ok(Some(AuthOutcome::ServiceError { message }))
            }
        };

        let user_id_field = rest.name("user_id");
        let remote_id = match profile.get(user_id_field).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Ok(Some(AuthOutcome::ServiceError {
                    message: format!("response lacks user id field `{}`", user_id_field),
                }))
            }
        };
        // Accounts always live on this server, whatever domain the service reports.
        let user_id = self.account_handler.get_qualified_user_id(localpart(remote_id));
        info!("User {} authenticated by {}", user_id, address);

        self.provision(&user_id, localpart(&user_id), &profile, Some(address))
            .await
            .map(Some)
    }

    async fn provision(
        &self,
        user_id: &str,
        localpart: &str,
        profile: &Map<String, Value>,
        email: Option<&str>,
    ) -> Result<AuthOutcome> {
        let display_name = self.attribute(profile, "display_name");

        let (user_id, registered) = if self.account_handler.user_exists(user_id).await? {
            info!("User {} already exists, registration skipped", user_id);
            (user_id.to_string(), false)
        } else {
            info!("User {} does not exist yet, creating...", user_id);

            if self.config.enforce_lowercase_on_register && localpart.chars().any(char::is_uppercase) {
                info!("User {} cannot be created due to username lowercase policy", localpart);
                return Ok(AuthOutcome::Rejected {
                    reason: RejectReason::LowercasePolicy {
                        localpart: localpart.to_string(),
                    },
                });
            }

            let emails: Vec<String> = email.into_iter().map(str::to_string).collect();
            let (registered_id, _access_token) = self
                .account_handler
                .register(localpart, Some(display_name.unwrap_or(localpart)), &emails)
                .await?;
            info!("Registration based on REST data was successful for {}", registered_id);
            (registered_id, true)
        };

        if let Some(name) = display_name {
            if (registered && self.config.set_name_on_register) || self.config.set_name_on_login {
                debug!("Setting display name of {} to {}", localpart, name);
                self.account_handler.set_profile_displayname(localpart, name).await?;
            }
        }

        if registered {
            if let Some(address) = email {
                self.sync_email(&user_id, address).await?;
            }
            Ok(AuthOutcome::AuthenticatedNewlyRegistered { user_id })
        } else {
            Ok(AuthOutcome::AuthenticatedExisting { user_id })
        }
    }

    async fn sync_email(&self, user_id: &str, address: &str) -> Result<()> {
        if let Some(owner) = self
            .account_handler
            .get_user_id_by_threepid(EMAIL_MEDIUM, address)
            .await?
        {
            debug!("Email {} already bound to {}, skipping", address, owner);
            return Ok(());
        }

        let now = self.account_handler.current_time_millis();
        self.account_handler
            .add_threepid(user_id, EMAIL_MEDIUM, address, now, now)
            .await?;
        info!("Bound email {} to {}", address, user_id);
        Ok(())
    }

    /// A non-empty string attribute from the identity service response
    fn attribute<'a>(&self, profile: &'a Map<String, Value>, logical: &str) -> Option<&'a str> {
        profile
            .get(self.config.attributes.name(logical))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}
