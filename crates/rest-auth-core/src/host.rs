//! Host account capabilities
//!
//! The provider never touches the homeserver's storage directly. Everything it
//! needs from the host goes through [`AccountHandler`], injected at
//! construction time.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::{RestAuthError, Result};

pub const EMAIL_MEDIUM: &str = "email";

/// Account, profile and 3PID operations provided by the host server.
#[async_trait]
pub trait AccountHandler: Send + Sync {
    /// Whether a fully qualified user ID is already registered
    async fn user_exists(&self, user_id: &str) -> Result<bool>;

    /// Register a new account, returning `(user_id, access_token)`.
    async fn register(
        &self,
        localpart: &str,
        display_name: Option<&str>,
        emails: &[String],
    ) -> Result<(String, String)>;

    async fn set_profile_displayname(&self, localpart: &str, display_name: &str) -> Result<()>;

    /// Look up the user bound to a 3PID
    async fn get_user_id_by_threepid(&self, medium: &str, address: &str) -> Result<Option<String>>;

    async fn add_threepid(
        &self,
        user_id: &str,
        medium: &str,
        address: &str,
        created_at: i64,
        validated_at: i64,
    ) -> Result<()>;

    /// Turn a localpart into a fully qualified user ID on this server.
    fn get_qualified_user_id(&self, localpart: &str) -> String;

    fn current_time_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A bound third-party identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreepidBinding {
    pub user_id: String,
    pub created_at: i64,
    pub validated_at: i64,
}

/// In-memory host, for tests and dry runs.
pub struct MemoryAccountHandler {
    server_name: String,
    /// user_id -> access token issued at registration
    accounts: DashMap<String, String>,
    /// localpart -> display name
    profiles: DashMap<String, String>,
    /// (medium, address) -> binding
    threepids: DashMap<(String, String), ThreepidBinding>,
    next_token: AtomicU64,
}

impl MemoryAccountHandler {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            accounts: DashMap::new(),
            profiles: DashMap::new(),
            threepids: DashMap::new(),
            next_token: AtomicU64::new(1),
        }
    }

    /// Pre-populate an account, bypassing registration.
    pub fn insert_user(&self, localpart: &str) -> String {
        let user_id = self.get_qualified_user_id(localpart);
        self.accounts.insert(user_id.clone(), self.issue_token());
        user_id
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn display_name(&self, localpart: &str) -> Option<String> {
        self.profiles.get(localpart).map(|entry| entry.value().clone())
    }

    pub fn threepid(&self, medium: &str, address: &str) -> Option<ThreepidBinding> {
        self.threepids
            .get(&(medium.to_string(), address.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn threepid_count(&self) -> usize {
        self.threepids.len()
    }

    fn issue_token(&self) -> String {
        format!("syt_{:016x}", self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    fn bind(&self, user_id: &str, medium: &str, address: &str, created_at: i64, validated_at: i64) {
        self.threepids.insert(
            (medium.to_string(), address.to_string()),
            ThreepidBinding {
                user_id: user_id.to_string(),
                created_at,
                validated_at,
            },
        );
    }
}

#[async_trait]
impl AccountHandler for MemoryAccountHandler {
    async fn user_exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.accounts.contains_key(user_id))
    }

    async fn register(
        &self,
        localpart: &str,
        display_name: Option<&str>,
        emails: &[String],
    ) -> Result<(String, String)> {
        let user_id = self.get_qualified_user_id(localpart);
        if self.accounts.contains_key(&user_id) {
            return Err(RestAuthError::Host(format!("User ID already taken: {}", user_id)));
        }

        let token = self.issue_token();
        self.accounts.insert(user_id.clone(), token.clone());
        self.profiles
            .insert(localpart.to_string(), display_name.unwrap_or(localpart).to_string());

        // Registration binds the supplied emails, as a homeserver does.
        let now = self.current_time_millis();
        for email in emails {
            self.bind(&user_id, EMAIL_MEDIUM, email, now, now);
        }

        debug!("Registered {} with {} email(s)", user_id, emails.len());
        Ok((user_id, token))
    }

    async fn set_profile_displayname(&self, localpart: &str, display_name: &str) -> Result<()> {
        self.profiles.insert(localpart.to_string(), display_name.to_string());
        Ok(())
    }

    async fn get_user_id_by_threepid(&self, medium: &str, address: &str) -> Result<Option<String>> {
        Ok(self.threepid(medium, address).map(|binding| binding.user_id))
    }

    async fn add_threepid(
        &self,
        user_id: &str,
        medium: &str,
        address: &str,
        created_at: i64,
        validated_at: i64,
    ) -> Result<()> {
        if !self.accounts.contains_key(user_id) {
            return Err(RestAuthError::Host(format!("Unknown user: {}", user_id)));
        }
        self.bind(user_id, medium, address, created_at, validated_at);
        Ok(())
    }

    fn get_qualified_user_id(&self, localpart: &str) -> String {
        format!("@{}:{}", localpart, self.server_name)
    }
}
