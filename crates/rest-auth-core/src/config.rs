//! Provider configuration
//!
//! The host hands the provider its configuration block as a YAML tree. Only
//! three keys are mandatory; every policy switch has a default and falls back
//! to it silently when the path is absent or not shaped as expected.
//!
//! ```yaml
//! endpoint: "https://idp.example"
//! loginuri: "/check"
//! rest:
//!   user_id: "uid"
//!   password: "pwd"
//!   email: "mail"
//! attributes:
//!   display_name: "name"
//!   email: "mail"
//! policy:
//!   registration:
//!     username:
//!       enforceLowercase: true
//!     profile:
//!       name: true
//!   login:
//!     profile:
//!       name: false
//!   all:
//!     threepid:
//!       update: true
//!       replace: false
//! ```
//!
//! # Example
//!
//! ```rust
//! use rest_auth_core::RestAuthConfig;
//!
//! let config = RestAuthConfig::from_yaml_str(r#"
//! endpoint: "https://idp.example"
//! loginuri: "/check"
//! rest: { user_id: "uid", password: "pwd" }
//! attributes: { display_name: "name", email: "mail" }
//! "#).unwrap();
//!
//! assert_eq!(config.login_url.as_str(), "https://idp.example/check");
//! assert!(config.enforce_lowercase_on_register);
//! assert!(!config.set_name_on_login);
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;
use url::Url;

use crate::error::{RestAuthError, Result};

const REQUIRED_KEYS: [&str; 3] = ["endpoint", "rest", "attributes"];

pub const DEFAULT_ENFORCE_LOWERCASE: bool = true;
pub const DEFAULT_SET_NAME_ON_REGISTER: bool = true;
pub const DEFAULT_SET_NAME_ON_LOGIN: bool = false;
pub const DEFAULT_UPDATE_THREEPID: bool = true;
pub const DEFAULT_REPLACE_THREEPID: bool = false;

/// Maps logical field names to the names the identity service uses in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(HashMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias, builder style
    pub fn with(mut self, logical: impl Into<String>, external: impl Into<String>) -> Self {
        self.0.insert(logical.into(), external.into());
        self
    }

    /// The configured alias, if any.
    pub fn get(&self, logical: &str) -> Option<&str> {
        self.0.get(logical).map(String::as_str)
    }

    /// The external name for `logical`. A field without an alias keeps its
    /// logical name.
    pub fn name<'a>(&'a self, logical: &'a str) -> &'a str {
        self.get(logical).unwrap_or(logical)
    }

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        let mapping = value.as_mapping().ok_or_else(|| {
            RestAuthError::InvalidConfig(format!("`{}` must be a mapping", key))
        })?;

        mapping
            .iter()
            .map(|(logical, external)| match (logical.as_str(), external.as_str()) {
                (Some(logical), Some(external)) => Ok((logical.to_string(), external.to_string())),
                _ => Err(RestAuthError::InvalidConfig(format!(
                    "`{}` must map field names to strings",
                    key
                ))),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Immutable policy built once at provider startup.
#[derive(Debug, Clone, Serialize)]
pub struct RestAuthConfig {
    /// Base address of the identity service
    pub endpoint: String,
    /// Path appended to `endpoint` for the credential check
    pub login_path: String,
    /// `endpoint + login_path`, validated
    pub login_url: Url,
    /// Aliases for `user_id`, `password` and `email` in request/response bodies
    pub rest_fields: FieldMap,
    /// Aliases for `display_name` and `email` profile attributes
    pub attributes: FieldMap,
    pub enforce_lowercase_on_register: bool,
    pub set_name_on_register: bool,
    pub set_name_on_login: bool,
    /// Reserved, parsed but not consulted
    pub update_threepid: bool,
    /// Reserved, parsed but not consulted
    pub replace_threepid: bool,
}

impl RestAuthConfig {
    /// Create a configuration with default policy.
    pub fn new(
        endpoint: impl Into<String>,
        login_path: impl Into<String>,
        rest_fields: FieldMap,
        attributes: FieldMap,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let login_path = login_path.into();
        let login_url = build_login_url(&endpoint, &login_path)?;

        Ok(Self {
            endpoint,
            login_path,
            login_url,
            rest_fields,
            attributes,
            enforce_lowercase_on_register: DEFAULT_ENFORCE_LOWERCASE,
            set_name_on_register: DEFAULT_SET_NAME_ON_REGISTER,
            set_name_on_login: DEFAULT_SET_NAME_ON_LOGIN,
            update_threepid: DEFAULT_UPDATE_THREEPID,
            replace_threepid: DEFAULT_REPLACE_THREEPID,
        })
    }

    /// Validate and normalize a raw configuration tree.
    ///
    /// Fails only when a required key is missing or has the wrong shape.
    /// Policy paths never fail parsing.
    pub fn parse(raw: &Value) -> Result<Self> {
        if !raw.is_mapping() {
            return Err(RestAuthError::InvalidConfig(
                "configuration must be a mapping".to_string(),
            ));
        }

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| raw.get(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RestAuthError::MissingConfig(missing));
        }

        let endpoint = raw
            .get("endpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| RestAuthError::InvalidConfig("`endpoint` must be a string".to_string()))?;
        if endpoint.is_empty() {
            return Err(RestAuthError::MissingConfig(vec!["endpoint".to_string()]));
        }

        let login_path = ["loginuri", "loginPath"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_str))
            .unwrap_or_default();

        let rest_fields = FieldMap::from_value("rest", &raw["rest"])?;
        let attributes = FieldMap::from_value("attributes", &raw["attributes"])?;

        let mut config = Self::new(endpoint, login_path, rest_fields, attributes)?;
        config.enforce_lowercase_on_register = policy_flag(
            raw,
            &["policy", "registration", "username", "enforceLowercase"],
            DEFAULT_ENFORCE_LOWERCASE,
        );
        config.set_name_on_register = policy_flag(
            raw,
            &["policy", "registration", "profile", "name"],
            DEFAULT_SET_NAME_ON_REGISTER,
        );
        config.set_name_on_login = policy_flag(
            raw,
            &["policy", "login", "profile", "name"],
            DEFAULT_SET_NAME_ON_LOGIN,
        );
        config.update_threepid = policy_flag(
            raw,
            &["policy", "all", "threepid", "update"],
            DEFAULT_UPDATE_THREEPID,
        );
        config.replace_threepid = policy_flag(
            raw,
            &["policy", "all", "threepid", "replace"],
            DEFAULT_REPLACE_THREEPID,
        );

        Ok(config)
    }

    /// Parse the block stored under `key` of a larger configuration tree.
    pub fn from_section(raw: &Value, key: &str) -> Result<Self> {
        let section = raw
            .get(key)
            .ok_or_else(|| RestAuthError::MissingConfig(vec![key.to_string()]))?;
        Self::parse(section)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(yaml)?;
        Self::parse(&raw)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
}

fn build_login_url(endpoint: &str, login_path: &str) -> Result<Url> {
    let joined = format!("{}{}", endpoint, login_path);
    Url::parse(&joined)
        .map_err(|e| RestAuthError::InvalidConfig(format!("invalid login URL `{}`: {}", joined, e)))
}

/// Walk `path` from the root; anything other than a boolean at the end of a
/// chain of mappings yields `default`.
fn policy_flag(raw: &Value, path: &[&str], default: bool) -> bool {
    path.iter()
        .try_fold(raw, |node, key| node.get(*key))
        .and_then(Value::as_bool)
        .unwrap_or(default)
}
