//! Shared fixtures: a recording host and a mocked identity service
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rest_auth_core::{AccountHandler, RestAuthConfig, RestAuthError, RestAuthProvider, Result};
use serde_json::Value;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SERVER_NAME: &str = "example.org";
pub const NOW: i64 = 1_700_000_000_000;

/// Every host operation the provider performed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    UserExists(String),
    Register {
        localpart: String,
        display_name: Option<String>,
        emails: Vec<String>,
    },
    SetDisplayName {
        localpart: String,
        display_name: String,
    },
    GetThreepid {
        medium: String,
        address: String,
    },
    AddThreepid {
        user_id: String,
        medium: String,
        address: String,
        created_at: i64,
        validated_at: i64,
    },
}

/// Host that records calls. Unlike a real homeserver, registration does not
/// bind the emails it is given, so 3PID sync is observable.
#[derive(Default)]
pub struct RecordingHost {
    users: Mutex<HashSet<String>>,
    threepids: Mutex<HashMap<(String, String), String>>,
    calls: Mutex<Vec<HostCall>>,
    fail_registration: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, localpart: &str) -> Self {
        self.users.lock().insert(qualify(localpart));
        self
    }

    pub fn with_threepid(self, address: &str, owner: &str) -> Self {
        self.threepids
            .lock()
            .insert(("email".to_string(), address.to_string()), qualify(owner));
        self
    }

    pub fn failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn registrations(&self) -> usize {
        self.count(|call| matches!(call, HostCall::Register { .. }))
    }

    pub fn display_name_writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::SetDisplayName { display_name, .. } => Some(display_name),
                _ => None,
            })
            .collect()
    }

    pub fn threepid_adds(&self) -> usize {
        self.count(|call| matches!(call, HostCall::AddThreepid { .. }))
    }

    fn count(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AccountHandler for RecordingHost {
    async fn user_exists(&self, user_id: &str) -> Result<bool> {
        self.record(HostCall::UserExists(user_id.to_string()));
        Ok(self.users.lock().contains(user_id))
    }

    async fn register(
        &self,
        localpart: &str,
        display_name: Option<&str>,
        emails: &[String],
    ) -> Result<(String, String)> {
        self.record(HostCall::Register {
            localpart: localpart.to_string(),
            display_name: display_name.map(str::to_string),
            emails: emails.to_vec(),
        });
        if self.fail_registration {
            return Err(RestAuthError::Host("registration disabled".to_string()));
        }
        let user_id = qualify(localpart);
        self.users.lock().insert(user_id.clone());
        Ok((user_id, "token".to_string()))
    }

    async fn set_profile_displayname(&self, localpart: &str, display_name: &str) -> Result<()> {
        self.record(HostCall::SetDisplayName {
            localpart: localpart.to_string(),
            display_name: display_name.to_string(),
        });
        Ok(())
    }

    async fn get_user_id_by_threepid(&self, medium: &str, address: &str) -> Result<Option<String>> {
        self.record(HostCall::GetThreepid {
            medium: medium.to_string(),
            address: address.to_string(),
        });
        Ok(self
            .threepids
            .lock()
            .get(&(medium.to_string(), address.to_string()))
            .cloned())
    }

    async fn add_threepid(
        &self,
        user_id: &str,
        medium: &str,
        address: &str,
        created_at: i64,
        validated_at: i64,
    ) -> Result<()> {
        self.record(HostCall::AddThreepid {
            user_id: user_id.to_string(),
            medium: medium.to_string(),
            address: address.to_string(),
            created_at,
            validated_at,
        });
        self.threepids
            .lock()
            .insert((medium.to_string(), address.to_string()), user_id.to_string());
        Ok(())
    }

    fn get_qualified_user_id(&self, localpart: &str) -> String {
        qualify(localpart)
    }

    fn current_time_millis(&self) -> i64 {
        NOW
    }
}

pub fn qualify(localpart: &str) -> String {
    format!("@{}:{}", localpart, SERVER_NAME)
}

/// Configuration pointing at `endpoint`, with optional extra YAML appended
pub fn config_for(endpoint: &str, extra_yaml: &str) -> RestAuthConfig {
    let yaml = format!(
        r#"
endpoint: "{}"
loginuri: "/check"
rest:
  user_id: "uid"
  password: "pwd"
  email: "mail"
attributes:
  display_name: "name"
  email: "mail"
{}
"#,
        endpoint, extra_yaml
    );
    RestAuthConfig::from_yaml_str(&yaml).expect("valid test configuration")
}

pub fn provider(server: &MockServer, host: &Arc<RecordingHost>, extra_yaml: &str) -> RestAuthProvider {
    RestAuthProvider::new(config_for(&server.uri(), extra_yaml), host.clone())
}

/// Mount a `/check` handler expecting exactly `request` and answering with
/// `status` and `response`.
pub async fn mount_check(server: &MockServer, request: Value, status: u16, response: Value) {
    Mock::given(method("POST"))
        .and(path("/check"))
        .and(body_json(request))
        .respond_with(ResponseTemplate::new(status).set_body_json(response))
        .mount(server)
        .await;
}
