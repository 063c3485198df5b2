//! Core types for rest-auth-core

use serde::Serialize;

use crate::error::{RestAuthError, Result};

/// Result of a single authentication attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    /// Credentials accepted for an account the host already knew
    AuthenticatedExisting { user_id: String },
    /// Credentials accepted and a local account was provisioned
    AuthenticatedNewlyRegistered { user_id: String },
    Rejected { reason: RejectReason },
    /// The identity service could not give an answer
    ServiceError { message: String },
}

/// Why an attempt was rejected. Both reasons look the same to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// The identity service declined with a non-success status
    Credentials { status: u16 },
    /// Registration blocked because the localpart has uppercase characters
    LowercasePolicy { localpart: String },
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthOutcome::AuthenticatedExisting { .. } | AuthOutcome::AuthenticatedNewlyRegistered { .. }
        )
    }

    /// The authenticated user, if any
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthOutcome::AuthenticatedExisting { user_id }
            | AuthOutcome::AuthenticatedNewlyRegistered { user_id } => Some(user_id),
            _ => None,
        }
    }

    /// Collapse into the host-facing decision: rejections become `false`,
    /// service faults become an error.
    pub fn into_decision(self) -> Result<bool> {
        match self {
            AuthOutcome::ServiceError { message } => Err(RestAuthError::ServiceUnavailable(message)),
            other => Ok(other.is_authenticated()),
        }
    }
}

/// Extract the localpart of a `@localpart:domain` user ID.
///
/// Input without a sigil or a domain is returned trimmed accordingly, so a
/// bare localpart maps to itself.
pub fn localpart(user_id: &str) -> &str {
    let without_sigil = user_id.strip_prefix('@').unwrap_or(user_id);
    without_sigil
        .split_once(':')
        .map(|(localpart, _)| localpart)
        .unwrap_or(without_sigil)
}
