//! # REST Auth Core
//!
//! Password and third-party (email) authentication for a federated chat
//! homeserver, delegated to an external REST identity service.
//!
//! This crate provides:
//! - [`RestAuthProvider`], which forwards credentials to the identity service
//!   and provisions a local account on first successful login
//! - [`RestAuthConfig`], the immutable policy parsed from the host's
//!   configuration tree
//! - [`AccountHandler`], the capabilities the host must expose (account
//!   existence, registration, profile and 3PID updates)
//! - [`MemoryAccountHandler`], an in-memory host for tests and dry runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rest_auth_core::{MemoryAccountHandler, RestAuthConfig, RestAuthProvider};
//!
//! # async fn run() -> rest_auth_core::Result<()> {
//! let config = RestAuthConfig::from_file("rest_auth.yaml")?;
//! let host = Arc::new(MemoryAccountHandler::new("example.org"));
//! let provider = RestAuthProvider::new(config, host);
//!
//! if provider.check_password("@alice:example.org", "secret").await? {
//!     println!("welcome");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod provider;
pub mod types;

pub use client::{CredentialCheck, IdentityClient};
pub use config::{FieldMap, RestAuthConfig};
pub use error::{RestAuthError, Result};
pub use host::{AccountHandler, MemoryAccountHandler, ThreepidBinding, EMAIL_MEDIUM};
pub use provider::RestAuthProvider;
pub use types::{localpart, AuthOutcome, RejectReason};
