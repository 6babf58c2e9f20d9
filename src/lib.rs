//! LDAP password backend.
//!
//! Verifies a username and password by binding to the directory with them,
//! then rebinds the same connection as a service account to resolve the
//! user's canonical identity (its `mail`) and display name.

#![forbid(unsafe_code)]
#![deny(unused_mut)]

pub mod authenticator;
pub mod backend;
pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod identity;
pub mod ldap;
pub mod telemetry;

pub use authenticator::DirectoryAuthenticator;
pub use backend::UserBackend;
pub use config::ProviderConfig;
pub use error::{FailureKind, VerifyError};
pub use identity::{Credential, ResolvedIdentity};
