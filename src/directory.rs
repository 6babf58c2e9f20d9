//! Interface for directory transport operations.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::FilterError;
use crate::identity::DirectoryEntry;

/// Errors reported by a directory transport.
///
/// None of these carry a bind secret.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unreachable(String),

    #[error("transport encryption failed: {0}")]
    Tls(String),

    #[error("directory operation timed out")]
    Timeout,

    #[error("directory rejected request with code {code}: {message}")]
    Rejected { code: u32, message: String },

    #[error("refusing bind with an empty name or password")]
    UnauthenticatedBind,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Ldap(#[from] ldap3::LdapError),
}

/// Where and how to open a directory connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    /// Upgrade with STARTTLS before any credential is sent.
    pub starttls: bool,
    /// Bound for the connect and every later operation.
    pub timeout: Duration,
}

impl ConnectionParams {
    /// URL understood by the LDAP client.
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.host, self.port)
    }
}

/// A paginated subtree search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub filter: String,
    pub attributes: Vec<String>,
    pub page_size: i32,
}

/// Port opening directory sessions.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Open a connection, negotiating encryption when requested.
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// A single connection, owned by one verification.
///
/// At most one bind identity is active at a time.
#[async_trait]
pub trait DirectorySession: Send {
    /// Raw simple bind as `dn` with `secret`, sent as is.
    async fn simple_bind(
        &mut self,
        dn: &str,
        secret: &str,
    ) -> Result<(), DirectoryError>;

    /// Authenticated simple bind.
    ///
    /// An empty name is an anonymous bind (RFC 4513 §5.1.1) and an empty
    /// secret an unauthenticated one (§5.1.2). Servers may accept either
    /// without checking anything, so neither reaches the wire.
    async fn bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError> {
        if dn.is_empty() || secret.is_empty() {
            return Err(DirectoryError::UnauthenticatedBind);
        }

        self.simple_bind(dn, secret).await
    }

    /// Drop the current bind state and bind again as another identity on
    /// the same connection.
    ///
    /// A new Bind request resets the authentication state (RFC 4511 §4.2).
    /// No Unbind is sent first, it would terminate the session.
    async fn rebind(
        &mut self,
        dn: &str,
        secret: &str,
    ) -> Result<(), DirectoryError> {
        self.bind(dn, secret).await
    }

    /// Start a search. Entries are fetched lazily, page by page.
    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Box<dyn EntryStream>, DirectoryError>;

    /// Release the connection.
    async fn close(self: Box<Self>);
}

/// Finite, non-restartable sequence of search entries.
#[async_trait]
pub trait EntryStream: Send {
    /// Next entry, `None` once the search is exhausted.
    async fn next_entry(
        &mut self,
    ) -> Result<Option<DirectoryEntry>, DirectoryError>;

    /// Stop reading; pending pages are not requested.
    async fn finish(self: Box<Self>);
}

/// In-memory directory recording every operation it receives.
#[cfg(test)]
pub mod memory {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Operation observed by [`MemoryDirectory`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Operation {
        Connect { url: String, starttls: bool },
        Bind { dn: String },
        Search(SearchRequest),
        Close,
    }

    pub type Journal = Arc<Mutex<Vec<Operation>>>;

    #[derive(Debug, Default, Clone)]
    pub struct MemoryDirectory {
        unreachable: bool,
        accounts: HashMap<String, String>,
        results: HashMap<String, Vec<DirectoryEntry>>,
        search_failure: Option<u32>,
        journal: Journal,
    }

    impl MemoryDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn unreachable(mut self) -> Self {
            self.unreachable = true;
            self
        }

        /// Accept binds of `dn` with `secret`.
        pub fn account(mut self, dn: &str, secret: &str) -> Self {
            self.accounts.insert(dn.into(), secret.into());
            self
        }

        /// Entries returned, in order, for the exact rendered `filter`.
        pub fn entries(mut self, filter: &str, entries: Vec<DirectoryEntry>) -> Self {
            self.results.insert(filter.into(), entries);
            self
        }

        pub fn failing_search(mut self, code: u32) -> Self {
            self.search_failure = Some(code);
            self
        }

        pub fn journal(&self) -> Journal {
            Arc::clone(&self.journal)
        }

        fn record(&self, operation: Operation) {
            self.journal.lock().unwrap().push(operation);
        }
    }

    #[async_trait]
    impl DirectoryConnector for MemoryDirectory {
        async fn connect(
            &self,
            params: &ConnectionParams,
        ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
            self.record(Operation::Connect {
                url: params.url(),
                starttls: params.starttls,
            });

            if self.unreachable {
                return Err(DirectoryError::Unreachable("connection refused".into()));
            }

            Ok(Box::new(MemorySession {
                directory: self.clone(),
            }))
        }
    }

    pub struct MemorySession {
        directory: MemoryDirectory,
    }

    #[async_trait]
    impl DirectorySession for MemorySession {
        async fn simple_bind(
            &mut self,
            dn: &str,
            secret: &str,
        ) -> Result<(), DirectoryError> {
            self.directory.record(Operation::Bind { dn: dn.into() });

            match self.directory.accounts.get(dn) {
                Some(expected) if expected == secret => Ok(()),
                _ => Err(DirectoryError::Rejected {
                    code: 49,
                    message: "invalid credentials".into(),
                }),
            }
        }

        async fn search(
            &mut self,
            request: &SearchRequest,
        ) -> Result<Box<dyn EntryStream>, DirectoryError> {
            self.directory.record(Operation::Search(request.clone()));

            if let Some(code) = self.directory.search_failure {
                return Err(DirectoryError::Rejected {
                    code,
                    message: "insufficient access".into(),
                });
            }

            let entries = self
                .directory
                .results
                .get(&request.filter)
                .cloned()
                .unwrap_or_default();

            Ok(Box::new(MemoryEntries {
                entries: entries.into(),
            }))
        }

        async fn close(self: Box<Self>) {
            self.directory.record(Operation::Close);
        }
    }

    pub struct MemoryEntries {
        entries: VecDeque<DirectoryEntry>,
    }

    #[async_trait]
    impl EntryStream for MemoryEntries {
        async fn next_entry(
            &mut self,
        ) -> Result<Option<DirectoryEntry>, DirectoryError> {
            Ok(self.entries.pop_front())
        }

        async fn finish(self: Box<Self>) {}
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryDirectory, Operation};
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "127.0.0.1".into(),
            port: 389,
            starttls: false,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_empty_secret_never_sent() {
        let directory = MemoryDirectory::new().account("cn=anon", "");
        let journal = directory.journal();

        let mut session = directory.connect(&params()).await.unwrap();
        let err = session.bind("cn=anon", "").await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnauthenticatedBind));

        let err = session.rebind("cn=anon", "").await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnauthenticatedBind));

        assert!(
            !journal
                .lock()
                .unwrap()
                .iter()
                .any(|op| matches!(op, Operation::Bind { .. }))
        );
    }

    #[tokio::test]
    async fn test_empty_name_never_sent() {
        let directory = MemoryDirectory::new().account("", "anything");
        let journal = directory.journal();

        let mut session = directory.connect(&params()).await.unwrap();
        let err = session.bind("", "anything").await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnauthenticatedBind));

        assert!(
            !journal
                .lock()
                .unwrap()
                .iter()
                .any(|op| matches!(op, Operation::Bind { .. }))
        );
    }

    #[tokio::test]
    async fn test_rebind_switches_identity() {
        let directory = MemoryDirectory::new()
            .account("alice", "correct")
            .account("cn=search", "s3rvice");
        let journal = directory.journal();

        let mut session = directory.connect(&params()).await.unwrap();
        session.bind("alice", "correct").await.unwrap();
        session.rebind("cn=search", "s3rvice").await.unwrap();
        session.close().await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                Operation::Connect {
                    url: "ldap://127.0.0.1:389".into(),
                    starttls: false,
                },
                Operation::Bind { dn: "alice".into() },
                Operation::Bind {
                    dn: "cn=search".into()
                },
                Operation::Close,
            ]
        );
    }
}
