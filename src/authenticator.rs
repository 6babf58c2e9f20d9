//! Two-bind LDAP verification.
//!
//! The candidate credential is proven by binding with it. The same
//! connection is then rebound as the service account, which looks up the
//! verified user and yields its canonical attributes.

use zeroize::Zeroizing;

use crate::config::ProviderConfig;
use crate::directory::{
    ConnectionParams, DirectoryConnector, DirectorySession, SearchRequest,
};
use crate::error::{ConfigError, Result, VerifyError};
use crate::filter::{FilterParams, FilterTemplate};
use crate::identity::{ATTRIBUTES, Credential, ResolvedIdentity};
use crate::ldap::LdapConnector;
use crate::telemetry::{AuthTelemetry, Failure, TracingTelemetry};

/// Verifies credentials against a directory.
///
/// Holds no connection between calls and can be shared across tasks.
pub struct DirectoryAuthenticator {
    connection: ConnectionParams,
    base_dn: String,
    filter: FilterTemplate,
    service_dn: String,
    service_secret: Zeroizing<String>,
    page_size: i32,
    connector: Box<dyn DirectoryConnector>,
    telemetry: Box<dyn AuthTelemetry>,
}

impl DirectoryAuthenticator {
    /// Create a new [`DirectoryAuthenticator`].
    pub fn new(
        config: &ProviderConfig,
        connector: Box<dyn DirectoryConnector>,
        telemetry: Box<dyn AuthTelemetry>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            connection: config.connection(),
            base_dn: config.base_dn.clone(),
            filter: config.filter()?,
            service_dn: config.user.clone(),
            service_secret: Zeroizing::new(
                config.password.clone().unwrap_or_default(),
            ),
            page_size: config.page_size,
            connector,
            telemetry,
        })
    }

    /// Authenticator speaking LDAP and logging with `tracing`.
    pub fn from_config(
        config: &ProviderConfig,
    ) -> std::result::Result<Self, ConfigError> {
        Self::new(
            config,
            Box::new(LdapConnector::new()),
            Box::new(TracingTelemetry::new()),
        )
    }

    /// Verify `password` for `username` and resolve its identity.
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ResolvedIdentity> {
        self.verify_credential(&Credential::new(username, password))
            .await
    }

    /// Verify a [`Credential`] and resolve its identity.
    pub async fn verify_credential(
        &self,
        credential: &Credential,
    ) -> Result<ResolvedIdentity> {
        let mut session = match self.connector.connect(&self.connection).await
        {
            Ok(session) => session,
            Err(err) => {
                return Err(self.failed(VerifyError::Connection(err), credential));
            },
        };

        let result = self.run(session.as_mut(), credential).await;
        session.close().await;

        result.map_err(|err| self.failed(err, credential))
    }

    async fn run(
        &self,
        session: &mut dyn DirectorySession,
        credential: &Credential,
    ) -> Result<ResolvedIdentity> {
        // Authoritative password check. Nothing later re-validates it.
        session
            .bind(&credential.username, credential.password())
            .await
            .map_err(VerifyError::Authentication)?;

        session
            .rebind(&self.service_dn, &self.service_secret)
            .await
            .map_err(VerifyError::ServiceAccount)?;

        let filter = self
            .filter
            .render(&FilterParams::user(&credential.username))
            .map_err(|err| VerifyError::ServiceAccount(err.into()))?;

        let request = SearchRequest {
            base_dn: self.base_dn.clone(),
            filter,
            attributes: ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            page_size: self.page_size,
        };

        let mut entries = session
            .search(&request)
            .await
            .map_err(VerifyError::ServiceAccount)?;

        // Only the first entry of the first page is consulted. Which one
        // comes first is up to the directory.
        let first = entries.next_entry().await;
        entries.finish().await;

        let entry = first
            .map_err(VerifyError::ServiceAccount)?
            .ok_or(VerifyError::UserNotFound)?;

        ResolvedIdentity::from_entry(&entry).ok_or(VerifyError::UserNotFound)
    }

    fn failed(&self, err: VerifyError, credential: &Credential) -> VerifyError {
        let detail = match &err {
            VerifyError::Connection(source) => {
                format!("{}: {source}", self.connection.url())
            },
            VerifyError::Authentication(source) => source.to_string(),
            VerifyError::ServiceAccount(source) => {
                format!("service account `{}`: {source}", self.service_dn)
            },
            VerifyError::UserNotFound => format!(
                "no entry with a mail attribute under `{}` for filter `{}`",
                self.base_dn, self.filter
            ),
        };

        self.telemetry.record_failure(&Failure {
            kind: err.kind(),
            username: &credential.username,
            detail,
        });

        err
    }
}
