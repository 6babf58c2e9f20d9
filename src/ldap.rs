//! LDAP support.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{
    Ldap as Ldap3, LdapConnAsync, LdapConnSettings, LdapError, Scope,
    SearchEntry, SearchStream,
};

use crate::directory::{
    ConnectionParams, DirectoryConnector, DirectoryError, DirectorySession,
    EntryStream, SearchRequest,
};
use crate::identity::DirectoryEntry;

/// Opens sessions with [`ldap3`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LdapConnector;

impl LdapConnector {
    /// Create a new [`LdapConnector`].
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(params.timeout)
            .set_starttls(params.starttls);

        let (handle, conn) =
            LdapConnAsync::with_settings(settings, &params.url())
                .await
                .map_err(|err| connect_error(err, params.starttls))?;
        ldap3::drive!(handle);

        Ok(Box::new(Ldap {
            conn,
            timeout: params.timeout,
        }))
    }
}

/// One [`ldap3`] connection.
#[derive(Debug)]
pub struct Ldap {
    conn: Ldap3,
    timeout: Duration,
}

#[async_trait]
impl DirectorySession for Ldap {
    async fn simple_bind(
        &mut self,
        dn: &str,
        secret: &str,
    ) -> Result<(), DirectoryError> {
        let result = self
            .conn
            .with_timeout(self.timeout)
            .simple_bind(dn, secret)
            .await
            .map_err(operation_error)?;

        if result.rc != 0 {
            return Err(DirectoryError::Rejected {
                code: result.rc,
                message: result.text,
            });
        }

        Ok(())
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Box<dyn EntryStream>, DirectoryError> {
        let adapters: Vec<Box<dyn Adapter<'static, String, Vec<String>>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(request.page_size)),
        ];

        let stream = self
            .conn
            .with_timeout(self.timeout)
            .streaming_search_with(
                adapters,
                &request.base_dn,
                Scope::Subtree,
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .map_err(operation_error)?;

        Ok(Box::new(LdapEntries { stream }))
    }

    async fn close(self: Box<Self>) {
        let mut session = self;
        if let Err(err) = session.conn.unbind().await {
            tracing::debug!(error = %err, "unbind failed, dropping connection");
        }
    }
}

/// Paged search over an [`ldap3`] connection.
pub struct LdapEntries {
    stream: SearchStream<'static, String, Vec<String>>,
}

#[async_trait]
impl EntryStream for LdapEntries {
    async fn next_entry(
        &mut self,
    ) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let Some(entry) = self.stream.next().await.map_err(operation_error)?
        else {
            let result = self.stream.finish().await;
            if result.rc != 0 {
                return Err(DirectoryError::Rejected {
                    code: result.rc,
                    message: result.text,
                });
            }
            return Ok(None);
        };

        let entry = SearchEntry::construct(entry);
        Ok(Some(DirectoryEntry::new(entry.dn, entry.attrs)))
    }

    // Dropping the stream stops paging. The server discards the search when
    // the connection is unbound.
    async fn finish(self: Box<Self>) {}
}

fn connect_error(err: LdapError, starttls: bool) -> DirectoryError {
    match err {
        LdapError::Timeout { .. } => DirectoryError::Timeout,
        LdapError::Io { .. } => DirectoryError::Unreachable(err.to_string()),
        err if starttls => DirectoryError::Tls(err.to_string()),
        err => DirectoryError::Ldap(err),
    }
}

fn operation_error(err: LdapError) -> DirectoryError {
    match err {
        LdapError::Timeout { .. } => DirectoryError::Timeout,
        err => DirectoryError::Ldap(err),
    }
}
