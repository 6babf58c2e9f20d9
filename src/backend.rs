//! Pluggable password backend contract.

use async_trait::async_trait;

use crate::authenticator::DirectoryAuthenticator;
use crate::identity::ResolvedIdentity;

/// Backend checking passwords on behalf of an identity system.
///
/// Every failure collapses to `None`. Causes are only reported to the
/// backend's own telemetry.
#[async_trait]
pub trait UserBackend: Send + Sync {
    /// Short backend name, used to tag users it created.
    fn name(&self) -> &str;

    /// Check `password` for `uid` and resolve the external identity.
    async fn check_password(
        &self,
        uid: &str,
        password: &str,
    ) -> Option<ResolvedIdentity>;
}

#[async_trait]
impl UserBackend for DirectoryAuthenticator {
    fn name(&self) -> &str {
        "ldap"
    }

    async fn check_password(
        &self,
        uid: &str,
        password: &str,
    ) -> Option<ResolvedIdentity> {
        self.verify(uid, password).await.ok()
    }
}
