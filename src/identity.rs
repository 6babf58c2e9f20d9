//! Identity types flowing through a verification.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Attribute holding the canonical identity key.
pub const MAIL: &str = "mail";
/// Attribute holding the display name.
pub const DISPLAY_NAME: &str = "displayname";
/// Attributes requested by the privileged search.
pub const ATTRIBUTES: [&str; 4] = ["cn", MAIL, DISPLAY_NAME, "uid"];

/// Username and password submitted for one verification attempt.
pub struct Credential {
    pub username: String,
    password: Zeroizing<String>,
}

impl Credential {
    /// Create a new [`Credential`].
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Secret part of the credential.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One entry returned by a directory search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an entry from raw attributes.
    ///
    /// Attribute names are case-insensitive in LDAP, they are folded here.
    pub fn new(
        dn: impl Into<String>,
        attributes: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        let mut folded: HashMap<String, Vec<String>> = HashMap::new();
        for (name, values) in attributes {
            folded
                .entry(name.to_ascii_lowercase())
                .or_default()
                .extend(values);
        }

        Self {
            dn: dn.into(),
            attributes: folded,
        }
    }

    /// First value of `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// External identity resolved for a verified user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// External identity key, taken from `mail`.
    pub key: String,
    /// Value of `displayname`, may be absent.
    pub display_name: Option<String>,
}

impl ResolvedIdentity {
    /// Map a directory entry to an identity.
    ///
    /// Returns `None` when the entry has no non-empty `mail`.
    pub fn from_entry(entry: &DirectoryEntry) -> Option<Self> {
        let key = entry.first(MAIL).filter(|mail| !mail.is_empty())?;

        Some(Self {
            key: key.to_owned(),
            display_name: entry
                .first(DISPLAY_NAME)
                .filter(|name| !name.is_empty())
                .map(str::to_owned),
        })
    }
}
