//! # Credentials
//!
//! Data model for the TLS credentials under backup:
//!
//! - [`Identity`]: the `namespace/name` pair naming one credential and its backup slot
//! - [`BackupKey`]: the storage object name derived from an identity
//! - [`CredentialRecord`]: the live or backed-up secret in its Kubernetes `Secret` shape
//! - [`Clock`]: the time source used when judging certificate validity windows

pub mod clock;
pub mod record;

pub use clock::{Clock, FixedClock, SystemClock};
pub use record::{
    CredentialRecord, ObjectMeta, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, TLS_SECRET_TYPE,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed suffix appended to every backup object name.
pub const BACKUP_KEY_SUFFIX: &str = ".json";

/// Error returned when an identity string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityParseError {
    /// The string is not of the form `namespace/name`.
    #[error("Invalid identity '{input}': expected <namespace>/<name>")]
    MissingSeparator { input: String },

    /// One of the two components is empty.
    #[error("Invalid identity '{input}': namespace and name must be non-empty")]
    EmptyComponent { input: String },

    /// The name contains a further `/`.
    #[error("Invalid identity '{input}': name must not contain '/'")]
    NestedPath { input: String },

    /// A component is not a lowercase RFC 1123 subdomain name.
    #[error("Invalid identity '{input}': {reason}")]
    InvalidComponent { input: String, reason: String },
}

/// Longest namespace or name accepted, as for Kubernetes object names.
pub const MAX_COMPONENT_LEN: usize = 253;

/// Namespace and name of one credential.
///
/// Stable for the lifetime of the credential; owns exactly one backup slot. Both components are
/// lowercase RFC 1123 subdomain names, so they never contain `/`, `:` or a path traversal and
/// distinct identities always map to distinct backup keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawIdentity")]
pub struct Identity {
    namespace: String,
    name: String,
}

#[derive(Deserialize)]
struct RawIdentity {
    namespace: String,
    name: String,
}

impl TryFrom<RawIdentity> for Identity {
    type Error = IdentityParseError;

    fn try_from(raw: RawIdentity) -> Result<Self, Self::Error> {
        Self::new(raw.namespace, raw.name)
    }
}

impl Identity {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, IdentityParseError> {
        let (namespace, name) = (namespace.into(), name.into());
        let input = format!("{}/{}", namespace, name);

        if namespace.is_empty() || name.is_empty() {
            return Err(IdentityParseError::EmptyComponent { input });
        }
        for component in [&namespace, &name] {
            if let Err(reason) = check_component(component) {
                return Err(IdentityParseError::InvalidComponent { input, reason });
            }
        }

        Ok(Self { namespace, name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage object name holding this identity's backup.
    pub fn backup_key(&self) -> BackupKey {
        BackupKey::from(self)
    }
}

/// Lowercase alphanumerics, `-` and `.`, starting and ending with an alphanumeric.
fn check_component(component: &str) -> Result<(), String> {
    if component.len() > MAX_COMPONENT_LEN {
        return Err(format!("'{}' is longer than {} characters", component, MAX_COMPONENT_LEN));
    }
    if let Some(c) = component
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
    {
        return Err(format!("'{}' contains '{}'", component, c));
    }

    let alphanumeric = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alphanumeric(component.chars().next()) || !alphanumeric(component.chars().last()) {
        return Err(format!("'{}' must start and end with a letter or digit", component));
    }
    Ok(())
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| IdentityParseError::MissingSeparator { input: s.to_string() })?;

        if name.contains('/') {
            return Err(IdentityParseError::NestedPath { input: s.to_string() });
        }

        Self::new(namespace, name)
    }
}

/// Deterministic storage object name for an [`Identity`]: `"<namespace>:<name>.json"`.
///
/// There is one key per identity and no versioning; each backup overwrites the last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackupKey(String);

impl BackupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Identity> for BackupKey {
    fn from(identity: &Identity) -> Self {
        Self(format!("{}:{}{}", identity.namespace, identity.name, BACKUP_KEY_SUFFIX))
    }
}

impl AsRef<str> for BackupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
