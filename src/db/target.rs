//! Connection target resolution.
//!
//! Maps a caller identity onto either a local database file or a hosted replica
//! `{endpoint, token}` pair. Resolution runs once per process (or per HTTP
//! session for bearer callers); the handle built from the result is then shared
//! read-only and carries no authorization logic of its own.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::{expand_tilde, StorageConfig};
use crate::error::{MemoryError, Result};

/// Where the store lives.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Local { path: PathBuf },
    Replica { endpoint: String, token: String },
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { path } => f.debug_struct("Local").field("path", path).finish(),
            Self::Replica { endpoint, .. } => f
                .debug_struct("Replica")
                .field("endpoint", endpoint)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Who is asking for a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// A process on this machine (CLI, stdio server, middleware).
    Local,
    /// A remote caller presenting a bearer credential.
    Bearer(String),
}

/// Hosted replica coordinates handed out for a credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplicaCredentials {
    pub endpoint: String,
    pub token: String,
}

/// Looks up replica coordinates for a bearer credential.
///
/// Provisioning happens elsewhere; this only answers "which database is this".
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, bearer: &str) -> Option<ReplicaCredentials>;
}

/// Config-backed credential table.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    entries: HashMap<String, ReplicaCredentials>,
}

impl StaticCredentials {
    pub fn new(entries: impl IntoIterator<Item = (String, ReplicaCredentials)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.credentials.iter().map(|c| {
            (
                c.bearer.clone(),
                ReplicaCredentials {
                    endpoint: c.endpoint.clone(),
                    token: c.token.clone(),
                },
            )
        }))
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, bearer: &str) -> Option<ReplicaCredentials> {
        self.entries.get(bearer).cloned()
    }
}

/// Rewrites a replica hostname suffix to a white-labeled domain.
///
/// `notes-acme.turso.io` with `turso.io → db.example.dev` becomes
/// `notes-acme.db.example.dev`; the database label is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainAlias {
    pub from_suffix: String,
    pub to_suffix: String,
}

impl DomainAlias {
    pub fn apply(&self, endpoint: &str) -> String {
        let Some((scheme, rest)) = endpoint.split_once("://") else {
            return endpoint.to_string();
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        let (host, port) = match authority.rfind(':') {
            Some(idx) => authority.split_at(idx),
            None => (authority, ""),
        };

        let from = format!(".{}", self.from_suffix.trim_start_matches('.'));
        let to = format!(".{}", self.to_suffix.trim_start_matches('.'));

        match host.strip_suffix(from.as_str()) {
            Some(label) if !label.is_empty() => format!("{scheme}://{label}{to}{port}{path}"),
            _ => endpoint.to_string(),
        }
    }
}

/// Resolve the connection target for `identity`.
pub fn resolve_target(
    identity: &CallerIdentity,
    storage: &StorageConfig,
    credentials: &dyn CredentialSource,
) -> Result<ConnectionTarget> {
    let target = match identity {
        CallerIdentity::Local => match storage.remote_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                let token = storage
                    .remote_token
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| {
                        MemoryError::Setup("storage.remote_url is set but remote_token is missing".into())
                    })?;
                ConnectionTarget::Replica {
                    endpoint: alias(storage, url),
                    token,
                }
            }
            _ => ConnectionTarget::Local {
                path: expand_tilde(&storage.db_path),
            },
        },
        CallerIdentity::Bearer(bearer) => {
            let creds = credentials
                .lookup(bearer)
                .ok_or_else(|| MemoryError::Unauthorized("unknown credential".into()))?;
            ConnectionTarget::Replica {
                endpoint: alias(storage, &creds.endpoint),
                token: creds.token,
            }
        }
    };

    tracing::debug!(resolved = ?target, "resolved connection target");
    Ok(target)
}

fn alias(storage: &StorageConfig, endpoint: &str) -> String {
    match &storage.domain_alias {
        Some(a) => a.apply(endpoint),
        None => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialEntry;

    fn alias_cfg() -> DomainAlias {
        DomainAlias {
            from_suffix: "turso.io".into(),
            to_suffix: ".db.example.dev".into(),
        }
    }

    #[test]
    fn alias_rewrites_suffix_and_keeps_label() {
        let a = alias_cfg();
        assert_eq!(
            a.apply("libsql://notes-acme.turso.io"),
            "libsql://notes-acme.db.example.dev"
        );
        assert_eq!(
            a.apply("https://notes-acme.turso.io:443/v2"),
            "https://notes-acme.db.example.dev:443/v2"
        );
    }

    #[test]
    fn alias_ignores_other_hosts() {
        let a = alias_cfg();
        assert_eq!(a.apply("libsql://notes.example.com"), "libsql://notes.example.com");
        // bare suffix without a database label is left alone
        assert_eq!(a.apply("libsql://turso.io"), "libsql://turso.io");
        assert_eq!(a.apply("not a url"), "not a url");
    }

    #[test]
    fn local_identity_defaults_to_file() {
        let storage = StorageConfig {
            db_path: "/tmp/cairn-test.db".into(),
            ..StorageConfig::default()
        };
        let target =
            resolve_target(&CallerIdentity::Local, &storage, &StaticCredentials::default()).unwrap();
        assert_eq!(
            target,
            ConnectionTarget::Local {
                path: PathBuf::from("/tmp/cairn-test.db")
            }
        );
    }

    #[test]
    fn local_identity_with_remote_url_uses_replica() {
        let storage = StorageConfig {
            remote_url: Some("libsql://notes-acme.turso.io".into()),
            remote_token: Some("tok".into()),
            domain_alias: Some(alias_cfg()),
            ..StorageConfig::default()
        };
        let target =
            resolve_target(&CallerIdentity::Local, &storage, &StaticCredentials::default()).unwrap();
        assert_eq!(
            target,
            ConnectionTarget::Replica {
                endpoint: "libsql://notes-acme.db.example.dev".into(),
                token: "tok".into(),
            }
        );
    }

    #[test]
    fn remote_url_without_token_is_setup_error() {
        let storage = StorageConfig {
            remote_url: Some("libsql://x.turso.io".into()),
            ..StorageConfig::default()
        };
        let err = resolve_target(&CallerIdentity::Local, &storage, &StaticCredentials::default())
            .unwrap_err();
        assert!(matches!(err, MemoryError::Setup(_)));
    }

    #[test]
    fn bearer_identity_resolves_through_credentials() {
        let storage = StorageConfig {
            credentials: vec![CredentialEntry {
                bearer: "agent-key".into(),
                endpoint: "libsql://team.turso.io".into(),
                token: "db-token".into(),
            }],
            ..StorageConfig::default()
        };
        let creds = StaticCredentials::from_config(&storage);

        let target =
            resolve_target(&CallerIdentity::Bearer("agent-key".into()), &storage, &creds).unwrap();
        assert!(matches!(target, ConnectionTarget::Replica { ref token, .. } if token == "db-token"));

        let err = resolve_target(&CallerIdentity::Bearer("nope".into()), &storage, &creds)
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unauthorized(_)));
    }

    #[test]
    fn debug_output_hides_token() {
        let target = ConnectionTarget::Replica {
            endpoint: "libsql://x.turso.io".into(),
            token: "secret-token".into(),
        };
        assert!(!format!("{target:?}").contains("secret-token"));
    }
}
