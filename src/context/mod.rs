use crate::git::{self, GitError};
use crate::remote::{self, Credentials};
use thiserror::Error;

/// Git config key holding an explicit "user@host" credential string.
pub const CONFIG_SSH_CREDENTIALS: &str = "gerrit.ssh-credentials";
/// Git config key naming the Gerrit remote (defaults to "origin").
pub const CONFIG_REMOTE: &str = "gerrit.remote";

pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no ssh credentials for remote '{remote}'; set gerrit.ssh-credentials \
         or use an ssh://user@host:29418/... remote url"
    )]
    MissingCredentials { remote: String },
    #[error("invalid credentials '{0}': expected user@host")]
    InvalidCredentials(String),
    #[error("cannot determine gerrit project for remote '{remote}': {reason}")]
    UnresolvedProject { remote: String, reason: String },
    #[error(transparent)]
    Git(#[from] GitError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything an action needs to talk to one Gerrit host.
///
/// Scoped per repository, never process-wide: one process may drive several
/// repositories against different Gerrit hosts.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub remote_name: String,
    pub credentials: Option<Credentials>,
    pub project: String,
}

impl RepositoryContext {
    /// Resolve the context from the working repository.
    ///
    /// Precedence for the remote name: explicit override, then the
    /// `gerrit.remote` config key, then "origin". Precedence for
    /// credentials: explicit override, then `gerrit.ssh-credentials`, then
    /// detection from the remote URL (ssh scheme on port 29418 only).
    pub fn resolve(
        remote_override: Option<&str>,
        credentials_override: Option<&str>,
    ) -> Result<Self> {
        let remote_name = match remote_override {
            Some(name) => name.to_string(),
            None => git::config_value(CONFIG_REMOTE)?.unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
        };

        let url = git::remote_url(&remote_name)?;
        let project =
            remote::resolve_project(&url).map_err(|e| ConfigError::UnresolvedProject {
                remote: remote_name.clone(),
                reason: e.to_string(),
            })?;

        let credentials = match credentials_override {
            Some(raw) => Some(
                Credentials::parse(raw)
                    .ok_or_else(|| ConfigError::InvalidCredentials(raw.to_string()))?,
            ),
            None => match git::config_value(CONFIG_SSH_CREDENTIALS)? {
                Some(raw) => Some(
                    Credentials::parse(&raw)
                        .ok_or_else(|| ConfigError::InvalidCredentials(raw.clone()))?,
                ),
                None => remote::detect_credentials(&url),
            },
        };

        Ok(RepositoryContext {
            remote_name,
            credentials,
            project,
        })
    }

    /// Credentials must exist before any command argv is built, let alone a
    /// process spawned.
    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ConfigError::MissingCredentials {
                remote: self.remote_name.clone(),
            })
    }
}
