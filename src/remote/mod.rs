use std::fmt;
use thiserror::Error;
use url::Url;

/// The conventional Gerrit SSH port. A default-port ssh remote is what marks
/// a remote as a Gerrit remote in the first place.
pub const GERRIT_SSH_PORT: u16 = 29418;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("unparseable remote url '{url}': {reason}")]
    Unparseable { url: String, reason: String },
    #[error("remote url '{0}' has no project path")]
    MissingProject(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// SSH identity for a Gerrit host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub host: String,
}

impl Credentials {
    /// Parse an explicit "user@host" string.
    pub fn parse(s: &str) -> Option<Self> {
        let (user, host) = s.split_once('@')?;
        if user.is_empty() || host.is_empty() {
            return None;
        }
        Some(Credentials {
            user: user.to_string(),
            host: host.to_string(),
        })
    }

    /// The "user@host" form ssh expects.
    pub fn address(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

/// Extract the Gerrit project name from a remote URL.
///
/// The project is the path past host:port, with a trailing ".git" stripped:
/// "ssh://u@h:29418/top/sub.git" resolves to "top/sub".
pub fn resolve_project(remote_url: &str) -> Result<String> {
    let parsed = Url::parse(remote_url).map_err(|e| RemoteError::Unparseable {
        url: remote_url.to_string(),
        reason: e.to_string(),
    })?;
    let path = parsed.path().trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if path.is_empty() {
        return Err(RemoteError::MissingProject(remote_url.to_string()));
    }
    Ok(path.to_string())
}

/// Derive SSH credentials from a remote URL.
///
/// Only an `ssh://user@host:29418/...` remote counts as a Gerrit remote; any
/// other scheme or port yields `None` and the integration must not activate.
pub fn detect_credentials(remote_url: &str) -> Option<Credentials> {
    let parsed = Url::parse(remote_url).ok()?;
    if parsed.scheme() != "ssh" || parsed.port() != Some(GERRIT_SSH_PORT) {
        return None;
    }
    let host = parsed.host_str()?;
    if parsed.username().is_empty() {
        return None;
    }
    Some(Credentials {
        user: parsed.username().to_string(),
        host: host.to_string(),
    })
}
