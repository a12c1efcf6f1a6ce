use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("not in a git repository")]
    NotARepo,
    #[error("git command failed: {0}")]
    CommandFailed(String),
    #[error("invalid git ref: {0}")]
    InvalidRef(String),
    #[error("no url configured for remote '{0}'")]
    MissingRemote(String),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;

/// Run git with the given arguments, returning trimmed stdout.
fn run_git(args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::CommandFailed(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Find the root of the git repository.
pub fn find_repo_root() -> Result<PathBuf> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()?;

    if !output.status.success() {
        return Err(GitError::NotARepo);
    }

    let path = String::from_utf8(output.stdout)?.trim().to_string();

    Ok(PathBuf::from(path))
}

/// Validate a git ref to prevent argument smuggling (only for user-supplied refs).
pub fn validate_git_ref(ref_str: &str) -> Result<()> {
    if ref_str.is_empty() {
        return Err(GitError::InvalidRef("Empty git ref".to_string()));
    }

    for ch in ref_str.chars() {
        if !ch.is_alphanumeric()
            && !matches!(
                ch,
                '-' | '_' | '/' | '.' | '~' | '^' | '@' | ':' | '{' | '}'
            )
        {
            return Err(GitError::InvalidRef(format!(
                "Invalid character in git ref: '{}'",
                ch
            )));
        }
    }

    Ok(())
}

/// Read a single git config value. A missing key is `None`, not an error.
pub fn config_value(key: &str) -> Result<Option<String>> {
    let output = Command::new("git")
        .arg("config")
        .arg("--get")
        .arg(key)
        .output()?;

    if !output.status.success() {
        return Ok(None);
    }

    let value = String::from_utf8(output.stdout)?.trim().to_string();
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// Get the current branch name (None for detached HEAD).
pub fn current_branch() -> Result<Option<String>> {
    let branch = run_git(&["branch", "--show-current"])?;
    if branch.is_empty() {
        Ok(None)
    } else {
        Ok(Some(branch))
    }
}

/// The configured URL of a remote.
pub fn remote_url(remote: &str) -> Result<String> {
    config_value(&format!("remote.{}.url", remote))?
        .ok_or_else(|| GitError::MissingRemote(remote.to_string()))
}

/// The remote a branch tracks (branch.<name>.remote), if configured.
pub fn tracking_remote(branch: &str) -> Result<Option<String>> {
    config_value(&format!("branch.{}.remote", branch))
}

/// The merge ref a branch tracks (branch.<name>.merge), if configured.
///
/// This is the full upstream ref, e.g. "refs/heads/main".
pub fn tracking_merge_ref(branch: &str) -> Result<Option<String>> {
    config_value(&format!("branch.{}.merge", branch))
}

/// List the branches known under a remote.
pub fn list_remote_branches(remote: &str) -> Result<Vec<String>> {
    let prefix = format!("refs/remotes/{}/", remote);
    let stdout = run_git(&["for-each-ref", "--format=%(refname)", &prefix])?;

    Ok(stdout
        .lines()
        .filter_map(|line| line.strip_prefix(prefix.as_str()))
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
        .collect())
}

/// Fetch from a remote, blocking until the fetch completes.
///
/// Callers that read FETCH_HEAD afterwards depend on this not returning
/// before the subprocess has exited.
pub fn fetch(remote: &str, ref_name: Option<&str>) -> Result<()> {
    if let Some(r) = ref_name {
        validate_git_ref(r)?;
        run_git(&["fetch", remote, r])?;
    } else {
        run_git(&["fetch", remote])?;
    }
    Ok(())
}

/// Force-create or reset a branch at the given revision.
pub fn create_or_reset_branch(name: &str, at_ref: &str) -> Result<()> {
    validate_git_ref(name)?;
    validate_git_ref(at_ref)?;
    run_git(&["branch", "-f", name, at_ref])?;
    Ok(())
}

/// Push a refspec to a remote.
pub fn push(remote: &str, refspec: &str) -> Result<()> {
    validate_git_ref(refspec)?;
    run_git(&["push", remote, refspec])?;
    Ok(())
}

/// Get git diff output for a given revision range.
pub fn diff(range: &str) -> Result<String> {
    validate_git_ref(range)?;

    let output = Command::new("git").arg("diff").arg(range).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::CommandFailed(format!(
            "git diff failed: {}",
            stderr
        )));
    }

    String::from_utf8(output.stdout).map_err(GitError::from)
}

/// Resolve a revision expression to a full commit hash.
pub fn resolve_revision(rev: &str) -> Result<String> {
    validate_git_ref(rev)?;
    run_git(&["rev-parse", "--verify", rev])
}
