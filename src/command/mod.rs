use crate::remote::{Credentials, GERRIT_SSH_PORT};

/// Review state filter for the query command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Open,
    Merged,
    Abandoned,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Open => "open",
            QueryStatus::Merged => "merged",
            QueryStatus::Abandoned => "abandoned",
        }
    }
}

/// Flags for the `gerrit review` mutation. At most one terminal flag
/// (abandon/submit/publish/delete) is set per call.
#[derive(Debug, Clone, Default)]
pub struct ReviewFlags {
    pub abandon: bool,
    pub submit: bool,
    pub publish: bool,
    pub delete: bool,
    pub code_review: Option<i32>,
    pub verified: Option<i32>,
    pub message: Option<String>,
}

/// The fixed transport prefix: no pseudo-terminal, the conventional Gerrit
/// port, then the resolved identity and the remote `gerrit` command.
fn ssh_prefix(credentials: &Credentials) -> Vec<String> {
    vec![
        "ssh".to_string(),
        "-T".to_string(),
        "-p".to_string(),
        GERRIT_SSH_PORT.to_string(),
        credentials.address(),
        "gerrit".to_string(),
    ]
}

/// Quote free text for the remote shell.
///
/// ssh joins its trailing arguments with spaces before the remote side
/// re-splits them, so messages and reviewer names must be quoted as single
/// argv elements here. They are never concatenated into a local shell string.
fn quote_free_text(text: &str) -> String {
    shell_words::quote(text).into_owned()
}

/// Build the argv for a `gerrit query` over one project.
pub fn query_command(
    credentials: &Credentials,
    project: &str,
    status: QueryStatus,
) -> Vec<String> {
    let mut argv = ssh_prefix(credentials);
    argv.extend(
        [
            "query",
            "--format=JSON",
            "--all-approvals",
            "--comments",
            "--current-patch-set",
        ]
        .map(str::to_string),
    );
    argv.push(format!("project:{}", project));
    argv.push(format!("status:{}", status.as_str()));
    argv
}

/// Build the argv for a `gerrit review` mutation against one revision.
pub fn review_command(
    credentials: &Credentials,
    project: &str,
    revision: &str,
    flags: &ReviewFlags,
) -> Vec<String> {
    let mut argv = ssh_prefix(credentials);
    argv.push("review".to_string());
    argv.push("--project".to_string());
    argv.push(project.to_string());

    if flags.abandon {
        argv.push("--abandon".to_string());
    }
    if flags.submit {
        argv.push("--submit".to_string());
    }
    if flags.publish {
        argv.push("--publish".to_string());
    }
    if flags.delete {
        argv.push("--delete".to_string());
    }
    if let Some(value) = flags.code_review {
        argv.push("--code-review".to_string());
        argv.push(value.to_string());
    }
    if let Some(value) = flags.verified {
        argv.push("--verified".to_string());
        argv.push(value.to_string());
    }
    if let Some(message) = &flags.message {
        argv.push("--message".to_string());
        argv.push(quote_free_text(message));
    }

    argv.push(revision.to_string());
    argv
}

/// Build the argv for adding a reviewer to a change.
///
/// The identifier is free text (a name or an email) and is passed through
/// set-reviewers untouched apart from remote-shell quoting.
pub fn set_reviewers_command(
    credentials: &Credentials,
    project: &str,
    change: &str,
    reviewer: &str,
) -> Vec<String> {
    let mut argv = ssh_prefix(credentials);
    argv.extend(["set-reviewers", "--project"].map(str::to_string));
    argv.push(project.to_string());
    argv.push("--add".to_string());
    argv.push(quote_free_text(reviewer));
    argv.push(change.to_string());
    argv
}
