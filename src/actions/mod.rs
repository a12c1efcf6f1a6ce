use crate::command::{self, QueryStatus, ReviewFlags};
use crate::context::{ConfigError, RepositoryContext};
use crate::git::{self, GitError};
use crate::query::{self, ParsedLine, QueryOutcome};
use crate::store::ReviewStore;
use crate::transport::{self, TransportError};
use crate::{PatchSet, Person, Review};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("gerrit rejected the query: {0}")]
    Query(String),
    #[error("no review selected")]
    NoSelection,
    #[error("review {0} has no current patchset")]
    MissingPatchSet(u64),
    #[error("score {0} out of range; must be between -2 and +2")]
    InvalidScore(i32),
    #[error("not on a branch")]
    DetachedHead,
    #[error("branch '{branch}' has no upstream merge ref configured")]
    NoUpstream { branch: String },
    #[error("remote '{remote}' has no branch '{branch}'")]
    NoSuchBranch { remote: String, branch: String },
    #[error("cannot open review in browser: {0}")]
    Browse(String),
}

pub type Result<T> = std::result::Result<T, ActionError>;

/// Score categories a user can vote in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCategory {
    CodeReview,
    Verified,
}

/// Query Gerrit for this project's reviews, decoding the response line by
/// line as it streams in.
pub fn fetch_reviews(ctx: &RepositoryContext, status: QueryStatus) -> Result<QueryOutcome> {
    let creds = ctx.require_credentials()?;
    let argv = command::query_command(creds, &ctx.project, status);

    let mut stream = transport::stream_lines(&argv)?;
    let mut outcome = QueryOutcome::default();
    for line in &mut stream {
        let line = line.map_err(TransportError::from)?;
        match query::parse_line(&line) {
            ParsedLine::Review(review) => outcome.reviews.push(*review),
            ParsedLine::Stats(stats) => outcome.stats = Some(stats),
            ParsedLine::Error(message) => return Err(ActionError::Query(message)),
            ParsedLine::Skipped => {}
        }
    }
    stream.finish()?;

    info!(
        project = %ctx.project,
        count = outcome.reviews.len(),
        "fetched reviews"
    );
    Ok(outcome)
}

/// Refresh the store from a fresh query. Returns false when a newer refresh
/// superseded this one while the query was in flight.
pub fn refresh_store(
    ctx: &RepositoryContext,
    store: &mut ReviewStore,
    status: QueryStatus,
) -> Result<bool> {
    let ticket = store.begin_refresh();
    let outcome = fetch_reviews(ctx, status)?;
    Ok(store.complete_refresh(ticket, outcome.reviews))
}

/// Resolve an action target from the store, by change number.
pub fn select_by_number(store: &ReviewStore, number: u64) -> Result<&Review> {
    store.find_by_number(number).ok_or(ActionError::NoSelection)
}

fn current_patch_set(review: &Review) -> Result<&PatchSet> {
    review
        .current_patch_set
        .as_ref()
        .ok_or(ActionError::MissingPatchSet(review.number))
}

/// The identifier mutations address a change by: the change id when the
/// wire carried one, the number otherwise.
fn change_key(review: &Review) -> String {
    if review.id.is_empty() {
        review.number.to_string()
    } else {
        review.id.clone()
    }
}

/// Compose the push refspec for uploading a local ref for review.
///
/// The target branch suffix comes from the upstream merge ref with its
/// `refs/heads/` prefix stripped; upstreams configure that name freely, so
/// it is computed, never assumed.
pub fn push_refspec(local_ref: &str, merge_ref: &str, topic: &str, draft: bool) -> String {
    let suffix = merge_ref.strip_prefix("refs/heads/").unwrap_or(merge_ref);
    let status = if draft { "drafts" } else { "publish" };
    format!("{local_ref}:refs/{status}/{suffix}/{topic}")
}

/// Push a local ref to Gerrit for review (or as a draft).
///
/// The target branch defaults to the current branch's upstream merge ref;
/// an explicit target must exist on the remote. Returns the refspec that
/// was pushed.
pub fn push_for_review(
    ctx: &RepositoryContext,
    local_ref: Option<&str>,
    target_branch: Option<&str>,
    draft: bool,
) -> Result<String> {
    ctx.require_credentials()?;

    let local = local_ref.unwrap_or("HEAD");
    git::resolve_revision(local)?;

    let branch = git::current_branch()?.ok_or(ActionError::DetachedHead)?;
    let remote = git::tracking_remote(&branch)?.unwrap_or_else(|| ctx.remote_name.clone());

    let target = match target_branch {
        Some(target) => {
            let known = git::list_remote_branches(&remote)?;
            if !known.iter().any(|b| b == target) {
                return Err(ActionError::NoSuchBranch {
                    remote,
                    branch: target.to_string(),
                });
            }
            target.to_string()
        }
        None => git::tracking_merge_ref(&branch)?.ok_or_else(|| ActionError::NoUpstream {
            branch: branch.clone(),
        })?,
    };

    let refspec = push_refspec(local, &target, &branch, draft);
    git::push(&remote, &refspec)?;
    Ok(refspec)
}

/// Add a reviewer (by free-text name or email) to a change.
pub fn add_reviewer(ctx: &RepositoryContext, review: &Review, identifier: &str) -> Result<()> {
    let creds = ctx.require_credentials()?;
    let argv =
        command::set_reviewers_command(creds, &ctx.project, &change_key(review), identifier);
    transport::execute(&argv)?;
    Ok(())
}

/// Vote on the current patchset of a review.
pub fn score(
    ctx: &RepositoryContext,
    review: &Review,
    category: ScoreCategory,
    value: i32,
    message: Option<&str>,
) -> Result<()> {
    if !(-2..=2).contains(&value) {
        return Err(ActionError::InvalidScore(value));
    }
    let creds = ctx.require_credentials()?;
    let patch_set = current_patch_set(review)?;

    let mut flags = ReviewFlags {
        message: message.map(str::to_string),
        ..Default::default()
    };
    match category {
        ScoreCategory::CodeReview => flags.code_review = Some(value),
        ScoreCategory::Verified => flags.verified = Some(value),
    }

    let argv = command::review_command(creds, &ctx.project, &patch_set.revision, &flags);
    transport::execute(&argv)?;
    Ok(())
}

fn terminal_review(ctx: &RepositoryContext, review: &Review, flags: ReviewFlags) -> Result<()> {
    let creds = ctx.require_credentials()?;
    let patch_set = current_patch_set(review)?;
    let argv = command::review_command(creds, &ctx.project, &patch_set.revision, &flags);
    transport::execute(&argv)?;
    Ok(())
}

/// Submit a review for merging, then fetch so local refs reflect the merge.
pub fn submit(ctx: &RepositoryContext, review: &Review) -> Result<()> {
    terminal_review(
        ctx,
        review,
        ReviewFlags {
            submit: true,
            ..Default::default()
        },
    )?;
    git::fetch(&ctx.remote_name, None)?;
    Ok(())
}

/// Abandon a review, optionally with a message.
pub fn abandon(ctx: &RepositoryContext, review: &Review, message: Option<&str>) -> Result<()> {
    terminal_review(
        ctx,
        review,
        ReviewFlags {
            abandon: true,
            message: message.map(str::to_string),
            ..Default::default()
        },
    )
}

/// Publish a draft patchset, making it visible to all reviewers.
pub fn publish_draft(ctx: &RepositoryContext, review: &Review) -> Result<()> {
    terminal_review(
        ctx,
        review,
        ReviewFlags {
            publish: true,
            ..Default::default()
        },
    )
}

/// Delete a draft patchset.
pub fn delete_draft(ctx: &RepositoryContext, review: &Review) -> Result<()> {
    terminal_review(
        ctx,
        review,
        ReviewFlags {
            delete: true,
            ..Default::default()
        },
    )
}

fn owner_ident(person: &Person) -> String {
    person
        .username
        .clone()
        .or_else(|| {
            person
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string)
        })
        .unwrap_or_else(|| person.name.to_lowercase().replace(' ', "_"))
}

/// Deterministic local branch for a downloaded review: owner identifier plus
/// topic (or number when there is no topic), so concurrently downloaded
/// reviews never collide.
pub fn review_branch_name(review: &Review) -> String {
    let suffix = review
        .topic
        .clone()
        .unwrap_or_else(|| review.number.to_string());
    format!("review/{}/{}", owner_ident(&review.owner), suffix)
}

/// Fetch a review's current patchset and point a local branch at it.
///
/// The fetch blocks until complete; the branch is force-created or reset to
/// the fetched tip. Returns the branch name.
pub fn download_patchset(ctx: &RepositoryContext, review: &Review) -> Result<String> {
    let patch_set = current_patch_set(review)?;
    let branch = review_branch_name(review);

    git::fetch(&ctx.remote_name, Some(&patch_set.ref_name))?;
    git::create_or_reset_branch(&branch, "FETCH_HEAD")?;

    info!(number = review.number, %branch, "downloaded patchset");
    Ok(branch)
}

/// Fetch a review's current patchset and return the diff against its parent.
///
/// Assumes the patchset is a single commit ahead of its parent: the range is
/// FETCH_HEAD~1..FETCH_HEAD, so a multi-commit patchset shows only its tip
/// commit. The query model does not carry the patchset's real parent, which
/// a full multi-commit diff would need.
pub fn view_patchset_diff(ctx: &RepositoryContext, review: &Review) -> Result<String> {
    let patch_set = current_patch_set(review)?;

    git::fetch(&ctx.remote_name, Some(&patch_set.ref_name))?;
    Ok(git::diff("FETCH_HEAD~1..FETCH_HEAD")?)
}

/// Open the review's web page in the desktop browser.
pub fn browse(review: &Review) -> Result<()> {
    if review.url.is_empty() {
        return Err(ActionError::Browse(format!(
            "review {} has no url",
            review.number
        )));
    }
    open::that(&review.url).map_err(|e| ActionError::Browse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Credentials;

    fn ctx() -> RepositoryContext {
        RepositoryContext {
            remote_name: "origin".to_string(),
            credentials: Credentials::parse("alice@gerrit.example.com"),
            project: "proj".to_string(),
        }
    }

    fn ctx_without_credentials() -> RepositoryContext {
        RepositoryContext {
            credentials: None,
            ..ctx()
        }
    }

    fn review(number: u64) -> Review {
        Review {
            id: format!("I{number:04}"),
            number,
            subject: "subject".to_string(),
            owner: Person {
                name: "Jane Doe".to_string(),
                email: Some("jdoe@example.com".to_string()),
                username: Some("jdoe".to_string()),
            },
            is_draft: false,
            current_patch_set: Some(PatchSet {
                revision: "cafe12".to_string(),
                ref_name: format!("refs/changes/{number}/{number}/1"),
                approvals: vec![],
            }),
            url: String::new(),
            commit_message: String::new(),
            topic: None,
        }
    }

    #[test]
    fn score_rejects_out_of_range_before_anything_else() {
        // Even with no credentials the range check fires first: nothing may
        // be built or spawned for an invalid vote.
        let err = score(
            &ctx_without_credentials(),
            &review(1),
            ScoreCategory::CodeReview,
            3,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ActionError::InvalidScore(3)));

        let err = score(&ctx(), &review(1), ScoreCategory::Verified, -3, None).unwrap_err();
        assert!(matches!(err, ActionError::InvalidScore(-3)));
    }

    #[test]
    fn score_requires_credentials() {
        let err = score(
            &ctx_without_credentials(),
            &review(1),
            ScoreCategory::CodeReview,
            2,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }

    #[test]
    fn select_by_number_maps_missing_to_no_selection() {
        let store = ReviewStore::new();
        assert!(matches!(
            select_by_number(&store, 7),
            Err(ActionError::NoSelection)
        ));
    }

    #[test]
    fn push_refspec_publish_and_draft() {
        assert_eq!(
            push_refspec("HEAD", "refs/heads/main", "fix-retry", false),
            "HEAD:refs/publish/main/fix-retry"
        );
        assert_eq!(
            push_refspec("HEAD", "refs/heads/main", "fix-retry", true),
            "HEAD:refs/drafts/main/fix-retry"
        );
    }

    #[test]
    fn push_refspec_keeps_nested_branch_suffix() {
        assert_eq!(
            push_refspec("HEAD", "refs/heads/release/1.2", "hotfix", false),
            "HEAD:refs/publish/release/1.2/hotfix"
        );
    }

    #[test]
    fn push_refspec_tolerates_bare_merge_ref() {
        assert_eq!(
            push_refspec("HEAD", "main", "topic", false),
            "HEAD:refs/publish/main/topic"
        );
    }

    #[test]
    fn branch_name_prefers_username_and_topic() {
        let mut r = review(4021);
        r.topic = Some("retry-fixes".to_string());
        assert_eq!(review_branch_name(&r), "review/jdoe/retry-fixes");
    }

    #[test]
    fn branch_name_falls_back_to_number() {
        let r = review(4021);
        assert_eq!(review_branch_name(&r), "review/jdoe/4021");
    }

    #[test]
    fn branch_name_without_username_uses_email_prefix() {
        let mut r = review(8);
        r.owner.username = None;
        assert_eq!(review_branch_name(&r), "review/jdoe/8");
        r.owner.email = None;
        assert_eq!(review_branch_name(&r), "review/jane_doe/8");
    }

    #[test]
    fn change_key_prefers_id() {
        let r = review(12);
        assert_eq!(change_key(&r), "I0012");
        let mut anonymous = review(12);
        anonymous.id = String::new();
        assert_eq!(change_key(&anonymous), "12");
    }

    #[test]
    fn browse_requires_a_url() {
        let r = review(5);
        assert!(matches!(browse(&r), Err(ActionError::Browse(_))));
    }

    #[test]
    fn missing_patchset_is_reported() {
        let mut r = review(6);
        r.current_patch_set = None;
        let err = submit(&ctx(), &r).unwrap_err();
        assert!(matches!(err, ActionError::MissingPatchSet(6)));
    }
}
