use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::actions::ScoreCategory;
use crate::command::QueryStatus;

#[derive(Parser, Debug)]
#[command(name = "gerrit-review", about = "Gerrit review workflows from the terminal")]
pub struct Cli {
    /// Git remote the Gerrit host is resolved from (default: gerrit.remote
    /// config, then "origin").
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Explicit user@host credentials, overriding git config and remote-url
    /// detection.
    #[arg(long, global = true, value_name = "USER@HOST")]
    pub ssh: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the project's reviews (default: open ones).
    Status(StatusArgs),
    /// Push HEAD (or another ref) to Gerrit for review.
    Push(PushArgs),
    /// Vote on a review's current patchset.
    Score(ScoreArgs),
    /// Submit a review for merging.
    Submit(TargetArgs),
    /// Abandon a review.
    Abandon(AbandonArgs),
    /// Publish a draft patchset.
    Publish(TargetArgs),
    /// Delete a draft patchset.
    Delete(TargetArgs),
    /// Add a reviewer to a review.
    Reviewer(ReviewerArgs),
    /// Fetch a review's patchset into a local branch.
    Download(TargetArgs),
    /// Show the diff of a review's current patchset.
    Diff(TargetArgs),
    /// Open a review in the browser.
    Browse(TargetArgs),
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Which reviews to list.
    #[arg(long, value_enum, default_value = "open")]
    pub status: StatusFilter,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Local ref to push (defaults to HEAD).
    pub local_ref: Option<String>,

    /// Target branch on the remote (defaults to the upstream merge ref).
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Push as a draft, visible only to explicitly added reviewers.
    #[arg(long)]
    pub draft: bool,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Change number to vote on.
    pub number: u64,

    /// Category to vote in.
    #[arg(value_enum)]
    pub category: CategoryArg,

    /// Score, -2 to +2.
    #[arg(allow_hyphen_values = true, value_parser = clap::value_parser!(i32).range(-2..=2))]
    pub value: i32,

    /// Cover message for the vote.
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Change number.
    pub number: u64,
}

#[derive(Args, Debug)]
pub struct AbandonArgs {
    /// Change number.
    pub number: u64,

    /// Reason for abandoning.
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReviewerArgs {
    /// Change number.
    pub number: u64,

    /// Reviewer to add, by name or email.
    pub reviewer: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum StatusFilter {
    #[default]
    Open,
    Merged,
    Abandoned,
}

impl From<StatusFilter> for QueryStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Open => QueryStatus::Open,
            StatusFilter::Merged => QueryStatus::Merged,
            StatusFilter::Abandoned => QueryStatus::Abandoned,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CategoryArg {
    CodeReview,
    Verified,
}

impl From<CategoryArg> for ScoreCategory {
    fn from(category: CategoryArg) -> Self {
        match category {
            CategoryArg::CodeReview => ScoreCategory::CodeReview,
            CategoryArg::Verified => ScoreCategory::Verified,
        }
    }
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
