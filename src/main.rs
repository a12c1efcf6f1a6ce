use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use gerrit_review::actions;
use gerrit_review::cli::{self, Commands};
use gerrit_review::command::QueryStatus;
use gerrit_review::context::RepositoryContext;
use gerrit_review::dashboard::Dashboard;
use gerrit_review::store::ReviewStore;
use gerrit_review::tui::{App, run_tui};
use gerrit_review::{ApprovalCategory, Review, format_score};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();
    let ctx = RepositoryContext::resolve(args.remote.as_deref(), args.ssh.as_deref())
        .context("Failed to resolve gerrit context")?;

    match args.command {
        None => {
            // Default: open the interactive review list.
            let dashboard = Dashboard::load(&ctx, QueryStatus::Open)?;
            run_tui(App::new(ctx, dashboard))?;
        }
        Some(Commands::Status(status_args)) => {
            handle_status(&ctx, status_args.status.into())?;
        }
        Some(Commands::Push(push)) => {
            let refspec = actions::push_for_review(
                &ctx,
                push.local_ref.as_deref(),
                push.branch.as_deref(),
                push.draft,
            )?;
            println!("✓ Pushed {}", refspec);
        }
        Some(Commands::Score(score)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, score.number)?;
            actions::score(
                &ctx,
                review,
                score.category.into(),
                score.value,
                score.message.as_deref(),
            )?;
            println!(
                "✓ Scored change {} ({})",
                review.number,
                format_score(Some(score.value)).trim()
            );
        }
        Some(Commands::Submit(target)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, target.number)?;
            actions::submit(&ctx, review)?;
            println!("✓ Submitted change {}", review.number);
        }
        Some(Commands::Abandon(abandon)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, abandon.number)?;
            actions::abandon(&ctx, review, abandon.message.as_deref())?;
            println!("✓ Abandoned change {}", review.number);
        }
        Some(Commands::Publish(target)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, target.number)?;
            actions::publish_draft(&ctx, review)?;
            println!("✓ Published change {}", review.number);
        }
        Some(Commands::Delete(target)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, target.number)?;
            actions::delete_draft(&ctx, review)?;
            println!("✓ Deleted draft {}", review.number);
        }
        Some(Commands::Reviewer(reviewer)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, reviewer.number)?;
            actions::add_reviewer(&ctx, review, &reviewer.reviewer)?;
            println!(
                "✓ Added reviewer '{}' to change {}",
                reviewer.reviewer, review.number
            );
        }
        Some(Commands::Download(target)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, target.number)?;
            let branch = actions::download_patchset(&ctx, review)?;
            println!("✓ Fetched change {} into {}", review.number, branch);
        }
        Some(Commands::Diff(target)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, target.number)?;
            let diff = actions::view_patchset_diff(&ctx, review)?;
            print!("{diff}");
        }
        Some(Commands::Browse(target)) => {
            let store = load_store(&ctx)?;
            let review = actions::select_by_number(&store, target.number)?;
            actions::browse(review)?;
            println!("✓ Opened {}", review.url);
        }
    }

    Ok(())
}

/// Query the open reviews into a fresh store; mutations resolve their target
/// from it by number.
fn load_store(ctx: &RepositoryContext) -> Result<ReviewStore> {
    let mut store = ReviewStore::new();
    actions::refresh_store(ctx, &mut store, QueryStatus::Open)?;
    Ok(store)
}

/// Print the review table without entering the TUI.
fn handle_status(ctx: &RepositoryContext, status: QueryStatus) -> Result<()> {
    let outcome = actions::fetch_reviews(ctx, status)?;

    if outcome.reviews.is_empty() {
        println!("No {} reviews for {}", status.as_str(), ctx.project);
        return Ok(());
    }

    println!(
        "{} reviews for {} ({})",
        outcome.reviews.len(),
        ctx.project,
        status.as_str()
    );
    println!("─────────────────────────────────────");
    for review in &outcome.reviews {
        print_review_line(review);
    }

    if let Some(stats) = &outcome.stats
        && stats.more_changes
    {
        println!("… more changes on the server than shown");
    }

    Ok(())
}

fn print_review_line(review: &Review) {
    let draft = if review.is_draft { "D" } else { " " };
    let cr = format_score(review.score_for(&ApprovalCategory::CodeReview));
    let verified = format_score(review.score_for(&ApprovalCategory::Verified));
    println!(
        "{:>7} {} {:>2} {:>2}  {:20} {}",
        review.number, draft, cr, verified, review.owner.name, review.subject
    );
}
