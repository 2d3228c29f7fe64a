use std::env;
use std::process::exit;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bsky_client::{BskyClient, DEFAULT_BASE_URL};
use skywatch_common::{AgentIdentity, WatchConfig};
use skywatch_sentry::discovery::{CheckOutcome, Sentry, UpdateOutcome};
use skywatch_sentry::store::JsonStateStore;
use skywatch_sentry::traits::AppViewTransport;

#[derive(Parser)]
#[command(name = "skywatch-sentry", about = "Thread monitoring for an automated Bluesky participant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull fresh notifications, analyze their threads, emit monitoring jobs
    Discover,
    /// Is a thread due for a re-poll? Exit 0 = check now, 1 = skip, 2 = not found
    CheckDue { root_uri: String },
    /// Record the outcome of a check against the thread's backoff state
    Update {
        root_uri: String,
        /// New activity was found during the check
        #[arg(long)]
        activity: bool,
    },
    /// Re-emit monitoring jobs for all qualifying threads
    Jobs,
    /// One-line summaries of every tracked thread
    List,
    /// Stop tracking a thread. Exit 2 if it was not tracked
    Unwatch { root_uri: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("skywatch=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = WatchConfig::from_env();
    let identity = AgentIdentity::from_env();

    let base_url =
        env::var("BSKY_APPVIEW_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let access_token = env::var("BSKY_ACCESS_TOKEN").ok();
    let client = BskyClient::new(&base_url, access_token.as_deref());

    let store = JsonStateStore::new(config.state_path.clone(), config.evaluated_cap);
    let sentry = Sentry::new(AppViewTransport::new(client), store, config, identity);
    let now = Utc::now();

    match cli.command {
        Command::Discover => {
            let summary = sentry.discover(now).await?;
            for job in &summary.jobs {
                println!("{}", serde_json::to_string_pretty(job)?);
            }
            info!(
                seen = summary.notifications_seen,
                fresh = summary.fresh_notifications,
                analyzed = summary.threads_analyzed,
                tracked = summary.threads_tracked,
                jobs = summary.jobs.len(),
                "Discovery finished"
            );
        }
        Command::CheckDue { root_uri } => match sentry.check_due(&root_uri, now).await {
            Ok(CheckOutcome::Check) => {
                println!("check");
            }
            Ok(CheckOutcome::Retire) => {
                println!("retire");
            }
            Ok(CheckOutcome::NotDue) => exit(1),
            Ok(CheckOutcome::NotFound) => {
                warn!(root = root_uri.as_str(), "thread is not tracked");
                exit(2);
            }
            Err(e) => {
                // Degrade to "skip this tick"; never crash the scheduler.
                error!(error = %e, "check-due failed");
                exit(1);
            }
        },
        Command::Update { root_uri, activity } => {
            match sentry.update(&root_uri, activity, now)? {
                UpdateOutcome::Updated { backoff_level } => {
                    info!(root = root_uri.as_str(), backoff_level, activity, "backoff updated");
                }
                UpdateOutcome::NotFound => {
                    warn!(root = root_uri.as_str(), "thread is not tracked");
                    exit(2);
                }
            }
        }
        Command::Jobs => {
            let jobs = sentry.jobs()?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Command::List => {
            for thread in sentry.list()? {
                println!(
                    "{:>5.0}  lvl {}  {} branch(es)  @{}  {}",
                    thread.clamped_score(),
                    thread.backoff_level,
                    thread.branches.len(),
                    thread.root_author,
                    thread.root_uri
                );
            }
        }
        Command::Unwatch { root_uri } => {
            if sentry.unwatch(&root_uri)? {
                info!(root = root_uri.as_str(), "thread removed from tracking");
            } else {
                warn!(root = root_uri.as_str(), "thread is not tracked");
                exit(2);
            }
        }
    }

    Ok(())
}
