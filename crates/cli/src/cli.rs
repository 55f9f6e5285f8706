//! Command-line interface: argument parsing and command execution.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ideagen_core::outcome::TerminalOutcome;
use ideagen_core::types::{IdeaId, JobId};
use ideagen_sync::api::JobServiceApi;
use ideagen_sync::channel::SseChannelTransport;
use ideagen_sync::poll::HttpPollTransport;
use ideagen_sync::{SyncConfig, SyncSession};
use tokio_util::sync::CancellationToken;

use crate::presenter::TerminalPresenter;
use crate::render;

/// Exit code when tracking is interrupted with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

/// Exit code when the run outlived the poll attempt cap.
const EXIT_TIMED_OUT: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "ideagen",
    version,
    about = "Start idea generation runs and browse their results"
)]
pub struct Cli {
    /// Backend base URL (overrides IDEAGEN_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a new run and follow it to completion
    Start {
        /// Optional direction to focus idea generation on
        #[arg(long)]
        direction: Option<String>,

        /// Print the run id and exit without tracking
        #[arg(long)]
        no_track: bool,
    },

    /// Follow an existing run to completion
    Track {
        run_id: JobId,
    },

    /// List the ideas of a completed run
    Ideas {
        run_id: JobId,
    },

    /// Show one idea in full
    Idea {
        idea_id: IdeaId,
    },

    /// Save a markdown export of a run's ideas
    Export {
        run_id: JobId,

        /// Comma-separated idea ids to export (default: all)
        #[arg(long, value_parser = render::parse_idea_ids)]
        ids: Option<::std::vec::Vec<IdeaId>>,

        /// Output file (default: ideas-<run_id>.md)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Execute the parsed command.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = SyncConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    config.validate().context("Invalid configuration")?;

    let api = Arc::new(JobServiceApi::new(&config).context("Failed to build HTTP client")?);

    match cli.command {
        Command::Start {
            direction,
            no_track,
        } => {
            let created = api
                .create_run(direction.as_deref())
                .await
                .context("Failed to start run")?;
            tracing::info!(job_id = %created.run_id, "Run created");
            println!("{}", created.run_id);

            if no_track {
                return Ok(ExitCode::SUCCESS);
            }
            track(api, config, created.run_id).await
        }
        Command::Track { run_id } => track(api, config, run_id).await,
        Command::Ideas { run_id } => {
            let ideas = api
                .get_run_ideas(&run_id)
                .await
                .with_context(|| format!("Failed to load ideas of run {run_id}"))?;
            print!("{}", render::render_idea_list(&ideas));
            Ok(ExitCode::SUCCESS)
        }
        Command::Idea { idea_id } => {
            let idea = api
                .get_idea(idea_id)
                .await
                .with_context(|| format!("Failed to load idea {idea_id}"))?;
            print!("{}", render::render_idea_detail(&idea));
            Ok(ExitCode::SUCCESS)
        }
        Command::Export { run_id, ids, out } => {
            let markdown = api
                .export_markdown(&run_id, ids.as_deref())
                .await
                .context("Export failed")?;
            let path = out.unwrap_or_else(|| render::default_export_path(&run_id));
            tokio::fs::write(&path, &markdown)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Follow a run until it reaches a terminal outcome or Ctrl-C.
async fn track(api: Arc<JobServiceApi>, config: SyncConfig, run_id: JobId) -> Result<ExitCode> {
    let shutdown = CancellationToken::new();
    let idle_timeout = config.channel_idle_timeout;
    let session = SyncSession::new(
        run_id,
        config,
        SseChannelTransport::new(Arc::clone(&api), idle_timeout),
        HttpPollTransport::new(Arc::clone(&api)),
    )
    .with_cancellation(shutdown.child_token());

    let presenter = Arc::new(TerminalPresenter::new(std::io::stderr()));
    let handle = session.spawn(Arc::clone(&presenter));

    // Armed until the results are printed.
    let ctrl_c = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping");
                shutdown.cancel();
            }
        }
    });

    let outcome = handle.join().await.context("Tracking task panicked")?;

    let code = match outcome {
        Some(TerminalOutcome::Succeeded) => match presenter.navigation_target() {
            Some(target) => {
                match unless_cancelled(&shutdown, api.get_run_ideas(&target)).await {
                    Some(ideas) => {
                        let ideas = ideas
                            .with_context(|| format!("Failed to load ideas of run {target}"))?;
                        print!("{}", render::render_idea_list(&ideas));
                        ExitCode::SUCCESS
                    }
                    None => ExitCode::from(EXIT_CANCELLED),
                }
            }
            None => ExitCode::SUCCESS,
        },
        Some(TerminalOutcome::Failed { .. }) => ExitCode::FAILURE,
        Some(TerminalOutcome::TimedOut) => ExitCode::from(EXIT_TIMED_OUT),
        None => ExitCode::from(EXIT_CANCELLED),
    };

    ctrl_c.abort();
    Ok(code)
}

/// Await `fut` unless `token` fires first.
async fn unless_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}
