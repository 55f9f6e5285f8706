//! `ideagen` -- start backend runs, follow their progress and browse
//! the generated ideas from a terminal.
//!
//! # Environment variables
//!
//! | Variable                       | Required | Default                 | Description                    |
//! |--------------------------------|----------|-------------------------|--------------------------------|
//! | `IDEAGEN_API_URL`              | no       | `http://127.0.0.1:8000` | Backend base URL               |
//! | `IDEAGEN_POLL_INTERVAL_SECS`   | no       | `5`                     | Seconds between status polls   |
//! | `IDEAGEN_POLL_MAX_ATTEMPTS`    | no       | `120`                   | Polls before giving up         |
//! | `IDEAGEN_REQUEST_TIMEOUT_SECS` | no       | `30`                    | Timeout for one REST request   |
//! | `RUST_LOG`                     | no       | `ideagen=info`          | Log filter (logs go to stderr) |

use std::process::ExitCode;

use clap::Parser;
use ideagen_cli::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ideagen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Cli::parse();

    match cli::run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
