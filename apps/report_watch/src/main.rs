use std::{fmt::Write as _, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{config::normalize_server_url, load_settings, ReportSession};
use shared::{domain::UserId, protocol::Report};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Watch a user's reports change status live.
#[derive(Parser, Debug)]
struct Args {
    /// Service endpoint, e.g. http://localhost:3000/v4. Defaults to settings.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    user_id: String,
    /// Request one new report after the initial listing.
    #[arg(long)]
    create: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("REPORTS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Args::parse();

    let user_id = parse_user_id(&args.user_id)?;
    let mut settings = load_settings();
    if let Some(url) = args.server_url.as_deref() {
        settings.server_url = normalize_server_url(url);
    }

    let session = ReportSession::connect(&settings, user_id).await?;
    info!(user_id = %session.user_id(), endpoint = %settings.server_url, "watching reports");

    if args.create {
        match session.create_report().await {
            Some(report) => println!("Created report {}", report.report_id),
            None => println!("Report creation failed; see log for details."),
        }
    }

    let mut snapshots = session.subscribe();
    let mut channel = session.watch_channel_state();
    print!("{}", render_reports(&snapshots.borrow_and_update()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !channel.borrow_and_update().is_closed() {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                print!("{}", render_reports(&snapshots.borrow_and_update()));
            }
            changed = channel.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let state = session.channel_state();
    if state.is_closed() {
        warn!(?state, "push channel closed; live updates stopped");
    }
    session.close();
    Ok(())
}

/// The login step: user ids are UUIDs, normalized to lowercase hyphenated form.
fn parse_user_id(raw: &str) -> Result<UserId> {
    let uuid = Uuid::parse_str(raw.trim())
        .with_context(|| format!("user id `{raw}` is not a valid UUID"))?;
    Ok(UserId::new(uuid.hyphenated().to_string()))
}

fn render_reports(reports: &[Arc<Report>]) -> String {
    let mut out = String::new();
    if reports.is_empty() {
        out.push_str("(no reports)\n");
        return out;
    }
    let _ = writeln!(out, "{:<38} {}", "REPORT", "STATUS");
    for report in reports {
        let _ = writeln!(
            out,
            "{:<38} {}",
            report.report_id.as_str(),
            report.report_status.as_str()
        );
    }
    out
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
