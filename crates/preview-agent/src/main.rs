use anyhow::Result;
use clap::Parser;
use preview_agent::cli::{self, Args};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = cli::resolve_config(&args)?;
    info!(
        analyzer = %config.analyzer,
        mode = %config.mode,
        max_attempts = config.heal.max_attempts,
        "Preview agent starting"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let report = cli::execute(&args.command, &config, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&report.body)?);

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
