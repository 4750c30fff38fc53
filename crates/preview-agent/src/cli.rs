//! Command-line surface: one subcommand per pipeline entry point.
//!
//! Every command prints a JSON report on stdout and reports success so the
//! binary can map it to an exit code.

use crate::config::AgentConfig;
use crate::generator::HttpCodeGenerator;
use crate::loader;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipeline::{
    build_analyzer, FileSet, OutputValidator, PipelineConfig, PipelineRunner, PreviewService,
    SelfHealOrchestrator, SyntaxValidator,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Pipeline configuration file (TOML). `PREVIEW_*` env vars override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Entry module to prefer over detection
    #[arg(long, global = true)]
    pub entry: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the syntax and output validators
    Validate {
        /// Project directory or JSON file map
        input: PathBuf,
    },
    /// Resolve and bundle the file set
    Bundle { input: PathBuf },
    /// Run one full pass, including the headless preview
    Preview { input: PathBuf },
    /// Run the pipeline and regenerate failing files until they pass
    Heal {
        input: PathBuf,

        /// Prompt the files were generated from
        #[arg(long)]
        prompt: String,

        /// Session id (random when omitted)
        #[arg(long)]
        session: Option<String>,

        /// Override the regeneration attempt cap
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

impl Command {
    pub fn input(&self) -> &Path {
        match self {
            Self::Validate { input }
            | Self::Bundle { input }
            | Self::Preview { input }
            | Self::Heal { input, .. } => input,
        }
    }
}

/// Result of one command.
#[derive(Debug, Clone)]
pub struct Report {
    pub success: bool,
    pub body: Value,
}

/// Load configuration: TOML file, then env, then CLI flags.
pub fn resolve_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::resolve(args.config.as_deref())
        .context("Failed to load pipeline configuration")?;
    if let Some(entry) = &args.entry {
        config.entry = Some(entry.clone());
    }
    if let Command::Heal {
        max_attempts: Some(max),
        ..
    } = &args.command
    {
        config.heal.max_attempts = *max;
    }
    Ok(config)
}

pub async fn execute(
    command: &Command,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<Report> {
    let files = loader::load(command.input())?;
    info!(input = %command.input().display(), files = files.len(), "Loaded file set");

    match command {
        Command::Validate { .. } => Ok(validate(&files, config)),
        Command::Bundle { .. } => bundle(&files, config),
        Command::Preview { .. } => {
            let preview = Arc::new(PreviewService::new(config.preview.clone()));
            let runner = PipelineRunner::new(config, Arc::clone(&preview));
            let pass = runner.run(&files, 0, cancel).await;
            preview.shutdown().await?;
            let pass = pass?;
            Ok(Report {
                success: pass.is_valid(),
                body: serde_json::to_value(&pass)?,
            })
        }
        Command::Heal {
            prompt, session, ..
        } => {
            let preview = Arc::new(PreviewService::new(config.preview.clone()));
            let runner = Arc::new(PipelineRunner::new(config, Arc::clone(&preview)));
            let generator = HttpCodeGenerator::new(AgentConfig::default())?;
            info!(
                endpoint = %generator.config().url,
                model = %generator.config().model,
                "Regeneration collaborator configured"
            );
            let orchestrator =
                SelfHealOrchestrator::new(runner, Arc::new(generator), config.heal.clone());
            let session_id = session
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let outcome = orchestrator.heal(&session_id, prompt, files, cancel).await;
            preview.shutdown().await?;
            let outcome = outcome?;
            Ok(Report {
                success: outcome.is_valid,
                body: serde_json::to_value(&outcome)?,
            })
        }
    }
}

/// Syntax repair plus project-convention checks over the repaired set.
pub fn validate(files: &FileSet, config: &PipelineConfig) -> Report {
    let analyzer = build_analyzer(config.analyzer);
    let syntax = SyntaxValidator::new(Arc::clone(&analyzer)).validate(files);
    let repaired = files.overlay(syntax.fixed_files.iter().cloned());
    let quality = OutputValidator::new(analyzer, config.quality.clone()).validate(&repaired);
    Report {
        success: syntax.is_valid && quality.is_valid,
        body: json!({
            "isValid": syntax.is_valid && quality.is_valid,
            "syntax": syntax,
            "quality": quality,
        }),
    }
}

pub fn bundle(files: &FileSet, config: &PipelineConfig) -> Result<Report> {
    let bundler = pipeline::Bundler::new(config.bundle.clone());
    Ok(match bundler.bundle(files, config.entry.as_deref()) {
        Ok(artifact) => Report {
            success: true,
            body: serde_json::to_value(&artifact)?,
        },
        Err(error) => Report {
            success: false,
            body: json!({ "error": error }),
        },
    })
}
