//! Form Studio - check form configs and replay sessions against them

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_studio::config::StudioConfig;
use form_studio::forms::{FormConfig, FormSchema, ValidatorRegistry};
use form_studio::hooks::TracingHooks;
use form_studio::session::{self, FormSession, SharedSession};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "form-studio", version, about)]
struct Cli {
    /// Tracing filter, e.g. `form_studio=debug`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate a form config
    Check { config: PathBuf },
    /// Run a JSON list of session events against a form config
    Replay { config: PathBuf, script: PathBuf },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport {
    events: Vec<session::EventOutcome>,
    session: session::SessionSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted: Option<std::collections::BTreeMap<String, serde_json::Value>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let studio = StudioConfig::load().unwrap_or_else(|err| {
        eprintln!("Ignoring unreadable config: {err}");
        StudioConfig::default()
    });

    // Initialize logging
    let default_filter = cli
        .log
        .clone()
        .or_else(|| studio.log_filter.clone())
        .unwrap_or_else(|| "form_studio=info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Command::Check { config } => check(&config, &studio),
        Command::Replay { config, script } => replay(&config, &script, &studio).await,
    }
}

fn load_schema(path: &Path, studio: &StudioConfig) -> Result<FormSchema> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read form config {}", path.display()))?;
    let mut config = FormConfig::from_json(&content)
        .with_context(|| format!("Failed to parse form config {}", path.display()))?;
    studio.apply(&mut config);
    FormSchema::new(config, ValidatorRegistry::new())
        .with_context(|| format!("Invalid form config {}", path.display()))
}

fn check(path: &Path, studio: &StudioConfig) -> Result<()> {
    let schema = load_schema(path, studio)?;
    println!("{} ({})", schema.config().title, schema.id());
    println!("  layout:   {}", schema.config().layout);
    println!("  fields:   {}", schema.fields().len());
    println!("  sections: {}", schema.sections().len());
    for (i, step) in schema.steps().iter().enumerate() {
        let conditional = if step.skip_if.is_empty() { "" } else { " (conditional)" };
        println!(
            "  step {i}: {} [{}]{conditional}",
            step.id,
            step.field_ids.join(", ")
        );
    }
    Ok(())
}

async fn replay(config: &Path, script: &Path, studio: &StudioConfig) -> Result<()> {
    let schema = load_schema(config, studio)?;
    let content = fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let events = session::parse_script(&content)
        .with_context(|| format!("Failed to parse script {}", script.display()))?;

    let hooks = Arc::new(TracingHooks::new());
    let shared = SharedSession::new(FormSession::new(Arc::new(schema), hooks.clone()));
    let outcomes = session::replay(&shared, events).await;

    let report = ReplayReport {
        events: outcomes,
        session: shared.snapshot().await,
        submitted: hooks.submitted().map(|payload| payload.into_iter().collect()),
    };
    let output = if studio.pretty() {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}
