//! `marginalia` -- inspect and maintain annotations in the remote store.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia_client::{AnnotationApi, ClientConfig};
use marginalia_core::annotation::DocumentScope;

#[derive(Debug, Parser)]
#[command(name = "marginalia", version, about = "Inspect and maintain stored PDF annotations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Which document's annotations to operate on.
#[derive(Debug, Clone, Args)]
#[group(multiple = false)]
struct ScopeArgs {
    /// Course section id
    #[arg(long)]
    section: Option<String>,

    /// Summary id
    #[arg(long)]
    summary: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> Option<DocumentScope> {
        match (&self.section, &self.summary) {
            (Some(id), _) => Some(DocumentScope::Section(id.clone())),
            (None, Some(id)) => Some(DocumentScope::Summary(id.clone())),
            (None, None) => None,
        }
    }

    fn require(&self) -> anyhow::Result<DocumentScope> {
        self.scope()
            .context("one of --section or --summary is required")
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one page of annotations
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Print a single annotation
    Get { annotation_id: String },

    /// Delete annotations by store id (several ids use one bulk call)
    Delete {
        #[arg(required = true)]
        annotation_ids: Vec<String>,
    },

    /// Remove replies whose parent annotation no longer exists
    Prune {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Write every annotation of a document in viewer format
    Export {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marginalia=info,marginalia_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // --- Configuration ---
    let config = ClientConfig::from_env().context("Failed to load annotation API configuration")?;
    tracing::info!(base_url = %config.base_url, per_page = config.per_page, "Loaded client configuration");

    let api = AnnotationApi::from_config(&config).context("Failed to build annotation client")?;
    commands::run(&api, cli.command).await
}
