//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use repodocs_core::{DocsService, GenerateRequest};
use repodocs_jobs::JobEvent;
use repodocs_shared::{JobId, init_config, load_config, validate_api_key};
use repodocs_synth::GeminiClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// repodocs — AI documentation for remote repositories.
#[derive(Parser)]
#[command(
    name = "repodocs",
    version,
    about = "Generate structured AI documentation from a GitHub repository.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate documentation for a repository.
    Generate {
        /// Repository owner (user or organization).
        #[arg(short, long)]
        owner: String,

        /// Repository name.
        #[arg(short, long)]
        repo: String,

        /// GitHub access token.
        #[arg(short, long, env = "GITHUB_TOKEN")]
        token: String,

        /// Include test and spec files in the analysis.
        #[arg(long)]
        include_tests: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "repodocs=info",
        1 => "repodocs=debug",
        _ => "repodocs=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            owner,
            repo,
            token,
            include_tests,
        } => cmd_generate(owner, repo, token, include_tests).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    owner: String,
    repo: String,
    token: String,
    include_tests: bool,
) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_api_key(&config)?;

    let completion = Arc::new(GeminiClient::from_config(&config.completion)?);
    let service = DocsService::new(config, completion);

    info!(owner, repo, include_tests, "generating documentation");

    // Subscribe before triggering so no progress event is missed.
    let job_id = JobId::derive(&owner, &repo, &token);
    let mut rx = service.bus().subscribe(&job_id);

    let bar = ProgressBar::new(100).with_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {wide_msg}")
            .expect("progress template"),
    );
    let bar_handle = bar.clone();
    let progress_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                JobEvent::Progress(event) => {
                    if let Some(p) = event.progress {
                        if p >= 0 {
                            bar_handle.set_position(p as u64);
                        }
                    }
                    bar_handle.set_message(event.message);
                }
                // Terminal outcome: the generate call below reports it.
                JobEvent::Completed(_) | JobEvent::Failed(_) => break,
            }
        }
    });

    let result = service
        .generate(GenerateRequest {
            owner,
            repo,
            token,
            include_tests,
        })
        .await;

    // A request rejected before job creation publishes nothing, so don't
    // wait on the forwarder.
    progress_task.abort();
    bar.finish_and_clear();

    match result {
        Ok(docs) => {
            println!("{}", serde_json::to_string_pretty(&docs.documentation)?);
            Ok(())
        }
        Err(err) => Err(eyre!("documentation generation failed: {err}")),
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
