mod display;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use ecoscan_core::config::{self, AnalysisConfig};
use ecoscan_core::gateway::providers::{generator_from_env, OfflineGenerator};
use ecoscan_core::{ContentGenerator, GitSource, LocalSource, Pipeline, PipelineEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ecoscan",
    version,
    about = "ecoscan: repository sustainability analyzer",
    long_about = "Measure the resource footprint of a web project, run static and AI-assisted \
                  sustainability checks, and rank the findings by impact."
)]
struct Cli {
    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a local directory or a remote git repository
    Analyze {
        /// Directory to analyze, or a repository URL
        target: String,

        /// Treat TARGET as a git URL and shallow-clone it
        #[arg(long)]
        git: bool,

        /// Output format (text, or json for one event per line)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Config file (defaults to ecoscan.toml at the analyzed root)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip the generation service entirely
        #[arg(long)]
        offline: bool,
    },

    /// List the sustainability guidelines and their weights
    Guidelines {
        /// Config file whose [weights] overrides are applied
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Analyze {
            target,
            git,
            format,
            config,
            offline,
        } => {
            let succeeded = cmd_analyze(&target, git, format, config.as_deref(), offline).await?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Guidelines { config } => cmd_guidelines(config.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ecoscan", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn looks_like_remote(target: &str) -> bool {
    target.starts_with("https://")
        || target.starts_with("http://")
        || target.starts_with("ssh://")
        || target.starts_with("git@")
}

fn resolve_config(explicit: Option<&Path>, local_root: Option<&Path>) -> Result<AnalysisConfig> {
    let base = match (explicit, local_root) {
        (Some(path), _) => config::load_config(path)?,
        (None, Some(root)) if root.is_dir() => config::load_config_for_tree(root)?,
        _ => AnalysisConfig::default(),
    };
    base.with_env_overrides()
        .context("Invalid ECOSCAN_* environment override")
}

fn select_generator(config: &AnalysisConfig, offline: bool) -> Result<Arc<dyn ContentGenerator>> {
    let generator: Arc<dyn ContentGenerator> = if offline {
        Arc::new(OfflineGenerator)
    } else {
        generator_from_env(
            config.gateway.model.as_deref(),
            Duration::from_millis(config.gateway.request_timeout_ms),
        )?
    };
    tracing::debug!(
        generator = generator.name(),
        model = config.gateway.model.as_deref().unwrap_or("default"),
        "generator selected"
    );
    Ok(generator)
}

async fn cmd_analyze(
    target: &str,
    git: bool,
    format: OutputFormat,
    config_path: Option<&Path>,
    offline: bool,
) -> Result<bool> {
    let remote = git || looks_like_remote(target);
    let local_root = (!remote).then(|| Path::new(target));
    let config = resolve_config(config_path, local_root)?;
    tracing::debug!(
        target,
        remote,
        config_file = ?config_path,
        max_attempts = config.gateway.max_attempts,
        request_timeout_ms = config.gateway.request_timeout_ms,
        "configuration resolved"
    );

    let generator = select_generator(&config, offline)?;

    let pipeline = Pipeline::new(config, generator);
    let mut stream = if remote {
        pipeline.run(GitSource::new(target))
    } else {
        pipeline.run(LocalSource::new(target))
    };

    if format == OutputFormat::Text {
        display::print_banner(target);
    }

    let mut succeeded = true;
    while let Some(event) = stream.next().await {
        if matches!(event, PipelineEvent::Error { .. }) {
            succeeded = false;
        }
        match format {
            OutputFormat::Json => {
                let line = serde_json::to_string(&event).context("Failed to serialize event")?;
                println!("{}", line);
            }
            OutputFormat::Text => display::print_event(&event),
        }
    }

    Ok(succeeded)
}

fn cmd_guidelines(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::load_config(path)?,
        None => AnalysisConfig::default(),
    };
    display::print_guidelines(&config.guidelines());
    Ok(())
}
