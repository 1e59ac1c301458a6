mod bootstrap;
mod config;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use ai_llm_service::telemetry;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use contextor::{IndicatifObserver, TurnAnswer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bootstrap::{Runtime, bootstrap, model_profiles};
use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "filtered-rag", version, about = "Metadata-filtered retrieval over personal documents")]
struct Cli {
    /// TOML config file (overrides $FILTERED_RAG_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output from pipeline crates (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "API_ADDRESS")]
        address: Option<String>,
    },
    /// Ingest a directory of documents.
    Ingest {
        /// Defaults to the configured ingest root.
        path: Option<PathBuf>,
        #[arg(long)]
        no_cluster: bool,
        /// Classify documents without a jurisdiction tag.
        #[arg(long)]
        classify: bool,
    },
    /// Answer one question.
    Ask {
        question: String,
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Print the full turn as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Interactive question loop; `exit` or EOF ends it.
    Chat,
    /// Probe the configured model endpoints.
    Health,
}

impl Cli {
    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; a broken one is reported once logging is up.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(telemetry::env_filter_with_level("warn", cli.log_level()))
        .with(telemetry::layer())
        .try_init()
        .context("failed to install tracing subscriber")?;
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, ".env could not be loaded");
        }
    }

    let mut cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Serve { address } => {
            let rt = bootstrap(cfg, false).await?;
            let address = address.unwrap_or_else(|| rt.cfg.server.address().to_string());
            api::start(rt.app_state(), &address).await?;
        }
        Command::Ingest {
            path,
            no_cluster,
            classify,
        } => {
            cfg.ingest.cluster &= !no_cluster;
            cfg.ingest.classify |= classify;
            let root = match path.or_else(|| cfg.server.ingest_root.clone()) {
                Some(p) => p,
                None => bail!("no path given and no ingest root configured"),
            };
            let rt = bootstrap(cfg, true).await?;
            let report = rt.ingestion.run(&root).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Ask {
            question,
            timeout_secs,
            json,
        } => {
            let rt = bootstrap(cfg, false).await?;
            let answer = ask(&rt, &question, timeout_secs).await?;
            print_answer(&answer, json)?;
        }
        Command::Chat => {
            let rt = bootstrap(cfg, false).await?;
            chat(&rt).await?;
        }
        Command::Health => {
            let statuses = model_profiles(&cfg)?.health_all().await;
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            if statuses.iter().any(|s| !s.ok) {
                bail!("one or more model endpoints are unhealthy");
            }
        }
    }
    Ok(())
}

async fn ask(rt: &Runtime, question: &str, timeout_secs: Option<u64>) -> anyhow::Result<TurnAnswer> {
    let deadline = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| rt.cfg.turn.turn_timeout());
    let observer = IndicatifObserver::spinner();
    Ok(rt
        .orchestrator
        .respond_observed(question, &observer, deadline)
        .await?)
}

fn print_answer(answer: &TurnAnswer, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }
    println!("{}", answer.answer);
    if let Some(reason) = &answer.degraded_rerank {
        println!("\n(rerank degraded: {reason})");
    }
    if !answer.context.is_empty() {
        println!("\nSources:");
        for c in &answer.context {
            println!("  [{:.3}] {} #{}", c.score, c.source_path, c.chunk_index);
        }
    }
    Ok(())
}

async fn chat(rt: &Runtime) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        match ask(rt, line, None).await {
            Ok(answer) => print_answer(&answer, false)?,
            Err(e) => eprintln!("error: {e:#}"),
        }
        println!();
    }
    Ok(())
}
