use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use hat_agents::report::{render_event, render_result};
use hat_agents::{build_engine, check_endpoint, AppConfig};
use hat_coordination::{ChatMessage, PhaseEngine, WorkflowEvent, WorkflowRequest, WorkflowResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Six Thinking Hats with a budgeted web-search layer.
#[derive(Parser, Debug)]
#[command(name = "hat-agents", version, about)]
struct Cli {
    /// Answer one query and exit; omit for the interactive loop.
    #[arg(short, long)]
    query: Option<String>,

    /// Print progress as each phase and hat completes.
    #[arg(long)]
    stream: bool,

    /// Print the full result as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Override the per-query lookup budget.
    #[arg(long)]
    budget: Option<usize>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Check that the model endpoint is reachable and exit.
    #[arg(long)]
    check: bool,
}

const QUIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(budget) = cli.budget {
        config.workflow.lookup_budget = budget;
    }

    info!(
        model = %config.model.model,
        model_url = %config.model.base_url,
        search_url = %config.search.base_url,
        budget = config.workflow.lookup_budget,
        "hat-agents starting"
    );

    if cli.check {
        if check_endpoint(&config.model.base_url).await {
            println!("model endpoint reachable: {}", config.model.base_url);
            return Ok(());
        }
        bail!("model endpoint unreachable: {}", config.model.base_url);
    }

    let engine = build_engine(&config)?;

    match cli.query.clone() {
        Some(query) => {
            run_once(&engine, WorkflowRequest::new(query), &cli).await?;
        }
        None => interactive(&engine, &cli).await?,
    }
    Ok(())
}

async fn run_once(engine: &PhaseEngine, request: WorkflowRequest, cli: &Cli) -> Result<WorkflowResult> {
    let result = if cli.stream {
        let mut rx = engine.stream(request);
        let mut finished = None;
        while let Some(event) = rx.recv().await {
            match event {
                WorkflowEvent::Complete(result) => {
                    finished = Some(*result);
                }
                WorkflowEvent::Aborted { error } => bail!("workflow aborted: {error}"),
                progress => {
                    if !cli.json {
                        println!("{}", render_event(&progress));
                    }
                }
            }
        }
        finished.context("workflow ended without a result")?
    } else {
        engine.run_request(request).await?
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_result(&result));
    }
    Ok(result)
}

/// Read queries until EOF or a quit word. Each answer joins the history
/// forwarded with the next query.
async fn interactive(engine: &PhaseEngine, cli: &Cli) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut history: Vec<ChatMessage> = Vec::new();

    println!("Six Thinking Hats. Type a question, or 'quit' to exit.");
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&query.to_lowercase().as_str()) {
            break;
        }

        let request = WorkflowRequest::new(query).with_history(history.clone());
        match run_once(engine, request, cli).await {
            Ok(result) => {
                history.push(ChatMessage::user(query));
                history.push(ChatMessage::assistant(result.final_output));
            }
            Err(e) => warn!(error = %e, "query failed"),
        }
    }

    let stats = engine.orchestrator().statistics();
    info!(
        provider_calls = stats.totals.provider_calls,
        cache_hits = stats.totals.cache_hits,
        cache_hit_rate = stats.cache_hit_rate,
        "session finished"
    );
    Ok(())
}
