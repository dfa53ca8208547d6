use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use graph_of_operations::{
    config::{Config, LogFormat},
    langbase::LangbaseModel,
    language_model::{LanguageModel, ReplayModel},
    operations::Validation,
    prompts::SYSTEM_PROMPT,
    thought::state_from_value,
    workflows, Controller, GraphOfOperations, JsonPrompter, JsonResponseParser,
};

/// Run a prebuilt graph of operations over a problem description.
#[derive(Debug, Parser)]
#[command(name = "got-engine", version, about)]
struct Cli {
    /// Workflow graph to run
    #[arg(long, value_enum)]
    workflow: Workflow,

    /// JSON object with the problem parameters
    #[arg(long)]
    problem: PathBuf,

    /// Write the graph snapshot here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Replay completions from a JSON array of strings instead of calling Langbase
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Completions requested per generate prompt
    #[arg(long, default_value_t = 3)]
    branches: usize,

    /// Thoughts kept by best-of-n and refined, attempts for validated, parts for partitioned
    #[arg(long, default_value_t = 1)]
    keep: usize,

    /// Refinement cap per thought for the refined workflow
    #[arg(long, default_value_t = 2)]
    max_refinements: u64,

    /// Array key split by the partitioned workflow
    #[arg(long, default_value = "documents")]
    partition_key: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Workflow {
    BestOfN,
    Validated,
    Partitioned,
    Refined,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        workflow = ?cli.workflow,
        "Graph-of-Operations engine starting..."
    );

    let raw = std::fs::read_to_string(&cli.problem)
        .with_context(|| format!("reading problem file {}", cli.problem.display()))?;
    let problem: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing problem file {}", cli.problem.display()))?;
    if !problem.is_object() {
        anyhow::bail!("problem file must hold a JSON object");
    }

    let graph = build_graph(&cli)?;
    let lm = build_model(&cli, &config).await?;

    let mut controller = Controller::new(
        lm,
        graph,
        Arc::new(JsonPrompter::new()),
        Arc::new(JsonResponseParser::new()),
        state_from_value(problem),
    );

    if let Err(e) = controller.run().await {
        error!(error = %e, "Run aborted");
        if let Some(path) = &cli.output {
            controller.output_graph(path)?;
        }
        return Err(e.into());
    }

    let trace = controller.trace();
    info!(
        run_id = %trace.run_id,
        completed = trace.completed,
        thoughts = trace.thoughts_produced,
        "Run finished"
    );

    if let Some(path) = &cli.output {
        controller.output_graph(path)?;
    }

    let finals: Vec<Vec<serde_json::Value>> = controller
        .final_thoughts()?
        .into_iter()
        .map(|leaf| {
            leaf.into_iter()
                .map(|t| serde_json::Value::Object(t.state().clone()))
                .collect()
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&finals)?);

    Ok(())
}

fn build_graph(cli: &Cli) -> anyhow::Result<GraphOfOperations> {
    let graph = match cli.workflow {
        Workflow::BestOfN => workflows::best_of_n(cli.branches, cli.keep, None)?,
        Workflow::Validated => {
            workflows::validated_refinement(cli.branches, cli.keep.max(1), None, Validation::LanguageModel)?
        }
        Workflow::Partitioned => {
            workflows::partitioned_merge(&cli.partition_key, cli.keep.max(1), cli.branches, None)?
        }
        Workflow::Refined => {
            workflows::refined_aggregation(cli.branches, cli.keep, cli.max_refinements, None)?
        }
    };
    Ok(graph)
}

async fn build_model(cli: &Cli, config: &Config) -> anyhow::Result<Arc<dyn LanguageModel>> {
    if let Some(path) = &cli.replay {
        info!(path = %path.display(), "Replaying scripted completions");
        return Ok(Arc::new(ReplayModel::from_file(path)?));
    }

    let model = LangbaseModel::new(&config.langbase, config.request.clone(), config.model.clone())?;
    info!(base_url = %config.langbase.base_url, pipe = %config.model.pipe, "Langbase model initialized");

    // Ensure the pipe exists (create if needed)
    if let Err(e) = model.ensure_pipe(SYSTEM_PROMPT).await {
        error!(error = %e, "Failed to ensure pipe exists");
        return Err(e.into());
    }
    Ok(Arc::new(model))
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
