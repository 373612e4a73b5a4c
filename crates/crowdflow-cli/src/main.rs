use std::path::{Path, PathBuf};

use clap::Parser;
use owo_colors::OwoColorize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crowdflow::hub::{Failure, WorkerPool};
use crowdflow::{
    connect, EngineConfig, HubConfig, JobId, JobSubmission, Optimizer, SolverId, SolverOutput, SolverRef,
    TafweejOptimizer,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "crowdflow")]
#[command(version)]
#[command(about = "Crowd-flow scheduling and optimization job hub")]
#[command(propagate_version = true)]
struct Args {
    /// Hub configuration file (TOML or YAML); defaults apply when omitted
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run polling workers until interrupted
    Worker {
        /// Override the configured number of workers
        #[arg(long, short = 'w')]
        workers: Option<usize>,
    },

    /// Solve one scheduling problem from a JSON file and print the result
    Solve {
        /// Problem payload, keyed or positional, optionally wrapped in `data`
        file: PathBuf,
    },

    /// Queue a job in the configured store
    Submit {
        /// Solver id or name
        #[arg(long, short = 's')]
        solver: String,

        /// Submitting user
        #[arg(long, default_value = "0")]
        user: i64,

        /// Job input JSON
        file: PathBuf,
    },

    /// Show a job and its result
    Status {
        job_id: i64,
    },

    /// List the solver catalog
    Solvers,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn load_config(path: Option<&Path>) -> CliResult<HubConfig> {
    match path {
        Some(path) => Ok(HubConfig::load(path)?),
        None => Ok(HubConfig::new()),
    }
}

fn read_json(path: &Path) -> CliResult<Value> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&contents)?)
}

fn parse_solver_ref(raw: &str) -> SolverRef {
    match raw.trim().parse::<i64>() {
        Ok(id) => SolverRef::Id(SolverId(id)),
        Err(_) => SolverRef::Name(raw.trim().to_string()),
    }
}

fn print_json(value: &Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_worker(config: HubConfig, workers: Option<usize>) -> CliResult<()> {
    let config = match workers {
        Some(count) => config.with_worker_count(count),
        None => config,
    };
    config.validate()?;
    let manager = connect(&config).await?;

    let token = CancellationToken::new();
    let pool = WorkerPool::spawn(manager, &config.worker, token.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, finishing jobs in flight");
    token.cancel();

    let stats = pool.join().await;
    print_json(&serde_json::to_value(stats)?)
}

/// Runs the built-in scheduler on the blocking pool.
async fn solve_payload(engine: EngineConfig, input: Value) -> CliResult<SolverOutput> {
    let payload = input.get("data").cloned().unwrap_or(input);
    let optimizer = TafweejOptimizer::new(engine);
    Ok(tokio::task::spawn_blocking(move || optimizer.optimize(&payload)).await?)
}

async fn run_solve(config: &HubConfig, file: &Path) -> CliResult<()> {
    let input = read_json(file)?;
    match solve_payload(config.engine.clone(), input).await? {
        SolverOutput::Error(failure) => {
            let failure = Failure::from(failure);
            eprintln!("{} {}", "error:".bright_red().bold(), failure.message);
            print_json(&failure.to_payload())?;
            std::process::exit(1);
        }
        output => {
            let result = output
                .to_payload()
                .ok_or("solver output could not be serialized")?;
            print_json(&result)
        }
    }
}

async fn run_submit(config: &HubConfig, solver: &str, user: i64, file: &Path) -> CliResult<()> {
    let input = read_json(file)?;
    let manager = connect(config).await?;
    let submission = JobSubmission::new(parse_solver_ref(solver), input).with_user(user);
    let job = manager.store().submit(submission).await?;
    print_json(&serde_json::json!({ "job_id": job.id, "status": job.status }))
}

async fn run_status(config: &HubConfig, job_id: i64) -> CliResult<()> {
    let manager = connect(config).await?;
    match manager.store().get(JobId(job_id)).await? {
        Some(job) => print_json(&serde_json::to_value(job)?),
        None => Err(format!("job {} not found", job_id).into()),
    }
}

async fn run_solvers(config: &HubConfig) -> CliResult<()> {
    let manager = connect(config).await?;
    for descriptor in manager.registry().descriptors() {
        println!(
            "{:>4}  {:<24} {}",
            descriptor.id.0.to_string().bright_yellow(),
            descriptor.name.bright_cyan(),
            descriptor.description.as_deref().unwrap_or("").white()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Worker { workers } => {
            crowdflow::console::init();
            run_worker(config, workers).await
        }
        Commands::Solve { file } => {
            crowdflow::console::init();
            run_solve(&config, &file).await
        }
        Commands::Submit { solver, user, file } => run_submit(&config, &solver, user, &file).await,
        Commands::Status { job_id } => run_status(&config, job_id).await,
        Commands::Solvers => run_solvers(&config).await,
    }
}
