use clap::Parser;
use colored::*;
use eyre::Context;
use log::info;
use std::fs;
use std::path::PathBuf;

use ralph::RalphError;
use ralph::agent::CommandAgentRunner;
use ralph::checkpoint::CheckpointStore;
use ralph::cli::{Cli, Commands};
use ralph::config::RunConfig;
use ralph::domain::{RunOutcome, RunStatus};
use ralph::runloop::RunLoopController;

fn setup_logging() -> eyre::Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ralph")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ralph.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli) -> Result<i32, RalphError> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { task } => handle_run_command(cli, task.as_deref(), false).await,
        Commands::Resume => handle_run_command(cli, None, true).await,
        Commands::Status { detailed } => handle_status_command(cli, *detailed),
    }
}

async fn handle_run_command(cli: &Cli, task_override: Option<&str>, resume: bool) -> Result<i32, RalphError> {
    let mut config = RunConfig::load(cli.config.as_ref())?;
    if let Some(task) = task_override {
        config.task = task.to_string();
    }

    let runner = CommandAgentRunner::new(config.agent.command.clone(), config.agent.args.clone());
    let controller = RunLoopController::new(config, runner)?;

    // Make Ctrl+C observable at iteration boundaries and blocking waits
    let cancel = controller.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, aborting run");
            cancel.cancel();
        }
    });

    let outcome = if resume {
        println!("{}", "Resuming run...".cyan());
        controller.resume().await?
    } else {
        println!("{}", "Starting run...".cyan());
        controller.start().await?
    };

    print_outcome(&outcome);
    Ok(exit_code_for_status(outcome.status))
}

fn handle_status_command(cli: &Cli, detailed: bool) -> Result<i32, RalphError> {
    let config = RunConfig::load(cli.config.as_ref())?;
    let store = CheckpointStore::new(&config.checkpoint_path);
    let checkpoint = store.load()?;
    let state = &checkpoint.state;

    println!("{} {}", "Run:".green(), state.run_id);
    println!("  Task:       {}", state.task);
    println!("  Status:     {:?}", state.status);
    println!("  Iteration:  {}", state.iteration);
    println!("  Attempts:   {}", state.history.len());
    println!("  Saved at:   {}", checkpoint.saved_at.to_rfc3339());

    if let Some(last) = state.last_record() {
        println!(
            "  Last:       iteration {} attempt {} -> {:?}",
            last.iteration, last.attempt, last.outcome
        );
    }

    if detailed {
        for record in &state.history {
            println!(
                "  [{}.{}] {:?} (exit {:?})",
                record.iteration, record.attempt, record.outcome, record.exit_status
            );
        }
    }

    Ok(0)
}

fn print_outcome(outcome: &RunOutcome) {
    let line = match outcome.status {
        RunStatus::Succeeded => outcome.summary.green(),
        RunStatus::Failed => outcome.summary.red(),
        RunStatus::Aborted => outcome.summary.yellow(),
        RunStatus::Running => outcome.summary.normal(),
    };
    println!("{}", line);
}

fn exit_code_for_status(status: RunStatus) -> i32 {
    match status {
        RunStatus::Succeeded => 0,
        RunStatus::Failed => 1,
        RunStatus::Aborted => 130,
        RunStatus::Running => 3,
    }
}

fn exit_code_for_error(err: &RalphError) -> i32 {
    match err {
        RalphError::ConfigInvalid(_) => 2,
        _ => 3,
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    info!("Starting with config from: {:?}", cli.config);

    let code = match run_application(&cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {}", "error:".red(), err);
            exit_code_for_error(&err)
        }
    };

    std::process::exit(code)
}
