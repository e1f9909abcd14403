//! texloomd - document-generation workflow orchestrator
//!
//! Thin admin binary wiring the State Store, Task Dispatcher, Workflow
//! Driver, Signal/Result Intake, and Reconciler together.

use clap::Parser;
use eyre::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use texloom::cli::{Cli, Command, OutputFormat, SignalArg};
use texloom::config::Config;
use texloom::intake::{Intake, UserSignal, UserSignalRequest};
use texloom::{dispatcher, reconciler, state_store};
use texloom::{Driver, WorkflowResult};

fn setup_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();
    info!("logging initialized");
    Ok(())
}

fn into_user_signal(arg: SignalArg) -> UserSignal {
    match arg {
        SignalArg::Validated => UserSignal::Validated,
        SignalArg::Redo => UserSignal::Redo,
        SignalArg::QcOk => UserSignal::QcOk,
        SignalArg::ProblemDetected => UserSignal::ProblemDetected,
        SignalArg::AllApproved => UserSignal::AllApproved,
        SignalArg::CancelProject => UserSignal::CancelProject,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("failed to set up logging")?;

    let config = Config::load(cli.config.as_ref()).context("failed to load configuration")?;
    info!(store_path = %config.store.path.display(), "texloomd starting");

    let raw_store = texloom_store::Store::open(&config.store.path)
        .with_context(|| format!("failed to open store at {}", config.store.path.display()))?;
    let store = state_store::spawn(raw_store, 256);
    let dispatcher_handle = dispatcher::spawn(store.clone(), config.dispatcher.clone());
    let driver = Driver::new(store.clone(), dispatcher_handle.clone(), config.driver.clone());

    match cli.command {
        None | Some(Command::Serve) => {
            let _reconciler = reconciler::spawn(
                store.clone(),
                dispatcher_handle.clone(),
                config.driver.clone(),
                config.reconciler.clone(),
            );
            println!(
                "texloomd serving: store={}, reconcile every {}s. Ctrl-C to stop.",
                config.store.path.display(),
                config.reconciler.interval_s
            );
            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            dispatcher_handle.shutdown().await;
        }

        Some(Command::Signal {
            client_id,
            project_id,
            signal,
            version_id,
            block_id,
        }) => {
            let intake = Intake::new(store.clone(), dispatcher_handle.clone(), driver);
            let req = UserSignalRequest {
                client_id,
                project_id,
                version_id,
                block_id,
                signal: into_user_signal(signal),
                feedback: None,
                qc_report: None,
                new_element: None,
            };
            let receipt = intake.submit_user_signal(req).await?;
            println!("{:?}: {:?}", receipt.outcome, receipt.detail);
        }

        Some(Command::Status { project_id, format }) => {
            print_status(&store, &project_id, format).await?;
        }

        Some(Command::Metrics { format }) => {
            let snapshot = dispatcher_handle.metrics();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                OutputFormat::Text => {
                    println!("submitted:          {}", snapshot.submitted);
                    println!("absorbed duplicates: {}", snapshot.absorbed_duplicates);
                    println!("retried:            {}", snapshot.retried);
                    println!("exhausted:          {}", snapshot.exhausted);
                }
            }
        }
    }

    Ok(())
}

async fn print_status(
    store: &texloom::StateStoreHandle,
    project_id: &str,
    format: OutputFormat,
) -> WorkflowResult<()> {
    let project = store.get_project(project_id).await?.value;
    let blocks = if project.current_step.is_empty() {
        Vec::new()
    } else {
        store.list_blocks_by_version(&project.current_step, None).await?
    };

    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "project": project,
                "blocks": blocks.iter().map(|s| &s.value).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap());
        }
        OutputFormat::Text => {
            println!("{} [{}] mode={:?} status={:?}", project.title, project.id, project.mode, project.status);
            for stored in &blocks {
                let block = &stored.value;
                println!("  {} slot={} status={:?}", block.id, block.slot_id, block.status);
            }
        }
    }
    Ok(())
}
