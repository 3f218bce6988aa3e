//! A thin command-line front end over the Kestrel workflow kernel: compile
//! a workflow definition, or run one to completion and print its result.
//! The node types it knows about (`demo.echo`, `demo.delay`, `demo.fail`)
//! exist only to exercise the kernel — see [`handlers`].

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kestrel_compiler::compile;
use kestrel_config::KernelConfig;
use kestrel_core::{SystemClock, UserId};
use kestrel_supervisor::Supervisor;
use kestrel_workflow::Workflow;
use serde_json::Value;

use crate::handlers::demo_registry;

#[derive(Parser)]
#[command(name = "kestrel", about = "Kestrel workflow kernel demonstration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a workflow definition and report the plan's shape without running it.
    Validate {
        /// Path to a JSON workflow definition.
        workflow: PathBuf,
    },
    /// Compile and run a workflow definition to completion, printing its
    /// final control-plane snapshot.
    Run {
        /// Path to a JSON workflow definition.
        workflow: PathBuf,
        /// JSON input handed to the execution's entry nodes.
        #[arg(long, default_value = "{}")]
        input: String,
        /// Owning user id; a fresh one is generated if omitted.
        #[arg(long)]
        user: Option<String>,
        /// Path to a TOML kernel config overriding the built-in defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_workflow(path: &PathBuf) -> anyhow::Result<Workflow> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<KernelConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(KernelConfig::from_toml_str(&text)?)
        }
        None => Ok(KernelConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { workflow } => validate(&workflow),
        Command::Run { workflow, input, user, config } => run(&workflow, &input, user, config.as_ref()).await,
    }
}

fn validate(path: &PathBuf) -> anyhow::Result<()> {
    let workflow = load_workflow(path)?;
    let registry = demo_registry();
    let output = compile(&workflow, &registry, &[])?;

    println!(
        "compiled ok: {} node(s), {} entry, {} exit, {} warning(s)",
        output.plan.total_nodes(),
        output.plan.entry_nodes.len(),
        output.plan.exit_nodes.len(),
        output.warnings.len(),
    );
    for warning in &output.warnings {
        println!("  warning: {warning:?}");
    }
    Ok(())
}

async fn run(path: &PathBuf, input: &str, user: Option<String>, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    let workflow = load_workflow(path)?;
    let input: Value = serde_json::from_str(input)?;
    let user_id = match user {
        Some(raw) => UserId::parse(&raw)?,
        None => UserId::v4(),
    };
    let config = load_config(config_path)?;
    tracing::info!(
        default_timeout_ms = config.default_timeout_ms,
        event_bus_capacity = config.event_bus_capacity,
        "loaded kernel config"
    );

    let registry = Arc::new(demo_registry());
    let supervisor = Arc::new(Supervisor::new(registry, Arc::new(SystemClock)));

    let mut events = supervisor.events().subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::info!(?event, "kernel event");
        }
    });

    let handle = supervisor.start(workflow, user_id, input, &[]).await?;
    println!("started execution {} as user {user_id}", handle.execution_id);

    let poll_interval = Duration::from_millis(50);
    loop {
        match supervisor.status(handle.execution_id, user_id) {
            Ok(snapshot) if snapshot.state.is_terminal() => {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                break;
            }
            Ok(_) => tokio::time::sleep(poll_interval).await,
            Err(_) => {
                // Dropped from the active set the moment it went terminal.
                println!("execution {} finished", handle.execution_id);
                break;
            }
        }
    }

    Ok(())
}
