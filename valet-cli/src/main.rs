//! Valet CLI - inspect and exercise the assistant's tools

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use valet_core::config::ValetConfig;
use valet_core::memory::{self, MemoryClient};
use valet_core::observability::init_tracing;
use valet_core::platform::{Platform, SimulatedPlatform};
use valet_core::session::AssistantSession;

#[derive(Parser)]
#[command(name = "valet")]
#[command(about = "Valet voice assistant tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the standard search path)
    #[arg(short, long, global = true, env = "VALET_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Run against a simulated desktop instead of the real one
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tool commands
    Tools {
        #[command(subcommand)]
        command: ToolCommands,
    },
    /// Report which desktop controls work on this system
    Health,
    /// Memory commands
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum ToolCommands {
    /// List enabled tools
    List {
        /// Include disabled tools
        #[arg(short, long)]
        all: bool,
    },
    /// Call a tool by name
    Call {
        /// Tool name
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Print stored memories
    Show {
        /// User to look up (defaults to assistant.user_id)
        #[arg(short, long)]
        user: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ValetConfig> {
    let config = match path {
        Some(path) => ValetConfig::from_file(path)?,
        None => ValetConfig::load()?,
    };
    Ok(config)
}

fn platform(simulate: bool) -> Platform {
    if simulate {
        SimulatedPlatform::new().platform()
    } else {
        Platform::system()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("valet {}", env!("CARGO_PKG_VERSION"));
        println!("valet-core {}", valet_core::VERSION);
        return Ok(());
    }

    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);
    tracing::debug!(simulate = cli.simulate, "Configuration loaded");

    match cli.command {
        Commands::Version => {}
        Commands::Tools { command } => {
            let session = AssistantSession::start(config, platform(cli.simulate)).await?;
            match command {
                ToolCommands::List { all } => {
                    for (definition, enabled) in session.tool_menu() {
                        if !all && !enabled {
                            continue;
                        }
                        let marker = if enabled { "*" } else { " " };
                        println!("{} {:<18} {}", marker, definition.name, definition.description);
                    }
                }
                ToolCommands::Call { name, args } => {
                    let args: serde_json::Value = serde_json::from_str(&args)
                        .with_context(|| format!("--args is not valid JSON: {}", args))?;
                    let outcome = session.call_tool(&name, args).await;
                    println!("{}", outcome.reply);
                    tracing::debug!(record = ?outcome.record, "Invocation finished");
                }
            }
        }
        Commands::Health => {
            let session = AssistantSession::start(config, platform(cli.simulate)).await?;
            println!("{}", session.health_report().await);
        }
        Commands::Memory { command } => match command {
            MemoryCommands::Show { user } => {
                let user = user.unwrap_or_else(|| config.assistant.user_id.clone());
                let client = memory::from_config(&config.memory)?;
                let entries = client.get_all(&user).await?;
                if entries.is_empty() {
                    println!("No memories stored for {}", user);
                } else {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
            }
        },
    }

    Ok(())
}
