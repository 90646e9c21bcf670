//! ForkReach CLI, the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP gateway
//! - `chat`    — Single-message or interactive chat in the terminal
//! - `agents`  — List the marketing agents
//! - `route`   — Show which agent would answer a message
//! - `config`  — Print the resolved configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "forkreach",
    about = "ForkReach — marketing agents with streaming responses",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the marketing agents
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Answer with this agent instead of routing automatically
        #[arg(long)]
        agent: Option<String>,

        /// Model to generate with
        #[arg(long)]
        model: Option<String>,

        /// TOML file describing the product to market
        #[arg(long)]
        product: Option<std::path::PathBuf>,

        /// Print raw stream frames as JSON lines
        #[arg(long)]
        frames: bool,
    },

    /// List the available agents
    Agents,

    /// Preview which agent would answer a message
    Route {
        /// The message to route
        message: String,

        /// Explicit agent id to try first
        #[arg(long)]
        agent: Option<String>,
    },

    /// Show configuration (API keys redacted)
    Config {
        /// Print only the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            agent,
            model,
            product,
            frames,
        } => {
            let options = commands::chat::ChatOptions {
                agent,
                model,
                product,
                frames,
            };
            commands::chat::run(message, options).await?
        }
        Commands::Agents => commands::agents::run().await?,
        Commands::Route { message, agent } => commands::route::run(&message, agent.as_deref()).await?,
        Commands::Config { path } => {
            if path {
                commands::config_cmd::path().await?
            } else {
                commands::config_cmd::show().await?
            }
        }
    }

    Ok(())
}
