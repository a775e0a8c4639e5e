//! CLI entry point for parley

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;
use parley_agent::ChatApp;
use parley_core::config::{Config, ConfigLoader};
use parley_core::logging::init_logging;
use parley_core::session::SessionId;
use parley_core::storage::{FileStorage, MemoryStorage, StorageAdapter};
use parley_core::utils::expand_home;
use parley_providers::HttpEndpoint;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

mod render;
mod repl;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat client with persistent sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Keep sessions in memory only
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Chat to send to, defaults to the active one
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List chats, newest first
    List,
    /// Print a chat transcript
    Show {
        /// Chat position or id, defaults to the active one
        target: Option<String>,
    },
    /// Start a new chat
    New,
    /// Delete a chat
    Delete {
        /// Chat position or id
        target: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show configuration and storage information
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };
    let config = config_loader.load()?;
    let _log_guard = init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Status => run_status(&config_loader, &config, cli.ephemeral),
        command => {
            let app = build_app(&config, cli.ephemeral)?;
            run_command(&app, command).await
        }
    }
}

async fn run_command(app: &ChatApp, command: Commands) -> Result<()> {
    match command {
        Commands::Chat => {
            info!("Starting interactive chat");
            repl::run(app).await
        }
        Commands::Send { message, session } => run_send(app, &message, session).await,
        Commands::List => {
            print!("{}", render::sidebar(&app.view()));
            Ok(())
        }
        Commands::Show { target } => run_show(app, target),
        Commands::New => {
            let id = app.new_chat()?;
            println!("{}", id);
            Ok(())
        }
        Commands::Delete { target, yes } => run_delete(app, &target, yes),
        Commands::Status => Ok(()),
    }
}

fn build_storage(config: &Config, ephemeral: bool) -> Arc<dyn StorageAdapter> {
    if ephemeral {
        debug!("Keeping sessions in memory");
        return Arc::new(MemoryStorage::with_capacity(config.storage.capacity_bytes));
    }
    let storage = FileStorage::new(
        expand_home(&config.storage.dir),
        config.storage.capacity_bytes,
    );
    debug!("Storing sessions in {}", storage.dir().display());
    Arc::new(storage)
}

fn build_app(config: &Config, ephemeral: bool) -> Result<ChatApp> {
    let storage = build_storage(config, ephemeral);
    let endpoint = HttpEndpoint::from_config(&config.endpoint)?;
    info!("Using endpoint {}", endpoint.url());
    Ok(ChatApp::new(storage, Arc::new(endpoint))?)
}

async fn run_send(app: &ChatApp, message: &str, session: Option<String>) -> Result<()> {
    if let Some(session) = session {
        let id = SessionId::from(session);
        if !app.open(&id) {
            anyhow::bail!("No chat with id {}", id);
        }
    }
    repl::send(app, message).await
}

fn run_show(app: &ChatApp, target: Option<String>) -> Result<()> {
    if let Some(target) = target {
        let Some(id) = render::resolve_target(&app.view(), &target) else {
            anyhow::bail!("No chat matches '{}'", target);
        };
        app.open(&id);
    }
    let view = app.view();
    if let Some(active) = view.active() {
        println!("{}\n", style(&active.title).bold());
    }
    print!("{}", render::transcript(&view));
    Ok(())
}

fn run_delete(app: &ChatApp, target: &str, yes: bool) -> Result<()> {
    let view = app.view();
    let Some(id) = render::resolve_target(&view, target) else {
        anyhow::bail!("No chat matches '{}'", target);
    };

    let title = render::title_of(&view, &id);

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete \"{}\"?", title))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Delete cancelled.");
            return Ok(());
        }
    }

    match app.delete(&id) {
        Ok(()) => println!("{}", style(format!("Deleted \"{}\"", title)).green()),
        Err(e) if e.is_recoverable() => println!("{}", style(e).yellow()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config, ephemeral: bool) -> Result<()> {
    println!("{}", style("Parley Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Endpoint: {}", config.endpoint.url);
    println!("  Timeout: {}s", config.endpoint.timeout_secs);
    println!();

    println!("{}", style("Storage:").bold());
    if ephemeral {
        println!("  {}", style("in-memory (ephemeral)").yellow());
    } else {
        let dir = expand_home(&config.storage.dir);
        let status = if dir.exists() {
            style("present").green()
        } else {
            style("not created yet").dim()
        };
        println!("  Directory: {} ({})", dir.display(), status);
    }
    let capacity = if config.storage.capacity_bytes == 0 {
        "unbounded".to_string()
    } else {
        format!("{} bytes", config.storage.capacity_bytes)
    };
    println!("  Capacity: {}", capacity);

    Ok(())
}
