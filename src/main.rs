use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, CounterCommand, PostCommand, TodoCommand, UserCommand};
use firestarter::models::Collection;
use firestarter::server::IdentityProvider;
use firestarter::{init_db, Config, DocumentService, DocumentStore};

#[derive(Parser)]
#[command(name = "firestarter")]
#[command(version)]
#[command(about = "Manage the firestarter document store from the command line", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage todos
    Todo(TodoCommand),

    /// Show or change a counter
    Counter(CounterCommand),

    /// Manage posts
    Post(PostCommand),

    /// Manage user accounts
    User(UserCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Todo(cmd)) => {
            let store = open_store(&config).await?;
            let todos = DocumentService::new(store, Collection::Todos.as_str());
            cmd.run(&todos, &config).await?;
        }
        Some(Commands::Counter(cmd)) => {
            let store = open_store(&config).await?;
            let counters = DocumentService::new(store, Collection::Counters.as_str());
            cmd.run(&counters, &config).await?;
        }
        Some(Commands::Post(cmd)) => {
            let store = open_store(&config).await?;
            let posts = DocumentService::new(store, Collection::Posts.as_str());
            cmd.run(&posts, &config).await?;
        }
        Some(Commands::User(cmd)) => {
            let store = open_store(&config).await?;
            cmd.run(&IdentityProvider::new(store)).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<DocumentStore, sqlx::Error> {
    let pool = init_db(config.database_path()).await?;
    Ok(DocumentStore::new(pool))
}
