use clap::{Args, Subcommand};

use super::OutputFormat;
use firestarter::Config;
use firestarter::{Counter, DocumentService};

#[derive(Args)]
pub struct CounterCommand {
    /// User id whose counter to use; `anonymous` for the shared one
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: CounterSubcommand,
}

#[derive(Subcommand)]
pub enum CounterSubcommand {
    /// Show the current count
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add to the count
    Increment {
        /// Amount to add
        #[arg(long, default_value_t = 1)]
        by: i64,
    },

    /// Subtract from the count
    Decrement {
        /// Amount to subtract
        #[arg(long, default_value_t = 1)]
        by: i64,
    },
}

impl CounterCommand {
    pub async fn run(
        &self,
        counters: &DocumentService<Counter>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let id = self.user.as_deref().unwrap_or(&config.default_user.value);

        match &self.command {
            CounterSubcommand::Show { format } => {
                let counter = counters.get_by_id(id).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&counter)?);
                    }
                    OutputFormat::Text => match counter {
                        Some(counter) => {
                            println!("Count: {}", counter.count);
                            if let Some(at) = counter.last_updated {
                                println!("Last updated: {}", at.format("%Y-%m-%d %H:%M:%S"));
                            }
                        }
                        None => println!("No counter for {}", id),
                    },
                }
                Ok(())
            }

            CounterSubcommand::Increment { by } => {
                let count = Counter::adjust(counters, id, *by).await?;
                println!("Count: {}", count);
                Ok(())
            }

            CounterSubcommand::Decrement { by } => {
                let count = Counter::adjust(counters, id, -by).await?;
                println!("Count: {}", count);
                Ok(())
            }
        }
    }
}
