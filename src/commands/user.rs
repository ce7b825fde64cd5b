use clap::{Args, Subcommand};

use super::{truncate, OutputFormat};
use firestarter::server::IdentityProvider;

#[derive(Args)]
pub struct UserCommand {
    #[command(subcommand)]
    pub command: UserSubcommand,
}

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Register an account
    Add {
        /// Email address
        email: String,

        /// Password (at least 6 characters)
        #[arg(long)]
        password: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// List registered users
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl UserCommand {
    pub async fn run(&self, identity: &IdentityProvider) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            UserSubcommand::Add {
                email,
                password,
                name,
            } => {
                let profile = identity.sign_up(email, password, name.as_deref()).await?;
                println!("Created user {} ({})", profile.uid, profile.email);
                Ok(())
            }

            UserSubcommand::List { format } => {
                let users = identity.list_users().await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&users)?);
                    }
                    OutputFormat::Text => {
                        if users.is_empty() {
                            println!("No users found");
                            return Ok(());
                        }
                        println!("{:<32}  {:<30}  NAME", "UID", "EMAIL");
                        println!("{}", "-".repeat(80));
                        for user in &users {
                            println!(
                                "{:<32}  {:<30}  {}",
                                user.uid,
                                truncate(&user.email, 30),
                                user.display_name.as_deref().unwrap_or("")
                            );
                        }
                        println!("\nTotal: {} user(s)", users.len());
                    }
                }
                Ok(())
            }
        }
    }
}
