use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use super::OutputFormat;
use firestarter::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# firestarter configuration

# Path to SQLite database (default: platform data dir, firestarter/firestarter.db)
# database_path: firestarter.db

# Port for firestarter-server
port: 8080

# Session lifetime in minutes (default: one week)
session_ttl_minutes: 10080

# Check auth-token cookies against live sessions in the route guard
verify_sessions: true

# User id the CLI acts as
default_user: local

# Route guard prefixes
# routes:
#   protected: [/dashboard, /profile, /settings]
#   auth_only: [/auth/login, /auth/register]
#   login_path: /auth/login
#   home_path: /dashboard
#   cookie_name: auth-token
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        print_value(
                            "database_path",
                            &ConfigValue::new(
                                config.database_path.value.display(),
                                config.database_path.source.clone(),
                            ),
                        );
                        print_value("port", &config.port);
                        print_value("session_ttl_minutes", &config.session_ttl_minutes);
                        print_value("verify_sessions", &config.verify_sessions);
                        print_value("default_user", &config.default_user);

                        println!("routes:");
                        println!("  protected: {}", config.routes.protected.join(", "));
                        println!("  auth_only: {}", config.routes.auth_only.join(", "));
                        println!("  login_path: {}", config.routes.login_path);
                        println!("  home_path: {}", config.routes.home_path);
                        println!("  cookie_name: {}", config.routes.cookie_name);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'firestarter config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn print_value<T: std::fmt::Display>(name: &str, value: &ConfigValue<T>) {
    println!("{}: {}", name, value.value);
    println!("  source: {}", value.source);
    println!();
}
