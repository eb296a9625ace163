//! txcore CLI Application
//!
//! Offline tooling for the transaction core.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use txcore::cli::{self, AppState};

#[derive(Parser)]
#[command(name = "txcore")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Transaction lifecycle, exceptions and multisignature tooling", long_about = None)]
struct Cli {
    /// Protocol constants file; defaults apply when it does not exist
    #[arg(short, long, default_value = "constants.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fee for a transaction type
    Fee {
        /// Type name or numeric tag
        #[arg(short = 't', long = "type")]
        tx_type: String,

        /// Block height the fee applies at
        #[arg(long, default_value = "1")]
        height: u64,

        /// Keysgroup size for multisignature registrations
        #[arg(short, long, default_value = "0")]
        members: usize,
    },

    /// List the historical exception handlers
    Exceptions,

    /// Decode a transaction JSON file
    Inspect {
        /// Transaction file
        file: PathBuf,
    },

    /// Co-sign a transaction JSON file
    Sign {
        /// Transaction file
        file: PathBuf,

        /// Hex-encoded private key
        #[arg(short, long)]
        key: String,
    },

    /// Generate a new key pair
    Keygen,

    /// Configuration operations
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default constants
    Init {
        /// Output file, the --config path when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Keygen => {
            cli::cmd_keygen()?;
        }

        Commands::Exceptions => {
            cli::cmd_exceptions()?;
        }

        Commands::Config { action } => match action {
            ConfigCommands::Init { output } => {
                cli::cmd_config_init(output.as_ref().unwrap_or(&config))?;
            }
        },

        Commands::Fee {
            tx_type,
            height,
            members,
        } => {
            let state = AppState::new(&config)?;
            cli::cmd_fee(&state, &tx_type, height, members)?;
        }

        Commands::Inspect { file } => {
            let state = AppState::new(&config)?;
            cli::cmd_inspect(&state, &file)?;
        }

        Commands::Sign { file, key } => {
            let state = AppState::new(&config)?;
            cli::cmd_sign(&state, &file, &key)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_every_command_parses() {
        let parsed = Cli::try_parse_from(["txcore", "config", "init", "-o", "c.json"]).unwrap();
        assert!(matches!(
            parsed.command,
            Commands::Config {
                action: ConfigCommands::Init { output: Some(_) }
            }
        ));

        let parsed = Cli::try_parse_from(["txcore", "--config", "x.json", "keygen"]).unwrap();
        assert_eq!(parsed.config, PathBuf::from("x.json"));
        assert!(matches!(parsed.command, Commands::Keygen));

        let parsed =
            Cli::try_parse_from(["txcore", "fee", "-t", "multisignature", "-m", "3"]).unwrap();
        assert!(matches!(parsed.command, Commands::Fee { members: 3, height: 1, .. }));

        assert!(Cli::try_parse_from(["txcore", "sign", "tx.json"]).is_err());
    }
}
