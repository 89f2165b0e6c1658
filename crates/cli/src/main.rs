mod auth;
mod config;
mod serve;

use std::path::PathBuf;
use std::process;
use std::str::FromStr as _;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use crate::auth::TokenSigner;
use crate::config::ServerConfig;

/// Contract lifecycle management toolchain.
#[derive(Parser)]
#[command(name = "pactum", version, about = "Contract lifecycle management service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default 8080, or PACTUM_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Directory for attachment files (default ./uploads, or PACTUM_UPLOAD_DIR)
        #[arg(long)]
        upload_dir: Option<PathBuf>,
        /// Token signing key file (or PACTUM_TOKEN_KEY)
        #[arg(long)]
        token_key: Option<PathBuf>,
    },

    /// Print the Chinese uppercase rendering of a decimal amount
    Amount {
        /// The amount, e.g. 1234.56
        value: String,
    },

    /// Generate an Ed25519 token signing key file
    Keygen {
        /// Output path for the key file
        #[arg(long, default_value = "pactum-token.key")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            upload_dir,
            token_key,
        } => {
            let config = ServerConfig::resolve(port, upload_dir, token_key);
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(config)) {
                eprintln!("server error: {}", e);
                process::exit(1);
            }
        }

        Commands::Amount { value } => {
            let amount = match Decimal::from_str(&value) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("error: '{}' is not a decimal amount: {}", value, e);
                    process::exit(1);
                }
            };
            match pactum_core::to_chinese_amount(amount) {
                Ok(uppercase) => println!("{}", uppercase),
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            }
        }

        Commands::Keygen { output } => {
            let signer = TokenSigner::generate();
            if let Err(e) = signer.write_seed_file(&output) {
                eprintln!("error: {}", e);
                process::exit(1);
            }
            println!("wrote token signing key to {}", output.display());
        }
    }
}
