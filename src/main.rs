use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pinner::client::{pin_files, read_jobs};
use pinner::config::Config;
use pinner::server::startup;

#[derive(Parser)]
#[command(name = "pinner")]
#[command(about = "Download files and pin them to IPFS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the sync and websocket endpoints
    Serve {
        #[command(flatten)]
        config: Config,
    },
    /// Send a JSON file of name -> URL to a running server
    Pin {
        #[arg(long, help = "websocket address", default_value = "ws://localhost:5050/websocket")]
        addr: String,
        #[arg(short, long, help = "JSON file with upload info")]
        file: PathBuf,
        #[arg(long, env = "PINNER_API_TOKEN", hide_env_values = true)]
        api_token: String,
        #[arg(long, help = "seconds to wait for each reply")]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinner=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => {
            startup(config).await?;
        }

        Some(Commands::Pin {
            addr,
            file,
            api_token,
            timeout,
        }) => {
            let batch = read_jobs(&file).await?;
            // Print each reply on arrival so a timeout keeps what was pinned.
            let received = pin_files(
                &addr,
                &api_token,
                batch,
                timeout.map(Duration::from_secs),
                |pinned| match serde_json::to_string(&pinned) {
                    Ok(line) => println!("{}", line),
                    Err(err) => tracing::error!(job = %pinned.name, error = %err, "failed to print reply"),
                },
            )
            .await?;
            tracing::info!(received, "all files pinned");
        }

        None => {
            println!("Use --help for available commands");
        }
    }

    Ok(())
}
