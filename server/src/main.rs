use clap::Parser;
use log::{error, info};
use server::maze::{MazeGame, DEFAULT_LAYOUT};
use server::network::{Server, ServerConfig};
use shared::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Milliseconds between game over broadcasts
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    announce_interval_ms: u64,

    /// Number of game over broadcasts before the match restarts
    #[arg(long, default_value = "10")]
    announce_repeats: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        announce_repeats: args.announce_repeats,
        announce_interval: Duration::from_millis(args.announce_interval_ms),
    };

    let game = MazeGame::from_layout(DEFAULT_LAYOUT)?;
    let mut server = Server::new(&config, game).await?;

    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        })
        .await
}
