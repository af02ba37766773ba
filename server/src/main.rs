use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, DEFAULT_BACKLOG};
use shared::{DEFAULT_PORT, RECORD_FILE, TURN_TIMEOUT_SECS};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// File holding win/loss records
    #[arg(short, long, default_value = RECORD_FILE)]
    records: PathBuf,

    /// Newline-separated list of accepted words
    #[arg(short, long, default_value = "/usr/share/dict/words")]
    dictionary: PathBuf,

    /// Seconds a player has to answer a prompt
    #[arg(short, long, default_value_t = TURN_TIMEOUT_SECS)]
    turn_timeout: u64,

    /// Pending connections the listener queues
    #[arg(long, default_value_t = DEFAULT_BACKLOG)]
    backlog: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig {
        addr: SocketAddr::new(args.host, args.port),
        backlog: args.backlog,
        records_path: args.records,
        dictionary_path: args.dictionary,
        turn_timeout: Duration::from_secs(args.turn_timeout),
    };

    info!("Starting word chain server...");
    info!("Records file: {}", config.records_path.display());
    info!("Turn timeout: {}s", args.turn_timeout);

    let server = Server::from_config(&config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
