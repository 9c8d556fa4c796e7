mod config;
mod encoding;
mod handler;
mod protocol;
mod server;
mod store;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use config::{Config, LogConfig};
use handler::CounterHandler;
use server::Server;
use store::{CounterStore, MemoryStore, RocksStore};

/// Visit counter behind an HTTP gateway
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// INI configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Listening address, overrides the configuration
    #[arg(long)]
    addr: Option<String>,

    /// Handle the JSON event in this file once, print the result and exit
    #[arg(long)]
    event: Option<String>,
}

fn init_logging(log: &LogConfig) -> anyhow::Result<()> {
    let writer = match &log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{}'", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.level)),
        )
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .init();
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CounterStore>> {
    match &config.data_path {
        Some(path) => {
            let store = RocksStore::open(path, &config.table_name)
                .with_context(|| format!("failed to open store at '{}'", path))?;
            Ok(Arc::new(store))
        }
        None => {
            info!("No data path configured, counting in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server_addr = addr;
    }

    init_logging(&config.log)?;
    info!("Starting visit-counter {}", env!("CARGO_PKG_VERSION"));
    info!("Effective config: {}", serde_json::to_string(&config)?);

    let mut handler = CounterHandler::new(open_store(&config)?);
    if let Some(origin) = &config.cors_allow_origin {
        handler = handler.with_cors(origin);
    }
    let handler = Arc::new(handler);

    if let Some(path) = args.event {
        let raw = std::fs::read(&path).with_context(|| format!("failed to read event '{}'", path))?;
        let res = handler.invoke(&raw).await?;
        println!("{}", res.to_json()?);
        return Ok(());
    }

    let server = Arc::new(Server::bind(&config.server_addr, handler).await?);
    info!("Server listening on: {}", server.local_addr());

    tokio::select! {
        _ = server.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutting down");
        }
    }

    Ok(())
}
