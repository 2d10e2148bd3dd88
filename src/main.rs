use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use clap::Subcommand;
use confsync::Backend;
use confsync::ConfigRule;
use confsync::ConfigWatcher;
use confsync::Error;
use confsync::EtcdStore;
use confsync::Result;
use confsync::Schema;
use confsync::StoreBackend;
use confsync::SyncConfig;
use confsync::WatchNotice;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::broadcast;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Example client and server for fetching simple config items from etcd
#[derive(Parser, Debug)]
#[command(name = "confsync")]
#[command(version)]
struct Args {
    /// Comma separated list of etcd endpoints (overrides settings)
    #[arg(long, value_delimiter = ',')]
    endpoints: Vec<String>,

    /// Root key of the configuration (overrides settings)
    #[arg(long)]
    root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the config server
    Server {
        /// Interface to bind the server to
        #[arg(short, long, default_value = "127.0.0.1:1234")]
        bind: SocketAddr,
    },

    /// Set config values in etcd
    ///
    /// $ confsync set name "James Dean"
    /// $ confsync set age 12
    /// $ confsync set config-version 1
    Set {
        /// The key to set
        key: String,
        /// The value to set
        value: String,
    },
}

/// Options the server reads from the store
fn user_schema() -> Schema {
    Schema::new()
        .rule(ConfigRule::scalar("name").help("The name of our user"))
        .rule(ConfigRule::scalar("age").int().help("The age of our user"))
        .rule(ConfigRule::scalar("sex").help("The sex of our user"))
        .rule(
            ConfigRule::scalar("config-version")
                .int()
                .default("0")
                .help("When version is changed, the service will update the config"),
        )
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let args = Args::parse();
    let mut settings = SyncConfig::new()?;
    if !args.endpoints.is_empty() {
        settings.store.endpoints = args.endpoints.clone();
    }
    if let Some(root) = &args.root {
        settings.store.root = root.clone();
    }
    let settings = settings.validate()?;

    info!("confsync v{}", confsync::VERSION);
    let store = Arc::new(EtcdStore::connect(&settings.store).await?);
    let backend = Arc::new(StoreBackend::new(store, &settings));

    let result = match args.command {
        Command::Server { bind } => run_server(backend.clone(), settings, bind).await,
        Command::Set { key, value } => run_set(backend.as_ref(), &key, value).await,
    };

    backend.close().await;
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

async fn run_set(
    backend: &StoreBackend<EtcdStore>,
    name: &str,
    value: String,
) -> Result<()> {
    // Only declared options may be set
    let schema = user_schema();
    let Some(rule) = schema.get(name) else {
        let valid: Vec<&str> = schema.rules().iter().map(|r| r.name.as_str()).collect();
        return Err(Error::Fatal(format!(
            "invalid config name '{name}', valid options are: {}",
            valid.join(", ")
        )));
    };

    let key = rule.key();
    info!(key = %key.join(backend.root_key(), backend.separator()), %value, "Set config");
    backend.set(&key, Bytes::from(value)).await
}

async fn run_server(
    backend: Arc<StoreBackend<EtcdStore>>,
    settings: SyncConfig,
    bind: SocketAddr,
) -> Result<()> {
    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let watcher = ConfigWatcher::load(backend.clone(), user_schema(), settings.watch)
        .await
        .inspect_err(|e| error!("Etcd error - {}", e))?;
    tokio::spawn(report_notices(watcher.notices()));
    watcher.start().await?;

    let mut server = tokio::spawn(confsync::http::start_server(
        bind,
        watcher.live(),
        graceful_rx,
    ));

    info!("Application started. Waiting for CTRL+C signal...");
    let served = tokio::select! {
        res = graceful_shutdown(graceful_tx) => {
            res?;
            (&mut server).await
        }
        // Server exited on its own; nothing left to serve
        res = &mut server => res,
    };
    match served {
        Ok(Err(e)) => error!("Serve error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    watcher.stop().await;
    info!("Shutdown completed");
    Ok(())
}

/// Process-level reporter for watch outcomes
async fn report_notices(mut notices: broadcast::Receiver<WatchNotice>) {
    loop {
        match notices.recv().await {
            Ok(WatchNotice::Committed { version }) => {
                info!("Config updated to version {}", version.unwrap_or_default());
            }
            Ok(WatchNotice::Rejected { key, reason }) => {
                warn!(%key, "Config not applied: {}", reason);
            }
            Ok(WatchNotice::Terminated { reason }) => {
                error!("Config watch ended: {}", reason);
            }
            Ok(WatchNotice::Ended) => info!("Config watch closed"),
            Ok(WatchNotice::Resynced) => info!("Config watch resumed"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Notice reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("SIGINT handler: {e}")))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;
    Ok(())
}

fn init_observability() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,confsync=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
