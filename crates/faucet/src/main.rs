//! Faucet service binary

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use drip_common::utils::logging::{init_logging, LoggingConfig};
use drip_keystore::{Keystore, KeystoreError, LocalKeystore, DEFAULT_KEY_PASS};
use drip_faucet::{api, FaucetClient, FaucetConfig, FaucetService, HttpLedgerClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Rate-limited testnet faucet
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the faucet HTTP service
    Serve(ServeArgs),

    /// Ask a running faucet for funds
    Request {
        /// Faucet URL, e.g. http://localhost:8000
        url: String,
        chain_id: String,
        address: String,

        /// Request timeout (seconds)
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },

    /// Manage the keyring directory
    Keys {
        #[arg(long, env = "FAUCET_KEYRING_DIR", default_value = "keyring")]
        keyring_dir: PathBuf,

        #[command(subcommand)]
        command: KeysCommand,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Config file path (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server listen address
    #[arg(long)]
    listen: Option<String>,

    /// Chain the faucet serves
    #[arg(long)]
    chain_id: Option<String>,

    /// Name of the funding key
    #[arg(long)]
    key: Option<String>,

    /// Amount per request, e.g. 1000uatom
    #[arg(long)]
    amount: Option<String>,

    /// Tendermint RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// REST API URL
    #[arg(long)]
    api_url: Option<String>,

    /// Keyring directory
    #[arg(long)]
    keyring_dir: Option<String>,

    /// Per-address cooldown (seconds)
    #[arg(long)]
    cooldown: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a new key
    Add { name: String },

    /// Import a hex-encoded secp256k1 secret key
    Import { name: String, private_key: String },

    /// Show a key's address
    Show {
        name: String,
        #[arg(long, default_value = "cosmos")]
        prefix: String,
    },

    /// List all keys
    List {
        #[arg(long, default_value = "cosmos")]
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Request {
            url,
            chain_id,
            address,
            timeout,
        } => {
            let _guard = init_logging(&LoggingConfig {
                level: "warn".to_string(),
                ..Default::default()
            })?;
            let client = FaucetClient::new(url, Duration::from_secs(timeout))?;
            let reply = client.request_funds(&chain_id, &address).await?;
            println!("{} {}", reply.status, reply.body);
            if !reply.is_created() {
                anyhow::bail!("faucet answered with status {}", reply.status);
            }
            Ok(())
        }
        Command::Keys {
            keyring_dir,
            command,
        } => keys(keyring_dir, command),
    }
}

fn keys(keyring_dir: PathBuf, command: KeysCommand) -> anyhow::Result<()> {
    let keystore = LocalKeystore::open(&keyring_dir)
        .with_context(|| format!("failed to open keyring {:?}", keyring_dir))?;

    let (info, prefix) = match command {
        KeysCommand::Add { name } => (keystore.add(&name, DEFAULT_KEY_PASS)?, "cosmos".to_string()),
        KeysCommand::Import { name, private_key } => (
            keystore.import(&name, &private_key, DEFAULT_KEY_PASS)?,
            "cosmos".to_string(),
        ),
        KeysCommand::Show { name, prefix } => (keystore.key_by_name(&name)?, prefix),
        KeysCommand::List { prefix } => {
            for info in keystore.list() {
                println!("{}\t{}", info.name, info.address.to_bech32(&prefix)?);
            }
            return Ok(());
        }
    };

    println!("name:       {}", info.name);
    println!("address:    {}", info.address.to_bech32(&prefix)?);
    println!("public key: {}", hex::encode(&info.public_key));
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    // Load configuration
    let mut config = match &args.config {
        Some(path) => FaucetConfig::load(path)
            .with_context(|| format!("failed to load config from {:?}", path))?,
        None => FaucetConfig::from_env(),
    };

    // Override with CLI arguments
    if let Some(addr) = args.listen {
        config.listen_addr = addr;
    }
    if let Some(chain_id) = args.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(key) = args.key {
        config.key_name = key;
    }
    if let Some(amount) = args.amount {
        config.amount = amount;
    }
    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }
    if let Some(dir) = args.keyring_dir {
        config.keyring_dir = Some(dir);
    }
    if let Some(cooldown) = args.cooldown {
        config.cooldown_secs = cooldown;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }

    let _log_guard = init_logging(&config.logging)?;
    info!("Starting faucet v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;
    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Chain ID: {}", config.chain_id);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  API URL: {}", config.api_url);
    info!("  Amount per request: {}", config.amount);
    info!("  Address cooldown: {}s", config.cooldown_secs);

    let keystore = open_keystore(&config)?;
    let ledger = Arc::new(HttpLedgerClient::new(
        config.rpc_url.clone(),
        config.api_url.clone(),
        config.request_timeout(),
    ));

    let service = Arc::new(FaucetService::new(config.clone(), keystore, ledger)?);
    info!("Faucet service initialized for {}", service.faucet_address());

    let mut app = api::router(service.clone()).layer(TraceLayer::new_for_http());

    // Add CORS if enabled
    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors);
        info!("CORS enabled");
    }

    // Evict expired cooldown entries
    let sweeper = service.clone();
    let sweep_interval = config.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            let evicted = sweeper.sweep();
            debug!("Rate-limit sweep evicted {} addresses", evicted);
        }
    });

    // Start server
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen_addr))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

fn open_keystore(config: &FaucetConfig) -> anyhow::Result<Arc<dyn Keystore>> {
    let keystore = match &config.keyring_dir {
        Some(dir) => LocalKeystore::open(dir).with_context(|| format!("failed to open keyring {}", dir))?,
        None => LocalKeystore::new(),
    };

    if let Some(private_key) = &config.private_key {
        match keystore.import(&config.key_name, private_key, DEFAULT_KEY_PASS) {
            Ok(info) => info!("Imported key {}", info.name),
            Err(KeystoreError::KeyExists(name)) => info!("Key {} already in keyring", name),
            Err(e) => return Err(e).context("failed to import private key"),
        }
    }

    Ok(Arc::new(keystore))
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
