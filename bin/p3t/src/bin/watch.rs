use alloy_primitives::Address;
use balance::SyncState;
use clap::Parser;
use client::{StaticWallet, Wallet};
use p3t::{
    check_wallet_chain, config::Config, erc20_binder, metrics::install_prometheus_exporter,
    select_wallet, Notice, TokenApp,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "p3t-watch")]
#[command(about = "Keep the P3T balance of the connected account in sync until Ctrl-C")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Private key of the account to watch
    #[arg(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// EIP-1193 wallet endpoint, used when no private key is given
    #[arg(short, long, env = "WALLET_URL")]
    wallet_url: Option<String>,

    /// Watch an address without any wallet. Takes precedence over the wallet options.
    #[arg(long)]
    account: Option<Address>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting p3t-watch");

    let cli = Cli::parse();

    let current_dir = std::env::current_dir()?;
    info!("Loading config: {:?}", current_dir.join(&cli.config));

    let config = Config::from_file(&cli.config)?;
    let network = config.network_config();

    info!("Loaded config:");
    info!("  Network: {}", network.network_type);
    info!("  Token: {}", network.token);
    info!("  Poll interval: {:?}", config.poll_interval());

    if let Some(port) = config.metrics_port {
        install_prometheus_exporter(port)?;
        info!("  Metrics: 0.0.0.0:{}", port);
    }

    let wallet = match cli.account {
        Some(account) => Some(Wallet::Static(StaticWallet::single(account))),
        None => {
            let wallet_url = cli.wallet_url.or_else(|| config.wallet_url.clone());
            select_wallet(cli.private_key.as_deref(), wallet_url.as_deref())?
        }
    };

    if let Some(wallet) = wallet.as_ref() {
        if let Err(e) = check_wallet_chain(wallet, network.chain_id).await {
            error!("{}", Notice::from_error(&e));
            return Err(e.into());
        }
    }

    let bind = erc20_binder(config.rpc_url.clone(), network.token, config.poll_interval());
    let mut app = TokenApp::new(wallet, bind);

    if let Err(e) = app.connect().await {
        error!("{}", Notice::from_error(&e));
        return Err(e.into());
    }

    let mut snapshots = app.watch_balance();
    snapshots.mark_changed();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let snapshot = snapshots.borrow_and_update().clone();
        app.metrics().record_snapshot(&snapshot, app.is_listening());

        match (snapshot.state, snapshot.balance) {
            (SyncState::Synced, Some(balance)) => {
                info!(account = %balance.holder(), balance = balance.display(), "Balance");
            }
            (SyncState::Idle, _) => {
                // Retrying would prompt the wallet again, leave that to the user.
                error!("Balance synchronization stopped");
                app.disconnect();
                return Err(eyre::eyre!("failed to load the balance"));
            }
            _ => {}
        }
    }

    app.disconnect();
    info!("Stopped");

    Ok(())
}
