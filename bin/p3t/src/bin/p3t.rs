//! One-shot P3T commands.
//!
//! - `connect`: connect the wallet and show the synchronized balance
//! - `balance`: balance of the connected account, or of `--account`
//! - `supply`: total token supply
//! - `transfer`: send tokens from the connected account
//! - `estimate`: gas a transfer from the connected account would use
//! - `demo`: run the transfer scenario against an in-memory token

use alloy_primitives::Address;
use balance::{format_units, SyncState};
use binding::{Erc20, Token, TokenHandle};
use clap::{Parser, Subcommand};
use client::{ClientError, Wallet};
use eyre::eyre;
use p3t::{
    check_wallet_chain, config::Config, demo, erc20_binder, format_account, select_wallet, Notice,
    Severity, TokenApp, TransferForm,
};
use std::time::Duration;
use tracing::{error, info, warn};

/// How long to wait for the initial balance read.
const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "p3t")]
#[command(about = "Connect a wallet to the P3T token and move tokens")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Private key for signing transactions (hex string, with or without 0x prefix)
    #[arg(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// EIP-1193 wallet endpoint, used when no private key is given
    #[arg(short, long, env = "WALLET_URL")]
    wallet_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect the wallet and show the synchronized balance
    Connect,

    /// Show a token balance
    Balance {
        /// Account to query instead of the connected one
        #[arg(long)]
        account: Option<Address>,
    },

    /// Show the total token supply
    Supply,

    /// Send tokens from the connected account
    Transfer {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount in tokens, e.g. `1000` or `0.5`
        #[arg(long)]
        amount: String,
    },

    /// Estimate the gas of a transfer from the connected account
    Estimate {
        /// Recipient address
        #[arg(long)]
        to: Address,

        /// Amount in tokens, e.g. `1000` or `0.5`
        #[arg(long)]
        amount: String,
    },

    /// Run the transfer scenario against an in-memory token
    Demo,
}

fn report(notice: &Notice) {
    match notice.severity {
        Severity::Info => warn!("{notice}"),
        Severity::Success => info!("{notice}"),
        Severity::Error => error!("{notice}"),
    }
}

async fn connect<T, B>(app: &mut TokenApp<Wallet, T, B>, chain_id: u64) -> eyre::Result<Address>
where
    T: Token,
    B: Fn(&Wallet, Address) -> Result<T, ClientError>,
{
    if let Some(wallet) = app.wallet() {
        if let Err(e) = check_wallet_chain(wallet, chain_id).await {
            report(&Notice::from_error(&e));
            return Err(e.into());
        }
        info!(wallet = wallet.name(), "Requesting account access");
    }

    let account = match app.connect().await {
        Ok(account) => account,
        Err(e) => {
            report(&Notice::from_error(&e));
            return Err(e.into());
        }
    };
    report(&Notice::connected(account));

    let mut snapshots = app.watch_balance();
    let snapshot = tokio::time::timeout(
        SYNC_TIMEOUT,
        snapshots.wait_for(|s| s.state != SyncState::Loading),
    )
    .await
    .map_err(|_| eyre!("timed out loading the balance"))??
    .clone();

    if snapshot.state != SyncState::Synced {
        return Err(eyre!("failed to load the balance of {account}"));
    }

    Ok(account)
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Demo = cli.command {
        info!("Running: demo");
        let report = demo::run().await?;

        print!("{}", toml::to_string(&report)?);

        if !report.is_consistent()? {
            return Err(eyre!("balances do not add up to the total supply"));
        }
        return Ok(());
    }

    let config = Config::from_file(&cli.config)?;
    let network = config.network_config();

    info!("Loaded config:");
    info!("  Network: {}", network.network_type);
    info!("  Chain ID: {}", network.chain_id);
    info!("  Token: {}", network.token);

    let wallet_url = cli.wallet_url.or_else(|| config.wallet_url.clone());
    let wallet = select_wallet(cli.private_key.as_deref(), wallet_url.as_deref())?;
    if let Some(wallet) = wallet.as_ref() {
        info!("  Wallet: {}", wallet.name());
    }

    let bind = erc20_binder(config.rpc_url.clone(), network.token, config.poll_interval());
    let mut app = TokenApp::new(wallet, bind);

    match cli.command {
        Command::Connect => {
            let account = connect(&mut app, network.chain_id).await?;
            println!("{}  {}", format_account(account), app.balance_display());
        }
        Command::Balance {
            account: Some(account),
        } => {
            let provider = client::create_provider(&config.rpc_url)?;
            let handle = TokenHandle::new(Erc20::new(network.token, provider));

            let decimals = handle.decimals().await?;
            let raw = handle.balance_of(account).await?;
            println!("{}", format_units(raw, decimals));
        }
        Command::Balance { account: None } => {
            connect(&mut app, network.chain_id).await?;
            println!("{}", app.balance_display());
        }
        Command::Supply => {
            let provider = client::create_provider(&config.rpc_url)?;
            let handle = TokenHandle::new(Erc20::new(network.token, provider));

            let decimals = handle.decimals().await?;
            let supply = handle.total_supply().await?;
            println!("{}", format_units(supply, decimals));
        }
        Command::Transfer { to, amount } => {
            connect(&mut app, network.chain_id).await?;

            let mut form = TransferForm::new(to, amount);
            match form.submit(&app).await {
                Ok(Some(receipt)) => report(&Notice::sent(receipt.tx_hash)),
                Ok(None) => warn!("Recipient and amount are required"),
                Err(e) => {
                    let notice = Notice::from_error(&e);
                    report(&notice);
                    if notice.is_error() {
                        return Err(e.into());
                    }
                }
            }
        }
        Command::Estimate { to, amount } => {
            connect(&mut app, network.chain_id).await?;

            match app.estimate_transfer(to, &amount).await {
                Ok(gas) => println!("{gas}"),
                Err(e) => {
                    report(&Notice::from_error(&e));
                    return Err(e.into());
                }
            }
        }
        Command::Demo => {}
    }

    app.disconnect();
    Ok(())
}
