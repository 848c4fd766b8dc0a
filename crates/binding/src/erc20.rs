//! [`Token`] backend over an alloy provider.

use crate::{
    token::IERC20, PendingTransfer, Token, TransferEvent, TransferFilter, TransferReceipt,
};
use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use client::ClientError;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};

/// Largest block range queried with a single `eth_getLogs`.
const LOG_CHUNK_SIZE: u64 = 9_500;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// ERC20 token reached through an alloy provider.
///
/// Writes go through the provider's signer (a local wallet filler or a
/// remote wallet endpoint); `sender` pins the `from` field so wallets that
/// manage several accounts sign with the connected one.
#[derive(Debug, Clone)]
pub struct Erc20<P> {
    address: Address,
    provider: P,
    sender: Option<Address>,
    poll_interval: Duration,
}

impl<P> Erc20<P>
where
    P: Provider + Clone + 'static,
{
    pub const fn new(address: Address, provider: P) -> Self {
        Self {
            address,
            provider,
            sender: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub const fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    /// How often new blocks are scanned for `Transfer` logs.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Query `Transfer` logs in `[from_block, to_block]`.
    pub async fn query_transfers(
        &self,
        filter: &TransferFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferEvent>, ClientError> {
        let contract = IERC20::new(self.address, &self.provider);

        let mut query = contract
            .Transfer_filter()
            .from_block(from_block)
            .to_block(to_block);
        if let Some(from) = filter.from {
            query = query.topic1(from.into_word());
        }
        if let Some(to) = filter.to {
            query = query.topic2(to.into_word());
        }

        let logs = query.query().await?;

        Ok(logs
            .into_iter()
            .map(|(event, log)| TransferEvent {
                from: event.from,
                to: event.to,
                value: event.value,
                block_number: log.block_number.unwrap_or_default(),
                log_index: log.log_index.unwrap_or_default(),
                tx_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn poll_transfers(
        self,
        filter: TransferFilter,
        mut next_block: u64,
        events: mpsc::UnboundedSender<TransferEvent>,
    ) {
        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = events.closed() => {
                    debug!(token = %self.address, ?filter, "Transfer poller stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            let head = match self.provider.get_block_number().await {
                Ok(head) => head,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch block number, will retry");
                    continue;
                }
            };

            while next_block <= head {
                let chunk_end = (next_block + LOG_CHUNK_SIZE - 1).min(head);

                match self.query_transfers(&filter, next_block, chunk_end).await {
                    Ok(batch) => {
                        for event in batch {
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                        next_block = chunk_end + 1;
                    }
                    Err(e) => {
                        warn!(
                            from = next_block,
                            to = chunk_end,
                            error = %e,
                            "Transfer log query failed, will retry"
                        );
                        break;
                    }
                }
            }
        }
    }
}

impl<P> Token for Erc20<P>
where
    P: Provider + Clone + 'static,
{
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, holder: Address) -> Result<U256, ClientError> {
        debug!("Querying erc20 {} balance: address={}", self.address, holder);

        let contract = IERC20::new(self.address, &self.provider);
        Ok(contract.balanceOf(holder).call().await?)
    }

    async fn decimals(&self) -> Result<u8, ClientError> {
        let contract = IERC20::new(self.address, &self.provider);
        Ok(contract.decimals().call().await?)
    }

    async fn total_supply(&self) -> Result<U256, ClientError> {
        let contract = IERC20::new(self.address, &self.provider);
        Ok(contract.totalSupply().call().await?)
    }

    async fn estimate_transfer_gas(&self, to: Address, amount: U256) -> Result<u64, ClientError> {
        let contract = IERC20::new(self.address, &self.provider);

        let mut call = contract.transfer(to, amount);
        if let Some(sender) = self.sender {
            call = call.from(sender);
        }

        Ok(call.estimate_gas().await?)
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<PendingTransfer, ClientError> {
        let contract = IERC20::new(self.address, &self.provider);

        let mut call = contract.transfer(to, amount);
        if let Some(sender) = self.sender {
            call = call.from(sender);
        }

        let pending = call.send().await?;
        let tx_hash = *pending.tx_hash();

        Ok(PendingTransfer::new(tx_hash, async move {
            let receipt = pending.get_receipt().await?;

            if !receipt.status() {
                return Err(ClientError::Revert(format!(
                    "transaction {tx_hash} failed on chain"
                )));
            }

            Ok(TransferReceipt {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
                gas_used: Some(receipt.gas_used),
            })
        }))
    }

    async fn watch_transfers(
        &self,
        filter: TransferFilter,
    ) -> Result<mpsc::UnboundedReceiver<TransferEvent>, ClientError> {
        // Only logs from blocks after the subscription point are delivered.
        let start = self.provider.get_block_number().await? + 1;
        let (events, receiver) = mpsc::unbounded_channel();

        debug!(token = %self.address, ?filter, start, "Starting transfer poller");
        tokio::spawn(self.clone().poll_transfers(filter, start, events));

        Ok(receiver)
    }
}
