//! Chain client: provider construction, native and ERC-20 transfers, and the
//! submission seam the dispatcher is tested through.

use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{
    fillers::{
        BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::config::ChainConfig;
use crate::error::DispatchError;
use crate::ERC20;

/// Default bound on the receipt wait.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Concrete provider type from `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Concrete provider type from `ProviderBuilder::new().connect_http(...)`
/// (no wallet; used for read-only liveness checks).
pub type ReadProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
>;

/// One fully resolved outbound transaction: recipient plus an exact integer
/// value, either as a plain value transfer or an ERC-20 `transfer` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Native {
        to: Address,
        value: U256,
    },
    Token {
        contract: Address,
        to: Address,
        value: U256,
    },
}

/// Derive the signing account's address from the configured private key.
pub fn derive_address(private_key: &str) -> Result<Address, DispatchError> {
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|_| DispatchError::Chain("invalid signing key".to_string()))?;
    Ok(signer.address())
}

/// Build a wallet provider for the configured chain.
pub fn connect(rpc_url: &str, private_key: &str) -> Result<WalletProvider, DispatchError> {
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|_| DispatchError::Chain("invalid signing key".to_string()))?;
    let url = rpc_url
        .parse()
        .map_err(|_| DispatchError::Chain(format!("invalid rpc url: {rpc_url}")))?;
    Ok(ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(url))
}

/// Build a read-only provider (no signing capability).
pub fn connect_readonly(rpc_url: &str) -> Result<ReadProvider, DispatchError> {
    let url = rpc_url
        .parse()
        .map_err(|_| DispatchError::Chain(format!("invalid rpc url: {rpc_url}")))?;
    Ok(ProviderBuilder::new().connect_http(url))
}

/// Query the chain id the RPC endpoint reports.
pub async fn chain_id<P: Provider>(provider: &P) -> Result<u64, DispatchError> {
    provider
        .get_chain_id()
        .await
        .map_err(|e| DispatchError::Chain(format!("chain id query failed: {e}")))
}

/// Send a plain value transfer and wait (bounded) for its receipt.
/// Returns the transaction hash.
pub async fn transfer_native<P: Provider>(
    provider: &P,
    to: Address,
    value: U256,
    receipt_timeout: Duration,
) -> Result<String, DispatchError> {
    let tx = TransactionRequest::default().with_to(to).with_value(value);
    let pending = provider
        .send_transaction(tx)
        .await
        .map_err(|e| DispatchError::Chain(format!("native transfer send failed: {e}")))?;

    let receipt = tokio::time::timeout(receipt_timeout, pending.get_receipt())
        .await
        .map_err(|_| {
            DispatchError::Chain(format!(
                "receipt wait timed out after {}s",
                receipt_timeout.as_secs()
            ))
        })?
        .map_err(|e| DispatchError::Chain(format!("native transfer receipt failed: {e}")))?;

    if !receipt.status() {
        return Err(DispatchError::Chain("native transfer reverted".to_string()));
    }
    Ok(receipt.transaction_hash.to_string())
}

/// Execute `transfer(to, value)` on the token contract and wait (bounded) for
/// its receipt. Returns the transaction hash.
pub async fn transfer_erc20<P: Provider>(
    provider: &P,
    contract: Address,
    to: Address,
    value: U256,
    receipt_timeout: Duration,
) -> Result<String, DispatchError> {
    let token = ERC20::new(contract, provider);
    let pending = token
        .transfer(to, value)
        .send()
        .await
        .map_err(|e| DispatchError::Chain(format!("token transfer send failed: {e}")))?;

    let receipt = tokio::time::timeout(receipt_timeout, pending.get_receipt())
        .await
        .map_err(|_| {
            DispatchError::Chain(format!(
                "receipt wait timed out after {}s",
                receipt_timeout.as_secs()
            ))
        })?
        .map_err(|e| DispatchError::Chain(format!("token transfer receipt failed: {e}")))?;

    if !receipt.status() {
        return Err(DispatchError::Chain("token transfer reverted".to_string()));
    }
    Ok(receipt.transaction_hash.to_string())
}

/// Submission seam between the dispatch pipeline and the chain.
///
/// The production implementation talks to the configured RPC endpoint; tests
/// substitute a recording double.
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Submit the transfer from the configured signing account, wait for its
    /// receipt, and return the transaction hash.
    async fn submit(
        &self,
        config: &ChainConfig,
        transfer: Transfer,
    ) -> Result<String, DispatchError>;
}

/// Submitter that builds a wallet provider per request from the stored chain
/// record. The record is dynamic (an operator can re-provision at any time),
/// so nothing about the connection is cached.
pub struct RpcSubmitter {
    receipt_timeout: Duration,
}

impl RpcSubmitter {
    pub fn new(receipt_timeout: Duration) -> Self {
        Self { receipt_timeout }
    }

    /// Read the receipt timeout from `TX_RECEIPT_TIMEOUT_SECS`, falling back
    /// to the default bound.
    pub fn from_env() -> Self {
        let receipt_timeout = std::env::var("TX_RECEIPT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECEIPT_TIMEOUT);
        Self::new(receipt_timeout)
    }
}

impl Default for RpcSubmitter {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIPT_TIMEOUT)
    }
}

#[async_trait]
impl TransferSubmitter for RpcSubmitter {
    async fn submit(
        &self,
        config: &ChainConfig,
        transfer: Transfer,
    ) -> Result<String, DispatchError> {
        let provider = connect(&config.rpc_url, &config.private_key)?;
        match transfer {
            Transfer::Native { to, value } => {
                transfer_native(&provider, to, value, self.receipt_timeout).await
            }
            Transfer::Token {
                contract,
                to,
                value,
            } => transfer_erc20(&provider, contract, to, value, self.receipt_timeout).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_address_from_known_key() {
        // secp256k1 key 0x...01 has a well-known address.
        let key = format!("0x{}01", "00".repeat(31));
        let address = derive_address(&key).unwrap();
        assert_eq!(
            address,
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn derive_address_rejects_garbage() {
        assert!(derive_address("not-a-key").is_err());
        assert!(derive_address("").is_err());
    }

    #[test]
    fn connect_rejects_bad_url() {
        let key = format!("0x{}01", "00".repeat(31));
        assert!(connect("not a url", &key).is_err());
        assert!(connect_readonly("not a url").is_err());
    }
}
