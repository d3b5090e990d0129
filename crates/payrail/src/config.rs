//! Typed access to the chain and token records, and the native-vs-token
//! transfer resolution used by the dispatch pipeline.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::amount::scale_amount;
use crate::chain::Transfer;
use crate::error::DispatchError;
use crate::store::{ConfigStore, CHAIN_CONFIG_KEY, TOKEN_REGISTRY_KEY};
use crate::validation;

/// Names of the seven fields a usable chain record must carry.
const CHAIN_CONFIG_FIELDS: [&str; 7] = [
    "chainId",
    "chainName",
    "rpcUrl",
    "token",
    "decimals",
    "blockExplorerUrl",
    "privateKey",
];

/// The singleton chain record written by `provision-chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_url: String,
    /// Native token symbol, `$`-prefixed.
    pub token: String,
    /// Native token decimals.
    pub decimals: u8,
    pub block_explorer_url: String,
    /// Custodial signing key. Never logged.
    pub private_key: String,
}

impl ChainConfig {
    /// Parse a stored value, applying the completeness rule: the record must
    /// be an object with exactly the seven expected fields, all truthy. A
    /// partially written record is indistinguishable from an absent one.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.len() != CHAIN_CONFIG_FIELDS.len() {
            return None;
        }
        for field in CHAIN_CONFIG_FIELDS {
            if !truthy(obj.get(field)?) {
                return None;
            }
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Block-explorer URL for a transaction hash.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.block_explorer_url.trim_end_matches('/'), tx_hash)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One registered token: contract address plus decimals (stored as an
/// integer string, matching what `provision-token` writes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub address: String,
    pub decimals: String,
}

impl TokenEntry {
    /// Parse a registry value. Entries with missing or empty fields are
    /// rejected here rather than at submission time; a numeric `decimals`
    /// written by an older provisioning run is accepted.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let address = obj.get("address")?.as_str()?.to_string();
        let decimals = match obj.get("decimals")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if address.is_empty() || decimals.is_empty() {
            return None;
        }
        Some(Self { address, decimals })
    }
}

/// The token registry: lowercase `$`-prefixed symbol to raw entry value.
/// Entries stay raw so one malformed entry cannot poison lookups of the rest.
pub type TokenRegistry = BTreeMap<String, Value>;

/// Load the chain record. `Ok(None)` covers both an absent key and an
/// incomplete record.
pub fn chain_config(store: &dyn ConfigStore) -> Result<Option<ChainConfig>, DispatchError> {
    Ok(store
        .get(CHAIN_CONFIG_KEY)?
        .as_ref()
        .and_then(ChainConfig::from_value))
}

/// Load the token registry. An unset key yields an empty registry, never an
/// error.
pub fn token_registry(store: &dyn ConfigStore) -> Result<TokenRegistry, DispatchError> {
    match store.get(TOKEN_REGISTRY_KEY)? {
        Some(value) => Ok(serde_json::from_value(value).unwrap_or_default()),
        None => Ok(TokenRegistry::new()),
    }
}

/// Read-merge-write one token into the registry. Previously registered
/// entries are preserved; re-registering a symbol replaces its entry.
/// Returns the registry as read back after the write.
///
/// The merge is optimistic: two concurrent registrations may lose one
/// update, which is acceptable for an operator tool.
pub fn register_token(
    store: &dyn ConfigStore,
    symbol: &str,
    entry: &TokenEntry,
) -> Result<TokenRegistry, DispatchError> {
    let mut registry = token_registry(store)?;
    registry.insert(
        symbol.to_string(),
        serde_json::to_value(entry).map_err(|e| DispatchError::Store(e.to_string()))?,
    );
    let value =
        serde_json::to_value(&registry).map_err(|e| DispatchError::Store(e.to_string()))?;
    store.set(TOKEN_REGISTRY_KEY, &value)?;
    token_registry(store)
}

/// The inbound webhook payload. `amount` may arrive as a JSON number or a
/// string; it is coerced to its string form before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
}

/// A payload that passed pattern validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub address: Address,
    pub token: String,
    pub amount: String,
}

impl TransferRequest {
    fn amount_string(&self) -> String {
        match &self.amount {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Validate the three fields against the payload patterns.
    pub fn validate(&self) -> Result<ValidatedRequest, DispatchError> {
        let address = self.address.as_deref().unwrap_or_default();
        let token = self.token.as_deref().unwrap_or_default();
        let amount = self.amount_string();

        if !validation::ADDRESS.is_match(address)
            || !validation::TOKEN_SYMBOL.is_match(token)
            || !validation::AMOUNT.is_match(&amount)
        {
            return Err(DispatchError::InvalidPayload);
        }

        let address = address.parse().map_err(|_| DispatchError::InvalidPayload)?;
        Ok(ValidatedRequest {
            address,
            token: token.to_string(),
            amount,
        })
    }
}

/// Decide between a native and a token transfer and scale the amount with the
/// matching decimals.
///
/// A symbol equal to the chain's native symbol (case-insensitive) always
/// routes to a native transfer, regardless of registry contents. Anything
/// else must resolve to a complete registry entry.
pub fn resolve_transfer(
    config: &ChainConfig,
    registry: &TokenRegistry,
    request: &ValidatedRequest,
) -> Result<Transfer, DispatchError> {
    if request.token.eq_ignore_ascii_case(&config.token) {
        let value = scale_amount(&request.amount, config.decimals)?;
        return Ok(Transfer::Native {
            to: request.address,
            value,
        });
    }

    let entry = registry
        .get(&request.token.to_lowercase())
        .and_then(TokenEntry::from_value)
        .ok_or(DispatchError::UnknownToken)?;

    let contract: Address = entry
        .address
        .parse()
        .map_err(|_| DispatchError::UnknownToken)?;
    let decimals: u8 = entry
        .decimals
        .parse()
        .ok()
        .filter(|d| *d <= 18)
        .ok_or(DispatchError::UnknownToken)?;

    let value = scale_amount(&request.amount, decimals)?;
    Ok(Transfer::Token {
        contract,
        to: request.address,
        value,
    })
}
