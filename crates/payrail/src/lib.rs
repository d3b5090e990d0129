//! Custodial payout dispatch for a single EVM chain.
//!
//! A queue delivers signed webhook instructions ("pay address X amount Y of
//! token Z"); this library provides everything the dispatcher needs to act on
//! one: rotating-key signature verification, payload validation, chain/token
//! configuration backed by a key-value store, exact amount scaling, and
//! on-chain submission of native and ERC-20 transfers.
//!
//! # Components
//!
//! - [`signature`] — dual-key HMAC-SHA256 verification of queue requests
//! - [`validation`] — address/token/amount payload patterns
//! - [`store`] — [`ConfigStore`](store::ConfigStore) trait with SQLite and
//!   in-memory backends
//! - [`config`] — [`ChainConfig`](config::ChainConfig), the token registry,
//!   and the native-vs-token transfer resolution
//! - [`amount`] — integer scaling of decimal amount strings
//! - [`chain`] — alloy-based transfer submission with bounded receipt waits

pub mod amount;
pub mod chain;
pub mod config;
pub mod error;
pub mod security;
pub mod signature;
pub mod store;
pub mod validation;

use alloy::sol;

// ERC-20 contract surface used for token payouts. The sol! macro derives the
// typed contract bindings including the `transfer` call builder.
sol! {
    #[sol(rpc)]
    interface ERC20 {
        function transfer(address to, uint256 value) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }
}

pub use chain::{RpcSubmitter, Transfer, TransferSubmitter};
pub use config::{ChainConfig, TokenEntry, TokenRegistry, TransferRequest};
pub use error::DispatchError;
pub use store::{ConfigStore, InMemoryConfigStore, SqliteConfigStore};
