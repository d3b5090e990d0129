use thiserror::Error;

/// Errors produced by the dispatch pipeline.
///
/// The `Display` text of each variant is the exact body returned to the queue
/// when that failure is surfaced, so the messages are part of the wire
/// contract and must stay stable.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request signature did not verify under either rotating key.
    #[error("Signature verification failed.")]
    Authentication,

    /// The payload was missing or failed address/token/amount validation.
    #[error("Invalid payload request.")]
    InvalidPayload,

    /// No chain record in the store, or the record is incomplete.
    #[error("RPC not configured or found.")]
    ChainNotConfigured,

    /// The token is neither the native symbol nor a usable registry entry.
    #[error("Invalid token.")]
    UnknownToken,

    /// Broadcast or confirmation failure at the chain client.
    #[error("chain error: {0}")]
    Chain(String),

    /// Key-value store I/O failure.
    #[error("store error: {0}")]
    Store(String),
}
