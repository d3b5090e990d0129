use std::sync::Arc;

use payrail::{ConfigStore, TransferSubmitter};

/// The queue's rotating signing keys. Requests signed under either key are
/// accepted, so the queue operator can rotate with zero downtime.
pub struct SigningKeys {
    pub current: Vec<u8>,
    pub next: Option<Vec<u8>>,
}

/// Shared application state for the dispatcher server.
///
/// All durable state lives behind the injected [`ConfigStore`]; nothing here
/// is mutated by request handling except the signing lock.
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
    pub submitter: Arc<dyn TransferSubmitter>,
    pub signing_keys: SigningKeys,
    /// Serializes submissions: one custodial account means concurrent
    /// requests would otherwise race on its nonce.
    pub signing_lock: tokio::sync::Mutex<()>,
    /// Bearer token for the /metrics endpoint.
    pub metrics_token: Option<Vec<u8>>,
}
