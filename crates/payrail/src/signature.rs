//! Queue request signatures: HMAC-SHA256 over the raw body bytes, with
//! support for the queue's rotating current/next key pair.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over the given body bytes. Returns the hex-encoded MAC.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against one secret.
///
/// Uses the hmac crate's constant-time `verify_slice`; a signature that is not
/// valid hex is compared against zeros so the hex decode does not become a
/// timing side-channel.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);

    let expected = hex::decode(signature).unwrap_or_else(|_| vec![0u8; 32]);
    mac.verify_slice(&expected).is_ok()
}

/// Verify against the rotating key pair: the signature is accepted if it
/// matches either the current key or, when one is configured, the next key.
/// Both keys are always checked so a miss costs the same regardless of which
/// key would have matched.
pub fn verify_rotating(
    current: &[u8],
    next: Option<&[u8]>,
    body: &[u8],
    signature: &str,
) -> bool {
    let current_ok = verify_signature(current, body, signature);
    let next_ok = next.is_some_and(|key| verify_signature(key, body, signature));
    current_ok || next_ok
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().fold(String::new(), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{b:02x}");
            s
        })
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, ()> {
        if !s.len().is_multiple_of(2) || !s.is_ascii() {
            return Err(());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
            .collect()
    }
}
