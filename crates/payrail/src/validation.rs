//! Payload and provisioning validation patterns.
//!
//! One set of patterns serves both the webhook handler and the provisioning
//! binaries so a symbol accepted at registration time is always accepted at
//! dispatch time.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// EVM account or contract address: `0x` + 40 hex digits.
pub static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("valid address pattern"));

/// Token symbol: `$` followed by one or more letters.
pub static TOKEN_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$[A-Za-z]+$").expect("valid token pattern"));

/// Strictly positive decimal amount with at most 18 significant fractional
/// digits. Rejects "0", negatives, and anything non-numeric.
pub static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0\.0*[1-9]\d{0,17}|[1-9]\d*(\.\d{1,18})?)$").expect("valid amount pattern")
});

/// Chain name: a letter followed by letters and digits.
pub static CHAIN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("valid chain name pattern"));

/// Check that a string is a well-formed http(s) URL.
pub fn is_http_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
