//! Exact scaling of decimal amount strings into on-chain integer values.
//!
//! The submitted value must equal `round(amount * 10^decimals)` with no
//! fractional remainder, so scaling is done on the digit string with U256
//! arithmetic. Floats never enter the computation.

use alloy::primitives::U256;

use crate::error::DispatchError;

/// Scale a positive decimal string by `10^decimals`.
///
/// Fractional digits beyond `decimals` are rounded half-up. The caller is
/// expected to have matched the amount against [`crate::validation::AMOUNT`]
/// first; anything that still fails to parse maps to `InvalidPayload`.
pub fn scale_amount(amount: &str, decimals: u8) -> Result<U256, DispatchError> {
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || (!frac_part.is_empty() && !all_digits(frac_part)) {
        return Err(DispatchError::InvalidPayload);
    }
    if amount.contains('.') && frac_part.is_empty() {
        return Err(DispatchError::InvalidPayload);
    }

    let d = decimals as usize;
    let (kept, dropped) = if frac_part.len() > d {
        frac_part.split_at(d)
    } else {
        (frac_part, "")
    };

    let mut digits = String::with_capacity(int_part.len() + d);
    digits.push_str(int_part);
    digits.push_str(kept);
    for _ in kept.len()..d {
        digits.push('0');
    }

    let mut value =
        U256::from_str_radix(&digits, 10).map_err(|_| DispatchError::InvalidPayload)?;

    // Half-up rounding on the first digit past the token's precision.
    if dropped.bytes().next().is_some_and(|b| b >= b'5') {
        value += U256::from(1);
    }

    Ok(value)
}
