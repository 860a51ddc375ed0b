//! Hand-rolled ABI encoding for the two ERC-20 calls the service issues, plus
//! exact conversion between human decimal amounts and minimal token units.
//!
//! Amount conversion never goes through floating point. Excess fractional
//! digits are rejected, not truncated: the source variants disagreed on this
//! and silent truncation loses user funds.

use ethers::types::U256;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{
    constants::{SELECTOR_BALANCE_OF, SELECTOR_TRANSFER},
    error::{AppError, Result},
};

/// Exactly `0x` followed by 40 hex characters. Checksum casing is not enforced.
pub fn is_valid_address(value: &str) -> bool {
    let normalized = value.trim();
    normalized.starts_with("0x")
        && normalized.len() == 42
        && normalized[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn address_word(address: &str) -> Result<String> {
    if !is_valid_address(address) {
        return Err(AppError::InvalidAddress(format!(
            "expected 0x + 40 hex chars, got {:?}",
            address
        )));
    }
    Ok(format!("{:0>64}", address[2..].to_ascii_lowercase()))
}

/// Converts a human decimal amount into minimal units (`amount * 10^decimals`).
///
/// Errors with `InvalidAmount` when the input is not a plain decimal number,
/// is not strictly positive, or carries more fractional digits than the token
/// allows.
pub fn to_minimal_units(human: &str, decimals: u32) -> Result<U256> {
    let amount = Decimal::from_str(human.trim())
        .map_err(|_| AppError::InvalidAmount(format!("not a decimal number: {:?}", human)))?;
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(
            "amount must be positive".to_string(),
        ));
    }

    let amount = amount.normalize();
    if amount.scale() > decimals {
        return Err(AppError::InvalidAmount(format!(
            "more than {} fractional digits",
            decimals
        )));
    }

    let mantissa = U256::from(amount.mantissa() as u128);
    mantissa
        .checked_mul(U256::exp10((decimals - amount.scale()) as usize))
        .ok_or_else(|| AppError::InvalidAmount("amount out of range".to_string()))
}

/// Exact inverse of [`to_minimal_units`]. Errors when the value does not fit
/// a `Decimal` mantissa (96 bits), which no sane token balance reaches.
pub fn to_human_units(minimal: U256, decimals: u32) -> Result<Decimal> {
    if minimal.bits() > 96 {
        return Err(AppError::InvalidAmount(
            "minimal amount exceeds decimal range".to_string(),
        ));
    }
    let value = Decimal::try_from_i128_with_scale(minimal.as_u128() as i128, decimals)
        .map_err(|e| AppError::InvalidAmount(e.to_string()))?;
    Ok(value.normalize())
}

/// Calldata for `balanceOf(address)`: 4-byte selector + 32-byte padded address.
pub fn encode_balance_of(address: &str) -> Result<String> {
    Ok(format!("0x{}{}", SELECTOR_BALANCE_OF, address_word(address)?))
}

/// Calldata for `transfer(address,uint256)`.
pub fn encode_transfer(address: &str, minimal_amount: U256) -> Result<String> {
    Ok(format!(
        "0x{}{}{}",
        SELECTOR_TRANSFER,
        address_word(address)?,
        uint_word(minimal_amount)
    ))
}

fn uint_word(value: U256) -> String {
    format!("{:0>64}", format!("{:x}", value))
}

/// Lenient hex-quantity decode for RPC results. Malformed input decodes to
/// zero because balance reads are display-only and degrade rather than fail.
pub fn decode_hex_quantity(value: &str) -> U256 {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() {
        return U256::zero();
    }
    U256::from_str_radix(digits, 16).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xd0617b54fb4b6b66307846f217b4d685800e3da4";

    #[test]
    fn address_validation_accepts_canonical_form() {
        assert!(is_valid_address(ADDR));
        assert!(is_valid_address("0xD0617B54FB4B6B66307846F217B4D685800E3DA4"));
    }

    #[test]
    fn address_validation_rejects_malformed_input() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("d0617b54fb4b6b66307846f217b4d685800e3da4"));
        // off by one, both directions
        assert!(!is_valid_address("0xd0617b54fb4b6b66307846f217b4d685800e3da"));
        assert!(!is_valid_address("0xd0617b54fb4b6b66307846f217b4d685800e3da44"));
        // non-hex character
        assert!(!is_valid_address("0xg0617b54fb4b6b66307846f217b4d685800e3da4"));
    }

    #[test]
    fn minimal_units_round_trip() {
        for human in ["1.5", "0.000000000000000001", "42", "123.456789"] {
            let units = to_minimal_units(human, 18).unwrap();
            let back = to_human_units(units, 18).unwrap();
            assert_eq!(back.to_string(), human, "round trip for {}", human);
        }
    }

    #[test]
    fn minimal_units_scales_by_decimals() {
        assert_eq!(to_minimal_units("1", 18).unwrap(), U256::exp10(18));
        assert_eq!(to_minimal_units("0.1", 6).unwrap(), U256::from(100_000u64));
        assert_eq!(to_minimal_units("2", 0).unwrap(), U256::from(2u64));
    }

    #[test]
    fn minimal_units_rejects_bad_amounts() {
        assert!(to_minimal_units("abc", 18).is_err());
        assert!(to_minimal_units("", 18).is_err());
        assert!(to_minimal_units("0", 18).is_err());
        assert!(to_minimal_units("-1", 18).is_err());
    }

    #[test]
    fn minimal_units_rejects_excess_fractional_digits() {
        // 7 fractional digits on a 6-decimals token
        assert!(to_minimal_units("0.1234567", 6).is_err());
        // trailing zeros beyond the limit are fine after normalization
        assert!(to_minimal_units("0.1234560", 6).is_ok());
    }

    #[test]
    fn balance_of_call_has_selector_and_one_word() {
        let data = encode_balance_of(ADDR).unwrap();
        assert!(data.starts_with("0x70a08231"));
        // 0x + 4-byte selector + 32-byte argument
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(data.ends_with("d0617b54fb4b6b66307846f217b4d685800e3da4"));
    }

    #[test]
    fn transfer_call_has_selector_and_two_words() {
        let data = encode_transfer(ADDR, U256::from(1_000_000u64)).unwrap();
        assert!(data.starts_with("0xa9059cbb"));
        assert_eq!(data.len(), 2 + 8 + 64 + 64);
        assert!(data.ends_with(&format!("{:0>64}", format!("{:x}", U256::from(1_000_000u64)))));
    }

    #[test]
    fn encode_rejects_invalid_address() {
        assert!(encode_balance_of("0x123").is_err());
        assert!(encode_transfer("not-an-address", U256::one()).is_err());
    }

    #[test]
    fn hex_quantity_decoding_is_lenient() {
        assert_eq!(decode_hex_quantity("0x0"), U256::zero());
        assert_eq!(decode_hex_quantity("0xde0b6b3a7640000"), U256::exp10(18));
        assert_eq!(decode_hex_quantity(""), U256::zero());
        assert_eq!(decode_hex_quantity("0x"), U256::zero());
        assert_eq!(decode_hex_quantity("zz"), U256::zero());
    }
}
