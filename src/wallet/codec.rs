//! Just enough CBOR and bech32 to read a balance and an address out of
//! CIP-30 wallet responses.

use bech32::{Bech32, Hrp};

use super::WalletError;

const LOVELACE_PER_ADA: u64 = 1_000_000;

/// Extract the lovelace amount from a CBOR-encoded `Value`.
///
/// A `Value` is either a plain coin amount or `[coin, multiasset]`; only the
/// coin is read.
pub fn decode_lovelace(cbor_hex: &str) -> Result<u64, WalletError> {
    let bytes = decode_hex(cbor_hex).map_err(|_| WalletError::InvalidBalance(cbor_hex.to_string()))?;
    let first = *bytes
        .first()
        .ok_or_else(|| WalletError::InvalidBalance(cbor_hex.to_string()))?;

    let offset = match first >> 5 {
        0 => 0,
        // Array header: the coin is the first element.
        4 => 1,
        _ => return Err(WalletError::InvalidBalance(cbor_hex.to_string())),
    };

    read_uint(&bytes, offset).ok_or_else(|| WalletError::InvalidBalance(cbor_hex.to_string()))
}

fn read_uint(bytes: &[u8], offset: usize) -> Option<u64> {
    let head = *bytes.get(offset)?;
    if head >> 5 != 0 {
        return None;
    }

    let width = match head & 0x1f {
        info @ 0..=23 => return Some(info as u64),
        24 => 1,
        25 => 2,
        26 => 4,
        27 => 8,
        _ => return None,
    };

    let arg = bytes.get(offset + 1..offset + 1 + width)?;
    Some(arg.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Convert raw address bytes (hex) to a bech32 address.
///
/// The network id sits in the low nibble of the header byte: 1 is mainnet
/// (`addr`), anything else a test network (`addr_test`).
pub fn hex_to_bech32(address_hex: &str) -> Result<String, WalletError> {
    let bytes =
        decode_hex(address_hex).map_err(|_| WalletError::InvalidAddress(address_hex.to_string()))?;
    let header = *bytes
        .first()
        .ok_or_else(|| WalletError::InvalidAddress(address_hex.to_string()))?;

    let prefix = if header & 0x0f == 1 { "addr" } else { "addr_test" };
    let hrp = Hrp::parse(prefix).map_err(|e| WalletError::InvalidAddress(e.to_string()))?;

    bech32::encode::<Bech32>(hrp, &bytes).map_err(|e| WalletError::InvalidAddress(e.to_string()))
}

/// Check that `address` is a bech32 Cardano payment address.
pub fn validate_address(address: &str) -> Result<(), WalletError> {
    let (hrp, bytes) =
        bech32::decode(address).map_err(|e| WalletError::InvalidAddress(e.to_string()))?;

    let prefix = hrp.to_string();
    if (prefix != "addr" && prefix != "addr_test") || bytes.is_empty() {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let clean = value.trim();
    let clean = clean.strip_prefix("0x").unwrap_or(clean);
    hex::decode(clean)
}

/// Render lovelace as ADA with two decimals and thousands separators.
pub fn format_ada(lovelace: u64) -> String {
    let lovelace = u128::from(lovelace);
    let per_ada = u128::from(LOVELACE_PER_ADA);
    let cents = (lovelace + per_ada / 200) / (per_ada / 100);
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}.{:02}", grouped, frac)
}

pub fn network_name(network_id: u8) -> &'static str {
    match network_id {
        1 => "Mainnet",
        0 => "Preview (Testnet)",
        _ => "Unknown",
    }
}
