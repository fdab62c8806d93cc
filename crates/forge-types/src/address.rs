//! Address and URI validation.
//!
//! Addresses are base58-encoded 32-byte public keys. Validation happens before any
//! network call so malformed input fails fast.

use crate::error::ForgeError;

/// Length in bytes of a decoded public key.
pub const ADDRESS_LEN: usize = 32;

/// Parse and validate a base58 address, returning it trimmed.
///
/// Accepts formats: "7NLD2Ps6Xek4kjkM1gFxFAFZqf7nJA2jjQWeq3QHvm77"
pub fn parse_address(addr: &str) -> Result<String, ForgeError> {
    let s = addr.trim();
    if s.is_empty() {
        return Err(ForgeError::InvalidInput("empty address".to_string()));
    }
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| ForgeError::InvalidInput(format!("invalid base58 address '{}': {}", addr, e)))?;
    if bytes.len() != ADDRESS_LEN {
        return Err(ForgeError::InvalidInput(format!(
            "address '{}' decodes to {} bytes, expected {}",
            addr,
            bytes.len(),
            ADDRESS_LEN
        )));
    }
    Ok(s.to_string())
}

/// Encode raw public key bytes as an address.
pub fn encode_address(bytes: &[u8; ADDRESS_LEN]) -> String {
    bs58::encode(bytes).into_string()
}

/// Metadata URIs must point at an http(s) gateway.
pub fn is_http_uri(uri: &str) -> bool {
    let lower = uri.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
