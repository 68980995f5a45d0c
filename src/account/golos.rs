use super::AddressDeriver;
use crate::codec;
use crate::error::{Error, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::utils;

pub const PUBLIC_KEY_PREFIX: &str = "GLS";
const WIF_PREFIX: u8 = 0x80;
const MIN_ACCOUNT_NAME_LENGTH: usize = 3;
const MAX_ACCOUNT_NAME_LENGTH: usize = 16;

/// `GLS` followed by base58 of the compressed key and a 4-byte RIPEMD160 checksum.
pub fn format_public_key(key: &PublicKey) -> String {
    let compressed = key.serialize_compressed();
    let checksum = utils::ripemd160(&compressed);
    let mut data = Vec::with_capacity(37);
    data.extend_from_slice(&compressed);
    data.extend_from_slice(&checksum[..4]);
    format!("{}{}", PUBLIC_KEY_PREFIX, codec::base58_encode(&data))
}

/// Checks chain account-name rules: 3 to 16 characters, dot-separated
/// segments of at least 3 characters that start with a letter, end with
/// a letter or digit and otherwise hold lowercase letters, digits and dashes.
pub fn validate_account_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::InvalidAddress(format!("\"{}\" {}", name, reason)));

    if name.len() < MIN_ACCOUNT_NAME_LENGTH {
        return invalid("is too short");
    }
    if name.len() > MAX_ACCOUNT_NAME_LENGTH {
        return invalid("is too long");
    }

    for segment in name.split('.') {
        let bytes = segment.as_bytes();
        if bytes.len() < MIN_ACCOUNT_NAME_LENGTH {
            return invalid("has a segment shorter than 3 characters");
        }
        if !bytes[0].is_ascii_lowercase() {
            return invalid("has a segment not starting with a letter");
        }
        let last = bytes[bytes.len() - 1];
        if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
            return invalid("has a segment not ending with a letter or digit");
        }
        if !bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        {
            return invalid("contains invalid characters");
        }
    }
    Ok(())
}

/// Golos keys: WIF private keys and `GLS` public keys.
///
/// Accounts on chain are named by their owners, so the address of an HD
/// leaf is its public key string.
#[derive(Debug, Clone, Copy, Default)]
pub struct GolosAddressDeriver;

impl AddressDeriver for GolosAddressDeriver {
    fn address_string(&self, key: &PrivateKey) -> Result<String> {
        Ok(format_public_key(&key.public_key()))
    }

    fn validate_address(&self, address: &str) -> Result<()> {
        validate_account_name(address)
    }

    fn leaf_key_compressed(&self) -> bool {
        false
    }

    fn import_private_key(&self, serialized: &str) -> Result<PrivateKey> {
        let (version, key) = PrivateKey::from_wif(serialized)?;
        if version != WIF_PREFIX {
            return Err(Error::InvalidKey(format!(
                "Unexpected WIF prefix {:#04x}",
                version
            )));
        }
        Ok(key)
    }

    fn export_private_key(&self, key: &PrivateKey) -> String {
        key.to_wif(WIF_PREFIX)
    }

    fn public_key_string(&self, key: &PublicKey) -> String {
        format_public_key(key)
    }
}
