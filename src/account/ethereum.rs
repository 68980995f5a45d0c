use super::AddressDeriver;
use crate::codec;
use crate::error::{Error, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::utils;

pub const ADDRESS_SIZE: usize = 20;

/// Parses a 20-byte address given as hex, with or without `0x`.
pub fn parse_address(address: &str) -> Result<[u8; ADDRESS_SIZE]> {
    let data = codec::hex_decode(address)
        .map_err(|e| Error::InvalidAddress(format!("\"{}\": {}", address, e)))?;
    data.as_slice().try_into().map_err(|_| {
        Error::InvalidAddress(format!(
            "\"{}\" must be {} bytes, got {}",
            address,
            ADDRESS_SIZE,
            data.len()
        ))
    })
}

/// Last 20 bytes of keccak256 over the uncompressed public key, as lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthereumAddressDeriver;

impl AddressDeriver for EthereumAddressDeriver {
    fn address_string(&self, key: &PrivateKey) -> Result<String> {
        let public_key = key.public_key().serialize_uncompressed();
        let hash = utils::keccak256(&public_key[1..]);
        Ok(codec::hex_encode(&hash[32 - ADDRESS_SIZE..]))
    }

    fn validate_address(&self, address: &str) -> Result<()> {
        parse_address(address).map(|_| ())
    }

    fn leaf_key_compressed(&self) -> bool {
        false
    }

    fn import_private_key(&self, serialized: &str) -> Result<PrivateKey> {
        let data = zeroize::Zeroizing::new(codec::hex_decode(serialized)?);
        PrivateKey::from_slice(&data, false)
    }

    fn export_private_key(&self, key: &PrivateKey) -> String {
        codec::hex_encode(&*key.secret_bytes())
    }

    fn public_key_string(&self, key: &PublicKey) -> String {
        codec::hex_encode(&key.serialize_uncompressed()[1..])
    }
}
