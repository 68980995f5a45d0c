use super::AddressDeriver;
use crate::codec;
use crate::currency::{BlockchainType, NET_TYPE_MAINNET, NET_TYPE_TESTNET};
use crate::error::{Error, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitcoinNetwork {
    Mainnet,
    Testnet,
}

impl BitcoinNetwork {
    pub fn from_net_type(net_type: u32) -> Result<Self> {
        match net_type {
            NET_TYPE_MAINNET => Ok(BitcoinNetwork::Mainnet),
            NET_TYPE_TESTNET => Ok(BitcoinNetwork::Testnet),
            _ => Err(Error::InvalidArgument(format!(
                "Unknown Bitcoin net type {}",
                net_type
            ))),
        }
    }

    pub fn p2pkh_prefix(&self) -> u8 {
        match self {
            BitcoinNetwork::Mainnet => 0x00,
            BitcoinNetwork::Testnet => 0x6f,
        }
    }

    pub fn p2sh_prefix(&self) -> u8 {
        match self {
            BitcoinNetwork::Mainnet => 0x05,
            BitcoinNetwork::Testnet => 0xc4,
        }
    }

    pub fn wif_prefix(&self) -> u8 {
        match self {
            BitcoinNetwork::Mainnet => 0x80,
            BitcoinNetwork::Testnet => 0xef,
        }
    }
}

/// Decoded destination of a Bitcoin address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitcoinAddress {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

impl BitcoinAddress {
    pub fn decode(address: &str, network: BitcoinNetwork) -> Result<Self> {
        let data = codec::base58check_decode(address)
            .map_err(|e| Error::InvalidAddress(format!("\"{}\": {}", address, e)))?;
        if data.len() != 21 {
            return Err(Error::InvalidAddress(format!(
                "\"{}\" has invalid length",
                address
            )));
        }

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&data[1..]);
        match data[0] {
            prefix if prefix == network.p2pkh_prefix() => Ok(BitcoinAddress::PubkeyHash(hash)),
            prefix if prefix == network.p2sh_prefix() => Ok(BitcoinAddress::ScriptHash(hash)),
            prefix => Err(Error::InvalidAddress(format!(
                "\"{}\" has prefix {:#04x}, not valid for {:?}",
                address, prefix, network
            ))),
        }
    }

    pub fn script_pubkey(&self) -> Vec<u8> {
        match self {
            // OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
            BitcoinAddress::PubkeyHash(hash) => {
                let mut script = vec![0x76, 0xa9, 0x14];
                script.extend_from_slice(hash);
                script.extend_from_slice(&[0x88, 0xac]);
                script
            }
            // OP_HASH160 <hash> OP_EQUAL
            BitcoinAddress::ScriptHash(hash) => {
                let mut script = vec![0xa9, 0x14];
                script.extend_from_slice(hash);
                script.push(0x87);
                script
            }
        }
    }
}

/// P2PKH addresses and WIF keys.
#[derive(Debug, Clone, Copy)]
pub struct BitcoinAddressDeriver {
    network: BitcoinNetwork,
}

impl BitcoinAddressDeriver {
    pub fn new(blockchain: BlockchainType) -> Result<Self> {
        Ok(BitcoinAddressDeriver {
            network: BitcoinNetwork::from_net_type(blockchain.net_type)?,
        })
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }
}

impl AddressDeriver for BitcoinAddressDeriver {
    fn address_string(&self, key: &PrivateKey) -> Result<String> {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.p2pkh_prefix());
        payload.extend_from_slice(&utils::hash160(&key.public_key().serialize()));
        Ok(codec::base58check_encode(&payload))
    }

    fn validate_address(&self, address: &str) -> Result<()> {
        BitcoinAddress::decode(address, self.network).map(|_| ())
    }

    fn leaf_key_compressed(&self) -> bool {
        true
    }

    fn import_private_key(&self, serialized: &str) -> Result<PrivateKey> {
        let (version, key) = PrivateKey::from_wif(serialized)?;
        if version != self.network.wif_prefix() {
            return Err(Error::InvalidKey(format!(
                "WIF prefix {:#04x} doesn't match {:?}",
                version, self.network
            )));
        }
        Ok(key)
    }

    fn export_private_key(&self, key: &PrivateKey) -> String {
        key.to_wif(self.network.wif_prefix())
    }

    fn public_key_string(&self, key: &PublicKey) -> String {
        codec::hex_encode(&key.serialize())
    }
}
