//! Accounts: a BIP-44 account node with memoized addresses, and the leaf
//! (or imported) key accounts transactions are built from.

pub mod bitcoin;
pub mod ethereum;
pub mod golos;

use crate::bip32::{self, ChildNumber, DerivationPath, ExtendedPrivKey, ExtendedPubKey};
use crate::bip44::{AccountLevel, AddressType, Bip44Path};
use crate::currency::{BlockchainType, Currency};
use crate::error::{Error, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::utils;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Per-currency rules for addresses and the key formats behind them.
pub trait AddressDeriver {
    /// Deterministic address of the key.
    fn address_string(&self, key: &PrivateKey) -> Result<String>;

    fn validate_address(&self, address: &str) -> Result<()>;

    /// Whether HD leaf keys use the compressed public key form.
    fn leaf_key_compressed(&self) -> bool;

    fn import_private_key(&self, serialized: &str) -> Result<PrivateKey>;

    fn export_private_key(&self, key: &PrivateKey) -> String;

    fn public_key_string(&self, key: &PublicKey) -> String;
}

pub fn address_deriver(blockchain: BlockchainType) -> Result<Box<dyn AddressDeriver>> {
    Ok(match blockchain.currency {
        Currency::Bitcoin => Box::new(bitcoin::BitcoinAddressDeriver::new(blockchain)?),
        Currency::Ethereum => Box::new(ethereum::EthereumAddressDeriver),
        Currency::Golos => Box::new(golos::GolosAddressDeriver),
    })
}

pub fn validate_address(blockchain: BlockchainType, address: &str) -> Result<()> {
    address_deriver(blockchain)?.validate_address(address)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Private,
    Public,
}

/// One derived address of an [`HdAccount`].
#[derive(Debug)]
pub struct AccountAddress {
    path: DerivationPath,
    extended_key: ExtendedPrivKey,
    private_key: PrivateKey,
    address: String,
}

impl AccountAddress {
    pub fn address_string(&self) -> &str {
        &self.address
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn extended_key(&self) -> &ExtendedPrivKey {
        &self.extended_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// A BIP-44 account: `m/44'/coin'/account'` plus memoized addresses below it.
#[derive(Debug)]
pub struct HdAccount {
    blockchain: BlockchainType,
    account_key: ExtendedPrivKey,
    path: DerivationPath,
    addresses: HashMap<(AddressType, u32), AccountAddress>,
}

impl HdAccount {
    pub fn new(
        master_key: &ExtendedPrivKey,
        blockchain: BlockchainType,
        index: u32,
    ) -> Result<Self> {
        bip32::hardened(index)?;
        // fail early on unsupported net types
        address_deriver(blockchain)?;

        let path = Bip44Path::account_path(
            blockchain.currency.coin_type(),
            AccountLevel::new(index),
        );
        let account_key = master_key.derive_path(&path)?;

        debug!(%blockchain, %path, "created HD account");
        Ok(HdAccount {
            blockchain,
            account_key,
            path,
            addresses: HashMap::new(),
        })
    }

    pub fn blockchain_type(&self) -> BlockchainType {
        self.blockchain
    }

    pub fn currency(&self) -> Currency {
        self.blockchain.currency
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Account-level extended public key, for watch-only use.
    pub fn extended_public_key(&self) -> ExtendedPubKey {
        self.account_key.to_extended_public_key()
    }

    /// Derives the address at `type/index` on first use; later calls return the cached one.
    pub fn get_address(&mut self, address_type: AddressType, index: u32) -> Result<&AccountAddress> {
        let account_key = &self.account_key;
        let account_path = &self.path;
        let blockchain = self.blockchain;

        match self.addresses.entry((address_type, index)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let address = derive_address(
                    blockchain,
                    account_key,
                    account_path,
                    address_type,
                    index,
                )?;
                debug!(path = %address.path, "derived account address");
                Ok(entry.insert(address))
            }
        }
    }

    /// Standalone account holding the key of one address, for signing.
    pub fn make_leaf_account(&mut self, address_type: AddressType, index: u32) -> Result<Account> {
        let blockchain = self.blockchain;
        let address = self.get_address(address_type, index)?;
        Ok(Account {
            blockchain,
            private_key: address.private_key.clone(),
            path: address.path.clone(),
            address: address.address.clone(),
        })
    }
}

fn derive_address(
    blockchain: BlockchainType,
    account_key: &ExtendedPrivKey,
    account_path: &DerivationPath,
    address_type: AddressType,
    index: u32,
) -> Result<AccountAddress> {
    if index >= bip32::HARDENED_BIT {
        return Err(Error::InvalidArgument(format!(
            "Address index {} must not be hardened",
            index
        )));
    }

    let deriver = address_deriver(blockchain)?;
    let type_key = account_key.derive_child(address_type.child_number())?;
    let extended_key = type_key.derive_child(ChildNumber::Normal(index))?;
    let private_key = PrivateKey::new(extended_key.private_key, deriver.leaf_key_compressed());
    let address = deriver.address_string(&private_key)?;

    Ok(AccountAddress {
        path: account_path
            .make_child_path(address_type.child_number())
            .make_child_path(ChildNumber::Normal(index)),
        extended_key,
        private_key,
        address,
    })
}

/// A single-key account: an HD leaf or an imported private key.
#[derive(Debug, Clone)]
pub struct Account {
    blockchain: BlockchainType,
    private_key: PrivateKey,
    path: DerivationPath,
    address: String,
}

impl Account {
    /// Imports a serialized private key (WIF for Bitcoin and Golos, hex for Ethereum).
    pub fn from_private_key(blockchain: BlockchainType, serialized: &str) -> Result<Self> {
        let deriver = address_deriver(blockchain)?;
        let private_key = deriver.import_private_key(serialized)?;
        let address = deriver.address_string(&private_key)?;
        debug!(%blockchain, "imported account");
        Ok(Account {
            blockchain,
            private_key,
            path: DerivationPath::default(),
            address,
        })
    }

    pub fn blockchain_type(&self) -> BlockchainType {
        self.blockchain
    }

    pub fn currency(&self) -> Currency {
        self.blockchain.currency
    }

    /// Derivation path; empty for imported keys.
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    pub fn key_string(&self, key_type: KeyType) -> Result<String> {
        let deriver = address_deriver(self.blockchain)?;
        Ok(match key_type {
            KeyType::Private => deriver.export_private_key(&self.private_key),
            KeyType::Public => deriver.public_key_string(&self.public_key()),
        })
    }

    /// Signs `data` the way the account's chain expects.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(match self.blockchain.currency {
            Currency::Bitcoin => self.private_key.sign_der(&utils::hash_twice(data)),
            Currency::Ethereum => self
                .private_key
                .sign_recoverable(&utils::keccak256(data))
                .to_vec(),
            Currency::Golos => self
                .private_key
                .sign_canonical(&utils::sha256(data))?
                .to_vec(),
        })
    }
}
