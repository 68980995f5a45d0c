//! Flat, `Result`-returning surface over the wallet core.
//!
//! Every call either produces its full output or returns an [`Error`]
//! carrying a coarse [`crate::error::ErrorKind`] and a readable message.

use crate::account::{self, Account, HdAccount, KeyType};
use crate::bip32::{ExtendedKey, ExtendedPrivKey, Network};
use crate::bip44::AddressType;
use crate::config::WalletConfig;
use crate::currency::BlockchainType;
use crate::error::{Error, Result};
use crate::keys::PrivateKey;
use crate::properties::Properties;
use crate::transaction::{self, Transaction};
use num_bigint::BigInt;
use std::str::FromStr;

pub fn make_master_key(seed: &[u8]) -> Result<ExtendedKey> {
    ExtendedPrivKey::new_master(seed, Network::Bitcoin).map(ExtendedKey::Private)
}

/// Derives the child at `index` (hardened when `index >= 2^31`) and returns
/// it in the requested form. A public parent can only produce public children.
pub fn make_child_key(parent: &ExtendedKey, key_type: KeyType, index: u32) -> Result<ExtendedKey> {
    if key_type == KeyType::Private && !parent.is_private() {
        return Err(Error::InvalidArgument(
            "Can't derive a private key from a public parent.".to_string(),
        ));
    }
    let child = parent.derive_child(index)?;
    Ok(match key_type {
        KeyType::Private => child,
        KeyType::Public => ExtendedKey::Public(child.to_public()),
    })
}

/// Base58check form of the key (`xprv`/`xpub` or their testnet versions).
pub fn extended_key_to_string(key: &ExtendedKey, key_type: KeyType) -> Result<String> {
    match (key_type, key) {
        (KeyType::Private, ExtendedKey::Private(key)) => Ok(key.to_string()),
        (KeyType::Private, ExtendedKey::Public(_)) => Err(Error::InvalidArgument(
            "Public extended key has no private form.".to_string(),
        )),
        (KeyType::Public, key) => Ok(key.to_public().to_string()),
    }
}

pub fn parse_extended_key(serialized: &str) -> Result<ExtendedKey> {
    ExtendedKey::from_str(serialized)
}

pub fn make_hd_account(
    master_key: &ExtendedKey,
    blockchain: BlockchainType,
    index: u32,
) -> Result<HdAccount> {
    match master_key {
        ExtendedKey::Private(key) => HdAccount::new(key, blockchain, index),
        ExtendedKey::Public(_) => Err(Error::InvalidArgument(
            "HD account requires a private master key.".to_string(),
        )),
    }
}

pub fn make_hd_leaf_account(
    account: &mut HdAccount,
    address_type: AddressType,
    index: u32,
) -> Result<Account> {
    account.make_leaf_account(address_type, index)
}

/// Imports a serialized private key as a standalone account.
pub fn make_account(blockchain: BlockchainType, serialized_private_key: &str) -> Result<Account> {
    Account::from_private_key(blockchain, serialized_private_key)
}

pub fn validate_address(blockchain: BlockchainType, address: &str) -> Result<()> {
    account::validate_address(blockchain, address)
}

pub fn get_account_address_string(account: &Account) -> String {
    account.address().to_string()
}

/// `m/44'/...` path of a derived account; empty for imported ones.
pub fn get_account_address_path(account: &Account) -> String {
    if account.path().is_empty() {
        String::new()
    } else {
        account.path().to_string()
    }
}

pub fn get_account_key(account: &Account, key_type: KeyType) -> Result<String> {
    account.key_string(key_type)
}

pub fn get_account_currency(account: &Account) -> BlockchainType {
    account.blockchain_type()
}

pub fn make_transaction(account: &Account) -> Result<Box<dyn Transaction + '_>> {
    transaction::make_transaction(account)
}

pub fn make_transaction_with_config<'a>(
    account: &'a Account,
    config: &WalletConfig,
) -> Result<Box<dyn Transaction + 'a>> {
    transaction::make_transaction_with_config(account, config)
}

pub fn transaction_add_source<'t>(
    transaction: &'t mut (dyn Transaction + '_),
) -> Result<&'t mut Properties> {
    transaction.add_source()
}

pub fn transaction_add_destination<'t>(
    transaction: &'t mut (dyn Transaction + '_),
) -> Result<&'t mut Properties> {
    transaction.add_destination()
}

pub fn transaction_get_fee<'t>(
    transaction: &'t mut (dyn Transaction + '_),
) -> Result<&'t mut Properties> {
    transaction.fee()
}

pub fn transaction_get_properties<'t>(
    transaction: &'t mut (dyn Transaction + '_),
) -> &'t mut Properties {
    transaction.transaction_properties()
}

pub fn transaction_set_message(
    transaction: &mut (dyn Transaction + '_),
    message: &[u8],
) -> Result<()> {
    transaction.set_message(message)
}

pub fn transaction_update(transaction: &mut (dyn Transaction + '_)) -> Result<()> {
    transaction.update()
}

pub fn transaction_serialize(transaction: &mut (dyn Transaction + '_)) -> Result<Vec<u8>> {
    transaction.serialize()
}

pub fn transaction_get_total_fee(transaction: &dyn Transaction) -> Result<BigInt> {
    transaction.get_total_fee()
}

pub fn transaction_get_total_spent(transaction: &dyn Transaction) -> Result<BigInt> {
    transaction.get_total_spent()
}

pub fn transaction_estimate_total_fee(
    transaction: &dyn Transaction,
    sources_count: usize,
    destinations_count: usize,
) -> Result<BigInt> {
    transaction.estimate_total_fee(sources_count, destinations_count)
}

pub fn properties_set_int32_value(properties: &mut Properties, name: &str, value: i32) -> Result<()> {
    properties.set_value(name, value)
}

pub fn properties_set_string_value(
    properties: &mut Properties,
    name: &str,
    value: &str,
) -> Result<()> {
    properties.set_value(name, value.to_string())
}

/// Amounts cross the boundary as decimal strings.
pub fn properties_set_big_int_value(
    properties: &mut Properties,
    name: &str,
    value: &str,
) -> Result<()> {
    let value = BigInt::from_str(value).map_err(|e| {
        Error::InvalidArgument(format!("Invalid big integer \"{}\": {}", value, e))
    })?;
    properties.set_value(name, value)
}

pub fn properties_set_binary_data_value(
    properties: &mut Properties,
    name: &str,
    value: &[u8],
) -> Result<()> {
    properties.set_value(name, value.to_vec())
}

pub fn properties_set_private_key_value(
    properties: &mut Properties,
    name: &str,
    value: &PrivateKey,
) -> Result<()> {
    properties.set_value(name, value.clone())
}

/// Fails with the names of the required properties that are still unset.
pub fn properties_validate(properties: &Properties) -> Result<()> {
    let (valid, missing) = properties.validate();
    if valid {
        return Ok(());
    }
    Err(Error::property(
        properties.name(),
        format!("Not all required properties set: {}", missing.join(", ")),
    ))
}

pub fn properties_get_specification(properties: &Properties) -> Vec<String> {
    properties.get_property_spec()
}
