//! Legacy (non-SegWit) P2PKH transactions.

use super::{
    ensure_building, non_negative, not_found, validate_all, StateTracker, Transaction,
    TransactionState,
};
use crate::account::bitcoin::{BitcoinAddress, BitcoinNetwork};
use crate::account::Account;
use crate::codec;
use crate::config::WalletConfig;
use crate::currency::BlockchainType;
use crate::error::{Error, Result};
use crate::keys::PrivateKey;
use crate::properties::{Predicate, Properties, Property, PropertyTrait};
use crate::utils;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use tracing::{debug, info, warn};

const VERSION: u32 = 1;
const SEQUENCE: u32 = 0xffff_ffff;
const LOCK_TIME: u32 = 0;
const SIGHASH_ALL: u8 = 0x01;
const PREV_TX_HASH_SIZE: usize = 32;

// Typical sizes of a compressed-key P2PKH transaction, for estimates.
const ESTIMATED_OVERHEAD_SIZE: u64 = 10;
const ESTIMATED_INPUT_SIZE: u64 = 148;
const ESTIMATED_OUTPUT_SIZE: u64 = 34;

struct BitcoinFee {
    properties: Properties,
    amount_per_byte: Property<BigInt>,
}

impl BitcoinFee {
    fn new(config: &WalletConfig) -> Result<Self> {
        let mut properties = Properties::new("TransactionFee");
        let min_amount_per_byte = properties.bind_with_default(
            "min_amount_per_byte",
            BigInt::from(config.bitcoin_min_fee_per_byte),
            PropertyTrait::Optional,
            Some(non_negative("minimal fee per byte")),
        )?;

        let at_least_min: Predicate<BigInt> =
            Box::new(move |value: &BigInt, properties: &Properties| {
                let min = properties
                    .get(min_amount_per_byte)
                    .cloned()
                    .unwrap_or_default();
                if *value < min {
                    return Err(Error::InvalidArgument(format!(
                        "Fee per byte {} is less than the minimum of {}.",
                        value, min
                    )));
                }
                Ok(())
            });
        let amount_per_byte =
            properties.bind("amount_per_byte", PropertyTrait::Required, Some(at_least_min))?;

        Ok(BitcoinFee {
            properties,
            amount_per_byte,
        })
    }

    fn rate(&self) -> Result<&BigInt> {
        self.properties
            .get(self.amount_per_byte)
            .ok_or_else(|| Error::Transaction("Fee per byte is not set.".to_string()))
    }
}

struct BitcoinSource {
    properties: Properties,
    amount: Property<BigInt>,
    prev_tx_hash: Property<Vec<u8>>,
    prev_tx_out_index: Property<i32>,
    prev_tx_out_script_pubkey: Property<Vec<u8>>,
    private_key: Property<PrivateKey>,
}

impl BitcoinSource {
    fn new() -> Result<Self> {
        let mut properties = Properties::new("TransactionSource");

        let hash_size: Predicate<Vec<u8>> = Box::new(|value: &Vec<u8>, _: &Properties| {
            if value.len() != PREV_TX_HASH_SIZE {
                return Err(Error::InvalidArgument(format!(
                    "Previous transaction hash must be {} bytes, got {}.",
                    PREV_TX_HASH_SIZE,
                    value.len()
                )));
            }
            Ok(())
        });
        let index_range: Predicate<i32> = Box::new(|value: &i32, _: &Properties| {
            if *value < 0 {
                return Err(Error::InvalidArgument(
                    "Previous transaction output index can't be negative.".to_string(),
                ));
            }
            Ok(())
        });

        Ok(BitcoinSource {
            amount: properties.bind(
                "amount",
                PropertyTrait::Required,
                Some(non_negative("transaction source value")),
            )?,
            prev_tx_hash: properties.bind("prev_tx_hash", PropertyTrait::Required, Some(hash_size))?,
            prev_tx_out_index: properties.bind(
                "prev_tx_out_index",
                PropertyTrait::Required,
                Some(index_range),
            )?,
            prev_tx_out_script_pubkey: properties.bind(
                "prev_tx_out_script_pubkey",
                PropertyTrait::Required,
                None,
            )?,
            private_key: properties.bind("private_key", PropertyTrait::Required, None)?,
            properties,
        })
    }

    fn write_outpoint(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut hash = self.properties.require(self.prev_tx_hash)?.clone();
        hash.reverse();
        out.extend_from_slice(&hash);
        let index = *self.properties.require(self.prev_tx_out_index)? as u32;
        out.extend_from_slice(&index.to_le_bytes());
        Ok(())
    }
}

struct BitcoinDestination {
    properties: Properties,
    address: Property<String>,
    amount: Property<BigInt>,
    is_change: Property<i32>,
}

impl BitcoinDestination {
    fn new(network: BitcoinNetwork) -> Result<Self> {
        let mut properties = Properties::new("TransactionDestination");

        let is_change =
            properties.bind_with_default("is_change", 0i32, PropertyTrait::Optional, None)?;

        let valid_address: Predicate<String> = Box::new(move |value: &String, _: &Properties| {
            BitcoinAddress::decode(value, network).map(|_| ())
        });
        let address = properties.bind("address", PropertyTrait::Required, Some(valid_address))?;

        let not_change: Predicate<BigInt> = Box::new(move |value: &BigInt, properties: &Properties| {
            if properties.get(is_change).map_or(false, |flag| *flag != 0) {
                return Err(Error::InvalidArgument(
                    "Change amount is computed and can't be set explicitly.".to_string(),
                ));
            }
            if value.is_negative() {
                return Err(Error::InvalidArgument(
                    "Can't set negative amount as transaction destination value.".to_string(),
                ));
            }
            Ok(())
        });
        let amount = properties.bind("amount", PropertyTrait::Required, Some(not_change))?;

        Ok(BitcoinDestination {
            properties,
            address,
            amount,
            is_change,
        })
    }

    fn is_change(&self) -> bool {
        self.properties
            .get(self.is_change)
            .map_or(false, |flag| *flag != 0)
    }

    fn amount_or_zero(&self) -> BigInt {
        self.properties.get(self.amount).cloned().unwrap_or_default()
    }

    /// Change outputs with nothing left to return are not serialized.
    fn is_pruned(&self) -> bool {
        self.is_change() && !self.amount_or_zero().is_positive()
    }
}

pub struct BitcoinTransaction<'a> {
    account: &'a Account,
    network: BitcoinNetwork,
    fee_iterations: usize,
    properties: Properties,
    fee: BitcoinFee,
    sources: Vec<BitcoinSource>,
    destinations: Vec<BitcoinDestination>,
    script_sigs: Vec<Vec<u8>>,
    tracker: StateTracker,
}

impl<'a> BitcoinTransaction<'a> {
    pub fn new(account: &'a Account, config: &WalletConfig) -> Result<Self> {
        Ok(BitcoinTransaction {
            account,
            network: BitcoinNetwork::from_net_type(account.blockchain_type().net_type)?,
            fee_iterations: config.bitcoin_fee_iterations,
            properties: Properties::new("Transaction"),
            fee: BitcoinFee::new(config)?,
            sources: Vec::new(),
            destinations: Vec::new(),
            script_sigs: Vec::new(),
            tracker: StateTracker::new(),
        })
    }

    fn groups(&self) -> impl Iterator<Item = (String, &Properties)> + '_ {
        [(String::new(), &self.properties), (String::new(), &self.fee.properties)]
            .into_iter()
            .chain(
                self.sources
                    .iter()
                    .enumerate()
                    .map(|(i, source)| (format!(" #{}", i), &source.properties)),
            )
            .chain(
                self.destinations
                    .iter()
                    .enumerate()
                    .map(|(i, destination)| (format!(" #{}", i), &destination.properties)),
            )
    }

    fn check(&mut self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::Transaction(
                "Transaction should have at least one source.".to_string(),
            ));
        }
        if self.destinations.is_empty() {
            return Err(Error::Transaction(
                "Transaction should have at least one destination.".to_string(),
            ));
        }
        if self.destinations.iter().filter(|d| d.is_change()).count() > 1 {
            return Err(Error::Transaction(
                "Multiple change destinations are not supported.".to_string(),
            ));
        }

        // change amounts are computed by update, not supplied by the caller
        for destination in self.destinations.iter_mut().filter(|d| d.is_change()) {
            if !destination.properties.is_set(destination.amount) {
                destination
                    .properties
                    .force_value(destination.amount, BigInt::zero());
            }
        }

        validate_all(self.groups())
    }

    /// Sum of sources minus sum of explicitly paid destinations.
    fn calculate_diff(&self) -> Result<BigInt> {
        let mut diff = BigInt::zero();
        for source in &self.sources {
            diff += source.properties.require(source.amount)?;
        }
        for destination in self.destinations.iter().filter(|d| !d.is_change()) {
            diff -= destination.properties.require(destination.amount)?;
        }
        Ok(diff)
    }

    fn set_change(&mut self, index: usize, value: BigInt) {
        let destination = &mut self.destinations[index];
        destination.properties.force_value(destination.amount, value);
    }

    fn update_change(&mut self) -> Result<()> {
        let rate = self.fee.rate()?.clone();
        let diff = self.calculate_diff()?;
        if diff.is_negative() {
            return Err(overspend());
        }

        if let Some(index) = self.destinations.iter().position(|d| d.is_change()) {
            // The fee depends on the signed size, which depends on the change,
            // so settle on a change amount that pays for its own transaction.
            let mut change = diff.clone();
            for _ in 0..self.fee_iterations {
                self.set_change(index, change.clone());
                let size = self.signed_size()?;
                let next = &diff - &rate * BigInt::from(size);
                if !next.is_positive() {
                    change = BigInt::zero();
                    break;
                }
                if next == change {
                    break;
                }
                change = next;
            }
            self.set_change(index, change.clone());

            // signature length may still move the size by a byte or two
            for _ in 0..self.fee_iterations {
                if !change.is_positive() {
                    break;
                }
                let shortfall = &rate * BigInt::from(self.signed_size()?) - (&diff - &change);
                if !shortfall.is_positive() {
                    break;
                }
                change -= shortfall;
                if !change.is_positive() {
                    change = BigInt::zero();
                }
                self.set_change(index, change.clone());
            }
            debug!(%change, "computed change");
        }

        let size = self.signed_size()?;
        let total_fee = self.get_total_fee()?;
        let expected_fee = &rate * BigInt::from(size);
        if total_fee < expected_fee {
            warn!(%total_fee, %expected_fee, size, "transaction fee is below the requested rate");
            return Err(overspend());
        }
        Ok(())
    }

    fn outputs(&self) -> Result<Vec<(u64, Vec<u8>)>> {
        self.destinations
            .iter()
            .filter(|destination| !destination.is_pruned())
            .map(|destination| {
                let amount = destination.properties.require(destination.amount)?;
                let amount = amount.to_u64().ok_or_else(|| {
                    Error::Transaction(format!("Amount {} is out of range.", amount))
                })?;
                let address = destination.properties.require(destination.address)?;
                let script = BitcoinAddress::decode(address, self.network)?.script_pubkey();
                Ok((amount, script))
            })
            .collect()
    }

    /// Raw transaction with the given per-input scripts.
    fn encode(&self, input_scripts: &[Vec<u8>]) -> Result<Vec<u8>> {
        let outputs = self.outputs()?;
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(&VERSION.to_le_bytes());

        codec::write_compact_size(&mut out, self.sources.len() as u64);
        for (source, script) in self.sources.iter().zip(input_scripts) {
            source.write_outpoint(&mut out)?;
            codec::write_compact_size(&mut out, script.len() as u64);
            out.extend_from_slice(script);
            out.extend_from_slice(&SEQUENCE.to_le_bytes());
        }

        codec::write_compact_size(&mut out, outputs.len() as u64);
        for (amount, script) in &outputs {
            out.extend_from_slice(&amount.to_le_bytes());
            codec::write_compact_size(&mut out, script.len() as u64);
            out.extend_from_slice(script);
        }

        out.extend_from_slice(&LOCK_TIME.to_le_bytes());
        Ok(out)
    }

    /// scriptSig for one input: signature over the SIGHASH_ALL preimage, then the public key.
    fn sign_input(&self, index: usize) -> Result<Vec<u8>> {
        let scripts = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                if i == index {
                    source
                        .properties
                        .require(source.prev_tx_out_script_pubkey)
                        .cloned()
                } else {
                    Ok(Vec::new())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut preimage = self.encode(&scripts)?;
        preimage.extend_from_slice(&u32::from(SIGHASH_ALL).to_le_bytes());

        let source = &self.sources[index];
        let key = source.properties.require(source.private_key)?;
        let mut signature = key.sign_der(&utils::hash_twice(&preimage));
        signature.push(SIGHASH_ALL);

        let mut script = Vec::with_capacity(signature.len() + 67);
        push_data(&mut script, &signature);
        push_data(&mut script, &key.public_key().serialize());
        Ok(script)
    }

    fn make_script_sigs(&self) -> Result<Vec<Vec<u8>>> {
        (0..self.sources.len())
            .map(|index| self.sign_input(index))
            .collect()
    }

    fn signed_size(&self) -> Result<usize> {
        Ok(self.encode(&self.make_script_sigs()?)?.len())
    }
}

fn overspend() -> Error {
    Error::Transaction("Transaction is trying to spend more than available.".to_string())
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    // direct pushes cover signatures and public keys
    script.push(data.len() as u8);
    script.extend_from_slice(data);
}

impl Transaction for BitcoinTransaction<'_> {
    fn blockchain_type(&self) -> BlockchainType {
        self.account.blockchain_type()
    }

    fn state(&self) -> TransactionState {
        self.tracker.current(self.groups().map(|(_, properties)| properties))
    }

    fn transaction_properties(&mut self) -> &mut Properties {
        &mut self.properties
    }

    fn add_source(&mut self) -> Result<&mut Properties> {
        ensure_building(self.state(), "a source")?;
        self.sources.push(BitcoinSource::new()?);
        let source = self.sources.len() - 1;
        Ok(&mut self.sources[source].properties)
    }

    fn add_destination(&mut self) -> Result<&mut Properties> {
        ensure_building(self.state(), "a destination")?;
        self.destinations.push(BitcoinDestination::new(self.network)?);
        let destination = self.destinations.len() - 1;
        Ok(&mut self.destinations[destination].properties)
    }

    fn source(&mut self, index: usize) -> Result<&mut Properties> {
        self.sources
            .get_mut(index)
            .map(|source| &mut source.properties)
            .ok_or_else(|| not_found("source", index))
    }

    fn destination(&mut self, index: usize) -> Result<&mut Properties> {
        self.destinations
            .get_mut(index)
            .map(|destination| &mut destination.properties)
            .ok_or_else(|| not_found("destination", index))
    }

    fn fee(&mut self) -> Result<&mut Properties> {
        Ok(&mut self.fee.properties)
    }

    fn validate(&mut self) -> Result<()> {
        let result = self.check();
        self.tracker.finish(TransactionState::Validated, result)
    }

    fn update(&mut self) -> Result<()> {
        self.validate()?;
        let result = self.update_change();
        self.tracker.finish(TransactionState::Updated, result)
    }

    fn sign(&mut self) -> Result<()> {
        self.update()?;
        let result = self
            .make_script_sigs()
            .map(|script_sigs| self.script_sigs = script_sigs);
        self.tracker.finish(TransactionState::Signed, result)
    }

    fn serialize(&mut self) -> Result<Vec<u8>> {
        self.sign()?;
        let result = self.encode(&self.script_sigs);
        let serialized = self.tracker.finish(TransactionState::Serialized, result)?;
        info!(
            size = serialized.len(),
            inputs = self.sources.len(),
            "serialized Bitcoin transaction"
        );
        Ok(serialized)
    }

    /// Whatever the sources hold beyond the destinations, change included.
    fn get_total_fee(&self) -> Result<BigInt> {
        let available: BigInt = self
            .sources
            .iter()
            .map(|source| source.properties.get(source.amount).cloned().unwrap_or_default())
            .sum();
        let spent: BigInt = self
            .destinations
            .iter()
            .map(BitcoinDestination::amount_or_zero)
            .sum();
        Ok(available - spent)
    }

    fn get_total_spent(&self) -> Result<BigInt> {
        let destinations: BigInt = self
            .destinations
            .iter()
            .map(BitcoinDestination::amount_or_zero)
            .sum();
        Ok(destinations + self.get_total_fee()?)
    }

    fn estimate_total_fee(&self, sources_count: usize, destinations_count: usize) -> Result<BigInt> {
        let size = ESTIMATED_OVERHEAD_SIZE
            + ESTIMATED_INPUT_SIZE * sources_count as u64
            + ESTIMATED_OUTPUT_SIZE * destinations_count as u64;
        Ok(self.fee.rate()? * BigInt::from(size))
    }

    fn set_message(&mut self, _message: &[u8]) -> Result<()> {
        Err(Error::FeatureNotSupported(
            "Bitcoin transactions can't carry a message".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{Currency, NET_TYPE_TESTNET};
    use crate::error::ErrorKind;
    use hex_literal::hex;

    const WIF: &str = "cQeGKosJjWPn9GkB7QmvmotmBbVg1hm8UjdN6yLXEWZ5HAcRwam7";
    const SCRIPT_PUBKEY: [u8; 25] = hex!("76a914d3f68b887224cabcc90a9581c7bbdace878666db88ac");
    const PREV_TX_HASH: [u8; 32] =
        hex!("48979223adb5f7f340c4f27d6cc45a38adb37876b2d7e34d2457cbf57342a391");

    fn account(wif: &str) -> Account {
        Account::from_private_key(BlockchainType::new(Currency::Bitcoin, NET_TYPE_TESTNET), wif)
            .unwrap()
    }

    fn transaction(account: &Account) -> BitcoinTransaction<'_> {
        BitcoinTransaction::new(account, &WalletConfig::default()).unwrap()
    }

    fn add_source(
        tx: &mut BitcoinTransaction,
        key: &Account,
        amount: u64,
        prev_tx_hash: &[u8],
        index: i32,
        script_pubkey: &[u8],
    ) {
        let source = tx.add_source().unwrap();
        source.set_value("amount", BigInt::from(amount)).unwrap();
        source.set_value("prev_tx_hash", prev_tx_hash.to_vec()).unwrap();
        source.set_value("prev_tx_out_index", index).unwrap();
        source
            .set_value("prev_tx_out_script_pubkey", script_pubkey.to_vec())
            .unwrap();
        source
            .set_value("private_key", key.private_key().clone())
            .unwrap();
    }

    fn add_destination(tx: &mut BitcoinTransaction, address: &str, amount: u64) {
        let destination = tx.add_destination().unwrap();
        destination.set_value("address", address.to_string()).unwrap();
        destination.set_value("amount", BigInt::from(amount)).unwrap();
    }

    fn add_change(tx: &mut BitcoinTransaction, address: &str) {
        let change = tx.add_destination().unwrap();
        change.set_value("address", address.to_string()).unwrap();
        change.set_value("is_change", 1).unwrap();
    }

    fn set_rate(tx: &mut BitcoinTransaction, rate: u64) {
        tx.fee()
            .unwrap()
            .set_value("amount_per_byte", BigInt::from(rate))
            .unwrap();
    }

    fn change_amount(tx: &mut BitcoinTransaction, index: usize) -> BigInt {
        tx.destination(index)
            .unwrap()
            .get_value::<BigInt>("amount")
            .unwrap()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_explicit_change() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        let available = 1_000_000_000_000_000u64;
        let out = 500_000_000_000_000u64;

        add_source(&mut tx, &account, available, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", out);
        add_change(&mut tx, "mpJDSHJcytfxp9asgo2pqihabHmmJkqJuM");
        assert!(tx
            .destination(1)
            .unwrap()
            .set_value("amount", BigInt::from(1))
            .is_err());
        set_rate(&mut tx, 1000);

        let serialized = tx.serialize().unwrap();
        let expected_fee = BigInt::from(serialized.len() as u64 * 1000);
        let delta = &expected_fee / BigInt::from(100_000);
        let total_fee = tx.get_total_fee().unwrap();
        assert!(total_fee >= &expected_fee - &delta && total_fee <= &expected_fee + &delta);

        let change = change_amount(&mut tx, 1);
        assert!(change.is_positive());
        assert_eq!(change, BigInt::from(available - out) - &total_fee);
        assert_eq!(tx.state(), TransactionState::Serialized);
    }

    #[test]
    fn test_unprofitable_change() {
        let account = account(WIF);
        let mut tx = transaction(&account);

        add_source(
            &mut tx,
            &account,
            10_000,
            &hex!("3696c42469785af61f38a40677d6175d83d7aa987b88aeb0bf896a47873626f0"),
            1,
            &SCRIPT_PUBKEY,
        );
        add_destination(&mut tx, "mpJDSHJcytfxp9asgo2pqihabHmmJkqJuM", 9559);
        add_change(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU");
        assert!(tx
            .fee()
            .unwrap()
            .set_value("amount_per_byte", BigInt::from(1))
            .is_err());
        set_rate(&mut tx, 2);

        let without_change = tx.serialize().unwrap();
        assert_eq!(change_amount(&mut tx, 1), BigInt::zero());
        assert_eq!(
            without_change,
            hex!("0100000001f0263687476a89bfb0ae887b98aad7835d17d67706a4381ff65a786924c49636010000006b4830450221008990bfa3875ebd4d270d91ce70aa45be56e037adf038389516dd071651a0eefd022022423e9b93893f0d0c1471725aa90e16d7c845e48cc9b8043d3b86ae4c361ca1012102163387c2c86f897b8aef15ee24e1f135da70c52e7dde12c06e122891c704d694ffffffff0157250000000000001976a91460505d4554b5f7b939142cf1efa566d95a31268788ac00000000").to_vec()
        );
        assert_eq!(tx.get_total_fee().unwrap(), BigInt::from(441));

        tx.destination(0)
            .unwrap()
            .set_value("amount", BigInt::from(9000))
            .unwrap();
        assert_eq!(tx.state(), TransactionState::Building);
        let with_change = tx.serialize().unwrap();
        assert!(with_change.len() > without_change.len());
        assert!(change_amount(&mut tx, 1).is_positive());
    }

    #[test]
    fn test_single_output_is_deterministic() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(&mut tx, &account, 1_000_000_000_000_000, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 129_000_000);
        set_rate(&mut tx, 1_000_000);

        let first = tx.serialize().unwrap();
        let second = tx.serialize().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            hex!("010000000191a34273f5cb57244de3d7b27678b3ad385ac46c7df2c440f3f7b5ad23929748000000006a473044022064d09103c9d48c8b094db03227621ced41732a74963578d3495bac4f7f65b40e02201f2f7adf872c1de2af5027edefdf29379faf9fe8f5751015c974e064a9d9d6e0012102163387c2c86f897b8aef15ee24e1f135da70c52e7dde12c06e122891c704d694ffffffff014062b007000000001976a914d3f68b887224cabcc90a9581c7bbdace878666db88ac00000000").to_vec()
        );

        // estimate for one input and one output stays within -5%..+25% of the real fee
        let estimated = tx.estimate_total_fee(1, 1).unwrap();
        let real = BigInt::from(first.len() as u64 * 1_000_000);
        assert!(&estimated * BigInt::from(100) >= &real * BigInt::from(95));
        assert!(&estimated * BigInt::from(100) <= &real * BigInt::from(125));
    }

    #[test]
    fn test_multiple_outputs() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(
            &mut tx,
            &account,
            1_200_000_000,
            &hex!("13ae654ae5609bd74ee1840fb5e4694580659e4cfe477b303e68162f20a81cda"),
            1,
            &SCRIPT_PUBKEY,
        );
        add_destination(&mut tx, "mfgq7S1Va1GREFgN66MVoxX35X6juKov6A", 100_000_000);
        add_destination(&mut tx, "mk6a6qeXNXuQDpA4DPxuouTJJTeFYJAkep", 100_000_000);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 999_000_000);
        set_rate(&mut tx, 1000);

        assert_eq!(
            tx.serialize().unwrap(),
            hex!("0100000001da1ca8202f16683e307b47fe4c9e65804569e4b50f84e14ed79b60e54a65ae13010000006b483045022100e217cfb5920878da55069a919029ab910ff106cfb20fd901e82de041b149d71902202756c5700377294837893cca854e60b6cca86423f4407b8faf92ff898aded00a012102163387c2c86f897b8aef15ee24e1f135da70c52e7dde12c06e122891c704d694ffffffff0300e1f505000000001976a91401de29d6f0aaf3467da7881a981c5c5ef90258bd88ac00e1f505000000001976a914323c1ea8756feaaaa85d0d0e51b0cc07b4c7ac5e88acc0878b3b000000001976a914d3f68b887224cabcc90a9581c7bbdace878666db88ac00000000").to_vec()
        );
    }

    #[test]
    fn test_many_inputs_from_one_address() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(
            &mut tx,
            &account,
            229_999_999,
            &hex!("4c0a9df13d1d85d20bfc5bb5d38937290d273b7655ff3d50d43db81900546f8a"),
            0,
            &SCRIPT_PUBKEY,
        );
        add_source(
            &mut tx,
            &account,
            459_999_999,
            &hex!("c51b8890ad84fab4577785908d12b6f8195c69efe5a348fc7d6d88fc1ce97d17"),
            0,
            &SCRIPT_PUBKEY,
        );
        add_destination(&mut tx, "mfgq7S1Va1GREFgN66MVoxX35X6juKov6A", 100_000_000);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 588_999_998);
        set_rate(&mut tx, 1000);

        assert_eq!(
            tx.serialize().unwrap(),
            hex!("01000000028a6f540019b83dd4503dff55763b270d293789d3b55bfc0bd2851d3df19d0a4c000000006a4730440220661ae5dd08bb4576a04c76114e980d9431c0d2f477dd8c71acfb7f77c8dd1670022022037a1939ae556881a93f41efcf7c3da756b7141b7245971c7337e4a859623d012102163387c2c86f897b8aef15ee24e1f135da70c52e7dde12c06e122891c704d694ffffffff177de91cfc886d7dfc48a3e5ef695c19f8b6128d90857757b4fa84ad90881bc5000000006a4730440220757edec6ee1fbc52c9046dc80c618001a9a7d4162f0a3abf81f27f09005f77e70220042c890f4702dda612883ceb25db4590c1f8459b0bdd88cd9858d4b7565e997b012102163387c2c86f897b8aef15ee24e1f135da70c52e7dde12c06e122891c704d694ffffffff0200e1f505000000001976a91401de29d6f0aaf3467da7881a981c5c5ef90258bd88ac3e6d1b23000000001976a914d3f68b887224cabcc90a9581c7bbdace878666db88ac00000000").to_vec()
        );
    }

    #[test]
    fn test_many_inputs_from_different_addresses() {
        let account = account("cScuLx5taDyuAfCnin5WWZz65yGCHMuuaFv6mgearmqAHC4p53sz");
        let other = self::account("cVbMJKcfEGi4wgsN39rMPkYVAaLeRaPPbrPpJfcH9B9dZCPbS7kT");
        assert_eq!(account.address(), "mfgq7S1Va1GREFgN66MVoxX35X6juKov6A");
        assert_eq!(other.address(), "mk6a6qeXNXuQDpA4DPxuouTJJTeFYJAkep");

        let prev_tx_hash = hex!("a1fdb0d8776cfd43b66cfc0ee49cad2763fdbeca67af8ef40479624716ea8948");
        let mut tx = transaction(&account);
        add_source(
            &mut tx,
            &other,
            100_000_000,
            &prev_tx_hash,
            1,
            &hex!("76a914323c1ea8756feaaaa85d0d0e51b0cc07b4c7ac5e88ac"),
        );
        add_source(
            &mut tx,
            &account,
            100_000_000,
            &prev_tx_hash,
            0,
            &hex!("76a91401de29d6f0aaf3467da7881a981c5c5ef90258bd88ac"),
        );
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 190_000_000);
        add_destination(&mut tx, "mfgq7S1Va1GREFgN66MVoxX35X6juKov6A", 9_000_000);
        set_rate(&mut tx, 1000);

        assert_eq!(
            tx.serialize().unwrap(),
            hex!("01000000024889ea1647627904f48eaf67cabefd6327ad9ce40efc6cb643fd6c77d8b0fda1010000006a47304402200efd6929fcf32210e32194fc8468354deaf67060466710441075dab31afa31b30220350c72e95803ad14ce3fe3baa73e0a2288bf46df44e8c3d686e9692e7689cb7301210217fc7a7cc7f8b41b8e886703b95f087cd6e82ccbe6ee2ff27101b6d69ca2e868ffffffff4889ea1647627904f48eaf67cabefd6327ad9ce40efc6cb643fd6c77d8b0fda1000000006a473044022063a2925d2693033aa9735f412258c93f80f9bf980c688fbe5634b7fd6af958f40220506064007962d15ed0473ec617f1c38c80bd82af864050bf5e406ed4cf2951cf012102a6492c6dd74e49c4b7a4bd507baac3abf25fb26b97e362c3c0cb28b91a043da2ffffffff02802b530b000000001976a914d3f68b887224cabcc90a9581c7bbdace878666db88ac40548900000000001976a91401de29d6f0aaf3467da7881a981c5c5ef90258bd88ac00000000").to_vec()
        );
    }

    #[test]
    fn test_update_moves_excess_to_change() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(&mut tx, &account, 2_000_500, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 1_000_000);
        add_change(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU");
        set_rate(&mut tx, 100);

        let total_fee = tx.get_total_fee().unwrap();
        assert_eq!(total_fee, BigInt::from(1_000_500));

        tx.update().unwrap();
        assert_eq!(tx.state(), TransactionState::Updated);
        let updated_fee = tx.get_total_fee().unwrap();
        assert!(updated_fee.is_positive());
        assert!(updated_fee < total_fee);

        let serialized = tx.serialize().unwrap();
        let expected = BigInt::from(serialized.len() as u64 * 100);
        let delta = &expected / BigInt::from(10_000);
        assert!(updated_fee >= &expected - &delta && updated_fee <= &expected + &delta);
        assert_eq!(tx.get_total_spent().unwrap(), BigInt::from(2_000_500));
    }

    #[test]
    fn test_overspend_keeps_building() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(&mut tx, &account, 1_000, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 2_000);
        set_rate(&mut tx, 10);

        let err = tx.serialize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transaction is trying to spend more than available."
        );
        assert_eq!(err.kind(), ErrorKind::GeneralError);
        assert_eq!(tx.state(), TransactionState::Building);
    }

    #[test]
    fn test_fee_below_rate_rejected() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(&mut tx, &account, 1_000, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 1_000);
        set_rate(&mut tx, 10);

        let err = tx.serialize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transaction is trying to spend more than available."
        );
        assert_eq!(tx.state(), TransactionState::Building);

        tx.source(0)
            .unwrap()
            .set_value("amount", BigInt::from(5_000))
            .unwrap();
        let serialized = tx.serialize().unwrap();
        assert!(tx.get_total_fee().unwrap() >= BigInt::from(serialized.len() as u64 * 10));
    }

    #[test]
    fn test_pruned_change_below_rate_rejected() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(&mut tx, &account, 10_000, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mpJDSHJcytfxp9asgo2pqihabHmmJkqJuM", 9_990);
        add_change(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU");
        set_rate(&mut tx, 2);

        let err = tx.serialize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeneralError);
        assert_eq!(tx.state(), TransactionState::Building);
        assert_eq!(change_amount(&mut tx, 1), BigInt::zero());
    }

    #[test]
    fn test_missing_properties_report() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        tx.add_source()
            .unwrap()
            .set_value("amount", BigInt::from(10))
            .unwrap();
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 5);

        let message = tx.validate().unwrap_err().to_string();
        assert!(message.starts_with("Not all required properties set.\n"));
        assert!(message.contains("TransactionFee:\n\tamount_per_byte\n"));
        assert!(message.contains(
            "TransactionSource #0:\n\tprev_tx_hash\n\tprev_tx_out_index\n\tprev_tx_out_script_pubkey\n\tprivate_key\n"
        ));
        assert!(!message.contains("TransactionDestination"));
    }

    #[test]
    fn test_no_sources() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        assert!(tx.validate().is_err());
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 5);
        assert!(tx.validate().unwrap_err().to_string().contains("source"));
    }

    #[test]
    fn test_add_after_serialize_rejected() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        add_source(&mut tx, &account, 1_000_000, &PREV_TX_HASH, 0, &SCRIPT_PUBKEY);
        add_destination(&mut tx, "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU", 900_000);
        set_rate(&mut tx, 10);
        tx.serialize().unwrap();

        assert!(tx.add_destination().is_err());
        assert!(tx.add_source().is_err());

        set_rate(&mut tx, 20);
        assert_eq!(tx.state(), TransactionState::Building);
        assert!(tx.add_destination().is_ok());
    }

    #[test]
    fn test_destination_address_verification() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        let destination = tx.add_destination().unwrap();
        for invalid in ["", " ", "123", "mzqiDnETWkunRDZxjUQ34JzN1LDevh5D"] {
            assert!(destination.set_value("address", invalid.to_string()).is_err());
        }
        destination
            .set_value("address", "mzqiDnETWkunRDZxjUQ34JzN1LDevh5DpU".to_string())
            .unwrap();
    }

    #[test]
    fn test_estimate_and_message() {
        let account = account(WIF);
        let mut tx = transaction(&account);
        assert!(tx.estimate_total_fee(1, 1).is_err());
        set_rate(&mut tx, 10);
        assert_eq!(
            tx.estimate_total_fee(2, 3).unwrap(),
            BigInt::from(10 * (10 + 2 * 148 + 3 * 34))
        );
        assert_eq!(tx.state(), TransactionState::Building);
        assert_eq!(
            tx.set_message(b"hello").unwrap_err().kind(),
            ErrorKind::FeatureNotSupported
        );
    }
}
