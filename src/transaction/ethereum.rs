//! Legacy Ethereum value transfers, signed with optional EIP-155 replay protection.

use super::{
    ensure_building, non_negative, not_found, validate_all, StateTracker, Transaction,
    TransactionState,
};
use crate::account::ethereum::parse_address;
use crate::account::Account;
use crate::codec::RlpItem;
use crate::config::WalletConfig;
use crate::currency::BlockchainType;
use crate::error::{Error, Result};
use crate::properties::{Predicate, Properties, Property, PropertyTrait};
use num_bigint::BigInt;
use num_traits::Signed;
use tracing::info;

const TX_BASE_GAS: u64 = 21_000;
const PAYLOAD_ZERO_BYTE_GAS: u64 = 4;
const PAYLOAD_NONZERO_BYTE_GAS: u64 = 68;

const SIGNATURE_SIZE: usize = 65;
const LEGACY_V_OFFSET: u64 = 27;
const EIP155_V_OFFSET: u64 = 35;

struct EthereumFee {
    properties: Properties,
    gas_price: Property<BigInt>,
    gas_limit: Property<BigInt>,
}

struct EthereumSource {
    properties: Properties,
    amount: Property<BigInt>,
}

struct EthereumDestination {
    properties: Properties,
    address: Property<String>,
    amount: Property<BigInt>,
}

pub struct EthereumTransaction<'a> {
    account: &'a Account,
    chain_id: u64,
    properties: Properties,
    nonce: Property<BigInt>,
    fee: EthereumFee,
    source: Option<EthereumSource>,
    destination: Option<EthereumDestination>,
    payload: Vec<u8>,
    signature: Option<Vec<u8>>,
    tracker: StateTracker,
}

impl<'a> EthereumTransaction<'a> {
    pub fn new(account: &'a Account, config: &WalletConfig) -> Result<Self> {
        let mut properties = Properties::new("Transaction");
        let nonce = properties.bind(
            "nonce",
            PropertyTrait::Required,
            Some(non_negative("nonce")),
        )?;

        let mut fee_properties = Properties::new("TransactionFee");
        let gas_price = fee_properties.bind(
            "gas_price",
            PropertyTrait::Required,
            Some(non_negative("gas price")),
        )?;
        let gas_limit = fee_properties.bind_with_default(
            "gas_limit",
            BigInt::from(config.ethereum_default_gas_limit),
            PropertyTrait::Optional,
            Some(non_negative("gas limit")),
        )?;

        Ok(EthereumTransaction {
            account,
            chain_id: u64::from(account.blockchain_type().net_type),
            properties,
            nonce,
            fee: EthereumFee {
                properties: fee_properties,
                gas_price,
                gas_limit,
            },
            source: None,
            destination: None,
            payload: Vec::new(),
            signature: None,
            tracker: StateTracker::new(),
        })
    }

    fn groups(&self) -> impl Iterator<Item = (String, &Properties)> + '_ {
        [
            Some(&self.properties),
            Some(&self.fee.properties),
            self.source.as_ref().map(|source| &source.properties),
            self.destination.as_ref().map(|destination| &destination.properties),
        ]
        .into_iter()
        .flatten()
        .map(|properties| (String::new(), properties))
    }

    fn source_ref(&self) -> Result<&EthereumSource> {
        self.source
            .as_ref()
            .ok_or_else(|| Error::Transaction("Transaction doesn't have a source.".to_string()))
    }

    fn destination_ref(&self) -> Result<&EthereumDestination> {
        self.destination.as_ref().ok_or_else(|| {
            Error::Transaction("Transaction doesn't have a destination.".to_string())
        })
    }

    fn gas_price(&self) -> Result<&BigInt> {
        self.fee
            .properties
            .get(self.fee.gas_price)
            .ok_or_else(|| Error::Transaction("Gas price is not set.".to_string()))
    }

    fn gas_limit(&self) -> Result<&BigInt> {
        self.fee.properties.require(self.fee.gas_limit)
    }

    fn check(&self) -> Result<()> {
        self.source_ref()?;
        self.destination_ref()?;
        validate_all(self.groups())
    }

    fn check_balance(&self) -> Result<()> {
        let source = self.source_ref()?;
        let destination = self.destination_ref()?;
        let remaining = source.properties.require(source.amount)?
            - destination.properties.require(destination.amount)?
            - self.get_total_fee()?;
        if remaining.is_negative() {
            return Err(Error::Transaction(
                "Transaction is trying to spend more than available.".to_string(),
            ));
        }
        Ok(())
    }

    /// `[nonce, gasPrice, gasLimit, to, value, data]`
    fn fields(&self) -> Result<Vec<RlpItem>> {
        let destination = self.destination_ref()?;
        let address = parse_address(destination.properties.require(destination.address)?)?;
        Ok(vec![
            RlpItem::from_big_int(self.properties.require(self.nonce)?)?,
            RlpItem::from_big_int(self.gas_price()?)?,
            RlpItem::from_big_int(self.gas_limit()?)?,
            RlpItem::Bytes(address.to_vec()),
            RlpItem::from_big_int(destination.properties.require(destination.amount)?)?,
            RlpItem::Bytes(self.payload.clone()),
        ])
    }

    fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut fields = self.fields()?;
        if self.chain_id > 0 {
            fields.extend([
                RlpItem::from_uint(self.chain_id),
                RlpItem::from_uint(0),
                RlpItem::from_uint(0),
            ]);
        }
        Ok(RlpItem::List(fields).encode())
    }

    fn encode_signed(&self) -> Result<Vec<u8>> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| Error::Internal("Can't serialize unsigned transaction.".to_string()))?;
        if signature.len() != SIGNATURE_SIZE {
            return Err(Error::Internal(format!(
                "Invalid signature size: expected {}, got {}",
                SIGNATURE_SIZE,
                signature.len()
            )));
        }

        let recovery_id = u64::from(signature[64]);
        let v = if self.chain_id > 0 {
            recovery_id + EIP155_V_OFFSET + 2 * self.chain_id
        } else {
            recovery_id + LEGACY_V_OFFSET
        };

        let mut fields = self.fields()?;
        fields.extend([
            RlpItem::from_uint(v),
            unsigned_integer(&signature[..32]),
            unsigned_integer(&signature[32..64]),
        ]);
        Ok(RlpItem::List(fields).encode())
    }
}

/// Big-endian integer bytes without leading zeroes.
fn unsigned_integer(bytes: &[u8]) -> RlpItem {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    RlpItem::Bytes(bytes[first..].to_vec())
}

impl Transaction for EthereumTransaction<'_> {
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
        if self.source.is_some() {
            return Err(Error::Transaction(
                "Multiple sources are not supported.".to_string(),
            ));
        }
        let mut properties = Properties::new("TransactionSource");
        let amount = properties.bind(
            "amount",
            PropertyTrait::Required,
            Some(non_negative("transaction source value")),
        )?;
        let source = self.source.insert(EthereumSource { properties, amount });
        Ok(&mut source.properties)
    }

    fn add_destination(&mut self) -> Result<&mut Properties> {
        ensure_building(self.state(), "a destination")?;
        if self.destination.is_some() {
            return Err(Error::Transaction(
                "Multiple destinations are not supported.".to_string(),
            ));
        }
        let mut properties = Properties::new("TransactionDestination");
        let valid_address: Predicate<String> =
            Box::new(|value: &String, _: &Properties| parse_address(value).map(|_| ()));
        let address = properties.bind("address", PropertyTrait::Required, Some(valid_address))?;
        let amount = properties.bind(
            "amount",
            PropertyTrait::Required,
            Some(non_negative("transaction destination value")),
        )?;
        let destination = self.destination.insert(EthereumDestination {
            properties,
            address,
            amount,
        });
        Ok(&mut destination.properties)
    }

    fn source(&mut self, index: usize) -> Result<&mut Properties> {
        match (index, self.source.as_mut()) {
            (0, Some(source)) => Ok(&mut source.properties),
            _ => Err(not_found("source", index)),
        }
    }

    fn destination(&mut self, index: usize) -> Result<&mut Properties> {
        match (index, self.destination.as_mut()) {
            (0, Some(destination)) => Ok(&mut destination.properties),
            _ => Err(not_found("destination", index)),
        }
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
        let result = self.check_balance();
        self.tracker.finish(TransactionState::Updated, result)
    }

    fn sign(&mut self) -> Result<()> {
        self.update()?;
        let result = self
            .signing_payload()
            .and_then(|payload| self.account.sign(&payload))
            .map(|signature| self.signature = Some(signature));
        self.tracker.finish(TransactionState::Signed, result)
    }

    fn serialize(&mut self) -> Result<Vec<u8>> {
        self.sign()?;
        let result = self.encode_signed();
        let serialized = self.tracker.finish(TransactionState::Serialized, result)?;
        info!(
            size = serialized.len(),
            chain_id = self.chain_id,
            "serialized Ethereum transaction"
        );
        Ok(serialized)
    }

    /// `gas_limit × gas_price`
    fn get_total_fee(&self) -> Result<BigInt> {
        Ok(self.gas_limit()? * self.gas_price()?)
    }

    fn get_total_spent(&self) -> Result<BigInt> {
        let destination = self.destination_ref()?;
        let amount = destination
            .properties
            .get(destination.amount)
            .cloned()
            .unwrap_or_default();
        Ok(amount + self.get_total_fee()?)
    }

    fn estimate_total_fee(&self, _sources_count: usize, _destinations_count: usize) -> Result<BigInt> {
        let zero_bytes = self.payload.iter().filter(|b| **b == 0).count() as u64;
        let nonzero_bytes = self.payload.len() as u64 - zero_bytes;
        let gas = TX_BASE_GAS
            + zero_bytes * PAYLOAD_ZERO_BYTE_GAS
            + nonzero_bytes * PAYLOAD_NONZERO_BYTE_GAS;
        Ok(self.gas_price()? * BigInt::from(gas))
    }

    fn set_message(&mut self, message: &[u8]) -> Result<()> {
        self.payload = message.to_vec();
        self.properties.set_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{Currency, ETHEREUM_CHAIN_ID_MAINNET, ETHEREUM_CHAIN_ID_NONE};
    use crate::utils::{self, SECP256K1};
    use hex_literal::hex;
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
    use secp256k1::Message;

    const KEY: &str = "cc798d20ea341f838981c3df7f58f1bf453e6dcc2894c0d17d7da1b422a623c7";
    const TO: &str = "54f46318d8f83c28b719ccf01ab4628e1e8f65fa";

    fn account(chain_id: u32) -> Account {
        Account::from_private_key(BlockchainType::new(Currency::Ethereum, chain_id), KEY).unwrap()
    }

    fn prepared(account: &Account) -> EthereumTransaction<'_> {
        let mut tx = EthereumTransaction::new(account, &WalletConfig::default()).unwrap();
        tx.transaction_properties()
            .set_value("nonce", BigInt::from(9))
            .unwrap();
        tx.fee()
            .unwrap()
            .set_value("gas_price", BigInt::from(20_000_000_000u64))
            .unwrap();
        tx.add_source()
            .unwrap()
            .set_value("amount", BigInt::from(10u64.pow(19)))
            .unwrap();
        let destination = tx.add_destination().unwrap();
        destination.set_value("address", TO.to_string()).unwrap();
        destination
            .set_value("amount", BigInt::from(10u64.pow(18)))
            .unwrap();
        tx
    }

    fn decode_fields(serialized: &[u8]) -> Vec<Vec<u8>> {
        RlpItem::decode(serialized)
            .unwrap()
            .as_list()
            .unwrap()
            .iter()
            .map(|item| item.as_bytes().unwrap().to_vec())
            .collect()
    }

    /// Recovers the signer from a serialized transaction and the payload it signed.
    fn recover(fields: &[Vec<u8>], recovery_id: u8, payload: &[u8]) -> secp256k1::PublicKey {
        let mut compact = [0u8; 64];
        compact[32 - fields[7].len()..32].copy_from_slice(&fields[7]);
        compact[64 - fields[8].len()..].copy_from_slice(&fields[8]);
        let signature = RecoverableSignature::from_compact(
            &compact,
            RecoveryId::try_from(i32::from(recovery_id)).unwrap(),
        )
        .unwrap();
        SECP256K1
            .recover_ecdsa(&Message::from_digest(utils::keccak256(payload)), &signature)
            .unwrap()
    }

    #[test]
    fn test_eip155_transaction() {
        let account = account(ETHEREUM_CHAIN_ID_MAINNET);
        let mut tx = prepared(&account);
        let serialized = tx.serialize().unwrap();
        assert_eq!(tx.state(), TransactionState::Serialized);

        let fields = decode_fields(&serialized);
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0], vec![9]);
        assert_eq!(fields[1], hex!("04a817c800").to_vec());
        assert_eq!(fields[2], hex!("5208").to_vec());
        assert_eq!(fields[3], hex!("54f46318d8f83c28b719ccf01ab4628e1e8f65fa").to_vec());
        assert_eq!(fields[4], hex!("0de0b6b3a7640000").to_vec());
        assert!(fields[5].is_empty());

        let v = fields[6][0];
        assert!(v == 37 || v == 38, "v = {}", v);
        let payload = tx.signing_payload().unwrap();
        assert_eq!(
            recover(&fields, v - 37, &payload).serialize(),
            account.public_key().serialize_compressed()
        );

        // cross-check framing with an independent RLP implementation
        assert_eq!(rlp::Rlp::new(&serialized).item_count().unwrap(), 9);
    }

    #[test]
    fn test_unprotected_transaction() {
        let account = account(ETHEREUM_CHAIN_ID_NONE);
        let mut tx = prepared(&account);
        let serialized = tx.serialize().unwrap();
        let fields = decode_fields(&serialized);
        let v = fields[6][0];
        assert!(v == 27 || v == 28, "v = {}", v);

        let payload = tx.signing_payload().unwrap();
        assert_eq!(RlpItem::decode(&payload).unwrap().as_list().unwrap().len(), 6);
        assert_eq!(
            recover(&fields, v - 27, &payload).serialize(),
            account.public_key().serialize_compressed()
        );
    }

    #[test]
    fn test_fee_and_spent() {
        let account = account(ETHEREUM_CHAIN_ID_MAINNET);
        let tx = prepared(&account);
        let fee = BigInt::from(21_000u64 * 20_000_000_000);
        assert_eq!(tx.get_total_fee().unwrap(), fee);
        assert_eq!(
            tx.get_total_spent().unwrap(),
            BigInt::from(10u64.pow(18)) + fee
        );
    }

    #[test]
    fn test_estimate_counts_payload_bytes() {
        let account = account(ETHEREUM_CHAIN_ID_MAINNET);
        let mut tx = EthereumTransaction::new(&account, &WalletConfig::default()).unwrap();
        assert!(tx.estimate_total_fee(1, 1).is_err());

        tx.fee()
            .unwrap()
            .set_value("gas_price", BigInt::from(2))
            .unwrap();
        assert_eq!(tx.estimate_total_fee(1, 1).unwrap(), BigInt::from(42_000));

        tx.set_message(&[0, 1, 2]).unwrap();
        assert_eq!(
            tx.estimate_total_fee(1, 1).unwrap(),
            BigInt::from(2 * (21_000 + 4 + 2 * 68))
        );
    }

    #[test]
    fn test_message_invalidates_signature() {
        let account = account(ETHEREUM_CHAIN_ID_MAINNET);
        let mut tx = prepared(&account);
        let plain = tx.serialize().unwrap();

        tx.set_message(b"data").unwrap();
        assert_eq!(tx.state(), TransactionState::Building);
        let with_data = tx.serialize().unwrap();
        assert_ne!(plain, with_data);
        assert_eq!(decode_fields(&with_data)[5], b"data".to_vec());
    }

    #[test]
    fn test_overspend() {
        let account = account(ETHEREUM_CHAIN_ID_MAINNET);
        let mut tx = prepared(&account);
        tx.destination(0)
            .unwrap()
            .set_value("amount", BigInt::from(10u64.pow(19)))
            .unwrap();
        let err = tx.serialize().unwrap_err();
        assert!(err.to_string().contains("spend more than available"));
        assert_eq!(tx.state(), TransactionState::Building);
    }

    #[test]
    fn test_single_source_and_destination() {
        let account = account(ETHEREUM_CHAIN_ID_MAINNET);
        let mut tx = EthereumTransaction::new(&account, &WalletConfig::default()).unwrap();
        tx.add_source().unwrap();
        assert!(tx.add_source().is_err());
        let destination = tx.add_destination().unwrap();
        assert!(destination
            .set_value("address", "0x54f46318d8f83c28".to_string())
            .is_err());
        assert!(tx.add_destination().is_err());
        assert!(tx.source(1).is_err());

        let message = tx.validate().unwrap_err().to_string();
        assert!(message.contains("Transaction:\n\tnonce\n"));
        assert!(message.contains("TransactionFee:\n\tgas_price\n"));
        assert!(message.contains("TransactionDestination:\n\taddress\n\tamount\n"));
    }
}
