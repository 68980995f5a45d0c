//! Golos transfers: a single `transfer` operation signed over the chain id,
//! serialized as the JSON the node API accepts.

use super::{
    ensure_building, non_negative, not_found, validate_all, StateTracker, Transaction,
    TransactionState,
};
use crate::account::{self, Account};
use crate::codec;
use crate::config::WalletConfig;
use crate::currency::BlockchainType;
use crate::error::{Error, Result};
use crate::properties::{Predicate, Properties, Property, PropertyTrait};
use chrono::{DateTime, NaiveDateTime, Utc};
use hex_literal::hex;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::Serialize;
use tracing::info;

const CHAIN_ID: [u8; 32] = hex!("782a3039b478c839e4cb0c941ff4eaeb7df40bdd68bd441afd444b9da763de12");
const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const MIN_EXPIRE_SECONDS: i32 = 10;
const REF_BLOCK_HASH_SIZE: usize = 20;

const TOKEN_NAME: &str = "GOLOS";
const TOKEN_NAME_SIZE: usize = 7;
const DECIMAL_PLACES: u8 = 3;
const DECIMAL_DIVISOR: u64 = 1000;

const OPERATIONS_COUNT: u8 = 1;
const TRANSFER_OPERATION_ID: u8 = 0x02;
const TRANSFER_OPERATION_NAME: &str = "transfer";

fn parse_expiration(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, EXPIRATION_FORMAT)
        .map(|time| time.and_utc())
        .map_err(|e| {
            Error::InvalidArgument(format!("Invalid ISO8601 date/time value \"{}\": {}", value, e))
        })
}

/// `"1.234 GOLOS"` for 1234 base units.
fn format_amount(amount: u64) -> String {
    format!(
        "{}.{:0width$} {}",
        amount / DECIMAL_DIVISOR,
        amount % DECIMAL_DIVISOR,
        TOKEN_NAME,
        width = DECIMAL_PLACES as usize
    )
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    codec::write_varint(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

/// Source or destination: an account name and an optional amount.
struct GolosParty {
    properties: Properties,
    address: Property<String>,
    amount: Property<BigInt>,
}

impl GolosParty {
    fn new(name: &str, blockchain: BlockchainType, what: &'static str) -> Result<Self> {
        let mut properties = Properties::new(name);
        let valid_address: Predicate<String> = Box::new(move |value: &String, _: &Properties| {
            account::validate_address(blockchain, value)
        });
        Ok(GolosParty {
            address: properties.bind("address", PropertyTrait::Required, Some(valid_address))?,
            amount: properties.bind("amount", PropertyTrait::Optional, Some(non_negative(what)))?,
            properties,
        })
    }

    fn address(&self) -> Result<&str> {
        Ok(self.properties.require(self.address)?.as_str())
    }

    fn amount(&self) -> Result<u64> {
        match self.properties.get(self.amount) {
            Some(amount) => amount.to_u64().ok_or_else(|| {
                Error::InvalidArgument(format!("Amount {} doesn't fit into 64 bits.", amount))
            }),
            None => Ok(0),
        }
    }
}

#[derive(Serialize)]
struct TransferJson<'t> {
    from: &'t str,
    to: &'t str,
    amount: String,
    memo: &'t str,
}

#[derive(Serialize)]
struct SignedTransactionJson<'t> {
    ref_block_num: u16,
    ref_block_prefix: u32,
    expiration: String,
    operations: Vec<(&'static str, TransferJson<'t>)>,
    extensions: Vec<serde_json::Value>,
    signatures: Vec<String>,
}

pub struct GolosTransaction<'a> {
    account: &'a Account,
    properties: Properties,
    expire_duration: Property<i32>,
    expiration: Property<String>,
    ref_block_num: Property<i32>,
    ref_block_hash: Property<Vec<u8>>,
    source: Option<GolosParty>,
    destination: Option<GolosParty>,
    memo: String,
    expiration_time: Option<DateTime<Utc>>,
    signature: Option<Vec<u8>>,
    tracker: StateTracker,
}

impl<'a> GolosTransaction<'a> {
    pub fn new(account: &'a Account, config: &WalletConfig) -> Result<Self> {
        let mut properties = Properties::new("Transaction");

        let long_enough: Predicate<i32> = Box::new(|value: &i32, _: &Properties| {
            if *value <= MIN_EXPIRE_SECONDS {
                return Err(Error::InvalidArgument(format!(
                    "Expire duration is too small. Expected more than {}, got {}.",
                    MIN_EXPIRE_SECONDS, value
                )));
            }
            Ok(())
        });
        let expire_duration = match config.golos_default_expire_seconds {
            Some(seconds) => properties.bind_with_default(
                "expire_duration",
                seconds,
                PropertyTrait::Optional,
                Some(long_enough),
            )?,
            None => properties.bind("expire_duration", PropertyTrait::Optional, Some(long_enough))?,
        };

        let valid_time: Predicate<String> =
            Box::new(|value: &String, _: &Properties| parse_expiration(value).map(|_| ()));
        let expiration = properties.bind("expiration", PropertyTrait::Optional, Some(valid_time))?;

        let ref_block_num = properties.bind("ref_block_num", PropertyTrait::Required, None)?;

        let hash_size: Predicate<Vec<u8>> = Box::new(|value: &Vec<u8>, _: &Properties| {
            if value.len() != REF_BLOCK_HASH_SIZE {
                return Err(Error::InvalidArgument(format!(
                    "Invalid block hash length. Expected: {}, received: {}.",
                    REF_BLOCK_HASH_SIZE,
                    value.len()
                )));
            }
            Ok(())
        });
        let ref_block_hash =
            properties.bind("ref_block_hash", PropertyTrait::Required, Some(hash_size))?;

        Ok(GolosTransaction {
            account,
            properties,
            expire_duration,
            expiration,
            ref_block_num,
            ref_block_hash,
            source: None,
            destination: None,
            memo: String::new(),
            expiration_time: None,
            signature: None,
            tracker: StateTracker::new(),
        })
    }

    fn groups(&self) -> impl Iterator<Item = (String, &Properties)> + '_ {
        [
            Some(&self.properties),
            self.source.as_ref().map(|source| &source.properties),
            self.destination.as_ref().map(|destination| &destination.properties),
        ]
        .into_iter()
        .flatten()
        .map(|properties| (String::new(), properties))
    }

    fn source_ref(&self) -> Result<&GolosParty> {
        self.source.as_ref().ok_or_else(|| {
            Error::Transaction("Golos transaction should have one source.".to_string())
        })
    }

    fn destination_ref(&self) -> Result<&GolosParty> {
        self.destination.as_ref().ok_or_else(|| {
            Error::Transaction("Golos transaction should have one destination.".to_string())
        })
    }

    fn check(&self) -> Result<()> {
        self.source_ref()?;
        self.destination_ref()?;
        if self.properties.get(self.expire_duration).is_none()
            && !self.properties.is_set(self.expiration)
        {
            return Err(Error::Transaction(
                "Expiration is not set. Set it either with \"expire_duration\" or \"expiration\"."
                    .to_string(),
            ));
        }
        validate_all(self.groups())
    }

    /// An explicit `expiration` wins over `expire_duration`, which counts from now.
    fn resolve_expiration(&self) -> Result<DateTime<Utc>> {
        if let Some(expiration) = self.properties.get(self.expiration) {
            return parse_expiration(expiration);
        }
        let seconds = self.properties.require(self.expire_duration)?;
        Ok(Utc::now() + chrono::Duration::seconds(i64::from(*seconds)))
    }

    fn ref_block_num(&self) -> Result<u16> {
        Ok(*self.properties.require(self.ref_block_num)? as u16)
    }

    fn ref_block_prefix(&self) -> Result<u32> {
        let hash = self.properties.require(self.ref_block_hash)?;
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&hash[4..8]);
        Ok(u32::from_le_bytes(prefix))
    }

    fn expiration_time(&self) -> Result<DateTime<Utc>> {
        self.expiration_time
            .ok_or_else(|| Error::Internal("Transaction expiration is not resolved.".to_string()))
    }

    /// Binary transaction body, without the chain id.
    fn encode(&self) -> Result<Vec<u8>> {
        let source = self.source_ref()?;
        let destination = self.destination_ref()?;
        let expiration = u32::try_from(self.expiration_time()?.timestamp()).map_err(|_| {
            Error::InvalidArgument("Expiration is out of the supported range.".to_string())
        })?;

        let mut out = Vec::new();
        out.extend_from_slice(&self.ref_block_num()?.to_le_bytes());
        out.extend_from_slice(&self.ref_block_prefix()?.to_le_bytes());
        out.extend_from_slice(&expiration.to_le_bytes());

        out.push(OPERATIONS_COUNT);
        out.push(TRANSFER_OPERATION_ID);
        write_string(&mut out, source.address()?);
        write_string(&mut out, destination.address()?);
        out.extend_from_slice(&destination.amount()?.to_le_bytes());
        out.push(DECIMAL_PLACES);
        let mut token = [0u8; TOKEN_NAME_SIZE];
        token[..TOKEN_NAME.len()].copy_from_slice(TOKEN_NAME.as_bytes());
        out.extend_from_slice(&token);
        write_string(&mut out, &self.memo);

        // extensions
        out.push(0x00);
        Ok(out)
    }

    fn signing_data(&self) -> Result<Vec<u8>> {
        let mut data = CHAIN_ID.to_vec();
        data.extend_from_slice(&self.encode()?);
        Ok(data)
    }

    fn to_json(&self) -> Result<Vec<u8>> {
        let source = self.source_ref()?;
        let destination = self.destination_ref()?;
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| Error::Internal("Can't serialize unsigned transaction.".to_string()))?;

        let json = SignedTransactionJson {
            ref_block_num: self.ref_block_num()?,
            ref_block_prefix: self.ref_block_prefix()?,
            expiration: self.expiration_time()?.format(EXPIRATION_FORMAT).to_string(),
            operations: vec![(
                TRANSFER_OPERATION_NAME,
                TransferJson {
                    from: source.address()?,
                    to: destination.address()?,
                    amount: format_amount(destination.amount()?),
                    memo: &self.memo,
                },
            )],
            extensions: Vec::new(),
            signatures: vec![codec::hex_encode(signature)],
        };
        serde_json::to_vec(&json)
            .map_err(|e| Error::Internal(format!("Failed to format transaction as JSON: {}", e)))
    }
}

impl Transaction for GolosTransaction<'_> {
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
                "Golos transaction can have only one source.".to_string(),
            ));
        }
        let source = GolosParty::new(
            "TransactionSource",
            self.blockchain_type(),
            "transaction source value",
        )?;
        Ok(&mut self.source.insert(source).properties)
    }

    fn add_destination(&mut self) -> Result<&mut Properties> {
        ensure_building(self.state(), "a destination")?;
        if self.destination.is_some() {
            return Err(Error::Transaction(
                "Golos transaction can have only one destination.".to_string(),
            ));
        }
        let destination = GolosParty::new(
            "TransactionDestination",
            self.blockchain_type(),
            "transaction destination value",
        )?;
        Ok(&mut self.destination.insert(destination).properties)
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
        Err(Error::FeatureNotSupported(
            "Golos transaction fee is not customizable.".to_string(),
        ))
    }

    fn validate(&mut self) -> Result<()> {
        let result = self.check();
        self.tracker.finish(TransactionState::Validated, result)
    }

    fn update(&mut self) -> Result<()> {
        self.validate()?;
        let result = self
            .resolve_expiration()
            .map(|expiration| self.expiration_time = Some(expiration));
        self.tracker.finish(TransactionState::Updated, result)
    }

    fn sign(&mut self) -> Result<()> {
        self.update()?;
        let result = self
            .signing_data()
            .and_then(|data| self.account.sign(&data))
            .map(|signature| self.signature = Some(signature));
        self.tracker.finish(TransactionState::Signed, result)
    }

    fn serialize(&mut self) -> Result<Vec<u8>> {
        self.sign()?;
        let result = self.to_json();
        let serialized = self.tracker.finish(TransactionState::Serialized, result)?;
        info!(size = serialized.len(), "serialized Golos transaction");
        Ok(serialized)
    }

    fn get_total_fee(&self) -> Result<BigInt> {
        Ok(BigInt::from(0))
    }

    fn get_total_spent(&self) -> Result<BigInt> {
        let destination = self.destination.as_ref().ok_or_else(|| {
            Error::Transaction(
                "Failed to calculate total spent. Transaction has no destinations.".to_string(),
            )
        })?;
        Ok(destination
            .properties
            .get(destination.amount)
            .cloned()
            .unwrap_or_default())
    }

    fn estimate_total_fee(&self, _sources_count: usize, _destinations_count: usize) -> Result<BigInt> {
        Ok(BigInt::from(0))
    }

    fn set_message(&mut self, message: &[u8]) -> Result<()> {
        self.memo = String::from_utf8(message.to_vec())
            .map_err(|_| Error::InvalidArgument("Golos memo must be valid UTF-8.".to_string()))?;
        self.properties.set_dirty();
        Ok(())
    }
}
