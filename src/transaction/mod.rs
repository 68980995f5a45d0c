//! Transactions are assembled through [`Properties`] groups and driven
//! through validate, update, sign and serialize.

pub mod bitcoin;
pub mod ethereum;
pub mod golos;

use crate::account::Account;
use crate::config::WalletConfig;
use crate::currency::{BlockchainType, Currency};
use crate::error::{Error, Result};
use crate::properties::Properties;
use num_bigint::BigInt;
use std::fmt::Write;
use tracing::debug;

/// Pipeline step a transaction has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransactionState {
    Building,
    Validated,
    Updated,
    Signed,
    Serialized,
}

pub trait Transaction {
    fn blockchain_type(&self) -> BlockchainType;

    /// Current step; any property edit since the last step reads as `Building`.
    fn state(&self) -> TransactionState;

    /// Transaction-level properties (nonce, expiration, ...).
    fn transaction_properties(&mut self) -> &mut Properties;

    fn add_source(&mut self) -> Result<&mut Properties>;

    fn add_destination(&mut self) -> Result<&mut Properties>;

    fn source(&mut self, index: usize) -> Result<&mut Properties>;

    fn destination(&mut self, index: usize) -> Result<&mut Properties>;

    fn fee(&mut self) -> Result<&mut Properties>;

    /// Checks that every required property of every group is set.
    fn validate(&mut self) -> Result<()>;

    /// Computes balances, fees and change. Runs validation first.
    fn update(&mut self) -> Result<()>;

    /// Signs the updated transaction. Runs validation and update first.
    fn sign(&mut self) -> Result<()>;

    /// Runs the whole pipeline and returns the chain's wire format.
    fn serialize(&mut self) -> Result<Vec<u8>>;

    fn get_total_fee(&self) -> Result<BigInt>;

    fn get_total_spent(&self) -> Result<BigInt>;

    /// Fee expected for a transaction of the given shape; never changes state.
    fn estimate_total_fee(&self, sources_count: usize, destinations_count: usize) -> Result<BigInt>;

    fn set_message(&mut self, message: &[u8]) -> Result<()>;
}

/// Creates the transaction kind matching the account's currency.
pub fn make_transaction<'a>(account: &'a Account) -> Result<Box<dyn Transaction + 'a>> {
    make_transaction_with_config(account, &WalletConfig::default())
}

pub fn make_transaction_with_config<'a>(
    account: &'a Account,
    config: &WalletConfig,
) -> Result<Box<dyn Transaction + 'a>> {
    debug!(blockchain = %account.blockchain_type(), "creating transaction");
    Ok(match account.currency() {
        Currency::Bitcoin => Box::new(bitcoin::BitcoinTransaction::new(account, config)?),
        Currency::Ethereum => Box::new(ethereum::EthereumTransaction::new(account, config)?),
        Currency::Golos => Box::new(golos::GolosTransaction::new(account, config)?),
    })
}

/// Step bookkeeping shared by all transaction kinds.
#[derive(Debug)]
pub(crate) struct StateTracker {
    state: TransactionState,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        StateTracker {
            state: TransactionState::Building,
        }
    }

    pub(crate) fn current<'p>(&self, groups: impl IntoIterator<Item = &'p Properties>) -> TransactionState {
        if groups.into_iter().any(Properties::is_dirty) {
            TransactionState::Building
        } else {
            self.state
        }
    }

    /// Records the outcome of a step; a failed step leaves the transaction in `Building`.
    pub(crate) fn finish<T>(&mut self, step: TransactionState, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                debug!(state = ?step, "transaction step completed");
                self.state = step;
            }
            Err(err) => {
                debug!(state = ?step, error = %err, "transaction step failed");
                self.state = TransactionState::Building;
            }
        }
        result
    }
}

/// Validates every group, reporting each missing property under
/// `"{group}{suffix}:"`, one tab-indented name per line.
pub(crate) fn validate_all<'p>(groups: impl IntoIterator<Item = (String, &'p Properties)>) -> Result<()> {
    let mut report = String::new();
    for (suffix, properties) in groups {
        let (valid, missing) = properties.validate();
        if !valid {
            let _ = writeln!(report, "{}{}:", properties.name(), suffix);
            for name in missing {
                let _ = writeln!(report, "\t{}", name);
            }
        }
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(Error::Transaction(format!(
            "Not all required properties set.\n{}",
            report
        )))
    }
}

/// Sources and destinations can only be added while building.
pub(crate) fn ensure_building(state: TransactionState, what: &str) -> Result<()> {
    if state != TransactionState::Building {
        return Err(Error::Transaction(format!(
            "Can't add {} to a transaction in {:?} state.",
            what, state
        )));
    }
    Ok(())
}

pub(crate) fn not_found(what: &str, index: usize) -> Error {
    Error::InvalidArgument(format!("Transaction has no {} #{}", what, index))
}

/// Predicate rejecting negative amounts.
pub(crate) fn non_negative(what: &'static str) -> crate::properties::Predicate<BigInt> {
    Box::new(move |value: &BigInt, _: &Properties| {
        if value.sign() == num_bigint::Sign::Minus {
            return Err(Error::InvalidArgument(format!(
                "Can't set negative amount as {}.",
                what
            )));
        }
        Ok(())
    })
}
