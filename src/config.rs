use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunables for transaction construction.
///
/// Missing fields take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Default `min_amount_per_byte` of a Bitcoin fee, in satoshi.
    pub bitcoin_min_fee_per_byte: u64,
    /// Upper bound of sign-and-measure rounds when sizing the change output.
    pub bitcoin_fee_iterations: usize,
    pub ethereum_default_gas_limit: u64,
    /// Default `expire_duration` of Golos transactions, in seconds.
    pub golos_default_expire_seconds: Option<i32>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            bitcoin_min_fee_per_byte: 2,
            bitcoin_fee_iterations: 16,
            ethereum_default_gas_limit: 21_000,
            golos_default_expire_seconds: None,
        }
    }
}

impl WalletConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: WalletConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("Invalid wallet config: {}", e)))?;
        if config.bitcoin_fee_iterations == 0 {
            return Err(Error::InvalidArgument(
                "bitcoin_fee_iterations must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}
