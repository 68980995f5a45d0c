use crate::bip44::CoinType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NET_TYPE_MAINNET: u32 = 0;
pub const NET_TYPE_TESTNET: u32 = 1;

/// EIP-155 chain ids, used as the Ethereum net type. Zero disables replay protection.
pub const ETHEREUM_CHAIN_ID_NONE: u32 = 0;
pub const ETHEREUM_CHAIN_ID_MAINNET: u32 = 1;
pub const ETHEREUM_CHAIN_ID_ROPSTEN: u32 = 3;
pub const ETHEREUM_CHAIN_ID_RINKEBY: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Bitcoin,
    Ethereum,
    Golos,
}

impl Currency {
    pub fn coin_type(&self) -> CoinType {
        match self {
            Currency::Bitcoin => CoinType::BITCOIN,
            Currency::Ethereum => CoinType::ETHEREUM,
            Currency::Golos => CoinType::GOLOS,
        }
    }

    pub fn from_coin_type(coin_type: u32) -> Result<Self> {
        [Currency::Bitcoin, Currency::Ethereum, Currency::Golos]
            .into_iter()
            .find(|currency| currency.coin_type().0 == coin_type)
            .ok_or(Error::UnsupportedCurrency)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Currency::Bitcoin => "Bitcoin",
            Currency::Ethereum => "Ethereum",
            Currency::Golos => "Golos",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A currency together with its blockchain-specific net type
/// (0 is mainnet everywhere except Ethereum, where it is the chain id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockchainType {
    pub currency: Currency,
    pub net_type: u32,
}

impl BlockchainType {
    pub fn new(currency: Currency, net_type: u32) -> Self {
        BlockchainType { currency, net_type }
    }

    pub fn mainnet(currency: Currency) -> Self {
        let net_type = match currency {
            Currency::Ethereum => ETHEREUM_CHAIN_ID_MAINNET,
            Currency::Bitcoin | Currency::Golos => NET_TYPE_MAINNET,
        };
        BlockchainType { currency, net_type }
    }

    pub fn is_testnet(&self) -> bool {
        match self.currency {
            Currency::Ethereum => self.net_type != ETHEREUM_CHAIN_ID_MAINNET,
            Currency::Bitcoin | Currency::Golos => self.net_type == NET_TYPE_TESTNET,
        }
    }
}

impl fmt::Display for BlockchainType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.currency, self.net_type)
    }
}
