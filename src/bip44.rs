use crate::bip32::{ChildNumber, DerivationPath};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Purpose level, always hardened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purpose(pub u32);

impl Purpose {
    pub const BIP44: Purpose = Purpose(44);

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::Hardened(self.0)
    }
}

/// Registered SLIP-44 coin type, always hardened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoinType(pub u32);

impl CoinType {
    pub const BITCOIN: CoinType = CoinType(0x00);
    pub const ETHEREUM: CoinType = CoinType(0x3c);
    pub const GOLOS: CoinType = CoinType(0x06_01_05);

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::Hardened(self.0)
    }
}

/// Account level, always hardened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountLevel(pub u32);

impl AccountLevel {
    pub fn new(value: u32) -> Self {
        AccountLevel(value)
    }

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::Hardened(self.0)
    }
}

/// The BIP-44 change level: external chain for receiving, internal chain for change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressType {
    External = 0,
    Internal = 1,
}

impl AddressType {
    pub fn index(&self) -> u32 {
        *self as u32
    }

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::Normal(self.index())
    }
}

impl TryFrom<u32> for AddressType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(AddressType::External),
            1 => Ok(AddressType::Internal),
            _ => Err(Error::InvalidArgument(format!(
                "Unknown address type {}",
                value
            ))),
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Address index, never hardened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressIndex(pub u32);

impl AddressIndex {
    pub fn new(value: u32) -> Self {
        AddressIndex(value)
    }

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::Normal(self.0)
    }
}

/// Path of a single address: m / purpose' / coin_type' / account' / change / address_index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bip44Path {
    pub purpose: Purpose,
    pub coin_type: CoinType,
    pub account: AccountLevel,
    pub change: AddressType,
    pub address_index: AddressIndex,
}

impl Bip44Path {
    pub fn standard(
        coin_type: CoinType,
        account: AccountLevel,
        change: AddressType,
        address_index: AddressIndex,
    ) -> Self {
        Bip44Path {
            purpose: Purpose::BIP44,
            coin_type,
            account,
            change,
            address_index,
        }
    }

    /// The three hardened levels every account path starts with.
    pub fn account_path(coin_type: CoinType, account: AccountLevel) -> DerivationPath {
        DerivationPath::new(vec![
            Purpose::BIP44.child_number(),
            coin_type.child_number(),
            account.child_number(),
        ])
    }

    pub fn to_derivation_path(&self) -> DerivationPath {
        DerivationPath::new(vec![
            self.purpose.child_number(),
            self.coin_type.child_number(),
            self.account.child_number(),
            self.change.child_number(),
            self.address_index.child_number(),
        ])
    }
}

impl FromStr for Bip44Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let path: DerivationPath = s.parse()?;

        let levels: [ChildNumber; 5] = path.path.as_slice().try_into().map_err(|_| {
            Error::InvalidDerivationPath("BIP-44 path must have 5 components".to_string())
        })?;

        let hardened = |child: ChildNumber, level: &str| match child {
            ChildNumber::Hardened(n) => Ok(n),
            ChildNumber::Normal(_) => Err(Error::InvalidDerivationPath(format!(
                "{} must be hardened",
                level
            ))),
        };

        let purpose = Purpose(hardened(levels[0], "Purpose")?);
        let coin_type = CoinType(hardened(levels[1], "Coin type")?);
        let account = AccountLevel(hardened(levels[2], "Account")?);

        let change = match levels[3] {
            ChildNumber::Normal(n) => AddressType::try_from(n).map_err(|_| {
                Error::InvalidDerivationPath("Change must be 0 or 1".to_string())
            })?,
            ChildNumber::Hardened(_) => {
                return Err(Error::InvalidDerivationPath(
                    "Change must not be hardened".to_string(),
                ))
            }
        };

        let address_index = match levels[4] {
            ChildNumber::Normal(n) => AddressIndex(n),
            ChildNumber::Hardened(_) => {
                return Err(Error::InvalidDerivationPath(
                    "Address index must not be hardened".to_string(),
                ))
            }
        };

        Ok(Bip44Path {
            purpose,
            coin_type,
            account,
            change,
            address_index,
        })
    }
}

impl fmt::Display for Bip44Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.to_derivation_path(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bip44_path_round_trip() {
        let path: Bip44Path = "m/44'/60'/2'/1/7".parse().unwrap();
        assert_eq!(path.coin_type, CoinType::ETHEREUM);
        assert_eq!(path.account, AccountLevel::new(2));
        assert_eq!(path.change, AddressType::Internal);
        assert_eq!(path.address_index, AddressIndex::new(7));
        assert_eq!(path.to_string(), "m/44'/60'/2'/1/7");
    }

    #[test]
    fn test_bip44_path_rejects_bad_levels() {
        assert!("m/44'/0'/0'/0".parse::<Bip44Path>().is_err());
        assert!("m/44/0'/0'/0/0".parse::<Bip44Path>().is_err());
        assert!("m/44'/0'/0'/2/0".parse::<Bip44Path>().is_err());
        assert!("m/44'/0'/0'/0/0'".parse::<Bip44Path>().is_err());
    }

    #[test]
    fn test_account_path_is_prefix() {
        let account = Bip44Path::account_path(CoinType::GOLOS, AccountLevel::new(0));
        let full = Bip44Path::standard(
            CoinType::GOLOS,
            AccountLevel::new(0),
            AddressType::External,
            AddressIndex::new(0),
        )
        .to_derivation_path();
        assert_eq!(&full.path[..3], &account.path[..]);
        assert_eq!(account.to_string(), "m/44'/393477'/0'");
    }
}
