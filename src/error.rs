use thiserror::Error;

/// Coarse classification of an [`Error`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    BadEntropy,
    OutOfMemory,
    Internal,
    GeneralError,
    FeatureNotSupported,
}

/// Error types for the wallet core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Bad entropy: {0}")]
    BadEntropy(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Invalid checksum")]
    InvalidChecksum,

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),

    #[error("Base58 decoding error: {0}")]
    Base58DecodeError(String),

    #[error("Hex decoding error: {0}")]
    HexDecodeError(#[from] hex::FromHexError),

    #[error("RLP decoding error: {0}")]
    RlpDecodeError(String),

    #[error("Hardened derivation requires private key")]
    HardenedDerivationRequiresPrivateKey,

    #[error("{properties}: {message}")]
    Property { properties: String, message: String },

    #[error("{0}")]
    Transaction(String),

    #[error("Currency not supported yet")]
    UnsupportedCurrency,

    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::BadEntropy(_) => ErrorKind::BadEntropy,
            Error::HardenedDerivationRequiresPrivateKey
            | Error::Secp256k1(_)
            | Error::Internal(_) => ErrorKind::Internal,
            Error::FeatureNotSupported(_) => ErrorKind::FeatureNotSupported,
            Error::InvalidKey(_)
            | Error::InvalidDerivationPath(_)
            | Error::InvalidExtendedKey(_)
            | Error::InvalidChecksum
            | Error::InvalidMnemonic(_)
            | Error::InvalidAddress(_)
            | Error::Base58DecodeError(_)
            | Error::HexDecodeError(_)
            | Error::RlpDecodeError(_)
            | Error::Property { .. }
            | Error::Transaction(_)
            | Error::UnsupportedCurrency => ErrorKind::GeneralError,
        }
    }

    pub(crate) fn property(properties: &str, message: impl Into<String>) -> Self {
        Error::Property {
            properties: properties.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
