//! Error types for the wallet-core library

use thiserror::Error;

use crate::coin_selection::SelectionError;

/// Result type alias for wallet-core operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur in wallet-core operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed byte lengths, bad curve tag and similar caller mistakes
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unknown word, wrong checksum or unsupported word count
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Extended key string with a bad checksum, version or payload
    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    /// Hardened step from a public node, non-hardened ed25519 step or exhausted index range
    #[error("Invalid derivation: {0}")]
    InvalidDerivation(String),

    /// Address failed checksum, charset, prefix or HRP validation
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Selected UTXOs cannot cover the requested amount and fee
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: u64,
        required: u64,
    },

    /// A payment output or total amount of zero
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// No private key controls the script of the given input
    #[error("Missing private key for input {0}")]
    MissingPrivateKey(usize),

    /// Point validation, signing or signature verification failure
    #[error("Crypto failure: {0}")]
    CryptoFailure(String),

    /// Keystore MAC mismatch
    #[error("Invalid password")]
    InvalidPassword,

    /// The coin has no support for the requested operation
    #[error("Unsupported coin: {0}")]
    UnsupportedCoin(String),

    /// Malformed keystore document or account record
    #[error("Keystore error: {0}")]
    Keystore(String),

    /// Keystore file IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Keystore JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::bip32::Error> for Error {
    fn from(e: crate::bip32::Error) -> Self {
        match e {
            crate::bip32::Error::CannotDeriveFromHardenedKey
            | crate::bip32::Error::NonHardenedNotSupported
            | crate::bip32::Error::InvalidChildNumber(_)
            | crate::bip32::Error::InvalidChildNumberFormat
            | crate::bip32::Error::InvalidDerivationPathFormat
            | crate::bip32::Error::IndexRangeExhausted => Error::InvalidDerivation(e.to_string()),
            crate::bip32::Error::InvalidSeedLength(_) => Error::InvalidParameter(e.to_string()),
            _ => Error::InvalidExtendedKey(e.to_string()),
        }
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Error::CryptoFailure(e.to_string())
    }
}

impl From<SelectionError> for Error {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::InsufficientFunds {
                available,
                required,
            } => Error::InsufficientFunds {
                available,
                required,
            },
            SelectionError::NoUtxosAvailable {
                required,
            } => Error::InsufficientFunds {
                available: 0,
                required,
            },
            SelectionError::ZeroTarget => Error::ZeroAmount,
            SelectionError::AmountOverflow => {
                Error::InvalidParameter("Amount overflow".to_string())
            }
        }
    }
}

impl From<crate::transaction::sighash::Error> for Error {
    fn from(e: crate::transaction::sighash::Error) -> Self {
        Error::InvalidParameter(e.to_string())
    }
}
