//! Wallet Core Library
//!
//! This library provides the chain-independent core of a multi-coin wallet:
//! hierarchical deterministic key derivation on secp256k1, ed25519 and
//! nist256p1, address encoding for 25 coins, planning and signing of UTXO
//! transactions for Bitcoin-like chains, Zcash and Decred, and an encrypted
//! keystore.
//!
//! ```
//! use wallet_core::{CoinType, HDWallet};
//!
//! let wallet = HDWallet::from_mnemonic(
//!     "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
//!     "",
//! )
//! .unwrap();
//! let address = wallet.get_address(CoinType::Bitcoin).unwrap();
//! assert_eq!(address.to_string(), "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
//! ```

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub mod address;
pub mod base58;
pub mod bip32;
pub mod coin;
pub mod coin_selection;
pub mod config;
pub mod derivation_slip10;
pub mod encode;
pub mod error;
pub mod fee;
pub mod keys;
pub mod keystore;
pub mod mnemonic;
pub mod planner;
pub mod script;
pub mod seed;
pub mod signer;
pub mod transaction;
pub(crate) mod utils;
pub mod utxo;
pub mod wallet;

pub use address::Address;
pub use bip32::{ChildNumber, DerivationPath, ExtendedPrivKey, ExtendedPubKey};
pub use coin::{Blockchain, CoinDescriptor, CoinType, FeeModel, Purpose, SAPLING_BRANCH_ID};
pub use coin_selection::{CoinSelector, SelectionResult, SelectionStrategy};
pub use config::WalletConfig;
pub use error::{Error, Result};
pub use fee::FeeCalculator;
pub use keys::{Curve, PrivateKey, PublicKey, PublicKeyType};
pub use keystore::{Account, StoredKey, StoredKeyType};
pub use mnemonic::{Language, Mnemonic};
pub use planner::{PaymentOutput, SigningInput, TransactionPlan};
pub use script::{Script, ScriptType};
pub use seed::Seed;
pub use signer::{SignerState, SigningOutput, TransactionSigner};
pub use utxo::UnspentOutput;
pub use wallet::HDWallet;

/// Re-export commonly used types
pub mod prelude {
    pub use super::{
        Address, CoinType, Curve, DerivationPath, Error, HDWallet, Mnemonic, PrivateKey,
        PublicKey, Result, SigningInput, StoredKey, TransactionSigner,
    };
}
