//! Wallet configuration
//!
//! This module defines the configuration options for wallets.

use serde::{Deserialize, Serialize};

use crate::coin_selection::SelectionStrategy;
use crate::keystore::{Cipher, KdfLevel};
use crate::mnemonic::{Language, VALID_WORD_COUNTS};

/// Wallet configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Selection policy applied by [`SigningInput::with_config`]
    ///
    /// [`SigningInput::with_config`]: crate::planner::SigningInput::with_config
    pub selection_strategy: SelectionStrategy,
    /// Fee rate, in base units per byte, that [`SigningInput::with_config`] fills in
    /// when the input leaves it at zero
    ///
    /// [`SigningInput::with_config`]: crate::planner::SigningInput::with_config
    pub default_byte_fee: u64,
    /// UTXOs with fewer confirmations are not spent. Zero disables the filter.
    pub min_confirmations: u32,
    /// Word list for generated mnemonics
    pub mnemonic_language: Language,
    /// Number of words in generated mnemonics
    pub mnemonic_word_count: usize,
    /// Key derivation cost for new keystores
    pub kdf_level: KdfLevel,
    /// Cipher for new keystores
    pub cipher: Cipher,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            selection_strategy: SelectionStrategy::FewestInputs,
            default_byte_fee: 1,
            min_confirmations: 0,
            mnemonic_language: Language::English,
            mnemonic_word_count: 12,
            kdf_level: KdfLevel::Standard,
            cipher: Cipher::Aes128Ctr,
        }
    }
}

impl WalletConfig {
    /// Create a new wallet configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selection strategy
    pub fn with_selection_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.selection_strategy = strategy;
        self
    }

    /// Set the default byte fee
    pub fn with_default_byte_fee(mut self, byte_fee: u64) -> Self {
        self.default_byte_fee = byte_fee;
        self
    }

    /// Set the confirmation filter
    pub fn with_min_confirmations(mut self, confirmations: u32) -> Self {
        self.min_confirmations = confirmations;
        self
    }

    /// Set language and word count of generated mnemonics
    pub fn with_mnemonic(mut self, language: Language, word_count: usize) -> Self {
        self.mnemonic_language = language;
        self.mnemonic_word_count = word_count;
        self
    }

    /// Set the keystore KDF level
    pub fn with_kdf_level(mut self, level: KdfLevel) -> Self {
        self.kdf_level = level;
        self
    }

    /// Set the keystore cipher
    pub fn with_cipher(mut self, cipher: Cipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.default_byte_fee == 0 {
            return Err(crate::error::Error::InvalidParameter(
                "Default byte fee must be at least 1".into(),
            ));
        }
        if !VALID_WORD_COUNTS.contains(&self.mnemonic_word_count) {
            return Err(crate::error::Error::InvalidParameter(format!(
                "Mnemonic word count must be one of {:?}, got {}",
                VALID_WORD_COUNTS, self.mnemonic_word_count
            )));
        }
        Ok(())
    }
}
