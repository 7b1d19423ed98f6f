//! BIP39 Mnemonic implementation

use core::fmt;
use core::str::FromStr;

use bip39 as bip39_crate;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::bip32::ExtendedPrivKey;
use crate::error::{Error, Result};
use crate::keys::Curve;
use crate::seed::Seed;

/// Word counts accepted by [`Mnemonic::generate`]
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Language for mnemonic generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    ChineseSimplified,
    ChineseTraditional,
    Czech,
    French,
    Italian,
    Japanese,
    Korean,
    Spanish,
}

impl From<Language> for bip39_crate::Language {
    fn from(lang: Language) -> Self {
        match lang {
            Language::English => bip39_crate::Language::English,
            Language::ChineseSimplified => bip39_crate::Language::SimplifiedChinese,
            Language::ChineseTraditional => bip39_crate::Language::TraditionalChinese,
            Language::Czech => bip39_crate::Language::Czech,
            Language::French => bip39_crate::Language::French,
            Language::Italian => bip39_crate::Language::Italian,
            Language::Japanese => bip39_crate::Language::Japanese,
            Language::Korean => bip39_crate::Language::Korean,
            Language::Spanish => bip39_crate::Language::Spanish,
        }
    }
}

/// Entropy size in bytes for a word count
fn entropy_len(word_count: usize) -> Result<usize> {
    if !VALID_WORD_COUNTS.contains(&word_count) {
        return Err(Error::InvalidMnemonic(format!("Invalid word count: {}", word_count)));
    }
    // 11 bits per word, one checksum bit per 32 bits of entropy
    Ok(word_count * 11 * 32 / 33 / 8)
}

/// BIP39 Mnemonic phrase
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic {
    inner: bip39_crate::Mnemonic,
    language: Language,
}

impl Mnemonic {
    /// Generate a new mnemonic with the specified word count
    pub fn generate(word_count: usize, language: Language) -> Result<Self> {
        let mut entropy = vec![0u8; entropy_len(word_count)?];
        getrandom::getrandom(&mut entropy)
            .map_err(|e| Error::CryptoFailure(format!("Failed to generate entropy: {}", e)))?;

        let mnemonic = Self::from_entropy(&entropy, language);
        entropy.zeroize();
        mnemonic
    }

    /// Create a mnemonic from a phrase.
    ///
    /// Words may be separated by any whitespace; unknown words and a wrong
    /// checksum are rejected.
    pub fn from_phrase(phrase: &str, language: Language) -> Result<Self> {
        let mnemonic = bip39_crate::Mnemonic::parse_in(language.into(), phrase)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

        Ok(Self {
            inner: mnemonic,
            language,
        })
    }

    /// Create a mnemonic from entropy bytes
    pub fn from_entropy(entropy: &[u8], language: Language) -> Result<Self> {
        let mnemonic = bip39_crate::Mnemonic::from_entropy_in(language.into(), entropy)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

        Ok(Self {
            inner: mnemonic,
            language,
        })
    }

    /// Get the mnemonic phrase as a string
    pub fn phrase(&self) -> String {
        self.inner.words().collect::<Vec<_>>().join(" ")
    }

    /// Get the word count
    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Entropy the phrase encodes
    pub fn to_entropy(&self) -> Vec<u8> {
        self.inner.to_entropy()
    }

    /// PBKDF2-HMAC-SHA512 seed with optional passphrase
    pub fn to_seed(&self, passphrase: &str) -> Seed {
        Seed::new(self.inner.to_seed(passphrase))
    }

    /// Derive the master key on `curve` from this mnemonic
    pub fn to_master_key(&self, passphrase: &str, curve: Curve) -> Result<ExtendedPrivKey> {
        let seed = self.to_seed(passphrase);
        ExtendedPrivKey::new_master(curve, seed.as_slice()).map_err(Into::into)
    }

    /// Validate a mnemonic phrase
    pub fn validate(phrase: &str, language: Language) -> bool {
        bip39_crate::Mnemonic::parse_in(language.into(), phrase).is_ok()
    }

    /// Whether `word` is in the English word list
    pub fn is_valid_word(word: &str) -> bool {
        bip39_crate::Language::English.find_word(word).is_some()
    }

    /// English words starting with `prefix`
    pub fn suggest(prefix: &str) -> Vec<&'static str> {
        if prefix.is_empty() {
            return Vec::new();
        }
        bip39_crate::Language::English.words_by_prefix(prefix).to_vec()
    }
}

impl FromStr for Mnemonic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Try English by default
        Self::from_phrase(s, Language::English)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phrase())
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic({:?}, {} words)", self.language, self.word_count())
    }
}
