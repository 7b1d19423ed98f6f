//! Encrypted keystore
//!
//! A [`StoredKey`] holds one mnemonic or one private key, encrypted under a
//! password in the Web3 Secret Storage v3 format, and the list of accounts
//! derived from it. Account records carry no secrets: addresses, paths and
//! public keys stay readable without the password.

mod crypto;

pub use crypto::{Cipher, EncryptedPayload, EncryptionParameters, KdfLevel, KdfParams};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::address::Address;
use crate::bip32::DerivationPath;
use crate::coin::CoinType;
use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::keys::PrivateKey;
use crate::mnemonic::{Language, Mnemonic};
use crate::wallet::HDWallet;

/// Keystore format version
pub const KEYSTORE_VERSION: u32 = 3;

/// Word count of generated mnemonics
const RANDOM_MNEMONIC_WORDS: usize = 12;

/// What the encrypted payload holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoredKeyType {
    #[default]
    #[serde(rename = "private-key")]
    PrivateKey,
    #[serde(rename = "mnemonic")]
    Mnemonic,
}

/// A coin account derived from the stored secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub address: String,
    pub coin: CoinType,
    pub derivation_path: DerivationPath,
    /// Hex public key in the coin's encoding
    #[serde(default)]
    pub public_key: String,
    /// Account level extended public key, empty for coins without one
    #[serde(default)]
    pub extended_public_key: String,
}

/// Password protected key container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub key_type: StoredKeyType,
    pub version: u32,
    #[serde(rename = "crypto", alias = "Crypto")]
    pub payload: EncryptedPayload,
    #[serde(rename = "activeAccounts", default)]
    pub accounts: Vec<Account>,
}

impl StoredKey {
    fn new(
        name: &str,
        password: &[u8],
        key_type: StoredKeyType,
        secret: &[u8],
        params: EncryptionParameters,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            key_type,
            version: KEYSTORE_VERSION,
            payload: EncryptedPayload::encrypt(password, secret, params)?,
            accounts: vec![],
        })
    }

    /// Stores an English mnemonic phrase
    pub fn create_with_mnemonic(
        name: &str,
        password: &[u8],
        phrase: &str,
        level: KdfLevel,
        cipher: Cipher,
    ) -> Result<Self> {
        let mnemonic = Mnemonic::from_phrase(phrase, Language::English)?;
        let phrase = Zeroizing::new(mnemonic.phrase());
        let params = EncryptionParameters::new(level, cipher)?;
        Self::new(name, password, StoredKeyType::Mnemonic, phrase.as_bytes(), params)
    }

    /// Stores a mnemonic with the KDF level and cipher of `config`
    pub fn create_with_mnemonic_config(
        name: &str,
        password: &[u8],
        phrase: &str,
        config: &WalletConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::create_with_mnemonic(name, password, phrase, config.kdf_level, config.cipher)
    }

    /// Stores a freshly generated 12 word mnemonic
    pub fn create_with_mnemonic_random(
        name: &str,
        password: &[u8],
        level: KdfLevel,
        cipher: Cipher,
    ) -> Result<Self> {
        let mnemonic = Mnemonic::generate(RANDOM_MNEMONIC_WORDS, Language::English)?;
        Self::create_with_mnemonic(name, password, &mnemonic.phrase(), level, cipher)
    }

    /// Stores a mnemonic and adds the default account of `coin`
    pub fn create_with_mnemonic_add_default_address(
        name: &str,
        password: &[u8],
        phrase: &str,
        coin: CoinType,
        level: KdfLevel,
        cipher: Cipher,
    ) -> Result<Self> {
        let mut key = Self::create_with_mnemonic(name, password, phrase, level, cipher)?;
        let wallet = HDWallet::from_mnemonic(phrase, "")?;
        key.account_or_create(coin, &wallet)?;
        Ok(key)
    }

    /// Stores a raw 32-byte private key
    pub fn create_with_private_key(
        name: &str,
        password: &[u8],
        private_key: &[u8],
        level: KdfLevel,
        cipher: Cipher,
    ) -> Result<Self> {
        if private_key.len() != PrivateKey::LEN || private_key.iter().all(|b| *b == 0) {
            return Err(Error::InvalidParameter("Invalid private key data".to_string()));
        }
        let params = EncryptionParameters::new(level, cipher)?;
        Self::new(name, password, StoredKeyType::PrivateKey, private_key, params)
    }

    /// Stores a private key and adds its account for `coin`
    pub fn create_with_private_key_add_default_address(
        name: &str,
        password: &[u8],
        coin: CoinType,
        private_key: &[u8],
        level: KdfLevel,
        cipher: Cipher,
    ) -> Result<Self> {
        let descriptor = coin.descriptor();
        let key = PrivateKey::new(private_key, descriptor.curve)?;
        let public_key = key.public_key_of_type(descriptor.public_key_type)?;
        let address = Address::from_public_key(coin, &public_key)?;

        let mut stored = Self::create_with_private_key(name, password, private_key, level, cipher)?;
        stored.add_account(
            address.to_string(),
            coin,
            descriptor.default_derivation_path()?,
            public_key.to_string(),
            String::new(),
        );
        Ok(stored)
    }

    /// First account of `coin`
    pub fn account(&self, coin: CoinType) -> Option<&Account> {
        self.accounts.iter().find(|account| account.coin == coin)
    }

    /// All accounts of `coin`
    pub fn accounts_for(&self, coin: CoinType) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(move |account| account.coin == coin)
    }

    /// First account of `coin`, derived from `wallet` and added when missing.
    ///
    /// An existing account with an empty address gets its address filled in.
    pub fn account_or_create(&mut self, coin: CoinType, wallet: &HDWallet) -> Result<&Account> {
        match self.accounts.iter().position(|account| account.coin == coin) {
            Some(index) => {
                if self.accounts[index].address.is_empty() {
                    let path = self.accounts[index].derivation_path.clone();
                    self.accounts[index] = derive_account(wallet, coin, path)?;
                }
                Ok(&self.accounts[index])
            }
            None => {
                let path = coin.descriptor().default_derivation_path()?;
                self.accounts.push(derive_account(wallet, coin, path)?);
                debug!(coin = %coin, accounts = self.accounts.len(), "added keystore account");
                Ok(&self.accounts[self.accounts.len() - 1])
            }
        }
    }

    /// Adds an account record, replacing one with the same coin and path
    pub fn add_account(
        &mut self,
        address: String,
        coin: CoinType,
        derivation_path: DerivationPath,
        public_key: String,
        extended_public_key: String,
    ) {
        self.remove_account_by_path(coin, &derivation_path);
        self.accounts.push(Account {
            address,
            coin,
            derivation_path,
            public_key,
            extended_public_key,
        });
    }

    /// Removes every account of `coin`
    pub fn remove_account(&mut self, coin: CoinType) {
        self.accounts.retain(|account| account.coin != coin);
    }

    /// Removes the account of `coin` at `path`
    pub fn remove_account_by_path(&mut self, coin: CoinType, path: &DerivationPath) {
        self.accounts.retain(|account| account.coin != coin || account.derivation_path != *path);
    }

    /// Decrypts the stored mnemonic into a wallet without passphrase
    pub fn wallet(&self, password: &[u8]) -> Result<HDWallet> {
        let phrase = self.decrypt_mnemonic(password)?;
        HDWallet::from_mnemonic(&phrase, "")
    }

    /// Decrypts the stored mnemonic phrase
    pub fn decrypt_mnemonic(&self, password: &[u8]) -> Result<Zeroizing<String>> {
        if self.key_type != StoredKeyType::Mnemonic {
            return Err(Error::Keystore("Keystore does not hold a mnemonic".to_string()));
        }
        let data = self.payload.decrypt(password)?;
        let phrase = core::str::from_utf8(&data)
            .map_err(|_| Error::Keystore("Stored mnemonic is not UTF-8".to_string()))?;
        Ok(Zeroizing::new(phrase.trim_end_matches('\0').to_string()))
    }

    /// Decrypts the stored private key bytes
    pub fn decrypt_private_key(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if self.key_type != StoredKeyType::PrivateKey {
            return Err(Error::Keystore("Keystore does not hold a private key".to_string()));
        }
        self.payload.decrypt(password)
    }

    /// Private key of `coin`.
    ///
    /// For a mnemonic this is the key at the path of the coin's first account,
    /// or the coin's default path when there is none.
    pub fn private_key(&self, coin: CoinType, password: &[u8]) -> Result<PrivateKey> {
        match self.key_type {
            StoredKeyType::Mnemonic => {
                let wallet = self.wallet(password)?;
                let path = match self.account(coin) {
                    Some(account) => account.derivation_path.clone(),
                    None => coin.descriptor().default_derivation_path()?,
                };
                wallet.get_key_by_path(coin, &path)
            }
            StoredKeyType::PrivateKey => {
                let data = self.decrypt_private_key(password)?;
                PrivateKey::new(&data, coin.descriptor().curve)
            }
        }
    }

    /// Recomputes the address and public key of every account
    pub fn fix_addresses(&mut self, password: &[u8]) -> Result<()> {
        match self.key_type {
            StoredKeyType::Mnemonic => {
                let wallet = self.wallet(password)?;
                for account in &mut self.accounts {
                    let path = account.derivation_path.clone();
                    let extended = std::mem::take(&mut account.extended_public_key);
                    *account = derive_account(&wallet, account.coin, path)?;
                    if account.extended_public_key.is_empty() {
                        account.extended_public_key = extended;
                    }
                }
            }
            StoredKeyType::PrivateKey => {
                let data = self.decrypt_private_key(password)?;
                for account in &mut self.accounts {
                    let descriptor = account.coin.descriptor();
                    let key = PrivateKey::new(&data, descriptor.curve)?;
                    let public_key = key.public_key_of_type(descriptor.public_key_type)?;
                    account.address = Address::from_public_key(account.coin, &public_key)?.to_string();
                    account.public_key = public_key.to_string();
                }
            }
        }
        Ok(())
    }

    /// Pretty printed keystore document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let key: StoredKey = serde_json::from_str(json)?;
        if key.version != KEYSTORE_VERSION {
            warn!(version = key.version, "unexpected keystore version");
        }
        Ok(key)
    }

    /// Reads a keystore document from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let key = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), id = %key.id, accounts = key.accounts.len(), "loaded keystore");
        Ok(key)
    }

    /// Writes the keystore document to `path`, replacing any existing file
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), id = %self.id, "stored keystore");
        Ok(())
    }
}

/// Account record of `coin` at `path`
fn derive_account(wallet: &HDWallet, coin: CoinType, path: DerivationPath) -> Result<Account> {
    let descriptor = coin.descriptor();
    let key = wallet.get_key_by_path(coin, &path)?;
    let public_key = key.public_key_of_type(descriptor.public_key_type)?;
    let address = Address::from_public_key(coin, &public_key)?;
    let extended_public_key = match descriptor.extended_key_versions(descriptor.purpose) {
        Some(_) => wallet.get_extended_public_key(coin, descriptor.purpose)?,
        None => String::new(),
    };
    Ok(Account {
        address: address.to_string(),
        coin,
        derivation_path: path,
        public_key: public_key.to_string(),
        extended_public_key,
    })
}
