//! Hierarchical deterministic wallet
//!
//! An [`HDWallet`] owns a BIP39 mnemonic and the seed derived from it, and
//! hands out keys, addresses and account-level extended keys for any
//! registered coin.

use core::fmt;

use tracing::debug;
use zeroize::Zeroizing;

use crate::address::Address;
use crate::bip32::{self, DerivationPath, ExtendedPrivKey, ExtendedPubKey};
use crate::coin::{CoinDescriptor, CoinType, Purpose};
use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::keys::{Curve, PrivateKey, PublicKey};
use crate::mnemonic::{Language, Mnemonic};
use crate::seed::Seed;

/// Number of leading path components that form the account level
const ACCOUNT_DEPTH: usize = 3;

/// HD wallet backed by a BIP39 mnemonic
#[derive(Clone)]
pub struct HDWallet {
    mnemonic: Mnemonic,
    /// Wiped on drop
    passphrase: Zeroizing<String>,
    seed: Seed,
}

impl fmt::Debug for HDWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HDWallet").field("mnemonic", &"<hidden>").finish()
    }
}

impl HDWallet {
    /// A wallet with a fresh random English mnemonic of `word_count` words
    pub fn new(word_count: usize, passphrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::generate(word_count, Language::English)?;
        Ok(Self::from_parts(mnemonic, passphrase))
    }

    /// A wallet with a fresh mnemonic in the configured language and length
    pub fn generate(config: &WalletConfig, passphrase: &str) -> Result<Self> {
        config.validate()?;
        let mnemonic = Mnemonic::generate(config.mnemonic_word_count, config.mnemonic_language)?;
        Ok(Self::from_parts(mnemonic, passphrase))
    }

    /// Restore from an English phrase
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::from_phrase(phrase, Language::English)?;
        Ok(Self::from_parts(mnemonic, passphrase))
    }

    /// Restore from BIP39 entropy
    pub fn from_entropy(entropy: &[u8], passphrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::from_entropy(entropy, Language::English)?;
        Ok(Self::from_parts(mnemonic, passphrase))
    }

    fn from_parts(mnemonic: Mnemonic, passphrase: &str) -> Self {
        let seed = mnemonic.to_seed(passphrase);
        Self {
            mnemonic,
            passphrase: Zeroizing::new(passphrase.to_string()),
            seed,
        }
    }

    pub fn mnemonic(&self) -> &Mnemonic {
        &self.mnemonic
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn entropy(&self) -> Vec<u8> {
        self.mnemonic.to_entropy()
    }

    /// Master node on `curve`
    pub fn get_master_key(&self, curve: Curve) -> Result<ExtendedPrivKey> {
        Ok(ExtendedPrivKey::new_master(curve, self.seed.as_slice())?)
    }

    /// Node at `path` on the coin's curve
    pub fn get_extended_key_by_path(
        &self,
        coin: CoinType,
        path: &DerivationPath,
    ) -> Result<ExtendedPrivKey> {
        let master = self.get_master_key(coin.descriptor().curve)?;
        Ok(master.derive_priv(path)?)
    }

    /// Private key at `path` on the coin's curve
    pub fn get_key_by_path(&self, coin: CoinType, path: &DerivationPath) -> Result<PrivateKey> {
        Ok(self.get_extended_key_by_path(coin, path)?.private_key)
    }

    /// Private key at the coin's path for `account`, `change` and `address`
    pub fn get_key(
        &self,
        coin: CoinType,
        account: u32,
        change: u32,
        address: u32,
    ) -> Result<PrivateKey> {
        let path = coin.descriptor().derivation_path(account, change, address)?;
        self.get_key_by_path(coin, &path)
    }

    /// Key of the coin's default path
    pub fn get_key_for_coin(&self, coin: CoinType) -> Result<PrivateKey> {
        let path = coin.descriptor().default_derivation_path()?;
        self.get_key_by_path(coin, &path)
    }

    /// Default address of the coin, at its default path
    pub fn get_address(&self, coin: CoinType) -> Result<Address> {
        let key = self.get_key_for_coin(coin)?;
        let public_key = key.public_key_of_type(coin.descriptor().public_key_type)?;
        Address::from_public_key(coin, &public_key)
    }

    /// Account zero extended private key for `purpose`, e.g. a `zprv` for BIP84
    pub fn get_extended_private_key(&self, coin: CoinType, purpose: Purpose) -> Result<String> {
        self.get_extended_private_key_account(coin, purpose, 0)
    }

    /// Account zero extended public key for `purpose`, e.g. a `zpub` for BIP84
    pub fn get_extended_public_key(&self, coin: CoinType, purpose: Purpose) -> Result<String> {
        self.get_extended_public_key_account(coin, purpose, 0)
    }

    pub fn get_extended_private_key_account(
        &self,
        coin: CoinType,
        purpose: Purpose,
        account: u32,
    ) -> Result<String> {
        let descriptor = coin.descriptor();
        let (_, private_version) = extended_versions(descriptor, purpose)?;
        let path = descriptor.account_path(purpose, account)?;
        let node = self.get_extended_key_by_path(coin, &path)?;
        Ok(node.to_base58(private_version))
    }

    pub fn get_extended_public_key_account(
        &self,
        coin: CoinType,
        purpose: Purpose,
        account: u32,
    ) -> Result<String> {
        let descriptor = coin.descriptor();
        let (public_version, _) = extended_versions(descriptor, purpose)?;
        let path = descriptor.account_path(purpose, account)?;
        let node = self.get_extended_key_by_path(coin, &path)?;
        Ok(ExtendedPubKey::from_priv(&node).to_base58(public_version))
    }

    /// Public key at `path` below an account-level extended public key.
    ///
    /// Only the components past the account level are derived, so they must
    /// be non-hardened.
    pub fn public_key_from_extended(
        extended: &str,
        coin: CoinType,
        path: &DerivationPath,
    ) -> Result<PublicKey> {
        let descriptor = coin.descriptor();
        let version = bip32::version_of(extended)?;
        if !descriptor.hd_versions.iter().any(|(_, public, _)| *public == version) {
            return Err(Error::InvalidExtendedKey(format!(
                "Version {:08x} is not a {} extended public key",
                version, coin
            )));
        }
        let account = ExtendedPubKey::from_base58_with_version(extended, version, descriptor.curve)?;
        let node = account.derive_pub(&below_account(path))?;
        debug!(coin = %coin, path = %path, "derived public key from extended key");
        if node.public_key.kind() == descriptor.public_key_type {
            Ok(node.public_key)
        } else {
            Ok(node.public_key.uncompressed())
        }
    }

    /// Private key at `path` below an account-level extended private key
    pub fn private_key_from_extended(
        extended: &str,
        coin: CoinType,
        path: &DerivationPath,
    ) -> Result<PrivateKey> {
        let descriptor = coin.descriptor();
        let version = bip32::version_of(extended)?;
        if !descriptor.hd_versions.iter().any(|(_, _, private)| *private == version) {
            return Err(Error::InvalidExtendedKey(format!(
                "Version {:08x} is not a {} extended private key",
                version, coin
            )));
        }
        let account = ExtendedPrivKey::from_base58_with_version(extended, version, descriptor.curve)?;
        Ok(account.derive_priv(&below_account(path))?.private_key)
    }
}

fn extended_versions(descriptor: &CoinDescriptor, purpose: Purpose) -> Result<(u32, u32)> {
    descriptor.extended_key_versions(purpose).ok_or_else(|| {
        Error::UnsupportedCoin(format!(
            "{} has no extended key format for purpose {}",
            descriptor.coin,
            u32::from(purpose)
        ))
    })
}

fn below_account(path: &DerivationPath) -> DerivationPath {
    DerivationPath::from(path.as_ref().get(ACCOUNT_DEPTH..).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_bip84_extended_keys() {
        let wallet = HDWallet::from_mnemonic(ABANDON, "").unwrap();
        assert_eq!(
            wallet.get_extended_private_key(CoinType::Bitcoin, Purpose::Bip84).unwrap(),
            "zprvAdG4iTXWBoARxkkzNpNh8r6Qag3irQB8PzEMkAFeTRXxHpbF9z4QgEvBRmfvqWvGp42t42nvgGpNgYSJA9iefm1yYNZKEm7z6qUWCroSQnE"
        );
        assert_eq!(
            wallet.get_extended_public_key(CoinType::Bitcoin, Purpose::Bip84).unwrap(),
            "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs"
        );
        assert_matches!(
            wallet.get_extended_public_key(CoinType::Ethereum, Purpose::Bip84),
            Err(Error::UnsupportedCoin(_))
        );
    }

    #[test]
    fn test_keys_from_extended() {
        let wallet = HDWallet::from_mnemonic(ABANDON, "").unwrap();
        let zpub = wallet.get_extended_public_key(CoinType::Bitcoin, Purpose::Bip84).unwrap();
        let zprv = wallet.get_extended_private_key(CoinType::Bitcoin, Purpose::Bip84).unwrap();
        let path: DerivationPath = "m/84'/0'/0'/0/3".parse().unwrap();

        let expected = wallet.get_key(CoinType::Bitcoin, 0, 0, 3).unwrap();
        let public_key = HDWallet::public_key_from_extended(&zpub, CoinType::Bitcoin, &path).unwrap();
        assert_eq!(public_key, expected.public_key());
        let private_key =
            HDWallet::private_key_from_extended(&zprv, CoinType::Bitcoin, &path).unwrap();
        assert_eq!(private_key, expected);

        // an xpub is not a Litecoin account key
        let xpub = wallet.get_extended_public_key(CoinType::Bitcoin, Purpose::Bip44).unwrap();
        assert_matches!(
            HDWallet::public_key_from_extended(&xpub, CoinType::Litecoin, &path),
            Err(Error::InvalidExtendedKey(_))
        );
        let hardened: DerivationPath = "m/84'/0'/0'/0'/3".parse().unwrap();
        assert_matches!(
            HDWallet::public_key_from_extended(&zpub, CoinType::Bitcoin, &hardened),
            Err(Error::InvalidDerivation(_))
        );
    }

    #[test]
    fn test_default_addresses() {
        let wallet = HDWallet::from_mnemonic(
            "team engine square letter hero song dizzy scrub tornado fabric divert saddle",
            "",
        )
        .unwrap();
        assert_eq!(
            wallet.get_address(CoinType::Bitcoin).unwrap().to_string(),
            "bc1qturc268v0f2srjh4r2zu4t6zk4gdutqd5a6zny"
        );
        assert_eq!(
            hex::encode(wallet.get_key_for_coin(CoinType::Bitcoin).unwrap().secret_bytes()),
            "d2568511baea8dc347f14c4e0479eb8ebe29eb5f664ed796e755896250ffd11f"
        );
        assert_eq!(
            wallet.get_address(CoinType::Ethereum).unwrap().to_string(),
            "0x494f60cb6Ac2c8F5E1393aD9FdBdF4Ad589507F7"
        );
    }

    #[test]
    fn test_generate_from_config() {
        let config = WalletConfig::new().with_mnemonic(Language::English, 24);
        let wallet = HDWallet::generate(&config, "").unwrap();
        assert_eq!(wallet.mnemonic().word_count(), 24);

        let restored = HDWallet::from_entropy(&wallet.entropy(), "").unwrap();
        assert_eq!(restored.seed(), wallet.seed());

        let invalid = WalletConfig::new().with_mnemonic(Language::English, 13);
        assert_matches!(HDWallet::generate(&invalid, ""), Err(Error::InvalidParameter(_)));
    }

    #[test]
    fn test_passphrase_changes_seed() {
        let plain = HDWallet::from_mnemonic(ABANDON, "").unwrap();
        let salted = HDWallet::from_mnemonic(ABANDON, "TREZOR").unwrap();
        assert_ne!(plain.seed(), salted.seed());
        assert_eq!(salted.passphrase(), "TREZOR");
        assert_eq!(salted.clone().passphrase(), "TREZOR");
        assert!(!format!("{:?}", salted).contains("TREZOR"));
        assert_matches!(HDWallet::from_mnemonic("abandon about", ""), Err(Error::InvalidMnemonic(_)));
    }
}
