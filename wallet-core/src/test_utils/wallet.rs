use crate::keystore::{Cipher, KdfLevel, StoredKey};
use crate::wallet::HDWallet;

/// BIP39 "abandon ... about" test phrase
pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub const TEST_PASSWORD: &[u8] = b"password";

impl HDWallet {
    /// Wallet of [`TEST_MNEMONIC`] without passphrase
    pub fn dummy() -> Self {
        HDWallet::from_mnemonic(TEST_MNEMONIC, "").expect("test mnemonic is valid")
    }
}

impl StoredKey {
    /// Weakly encrypted keystore of [`TEST_MNEMONIC`] under [`TEST_PASSWORD`]
    pub fn dummy(name: &str) -> Self {
        StoredKey::create_with_mnemonic(name, TEST_PASSWORD, TEST_MNEMONIC, KdfLevel::Weak, Cipher::Aes128Ctr)
            .expect("test keystore is valid")
    }
}
