//! Web3 Secret Storage v3 encryption
//!
//! A password is stretched with scrypt or PBKDF2-HMAC-SHA256, the first half
//! of the derived key encrypts the payload with AES-CTR (the whole key for
//! AES-256) and the MAC is `keccak256(derived[16..32] || ciphertext)`.

use core::fmt;

use aes::cipher::{KeyIvInit, StreamCipher};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::utils::hex_bytes;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const DERIVED_KEY_LEN: usize = 32;
const MAX_DERIVED_KEY_LEN: usize = 64;
const PBKDF2_PRF: &str = "hmac-sha256";

/// Symmetric cipher of the payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cipher {
    #[default]
    #[serde(rename = "aes-128-ctr")]
    Aes128Ctr,
    #[serde(rename = "aes-256-ctr")]
    Aes256Ctr,
}

impl Cipher {
    pub fn name(&self) -> &'static str {
        match self {
            Cipher::Aes128Ctr => "aes-128-ctr",
            Cipher::Aes256Ctr => "aes-256-ctr",
        }
    }

    fn key_len(&self) -> usize {
        match self {
            Cipher::Aes128Ctr => 16,
            Cipher::Aes256Ctr => 32,
        }
    }

    fn apply(&self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        let invalid = |_| Error::Keystore(format!("Invalid {} key or iv length", self.name()));
        match self {
            Cipher::Aes128Ctr => Aes128Ctr::new_from_slices(key, iv).map_err(invalid)?.apply_keystream(data),
            Cipher::Aes256Ctr => Aes256Ctr::new_from_slices(key, iv).map_err(invalid)?.apply_keystream(data),
        }
        Ok(())
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key stretching cost of new keystores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfLevel {
    /// scrypt n = 2^18, r = 8, p = 1
    #[default]
    Standard,
    /// scrypt n = 2^12, r = 8, p = 6. Fast, for tests and constrained devices.
    Weak,
}

/// Key derivation function and its parameters
#[derive(Clone, PartialEq, Eq)]
pub enum KdfParams {
    Scrypt {
        n: u32,
        r: u32,
        p: u32,
        dklen: usize,
        salt: Vec<u8>,
    },
    /// PBKDF2-HMAC-SHA256
    Pbkdf2 {
        c: u32,
        dklen: usize,
        salt: Vec<u8>,
    },
}

impl fmt::Debug for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KdfParams::Scrypt {
                n,
                r,
                p,
                dklen,
                ..
            } => f
                .debug_struct("Scrypt")
                .field("n", n)
                .field("r", r)
                .field("p", p)
                .field("dklen", dklen)
                .finish(),
            KdfParams::Pbkdf2 {
                c,
                dklen,
                ..
            } => f.debug_struct("Pbkdf2").field("c", c).field("dklen", dklen).finish(),
        }
    }
}

impl KdfParams {
    /// scrypt parameters of `level` with a random salt
    pub fn scrypt(level: KdfLevel) -> Result<Self> {
        let (n, r, p) = match level {
            KdfLevel::Standard => (1 << 18, 8, 1),
            KdfLevel::Weak => (1 << 12, 8, 6),
        };
        Ok(KdfParams::Scrypt {
            n,
            r,
            p,
            dklen: DERIVED_KEY_LEN,
            salt: random_bytes(SALT_LEN)?,
        })
    }

    /// PBKDF2 parameters with `iterations` rounds and a random salt
    pub fn pbkdf2(iterations: u32) -> Result<Self> {
        Ok(KdfParams::Pbkdf2 {
            c: iterations,
            dklen: DERIVED_KEY_LEN,
            salt: random_bytes(SALT_LEN)?,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            KdfParams::Scrypt {
                ..
            } => "scrypt",
            KdfParams::Pbkdf2 {
                ..
            } => "pbkdf2",
        }
    }

    pub fn salt(&self) -> &[u8] {
        match self {
            KdfParams::Scrypt {
                salt,
                ..
            }
            | KdfParams::Pbkdf2 {
                salt,
                ..
            } => salt,
        }
    }

    fn dklen(&self) -> usize {
        match self {
            KdfParams::Scrypt {
                dklen,
                ..
            }
            | KdfParams::Pbkdf2 {
                dklen,
                ..
            } => *dklen,
        }
    }

    /// Stretches `password` into the derived key
    pub fn derive_key(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if !(DERIVED_KEY_LEN..=MAX_DERIVED_KEY_LEN).contains(&self.dklen()) {
            return Err(Error::Keystore(format!(
                "Derived key length must be between {} and {}, got {}",
                DERIVED_KEY_LEN,
                MAX_DERIVED_KEY_LEN,
                self.dklen()
            )));
        }
        let mut key = Zeroizing::new(vec![0u8; self.dklen()]);
        match self {
            KdfParams::Scrypt {
                n,
                r,
                p,
                salt,
                ..
            } => {
                if !n.is_power_of_two() || *n < 2 {
                    return Err(Error::Keystore(format!("scrypt n must be a power of two, got {}", n)));
                }
                let params = scrypt::Params::new(n.trailing_zeros() as u8, *r, *p, key.len())
                    .map_err(|e| Error::Keystore(format!("Invalid scrypt parameters: {}", e)))?;
                scrypt::scrypt(password, salt, &params, &mut key[..])
                    .map_err(|e| Error::CryptoFailure(e.to_string()))?;
            }
            KdfParams::Pbkdf2 {
                c,
                salt,
                ..
            } => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, *c, &mut key[..]),
        }
        Ok(key)
    }
}

/// Cipher and KDF of one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParameters {
    pub cipher: Cipher,
    pub iv: Vec<u8>,
    pub kdf: KdfParams,
}

impl EncryptionParameters {
    /// Fresh scrypt parameters with a random salt and iv
    pub fn new(level: KdfLevel, cipher: Cipher) -> Result<Self> {
        Ok(Self {
            cipher,
            iv: random_bytes(IV_LEN)?,
            kdf: KdfParams::scrypt(level)?,
        })
    }
}

/// Encrypted data with the parameters needed to decrypt it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CryptoJson", into = "CryptoJson")]
pub struct EncryptedPayload {
    pub params: EncryptionParameters,
    pub ciphertext: Vec<u8>,
    pub mac: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypts `data` under `password`
    pub fn encrypt(password: &[u8], data: &[u8], params: EncryptionParameters) -> Result<Self> {
        let derived = params.kdf.derive_key(password)?;
        let mut ciphertext = data.to_vec();
        params.cipher.apply(&derived[..params.cipher.key_len()], &params.iv, &mut ciphertext)?;
        let mac = compute_mac(&derived, &ciphertext);
        Ok(Self {
            params,
            ciphertext,
            mac,
        })
    }

    /// Decrypts the payload.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPassword`] when the MAC does not match.
    pub fn decrypt(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let derived = self.params.kdf.derive_key(password)?;
        let mac = compute_mac(&derived, &self.ciphertext);
        if !bool::from(mac.ct_eq(&self.mac)) {
            return Err(Error::InvalidPassword);
        }
        let mut data = Zeroizing::new(self.ciphertext.clone());
        self.params.cipher.apply(&derived[..self.params.cipher.key_len()], &self.params.iv, &mut data)?;
        Ok(data)
    }
}

fn compute_mac(derived: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut hasher = Keccak256::new();
    hasher.update(&derived[16..32]);
    hasher.update(ciphertext);
    hasher.finalize().to_vec()
}

pub(crate) fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::CryptoFailure(format!("Failed to generate random bytes: {}", e)))?;
    Ok(bytes)
}

#[derive(Serialize, Deserialize)]
struct CipherParamsJson {
    #[serde(with = "hex_bytes")]
    iv: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct KdfParamsJson {
    dklen: usize,
    #[serde(with = "hex_bytes")]
    salt: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    r: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prf: Option<String>,
}

/// The `crypto` object of a keystore document
#[derive(Serialize, Deserialize)]
struct CryptoJson {
    cipher: Cipher,
    cipherparams: CipherParamsJson,
    #[serde(with = "hex_bytes")]
    ciphertext: Vec<u8>,
    kdf: String,
    kdfparams: KdfParamsJson,
    #[serde(with = "hex_bytes")]
    mac: Vec<u8>,
}

impl TryFrom<CryptoJson> for EncryptedPayload {
    type Error = Error;

    fn try_from(json: CryptoJson) -> Result<Self> {
        let KdfParamsJson {
            dklen,
            salt,
            n,
            r,
            p,
            c,
            prf,
        } = json.kdfparams;
        let missing = |field: &str| Error::Keystore(format!("Missing {} kdf parameter {}", json.kdf, field));
        let kdf = match json.kdf.as_str() {
            "scrypt" => KdfParams::Scrypt {
                n: n.ok_or_else(|| missing("n"))?,
                r: r.ok_or_else(|| missing("r"))?,
                p: p.ok_or_else(|| missing("p"))?,
                dklen,
                salt,
            },
            "pbkdf2" => {
                if let Some(prf) = prf.as_deref().filter(|prf| *prf != PBKDF2_PRF) {
                    return Err(Error::Keystore(format!("Unsupported pbkdf2 prf {}", prf)));
                }
                KdfParams::Pbkdf2 {
                    c: c.ok_or_else(|| missing("c"))?,
                    dklen,
                    salt,
                }
            }
            other => return Err(Error::Keystore(format!("Unsupported kdf {}", other))),
        };
        Ok(EncryptedPayload {
            params: EncryptionParameters {
                cipher: json.cipher,
                iv: json.cipherparams.iv,
                kdf,
            },
            ciphertext: json.ciphertext,
            mac: json.mac,
        })
    }
}

impl From<EncryptedPayload> for CryptoJson {
    fn from(payload: EncryptedPayload) -> Self {
        let kdf = payload.params.kdf.name().to_string();
        let kdfparams = match payload.params.kdf {
            KdfParams::Scrypt {
                n,
                r,
                p,
                dklen,
                salt,
            } => KdfParamsJson {
                dklen,
                salt,
                n: Some(n),
                r: Some(r),
                p: Some(p),
                c: None,
                prf: None,
            },
            KdfParams::Pbkdf2 {
                c,
                dklen,
                salt,
            } => KdfParamsJson {
                dklen,
                salt,
                n: None,
                r: None,
                p: None,
                c: Some(c),
                prf: Some(PBKDF2_PRF.to_string()),
            },
        };
        CryptoJson {
            cipher: payload.params.cipher,
            cipherparams: CipherParamsJson {
                iv: payload.params.iv,
            },
            ciphertext: payload.ciphertext,
            kdf,
            kdfparams,
            mac: payload.mac,
        }
    }
}
