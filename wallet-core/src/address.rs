//! Address generation and encoding
//!
//! One [`Address`] type covers every coin. Variants are address families,
//! parameterized by the coin's registry entry, and carry the canonical decoded
//! bytes so two addresses compare equal exactly when they pay to the same
//! destination.

use core::fmt;

use bech32::{FromBase32, ToBase32, Variant, u5};
use bitcoin_hashes::{Hash, hash160};
use sha3::{Digest, Keccak256};

use crate::base58::{self, Alphabet, Checksum};
use crate::coin::{AddressFamily, CoinType, Purpose};
use crate::error::{Error, Result};
use crate::keys::PublicKey;
use crate::script::Script;

/// Tron address version byte
const TRON_PREFIX: u8 = 0x41;
/// Ripple account id version byte
const RIPPLE_PREFIX: u8 = 0x00;
/// NEO address version byte
const NEO_PREFIX: u8 = 0x17;

/// What a Base58 address commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base58Kind {
    /// Pay to public key hash (P2PKH)
    PubkeyHash,
    /// Pay to script hash (P2SH)
    ScriptHash,
}

/// A decoded address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Base58Check of `prefix || hash`
    Base58 {
        kind: Base58Kind,
        prefix: Vec<u8>,
        hash: [u8; 20],
        checksum: Checksum,
    },
    /// Bech32 or Bech32m witness program
    Segwit {
        hrp: String,
        version: u8,
        program: Vec<u8>,
    },
    /// Bech32 key hash
    Cosmos {
        hrp: String,
        key_hash: [u8; 20],
    },
    /// Last 20 bytes of the Keccak-256 of the uncompressed key
    Ethereum([u8; 20]),
    /// Ethereum-style key hash under the Tron version byte
    Tron([u8; 20]),
    /// Ripple account id
    Ripple([u8; 20]),
    /// Raw ed25519 public key
    Solana([u8; 32]),
    /// Hash of the single-signature verification script
    Neo([u8; 20]),
}

impl Address {
    /// Address of `public_key` in the coin's default format
    pub fn from_public_key(coin: CoinType, public_key: &PublicKey) -> Result<Self> {
        Self::from_public_key_for_purpose(coin, public_key, coin.descriptor().purpose)
    }

    /// Address of `public_key` under a BIP43 purpose.
    ///
    /// For Bitcoin-like coins purpose 44 gives P2PKH, 49 gives P2SH-P2WPKH and 84
    /// native P2WPKH. Other families ignore the purpose.
    pub fn from_public_key_for_purpose(
        coin: CoinType,
        public_key: &PublicKey,
        purpose: Purpose,
    ) -> Result<Self> {
        let descriptor = coin.descriptor();
        if public_key.curve() != descriptor.curve {
            return Err(Error::InvalidParameter(format!(
                "{} needs a {} public key, got {}",
                coin,
                descriptor.curve,
                public_key.curve()
            )));
        }

        match descriptor.address {
            AddressFamily::Bitcoin {
                p2pkh,
                p2sh,
                hrp,
                checksum,
                hasher,
            } => {
                let key_hash = hasher.hash(&public_key.compressed().to_bytes());
                match (purpose, hrp) {
                    (Purpose::Bip44, _) => Ok(Address::Base58 {
                        kind: Base58Kind::PubkeyHash,
                        prefix: p2pkh.to_vec(),
                        hash: key_hash,
                        checksum,
                    }),
                    (Purpose::Bip49, Some(_)) => {
                        let redeem = Script::build_pay_to_witness_pubkey_hash(&key_hash);
                        Ok(Address::Base58 {
                            kind: Base58Kind::ScriptHash,
                            prefix: p2sh.to_vec(),
                            hash: hash160::Hash::hash(redeem.as_bytes()).to_byte_array(),
                            checksum,
                        })
                    }
                    (Purpose::Bip84, Some(hrp)) => Ok(Address::Segwit {
                        hrp: hrp.to_string(),
                        version: 0,
                        program: key_hash.to_vec(),
                    }),
                    (purpose, None) => Err(Error::UnsupportedCoin(format!(
                        "{} has no segwit addresses for purpose {}",
                        coin,
                        u32::from(purpose)
                    ))),
                }
            }
            AddressFamily::Cosmos {
                hrp,
            } => Ok(Address::Cosmos {
                hrp: hrp.to_string(),
                key_hash: public_key.compressed().hash160(),
            }),
            AddressFamily::Ethereum => Ok(Address::Ethereum(keccak_address(public_key))),
            AddressFamily::Tron => Ok(Address::Tron(keccak_address(public_key))),
            AddressFamily::Ripple => Ok(Address::Ripple(public_key.compressed().hash160())),
            AddressFamily::Solana => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&public_key.to_bytes());
                Ok(Address::Solana(bytes))
            }
            AddressFamily::Neo => {
                let mut verification = Vec::with_capacity(35);
                verification.push(0x21);
                verification.extend_from_slice(&public_key.compressed().to_bytes());
                verification.push(0xac);
                Ok(Address::Neo(hash160::Hash::hash(&verification).to_byte_array()))
            }
        }
    }

    /// Decodes `s` as an address of `coin`
    pub fn from_str_for(coin: CoinType, s: &str) -> Result<Self> {
        match coin.descriptor().address {
            AddressFamily::Bitcoin {
                p2pkh,
                p2sh,
                hrp,
                checksum,
                ..
            } => match hrp {
                Some(hrp) if has_hrp(s, hrp) => decode_segwit(s, hrp),
                _ => decode_base58(s, p2pkh, p2sh, checksum),
            },
            AddressFamily::Cosmos {
                hrp,
            } => decode_cosmos(s, hrp),
            AddressFamily::Ethereum => decode_ethereum(s).map(Address::Ethereum),
            AddressFamily::Tron => {
                decode_prefixed(s, TRON_PREFIX, Alphabet::Bitcoin).map(Address::Tron)
            }
            AddressFamily::Ripple => {
                decode_prefixed(s, RIPPLE_PREFIX, Alphabet::Ripple).map(Address::Ripple)
            }
            AddressFamily::Solana => {
                let bytes = base58::decode(s, Alphabet::Bitcoin)
                    .map_err(|e| Error::InvalidAddress(e.to_string()))?;
                let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
                    Error::InvalidAddress(format!("Invalid Solana address length {}", bytes.len()))
                })?;
                Ok(Address::Solana(key))
            }
            AddressFamily::Neo => decode_prefixed(s, NEO_PREFIX, Alphabet::Bitcoin).map(Address::Neo),
        }
    }

    /// Alias of [`Address::from_str_for`]
    pub fn decode(coin: CoinType, s: &str) -> Result<Self> {
        Self::from_str_for(coin, s)
    }

    /// Whether `s` is a valid address of `coin`. Never fails.
    pub fn is_valid(s: &str, coin: CoinType) -> bool {
        Self::from_str_for(coin, s).is_ok()
    }

    /// Hash, witness program or key the address commits to
    pub fn data(&self) -> &[u8] {
        match self {
            Address::Base58 {
                hash,
                ..
            } => hash,
            Address::Segwit {
                program,
                ..
            } => program,
            Address::Cosmos {
                key_hash,
                ..
            } => key_hash,
            Address::Ethereum(hash) | Address::Tron(hash) | Address::Ripple(hash) | Address::Neo(hash) => {
                hash
            }
            Address::Solana(key) => key,
        }
    }

    /// Locking script paying to this address
    pub fn script_pubkey(&self) -> Result<Script> {
        Script::build_for_address(self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Base58 {
                prefix,
                hash,
                checksum,
                ..
            } => {
                let mut payload = prefix.clone();
                payload.extend_from_slice(hash);
                f.write_str(&base58::encode_check(&payload, *checksum, Alphabet::Bitcoin))
            }
            Address::Segwit {
                hrp,
                version,
                program,
            } => {
                let variant = if *version == 0 {
                    Variant::Bech32
                } else {
                    Variant::Bech32m
                };
                let mut data = vec![u5::try_from_u8(*version).map_err(|_| fmt::Error)?];
                data.extend(program.to_base32());
                let encoded = bech32::encode(hrp, data, variant).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
            Address::Cosmos {
                hrp,
                key_hash,
            } => {
                let encoded =
                    bech32::encode(hrp, key_hash.to_base32(), Variant::Bech32).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
            Address::Ethereum(hash) => f.write_str(&eip55(hash)),
            Address::Tron(hash) => f.write_str(&prefixed(TRON_PREFIX, hash, Alphabet::Bitcoin)),
            Address::Ripple(hash) => f.write_str(&prefixed(RIPPLE_PREFIX, hash, Alphabet::Ripple)),
            Address::Solana(key) => f.write_str(&base58::encode(key, Alphabet::Bitcoin)),
            Address::Neo(hash) => f.write_str(&prefixed(NEO_PREFIX, hash, Alphabet::Bitcoin)),
        }
    }
}

fn keccak_address(public_key: &PublicKey) -> [u8; 20] {
    let uncompressed = public_key.uncompressed().to_bytes();
    let digest = Keccak256::digest(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    out
}

/// EIP-55 mixed-case checksum encoding
fn eip55(hash: &[u8; 20]) -> String {
    let lower = hex::encode(hash);
    let digest = Keccak256::digest(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            digest[i / 2] >> 4
        } else {
            digest[i / 2] & 0x0f
        };
        if nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn decode_ethereum(s: &str) -> Result<[u8; 20]> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidAddress(format!("Missing 0x prefix: {}", s)))?;
    if body.len() != 40 {
        return Err(Error::InvalidAddress(format!("Invalid Ethereum address length: {}", s)));
    }
    let bytes = hex::decode(body).map_err(|e| Error::InvalidAddress(e.to_string()))?;
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&bytes);

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    // single-case addresses carry no checksum
    if has_lower && has_upper && eip55(&hash) != s {
        return Err(Error::InvalidAddress(format!("Bad EIP-55 checksum: {}", s)));
    }
    Ok(hash)
}

fn prefixed(prefix: u8, hash: &[u8; 20], alphabet: Alphabet) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(prefix);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload, Checksum::Sha256d, alphabet)
}

fn decode_prefixed(s: &str, prefix: u8, alphabet: Alphabet) -> Result<[u8; 20]> {
    let payload = base58::decode_check(s, Checksum::Sha256d, alphabet)
        .map_err(|e| Error::InvalidAddress(e.to_string()))?;
    if payload.len() != 21 || payload[0] != prefix {
        return Err(Error::InvalidAddress(format!("Invalid address payload: {}", s)));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

fn decode_base58(s: &str, p2pkh: &[u8], p2sh: &[u8], checksum: Checksum) -> Result<Address> {
    let payload = base58::decode_check(s, checksum, Alphabet::Bitcoin)
        .map_err(|e| Error::InvalidAddress(e.to_string()))?;

    let (kind, prefix) = if payload.len() == p2pkh.len() + 20 && payload.starts_with(p2pkh) {
        (Base58Kind::PubkeyHash, p2pkh)
    } else if payload.len() == p2sh.len() + 20 && payload.starts_with(p2sh) {
        (Base58Kind::ScriptHash, p2sh)
    } else {
        return Err(Error::InvalidAddress(format!("Invalid version prefix: {}", s)));
    };

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[prefix.len()..]);
    Ok(Address::Base58 {
        kind,
        prefix: prefix.to_vec(),
        hash,
        checksum,
    })
}

/// Whether `s` starts with `hrp` and the separator, in either case
fn has_hrp(s: &str, hrp: &str) -> bool {
    s.get(..hrp.len()).is_some_and(|head| head.eq_ignore_ascii_case(hrp))
        && s.as_bytes().get(hrp.len()) == Some(&b'1')
}

fn decode_bech32(s: &str, expected_hrp: &str) -> Result<(Vec<u5>, Variant)> {
    let (hrp, data, variant) =
        bech32::decode(s).map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;
    if hrp != expected_hrp {
        return Err(Error::InvalidAddress(format!("Expected HRP {}, got {}", expected_hrp, hrp)));
    }
    Ok((data, variant))
}

fn decode_segwit(s: &str, expected_hrp: &str) -> Result<Address> {
    let (data, variant) = decode_bech32(s, expected_hrp)?;
    let (version, program) =
        data.split_first().ok_or_else(|| Error::InvalidAddress(format!("Empty witness data: {}", s)))?;
    let version = version.to_u8();
    let program =
        Vec::<u8>::from_base32(program).map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;

    if version > 16 {
        return Err(Error::InvalidAddress(format!("Invalid witness version {}", version)));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(Error::InvalidAddress(format!("Invalid witness program length {}", program.len())));
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(Error::InvalidAddress(format!(
            "Invalid v0 witness program length {}",
            program.len()
        )));
    }
    let expected_variant = if version == 0 {
        Variant::Bech32
    } else {
        Variant::Bech32m
    };
    if variant != expected_variant {
        return Err(Error::InvalidAddress(format!(
            "Wrong checksum variant for witness version {}",
            version
        )));
    }

    Ok(Address::Segwit {
        hrp: expected_hrp.to_string(),
        version,
        program,
    })
}

fn decode_cosmos(s: &str, expected_hrp: &str) -> Result<Address> {
    let (data, variant) = decode_bech32(s, expected_hrp)?;
    if variant != Variant::Bech32 {
        return Err(Error::InvalidAddress(format!("Bech32m is not used by {}", expected_hrp)));
    }
    let bytes =
        Vec::<u8>::from_base32(&data).map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;
    let key_hash: [u8; 20] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::InvalidAddress(format!("Invalid key hash length {}", bytes.len()))
    })?;
    Ok(Address::Cosmos {
        hrp: expected_hrp.to_string(),
        key_hash,
    })
}
