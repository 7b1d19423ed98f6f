//! BIP32 hierarchical deterministic keys over secp256k1, nist256p1 and ed25519.
//!
//! Implementation of BIP32 hierarchical deterministic wallets, as defined
//! at <https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki>,
//! generalized to the curves of SLIP-0010. Ed25519 nodes only support hardened
//! private derivation; see [`crate::derivation_slip10`].

use core::fmt;
use core::str::FromStr;

use bitcoin_hashes::{Hash, HashEngine, Hmac, HmacEngine, hash160, sha512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::base58::{self, Alphabet, Checksum};
use crate::derivation_slip10;
use crate::keys::{Curve, PrivateKey, PublicKey, PublicKeyType};

/// Length of a serialized extended key payload
pub const EXTENDED_KEY_LEN: usize = 78;

/// Extended key version bytes
pub mod version {
    /// Bitcoin BIP44 public
    pub const XPUB: u32 = 0x0488_B21E;
    /// Bitcoin BIP44 private
    pub const XPRV: u32 = 0x0488_ADE4;
    /// Bitcoin BIP49 public
    pub const YPUB: u32 = 0x049D_7CB2;
    /// Bitcoin BIP49 private
    pub const YPRV: u32 = 0x049D_7878;
    /// Bitcoin BIP84 public
    pub const ZPUB: u32 = 0x04B2_4746;
    /// Bitcoin BIP84 private
    pub const ZPRV: u32 = 0x04B2_430C;
    /// Litecoin BIP44 public
    pub const LTUB: u32 = 0x019D_A462;
    /// Litecoin BIP44 private
    pub const LTPV: u32 = 0x019D_9CFE;
    /// Litecoin BIP49 public
    pub const MTUB: u32 = 0x01B2_6EF6;
    /// Litecoin BIP49 private
    pub const MTPV: u32 = 0x01B2_6792;
    /// Dogecoin public
    pub const DGUB: u32 = 0x02FA_CAFD;
    /// Dogecoin private
    pub const DGPV: u32 = 0x02FA_C398;
    /// Decred public
    pub const DPUB: u32 = 0x02FD_A926;
    /// Decred private
    pub const DPRV: u32 = 0x02FD_A4E8;

    /// Every `(public, private)` pair known to the library
    pub const KNOWN: &[(u32, u32)] = &[
        (XPUB, XPRV),
        (YPUB, YPRV),
        (ZPUB, ZPRV),
        (LTUB, LTPV),
        (MTUB, MTPV),
        (DGUB, DGPV),
        (DPUB, DPRV),
    ];

    /// Whether `v` is a known public version
    pub fn is_public(v: u32) -> bool {
        KNOWN.iter().any(|(public, _)| *public == v)
    }

    /// Whether `v` is a known private version
    pub fn is_private(v: u32) -> bool {
        KNOWN.iter().any(|(_, private)| *private == v)
    }
}

/// A chain code
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ChainCode([u8; 32]);

impl ChainCode {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        ChainCode(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl AsRef<[u8]> for ChainCode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainCode({})", hex::encode(self.0))
    }
}

/// A fingerprint: the first four bytes of a key identifier
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint([u8; 4]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Fingerprint(bytes)
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

/// A child number for a derived key
#[derive(Copy, Clone, PartialEq, Eq, Debug, PartialOrd, Ord, Hash)]
pub enum ChildNumber {
    /// Non-hardened key
    Normal {
        /// Key index, within [0, 2^31 - 1]
        index: u32,
    },
    /// Hardened key
    Hardened {
        /// Key index, within [0, 2^31 - 1]
        index: u32,
    },
}

impl ChildNumber {
    /// Create a [`Normal`] from an index, returns an error if the index is not within
    /// [0, 2^31 - 1].
    ///
    /// [`Normal`]: #variant.Normal
    pub fn from_normal_idx(index: u32) -> Result<Self, Error> {
        if index & (1 << 31) == 0 {
            Ok(ChildNumber::Normal {
                index,
            })
        } else {
            Err(Error::InvalidChildNumber(index))
        }
    }

    /// Create a [`Hardened`] from an index, returns an error if the index is not within
    /// [0, 2^31 - 1].
    ///
    /// [`Hardened`]: #variant.Hardened
    pub fn from_hardened_idx(index: u32) -> Result<Self, Error> {
        if index & (1 << 31) == 0 {
            Ok(ChildNumber::Hardened {
                index,
            })
        } else {
            Err(Error::InvalidChildNumber(index))
        }
    }

    /// Returns `true` if the child number is a [`Normal`] value.
    ///
    /// [`Normal`]: #variant.Normal
    pub fn is_normal(&self) -> bool {
        !self.is_hardened()
    }

    /// Returns `true` if the child number is a [`Hardened`] value.
    ///
    /// [`Hardened`]: #variant.Hardened
    pub fn is_hardened(&self) -> bool {
        match self {
            ChildNumber::Hardened {
                ..
            } => true,
            ChildNumber::Normal {
                ..
            } => false,
        }
    }

    /// Index without the hardened bit
    pub fn index(&self) -> u32 {
        match *self {
            ChildNumber::Normal {
                index,
            }
            | ChildNumber::Hardened {
                index,
            } => index,
        }
    }

    /// Same kind, next index. Fails at the end of the range.
    pub fn increment(self) -> Result<ChildNumber, Error> {
        match self {
            ChildNumber::Normal {
                index,
            } => ChildNumber::from_normal_idx(index + 1),
            ChildNumber::Hardened {
                index,
            } => ChildNumber::from_hardened_idx(index + 1),
        }
        .map_err(|_| Error::IndexRangeExhausted)
    }
}

impl From<u32> for ChildNumber {
    fn from(number: u32) -> Self {
        if number & (1 << 31) != 0 {
            ChildNumber::Hardened {
                index: number ^ (1 << 31),
            }
        } else {
            ChildNumber::Normal {
                index: number,
            }
        }
    }
}

impl From<ChildNumber> for u32 {
    fn from(cnum: ChildNumber) -> Self {
        match cnum {
            ChildNumber::Normal {
                index,
            } => index,
            ChildNumber::Hardened {
                index,
            } => index | (1 << 31),
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChildNumber::Hardened {
                index,
            } => write!(f, "{}'", index),
            ChildNumber::Normal {
                index,
            } => write!(f, "{}", index),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = Error;

    fn from_str(inp: &str) -> Result<ChildNumber, Error> {
        let is_hardened = inp.ends_with('\'') || inp.ends_with('h');
        let digits = if is_hardened {
            &inp[..inp.len() - 1]
        } else {
            inp
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidChildNumberFormat);
        }
        let index = digits.parse().map_err(|_| Error::InvalidChildNumberFormat)?;
        if is_hardened {
            ChildNumber::from_hardened_idx(index)
        } else {
            ChildNumber::from_normal_idx(index)
        }
    }
}

/// A BIP32 derivation path
#[derive(Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Default)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The empty path `m`
    pub fn master() -> DerivationPath {
        DerivationPath(Vec::new())
    }

    pub fn is_master(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path with `cn` appended
    pub fn child(&self, cn: ChildNumber) -> DerivationPath {
        let mut path = self.0.clone();
        path.push(cn);
        DerivationPath(path)
    }

    /// Path with every element of `cnums` appended
    pub fn extend<T: AsRef<[ChildNumber]>>(&self, cnums: T) -> DerivationPath {
        let mut path = self.0.clone();
        path.extend_from_slice(cnums.as_ref());
        DerivationPath(path)
    }

    pub fn into_vec(self) -> Vec<ChildNumber> {
        self.0
    }

    pub fn iter(&self) -> core::slice::Iter<'_, ChildNumber> {
        self.0.iter()
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(numbers: Vec<ChildNumber>) -> Self {
        DerivationPath(numbers)
    }
}

impl From<&[ChildNumber]> for DerivationPath {
    fn from(numbers: &[ChildNumber]) -> Self {
        DerivationPath(numbers.to_vec())
    }
}

impl AsRef<[ChildNumber]> for DerivationPath {
    fn as_ref(&self) -> &[ChildNumber] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a DerivationPath {
    type Item = &'a ChildNumber;
    type IntoIter = core::slice::Iter<'a, ChildNumber>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(path: &str) -> Result<DerivationPath, Error> {
        let mut parts = path.split('/');
        // First parts must be `m`.
        if parts.next() != Some("m") {
            return Err(Error::InvalidDerivationPathFormat);
        }

        let ret: Result<Vec<ChildNumber>, Error> = parts.map(str::parse).collect();
        Ok(DerivationPath(ret?))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for cn in self.0.iter() {
            write!(f, "/{}", cn)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A BIP32 error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A pk->pk derivation was attempted on a hardened key
    CannotDeriveFromHardenedKey,
    /// Ed25519 nodes only derive hardened children
    NonHardenedNotSupported,
    /// A child number was provided that was out of range
    InvalidChildNumber(u32),
    /// Invalid childnumber format.
    InvalidChildNumberFormat,
    /// Invalid derivation path format.
    InvalidDerivationPathFormat,
    /// Every index after the requested one produced an invalid key
    IndexRangeExhausted,
    /// Derivation below depth 255
    MaximumDepthExceeded,
    /// Seed outside the 16..=64 byte range
    InvalidSeedLength(usize),
    /// The master key material is not a valid scalar
    InvalidMasterKey,
    /// Base58 or checksum failure
    Base58(base58::Error),
    /// Payload is not 78 bytes
    WrongExtendedKeyLength(usize),
    /// Version bytes are not the expected ones
    UnknownVersion([u8; 4]),
    /// Private key payload missing its 0x00 prefix
    InvalidPrivateKeyPrefix,
    /// Key bytes do not form a valid key
    InvalidKey(String),
    /// Depth zero with a parent fingerprint or child number
    InvalidMasterFields,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CannotDeriveFromHardenedKey => {
                f.write_str("cannot derive hardened key from public key")
            }
            Error::NonHardenedNotSupported => {
                f.write_str("ed25519 only supports hardened derivation")
            }
            Error::InvalidChildNumber(n) => {
                write!(f, "child number {} is invalid (not within [0, 2^31 - 1])", n)
            }
            Error::InvalidChildNumberFormat => f.write_str("invalid child number format"),
            Error::InvalidDerivationPathFormat => f.write_str("invalid derivation path format"),
            Error::IndexRangeExhausted => f.write_str("no valid child key in the index range"),
            Error::MaximumDepthExceeded => f.write_str("maximum derivation depth exceeded"),
            Error::InvalidSeedLength(len) => {
                write!(f, "seed must be 16 to 64 bytes, got {}", len)
            }
            Error::InvalidMasterKey => f.write_str("seed produced an invalid master key"),
            Error::Base58(e) => write!(f, "{}", e),
            Error::WrongExtendedKeyLength(len) => {
                write!(f, "encoded extended key data has wrong length {}", len)
            }
            Error::UnknownVersion(v) => {
                write!(f, "unknown version magic bytes: {}", hex::encode(v))
            }
            Error::InvalidPrivateKeyPrefix => f.write_str("private key is not prefixed with 0x00"),
            Error::InvalidKey(e) => write!(f, "invalid key: {}", e),
            Error::InvalidMasterFields => {
                f.write_str("depth zero key with non-zero parent fingerprint or child number")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Base58(e) => Some(e),
            _ => None,
        }
    }
}

impl From<base58::Error> for Error {
    fn from(e: base58::Error) -> Self {
        Error::Base58(e)
    }
}

pub(crate) fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    let mut engine: HmacEngine<sha512::Hash> = HmacEngine::new(key);
    for part in parts {
        engine.input(part);
    }
    Hmac::<sha512::Hash>::from_engine(engine).to_byte_array()
}

pub(crate) fn split_i(i: &[u8; 64]) -> ([u8; 32], ChainCode) {
    let mut il = [0u8; 32];
    let mut ir = [0u8; 32];
    il.copy_from_slice(&i[..32]);
    ir.copy_from_slice(&i[32..]);
    (il, ChainCode(ir))
}

/// SLIP-0010 serialization of a public point: ed25519 keys carry a 0x00 prefix
fn ser_p(public_key: &PublicKey) -> Vec<u8> {
    let bytes = public_key.compressed().to_bytes();
    if public_key.curve() == Curve::Ed25519 {
        let mut prefixed = Vec::with_capacity(33);
        prefixed.push(0x00);
        prefixed.extend_from_slice(&bytes);
        prefixed
    } else {
        bytes
    }
}

fn compressed_type(curve: Curve) -> PublicKeyType {
    match curve {
        Curve::Secp256k1 => PublicKeyType::Secp256k1,
        Curve::Nist256p1 => PublicKeyType::Nist256p1,
        Curve::Ed25519 => PublicKeyType::Ed25519,
    }
}

struct RawExtendedKey {
    version: u32,
    depth: u8,
    parent_fingerprint: Fingerprint,
    child_number: ChildNumber,
    chain_code: ChainCode,
    key: [u8; 33],
}

impl RawExtendedKey {
    fn encode(&self) -> [u8; EXTENDED_KEY_LEN] {
        let mut ret = [0u8; EXTENDED_KEY_LEN];
        ret[0..4].copy_from_slice(&self.version.to_be_bytes());
        ret[4] = self.depth;
        ret[5..9].copy_from_slice(&self.parent_fingerprint.0);
        ret[9..13].copy_from_slice(&u32::from(self.child_number).to_be_bytes());
        ret[13..45].copy_from_slice(&self.chain_code.0);
        ret[45..78].copy_from_slice(&self.key);
        ret
    }

    fn decode(data: &[u8]) -> Result<Self, Error> {
        if data.len() != EXTENDED_KEY_LEN {
            return Err(Error::WrongExtendedKeyLength(data.len()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&data[0..4]);
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&data[5..9]);
        let mut child = [0u8; 4];
        child.copy_from_slice(&data[9..13]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);
        let mut key = [0u8; 33];
        key.copy_from_slice(&data[45..78]);

        let raw = RawExtendedKey {
            version: u32::from_be_bytes(version),
            depth: data[4],
            parent_fingerprint: Fingerprint(fingerprint),
            child_number: ChildNumber::from(u32::from_be_bytes(child)),
            chain_code: ChainCode(chain_code),
            key,
        };
        if raw.depth == 0
            && (raw.parent_fingerprint != Fingerprint::default() || u32::from(raw.child_number) != 0)
        {
            return Err(Error::InvalidMasterFields);
        }
        Ok(raw)
    }

    fn from_base58(s: &str) -> Result<Self, Error> {
        let data = base58::decode_check(s, Checksum::Sha256d, Alphabet::Bitcoin)?;
        Self::decode(&data)
    }
}

/// Extended private key
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPrivKey {
    /// Curve of the key
    pub curve: Curve,
    /// How many derivations this key is from the master (which is 0)
    pub depth: u8,
    /// Fingerprint of the parent key (0 for master)
    pub parent_fingerprint: Fingerprint,
    /// Child number of the key used to derive from parent (0 for master)
    pub child_number: ChildNumber,
    /// Private key
    pub private_key: PrivateKey,
    /// Chain code
    pub chain_code: ChainCode,
}

impl ExtendedPrivKey {
    /// Construct a new master key from a seed value
    pub fn new_master(curve: Curve, seed: &[u8]) -> Result<ExtendedPrivKey, Error> {
        if !(16..=64).contains(&seed.len()) {
            return Err(Error::InvalidSeedLength(seed.len()));
        }
        let (private_key, chain_code) = derivation_slip10::master_key(curve, seed)?;

        Ok(ExtendedPrivKey {
            curve,
            depth: 0,
            parent_fingerprint: Default::default(),
            child_number: ChildNumber::Normal {
                index: 0,
            },
            private_key,
            chain_code,
        })
    }

    /// Attempts to derive an extended private key from a path.
    pub fn derive_priv<P: AsRef<[ChildNumber]>>(&self, path: &P) -> Result<ExtendedPrivKey, Error> {
        let mut sk: ExtendedPrivKey = self.clone();
        for cnum in path.as_ref() {
            sk = sk.ckd_priv(*cnum)?;
        }
        Ok(sk)
    }

    /// Private->Private child key derivation.
    ///
    /// An index whose tweak is out of range or yields a zero key is skipped and
    /// the next index of the same kind is used instead.
    pub fn ckd_priv(&self, i: ChildNumber) -> Result<ExtendedPrivKey, Error> {
        if self.curve == Curve::Ed25519 {
            return derivation_slip10::ed25519_ckd_priv(self, i);
        }
        let depth = self.depth.checked_add(1).ok_or(Error::MaximumDepthExceeded)?;

        let mut child = i;
        loop {
            let index = u32::from(child).to_be_bytes();
            let hmac = if child.is_hardened() {
                let secret = zeroize::Zeroizing::new(self.private_key.secret_bytes());
                hmac_sha512(self.chain_code.as_ref(), &[&[0u8], secret.as_ref(), &index])
            } else {
                let public = self.private_key.public_key().to_bytes();
                hmac_sha512(self.chain_code.as_ref(), &[&public, &index])
            };
            let (il, chain_code) = split_i(&hmac);

            match self.private_key.tweak_add(&il) {
                Some(private_key) => {
                    return Ok(ExtendedPrivKey {
                        curve: self.curve,
                        depth,
                        parent_fingerprint: self.fingerprint(),
                        child_number: child,
                        private_key,
                        chain_code,
                    });
                }
                None => {
                    tracing::warn!(index = %child, "invalid child key, trying next index");
                    child = child.increment()?;
                }
            }
        }
    }

    /// Returns the HASH160 of the public key belonging to the xpriv
    pub fn identifier(&self) -> [u8; 20] {
        ExtendedPubKey::from_priv(self).identifier()
    }

    /// Returns the first four bytes of the identifier
    pub fn fingerprint(&self) -> Fingerprint {
        ExtendedPubKey::from_priv(self).fingerprint()
    }

    /// Extended private key binary encoding according to BIP 32
    pub fn encode(&self, version: u32) -> [u8; EXTENDED_KEY_LEN] {
        let mut key = [0u8; 33];
        key[1..].copy_from_slice(&self.private_key.secret_bytes());
        let raw = RawExtendedKey {
            version,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            key,
        };
        let encoded = raw.encode();
        zeroize::Zeroize::zeroize(&mut key);
        encoded
    }

    /// Decoding extended private key from binary data according to BIP 32.
    /// Returns the key and its version bytes.
    pub fn decode(data: &[u8], curve: Curve) -> Result<(ExtendedPrivKey, u32), Error> {
        let raw = RawExtendedKey::decode(data)?;
        if raw.key[0] != 0x00 {
            return Err(Error::InvalidPrivateKeyPrefix);
        }
        let private_key =
            PrivateKey::new(&raw.key[1..], curve).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok((
            ExtendedPrivKey {
                curve,
                depth: raw.depth,
                parent_fingerprint: raw.parent_fingerprint,
                child_number: raw.child_number,
                private_key,
                chain_code: raw.chain_code,
            },
            raw.version,
        ))
    }

    /// Base58Check string with the given version bytes
    pub fn to_base58(&self, version: u32) -> String {
        base58::encode_check(&self.encode(version), Checksum::Sha256d, Alphabet::Bitcoin)
    }

    /// Parses a Base58Check string whose version is one of the known private versions
    pub fn from_base58(s: &str, curve: Curve) -> Result<(ExtendedPrivKey, u32), Error> {
        let data = base58::decode_check(s, Checksum::Sha256d, Alphabet::Bitcoin)?;
        let (key, version) = Self::decode(&data, curve)?;
        if !version::is_private(version) {
            return Err(Error::UnknownVersion(version.to_be_bytes()));
        }
        Ok((key, version))
    }

    /// Parses a Base58Check string that must carry exactly `expected` version bytes
    pub fn from_base58_with_version(
        s: &str,
        expected: u32,
        curve: Curve,
    ) -> Result<ExtendedPrivKey, Error> {
        let data = base58::decode_check(s, Checksum::Sha256d, Alphabet::Bitcoin)?;
        let (key, version) = Self::decode(&data, curve)?;
        if version != expected {
            return Err(Error::UnknownVersion(version.to_be_bytes()));
        }
        Ok(key)
    }
}

impl fmt::Debug for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivKey")
            .field("curve", &self.curve)
            .field("depth", &self.depth)
            .field("parent_fingerprint", &self.parent_fingerprint)
            .field("child_number", &self.child_number)
            .field("chain_code", &self.chain_code)
            .finish()
    }
}

/// Extended public key
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExtendedPubKey {
    /// Curve of the key
    pub curve: Curve,
    /// How many derivations this key is from the master (which is 0)
    pub depth: u8,
    /// Fingerprint of the parent key
    pub parent_fingerprint: Fingerprint,
    /// Child number of the key used to derive from parent (0 for master)
    pub child_number: ChildNumber,
    /// Compressed public key
    pub public_key: PublicKey,
    /// Chain code
    pub chain_code: ChainCode,
}

impl ExtendedPubKey {
    /// Derives a public key from a private key
    pub fn from_priv(sk: &ExtendedPrivKey) -> ExtendedPubKey {
        ExtendedPubKey {
            curve: sk.curve,
            depth: sk.depth,
            parent_fingerprint: sk.parent_fingerprint,
            child_number: sk.child_number,
            public_key: sk.private_key.public_key(),
            chain_code: sk.chain_code,
        }
    }

    /// Attempts to derive an extended public key from a path.
    pub fn derive_pub<P: AsRef<[ChildNumber]>>(&self, path: &P) -> Result<ExtendedPubKey, Error> {
        let mut pk: ExtendedPubKey = self.clone();
        for cnum in path.as_ref() {
            pk = pk.ckd_pub(*cnum)?
        }
        Ok(pk)
    }

    /// Public->Public child key derivation
    pub fn ckd_pub(&self, i: ChildNumber) -> Result<ExtendedPubKey, Error> {
        if self.curve == Curve::Ed25519 {
            return Err(Error::NonHardenedNotSupported);
        }
        if i.is_hardened() {
            return Err(Error::CannotDeriveFromHardenedKey);
        }
        let depth = self.depth.checked_add(1).ok_or(Error::MaximumDepthExceeded)?;

        let public = self.public_key.to_bytes();
        let mut child = i;
        loop {
            let index = u32::from(child).to_be_bytes();
            let hmac = hmac_sha512(self.chain_code.as_ref(), &[&public, &index]);
            let (il, chain_code) = split_i(&hmac);

            match self.public_key.tweak_add(&il) {
                Some(public_key) => {
                    return Ok(ExtendedPubKey {
                        curve: self.curve,
                        depth,
                        parent_fingerprint: self.fingerprint(),
                        child_number: child,
                        public_key,
                        chain_code,
                    });
                }
                None => {
                    tracing::warn!(index = %child, "invalid child key, trying next index");
                    child = child.increment()?;
                }
            }
        }
    }

    /// Returns the HASH160 of the serialized public key
    pub fn identifier(&self) -> [u8; 20] {
        hash160::Hash::hash(&ser_p(&self.public_key)).to_byte_array()
    }

    /// Returns the first four bytes of the identifier
    pub fn fingerprint(&self) -> Fingerprint {
        let id = self.identifier();
        Fingerprint([id[0], id[1], id[2], id[3]])
    }

    /// Extended public key binary encoding according to BIP 32
    pub fn encode(&self, version: u32) -> [u8; EXTENDED_KEY_LEN] {
        let mut key = [0u8; 33];
        key.copy_from_slice(&ser_p(&self.public_key));
        RawExtendedKey {
            version,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            key,
        }
        .encode()
    }

    /// Decoding extended public key from binary data according to BIP 32.
    /// Returns the key and its version bytes.
    pub fn decode(data: &[u8], curve: Curve) -> Result<(ExtendedPubKey, u32), Error> {
        let raw = RawExtendedKey::decode(data)?;
        let key_bytes: &[u8] = if curve == Curve::Ed25519 {
            if raw.key[0] != 0x00 {
                return Err(Error::InvalidKey("ed25519 public key must be prefixed with 0x00".into()));
            }
            &raw.key[1..]
        } else {
            &raw.key[..]
        };
        let public_key = PublicKey::from_bytes(key_bytes, compressed_type(curve))
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok((
            ExtendedPubKey {
                curve,
                depth: raw.depth,
                parent_fingerprint: raw.parent_fingerprint,
                child_number: raw.child_number,
                public_key,
                chain_code: raw.chain_code,
            },
            raw.version,
        ))
    }

    /// Base58Check string with the given version bytes
    pub fn to_base58(&self, version: u32) -> String {
        base58::encode_check(&self.encode(version), Checksum::Sha256d, Alphabet::Bitcoin)
    }

    /// Parses a Base58Check string whose version is one of the known public versions
    pub fn from_base58(s: &str, curve: Curve) -> Result<(ExtendedPubKey, u32), Error> {
        let data = base58::decode_check(s, Checksum::Sha256d, Alphabet::Bitcoin)?;
        let (key, version) = Self::decode(&data, curve)?;
        if !version::is_public(version) {
            return Err(Error::UnknownVersion(version.to_be_bytes()));
        }
        Ok((key, version))
    }

    /// Parses a Base58Check string that must carry exactly `expected` version bytes
    pub fn from_base58_with_version(
        s: &str,
        expected: u32,
        curve: Curve,
    ) -> Result<ExtendedPubKey, Error> {
        let data = base58::decode_check(s, Checksum::Sha256d, Alphabet::Bitcoin)?;
        let (key, version) = Self::decode(&data, curve)?;
        if version != expected {
            return Err(Error::UnknownVersion(version.to_be_bytes()));
        }
        Ok(key)
    }
}

/// Reads the version bytes of an extended key string without validating the key
pub fn version_of(s: &str) -> Result<u32, Error> {
    Ok(RawExtendedKey::from_base58(s)?.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_derivation_path() {
        assert_eq!("42".parse::<DerivationPath>(), Err(Error::InvalidDerivationPathFormat));
        assert_eq!("n/0'/0".parse::<DerivationPath>(), Err(Error::InvalidDerivationPathFormat));
        assert_eq!("m/0'/0/".parse::<DerivationPath>(), Err(Error::InvalidChildNumberFormat));
        assert_eq!("m/0x'/0".parse::<DerivationPath>(), Err(Error::InvalidChildNumberFormat));
        assert_eq!("m/+1".parse::<DerivationPath>(), Err(Error::InvalidChildNumberFormat));
        assert_eq!(
            "m/2147483648".parse::<DerivationPath>(),
            Err(Error::InvalidChildNumber(2147483648))
        );

        assert_eq!(DerivationPath::master(), "m".parse().unwrap());
        assert_eq!(
            "m/0'/1".parse::<DerivationPath>().unwrap(),
            DerivationPath::from(vec![
                ChildNumber::from_hardened_idx(0).unwrap(),
                ChildNumber::from_normal_idx(1).unwrap(),
            ])
        );
        // `h` and `'` mark hardened steps alike
        assert_eq!(
            "m/44h/0h/0h/0/0".parse::<DerivationPath>().unwrap(),
            "m/44'/0'/0'/0/0".parse::<DerivationPath>().unwrap()
        );
    }

    #[test]
    fn test_derivation_path_display_round_trip() {
        let path: DerivationPath = "m/84h/0h/0h/1/5".parse().unwrap();
        assert_eq!(path.to_string(), "m/84'/0'/0'/1/5");
        assert_eq!(path.to_string().parse::<DerivationPath>().unwrap(), path);
        assert_eq!(DerivationPath::master().to_string(), "m");
    }

    #[test]
    fn test_child_number_conversion() {
        let hardened = ChildNumber::from(0x8000_002C);
        assert_eq!(hardened, ChildNumber::from_hardened_idx(44).unwrap());
        assert_eq!(u32::from(hardened), 0x8000_002C);
        assert!(hardened.is_hardened());
        assert_eq!(hardened.index(), 44);
        assert_eq!(
            ChildNumber::from_normal_idx((1 << 31) - 1).unwrap().increment(),
            Err(Error::IndexRangeExhausted)
        );
    }

    #[test]
    fn test_hardened_public_derivation_fails() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = ExtendedPrivKey::new_master(Curve::Secp256k1, &seed).unwrap();
        let xpub = ExtendedPubKey::from_priv(&master);
        for index in [0, 1, 44, (1 << 31) - 1] {
            let hardened = ChildNumber::from_hardened_idx(index).unwrap();
            assert_eq!(xpub.ckd_pub(hardened), Err(Error::CannotDeriveFromHardenedKey));
        }
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        for curve in [Curve::Secp256k1, Curve::Nist256p1] {
            let master = ExtendedPrivKey::new_master(curve, &seed).unwrap();
            let path: DerivationPath = "m/0/1/2".parse().unwrap();
            let via_private = ExtendedPubKey::from_priv(&master.derive_priv(&path).unwrap());
            let via_public = ExtendedPubKey::from_priv(&master).derive_pub(&path).unwrap();
            assert_eq!(via_private, via_public);
        }
    }

    #[test]
    fn test_seed_length_bounds() {
        assert_eq!(
            ExtendedPrivKey::new_master(Curve::Secp256k1, &[1u8; 15]),
            Err(Error::InvalidSeedLength(15))
        );
        assert_eq!(
            ExtendedPrivKey::new_master(Curve::Secp256k1, &[1u8; 65]),
            Err(Error::InvalidSeedLength(65))
        );
    }

    #[test]
    fn test_base58_rejects_wrong_version() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = ExtendedPrivKey::new_master(Curve::Secp256k1, &seed).unwrap();
        let xprv = master.to_base58(version::XPRV);
        let xpub = ExtendedPubKey::from_priv(&master).to_base58(version::XPUB);

        assert_matches!(
            ExtendedPrivKey::from_base58_with_version(&xprv, version::ZPRV, Curve::Secp256k1),
            Err(Error::UnknownVersion(_))
        );
        // a public payload carries no 0x00 private key prefix
        assert_matches!(
            ExtendedPrivKey::from_base58(&xpub, Curve::Secp256k1),
            Err(Error::InvalidPrivateKeyPrefix)
        );
        assert_matches!(
            ExtendedPubKey::from_base58(&xprv, Curve::Secp256k1),
            Err(Error::InvalidKey(_))
        );
        assert_eq!(version_of(&xpub).unwrap(), version::XPUB);
    }

    #[test]
    fn test_base58_rejects_bad_checksum() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = ExtendedPrivKey::new_master(Curve::Secp256k1, &seed).unwrap();
        let mut xprv = master.to_base58(version::XPRV);
        let last = xprv.pop().unwrap();
        xprv.push(if last == 'a' { 'b' } else { 'a' });
        assert_matches!(
            ExtendedPrivKey::from_base58(&xprv, Curve::Secp256k1),
            Err(Error::Base58(_))
        );
    }
}
