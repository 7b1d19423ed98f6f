//! Private and public keys over the supported curves.
//!
//! Keys are validated when they are constructed, so every `PrivateKey` holds a
//! scalar that is nonzero and below the curve order and every `PublicKey` holds
//! a point on its curve. Nothing downstream re-validates key material.

use core::fmt;
use core::str::FromStr;

use bitcoin_hashes::{Hash, hash160};
use ed25519_dalek::{Signer, Verifier};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::elliptic_curve::PrimeField;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use secp256k1::{Message, Secp256k1};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Elliptic curve a key lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Secp256k1,
    Ed25519,
    Nist256p1,
}

impl Curve {
    /// Canonical lowercase name, as used in keystore documents
    pub fn name(&self) -> &'static str {
        match self {
            Curve::Secp256k1 => "secp256k1",
            Curve::Ed25519 => "ed25519",
            Curve::Nist256p1 => "nist256p1",
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Curve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "secp256k1" => Ok(Curve::Secp256k1),
            "ed25519" => Ok(Curve::Ed25519),
            "nist256p1" => Ok(Curve::Nist256p1),
            other => Err(Error::InvalidParameter(format!("Unknown curve: {}", other))),
        }
    }
}

/// Encoding of a public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicKeyType {
    /// 33-byte compressed secp256k1 point
    Secp256k1,
    /// 65-byte uncompressed secp256k1 point
    Secp256k1Extended,
    /// 33-byte compressed nist256p1 point
    Nist256p1,
    /// 65-byte uncompressed nist256p1 point
    Nist256p1Extended,
    /// 32-byte ed25519 point
    Ed25519,
}

impl PublicKeyType {
    pub fn curve(&self) -> Curve {
        match self {
            PublicKeyType::Secp256k1 | PublicKeyType::Secp256k1Extended => Curve::Secp256k1,
            PublicKeyType::Nist256p1 | PublicKeyType::Nist256p1Extended => Curve::Nist256p1,
            PublicKeyType::Ed25519 => Curve::Ed25519,
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, PublicKeyType::Secp256k1Extended | PublicKeyType::Nist256p1Extended)
    }

    /// Serialized length in bytes
    pub fn size(&self) -> usize {
        match self {
            PublicKeyType::Secp256k1 | PublicKeyType::Nist256p1 => 33,
            PublicKeyType::Secp256k1Extended | PublicKeyType::Nist256p1Extended => 65,
            PublicKeyType::Ed25519 => 32,
        }
    }
}

#[derive(Clone)]
enum Secret {
    Secp256k1(secp256k1::SecretKey),
    Nist256p1(p256::SecretKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// A validated private key
#[derive(Clone)]
pub struct PrivateKey {
    secret: Secret,
}

impl PrivateKey {
    /// Length of a private key, in bytes
    pub const LEN: usize = 32;

    /// Validates `bytes` as a scalar of `curve`
    pub fn new(bytes: &[u8], curve: Curve) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(Error::InvalidParameter(format!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let secret = match curve {
            Curve::Secp256k1 => Secret::Secp256k1(
                secp256k1::SecretKey::from_slice(bytes)
                    .map_err(|e| Error::InvalidParameter(format!("Invalid private key: {}", e)))?,
            ),
            Curve::Nist256p1 => Secret::Nist256p1(
                p256::SecretKey::from_slice(bytes)
                    .map_err(|_| Error::InvalidParameter("Invalid nist256p1 private key".into()))?,
            ),
            Curve::Ed25519 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(bytes);
                let key = ed25519_dalek::SigningKey::from_bytes(&seed);
                seed.zeroize();
                Secret::Ed25519(key)
            }
        };

        Ok(Self {
            secret,
        })
    }

    /// Parses a hex encoded private key
    pub fn from_hex(hex_str: &str, curve: Curve) -> Result<Self> {
        let mut bytes = hex::decode(hex_str)
            .map_err(|e| Error::InvalidParameter(format!("Invalid hex: {}", e)))?;
        let key = Self::new(&bytes, curve);
        bytes.zeroize();
        key
    }

    pub fn curve(&self) -> Curve {
        match self.secret {
            Secret::Secp256k1(_) => Curve::Secp256k1,
            Secret::Nist256p1(_) => Curve::Nist256p1,
            Secret::Ed25519(_) => Curve::Ed25519,
        }
    }

    /// Raw scalar bytes. Callers own zeroizing the copy.
    pub fn secret_bytes(&self) -> [u8; 32] {
        match &self.secret {
            Secret::Secp256k1(key) => key.secret_bytes(),
            Secret::Nist256p1(key) => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&key.to_bytes());
                out
            }
            Secret::Ed25519(key) => key.to_bytes(),
        }
    }

    /// Compressed public key for ECDSA curves, the 32-byte point for ed25519
    pub fn public_key(&self) -> PublicKey {
        match &self.secret {
            Secret::Secp256k1(key) => {
                let secp = Secp256k1::signing_only();
                PublicKey {
                    point: Point::Secp256k1(secp256k1::PublicKey::from_secret_key(&secp, key)),
                    compressed: true,
                }
            }
            Secret::Nist256p1(key) => PublicKey {
                point: Point::Nist256p1(key.public_key()),
                compressed: true,
            },
            Secret::Ed25519(key) => PublicKey {
                point: Point::Ed25519(key.verifying_key()),
                compressed: true,
            },
        }
    }

    /// Public key in the requested encoding. Fails when `kind` is for another curve.
    pub fn public_key_of_type(&self, kind: PublicKeyType) -> Result<PublicKey> {
        if kind.curve() != self.curve() {
            return Err(Error::InvalidParameter(format!(
                "Public key type {:?} does not match curve {}",
                kind,
                self.curve()
            )));
        }
        let public = self.public_key();
        Ok(if kind.is_compressed() {
            public
        } else {
            public.uncompressed()
        })
    }

    /// Signs `message`.
    ///
    /// ECDSA curves expect a 32-byte digest and return the 64-byte compact
    /// `r || s` form with low S. Ed25519 signs the message itself.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.secret {
            Secret::Secp256k1(key) => {
                let digest = digest32(message)?;
                let secp = Secp256k1::signing_only();
                let signature = secp.sign_ecdsa(&Message::from_digest(digest), key);
                Ok(signature.serialize_compact().to_vec())
            }
            Secret::Nist256p1(key) => {
                let signature = sign_nist256p1(key, message)?;
                Ok(signature.to_bytes().to_vec())
            }
            Secret::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
        }
    }

    /// Signs a 32-byte digest and returns a DER encoded ECDSA signature
    pub fn sign_der(&self, digest: &[u8]) -> Result<Vec<u8>> {
        match &self.secret {
            Secret::Secp256k1(key) => {
                let digest = digest32(digest)?;
                let secp = Secp256k1::signing_only();
                let signature = secp.sign_ecdsa(&Message::from_digest(digest), key);
                Ok(signature.serialize_der().to_vec())
            }
            Secret::Nist256p1(key) => {
                let signature = sign_nist256p1(key, digest)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            Secret::Ed25519(_) => {
                Err(Error::InvalidParameter("DER signatures are not defined for ed25519".into()))
            }
        }
    }

    /// `(self + tweak) mod n`, or `None` when the tweak is out of range or the sum is zero.
    pub(crate) fn tweak_add(&self, tweak: &[u8; 32]) -> Option<PrivateKey> {
        let secret = match &self.secret {
            Secret::Secp256k1(key) => {
                let scalar = secp256k1::Scalar::from_be_bytes(*tweak).ok()?;
                Secret::Secp256k1(key.add_tweak(&scalar).ok()?)
            }
            Secret::Nist256p1(key) => {
                let scalar =
                    Option::<p256::Scalar>::from(p256::Scalar::from_repr((*tweak).into()))?;
                let sum = *key.to_nonzero_scalar() + scalar;
                Secret::Nist256p1(p256::SecretKey::from_bytes(&sum.to_repr()).ok()?)
            }
            Secret::Ed25519(_) => return None,
        };
        Some(PrivateKey {
            secret,
        })
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        // nist256p1 and ed25519 keys zeroize themselves
        if let Secret::Secp256k1(key) = &mut self.secret {
            key.non_secure_erase();
        }
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.curve() == other.curve() && self.secret_bytes() == other.secret_bytes()
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, ***)", self.curve())
    }
}

fn digest32(message: &[u8]) -> Result<[u8; 32]> {
    message.try_into().map_err(|_| {
        Error::InvalidParameter(format!("ECDSA expects a 32-byte digest, got {}", message.len()))
    })
}

fn sign_nist256p1(key: &p256::SecretKey, digest: &[u8]) -> Result<p256::ecdsa::Signature> {
    let digest = digest32(digest)?;
    let signing_key = p256::ecdsa::SigningKey::from(key);
    let signature: p256::ecdsa::Signature =
        signing_key.sign_prehash(&digest).map_err(|e| Error::CryptoFailure(e.to_string()))?;
    Ok(signature.normalize_s().unwrap_or(signature))
}

#[derive(Clone, PartialEq, Eq)]
enum Point {
    Secp256k1(secp256k1::PublicKey),
    Nist256p1(p256::PublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

/// A public key whose point has been validated
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    point: Point,
    compressed: bool,
}

impl PublicKey {
    /// Parses `bytes` in the `kind` encoding, checking the point is on the curve
    pub fn from_bytes(bytes: &[u8], kind: PublicKeyType) -> Result<Self> {
        if bytes.len() != kind.size() {
            return Err(Error::InvalidParameter(format!(
                "Invalid public key length for {:?}: expected {}, got {}",
                kind,
                kind.size(),
                bytes.len()
            )));
        }

        let point = match kind.curve() {
            Curve::Secp256k1 => Point::Secp256k1(
                secp256k1::PublicKey::from_slice(bytes)
                    .map_err(|e| Error::CryptoFailure(format!("Invalid public key: {}", e)))?,
            ),
            Curve::Nist256p1 => Point::Nist256p1(
                p256::PublicKey::from_sec1_bytes(bytes)
                    .map_err(|_| Error::CryptoFailure("Invalid nist256p1 public key".into()))?,
            ),
            Curve::Ed25519 => {
                let mut raw = [0u8; 32];
                raw.copy_from_slice(bytes);
                Point::Ed25519(
                    ed25519_dalek::VerifyingKey::from_bytes(&raw)
                        .map_err(|e| Error::CryptoFailure(format!("Invalid public key: {}", e)))?,
                )
            }
        };

        Ok(Self {
            point,
            compressed: kind.is_compressed(),
        })
    }

    /// Parses a hex encoded public key
    pub fn from_hex(hex_str: &str, kind: PublicKeyType) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::InvalidParameter(format!("Invalid hex: {}", e)))?;
        Self::from_bytes(&bytes, kind)
    }

    pub fn kind(&self) -> PublicKeyType {
        match (&self.point, self.compressed) {
            (Point::Secp256k1(_), true) => PublicKeyType::Secp256k1,
            (Point::Secp256k1(_), false) => PublicKeyType::Secp256k1Extended,
            (Point::Nist256p1(_), true) => PublicKeyType::Nist256p1,
            (Point::Nist256p1(_), false) => PublicKeyType::Nist256p1Extended,
            (Point::Ed25519(_), _) => PublicKeyType::Ed25519,
        }
    }

    pub fn curve(&self) -> Curve {
        self.kind().curve()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Serialized point in this key's encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.point {
            Point::Secp256k1(key) if self.compressed => key.serialize().to_vec(),
            Point::Secp256k1(key) => key.serialize_uncompressed().to_vec(),
            Point::Nist256p1(key) => key.to_encoded_point(self.compressed).as_bytes().to_vec(),
            Point::Ed25519(key) => key.to_bytes().to_vec(),
        }
    }

    /// Same point, compressed encoding
    pub fn compressed(&self) -> PublicKey {
        PublicKey {
            point: self.point.clone(),
            compressed: true,
        }
    }

    /// Same point, uncompressed encoding. Ed25519 keys have only one encoding.
    pub fn uncompressed(&self) -> PublicKey {
        PublicKey {
            point: self.point.clone(),
            compressed: matches!(self.point, Point::Ed25519(_)),
        }
    }

    /// RIPEMD160(SHA256(bytes)) of this encoding
    pub fn hash160(&self) -> [u8; 20] {
        hash160::Hash::hash(&self.to_bytes()).to_byte_array()
    }

    /// Verifies a signature produced by [`PrivateKey::sign`]. Never fails, returns false instead.
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> bool {
        match &self.point {
            Point::Secp256k1(key) => {
                let Ok(signature) = secp256k1::ecdsa::Signature::from_compact(signature) else {
                    return false;
                };
                let Ok(digest) = digest32(message) else {
                    return false;
                };
                let secp = Secp256k1::verification_only();
                secp.verify_ecdsa(&Message::from_digest(digest), &signature, key).is_ok()
            }
            Point::Nist256p1(key) => {
                let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                let verifying_key = p256::ecdsa::VerifyingKey::from(key);
                verifying_key.verify_prehash(message, &signature).is_ok()
            }
            Point::Ed25519(key) => {
                let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(message, &signature).is_ok()
            }
        }
    }

    /// `self + tweak * G`, or `None` when the tweak is out of range or the sum is infinity.
    pub(crate) fn tweak_add(&self, tweak: &[u8; 32]) -> Option<PublicKey> {
        let point = match &self.point {
            Point::Secp256k1(key) => {
                let scalar = secp256k1::Scalar::from_be_bytes(*tweak).ok()?;
                let secp = Secp256k1::verification_only();
                Point::Secp256k1(key.add_exp_tweak(&secp, &scalar).ok()?)
            }
            Point::Nist256p1(key) => {
                let scalar =
                    Option::<p256::Scalar>::from(p256::Scalar::from_repr((*tweak).into()))?;
                let sum = p256::ProjectivePoint::GENERATOR * scalar + key.to_projective();
                Point::Nist256p1(p256::PublicKey::from_affine(sum.to_affine()).ok()?)
            }
            Point::Ed25519(_) => return None,
        };
        Some(PublicKey {
            point,
            compressed: self.compressed,
        })
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({:?}, {})", self.kind(), hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}
