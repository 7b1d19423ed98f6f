//! BIP39 seed
//!
//! A seed is a 512-bit (64 bytes) value used to derive HD wallet keys. The
//! bytes are wiped when the seed is dropped.

use core::fmt;
use core::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// A BIP39 seed (512 bits / 64 bytes)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    /// Create a new seed from bytes
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create a seed from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 64 {
            return Err(Error::InvalidParameter(format!(
                "Invalid seed length: expected 64 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the seed as bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Get the seed as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Create a seed from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let mut bytes = hex::decode(hex_str)
            .map_err(|e| Error::InvalidParameter(format!("Invalid hex: {}", e)))?;
        let seed = Self::from_slice(&bytes);
        bytes.zeroize();
        seed
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Seed {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the actual seed in debug output
        write!(f, "Seed(***)")
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show first and last 4 bytes in hex
        write!(f, "Seed({}...{})", hex::encode(&self.0[..4]), hex::encode(&self.0[60..]))
    }
}

impl FromStr for Seed {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_from_slice() {
        let bytes = vec![2u8; 64];
        let seed = Seed::from_slice(&bytes).unwrap();
        assert_eq!(seed.as_slice(), &bytes[..]);

        assert!(Seed::from_slice(&[3u8; 32]).is_err());
        assert!(Seed::from_slice(&[4u8; 128]).is_err());
    }

    #[test]
    fn test_seed_hex() {
        let seed = Seed::new([5u8; 64]);
        let hex = seed.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(Seed::from_hex(&hex).unwrap(), seed);

        assert!(Seed::from_hex("invalid").is_err());
        assert!(Seed::from_hex("00").is_err());
    }

    #[test]
    fn test_seed_display() {
        let mut bytes = [0u8; 64];
        bytes[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        bytes[60..].copy_from_slice(&[0xca, 0xfe, 0xba, 0xbe]);

        let seed = Seed::new(bytes);
        assert_eq!(format!("{}", seed), "Seed(deadbeef...cafebabe)");
        assert_eq!(format!("{:?}", seed), "Seed(***)");
    }
}
