// SPDX-License-Identifier: CC0-1.0

//! Double BLAKE-256, used for Decred Base58Check checksums.

use core::fmt;

use crate::blake256;

/// Output of the double BLAKE-256 hash function.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Hashes some bytes.
    pub fn hash(data: &[u8]) -> Self {
        let first = blake256::Hash::hash(data);
        Hash(blake256::Hash::hash(first.as_byte_array()).to_byte_array())
    }

    /// Returns the underlying byte array.
    pub fn to_byte_array(self) -> [u8; 32] {
        self.0
    }

    /// Returns a reference to the underlying byte array.
    pub fn as_byte_array(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::LowerHex for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake256d::Hash({:x})", self)
    }
}
