//! Base58 and Base58Check encoding.
//!
//! Two alphabets (Bitcoin, Ripple) and two checksum functions (double SHA-256,
//! double BLAKE-256 for Decred) cover every Base58 family in the coin table.

use core::fmt;

use bitcoin_hashes::{Hash, sha256d};
use serde::{Deserialize, Serialize};
use wallet_core_hashes::blake256d;

/// Length of a Base58Check checksum
pub const CHECKSUM_LEN: usize = 4;

/// Base58 character set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alphabet {
    Bitcoin,
    Ripple,
}

impl Alphabet {
    fn as_bs58(&self) -> &'static bs58::Alphabet {
        match self {
            Alphabet::Bitcoin => bs58::Alphabet::BITCOIN,
            Alphabet::Ripple => bs58::Alphabet::RIPPLE,
        }
    }
}

/// Checksum function appended by Base58Check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Checksum {
    Sha256d,
    Blake256d,
}

impl Checksum {
    /// First four bytes of the double hash of `data`
    pub fn compute(&self, data: &[u8]) -> [u8; CHECKSUM_LEN] {
        let digest = match self {
            Checksum::Sha256d => sha256d::Hash::hash(data).to_byte_array(),
            Checksum::Blake256d => blake256d::Hash::hash(data).to_byte_array(),
        };
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[..CHECKSUM_LEN]);
        out
    }
}

/// Base58 decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Character outside the alphabet
    BadCharacter(String),
    /// Payload shorter than the checksum
    TooShort(usize),
    /// Checksum does not match the payload
    BadChecksum,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadCharacter(e) => write!(f, "Base58 decoding error: {}", e),
            Error::TooShort(len) => write!(f, "Base58Check payload too short: {} bytes", len),
            Error::BadChecksum => write!(f, "Base58Check checksum mismatch"),
        }
    }
}

impl std::error::Error for Error {}

/// Plain Base58, no checksum
pub fn encode(data: &[u8], alphabet: Alphabet) -> String {
    bs58::encode(data).with_alphabet(alphabet.as_bs58()).into_string()
}

/// Plain Base58, no checksum
pub fn decode(s: &str, alphabet: Alphabet) -> Result<Vec<u8>, Error> {
    bs58::decode(s)
        .with_alphabet(alphabet.as_bs58())
        .into_vec()
        .map_err(|e| Error::BadCharacter(e.to_string()))
}

/// Base58 of `data || checksum(data)`
pub fn encode_check(data: &[u8], checksum: Checksum, alphabet: Alphabet) -> String {
    let mut payload = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&checksum.compute(data));
    encode(&payload, alphabet)
}

/// Decodes and strips a verified checksum
pub fn decode_check(s: &str, checksum: Checksum, alphabet: Alphabet) -> Result<Vec<u8>, Error> {
    let mut payload = decode(s, alphabet)?;
    if payload.len() < CHECKSUM_LEN {
        return Err(Error::TooShort(payload.len()));
    }
    let split = payload.len() - CHECKSUM_LEN;
    if checksum.compute(&payload[..split]) != payload[split..] {
        return Err(Error::BadChecksum);
    }
    payload.truncate(split);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_round_trip_with_leading_zeros() {
        let data = [0u8, 0, 1, 2, 3];
        let encoded = encode_check(&data, Checksum::Sha256d, Alphabet::Bitcoin);
        assert!(encoded.starts_with("11"));
        assert_eq!(decode_check(&encoded, Checksum::Sha256d, Alphabet::Bitcoin).unwrap(), data);
    }

    #[test]
    fn test_known_address_payload() {
        // version 0x00 || hash160 of the BIP44 "abandon ... about" key
        let decoded =
            decode_check("1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA", Checksum::Sha256d, Alphabet::Bitcoin)
                .unwrap();
        assert_eq!(decoded.len(), 21);
        assert_eq!(decoded[0], 0x00);
    }

    #[test]
    fn test_corrupted_checksum_is_rejected() {
        let encoded = encode_check(b"wallet", Checksum::Sha256d, Alphabet::Bitcoin);
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let corrupted: String = chars.into_iter().collect();
        assert_eq!(
            decode_check(&corrupted, Checksum::Sha256d, Alphabet::Bitcoin),
            Err(Error::BadChecksum)
        );
    }

    #[test]
    fn test_checksum_functions_differ() {
        let data = b"decred";
        assert_ne!(Checksum::Sha256d.compute(data), Checksum::Blake256d.compute(data));
        let encoded = encode_check(data, Checksum::Blake256d, Alphabet::Bitcoin);
        assert!(decode_check(&encoded, Checksum::Sha256d, Alphabet::Bitcoin).is_err());
        assert_eq!(decode_check(&encoded, Checksum::Blake256d, Alphabet::Bitcoin).unwrap(), data);
    }

    #[test]
    fn test_ripple_alphabet() {
        let encoded = encode(&[0u8; 3], Alphabet::Ripple);
        assert_eq!(encoded, "rrr");
        assert!(decode("0OIl", Alphabet::Bitcoin).is_err());
    }
}
