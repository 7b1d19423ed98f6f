// SPDX-License-Identifier: CC0-1.0

//! UTXO transactions.
//!
//! The Bitcoin format (legacy and segwit serialization) lives here; Zcash v4
//! and Decred have their own modules because their prefixes, trailers and
//! signature hashes differ.

pub mod decred;
pub mod sighash;
pub mod zcash;

use core::fmt;
use std::io;

use bitcoin_hashes::{Hash, sha256d};
use serde::{Deserialize, Serialize};

use crate::encode::{Encodable, VarInt, encode_bytes, encode_list, serialize};
use crate::error::{Error, Result};
use crate::script::Script;

/// Sequence number that disables relative lock time and replace-by-fee
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Hex in display order, which is the reverse of the byte order
pub(crate) fn reversed_hex(bytes: &[u8; 32]) -> String {
    let mut reversed = *bytes;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parses display-order hex into byte order
pub(crate) fn hash_from_reversed_hex(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s).map_err(|e| Error::InvalidParameter(format!("Invalid hash hex: {}", e)))?;
    let mut hash: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::InvalidParameter(format!("Invalid hash length {}", bytes.len()))
    })?;
    hash.reverse();
    Ok(hash)
}

/// Concatenated encodings of `items`, without a count prefix
pub(crate) fn encode_all<'a, T: Encodable + 'a>(items: impl IntoIterator<Item = &'a T>) -> Vec<u8> {
    let mut buf = Vec::new();
    for item in items {
        buf.extend(serialize(item));
    }
    buf
}

mod txid_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::reversed_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        super::hash_from_reversed_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A reference to a transaction output.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct OutPoint {
    /// The referenced transaction's hash, in byte order. Serialized as the txid.
    #[serde(rename = "txid", with = "txid_hex")]
    pub hash: [u8; 32],
    /// The index of the referenced output in its transaction's vout.
    #[serde(rename = "vout")]
    pub index: u32,
    /// Decred transaction tree, zero for regular transactions
    #[serde(default)]
    pub tree: u8,
}

impl OutPoint {
    /// Creates a new [`OutPoint`] from a hash in byte order.
    pub fn new(hash: [u8; 32], index: u32) -> OutPoint {
        OutPoint {
            hash,
            index,
            tree: 0,
        }
    }

    /// Creates an outpoint from a txid as block explorers display it.
    pub fn from_txid_hex(txid: &str, index: u32) -> Result<OutPoint> {
        Ok(OutPoint::new(hash_from_reversed_hex(txid)?, index))
    }

    /// Creates a "null" `OutPoint`, as used by coinbase inputs.
    pub fn null() -> OutPoint {
        OutPoint {
            hash: [0u8; 32],
            index: u32::MAX,
            tree: 0,
        }
    }

    /// The referenced txid in display order
    pub fn txid(&self) -> String {
        reversed_hex(&self.hash)
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid(), self.index)
    }
}

impl Encodable for OutPoint {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        let len = self.hash.consensus_encode(w)?;
        Ok(len + self.index.consensus_encode(w)?)
    }
}

/// Bitcoin transaction input.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Default)]
pub struct TxIn {
    /// The reference to the previous output that is being used as an input.
    pub previous_output: OutPoint,
    /// The script which pushes values on the stack which will cause
    /// the referenced output's script to be accepted.
    pub script_sig: Script,
    /// The sequence number, which suggests to miners which of two
    /// conflicting transactions should be preferred, or 0xFFFFFFFF
    /// to ignore this feature.
    pub sequence: u32,
    /// Witness stack, empty for non-segwit inputs
    pub witness: Vec<Vec<u8>>,
}

impl Encodable for TxIn {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        let mut len = self.previous_output.consensus_encode(w)?;
        len += self.script_sig.consensus_encode(w)?;
        len += self.sequence.consensus_encode(w)?;
        Ok(len)
    }
}

/// Bitcoin transaction output.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct TxOut {
    /// The value of the output, in satoshis.
    pub value: u64,
    /// The script which must be satisfied for the output to be spent.
    pub script_pubkey: Script,
}

impl Encodable for TxOut {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        let len = self.value.consensus_encode(w)?;
        Ok(len + self.script_pubkey.consensus_encode(w)?)
    }
}

/// A Bitcoin-format transaction
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Transaction {
    /// The protocol version, 1 or 2.
    pub version: i32,
    /// Block number before which this transaction is valid, or 0 for valid immediately.
    pub lock_time: u32,
    /// List of transaction inputs.
    pub input: Vec<TxIn>,
    /// List of transaction outputs.
    pub output: Vec<TxOut>,
}

impl Transaction {
    /// Whether any input carries witness data
    pub fn has_witness(&self) -> bool {
        self.input.iter().any(|input| !input.witness.is_empty())
    }

    /// Encoding without marker, flag and witnesses
    pub fn serialize_legacy(&self) -> Vec<u8> {
        serialize(&Legacy(self))
    }

    fn encode_legacy<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        let mut len = self.version.consensus_encode(w)?;
        len += encode_list(&self.input, w)?;
        len += encode_list(&self.output, w)?;
        len += self.lock_time.consensus_encode(w)?;
        Ok(len)
    }

    /// The transaction id in byte order: double SHA-256 of the legacy encoding
    pub fn txid(&self) -> [u8; 32] {
        sha256d::Hash::hash(&self.serialize_legacy()).to_byte_array()
    }

    /// The transaction id as block explorers display it
    pub fn txid_hex(&self) -> String {
        reversed_hex(&self.txid())
    }

    /// Full encoding, with segwit marker and flag when any input has a witness
    pub fn serialize(&self) -> Vec<u8> {
        serialize(self)
    }
}

/// Encodes a transaction without its witnesses
struct Legacy<'a>(&'a Transaction);

impl Encodable for Legacy<'_> {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        self.0.encode_legacy(w)
    }
}

impl Encodable for Transaction {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        if !self.has_witness() {
            return self.encode_legacy(w);
        }
        let mut len = self.version.consensus_encode(w)?;
        // segwit marker and flag
        len += 0u8.consensus_encode(w)?;
        len += 1u8.consensus_encode(w)?;
        len += encode_list(&self.input, w)?;
        len += encode_list(&self.output, w)?;
        for input in &self.input {
            len += VarInt::from(input.witness.len()).consensus_encode(w)?;
            for item in &input.witness {
                len += encode_bytes(item, w)?;
            }
        }
        len += self.lock_time.consensus_encode(w)?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction {
            version: 1,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::from_txid_hex(
                    "9f96ade4b41d5433f4eda31e1738ec2b36f6e7d1420d94a6af99801a88f7f7ff",
                    0,
                )
                .unwrap(),
                script_sig: Script::new(),
                sequence: SEQUENCE_FINAL,
                witness: vec![],
            }],
            output: vec![TxOut {
                value: 1,
                script_pubkey: Script::from_hex("0014769bdff96a02f9135a1d19b749db6a78fe07dc90").unwrap(),
            }],
        }
    }

    #[test]
    fn test_outpoint_txid_is_reversed() {
        let outpoint = sample().input[0].previous_output;
        assert_eq!(
            hex::encode(outpoint.hash),
            "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f"
        );
        assert_eq!(
            outpoint.to_string(),
            "9f96ade4b41d5433f4eda31e1738ec2b36f6e7d1420d94a6af99801a88f7f7ff:0"
        );
        assert!(OutPoint::from_txid_hex("00", 0).is_err());

        let json = serde_json::to_value(outpoint).unwrap();
        assert_eq!(json["txid"], outpoint.txid());
        assert_eq!(serde_json::from_value::<OutPoint>(json).unwrap(), outpoint);
    }

    #[test]
    fn test_legacy_encoding() {
        let tx = sample();
        let hex = hex::encode(tx.serialize());
        assert_eq!(
            hex,
            concat!(
                "01000000",
                "01",
                "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f",
                "00000000",
                "00",
                "ffffffff",
                "01",
                "0100000000000000",
                "16",
                "0014769bdff96a02f9135a1d19b749db6a78fe07dc90",
                "00000000"
            )
        );
        assert_eq!(tx.serialize(), tx.serialize_legacy());
    }

    #[test]
    fn test_witness_encoding_and_txid() {
        let mut tx = sample();
        let txid = tx.txid();
        tx.input[0].witness = vec![vec![0xaa], vec![]];
        let encoded = tx.serialize();
        assert_eq!(&encoded[4..6], &[0x00, 0x01]);
        // witness: 2 items, [aa], []
        assert_eq!(&encoded[encoded.len() - 8..encoded.len() - 4], &[0x02, 0x01, 0xaa, 0x00]);
        // witnesses do not change the txid
        assert_eq!(tx.txid(), txid);
        assert_eq!(tx.txid_hex().len(), 64);
    }
}
