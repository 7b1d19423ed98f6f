// SPDX-License-Identifier: CC0-1.0

//! Decred transactions.
//!
//! A Decred transaction is serialized as a prefix (outpoints, sequences,
//! outputs, lock time, expiry) followed by a witness (input values and
//! signature scripts). The transaction id is the BLAKE-256 hash of the prefix
//! alone, so signatures do not change it.

use std::io;

use wallet_core_hashes::blake256;

use crate::encode::{Encodable, VarInt, serialize};
use crate::script::Script;
use crate::transaction::sighash::{BASE_NONE, BASE_SINGLE, Error, split_raw};
use crate::transaction::{OutPoint, reversed_hex};

/// Serialization type carried in the upper half of the version word
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SerializeType {
    Full = 0,
    NoWitness = 1,
    OnlyWitness = 2,
    WitnessSigning = 3,
}

/// Block index marking an input whose origin is not yet in a block
pub const NO_BLOCK_INDEX: u32 = 0xffff_ffff;

/// A Decred transaction input.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TxIn {
    /// Outpoint, including its tree
    pub previous_output: OutPoint,
    pub sequence: u32,
    /// Amount of the spent output
    pub value_in: u64,
    pub block_height: u32,
    pub block_index: u32,
    pub signature_script: Script,
}

impl TxIn {
    /// Unsigned input spending `previous_output` worth `value_in`
    pub fn new(previous_output: OutPoint, value_in: u64, sequence: u32) -> Self {
        TxIn {
            previous_output,
            sequence,
            value_in,
            block_height: 0,
            block_index: NO_BLOCK_INDEX,
            signature_script: Script::new(),
        }
    }

    fn encode_prefix<W: io::Write + ?Sized>(
        &self,
        sequence: u32,
        w: &mut W,
    ) -> Result<usize, io::Error> {
        let mut len = self.previous_output.hash.consensus_encode(w)?;
        len += self.previous_output.index.consensus_encode(w)?;
        len += self.previous_output.tree.consensus_encode(w)?;
        len += sequence.consensus_encode(w)?;
        Ok(len)
    }

    fn encode_witness<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = self.value_in.consensus_encode(w)?;
        len += self.block_height.consensus_encode(w)?;
        len += self.block_index.consensus_encode(w)?;
        len += self.signature_script.consensus_encode(w)?;
        Ok(len)
    }
}

/// A Decred transaction output.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Default)]
pub struct TxOut {
    pub value: u64,
    /// Script version, always 0 for standard scripts
    pub version: u16,
    pub script_pubkey: Script,
}

impl Encodable for TxOut {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = self.value.consensus_encode(w)?;
        len += self.version.consensus_encode(w)?;
        len += self.script_pubkey.consensus_encode(w)?;
        Ok(len)
    }
}

/// A Decred transaction.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Transaction {
    pub version: u16,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
    pub lock_time: u32,
    /// Last block height the transaction can be mined at, 0 to disable
    pub expiry: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction {
            version: 1,
            input: vec![],
            output: vec![],
            lock_time: 0,
            expiry: 0,
        }
    }
}

fn version_word(version: u16, serialize_type: SerializeType) -> u32 {
    version as u32 | ((serialize_type as u32) << 16)
}

/// Prefix encoding of `inputs` and `outputs`, with per-input sequences
fn encode_prefix<W: io::Write + ?Sized>(
    inputs: &[(&TxIn, u32)],
    outputs: &[TxOut],
    lock_time: u32,
    expiry: u32,
    w: &mut W,
) -> Result<usize, io::Error> {
    let mut len = VarInt::from(inputs.len()).consensus_encode(w)?;
    for (input, sequence) in inputs {
        len += input.encode_prefix(*sequence, w)?;
    }
    len += VarInt::from(outputs.len()).consensus_encode(w)?;
    for output in outputs {
        len += output.consensus_encode(w)?;
    }
    len += lock_time.consensus_encode(w)?;
    len += expiry.consensus_encode(w)?;
    Ok(len)
}

/// Borrowing encoder for the prefix hashed into the sighash and txid
struct Prefix<'a> {
    version: u32,
    inputs: Vec<(&'a TxIn, u32)>,
    outputs: Vec<TxOut>,
    lock_time: u32,
    expiry: u32,
}

impl Encodable for Prefix<'_> {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let len = self.version.consensus_encode(w)?;
        Ok(len + encode_prefix(&self.inputs, &self.outputs, self.lock_time, self.expiry, w)?)
    }
}

impl Transaction {
    fn prefix(&self) -> Prefix<'_> {
        Prefix {
            version: version_word(self.version, SerializeType::NoWitness),
            inputs: self.input.iter().map(|input| (input, input.sequence)).collect(),
            outputs: self.output.clone(),
            lock_time: self.lock_time,
            expiry: self.expiry,
        }
    }

    /// Full serialization: prefix followed by witness
    pub fn serialize(&self) -> Vec<u8> {
        serialize(self)
    }

    /// BLAKE-256 of the no-witness serialization, in byte order
    pub fn txid(&self) -> [u8; 32] {
        blake256::Hash::hash(&serialize(&self.prefix())).to_byte_array()
    }

    /// The transaction id as block explorers display it
    pub fn txid_hex(&self) -> String {
        reversed_hex(&self.txid())
    }

    /// Signature hash of input `index` spending an output locked by `script`.
    ///
    /// Commits to a prefix reduced according to `sighash_type` and to a
    /// witness holding `script` for the signed input and empty scripts for
    /// the others.
    pub fn signature_hash(
        &self,
        script: &Script,
        index: usize,
        sighash_type: u32,
    ) -> Result<[u8; 32], Error> {
        if index >= self.input.len() {
            return Err(Error::IndexOutOfInputsBounds {
                index,
                inputs_size: self.input.len(),
            });
        }
        let (base, anyone_can_pay) = split_raw(sighash_type);
        if base == BASE_SINGLE && index >= self.output.len() {
            return Err(Error::SingleWithoutCorrespondingOutput {
                index,
                outputs_size: self.output.len(),
            });
        }

        let (signed, sign_index): (Vec<&TxIn>, usize) = if anyone_can_pay {
            (vec![&self.input[index]], 0)
        } else {
            (self.input.iter().collect(), index)
        };
        let zero_other_sequences = base == BASE_NONE || base == BASE_SINGLE;
        let inputs = signed
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let sequence = if zero_other_sequences && i != sign_index {
                    0
                } else {
                    input.sequence
                };
                (*input, sequence)
            })
            .collect();
        let outputs = match base {
            BASE_NONE => vec![],
            BASE_SINGLE => self.output[..=index]
                .iter()
                .enumerate()
                .map(|(i, output)| {
                    if i == index {
                        output.clone()
                    } else {
                        TxOut {
                            value: u64::MAX,
                            version: output.version,
                            script_pubkey: Script::new(),
                        }
                    }
                })
                .collect(),
            _ => self.output.clone(),
        };
        let prefix = Prefix {
            version: version_word(self.version, SerializeType::NoWitness),
            inputs,
            outputs,
            lock_time: self.lock_time,
            expiry: self.expiry,
        };
        let prefix_hash = blake256::Hash::hash(&serialize(&prefix));

        let mut witness = Vec::new();
        witness.extend_from_slice(
            &version_word(self.version, SerializeType::WitnessSigning).to_le_bytes(),
        );
        witness.extend(serialize(&VarInt::from(signed.len())));
        for i in 0..signed.len() {
            if i == sign_index {
                witness.extend(serialize(script));
            } else {
                witness.push(0);
            }
        }
        let witness_hash = blake256::Hash::hash(&witness);

        let mut preimage = Vec::with_capacity(68);
        preimage.extend_from_slice(&sighash_type.to_le_bytes());
        preimage.extend_from_slice(prefix_hash.as_byte_array());
        preimage.extend_from_slice(witness_hash.as_byte_array());
        Ok(blake256::Hash::hash(&preimage).to_byte_array())
    }
}

impl Encodable for Transaction {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = version_word(self.version, SerializeType::Full).consensus_encode(w)?;
        let inputs: Vec<_> = self.input.iter().map(|input| (input, input.sequence)).collect();
        len += encode_prefix(&inputs, &self.output, self.lock_time, self.expiry, w)?;
        len += VarInt::from(self.input.len()).consensus_encode(w)?;
        for input in &self.input {
            len += input.encode_witness(w)?;
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::SEQUENCE_FINAL;

    fn origin() -> Transaction {
        let mut tx = Transaction::default();
        let mut coinbase = TxIn::new(OutPoint::null(), 100_000_000, SEQUENCE_FINAL);
        coinbase.signature_script = Script::from_bytes(vec![0x00, 0x00]);
        tx.input.push(coinbase);
        tx.output.push(TxOut {
            value: 100_000_000,
            version: 0,
            script_pubkey: Script::from_hex("76a914f5eba6730a4052ba3a5b9afb36a04d6d05e0d80b88ac")
                .unwrap(),
        });
        tx
    }

    #[test]
    fn test_prefix_hash_ignores_witness() {
        let mut tx = origin();
        let txid = tx.txid();
        tx.input[0].signature_script = Script::new();
        tx.input[0].value_in = 1;
        assert_eq!(tx.txid(), txid);
        assert_eq!(tx.txid_hex(), reversed_hex(&txid));
    }

    #[test]
    fn test_full_encoding() {
        let tx = origin();
        let expected = concat!(
            "01000000",
            "01",
            "0000000000000000000000000000000000000000000000000000000000000000",
            "ffffffff",
            "00",
            "ffffffff",
            "01",
            "00e1f50500000000",
            "0000",
            "19",
            "76a914f5eba6730a4052ba3a5b9afb36a04d6d05e0d80b88ac",
            "00000000",
            "00000000",
            "01",
            "00e1f50500000000",
            "00000000",
            "ffffffff",
            "02",
            "0000"
        );
        assert_eq!(hex::encode(tx.serialize()), expected);
    }

    #[test]
    fn test_signature_hash_rules() {
        let mut tx = origin();
        tx.input.push(TxIn::new(OutPoint::new([1u8; 32], 0), 5, 7));
        let script = tx.output[0].script_pubkey.clone();

        let all = tx.signature_hash(&script, 0, 0x01).unwrap();
        let all_acp = tx.signature_hash(&script, 0, 0x81).unwrap();
        let none = tx.signature_hash(&script, 0, 0x02).unwrap();
        assert_ne!(all, all_acp);
        assert_ne!(all, none);

        // ACP ignores the other inputs entirely
        let mut other = tx.clone();
        other.input[1].sequence = 9;
        assert_eq!(other.signature_hash(&script, 0, 0x81).unwrap(), all_acp);
        assert_ne!(other.signature_hash(&script, 0, 0x01).unwrap(), all);
        // NONE zeroes the other sequences
        assert_eq!(other.signature_hash(&script, 0, 0x02).unwrap(), none);

        assert_eq!(
            tx.signature_hash(&script, 1, 0x03),
            Err(Error::SingleWithoutCorrespondingOutput {
                index: 1,
                outputs_size: 1,
            })
        );
        assert_eq!(
            tx.signature_hash(&script, 2, 0x01),
            Err(Error::IndexOutOfInputsBounds {
                index: 2,
                inputs_size: 2,
            })
        );
    }
}
