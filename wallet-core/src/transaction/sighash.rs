// SPDX-License-Identifier: CC0-1.0

//! Signature hash implementation (used in transaction signing).
//!
//! Computes the message to be signed for Bitcoin-format inputs: the legacy
//! algorithm for P2PKH and P2PK outputs, and the BIP143 algorithm for segwit v0
//! outputs. Computing these hashes is as simple as creating [`SighashCache`]
//! and calling its methods.

use core::borrow::Borrow;
use core::{fmt, str};

use bitcoin_hashes::{Hash, hash_newtype, sha256d};

use crate::encode::serialize;
use crate::script::Script;
use crate::transaction::{Transaction, TxIn, TxOut, encode_all};

/// Used for signature hash for invalid use of SIGHASH_SINGLE.
#[rustfmt::skip]
pub(crate) const UINT256_ONE: [u8; 32] = [
    1, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0
];

/// The ANYONECANPAY bit of a raw sighash type
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask selecting the base type (ALL, NONE or SINGLE) of a raw sighash type
pub const SIGHASH_BASE_MASK: u32 = 0x1f;

hash_newtype! {
    /// Hash of a transaction according to the legacy signature algorithm.
    #[hash_newtype(forward)]
    pub struct LegacySighash(sha256d::Hash);

    /// Hash of a transaction according to the segwit version 0 signature algorithm.
    #[hash_newtype(forward)]
    pub struct SegwitV0Sighash(sha256d::Hash);
}

/// Efficiently calculates signature hash message.
#[derive(Debug)]
pub struct SighashCache<T: Borrow<Transaction>> {
    /// Access to transaction required for transaction introspection.
    tx: T,
    /// BIP143 midstates, computed on first segwit use.
    segwit: Option<SegwitCache>,
}

#[derive(Debug, Clone, Copy)]
struct SegwitCache {
    prevouts: [u8; 32],
    sequences: [u8; 32],
    outputs: [u8; 32],
}

/// Possible errors in computing the signature message.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Requested index is greater or equal than the number of inputs in the transaction.
    IndexOutOfInputsBounds {
        /// Requested index.
        index: usize,
        /// Number of transaction inputs.
        inputs_size: usize,
    },

    /// Using `SIGHASH_SINGLE` without a "corresponding output" (an output with the same index as
    /// the input being verified) where the algorithm has no fallback hash.
    SingleWithoutCorrespondingOutput {
        /// Requested index.
        index: usize,
        /// Number of transaction outputs.
        outputs_size: usize,
    },

    /// Invalid Sighash type.
    InvalidSighashType(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            IndexOutOfInputsBounds {
                index,
                inputs_size,
            } => write!(
                f,
                "Requested index ({}) is greater or equal than the number of transaction inputs ({})",
                index, inputs_size
            ),
            SingleWithoutCorrespondingOutput {
                index,
                outputs_size,
            } => write!(
                f,
                "SIGHASH_SINGLE for input ({}) haven't a corresponding output (#outputs:{})",
                index, outputs_size
            ),
            InvalidSighashType(hash_ty) => {
                write!(f, "Invalid signature hash type: {}", hash_ty)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Hashtype of an input's signature, encoded in the last byte of the signature.
///
/// Fixed values so they can be cast as integer types for encoding.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum EcdsaSighashType {
    /// 0x1: Sign all outputs.
    All = 0x01,
    /// 0x2: Sign no outputs --- anyone can choose the destination.
    None = 0x02,
    /// 0x3: Sign the output whose index matches this input's index. If none exists,
    /// sign the hash `0000000000000000000000000000000000000000000000000000000000000001`.
    Single = 0x03,
    /// 0x81: Sign all outputs but only this input.
    AllPlusAnyoneCanPay = 0x81,
    /// 0x82: Sign no outputs and only this input.
    NonePlusAnyoneCanPay = 0x82,
    /// 0x83: Sign one output and only this input (see `Single` for what "one output" means).
    SinglePlusAnyoneCanPay = 0x83,
}

impl fmt::Display for EcdsaSighashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EcdsaSighashType::*;

        let s = match self {
            All => "SIGHASH_ALL",
            None => "SIGHASH_NONE",
            Single => "SIGHASH_SINGLE",
            AllPlusAnyoneCanPay => "SIGHASH_ALL|SIGHASH_ANYONECANPAY",
            NonePlusAnyoneCanPay => "SIGHASH_NONE|SIGHASH_ANYONECANPAY",
            SinglePlusAnyoneCanPay => "SIGHASH_SINGLE|SIGHASH_ANYONECANPAY",
        };
        f.write_str(s)
    }
}

impl str::FromStr for EcdsaSighashType {
    type Err = SighashTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use EcdsaSighashType::*;

        match s {
            "SIGHASH_ALL" => Ok(All),
            "SIGHASH_NONE" => Ok(None),
            "SIGHASH_SINGLE" => Ok(Single),
            "SIGHASH_ALL|SIGHASH_ANYONECANPAY" => Ok(AllPlusAnyoneCanPay),
            "SIGHASH_NONE|SIGHASH_ANYONECANPAY" => Ok(NonePlusAnyoneCanPay),
            "SIGHASH_SINGLE|SIGHASH_ANYONECANPAY" => Ok(SinglePlusAnyoneCanPay),
            _ => Err(SighashTypeParseError {
                unrecognized: s.to_owned(),
            }),
        }
    }
}

impl EcdsaSighashType {
    /// Splits the sighash flag into the "real" sighash flag and the ANYONECANPAY boolean.
    pub(crate) fn split_anyonecanpay_flag(self) -> (EcdsaSighashType, bool) {
        use EcdsaSighashType::*;

        match self {
            All => (All, false),
            None => (None, false),
            Single => (Single, false),
            AllPlusAnyoneCanPay => (All, true),
            NonePlusAnyoneCanPay => (None, true),
            SinglePlusAnyoneCanPay => (Single, true),
        }
    }

    /// Creates a [`EcdsaSighashType`] from a raw `u32`.
    ///
    /// **Note**: this replicates consensus behaviour, for current standardness rules correctness
    /// you probably want [`Self::from_standard`].
    pub fn from_consensus(n: u32) -> EcdsaSighashType {
        use EcdsaSighashType::*;

        // Match on the ACP-masked base types too, so re-activate ACP in the mask.
        let mask = SIGHASH_BASE_MASK | SIGHASH_ANYONECANPAY;
        match n & mask {
            0x01 => All,
            0x02 => None,
            0x03 => Single,
            0x81 => AllPlusAnyoneCanPay,
            0x82 => NonePlusAnyoneCanPay,
            0x83 => SinglePlusAnyoneCanPay,
            x if x & SIGHASH_ANYONECANPAY == SIGHASH_ANYONECANPAY => AllPlusAnyoneCanPay,
            _ => All,
        }
    }

    /// Creates a [`EcdsaSighashType`] from a raw `u32`.
    ///
    /// # Errors
    ///
    /// If `n` is a non-standard sighash value.
    pub fn from_standard(n: u32) -> Result<EcdsaSighashType, Error> {
        use EcdsaSighashType::*;

        match n {
            0x01 => Ok(All),
            0x02 => Ok(None),
            0x03 => Ok(Single),
            0x81 => Ok(AllPlusAnyoneCanPay),
            0x82 => Ok(NonePlusAnyoneCanPay),
            0x83 => Ok(SinglePlusAnyoneCanPay),
            non_standard => Err(Error::InvalidSighashType(non_standard)),
        }
    }

    /// Converts [`EcdsaSighashType`] to a `u32` sighash flag.
    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

/// Error returned for failure during parsing one of the sighash types.
#[derive(Debug, Clone)]
pub struct SighashTypeParseError {
    /// The unrecognized string we attempted to parse.
    pub unrecognized: String,
}

impl fmt::Display for SighashTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unrecognized SIGHASH string '{}'", self.unrecognized)
    }
}

impl std::error::Error for SighashTypeParseError {}

/// `(base type, anyone can pay)` of a raw sighash value, for the segwit-style algorithms
pub(crate) fn split_raw(sighash_type: u32) -> (u32, bool) {
    (sighash_type & SIGHASH_BASE_MASK, sighash_type & SIGHASH_ANYONECANPAY != 0)
}

pub(crate) const BASE_NONE: u32 = EcdsaSighashType::None as u32;
pub(crate) const BASE_SINGLE: u32 = EcdsaSighashType::Single as u32;

impl<R: Borrow<Transaction>> SighashCache<R> {
    /// Constructs a new `SighashCache` from an unsigned transaction.
    ///
    /// The sighash components are computed in a lazy manner when required. For the generated
    /// sighashes to be valid, no fields in the transaction may change except for script_sig
    /// and witness.
    pub fn new(tx: R) -> Self {
        SighashCache {
            tx,
            segwit: Option::None,
        }
    }

    /// Returns the reference to the cached transaction.
    pub fn transaction(&self) -> &Transaction {
        self.tx.borrow()
    }

    /// Destroys the cache and recovers the stored transaction.
    pub fn into_transaction(self) -> R {
        self.tx
    }

    fn check_index(&self, input_index: usize) -> Result<(), Error> {
        let inputs_size = self.tx.borrow().input.len();
        if input_index >= inputs_size {
            return Err(Error::IndexOutOfInputsBounds {
                index: input_index,
                inputs_size,
            });
        }
        Ok(())
    }

    /// Computes a legacy signature hash for a given input index with a given sighash flag.
    ///
    /// The `sighash_type` supports an arbitrary `u32` value, instead of just [`EcdsaSighashType`],
    /// because internally 4 bytes are being hashed, even though only the lowest byte is appended to
    /// signature in a transaction.
    ///
    /// This function correctly handles the sighash single bug by returning the 'one array'.
    ///
    /// # Warning
    ///
    /// Does not attempt to support OP_CODESEPARATOR.
    pub fn legacy_signature_hash(
        &self,
        input_index: usize,
        script_pubkey: &Script,
        sighash_type: u32,
    ) -> Result<LegacySighash, Error> {
        self.check_index(input_index)?;
        let self_ = self.tx.borrow();
        let (sighash, anyone_can_pay) =
            EcdsaSighashType::from_consensus(sighash_type).split_anyonecanpay_flag();

        if sighash == EcdsaSighashType::Single && input_index >= self_.output.len() {
            return Ok(LegacySighash::from_byte_array(UINT256_ONE));
        }

        // Build tx to sign
        let mut tx = Transaction {
            version: self_.version,
            lock_time: self_.lock_time,
            input: vec![],
            output: vec![],
        };
        // Add all inputs necessary..
        if anyone_can_pay {
            tx.input = vec![TxIn {
                previous_output: self_.input[input_index].previous_output,
                script_sig: script_pubkey.clone(),
                sequence: self_.input[input_index].sequence,
                witness: vec![],
            }];
        } else {
            tx.input = Vec::with_capacity(self_.input.len());
            for (n, input) in self_.input.iter().enumerate() {
                tx.input.push(TxIn {
                    previous_output: input.previous_output,
                    script_sig: if n == input_index {
                        script_pubkey.clone()
                    } else {
                        Script::new()
                    },
                    sequence: if n != input_index
                        && (sighash == EcdsaSighashType::Single
                            || sighash == EcdsaSighashType::None)
                    {
                        0
                    } else {
                        input.sequence
                    },
                    witness: vec![],
                });
            }
        }
        // ..then all outputs
        tx.output = match sighash {
            EcdsaSighashType::Single => self_
                .output
                .iter()
                .take(input_index + 1) // sign all outputs up to and including this one, but erase
                .enumerate() // all of them except for this one
                .map(|(n, out)| {
                    if n == input_index {
                        out.clone()
                    } else {
                        TxOut {
                            value: u64::MAX,
                            script_pubkey: Script::new(),
                        }
                    }
                })
                .collect(),
            EcdsaSighashType::None => vec![],
            _ => self_.output.clone(),
        };

        let mut preimage = tx.serialize_legacy();
        preimage.extend_from_slice(&sighash_type.to_le_bytes());
        Ok(LegacySighash::hash(&preimage))
    }

    fn segwit_cache(&mut self) -> SegwitCache {
        if let Some(cache) = self.segwit {
            return cache;
        }
        let tx = self.tx.borrow();
        let cache = SegwitCache {
            prevouts: sha256d_of(encode_all(tx.input.iter().map(|i| &i.previous_output))),
            sequences: sha256d_of(encode_all(tx.input.iter().map(|i| &i.sequence))),
            outputs: sha256d_of(encode_all(&tx.output)),
        };
        self.segwit = Some(cache);
        cache
    }

    /// Computes the BIP143 signature hash for a segwit v0 input.
    ///
    /// `script_code` is the P2PKH script of the key hash for P2WPKH and
    /// P2SH-P2WPKH inputs, or the witness script for P2WSH inputs. `value` is
    /// the amount of the output being spent.
    pub fn segwit_signature_hash(
        &mut self,
        input_index: usize,
        script_code: &Script,
        value: u64,
        sighash_type: u32,
    ) -> Result<SegwitV0Sighash, Error> {
        self.check_index(input_index)?;
        let cache = self.segwit_cache();
        let tx = self.tx.borrow();
        let (base, anyone_can_pay) = split_raw(sighash_type);

        let zero = [0u8; 32];
        let hash_prevouts = if anyone_can_pay { zero } else { cache.prevouts };
        let hash_sequence = if anyone_can_pay || base == BASE_SINGLE || base == BASE_NONE {
            zero
        } else {
            cache.sequences
        };
        let hash_outputs = if base != BASE_SINGLE && base != BASE_NONE {
            cache.outputs
        } else if base == BASE_SINGLE && input_index < tx.output.len() {
            sha256d_of(serialize(&tx.output[input_index]))
        } else {
            zero
        };

        let input = &tx.input[input_index];
        let mut preimage = Vec::with_capacity(156 + script_code.len());
        preimage.extend_from_slice(&tx.version.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        preimage.extend(serialize(&input.previous_output));
        preimage.extend(serialize(script_code));
        preimage.extend_from_slice(&value.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&hash_outputs);
        preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
        preimage.extend_from_slice(&sighash_type.to_le_bytes());
        Ok(SegwitV0Sighash::hash(&preimage))
    }
}

fn sha256d_of(data: Vec<u8>) -> [u8; 32] {
    sha256d::Hash::hash(&data).to_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::OutPoint;

    #[test]
    fn sighash_single_bug() {
        const SIGHASH_SINGLE: u32 = 3;

        // We need a tx with more inputs than outputs.
        let tx = Transaction {
            version: 1,
            lock_time: 0,
            input: vec![TxIn::default(), TxIn::default()],
            output: vec![TxOut::default()],
        };
        let script = Script::new();
        let cache = SighashCache::new(&tx);

        let got = cache.legacy_signature_hash(1, &script, SIGHASH_SINGLE).expect("sighash");
        let want = LegacySighash::from_byte_array(UINT256_ONE);

        assert_eq!(got, want)
    }

    #[test]
    fn test_sighash_errors() {
        let dumb_tx = Transaction {
            version: 0,
            lock_time: 0,
            input: vec![TxIn::default()],
            output: vec![],
        };
        let mut c = SighashCache::new(&dumb_tx);

        assert_eq!(
            c.legacy_signature_hash(10, &Script::new(), 0u32),
            Err(Error::IndexOutOfInputsBounds {
                index: 10,
                inputs_size: 1,
            })
        );
        assert_eq!(
            c.segwit_signature_hash(1, &Script::new(), 0, 1),
            Err(Error::IndexOutOfInputsBounds {
                index: 1,
                inputs_size: 1,
            })
        );
    }

    #[test]
    fn test_sighash_type_conversions() {
        assert_eq!(EcdsaSighashType::from_consensus(0x01), EcdsaSighashType::All);
        assert_eq!(EcdsaSighashType::from_consensus(0x83), EcdsaSighashType::SinglePlusAnyoneCanPay);
        assert_eq!(EcdsaSighashType::from_consensus(0x84), EcdsaSighashType::AllPlusAnyoneCanPay);
        assert_eq!(EcdsaSighashType::from_consensus(0x00), EcdsaSighashType::All);
        assert_eq!(EcdsaSighashType::from_standard(0x04), Err(Error::InvalidSighashType(4)));
        assert_eq!(EcdsaSighashType::SinglePlusAnyoneCanPay.to_u32(), 0x83);

        for ty in [
            EcdsaSighashType::All,
            EcdsaSighashType::None,
            EcdsaSighashType::Single,
            EcdsaSighashType::AllPlusAnyoneCanPay,
            EcdsaSighashType::NonePlusAnyoneCanPay,
            EcdsaSighashType::SinglePlusAnyoneCanPay,
        ] {
            assert_eq!(ty.to_string().parse::<EcdsaSighashType>().unwrap(), ty);
        }
        assert!("SigHash_ALL".parse::<EcdsaSighashType>().is_err());
    }

    // BIP143 native P2WPKH example
    #[test]
    fn test_bip143_native_p2wpkh() {
        let tx = Transaction {
            version: 1,
            lock_time: 0x11,
            input: vec![
                TxIn {
                    previous_output: OutPoint::new(
                        hex::decode("fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f")
                            .unwrap()
                            .try_into()
                            .unwrap(),
                        0,
                    ),
                    script_sig: Script::new(),
                    sequence: 0xffffffee,
                    witness: vec![],
                },
                TxIn {
                    previous_output: OutPoint::new(
                        hex::decode("ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a")
                            .unwrap()
                            .try_into()
                            .unwrap(),
                        1,
                    ),
                    script_sig: Script::new(),
                    sequence: 0xffffffff,
                    witness: vec![],
                },
            ],
            output: vec![
                TxOut {
                    value: 112340000,
                    script_pubkey: Script::from_hex(
                        "76a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac",
                    )
                    .unwrap(),
                },
                TxOut {
                    value: 223450000,
                    script_pubkey: Script::from_hex(
                        "76a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac",
                    )
                    .unwrap(),
                },
            ],
        };

        assert_eq!(
            hex::encode(sha256d_of(encode_all(tx.input.iter().map(|i| &i.previous_output)))),
            "96b827c8483d4e9b96712b6713a7b68d6e8003a781feba36c31143470b4efd37"
        );
        assert_eq!(
            hex::encode(sha256d_of(encode_all(&tx.output))),
            "863ef3e1a92afbfdb97f31ad0fc7683ee943e9abcf2501590ff8f6551f47e5e5"
        );

        let script_code =
            Script::from_hex("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac").unwrap();
        let mut cache = SighashCache::new(&tx);
        let sighash = cache.segwit_signature_hash(1, &script_code, 600000000, 1).unwrap();
        assert_eq!(
            hex::encode(sighash.to_byte_array()),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
    }
}
