// SPDX-License-Identifier: CC0-1.0

//! Zcash Sapling (v4) transparent transactions.
//!
//! Only the transparent part is populated; the shielded spend, output and
//! JoinSplit vectors are always empty. Signature hashes follow ZIP-243 and
//! commit to the consensus branch id.

use std::io;

use bitcoin_hashes::{Hash, sha256d};

use crate::encode::{Encodable, VarInt, encode_list, serialize};
use crate::script::Script;
use crate::transaction::sighash::{BASE_NONE, BASE_SINGLE, Error, split_raw};
use crate::transaction::{TxIn, TxOut, encode_all, reversed_hex};

/// Transaction version 4 with the overwintered bit set
pub const SAPLING_VERSION: u32 = 0x8000_0004;

/// Version group id of Sapling transactions
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;

const PREVOUTS_PERSONALIZATION: &[u8; 16] = b"ZcashPrevoutHash";
const SEQUENCE_PERSONALIZATION: &[u8; 16] = b"ZcashSequencHash";
const OUTPUTS_PERSONALIZATION: &[u8; 16] = b"ZcashOutputsHash";
const SIGHASH_PERSONALIZATION_PREFIX: &[u8; 12] = b"ZcashSigHash";

fn blake2b_256(personal: &[u8], data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new().hash_length(32).personal(personal).hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// A Sapling transaction with transparent inputs and outputs only.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Transaction {
    /// Header: version with the overwintered flag
    pub version: u32,
    pub version_group_id: u32,
    pub lock_time: u32,
    /// Last block height the transaction can be mined at, 0 to disable
    pub expiry_height: u32,
    /// Consensus branch id committed to by the signature hash
    pub branch_id: u32,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
}

impl Transaction {
    /// Empty Sapling transaction for `branch_id`
    pub fn new(branch_id: u32, lock_time: u32, expiry_height: u32) -> Self {
        Transaction {
            version: SAPLING_VERSION,
            version_group_id: SAPLING_VERSION_GROUP_ID,
            lock_time,
            expiry_height,
            branch_id,
            input: vec![],
            output: vec![],
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        serialize(self)
    }

    /// Double SHA-256 of the encoding, in byte order
    pub fn txid(&self) -> [u8; 32] {
        sha256d::Hash::hash(&self.serialize()).to_byte_array()
    }

    /// The transaction id as block explorers display it
    pub fn txid_hex(&self) -> String {
        reversed_hex(&self.txid())
    }

    fn hash_prevouts(&self) -> [u8; 32] {
        let data = encode_all(self.input.iter().map(|i| &i.previous_output));
        blake2b_256(PREVOUTS_PERSONALIZATION, &data)
    }

    fn hash_sequence(&self) -> [u8; 32] {
        let data = encode_all(self.input.iter().map(|i| &i.sequence));
        blake2b_256(SEQUENCE_PERSONALIZATION, &data)
    }

    fn hash_outputs(&self) -> [u8; 32] {
        blake2b_256(OUTPUTS_PERSONALIZATION, &encode_all(&self.output))
    }

    /// ZIP-243 signature hash of a transparent input.
    ///
    /// `sighash_type` is written to the preimage as given; its ANYONECANPAY
    /// bit and low five bits select what is committed to.
    pub fn signature_hash(
        &self,
        input_index: usize,
        script_code: &Script,
        amount: u64,
        sighash_type: u32,
    ) -> Result<[u8; 32], Error> {
        if input_index >= self.input.len() {
            return Err(Error::IndexOutOfInputsBounds {
                index: input_index,
                inputs_size: self.input.len(),
            });
        }
        let (base, anyone_can_pay) = split_raw(sighash_type);
        let zero = [0u8; 32];

        let hash_prevouts = if anyone_can_pay { zero } else { self.hash_prevouts() };
        let hash_sequence = if anyone_can_pay || base == BASE_SINGLE || base == BASE_NONE {
            zero
        } else {
            self.hash_sequence()
        };
        let hash_outputs = if base != BASE_SINGLE && base != BASE_NONE {
            self.hash_outputs()
        } else if base == BASE_SINGLE && input_index < self.output.len() {
            blake2b_256(OUTPUTS_PERSONALIZATION, &serialize(&self.output[input_index]))
        } else {
            zero
        };

        let input = &self.input[input_index];
        let mut preimage = Vec::with_capacity(300 + script_code.len());
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&self.version_group_id.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        preimage.extend_from_slice(&hash_outputs);
        // JoinSplits, shielded spends, shielded outputs
        preimage.extend_from_slice(&zero);
        preimage.extend_from_slice(&zero);
        preimage.extend_from_slice(&zero);
        preimage.extend_from_slice(&self.lock_time.to_le_bytes());
        preimage.extend_from_slice(&self.expiry_height.to_le_bytes());
        // value balance
        preimage.extend_from_slice(&0i64.to_le_bytes());
        preimage.extend_from_slice(&sighash_type.to_le_bytes());
        preimage.extend(serialize(&input.previous_output));
        preimage.extend(serialize(script_code));
        preimage.extend_from_slice(&amount.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());

        let mut personal = [0u8; 16];
        personal[..12].copy_from_slice(SIGHASH_PERSONALIZATION_PREFIX);
        personal[12..].copy_from_slice(&self.branch_id.to_le_bytes());
        Ok(blake2b_256(&personal, &preimage))
    }
}

impl Encodable for Transaction {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = self.version.consensus_encode(w)?;
        len += self.version_group_id.consensus_encode(w)?;
        len += encode_list(&self.input, w)?;
        len += encode_list(&self.output, w)?;
        len += self.lock_time.consensus_encode(w)?;
        len += self.expiry_height.consensus_encode(w)?;
        // value balance
        len += 0i64.consensus_encode(w)?;
        // shielded spends, shielded outputs, JoinSplits
        for _ in 0..3 {
            len += VarInt(0).consensus_encode(w)?;
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::SAPLING_BRANCH_ID;
    use crate::transaction::OutPoint;

    fn hash(s: &str) -> [u8; 32] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    // ZIP-243 test vector 3
    fn vector_3() -> Transaction {
        let mut tx = Transaction::new(SAPLING_BRANCH_ID, 0x0004b029, 0x0004b048);
        tx.input.push(TxIn {
            previous_output: OutPoint::new(
                hash("a8c685478265f4c14dada651969c45a65e1aeb8cd6791f2f5bb6a1d9952104d9"),
                1,
            ),
            script_sig: Script::from_hex(
                "483045022100a61e5d557568c2ddc1d9b03a7173c6ce7c996c4daecab007ac8f34bee01e6b9702204d38fdc0bcf2728a69fde78462a10fb45a9baa27873e6a5fc45fb5c76764202a01210365ffea3efa3908918a8b8627724af852fc9b86d7375b103ab0543cf418bcaa7f",
            )
            .unwrap(),
            sequence: 0xfffffffe,
            witness: vec![],
        });
        tx.output.push(TxOut {
            value: 0x02625a00,
            script_pubkey: Script::from_hex("76a9148132712c3ff19f3a151234616777420a6d7ef22688ac")
                .unwrap(),
        });
        tx.output.push(TxOut {
            value: 0x0098958b,
            script_pubkey: Script::from_hex("76a9145453e4698f02a38abdaa521cd1ff2dee6fac187188ac")
                .unwrap(),
        });
        tx
    }

    fn script_code() -> Script {
        Script::from_hex("76a914507173527b4c3318a2aecd793bf1cfed705950cf88ac").unwrap()
    }

    #[test]
    fn test_zip243_intermediate_hashes() {
        let tx = vector_3();
        assert_eq!(
            hex::encode(tx.hash_prevouts()),
            "fae31b8dec7b0b77e2c8d6b6eb0e7e4e55abc6574c26dd44464d9408a8e33f11"
        );
        assert_eq!(
            hex::encode(tx.hash_sequence()),
            "6c80d37f12d89b6f17ff198723e7db1247c4811d1a695d74d930f99e98418790"
        );
        assert_eq!(
            hex::encode(tx.hash_outputs()),
            "d2b04118469b7810a0d1cc59568320aad25a84f407ecac40b4f605a4e6868454"
        );
        assert_eq!(
            hex::encode(blake2b_256(OUTPUTS_PERSONALIZATION, &serialize(&tx.output[0]))),
            "55986938e432f825904fe288aa4feca1fe7eafa24aecd1bd6a9a739536b50a54"
        );
    }

    #[test]
    fn test_zip243_signature_hashes() {
        let tx = vector_3();
        let amount = 0x02faf080;
        for (ty, expected) in [
            (0x01, "f3148f80dfab5e573d5edfe7a850f5fd39234f80b5429d3a57edcc11e34c585b"),
            (0x80, "f0bde4facddbc11f5e9ed2f5d5038083bec4a61627a2715a5ee9be7fb3152e9b"),
            (0x83, "1e747b6a4a96aa9e7c1d7968221ec916bd30b514f8bca14b6f74d7c11c0742c2"),
        ] {
            let sighash = tx.signature_hash(0, &script_code(), amount, ty).unwrap();
            assert_eq!(hex::encode(sighash), expected, "hash type {:#x}", ty);
        }
        assert_eq!(
            tx.signature_hash(1, &script_code(), amount, 1),
            Err(Error::IndexOutOfInputsBounds {
                index: 1,
                inputs_size: 1,
            })
        );
    }

    #[test]
    fn test_encoding() {
        let tx = vector_3();
        let expected = concat!(
            "0400008085202f89",
            "01",
            "a8c685478265f4c14dada651969c45a65e1aeb8cd6791f2f5bb6a1d9952104d9",
            "01000000",
            "6b",
            "483045022100a61e5d557568c2ddc1d9b03a7173c6ce7c996c4daecab007ac8f34bee01e6b9702204d38fdc0bcf2728a69fde78462a10fb45a9baa27873e6a5fc45fb5c76764202a01210365ffea3efa3908918a8b8627724af852fc9b86d7375b103ab0543cf418bcaa7f",
            "feffffff",
            "02",
            "005a620200000000",
            "1976a9148132712c3ff19f3a151234616777420a6d7ef22688ac",
            "8b95980000000000",
            "1976a9145453e4698f02a38abdaa521cd1ff2dee6fac187188ac",
            "29b00400",
            "48b00400",
            "0000000000000000",
            "000000"
        );
        assert_eq!(hex::encode(tx.serialize()), expected);
        assert_eq!(tx.txid_hex(), {
            let mut id = tx.txid();
            id.reverse();
            hex::encode(id)
        });
    }
}
