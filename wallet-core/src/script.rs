// SPDX-License-Identifier: CC0-1.0

//! Bitcoin-style scripts.
//!
//! Only the fixed-shape output scripts a wallet creates or spends are built
//! here. Matchers are pure: they return the embedded hash or `None` and never
//! fail.

use core::fmt;
use std::io;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::{Address, Base58Kind};
use crate::encode::{Encodable, encode_bytes};
use crate::error::{Error, Result};

/// Opcodes used by the standard templates.
pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
}

use opcodes::*;

/// Largest OP_RETURN payload relayed by default
pub const MAX_OP_RETURN_LEN: usize = 80;

/// Shape of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    PayToPublicKey,
    PayToPublicKeyHash,
    PayToScriptHash,
    PayToWitnessPublicKeyHash,
    PayToWitnessScriptHash,
    /// Witness program of version 1 or higher
    WitnessProgram,
    OpReturn,
    NonStandard,
}

impl ScriptType {
    fn classify(bytes: &[u8]) -> ScriptType {
        match bytes {
            [OP_DUP, OP_HASH160, 0x14, .., OP_EQUALVERIFY, OP_CHECKSIG] if bytes.len() == 25 => {
                ScriptType::PayToPublicKeyHash
            }
            [OP_HASH160, 0x14, .., OP_EQUAL] if bytes.len() == 23 => ScriptType::PayToScriptHash,
            [OP_0, 0x14, ..] if bytes.len() == 22 => ScriptType::PayToWitnessPublicKeyHash,
            [OP_0, 0x20, ..] if bytes.len() == 34 => ScriptType::PayToWitnessScriptHash,
            [0x21, .., OP_CHECKSIG] if bytes.len() == 35 => ScriptType::PayToPublicKey,
            [0x41, .., OP_CHECKSIG] if bytes.len() == 67 => ScriptType::PayToPublicKey,
            [OP_RETURN, ..] => ScriptType::OpReturn,
            _ if witness_program(bytes).is_some() => ScriptType::WitnessProgram,
            _ => ScriptType::NonStandard,
        }
    }
}

/// `(version, program)` when `bytes` is a witness program
fn witness_program(bytes: &[u8]) -> Option<(u8, &[u8])> {
    if bytes.len() < 4 || bytes.len() > 42 {
        return None;
    }
    let version = match bytes[0] {
        OP_0 => 0,
        op @ OP_1..=OP_16 => op - OP_1 + 1,
        _ => return None,
    };
    let len = bytes[1] as usize;
    if len + 2 != bytes.len() {
        return None;
    }
    Some((version, &bytes[2..]))
}

/// Appends a minimal push of `data`
fn push_slice(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// A script and its classification
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Script {
    bytes: Vec<u8>,
    script_type: Option<ScriptType>,
}

impl Script {
    /// Empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps raw script bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let script_type = if bytes.is_empty() {
            None
        } else {
            Some(ScriptType::classify(&bytes))
        };
        Self {
            bytes,
            script_type,
        }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s).map_err(|e| Error::InvalidParameter(format!("Invalid script hex: {}", e)))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Script consisting of one push per item, as used by script signatures
    pub fn from_pushes(items: &[&[u8]]) -> Self {
        let mut bytes = Vec::new();
        for item in items {
            push_slice(&mut bytes, item);
        }
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Classification, `None` for the empty script
    pub fn script_type(&self) -> Option<ScriptType> {
        self.script_type
    }

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn build_pay_to_public_key_hash(hash: &[u8; 20]) -> Self {
        let mut bytes = Vec::with_capacity(25);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
        bytes.extend_from_slice(hash);
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self::from_bytes(bytes)
    }

    /// `OP_HASH160 <hash> OP_EQUAL`
    pub fn build_pay_to_script_hash(hash: &[u8; 20]) -> Self {
        let mut bytes = Vec::with_capacity(23);
        bytes.extend_from_slice(&[OP_HASH160, 0x14]);
        bytes.extend_from_slice(hash);
        bytes.push(OP_EQUAL);
        Self::from_bytes(bytes)
    }

    /// `OP_0 <20-byte key hash>`
    pub fn build_pay_to_witness_pubkey_hash(hash: &[u8; 20]) -> Self {
        let mut bytes = Vec::with_capacity(22);
        bytes.extend_from_slice(&[OP_0, 0x14]);
        bytes.extend_from_slice(hash);
        Self::from_bytes(bytes)
    }

    /// `OP_0 <32-byte script hash>`
    pub fn build_pay_to_witness_script_hash(hash: &[u8; 32]) -> Self {
        let mut bytes = Vec::with_capacity(34);
        bytes.extend_from_slice(&[OP_0, 0x20]);
        bytes.extend_from_slice(hash);
        Self::from_bytes(bytes)
    }

    /// `<pubkey> OP_CHECKSIG`
    pub fn build_pay_to_public_key(public_key: &[u8]) -> Result<Self> {
        if public_key.len() != 33 && public_key.len() != 65 {
            return Err(Error::InvalidParameter(format!(
                "Invalid public key length {} for pay-to-public-key",
                public_key.len()
            )));
        }
        let mut bytes = Vec::with_capacity(public_key.len() + 2);
        push_slice(&mut bytes, public_key);
        bytes.push(OP_CHECKSIG);
        Ok(Self::from_bytes(bytes))
    }

    /// Witness program of any version, e.g. taproot outputs
    pub fn build_pay_to_witness_program(version: u8, program: &[u8]) -> Result<Self> {
        if version > 16 {
            return Err(Error::InvalidParameter(format!("Invalid witness version {}", version)));
        }
        if program.len() < 2 || program.len() > 40 {
            return Err(Error::InvalidParameter(format!(
                "Invalid witness program length {}",
                program.len()
            )));
        }
        if version == 0 && program.len() != 20 && program.len() != 32 {
            return Err(Error::InvalidParameter(format!(
                "Invalid v0 witness program length {}",
                program.len()
            )));
        }
        let mut bytes = Vec::with_capacity(program.len() + 2);
        bytes.push(if version == 0 {
            OP_0
        } else {
            OP_1 + version - 1
        });
        bytes.push(program.len() as u8);
        bytes.extend_from_slice(program);
        Ok(Self::from_bytes(bytes))
    }

    /// `OP_RETURN <data>`
    pub fn build_op_return(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_OP_RETURN_LEN {
            return Err(Error::InvalidParameter(format!(
                "OP_RETURN data too long: {} bytes",
                data.len()
            )));
        }
        let mut bytes = vec![OP_RETURN];
        push_slice(&mut bytes, data);
        Ok(Self::from_bytes(bytes))
    }

    /// Locking script paying to `address`
    pub fn build_for_address(address: &Address) -> Result<Self> {
        match address {
            Address::Base58 {
                kind: Base58Kind::PubkeyHash,
                hash,
                ..
            } => Ok(Self::build_pay_to_public_key_hash(hash)),
            Address::Base58 {
                kind: Base58Kind::ScriptHash,
                hash,
                ..
            } => Ok(Self::build_pay_to_script_hash(hash)),
            Address::Segwit {
                version,
                program,
                ..
            } => Self::build_pay_to_witness_program(*version, program),
            other => Err(Error::InvalidAddress(format!("{} has no output script", other))),
        }
    }

    pub fn match_pay_to_public_key_hash(&self) -> Option<[u8; 20]> {
        (self.script_type == Some(ScriptType::PayToPublicKeyHash)).then(|| hash20(&self.bytes[3..23]))
    }

    pub fn match_pay_to_script_hash(&self) -> Option<[u8; 20]> {
        self.is_pay_to_script_hash().then(|| hash20(&self.bytes[2..22]))
    }

    pub fn match_pay_to_witness_pubkey_hash(&self) -> Option<[u8; 20]> {
        (self.script_type == Some(ScriptType::PayToWitnessPublicKeyHash))
            .then(|| hash20(&self.bytes[2..22]))
    }

    pub fn match_pay_to_witness_script_hash(&self) -> Option<[u8; 32]> {
        self.is_pay_to_witness_script_hash().then(|| {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&self.bytes[2..34]);
            hash
        })
    }

    /// Public key bytes of a pay-to-public-key script
    pub fn match_pay_to_public_key(&self) -> Option<&[u8]> {
        (self.script_type == Some(ScriptType::PayToPublicKey))
            .then(|| &self.bytes[1..self.bytes.len() - 1])
    }

    /// `(version, program)` of a witness program
    pub fn match_witness_program(&self) -> Option<(u8, &[u8])> {
        witness_program(&self.bytes)
    }

    pub fn is_pay_to_script_hash(&self) -> bool {
        self.script_type == Some(ScriptType::PayToScriptHash)
    }

    pub fn is_pay_to_witness_script_hash(&self) -> bool {
        self.script_type == Some(ScriptType::PayToWitnessScriptHash)
    }

    pub fn is_witness_program(&self) -> bool {
        witness_program(&self.bytes).is_some()
    }
}

fn hash20(bytes: &[u8]) -> [u8; 20] {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(bytes);
    hash
}

impl Encodable for Script {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> core::result::Result<usize, io::Error> {
        encode_bytes(&self.bytes, w)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
