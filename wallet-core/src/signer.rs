//! Transaction signing for UTXO chains
//!
//! [`TransactionSigner`] plans the input when no plan is supplied, builds the
//! chain's transaction format, looks up the key controlling every spent
//! output and signs each input. Signing is all or nothing: any failure leaves
//! no encoded transaction behind.

use std::collections::BTreeMap;

use bitcoin_hashes::{Hash, sha256};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::address::Address;
use crate::coin::{Blockchain, CoinDescriptor, KeyHasher};
use crate::error::{Error, Result};
use crate::keys::{Curve, PrivateKey, PublicKey};
use crate::planner::{self, SigningInput, TransactionPlan};
use crate::script::{Script, ScriptType};
use crate::transaction::sighash::{EcdsaSighashType, SighashCache};
use crate::transaction::{self, OutPoint, SEQUENCE_FINAL, TxIn, TxOut, decred, zcash};
use crate::utxo::UnspentOutput;

/// Bitcoin transaction version produced by the signer
pub const TX_VERSION: i32 = 1;

/// Result of a successful signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningOutput {
    /// The signed transaction, in the chain's wire format
    #[serde(with = "crate::utils::hex_bytes")]
    pub encoded: Vec<u8>,
    /// Transaction id as block explorers display it
    pub transaction_id: String,
    /// The plan that was signed
    pub plan: TransactionPlan,
}

impl SigningOutput {
    pub fn encoded_hex(&self) -> String {
        hex::encode(&self.encoded)
    }
}

/// Lifecycle of a [`TransactionSigner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerState {
    Unplanned,
    Planned(TransactionPlan),
    Signed(SigningOutput),
    Failed,
}

/// How the innermost script of a spent output is unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpendKind {
    PayToPublicKey,
    /// Key hash of the compressed (`true`) or uncompressed key
    PayToPublicKeyHash {
        compressed: bool,
    },
    PayToWitnessPublicKeyHash,
}

/// The key controlling one input, and the scripts wrapping its spend
struct InputKey<'a> {
    key: &'a PrivateKey,
    public_key: PublicKey,
    kind: SpendKind,
    /// P2SH redeem script, pushed last by the script sig
    redeem_script: Option<Script>,
    /// P2WSH witness script, last item of the witness
    witness_script: Option<Script>,
}

impl InputKey<'_> {
    /// Public key bytes pushed by the unlocking script
    fn public_key_bytes(&self) -> Vec<u8> {
        match self.kind {
            SpendKind::PayToPublicKeyHash {
                compressed: false,
            } => self.public_key.uncompressed().to_bytes(),
            _ => self.public_key.to_bytes(),
        }
    }

    /// DER signature followed by the sighash byte
    fn signature(&self, digest: &[u8], hash_type: u32) -> Result<Vec<u8>> {
        let mut signature = self.key.sign_der(digest)?;
        signature.push(hash_type as u8);
        Ok(signature)
    }

    fn is_segwit(&self) -> bool {
        self.kind == SpendKind::PayToWitnessPublicKeyHash || self.witness_script.is_some()
    }

    /// Items satisfying the innermost script
    fn unlocking_items(&self, signature: Vec<u8>) -> Vec<Vec<u8>> {
        match self.kind {
            SpendKind::PayToPublicKey => vec![signature],
            _ => vec![signature, self.public_key_bytes()],
        }
    }

    /// Script sig pushing `items`, then the redeem script if any
    fn script_sig(&self, items: &[Vec<u8>]) -> Script {
        let mut pushes: Vec<&[u8]> = items.iter().map(Vec::as_slice).collect();
        if let Some(redeem) = &self.redeem_script {
            pushes.push(redeem.as_bytes());
        }
        Script::from_pushes(&pushes)
    }

    /// Script code committed to by a BIP143 signature hash
    fn segwit_script_code(&self) -> Script {
        match &self.witness_script {
            Some(witness_script) => witness_script.clone(),
            None => Script::build_pay_to_public_key_hash(&self.public_key.hash160()),
        }
    }
}

/// Signs UTXO transactions
#[derive(Debug)]
pub struct TransactionSigner<'a> {
    input: &'a SigningInput,
    state: SignerState,
}

impl<'a> TransactionSigner<'a> {
    /// A signer for `input`; already planned when the input carries a plan
    pub fn new(input: &'a SigningInput) -> Self {
        let state = match &input.plan {
            Some(plan) => SignerState::Planned(plan.clone()),
            None => SignerState::Unplanned,
        };
        Self {
            input,
            state,
        }
    }

    /// Plans and signs `input` in one call
    pub fn sign_input(input: &SigningInput) -> Result<SigningOutput> {
        TransactionSigner::new(input).sign()
    }

    pub fn state(&self) -> &SignerState {
        &self.state
    }

    /// Plans the transaction if not done yet
    pub fn plan(&mut self) -> Result<TransactionPlan> {
        match &self.state {
            SignerState::Unplanned => match planner::plan(self.input) {
                Ok(plan) => {
                    self.state = SignerState::Planned(plan.clone());
                    Ok(plan)
                }
                Err(e) => {
                    self.state = SignerState::Failed;
                    Err(e)
                }
            },
            SignerState::Planned(plan) => Ok(plan.clone()),
            SignerState::Signed(output) => Ok(output.plan.clone()),
            SignerState::Failed => Err(failed()),
        }
    }

    /// Signs the planned transaction.
    ///
    /// # Errors
    ///
    /// Any planning error, [`Error::MissingPrivateKey`] for an input no key
    /// controls, [`Error::InvalidParameter`] for a non-standard hash type.
    pub fn sign(&mut self) -> Result<SigningOutput> {
        if let SignerState::Signed(output) = &self.state {
            return Ok(output.clone());
        }
        let plan = self.plan()?;
        match sign_plan(self.input, plan) {
            Ok(output) => {
                self.state = SignerState::Signed(output.clone());
                Ok(output)
            }
            Err(e) => {
                warn!(coin = %self.input.coin, error = %e, "signing failed");
                self.state = SignerState::Failed;
                Err(e)
            }
        }
    }
}

fn failed() -> Error {
    Error::InvalidParameter("Signer already failed".to_string())
}

fn sign_plan(input: &SigningInput, plan: TransactionPlan) -> Result<SigningOutput> {
    let descriptor = input.coin.descriptor();
    if !descriptor.blockchain.is_utxo() {
        return Err(Error::UnsupportedCoin(format!("{} is not a UTXO coin", input.coin)));
    }
    EcdsaSighashType::from_standard(input.hash_type)?;
    if plan.utxos.is_empty() {
        return Err(Error::InsufficientFunds {
            available: 0,
            required: plan.amount.saturating_add(plan.fee),
        });
    }

    let mut outputs = Vec::with_capacity(plan.outputs.len());
    for output in &plan.outputs {
        let address = Address::from_str_for(input.coin, &output.address)?;
        outputs.push(TxOut {
            value: output.amount,
            script_pubkey: address.script_pubkey()?,
        });
    }
    if !plan.output_op_return.is_empty() {
        outputs.push(TxOut {
            value: 0,
            script_pubkey: Script::build_op_return(&plan.output_op_return)?,
        });
    }
    let keys = find_keys(descriptor, &input.private_keys, &input.scripts, &plan.utxos)?;

    let (encoded, transaction_id) = match descriptor.blockchain {
        Blockchain::Zcash => {
            let branch_id = plan.branch_id.or(descriptor.branch_id).ok_or_else(|| {
                Error::InvalidParameter("Missing consensus branch id".to_string())
            })?;
            let mut tx = zcash::Transaction::new(
                branch_id,
                input.lock_time,
                plan.expiry_height.unwrap_or_default(),
            );
            tx.input = unsigned_inputs(&plan.utxos);
            tx.output = outputs;
            sign_zcash(&mut tx, &plan.utxos, &keys, input.hash_type)?;
            (tx.serialize(), tx.txid_hex())
        }
        Blockchain::Decred => {
            let mut tx = decred::Transaction {
                lock_time: input.lock_time,
                expiry: plan.expiry_height.unwrap_or_default(),
                ..Default::default()
            };
            tx.input = plan
                .utxos
                .iter()
                .map(|u| decred::TxIn::new(u.outpoint, u.amount, u.sequence.unwrap_or(SEQUENCE_FINAL)))
                .collect();
            tx.output = outputs
                .into_iter()
                .map(|o| decred::TxOut {
                    value: o.value,
                    version: 0,
                    script_pubkey: o.script_pubkey,
                })
                .collect();
            sign_decred(&mut tx, &plan.utxos, &keys, input.hash_type)?;
            (tx.serialize(), tx.txid_hex())
        }
        _ => {
            let mut tx = transaction::Transaction {
                version: TX_VERSION,
                lock_time: input.lock_time,
                input: unsigned_inputs(&plan.utxos),
                output: outputs,
            };
            sign_bitcoin(&mut tx, &plan.utxos, &keys, input.hash_type)?;
            (tx.serialize(), tx.txid_hex())
        }
    };

    debug!(
        coin = %input.coin,
        inputs = plan.utxos.len(),
        size = encoded.len(),
        txid = %transaction_id,
        "signed transaction"
    );
    Ok(SigningOutput {
        encoded,
        transaction_id,
        plan,
    })
}

fn unsigned_inputs(utxos: &[UnspentOutput]) -> Vec<TxIn> {
    utxos
        .iter()
        .map(|utxo| TxIn {
            previous_output: utxo.outpoint,
            script_sig: Script::new(),
            sequence: utxo.sequence.unwrap_or(SEQUENCE_FINAL),
            witness: vec![],
        })
        .collect()
}

/// The key for every UTXO, in order
fn find_keys<'k>(
    descriptor: &CoinDescriptor,
    keys: &'k [PrivateKey],
    scripts: &BTreeMap<String, Script>,
    utxos: &[UnspentOutput],
) -> Result<Vec<InputKey<'k>>> {
    let hasher = descriptor.key_hasher();
    utxos
        .iter()
        .enumerate()
        .map(|(index, utxo)| {
            find_key(hasher, keys, scripts, &utxo.script).ok_or_else(|| {
                warn!(index, outpoint = %utxo.outpoint, "no key for input");
                Error::MissingPrivateKey(index)
            })
        })
        .collect()
}

/// Resolves P2SH and P2WSH wrappers through `scripts`, then matches the
/// innermost script against `keys`. A P2SH output without a registered redeem
/// script is tried as P2WPKH nested in P2SH.
fn find_key<'k>(
    hasher: KeyHasher,
    keys: &'k [PrivateKey],
    scripts: &BTreeMap<String, Script>,
    script: &Script,
) -> Option<InputKey<'k>> {
    let mut inner = script.clone();
    let mut redeem_script = None;
    if let Some(hash) = script.match_pay_to_script_hash() {
        let redeem = match scripts.get(&hex::encode(hash)) {
            Some(redeem) => redeem.clone(),
            None => return find_nested_witness_key(hasher, keys, hash),
        };
        if hasher.hash(redeem.as_bytes()) != hash {
            return None;
        }
        inner = redeem.clone();
        redeem_script = Some(redeem);
    }

    let mut witness_script = None;
    if let Some(hash) = inner.match_pay_to_witness_script_hash() {
        let witness = scripts.get(&hex::encode(hash))?;
        if sha256::Hash::hash(witness.as_bytes()).to_byte_array() != hash {
            return None;
        }
        inner = witness.clone();
        witness_script = Some(witness.clone());
    }

    keys.iter().filter(|key| key.curve() == Curve::Secp256k1).find_map(|key| {
        let public_key = key.public_key();
        let kind = match_key(hasher, &public_key, &inner)?;
        if kind == SpendKind::PayToWitnessPublicKeyHash && witness_script.is_some() {
            return None;
        }
        Some(InputKey {
            key,
            public_key,
            kind,
            redeem_script: redeem_script.clone(),
            witness_script: witness_script.clone(),
        })
    })
}

/// P2SH of a P2WPKH redeem script built from one of `keys`
fn find_nested_witness_key<'k>(
    hasher: KeyHasher,
    keys: &'k [PrivateKey],
    script_hash: [u8; 20],
) -> Option<InputKey<'k>> {
    keys.iter().filter(|key| key.curve() == Curve::Secp256k1).find_map(|key| {
        let public_key = key.public_key();
        let redeem = Script::build_pay_to_witness_pubkey_hash(&public_key.hash160());
        (hasher.hash(redeem.as_bytes()) == script_hash).then(|| InputKey {
            key,
            public_key,
            kind: SpendKind::PayToWitnessPublicKeyHash,
            redeem_script: Some(redeem),
            witness_script: None,
        })
    })
}

/// How `public_key` unlocks `script`, if it does
fn match_key(hasher: KeyHasher, public_key: &PublicKey, script: &Script) -> Option<SpendKind> {
    match script.script_type()? {
        ScriptType::PayToPublicKeyHash => {
            let hash = script.match_pay_to_public_key_hash()?;
            if hasher.hash(&public_key.to_bytes()) == hash {
                Some(SpendKind::PayToPublicKeyHash {
                    compressed: true,
                })
            } else if hasher.hash(&public_key.uncompressed().to_bytes()) == hash {
                Some(SpendKind::PayToPublicKeyHash {
                    compressed: false,
                })
            } else {
                None
            }
        }
        ScriptType::PayToPublicKey => {
            let bytes = script.match_pay_to_public_key()?;
            (bytes == public_key.to_bytes().as_slice()
                || bytes == public_key.uncompressed().to_bytes().as_slice())
            .then_some(SpendKind::PayToPublicKey)
        }
        ScriptType::PayToWitnessPublicKeyHash => (script.match_pay_to_witness_pubkey_hash()?
            == public_key.hash160())
        .then_some(SpendKind::PayToWitnessPublicKeyHash),
        _ => None,
    }
}

fn sign_bitcoin(
    tx: &mut transaction::Transaction,
    utxos: &[UnspentOutput],
    keys: &[InputKey<'_>],
    hash_type: u32,
) -> Result<()> {
    let mut script_sigs = Vec::with_capacity(utxos.len());
    let mut witnesses = Vec::with_capacity(utxos.len());
    {
        let mut cache = SighashCache::new(&*tx);
        for (index, (utxo, key)) in utxos.iter().zip(keys).enumerate() {
            trace!(
                index,
                kind = ?key.kind,
                p2sh = key.redeem_script.is_some(),
                p2wsh = key.witness_script.is_some(),
                "signing input"
            );
            let (script_sig, witness) = if key.is_segwit() {
                let script_code = key.segwit_script_code();
                let sighash =
                    cache.segwit_signature_hash(index, &script_code, utxo.amount, hash_type)?;
                let signature = key.signature(sighash.as_byte_array(), hash_type)?;
                let mut witness = key.unlocking_items(signature);
                if let Some(witness_script) = &key.witness_script {
                    witness.push(witness_script.to_bytes());
                }
                (key.script_sig(&[]), witness)
            } else {
                let script_code = legacy_script_code(key, utxo);
                let sighash = cache.legacy_signature_hash(index, script_code, hash_type)?;
                let signature = key.signature(sighash.as_byte_array(), hash_type)?;
                (key.script_sig(&key.unlocking_items(signature)), vec![])
            };
            script_sigs.push(script_sig);
            witnesses.push(witness);
        }
    }
    for ((input, script_sig), witness) in tx.input.iter_mut().zip(script_sigs).zip(witnesses) {
        input.script_sig = script_sig;
        input.witness = witness;
    }
    Ok(())
}

/// Rejects witness spends on chains without segwit
fn only_legacy(index: usize, key: &InputKey<'_>) -> Result<()> {
    if key.is_segwit() {
        return Err(Error::InvalidParameter(format!("Input {} is a witness spend", index)));
    }
    Ok(())
}

/// Script a legacy signature hash commits to
fn legacy_script_code<'s>(key: &'s InputKey<'_>, utxo: &'s UnspentOutput) -> &'s Script {
    key.redeem_script.as_ref().unwrap_or(&utxo.script)
}

fn sign_zcash(
    tx: &mut zcash::Transaction,
    utxos: &[UnspentOutput],
    keys: &[InputKey<'_>],
    hash_type: u32,
) -> Result<()> {
    let mut script_sigs = Vec::with_capacity(utxos.len());
    for (index, (utxo, key)) in utxos.iter().zip(keys).enumerate() {
        only_legacy(index, key)?;
        let script_code = legacy_script_code(key, utxo);
        let sighash = tx.signature_hash(index, script_code, utxo.amount, hash_type)?;
        let signature = key.signature(&sighash, hash_type)?;
        script_sigs.push(key.script_sig(&key.unlocking_items(signature)));
    }
    for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }
    Ok(())
}

fn sign_decred(
    tx: &mut decred::Transaction,
    utxos: &[UnspentOutput],
    keys: &[InputKey<'_>],
    hash_type: u32,
) -> Result<()> {
    let mut script_sigs = Vec::with_capacity(utxos.len());
    for (index, (utxo, key)) in utxos.iter().zip(keys).enumerate() {
        only_legacy(index, key)?;
        let sighash = tx.signature_hash(legacy_script_code(key, utxo), index, hash_type)?;
        let signature = key.signature(&sighash, hash_type)?;
        script_sigs.push(key.script_sig(&key.unlocking_items(signature)));
    }
    for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
        input.signature_script = script_sig;
    }
    Ok(())
}

/// The outpoint of output `index` of a Decred transaction
pub fn decred_outpoint(tx: &decred::Transaction, index: u32) -> OutPoint {
    OutPoint::new(tx.txid(), index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::CoinType;
    use crate::keys::Curve;

    fn key(hex: &str) -> PrivateKey {
        PrivateKey::from_hex(hex, Curve::Secp256k1).unwrap()
    }

    // Decred redeem of a coinbase-like origin transaction
    #[test]
    fn test_sign_decred_redeem() {
        let private_key = key("22a47fa09a223f2aa079edf85a7c2d4f8720ee63e502ee2869afab7de234b80c");
        let public_key = private_key.public_key();
        let address = Address::from_public_key(CoinType::Decred, &public_key).unwrap();
        assert_eq!(address.to_string(), "DsoPDLh462ULTy1QMSvBGLqGKQENerrdZDH");
        let script = address.script_pubkey().unwrap();

        let mut origin = decred::Transaction::default();
        let mut coinbase = decred::TxIn::new(OutPoint::null(), 100_000_000, SEQUENCE_FINAL);
        coinbase.signature_script = Script::from_bytes(vec![0x00, 0x00]);
        origin.input.push(coinbase);
        origin.output.push(decred::TxOut {
            value: 100_000_000,
            version: 0,
            script_pubkey: script.clone(),
        });
        assert_eq!(
            hex::encode(origin.txid()),
            "0ff6ff7c6774a56ccc51598b11724c9c441cadc52978ddb5f08f3511a0cc777a"
        );

        let mut redeem = decred::Transaction::default();
        redeem.input.push(decred::TxIn::new(
            decred_outpoint(&origin, 0),
            100_000_000,
            SEQUENCE_FINAL,
        ));
        redeem.output.push(decred::TxOut::default());

        let utxo = UnspentOutput::new(decred_outpoint(&origin, 0), 100_000_000, script);
        let keys = [private_key];
        let input_keys = find_keys(
            CoinType::Decred.descriptor(),
            &keys,
            &BTreeMap::new(),
            std::slice::from_ref(&utxo),
        )
        .unwrap();
        sign_decred(&mut redeem, &[utxo], &input_keys, 1).unwrap();

        let signature_script = "6a47304402201ac7bdf56a9d12f3bc09cf7b47cdfafc1348628f659e37b455d497cb6e7a748802202b3630eedee1bbc9248424e4a1b8671e14631a069f36ac8860dee0bb9ea1541f012102a673638cb9587cb68ea08dbef685c6f2d2a751a8b3c6f2a7e9a4999e6e4bfaf5";
        let expected = [
            "01000000",
            "01",
            "0ff6ff7c6774a56ccc51598b11724c9c441cadc52978ddb5f08f3511a0cc777a",
            "00000000",
            "00",
            "ffffffff",
            "01",
            "0000000000000000",
            "0000",
            "00",
            "00000000",
            "00000000",
            "01",
            "00e1f50500000000",
            "00000000",
            "ffffffff",
            signature_script,
        ]
        .concat();
        assert_eq!(hex::encode(redeem.serialize()), expected);
    }

    #[test]
    fn test_find_key_by_script() {
        let private_key = key("619c335025c7f4012e556c2a58b2506e30b8511b53ade95ea316fd8c3286feb9");
        let public_key = private_key.public_key();
        let keys = [private_key];
        let hasher = KeyHasher::Hash160;
        let no_scripts = BTreeMap::new();
        let kind = |script: &Script| find_key(hasher, &keys, &no_scripts, script).map(|k| k.kind);

        let p2wpkh = Script::build_pay_to_witness_pubkey_hash(&public_key.hash160());
        assert_eq!(kind(&p2wpkh), Some(SpendKind::PayToWitnessPublicKeyHash));

        let p2pkh = Script::build_pay_to_public_key_hash(&public_key.uncompressed().hash160());
        assert_eq!(
            kind(&p2pkh),
            Some(SpendKind::PayToPublicKeyHash {
                compressed: false
            })
        );

        // P2WPKH nested in P2SH needs no registered script
        let p2sh = Script::build_pay_to_script_hash(&hasher.hash(p2wpkh.as_bytes()));
        let nested = find_key(hasher, &keys, &no_scripts, &p2sh).unwrap();
        assert_eq!(nested.kind, SpendKind::PayToWitnessPublicKeyHash);
        assert_eq!(nested.redeem_script, Some(p2wpkh.clone()));
        assert!(nested.is_segwit());

        let other = Script::build_pay_to_public_key_hash(&[0u8; 20]);
        assert!(kind(&other).is_none());
        assert!(kind(&Script::new()).is_none());
    }

    #[test]
    fn test_find_key_through_registered_scripts() {
        let private_key = key("619c335025c7f4012e556c2a58b2506e30b8511b53ade95ea316fd8c3286feb9");
        let public_key = private_key.public_key();
        let keys = [private_key];
        let hasher = KeyHasher::Hash160;
        let inner = Script::build_pay_to_public_key_hash(&public_key.hash160());

        let script_hash = hasher.hash(inner.as_bytes());
        let witness_hash = sha256::Hash::hash(inner.as_bytes()).to_byte_array();
        let scripts = BTreeMap::from([
            (hex::encode(script_hash), inner.clone()),
            (hex::encode(witness_hash), inner.clone()),
        ]);

        let p2sh = Script::build_pay_to_script_hash(&script_hash);
        let found = find_key(hasher, &keys, &scripts, &p2sh).unwrap();
        assert_eq!(
            found.kind,
            SpendKind::PayToPublicKeyHash {
                compressed: true
            }
        );
        assert_eq!(found.redeem_script, Some(inner.clone()));
        assert!(!found.is_segwit());

        let p2wsh = Script::build_pay_to_witness_script_hash(&witness_hash);
        let found = find_key(hasher, &keys, &scripts, &p2wsh).unwrap();
        assert_eq!(found.witness_script, Some(inner.clone()));
        assert!(found.redeem_script.is_none());
        assert!(found.is_segwit());
        assert_eq!(found.segwit_script_code(), inner);

        // a script registered under the wrong hash is ignored
        let mislabeled = BTreeMap::from([(hex::encode(script_hash), p2sh.clone())]);
        assert!(find_key(hasher, &keys, &mislabeled, &p2sh).is_none());
        assert!(find_key(hasher, &keys, &BTreeMap::new(), &p2wsh).is_none());

        // witness scripts cannot wrap a witness program
        let p2wpkh = Script::build_pay_to_witness_pubkey_hash(&public_key.hash160());
        let wrapped_hash = sha256::Hash::hash(p2wpkh.as_bytes()).to_byte_array();
        let wrapped = BTreeMap::from([(hex::encode(wrapped_hash), p2wpkh)]);
        let p2wsh = Script::build_pay_to_witness_script_hash(&wrapped_hash);
        assert!(find_key(hasher, &keys, &wrapped, &p2wsh).is_none());
    }
}
