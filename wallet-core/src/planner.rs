//! Transaction planning for UTXO chains
//!
//! A plan fixes everything the signer needs except signatures: the selected
//! UTXOs, the ordered outputs, the fee and the change. Planning never touches
//! private keys.

use std::collections::BTreeMap;

use bitcoin_hashes::{Hash, sha256};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address::Address;
use crate::coin::{Blockchain, CoinType};
use crate::coin_selection::{CoinSelector, SelectionStrategy};
use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::fee::FeeCalculator;
use crate::keys::PrivateKey;
use crate::script::Script;
use crate::transaction::sighash::EcdsaSighashType;
use crate::utxo::UnspentOutput;

fn default_hash_type() -> u32 {
    EcdsaSighashType::All.to_u32()
}

/// Sum of `amounts`, failing instead of wrapping
fn total_amount(amounts: impl IntoIterator<Item = u64>) -> Result<u64> {
    amounts
        .into_iter()
        .try_fold(0u64, |sum, amount| sum.checked_add(amount))
        .ok_or_else(|| Error::InvalidParameter("Amount overflow".to_string()))
}

/// A payment requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentOutput {
    pub address: String,
    pub amount: u64,
}

impl PaymentOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Everything needed to plan and sign a UTXO transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningInput {
    pub coin: CoinType,
    /// Payments, encoded in this order
    pub outputs: Vec<PaymentOutput>,
    pub utxos: Vec<UnspentOutput>,
    /// Fee per byte (vbyte for segwit chains)
    pub byte_fee: u64,
    /// Receives the change output, required unless `use_max_amount` is set
    #[serde(default)]
    pub change_address: String,
    /// Keys tried for every input; never serialized
    #[serde(skip)]
    pub private_keys: Vec<PrivateKey>,
    /// Redeem and witness scripts by hex of their hash: the 20-byte script
    /// hash for P2SH, the 32-byte SHA-256 for P2WSH
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, Script>,
    /// Data of an extra zero-value OP_RETURN output, encoded last
    #[serde(default, with = "crate::utils::hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub output_op_return: Vec<u8>,
    /// Spend every non-dust UTXO to the single output, without change
    #[serde(default)]
    pub use_max_amount: bool,
    #[serde(default)]
    pub lock_time: u32,
    /// Raw sighash type, SIGHASH_ALL by default
    #[serde(default = "default_hash_type")]
    pub hash_type: u32,
    #[serde(default)]
    pub strategy: SelectionStrategy,
    #[serde(default)]
    pub min_confirmations: u32,
    /// Chain tip, needed for `min_confirmations` to take effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_height: Option<u32>,
    /// Expiry height for Zcash and Decred, 0 to disable
    #[serde(default)]
    pub expiry_height: u32,
    /// Overrides the coin's Zcash consensus branch id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<u32>,
    /// A plan computed earlier; the signer uses it as is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<TransactionPlan>,
}

impl SigningInput {
    /// Input paying `outputs` from `utxos`, with defaults for everything else
    pub fn new(
        coin: CoinType,
        outputs: Vec<PaymentOutput>,
        utxos: Vec<UnspentOutput>,
        byte_fee: u64,
        change_address: impl Into<String>,
    ) -> Self {
        Self {
            coin,
            outputs,
            utxos,
            byte_fee,
            change_address: change_address.into(),
            private_keys: vec![],
            scripts: BTreeMap::new(),
            output_op_return: vec![],
            use_max_amount: false,
            lock_time: 0,
            hash_type: default_hash_type(),
            strategy: SelectionStrategy::default(),
            min_confirmations: 0,
            current_height: None,
            expiry_height: 0,
            branch_id: None,
            plan: None,
        }
    }

    pub fn with_private_keys(mut self, keys: Vec<PrivateKey>) -> Self {
        self.private_keys = keys;
        self
    }

    pub fn with_plan(mut self, plan: TransactionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Applies the wallet's selection policy and confirmation filter, and its
    /// default fee rate when `byte_fee` is zero
    pub fn with_config(mut self, config: &WalletConfig) -> Self {
        self.strategy = config.selection_strategy;
        self.min_confirmations = config.min_confirmations;
        if self.byte_fee == 0 {
            self.byte_fee = config.default_byte_fee;
        }
        self
    }

    /// Registers the redeem script of a P2SH output
    pub fn with_redeem_script(mut self, script: Script) -> Self {
        let hash = self.coin.descriptor().key_hasher().hash(script.as_bytes());
        self.scripts.insert(hex::encode(hash), script);
        self
    }

    /// Registers the witness script of a P2WSH output
    pub fn with_witness_script(mut self, script: Script) -> Self {
        let hash = sha256::Hash::hash(script.as_bytes());
        self.scripts.insert(hex::encode(hash.as_byte_array()), script);
        self
    }

    /// Adds an OP_RETURN output carrying `data`
    pub fn with_op_return(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.output_op_return = data.into();
        self
    }
}

/// An output of the planned transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlannedOutput {
    pub address: String,
    pub amount: u64,
    /// Whether this is the change output
    #[serde(default)]
    pub is_change: bool,
}

/// A fully determined transaction, ready to be signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPlan {
    /// Sum of the payment outputs
    pub amount: u64,
    /// Sum of the selected UTXOs
    pub available_amount: u64,
    pub fee: u64,
    /// Change amount, 0 when absorbed into the fee
    pub change: u64,
    /// Selected UTXOs, spent in this order
    pub utxos: Vec<UnspentOutput>,
    /// Payments in caller order, change last
    pub outputs: Vec<PlannedOutput>,
    /// Zcash consensus branch id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<u32>,
    /// Zcash and Decred expiry height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_height: Option<u32>,
    /// Data of the OP_RETURN output following `outputs`
    #[serde(default, with = "crate::utils::hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub output_op_return: Vec<u8>,
}

impl TransactionPlan {
    /// `available_amount == amount + change + fee`, and the outputs add up
    pub fn is_balanced(&self) -> bool {
        let outputs = total_amount(self.outputs.iter().map(|o| o.amount)).ok();
        let inputs = total_amount(self.utxos.iter().map(|u| u.amount)).ok();
        let spent = self.amount.checked_add(self.change);
        inputs == Some(self.available_amount)
            && spent.is_some()
            && outputs == spent
            && spent.and_then(|s| s.checked_add(self.fee)) == Some(self.available_amount)
    }
}

/// Plans `input` for a UTXO coin.
///
/// # Errors
///
/// - [`Error::UnsupportedCoin`] for account-based coins
/// - [`Error::ZeroAmount`] for a zero payment or no payments
/// - [`Error::InvalidAddress`] for an output or change address of another coin
/// - [`Error::InsufficientFunds`] when the UTXOs cannot cover amount and fee
/// - [`Error::InvalidParameter`] when amounts overflow or the OP_RETURN data
///   is too long
pub fn plan(input: &SigningInput) -> Result<TransactionPlan> {
    let descriptor = input.coin.descriptor();
    let fee_calculator = FeeCalculator::for_coin(input.coin)?;

    if input.outputs.is_empty() {
        return Err(Error::ZeroAmount);
    }
    for output in &input.outputs {
        Address::from_str_for(input.coin, &output.address)?;
        if output.amount == 0 && !input.use_max_amount {
            return Err(Error::ZeroAmount);
        }
    }
    if !input.output_op_return.is_empty() {
        Script::build_op_return(&input.output_op_return)?;
    }

    let mut selector = CoinSelector::new(input.strategy, fee_calculator, input.byte_fee)
        .with_min_confirmations(input.min_confirmations);
    if let Some(height) = input.current_height {
        selector = selector.with_current_height(height);
    }

    let mut plan = if input.use_max_amount {
        plan_max_amount(input, &selector, &fee_calculator)?
    } else {
        Address::from_str_for(input.coin, &input.change_address)?;
        plan_with_change(input, &selector, &fee_calculator)?
    };

    match descriptor.blockchain {
        Blockchain::Zcash => {
            plan.branch_id = input.branch_id.or(descriptor.branch_id);
            plan.expiry_height = Some(input.expiry_height);
        }
        Blockchain::Decred => plan.expiry_height = Some(input.expiry_height),
        _ => {}
    }
    plan.output_op_return = input.output_op_return.clone();

    debug!(
        coin = %input.coin,
        inputs = plan.utxos.len(),
        amount = plan.amount,
        fee = plan.fee,
        change = plan.change,
        "planned transaction"
    );
    debug_assert!(plan.is_balanced());
    Ok(plan)
}

fn plan_with_change(
    input: &SigningInput,
    selector: &CoinSelector,
    fee_calculator: &FeeCalculator,
) -> Result<TransactionPlan> {
    let num_outputs = input.outputs.len() + extra_outputs(input);
    let amount = total_amount(input.outputs.iter().map(|o| o.amount))?;

    // select assuming a change output
    let selection = selector.select_coins(&input.utxos, amount, num_outputs + 1)?;
    let inputs = selection.selected.len();
    let available_amount = selection.total_value;
    let dust = selector.dust_threshold();

    let mut outputs: Vec<PlannedOutput> = input
        .outputs
        .iter()
        .map(|o| PlannedOutput {
            address: o.address.clone(),
            amount: o.amount,
            is_change: false,
        })
        .collect();

    let (fee, change) = if selection.change_amount > dust {
        (selection.estimated_fee, selection.change_amount)
    } else {
        let fee_without_change = fee_calculator.calculate(inputs, num_outputs, input.byte_fee);
        let required = amount.saturating_add(fee_without_change);
        if available_amount < required {
            warn!(available_amount, amount, fee_without_change, "selection cannot pay its fee");
            return Err(Error::InsufficientFunds {
                available: available_amount,
                required,
            });
        }
        debug!(leftover = selection.change_amount, dust, "change below dust, absorbed into fee");
        (available_amount - amount, 0)
    };

    if change > 0 {
        outputs.push(PlannedOutput {
            address: input.change_address.clone(),
            amount: change,
            is_change: true,
        });
    }

    Ok(TransactionPlan {
        amount,
        available_amount,
        fee,
        change,
        utxos: selection.selected,
        outputs,
        branch_id: None,
        expiry_height: None,
        output_op_return: vec![],
    })
}

/// The OP_RETURN output, when present, counts toward the fee
fn extra_outputs(input: &SigningInput) -> usize {
    usize::from(!input.output_op_return.is_empty())
}

fn plan_max_amount(
    input: &SigningInput,
    selector: &CoinSelector,
    fee_calculator: &FeeCalculator,
) -> Result<TransactionPlan> {
    if input.outputs.len() != 1 {
        return Err(Error::InvalidParameter(
            "Max amount requires exactly one output".to_string(),
        ));
    }
    let mut utxos: Vec<UnspentOutput> =
        selector.spendable(&input.utxos).into_iter().cloned().collect();
    utxos.sort();

    let available_amount = total_amount(utxos.iter().map(|u| u.amount))?;
    let fee = fee_calculator.calculate(utxos.len(), 1 + extra_outputs(input), input.byte_fee);
    if utxos.is_empty() || available_amount <= fee {
        return Err(Error::InsufficientFunds {
            available: available_amount,
            required: fee.saturating_add(1),
        });
    }
    let amount = available_amount - fee;

    Ok(TransactionPlan {
        amount,
        available_amount,
        fee,
        change: 0,
        utxos,
        outputs: vec![PlannedOutput {
            address: input.outputs[0].address.clone(),
            amount,
            is_change: false,
        }],
        branch_id: None,
        expiry_height: None,
        output_op_return: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::SAPLING_BRANCH_ID;
    use crate::script::MAX_OP_RETURN_LEN;
    use assert_matches::assert_matches;

    const TO: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
    const CHANGE: &str = "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA";

    fn utxos(amounts: &[u64]) -> Vec<UnspentOutput> {
        UnspentOutput::new_test_batch(amounts)
    }

    fn input(amount: u64, set: &[u64], byte_fee: u64) -> SigningInput {
        SigningInput::new(
            CoinType::Bitcoin,
            vec![PaymentOutput::new(TO, amount)],
            utxos(set),
            byte_fee,
            CHANGE,
        )
    }

    #[test]
    fn test_plan_with_change() {
        let plan = plan(&input(50_000, &[30_000, 80_000, 120_000], 10)).unwrap();
        // 80k is closest to double the amount
        assert_eq!(plan.utxos.len(), 1);
        assert_eq!(plan.available_amount, 80_000);
        assert_eq!(plan.fee, 1740);
        assert_eq!(plan.change, 80_000 - 50_000 - 1740);
        assert_eq!(plan.outputs.len(), 2);
        assert_eq!(plan.outputs[0].address, TO);
        assert!(plan.outputs[1].is_change);
        assert_eq!(plan.outputs[1].address, CHANGE);
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_dust_change_goes_to_fee() {
        // 1 input, 2 outputs at 1 sat/vbyte is 174, dust is 102
        let plan = plan(&input(10_000, &[10_250], 1)).unwrap();
        assert_eq!(plan.change, 0);
        assert_eq!(plan.fee, 250);
        assert_eq!(plan.outputs.len(), 1);
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_plan_is_idempotent() {
        let input = input(70_000, &[15_000, 40_000, 38_000, 99_000, 5_000], 3);
        assert_eq!(plan(&input).unwrap(), plan(&input).unwrap());
    }

    #[test]
    fn test_outputs_keep_caller_order() {
        let mut input = input(10_000, &[500_000], 1);
        input.outputs.push(PaymentOutput::new(CHANGE, 20_000));
        let plan = plan(&input).unwrap();
        let addresses: Vec<_> = plan.outputs.iter().map(|o| o.address.as_str()).collect();
        assert_eq!(addresses, vec![TO, CHANGE, CHANGE]);
        assert_eq!(plan.amount, 30_000);
        assert!(plan.outputs[2].is_change);
    }

    #[test]
    fn test_max_amount() {
        let mut input = input(0, &[10_000, 50, 20_000], 1);
        input.use_max_amount = true;
        input.change_address.clear();
        let plan = plan(&input).unwrap();
        // dust input skipped; 2 inputs and 1 output
        assert_eq!(plan.utxos.len(), 2);
        let fee = FeeCalculator::for_coin(CoinType::Bitcoin).unwrap().calculate(2, 1, 1);
        assert_eq!(plan.fee, fee);
        assert_eq!(plan.amount, 30_000 - fee);
        assert_eq!(plan.change, 0);
        assert_eq!(plan.outputs.len(), 1);
        assert!(plan.is_balanced());
    }

    #[test]
    fn test_plan_errors() {
        assert_matches!(
            plan(&input(1_000_000, &[10_000, 20_000], 1)),
            Err(Error::InsufficientFunds {
                available: 30_000,
                required: 1_000_000
            })
        );
        assert_matches!(plan(&input(0, &[10_000], 1)), Err(Error::ZeroAmount));

        let mut wrong_coin = input(1000, &[10_000], 1);
        wrong_coin.outputs[0].address = "LQ4i7FuT2oHaRyv8mSs1oLmc1FNZYWGU4g".to_string();
        assert_matches!(plan(&wrong_coin), Err(Error::InvalidAddress(_)));

        let mut bad_change = input(1000, &[10_000], 1);
        bad_change.change_address = "bc1qinvalid".to_string();
        assert_matches!(plan(&bad_change), Err(Error::InvalidAddress(_)));

        let mut account_based = input(1000, &[10_000], 1);
        account_based.coin = CoinType::Ethereum;
        assert_matches!(plan(&account_based), Err(Error::UnsupportedCoin(_)));
    }

    #[test]
    fn test_zcash_extension_data() {
        let mut input = input(10_000, &[100_000], 1);
        input.coin = CoinType::Zcash;
        input.outputs[0].address = "t1QahNjDdibyE4EdYkawUSKBBcVTSqv64CS".to_string();
        input.change_address = "t1QahNjDdibyE4EdYkawUSKBBcVTSqv64CS".to_string();
        input.expiry_height = 1000;
        let plan = plan(&input).unwrap();
        assert_eq!(plan.branch_id, Some(SAPLING_BRANCH_ID));
        assert_eq!(plan.expiry_height, Some(1000));
        // ZIP-317: max(2, 2 outputs) actions
        assert_eq!(plan.fee, 10_000);
    }

    #[test]
    fn test_amounts_near_u64_max() {
        let mut payments = input(u64::MAX / 2 + 1, &[10_000], 1);
        payments.outputs.push(PaymentOutput::new(TO, u64::MAX / 2 + 1));
        assert_matches!(plan(&payments), Err(Error::InvalidParameter(_)));

        let huge_utxo = input(1_000, &[u64::MAX, 5_000], 1);
        assert_matches!(plan(&huge_utxo), Err(Error::InvalidParameter(_)));

        let mut max = input(0, &[u64::MAX, 5_000], 1);
        max.use_max_amount = true;
        assert_matches!(plan(&max), Err(Error::InvalidParameter(_)));

        // amount plus fee saturates instead of wrapping
        assert_matches!(
            plan(&input(u64::MAX - 1, &[u64::MAX - 1], 1)),
            Err(Error::InsufficientFunds {
                required: u64::MAX,
                ..
            })
        );
    }

    #[test]
    fn test_with_config() {
        let config = WalletConfig::new()
            .with_selection_strategy(SelectionStrategy::SmallestFirst)
            .with_default_byte_fee(7)
            .with_min_confirmations(3);

        let configured = input(10_000, &[30_000, 80_000], 0).with_config(&config);
        assert_eq!(configured.byte_fee, 7);
        assert_eq!(configured.strategy, SelectionStrategy::SmallestFirst);
        assert_eq!(configured.min_confirmations, 3);
        let plan = plan(&configured).unwrap();
        assert_eq!(plan.utxos[0].amount, 30_000);
        assert_eq!(
            plan.fee,
            FeeCalculator::for_coin(CoinType::Bitcoin).unwrap().calculate(1, 2, 7)
        );

        // an explicit fee rate wins
        let explicit = input(10_000, &[30_000], 20).with_config(&config);
        assert_eq!(explicit.byte_fee, 20);
    }

    #[test]
    fn test_op_return_output_counts_toward_fee() {
        let memo = b"wallet-core memo".to_vec();
        let with_memo =
            input(50_000, &[30_000, 80_000, 120_000], 10).with_op_return(memo.clone());
        let plan = plan(&with_memo).unwrap();
        let fee_calculator = FeeCalculator::for_coin(CoinType::Bitcoin).unwrap();
        assert_eq!(plan.fee, fee_calculator.calculate(plan.utxos.len(), 3, 10));
        assert_eq!(plan.output_op_return, memo);
        // payment and change; the OP_RETURN output is not a planned output
        assert_eq!(plan.outputs.len(), 2);
        assert!(plan.is_balanced());

        let mut max = with_memo.clone();
        max.use_max_amount = true;
        let plan = super::plan(&max).unwrap();
        assert_eq!(plan.fee, fee_calculator.calculate(3, 2, 10));

        let too_long = with_memo.with_op_return(vec![0u8; MAX_OP_RETURN_LEN + 1]);
        assert_matches!(super::plan(&too_long), Err(Error::InvalidParameter(_)));
    }

    #[test]
    fn test_registered_scripts() {
        let redeem = Script::build_pay_to_public_key_hash(&[7u8; 20]);
        let with_scripts = input(1_000, &[10_000], 1)
            .with_redeem_script(redeem.clone())
            .with_witness_script(redeem.clone());
        assert_eq!(with_scripts.scripts.len(), 2);
        let script_hash = bitcoin_hashes::hash160::Hash::hash(redeem.as_bytes());
        assert_eq!(
            with_scripts.scripts.get(&hex::encode(script_hash.to_byte_array())),
            Some(&redeem)
        );
        let witness_hash = sha256::Hash::hash(redeem.as_bytes());
        assert_eq!(
            with_scripts.scripts.get(&hex::encode(witness_hash.to_byte_array())),
            Some(&redeem)
        );

        let json = serde_json::to_value(&with_scripts).unwrap();
        let parsed: SigningInput = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.scripts, with_scripts.scripts);
    }

    #[test]
    fn test_signing_input_json() {
        let json = serde_json::json!({
            "coin": 0,
            "outputs": [{ "address": TO, "amount": 1000 }],
            "utxos": [],
            "byte_fee": 1
        });
        let input: SigningInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.hash_type, 1);
        assert_eq!(input.strategy, SelectionStrategy::FewestInputs);
        assert!(input.private_keys.is_empty());
        assert!(input.plan.is_none());
    }
}
