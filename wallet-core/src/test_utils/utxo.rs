use crate::script::Script;
use crate::transaction::OutPoint;
use crate::utxo::UnspentOutput;

impl UnspentOutput {
    /// P2WPKH output of `amount`; hash, index and key hash all derive from `id`
    pub fn new_test(id: u8, amount: u64) -> Self {
        let outpoint = OutPoint::new([id.wrapping_add(1); 32], u32::from(id));
        UnspentOutput::new(outpoint, amount, Script::build_pay_to_witness_pubkey_hash(&[id; 20]))
    }

    /// One test output per amount, ids counting up from zero
    pub fn new_test_batch(amounts: &[u64]) -> Vec<Self> {
        amounts.iter().enumerate().map(|(id, &amount)| Self::new_test(id as u8, amount)).collect()
    }
}
