//! Unspent outputs offered to the planner
//!
//! Callers fetch these from their own indexer; the wallet core never tracks
//! chain state itself.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::script::Script;
use crate::transaction::OutPoint;

/// Unspent Transaction Output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// The outpoint (txid + vout)
    pub outpoint: OutPoint,
    /// Value in the coin's smallest unit
    pub amount: u64,
    /// The locking script of the output
    pub script: Script,
    /// Block height where this UTXO was created, `None` while unconfirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Sequence for the spending input, overriding the signer's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

impl UnspentOutput {
    /// Create a new UTXO without height metadata
    pub fn new(outpoint: OutPoint, amount: u64, script: Script) -> Self {
        Self {
            outpoint,
            amount,
            script,
            height: None,
            sequence: None,
        }
    }

    /// Set the block height the output was mined at
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the sequence used when spending this output
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Number of confirmations at `current_height`.
    ///
    /// `None` when the output has no height yet; an output mined in the
    /// current block has one confirmation.
    pub fn confirmations(&self, current_height: u32) -> Option<u32> {
        self.height.map(|height| {
            if current_height < height {
                0
            } else {
                (current_height - height).saturating_add(1)
            }
        })
    }

    /// Whether the output has at least `min_confirmations` at `current_height`.
    ///
    /// Outputs without height metadata are not filtered.
    pub fn is_confirmed_enough(&self, min_confirmations: u32, current_height: Option<u32>) -> bool {
        if min_confirmations == 0 {
            return true;
        }
        match (self.height, current_height) {
            (Some(_), Some(current)) => {
                self.confirmations(current).is_some_and(|c| c >= min_confirmations)
            }
            _ => true,
        }
    }
}

impl Ord for UnspentOutput {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by value (ascending), then outpoint
        self.amount.cmp(&other.amount).then_with(|| self.outpoint.cmp(&other.outpoint))
    }
}

impl PartialOrd for UnspentOutput {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(amount: u64, index: u32) -> UnspentOutput {
        UnspentOutput::new(OutPoint::new([7u8; 32], index), amount, Script::new())
    }

    #[test]
    fn test_confirmations() {
        let unconfirmed = utxo(1, 0);
        assert_eq!(unconfirmed.confirmations(100), None);
        assert!(unconfirmed.is_confirmed_enough(6, Some(100)));

        let mined = utxo(1, 0).with_height(95);
        assert_eq!(mined.confirmations(95), Some(1));
        assert_eq!(mined.confirmations(100), Some(6));
        assert_eq!(mined.confirmations(90), Some(0));
        assert!(mined.is_confirmed_enough(6, Some(100)));
        assert!(!mined.is_confirmed_enough(7, Some(100)));
        // no chain tip, no filtering
        assert!(mined.is_confirmed_enough(7, None));
    }

    #[test]
    fn test_ordering_by_amount_then_outpoint() {
        let mut utxos = vec![utxo(5, 1), utxo(3, 0), utxo(5, 0)];
        utxos.sort();
        let order: Vec<_> = utxos.iter().map(|u| (u.amount, u.outpoint.index)).collect();
        assert_eq!(order, vec![(3, 0), (5, 0), (5, 1)]);
    }

    #[test]
    fn test_serde() {
        let json = serde_json::json!({
            "outpoint": {
                "txid": "9f96ade4b41d5433f4eda31e1738ec2b36f6e7d1420d94a6af99801a88f7f7ff",
                "vout": 0
            },
            "amount": 625000000,
            "script": "76a914b7cd046b6d522a3d61dbcb5235c0e9cc9726545788ac",
            "height": 10
        });
        let utxo: UnspentOutput = serde_json::from_value(json).unwrap();
        assert_eq!(utxo.amount, 625_000_000);
        assert_eq!(utxo.height, Some(10));
        assert_eq!(utxo.sequence, None);
        assert_eq!(utxo.outpoint.tree, 0);
        assert_eq!(hex::encode(utxo.outpoint.hash)[..8], *"fff7f788");
    }
}
