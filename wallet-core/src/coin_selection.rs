//! Coin selection algorithms for transaction building
//!
//! This module provides the strategies for selecting UTXOs when planning a
//! transaction. Every strategy is deterministic: the same UTXO set, target and
//! fee always yield the same selection.

use core::cmp::Reverse;
use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::fee::FeeCalculator;
use crate::utxo::UnspentOutput;

/// UTXO selection strategy
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Fewest inputs whose sum lands closest to twice the target, preferring
    /// selections that leave a change output above the dust threshold
    #[default]
    FewestInputs,
    /// Select largest UTXOs first (minimize fees)
    LargestFirst,
    /// Select smallest UTXOs first (minimize UTXO set)
    SmallestFirst,
}

/// Result of UTXO selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Selected UTXOs, in ascending amount order for `FewestInputs`
    pub selected: Vec<UnspentOutput>,
    /// Total value of selected UTXOs
    pub total_value: u64,
    /// Target amount (excluding fees)
    pub target_amount: u64,
    /// Leftover after target and fee, before any dust handling
    pub change_amount: u64,
    /// Fee for the selected inputs and the requested output count
    pub estimated_fee: u64,
    /// Whether the selection covers target and fee exactly
    pub exact_match: bool,
}

/// Errors from coin selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// No UTXOs available for selection
    NoUtxosAvailable {
        required: u64,
    },
    /// Insufficient funds
    InsufficientFunds {
        available: u64,
        required: u64,
    },
    /// Nothing to select for
    ZeroTarget,
    /// UTXO amounts sum past `u64::MAX`
    AmountOverflow,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUtxosAvailable {
                required,
            } => write!(f, "No UTXOs available for selection, required {}", required),
            Self::InsufficientFunds {
                available,
                required,
            } => {
                write!(f, "Insufficient funds: available {}, required {}", available, required)
            }
            Self::ZeroTarget => write!(f, "Target amount must be greater than zero"),
            Self::AmountOverflow => write!(f, "Amount overflow"),
        }
    }
}

impl std::error::Error for SelectionError {}

/// Coin selector for choosing UTXOs
///
/// # Strategy Selection Guide
///
/// - **FewestInputs**: default. Smallest input count, change kept above dust when possible.
/// - **LargestFirst**: also minimizes inputs, but may leave large change.
/// - **SmallestFirst**: consolidates small UTXOs at the cost of a larger fee.
#[derive(Debug, Clone, Copy)]
pub struct CoinSelector {
    strategy: SelectionStrategy,
    fee_calculator: FeeCalculator,
    byte_fee: u64,
    min_confirmations: u32,
    current_height: Option<u32>,
}

impl CoinSelector {
    /// Create a new coin selector
    pub fn new(strategy: SelectionStrategy, fee_calculator: FeeCalculator, byte_fee: u64) -> Self {
        Self {
            strategy,
            fee_calculator,
            byte_fee,
            min_confirmations: 0,
            current_height: None,
        }
    }

    /// Set minimum confirmations required
    ///
    /// Only applied to UTXOs with a height, and only once a chain tip is known.
    pub fn with_min_confirmations(mut self, confirmations: u32) -> Self {
        self.min_confirmations = confirmations;
        self
    }

    /// Set the chain tip used to count confirmations
    pub fn with_current_height(mut self, height: u32) -> Self {
        self.current_height = Some(height);
        self
    }

    /// Amounts at or below this are never selected
    pub fn dust_threshold(&self) -> u64 {
        self.fee_calculator.dust_threshold(self.byte_fee)
    }

    fn fee(&self, inputs: usize, outputs: usize) -> u64 {
        self.fee_calculator.calculate(inputs, outputs, self.byte_fee)
    }

    /// UTXOs that may be selected: confirmed enough and not dust
    pub fn spendable<'a>(&self, utxos: &'a [UnspentOutput]) -> Vec<&'a UnspentOutput> {
        let dust = self.dust_threshold();
        utxos
            .iter()
            .filter(|u| u.amount > dust)
            .filter(|u| u.is_confirmed_enough(self.min_confirmations, self.current_height))
            .collect()
    }

    /// Select UTXOs covering `target_amount` plus the fee of a transaction
    /// with `num_outputs` outputs.
    pub fn select_coins(
        &self,
        utxos: &[UnspentOutput],
        target_amount: u64,
        num_outputs: usize,
    ) -> Result<SelectionResult, SelectionError> {
        if target_amount == 0 {
            return Err(SelectionError::ZeroTarget);
        }

        let mut available = self.spendable(utxos);
        if available.is_empty() {
            return Err(SelectionError::NoUtxosAvailable {
                required: target_amount,
            });
        }

        // Every subset sum below is bounded by this total
        let total_available = available
            .iter()
            .try_fold(0u64, |sum, u| sum.checked_add(u.amount))
            .ok_or(SelectionError::AmountOverflow)?;
        if total_available < target_amount {
            return Err(SelectionError::InsufficientFunds {
                available: total_available,
                required: target_amount,
            });
        }

        // Ascending by amount, ties broken by outpoint
        available.sort();

        let selected = match self.strategy {
            SelectionStrategy::FewestInputs => {
                self.fewest_inputs(&available, target_amount, num_outputs)
            }
            SelectionStrategy::SmallestFirst => {
                self.accumulate(available.iter().copied(), target_amount, num_outputs)
            }
            SelectionStrategy::LargestFirst => {
                available.sort_by_key(|u| (Reverse(u.amount), u.outpoint));
                self.accumulate(available.iter().copied(), target_amount, num_outputs)
            }
        };

        let Some(selected) = selected else {
            return Err(SelectionError::InsufficientFunds {
                available: total_available,
                required: target_amount.saturating_add(self.fee(available.len(), num_outputs)),
            });
        };

        let total_value: u64 = selected.iter().map(|u| u.amount).sum();
        let estimated_fee = self.fee(selected.len(), num_outputs);
        let change_amount = total_value - target_amount - estimated_fee;
        debug!(
            strategy = ?self.strategy,
            inputs = selected.len(),
            total_value,
            target_amount,
            estimated_fee,
            "selected coins"
        );

        Ok(SelectionResult {
            selected: selected.into_iter().cloned().collect(),
            total_value,
            target_amount,
            change_amount,
            estimated_fee,
            exact_match: change_amount == 0,
        })
    }

    /// Simple accumulation in the given order
    fn accumulate<'a, I>(
        &self,
        utxos: I,
        target_amount: u64,
        num_outputs: usize,
    ) -> Option<Vec<&'a UnspentOutput>>
    where
        I: IntoIterator<Item = &'a UnspentOutput>,
    {
        let mut selected = Vec::new();
        let mut total_value = 0u64;

        for utxo in utxos {
            total_value += utxo.amount;
            selected.push(utxo);

            let required_amount = target_amount.saturating_add(self.fee(selected.len(), num_outputs));
            if total_value >= required_amount {
                return Some(selected);
            }
        }
        None
    }

    /// Fewest-inputs selection over contiguous windows of the ascending set.
    ///
    /// First pass: for each input count, the windows covering target, fee and
    /// a non-dust change; the one whose sum is closest to twice the target
    /// wins. Second pass drops the change requirement and takes the first
    /// covering window.
    fn fewest_inputs<'a>(
        &self,
        sorted: &[&'a UnspentOutput],
        target_amount: u64,
        num_outputs: usize,
    ) -> Option<Vec<&'a UnspentOutput>> {
        let dust = self.dust_threshold();
        let n = sorted.len();
        let double_target = target_amount.saturating_mul(2);

        for num_inputs in 1..=n {
            let fee = self.fee(num_inputs, num_outputs);
            let required = target_amount.saturating_add(fee).saturating_add(dust);
            let max_sum = window_sum(&sorted[n - num_inputs..]);
            if max_sum < required {
                continue;
            }
            let best = sorted
                .windows(num_inputs)
                .filter(|window| window_sum(window) >= required)
                .min_by_key(|window| window_sum(window).abs_diff(double_target));
            if let Some(window) = best {
                trace!(num_inputs, fee, "found selection with change");
                return Some(window.to_vec());
            }
        }

        for num_inputs in 1..=n {
            let fee = self.fee(num_inputs, num_outputs);
            let required = target_amount.saturating_add(fee);
            if let Some(window) =
                sorted.windows(num_inputs).find(|window| window_sum(window) >= required)
            {
                trace!(num_inputs, fee, "found selection without change");
                return Some(window.to_vec());
            }
        }
        None
    }
}

fn window_sum(window: &[&UnspentOutput]) -> u64 {
    window.iter().map(|u| u.amount).sum()
}
