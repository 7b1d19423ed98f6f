//! Planning and signing across strategies

use wallet_core::planner::{plan, PaymentOutput, SigningInput};
use wallet_core::test_utils::TEST_MNEMONIC;
use wallet_core::transaction::OutPoint;
use wallet_core::{CoinType, HDWallet, SelectionStrategy, SignerState, TransactionSigner, UnspentOutput};

const TO: &str = "bc1q375sq4kl2nv0mlmup3vm8znn4eqwu7mt6hkwhr";
const CHANGE: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

const STRATEGIES: [SelectionStrategy; 3] =
    [SelectionStrategy::FewestInputs, SelectionStrategy::LargestFirst, SelectionStrategy::SmallestFirst];

fn input(strategy: SelectionStrategy, amounts: &[u64], payments: &[u64]) -> SigningInput {
    let outputs = payments.iter().map(|amount| PaymentOutput::new(TO, *amount)).collect();
    let mut input =
        SigningInput::new(CoinType::Bitcoin, outputs, UnspentOutput::new_test_batch(amounts), 10, CHANGE);
    input.strategy = strategy;
    input
}

#[test]
fn test_value_is_conserved() {
    let sets: [&[u64]; 3] =
        [&[4_000, 2_000, 6_000, 1_000, 11_000, 12_000], &[100_000], &[25_000, 25_000, 25_000, 25_000]];

    for strategy in STRATEGIES {
        for set in sets {
            for payments in [&[5_000u64][..], &[3_000, 1_500], &[20_000]] {
                let input = input(strategy, set, payments);
                let Ok(plan) = plan(&input) else {
                    continue;
                };
                assert!(plan.is_balanced(), "{:?} {:?} {:?}", strategy, set, payments);
                assert!(plan.fee > 0);
                assert_eq!(plan.amount, payments.iter().sum::<u64>());
                for utxo in &plan.utxos {
                    assert!(input.utxos.contains(utxo));
                }
                let change: Vec<_> = plan.outputs.iter().filter(|o| o.is_change).collect();
                assert_eq!(change.len(), usize::from(plan.change > 0));
                if plan.change > 0 {
                    assert!(plan.outputs.last().unwrap().is_change);
                }
            }
        }
    }
}

#[test]
fn test_max_amount_spends_everything() {
    for strategy in STRATEGIES {
        let mut input = input(strategy, &[4_000, 2_000, 6_000], &[0]);
        input.use_max_amount = true;
        let plan = plan(&input).unwrap();

        assert_eq!(plan.utxos.len(), 3);
        assert_eq!(plan.change, 0);
        assert_eq!(plan.available_amount, 12_000);
        assert_eq!(plan.amount + plan.fee, 12_000);
        assert!(plan.is_balanced());
    }
}

#[test]
fn test_plan_and_sign_wallet_outputs() {
    let wallet = HDWallet::from_mnemonic(TEST_MNEMONIC, "").unwrap();
    let key = wallet.get_key_for_coin(CoinType::Bitcoin).unwrap();
    let script = wallet.get_address(CoinType::Bitcoin).unwrap().script_pubkey().unwrap();

    let utxos = vec![
        UnspentOutput::new(OutPoint::new([0x11; 32], 0), 30_000, script.clone()),
        UnspentOutput::new(OutPoint::new([0x22; 32], 1), 70_000, script),
    ];
    let input = SigningInput::new(
        CoinType::Bitcoin,
        vec![PaymentOutput::new(TO, 50_000)],
        utxos,
        5,
        CHANGE,
    )
    .with_private_keys(vec![key.clone()]);

    // the private keys do not survive serialization
    let json = serde_json::to_string(&input).unwrap();
    let restored: SigningInput = serde_json::from_str(&json).unwrap();
    assert!(restored.private_keys.is_empty());
    let restored = restored.with_private_keys(vec![key]);

    let mut signer = TransactionSigner::new(&restored);
    let planned = signer.plan().unwrap();
    assert!(planned.is_balanced());
    let output = signer.sign().unwrap();
    assert_eq!(output.plan, planned);
    assert_matches::assert_matches!(signer.state(), SignerState::Signed(_));

    // segwit marker and flag follow the version
    assert_eq!(&output.encoded[4..6], &[0x00, 0x01]);
    assert_eq!(output.transaction_id.len(), 64);

    let again = TransactionSigner::new(&restored).sign().unwrap();
    assert_eq!(again.encoded, output.encoded);
}
