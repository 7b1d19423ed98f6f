//! Transaction signing tests

use assert_matches::assert_matches;
use bitcoin_hashes::{Hash, sha256};
use wallet_core::coin::{CoinType, KeyHasher};
use wallet_core::keys::{Curve, PrivateKey};
use wallet_core::planner::{PaymentOutput, PlannedOutput, SigningInput, TransactionPlan};
use wallet_core::script::Script;
use wallet_core::signer::{SignerState, TransactionSigner};
use wallet_core::transaction::OutPoint;
use wallet_core::utxo::UnspentOutput;
use wallet_core::{Error, SAPLING_BRANCH_ID};

fn hash(hex_str: &str) -> [u8; 32] {
    hex::decode(hex_str).unwrap().try_into().unwrap()
}

fn key(hex_str: &str) -> PrivateKey {
    PrivateKey::from_hex(hex_str, Curve::Secp256k1).unwrap()
}

fn payment(address: &str, amount: u64) -> PlannedOutput {
    PlannedOutput {
        address: address.to_string(),
        amount,
        is_change: false,
    }
}

fn bitcoin_utxos() -> Vec<UnspentOutput> {
    vec![
        UnspentOutput::new(
            OutPoint::new(
                hash("fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f"),
                0,
            ),
            625_000_000,
            Script::from_hex("76a914b7cd046b6d522a3d61dbcb5235c0e9cc9726545788ac").unwrap(),
        ),
        UnspentOutput::new(
            OutPoint::new(
                hash("ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a"),
                1,
            ),
            600_000_000,
            Script::from_hex("00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1").unwrap(),
        ),
    ]
}

fn bitcoin_keys() -> Vec<PrivateKey> {
    vec![
        key("bbc27228ddcb9209d7fd6f36b02f7dfa6252af40bb2f1cbc7a557da8027ff866"),
        key("619c335025c7f4012e556c2a58b2506e30b8511b53ade95ea316fd8c3286feb9"),
    ]
}

fn p2pkh_plan() -> TransactionPlan {
    let utxo = bitcoin_utxos().remove(0);
    TransactionPlan {
        amount: 335_790_000,
        available_amount: utxo.amount,
        fee: 226,
        change: 289_209_774,
        utxos: vec![utxo],
        outputs: vec![
            payment("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 335_790_000),
            PlannedOutput {
                address: "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU".to_string(),
                amount: 289_209_774,
                is_change: true,
            },
        ],
        branch_id: None,
        expiry_height: None,
        output_op_return: vec![],
    }
}

fn p2pkh_input() -> SigningInput {
    SigningInput::new(
        CoinType::Bitcoin,
        vec![PaymentOutput::new("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 335_790_000)],
        bitcoin_utxos(),
        1,
        "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU",
    )
    .with_plan(p2pkh_plan())
}

#[test]
fn test_sign_p2pkh_with_fixed_plan() {
    let input = p2pkh_input().with_private_keys(bitcoin_keys());
    let mut signer = TransactionSigner::new(&input);
    assert_matches!(signer.state(), SignerState::Planned(_));

    let output = signer.sign().unwrap();
    let expected = concat!(
        "01000000",
        "01",
        "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00000000",
        "6a47304402202819d70d4bec472113a1392cadc0860a7a1b34ea0869abb4bdce3290c3aba086",
        "022023eff75f410ad19cdbe6c6a017362bd554ce5fb906c13534ddc306be117ad30a01",
        "2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432",
        "ffffffff",
        "02",
        "b0bf031400000000",
        "1976a914769bdff96a02f9135a1d19b749db6a78fe07dc9088ac",
        "aefd3c1100000000",
        "1976a9149e089b6889e032d46e3b915a3392edfd616fb1c488ac",
        "00000000",
    );
    assert_eq!(output.encoded_hex(), expected);
    assert_eq!(output.transaction_id.len(), 64);
    assert_eq!(output.plan, p2pkh_plan());
    assert_matches!(signer.state(), SignerState::Signed(_));
}

#[test]
fn test_sign_without_keys_fails() {
    let input = p2pkh_input();
    let mut signer = TransactionSigner::new(&input);
    assert_matches!(signer.sign(), Err(Error::MissingPrivateKey(0)));
    assert_eq!(signer.state(), &SignerState::Failed);
    assert!(signer.sign().is_err());
}

#[test]
fn test_sign_fails_on_second_input_without_key() {
    let utxos = bitcoin_utxos();
    let plan = TransactionPlan {
        amount: 1_000_000_000,
        available_amount: 1_225_000_000,
        fee: 10_000,
        change: 224_990_000,
        utxos: utxos.clone(),
        outputs: vec![
            payment("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 1_000_000_000),
            PlannedOutput {
                address: "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU".to_string(),
                amount: 224_990_000,
                is_change: true,
            },
        ],
        branch_id: None,
        expiry_height: None,
        output_op_return: vec![],
    };
    assert!(plan.is_balanced());

    // only the key of the first input
    let input = SigningInput::new(CoinType::Bitcoin, vec![], utxos, 1, "")
        .with_private_keys(bitcoin_keys()[..1].to_vec())
        .with_plan(plan);
    let mut signer = TransactionSigner::new(&input);
    assert_matches!(signer.sign(), Err(Error::MissingPrivateKey(1)));
    assert_eq!(signer.state(), &SignerState::Failed);
    assert_matches!(signer.sign(), Err(Error::InvalidParameter(_)));
}

fn script_utxo(script: Script) -> UnspentOutput {
    UnspentOutput::new(
        OutPoint::new(hash("fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f"), 0),
        100_000,
        script,
    )
}

fn script_input(utxo: UnspentOutput) -> SigningInput {
    SigningInput::new(
        CoinType::Bitcoin,
        vec![PaymentOutput::new("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 50_000)],
        vec![utxo],
        1,
        "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU",
    )
    .with_private_keys(bitcoin_keys())
}

#[test]
fn test_sign_p2sh_with_redeem_script() {
    let public_key = bitcoin_keys()[0].public_key();
    let redeem = Script::build_pay_to_public_key_hash(&public_key.hash160());
    let p2sh = Script::build_pay_to_script_hash(&KeyHasher::Hash160.hash(redeem.as_bytes()));
    let input = script_input(script_utxo(p2sh));

    // unknown redeem script
    assert_matches!(TransactionSigner::sign_input(&input), Err(Error::MissingPrivateKey(0)));

    let output = TransactionSigner::sign_input(&input.with_redeem_script(redeem.clone())).unwrap();
    let encoded = output.encoded_hex();
    assert!(!encoded.starts_with("010000000001"));
    // the script sig ends with the redeem script push
    assert!(encoded.contains(&format!("19{}ffffffff", redeem.to_hex())));
}

#[test]
fn test_sign_p2wsh_with_witness_script() {
    let public_key = bitcoin_keys()[1].public_key();
    let witness_script = Script::build_pay_to_public_key_hash(&public_key.hash160());
    let witness_hash = sha256::Hash::hash(witness_script.as_bytes()).to_byte_array();
    let p2wsh = Script::build_pay_to_witness_script_hash(&witness_hash);
    let input = script_input(script_utxo(p2wsh)).with_witness_script(witness_script.clone());

    let output = TransactionSigner::sign_input(&input).unwrap();
    let encoded = output.encoded_hex();
    assert!(encoded.starts_with("010000000001"));
    // empty script sig
    assert!(encoded.contains(
        "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000ffffffff"
    ));
    // signature, public key, then the witness script
    assert!(encoded.ends_with(&format!("19{}00000000", witness_script.to_hex())));
}

#[test]
fn test_sign_with_op_return_output() {
    let input = SigningInput::new(
        CoinType::Bitcoin,
        vec![PaymentOutput::new("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 100_000_000)],
        bitcoin_utxos(),
        10,
        "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU",
    )
    .with_private_keys(bitcoin_keys())
    .with_op_return(b"memo".to_vec());

    let output = TransactionSigner::sign_input(&input).unwrap();
    assert_eq!(output.plan.output_op_return, b"memo".to_vec());
    assert!(output.plan.is_balanced());
    // zero value output pushing the memo
    let op_return = format!("0000000000000000066a04{}", hex::encode(b"memo"));
    assert!(output.encoded_hex().contains(&op_return));
}

#[test]
fn test_sign_rejects_non_standard_hash_type() {
    let mut input = p2pkh_input().with_private_keys(bitcoin_keys());
    input.hash_type = 0x04;
    assert_matches!(TransactionSigner::sign_input(&input), Err(Error::InvalidParameter(_)));
}

// BIP143 native P2WPKH example, with the first input spent as P2PK
#[test]
fn test_sign_p2pk_and_p2wpkh() {
    let mut utxos = bitcoin_utxos();
    utxos[0].amount = 1_000_000;
    utxos[0].script = Script::from_hex(
        "2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac",
    )
    .unwrap();
    utxos[0].sequence = Some(0xffff_ffee);

    let plan = TransactionPlan {
        amount: 335_790_000,
        available_amount: 601_000_000,
        fee: 265_210_000,
        change: 0,
        utxos: utxos.clone(),
        outputs: vec![
            payment("1Cu32FVupVCgHkMMRJdYJugxwo2Aprgk7H", 112_340_000),
            payment("16TZ8J6Q5iZKBWizWzFAYnrsaox5Z5aBRV", 223_450_000),
        ],
        branch_id: None,
        expiry_height: None,
        output_op_return: vec![],
    };
    assert!(plan.is_balanced());

    let mut input = SigningInput::new(CoinType::Bitcoin, vec![], utxos, 1, "")
        .with_private_keys(bitcoin_keys())
        .with_plan(plan);
    input.lock_time = 0x11;

    let output = TransactionSigner::sign_input(&input).unwrap();
    let expected = concat!(
        "01000000",
        "0001",
        "02",
        "fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00000000",
        "494830450221008b9d1dc26ba6a9cb62127b02742fa9d754cd3bebf337f7a55d114c8e5cdd30be",
        "022040529b194ba3f9281a99f2b1c0a19c0489bc22ede944ccf4ecbab4cc618ef3ed01",
        "eeffffff",
        "ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a01000000",
        "00",
        "ffffffff",
        "02",
        "202cb20600000000",
        "1976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac",
        "9093510d00000000",
        "1976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac",
        "00",
        "02",
        "47304402203609e17b84f6a7d30c80bfa610b5b4542f32a8a0d5447a12fb1366d7f01cc44a",
        "0220573a954c4518331561406f90300e8f3358f51928d43c212a8caed02de67eebee01",
        "21025476c2e83188368da1ff3e292e7acafcdb3566bb0ad253f62fc70f07aeee6357",
        "11000000",
    );
    assert_eq!(output.encoded_hex(), expected);
}

#[test]
fn test_sign_zcash_sapling() {
    let utxo = UnspentOutput::new(
        OutPoint::new(hash("53685b8809efc50dd7d5cb0906b307a1b8aa5157baa5fc1bd6fe2d0344dd193a"), 0),
        494_000,
        Script::from_hex("76a914f84c7f4dd3c3dc311676444fdead6e6d290d50e388ac").unwrap(),
    );
    let plan = TransactionPlan {
        amount: 488_000,
        available_amount: 494_000,
        fee: 6_000,
        change: 0,
        utxos: vec![utxo.clone()],
        outputs: vec![payment("t1QahNjDdibyE4EdYkawUSKBBcVTSqv64CS", 488_000)],
        branch_id: Some(SAPLING_BRANCH_ID),
        expiry_height: Some(0),
        output_op_return: vec![],
    };
    let input = SigningInput::new(CoinType::Zcash, vec![], vec![utxo], 1, "")
        .with_private_keys(vec![key(
            "a9684f5bebd0e1208aae2e02bc9e9163bd1965ad23d8538644e1df8b99b99559",
        )])
        .with_plan(plan);

    let output = TransactionSigner::sign_input(&input).unwrap();
    let expected = concat!(
        "04000080",
        "85202f89",
        "01",
        "53685b8809efc50dd7d5cb0906b307a1b8aa5157baa5fc1bd6fe2d0344dd193a00000000",
        "6b483045022100ca0be9f37a4975432a52bb65b25e483f6f93d577955290bb7fb0060a93bfc920",
        "02203e0627dff004d3c72a957dc9f8e4e0e696e69d125e4d8e275d119001924d3b4801",
        "2103b243171fae5516d1dc15f9178cfcc5fdc67b0a883055c117b01ba8af29b953f6",
        "ffffffff",
        "01",
        "4072070000000000",
        "1976a91449964a736f3713d64283fd0018626ba50091c7e988ac",
        "00000000",
        "00000000",
        "0000000000000000",
        "00",
        "00",
        "00",
    );
    assert_eq!(output.encoded_hex(), expected);
}

#[test]
fn test_plan_then_sign() {
    let input = SigningInput::new(
        CoinType::Bitcoin,
        vec![PaymentOutput::new("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 100_000_000)],
        bitcoin_utxos(),
        10,
        "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU",
    )
    .with_private_keys(bitcoin_keys());

    let mut signer = TransactionSigner::new(&input);
    assert_eq!(signer.state(), &SignerState::Unplanned);
    let plan = signer.plan().unwrap();
    assert!(plan.is_balanced());
    assert_eq!(plan.outputs.last().map(|o| o.is_change), Some(true));

    let output = signer.sign().unwrap();
    assert_eq!(output.plan, plan);
    // a second sign returns the same transaction
    assert_eq!(signer.sign().unwrap(), output);
}

#[test]
fn test_sign_insufficient_funds() {
    let input = SigningInput::new(
        CoinType::Bitcoin,
        vec![PaymentOutput::new("1Bp9U1ogV3A14FMvKbRJms7ctyso4Z4Tcx", 2_000_000_000)],
        bitcoin_utxos(),
        1,
        "1FQc5LdgGHMHEN9nwkjmz6tWkxhPpxBvBU",
    )
    .with_private_keys(bitcoin_keys());
    let mut signer = TransactionSigner::new(&input);
    assert_matches!(signer.sign(), Err(Error::InsufficientFunds { .. }));
    assert_eq!(signer.state(), &SignerState::Failed);
}

#[test]
fn test_sign_account_coin_unsupported() {
    let input = SigningInput::new(CoinType::Ethereum, vec![], vec![], 1, "").with_plan(
        TransactionPlan {
            amount: 1,
            available_amount: 1,
            fee: 0,
            change: 0,
            utxos: vec![],
            outputs: vec![],
            branch_id: None,
            expiry_height: None,
            output_op_return: vec![],
        },
    );
    assert_matches!(TransactionSigner::sign_input(&input), Err(Error::UnsupportedCoin(_)));
}
