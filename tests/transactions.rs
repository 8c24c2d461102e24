//! End-to-end transaction application scenarios: happy path, declared
//! phase-2 failure with collateral forfeiture, network mismatches, budget
//! exhaustion and reference scripts.

use pallas_addresses::{Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_crypto::key::ed25519::SecretKey;
use pretty_assertions::assert_eq;

use weir::context::ValidationContext;
use weir::errors::TransactionError;
use weir::params::ProtocolParams;
use weir::primitives::{
    AddrKeyhash, DatumOption, ExUnits, NetworkId, PlutusData, RedeemerTag, RedeemersKey,
    RedeemersValue, Script, Transaction, TransactionBody, TransactionInput, TransactionOutput,
    TxHash, VKeyWitness, Value, WitnessSet,
};
use weir::state::{LedgerState, Utxos};
use weir::{apply_transaction, compute_script_data_hash, evaluate_plutus_scripts};

/// Test parameters: no size-proportional fees so conservation stays easy
/// to write by hand; collateral and execution-unit rules stay live.
fn params() -> ProtocolParams {
    ProtocolParams {
        min_fee_a: 0,
        min_fee_b: 0,
        utxo_cost_per_byte: 0,
        min_fee_ref_script_cost_per_byte: 0,
        ..ProtocolParams::default()
    }
}

fn ctx() -> ValidationContext {
    ValidationContext::new(NetworkId::Testnet, 100, 1, params())
}

fn payment_key() -> SecretKey {
    SecretKey::from([42u8; 32])
}

fn payment_key_hash() -> AddrKeyhash {
    pallas_crypto::hash::Hasher::<224>::hash(payment_key().public_key().as_ref())
}

fn key_address(hash: AddrKeyhash) -> Address {
    Address::Shelley(ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::Key(hash),
        ShelleyDelegationPart::Null,
    ))
}

fn script_address(script: &Script) -> Address {
    Address::Shelley(ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::Script(script.hash()),
        ShelleyDelegationPart::Null,
    ))
}

fn cbor_wrap(flat: Vec<u8>) -> Vec<u8> {
    minicbor::to_vec(minicbor::bytes::ByteVec::from(flat)).unwrap()
}

/// `(lam (lam (lam unit)))`: drops datum, redeemer and context.
fn always_succeeds() -> Script {
    Script::PlutusV2(cbor_wrap(vec![0x01, 0x00, 0x00, 0x22, 0x24, 0x99]))
}

/// `(lam (lam (lam error)))`.
fn always_fails() -> Script {
    Script::PlutusV2(cbor_wrap(vec![0x01, 0x00, 0x00, 0x22, 0x26, 0x01]))
}

/// Omega: `(\x -> x x) (\x -> x x)`, which loops until the budget runs
/// out.
fn diverges() -> Script {
    Script::PlutusV2(cbor_wrap(vec![
        0x01, 0x00, 0x00, 0x32, 0x30, 0x01, 0x00, 0x12, 0x30, 0x01, 0x00, 0x11,
    ]))
}

fn spend_redeemer(units: ExUnits) -> (RedeemersKey, RedeemersValue) {
    (
        RedeemersKey {
            tag: RedeemerTag::Spend,
            index: 0,
        },
        RedeemersValue {
            data: PlutusData::integer(0),
            ex_units: units,
        },
    )
}

fn sign(tx: &mut Transaction) {
    let key = payment_key();
    let signature = key.sign(tx.id().as_ref());
    tx.witness_set.vkeywitness.push(VKeyWitness {
        vkey: key.public_key().as_ref().to_vec(),
        signature: signature.as_ref().to_vec(),
    });
}

struct ScriptSpend {
    state: LedgerState,
    tx: Transaction,
    script_input: TransactionInput,
    collateral_input: TransactionInput,
}

/// A 10-ada UTxO locked by `script` is spent; a 5-ada key-locked UTxO
/// backs collateral. The transaction pays 9.8 ada out and 0.2 ada fee.
fn script_spend(script: Script, is_valid: bool) -> ScriptSpend {
    let script_input = TransactionInput::new(TxHash::from([0xaa; 32]), 0);
    let collateral_input = TransactionInput::new(TxHash::from([0xbb; 32]), 0);

    let mut utxos = Utxos::new();
    utxos.insert(
        script_input,
        TransactionOutput::new(script_address(&script), Value::from_coin(10_000_000))
            .with_datum(DatumOption::Inline(PlutusData::integer(1))),
    );
    utxos.insert(
        collateral_input,
        TransactionOutput::new(key_address(payment_key_hash()), Value::from_coin(5_000_000)),
    );
    let state = LedgerState::from_utxos(utxos);

    let mut witness_set = WitnessSet::default();
    match &script {
        Script::PlutusV2(bytes) => witness_set.plutus_v2_script.push(bytes.clone()),
        _ => panic!("tests only use v2 scripts"),
    }
    let (key, value) = spend_redeemer(ExUnits::new(1_000_000, 1_000_000_000));
    witness_set.redeemer.insert(key, value);

    let mut body = TransactionBody {
        inputs: [script_input].into(),
        outputs: vec![TransactionOutput::new(
            key_address(payment_key_hash()),
            Value::from_coin(9_800_000),
        )],
        fee: 200_000,
        collateral: [collateral_input].into(),
        collateral_return: Some(TransactionOutput::new(
            key_address(payment_key_hash()),
            Value::from_coin(4_700_000),
        )),
        total_collateral: Some(300_000),
        ..TransactionBody::default()
    };
    let mut probe = Transaction::new(body.clone(), witness_set.clone());
    body.script_data_hash = compute_script_data_hash(&probe, &state.utxos, &params());
    probe.body = body;
    probe.is_valid = is_valid;

    let mut tx = probe;
    sign(&mut tx);
    ScriptSpend {
        state,
        tx,
        script_input,
        collateral_input,
    }
}

#[test]
fn script_spend_happy_path() {
    let setup = script_spend(always_succeeds(), true);
    let after = apply_transaction(&ctx(), &setup.state, &setup.tx).unwrap();

    let produced = TransactionInput::new(setup.tx.id(), 0);
    assert!(after.utxos.contains_key(&produced));
    assert_eq!(after.utxos[&produced].lovelace(), 9_800_000);
    assert!(!after.utxos.contains_key(&setup.script_input));
    // collateral untouched on the valid path
    assert!(after.utxos.contains_key(&setup.collateral_input));
    assert_eq!(after.fees, 200_000);
}

#[test]
fn declared_failure_takes_the_collateral_path() {
    let setup = script_spend(always_fails(), false);
    let after = apply_transaction(&ctx(), &setup.state, &setup.tx).unwrap();

    // the spent input survives, the collateral is consumed
    assert!(after.utxos.contains_key(&setup.script_input));
    assert!(!after.utxos.contains_key(&setup.collateral_input));
    // no transaction outputs are produced
    assert!(!after.utxos.contains_key(&TransactionInput::new(setup.tx.id(), 0)));
    // the collateral return lands at index |outputs|
    let return_pointer = TransactionInput::new(setup.tx.id(), 1);
    assert_eq!(after.utxos[&return_pointer].lovelace(), 4_700_000);
    // forfeited collateral becomes the fee
    assert_eq!(after.fees, 300_000);
}

#[test]
fn succeeding_script_with_invalid_flag_is_a_hard_error() {
    let setup = script_spend(always_succeeds(), false);
    match apply_transaction(&ctx(), &setup.state, &setup.tx) {
        Err(TransactionError::UnexpectedPhase2Outcome { is_valid, .. }) => {
            assert!(!is_valid)
        }
        other => panic!("expected UnexpectedPhase2Outcome, got {other:?}"),
    }
}

#[test]
fn failing_script_with_valid_flag_is_rejected() {
    let setup = script_spend(always_fails(), true);
    match apply_transaction(&ctx(), &setup.state, &setup.tx) {
        Err(TransactionError::PlutusScriptValidation { .. }) => {}
        other => panic!("expected PlutusScriptValidation, got {other:?}"),
    }
}

#[test]
fn budget_exhaustion_rejects_a_valid_flagged_transaction() {
    let setup = script_spend(diverges(), true);
    match apply_transaction(&ctx(), &setup.state, &setup.tx) {
        Err(TransactionError::PlutusScriptValidation { message, .. }) => {
            assert!(message.contains("budget"), "unexpected message: {message}")
        }
        other => panic!("expected PlutusScriptValidation, got {other:?}"),
    }
}

#[test]
fn wrong_network_outputs_report_every_offender() {
    let input = TransactionInput::new(TxHash::from([1u8; 32]), 0);
    let mut utxos = Utxos::new();
    utxos.insert(
        input,
        TransactionOutput::new(key_address(payment_key_hash()), Value::from_coin(2_000_000)),
    );
    let state = LedgerState::from_utxos(utxos);

    let testnet_address = key_address(payment_key_hash());
    let body = TransactionBody {
        inputs: [input].into(),
        outputs: vec![
            TransactionOutput::new(testnet_address.clone(), Value::from_coin(1_000_000)),
            TransactionOutput::new(testnet_address, Value::from_coin(900_000)),
        ],
        fee: 100_000,
        ..TransactionBody::default()
    };
    let mut tx = Transaction::new(body, WitnessSet::default());
    sign(&mut tx);

    let mainnet_ctx = ValidationContext::new(NetworkId::Mainnet, 100, 1, params());
    match apply_transaction(&mainnet_ctx, &state, &tx) {
        Err(TransactionError::WrongNetworkAddress { offenders, .. }) => {
            assert_eq!(offenders.len(), 2)
        }
        other => panic!("expected WrongNetworkAddress, got {other:?}"),
    }
}

#[test]
fn reference_script_resolution() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let script = always_succeeds();

    // T1's output carries the validator as a reference script.
    let reference_input = TransactionInput::new(TxHash::from([0xcc; 32]), 0);
    let script_input = TransactionInput::new(TxHash::from([0xaa; 32]), 0);
    let collateral_input = TransactionInput::new(TxHash::from([0xbb; 32]), 0);

    let mut utxos = Utxos::new();
    utxos.insert(
        reference_input,
        TransactionOutput::new(key_address(payment_key_hash()), Value::from_coin(2_000_000))
            .with_script_ref(script.clone()),
    );
    utxos.insert(
        script_input,
        TransactionOutput::new(script_address(&script), Value::from_coin(10_000_000))
            .with_datum(DatumOption::Inline(PlutusData::integer(1))),
    );
    utxos.insert(
        collateral_input,
        TransactionOutput::new(key_address(payment_key_hash()), Value::from_coin(5_000_000)),
    );
    let state = LedgerState::from_utxos(utxos);

    // T2 spends the script UTxO with no script witness at all.
    let mut witness_set = WitnessSet::default();
    let (key, value) = spend_redeemer(ExUnits::new(1_000_000, 1_000_000_000));
    witness_set.redeemer.insert(key, value);

    let mut body = TransactionBody {
        inputs: [script_input].into(),
        reference_inputs: [reference_input].into(),
        outputs: vec![TransactionOutput::new(
            key_address(payment_key_hash()),
            Value::from_coin(9_800_000),
        )],
        fee: 200_000,
        collateral: [collateral_input].into(),
        ..TransactionBody::default()
    };
    let probe = Transaction::new(body.clone(), witness_set.clone());
    body.script_data_hash = compute_script_data_hash(&probe, &state.utxos, &params());
    let mut tx = Transaction::new(body, witness_set);
    sign(&mut tx);

    let after = apply_transaction(&ctx(), &state, &tx)?;
    assert!(after.utxos.contains_key(&TransactionInput::new(tx.id(), 0)));
    assert_eq!(after.fees, 200_000);
    Ok(())
}

#[test]
fn standalone_evaluation_measures_units() {
    let slot_config = weir::params::SlotConfig::default();
    let setup = script_spend(always_succeeds(), true);
    let report =
        evaluate_plutus_scripts(&setup.tx, &setup.state.utxos, &params(), &slot_config).unwrap();
    let units = report
        .get(&RedeemersKey {
            tag: RedeemerTag::Spend,
            index: 0,
        })
        .unwrap();
    assert!(units.mem > 0 && units.steps > 0);

    // determinism: a second run measures identical units
    let again =
        evaluate_plutus_scripts(&setup.tx, &setup.state.utxos, &params(), &slot_config).unwrap();
    assert_eq!(report, again);
}
