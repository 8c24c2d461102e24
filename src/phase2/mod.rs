//! Phase-2: running the Plutus scripts a transaction invokes and metering
//! their cost.

pub mod script_context;
pub mod to_plutus_data;

use std::collections::BTreeMap;

use tracing::debug;

use crate::machine::{CostModel, ExBudget, Machine, Program, apply_data_args};
use crate::params::{ProtocolParams, SlotConfig};
use crate::primitives::{ExUnits, Language, PlutusData, RedeemersKey, Script, Transaction};
use crate::state::Utxos;

pub use script_context::Phase2Error;
use script_context::{DataLookupTable, build_script_context, build_tx_info, find_script,
    resolve_purpose};

/// How the evaluator budgets each script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Consensus validation: every script gets an equal slice of the
    /// transaction budget and must stay inside it.
    Validate,
    /// Cost measurement for fee estimation: effectively unbounded budget,
    /// measured units reported.
    EvaluateAndComputeCost,
}

/// One failed script, with the diagnostics it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFailure {
    pub key: RedeemersKey,
    pub message: String,
    pub logs: Vec<String>,
}

/// The result of running every redeemer: measured units per redeemer and
/// the first failure, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Phase2Outcome {
    pub ex_units: BTreeMap<RedeemersKey, ExUnits>,
    pub failure: Option<ScriptFailure>,
}

/// Runs every script the transaction's redeemers point at.
///
/// Resolution problems (missing scripts, undecodable programs, purposes
/// that do not exist) surface as errors; script-level failures land in the
/// outcome so the caller can take the invalid-transaction path.
pub fn evaluate_transaction(
    tx: &Transaction,
    utxos: &Utxos,
    params: &ProtocolParams,
    slot_config: &SlotConfig,
    mode: EvaluationMode,
) -> Result<Phase2Outcome, Phase2Error> {
    let redeemer_count = tx.witness_set.redeemer.len() as u64;
    if redeemer_count == 0 {
        return Ok(Phase2Outcome::default());
    }

    let table = DataLookupTable::from_transaction(tx, utxos);
    let mut tx_infos: BTreeMap<Language, PlutusData> = BTreeMap::new();
    let mut outcome = Phase2Outcome::default();

    for (key, redeemer) in tx.witness_set.redeemer.iter() {
        let purpose = resolve_purpose(tx, key)?;
        let (script, datum) = find_script(&purpose, key, utxos, &table)?;
        let language = match script.language() {
            Some(language) => language,
            None => return Err(Phase2Error::NonScriptPurpose(*key)),
        };

        let hash = script.hash();
        let program = match &script {
            Script::Native(_) => return Err(Phase2Error::NonScriptPurpose(*key)),
            Script::PlutusV1(bytes) | Script::PlutusV2(bytes) | Script::PlutusV3(bytes) => {
                Program::from_cbor(bytes).map_err(|_| Phase2Error::IllFormedScript(hash))?
            }
        };

        if !tx_infos.contains_key(&language) {
            let info = build_tx_info(tx, utxos, slot_config, language)?;
            tx_infos.insert(language, info);
        }
        let tx_info = tx_infos[&language].clone();
        let context =
            build_script_context(language, tx_info, &purpose, datum.as_ref(), &redeemer.data)?;

        let mut args: Vec<PlutusData> = Vec::new();
        if language != Language::PlutusV3 {
            if let Some(datum) = &datum {
                args.push(datum.clone());
            }
            args.push(redeemer.data.clone());
        }
        args.push(context);
        let applied = apply_data_args(program.term, &args);

        let limit = match mode {
            EvaluationMode::Validate => {
                let total = ExBudget::from_ex_units(&params.max_tx_ex_units);
                ExBudget {
                    mem: total.mem / redeemer_count as i64,
                    cpu: total.cpu / redeemer_count as i64,
                }
            }
            EvaluationMode::EvaluateAndComputeCost => ExBudget::max(),
        };
        let costs = params
            .cost_models
            .get(language)
            .map(|values| CostModel::from_params(values))
            .unwrap_or_default();

        let mut machine = Machine::new(costs, limit);
        let result = machine.run(&applied);
        let consumed = machine.consumed();
        debug!(redeemer = %format!("{}:{}", key.tag, key.index), mem = consumed.mem, steps = consumed.steps, "script evaluated");
        outcome.ex_units.insert(*key, consumed);

        let failure = match result {
            Ok(value) if value.is_unit() => None,
            Ok(_) => Some(crate::machine::MachineError::ResultNotUnit.to_string()),
            Err(error) => Some(error.to_string()),
        };
        if let Some(message) = failure {
            outcome.failure = Some(ScriptFailure {
                key: *key,
                message,
                logs: machine.logs.clone(),
            });
            // The first failure settles the phase-2 verdict; later scripts
            // would run against the same state anyway.
            break;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        AddrKeyhash, DatumOption, RedeemerTag, RedeemersValue, ScriptHash, TransactionBody,
        TransactionInput, TransactionOutput, TxHash, Value, WitnessSet,
    };
    use pallas_addresses::{
        Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart,
    };

    // (program 1.0.0 (lam (lam (lam (con unit ()))))): a V2 spend script
    // that ignores datum, redeemer and context and returns unit.
    // bits: 0010 0010 0010 0100 1 0011 0 + padding
    fn always_succeeds_v2() -> Vec<u8> {
        let flat: Vec<u8> = vec![0x01, 0x00, 0x00, 0x22, 0x24, 0x99];
        minicbor::to_vec(minicbor::bytes::ByteVec::from(flat)).unwrap()
    }

    // (program 1.0.0 (lam (lam (lam (error))))): always fails.
    // bits: 0010 0010 0010 0110 + padding
    fn always_fails_v2() -> Vec<u8> {
        let flat: Vec<u8> = vec![0x01, 0x00, 0x00, 0x22, 0x26, 0x01];
        minicbor::to_vec(minicbor::bytes::ByteVec::from(flat)).unwrap()
    }

    fn script_locked_setup(script_bytes: Vec<u8>) -> (Transaction, Utxos) {
        let script = Script::PlutusV2(script_bytes.clone());
        let script_address = Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Script(script.hash()),
            ShelleyDelegationPart::Null,
        ));
        let input = TransactionInput::new(TxHash::from([0xaa; 32]), 0);
        let mut utxos = Utxos::new();
        utxos.insert(
            input,
            TransactionOutput::new(script_address, Value::from_coin(10_000_000))
                .with_datum(DatumOption::Inline(PlutusData::integer(1))),
        );

        let out_address = Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(AddrKeyhash::from([1u8; 28])),
            ShelleyDelegationPart::Null,
        ));
        let mut witness_set = WitnessSet::default();
        witness_set.plutus_v2_script.push(script_bytes);
        witness_set.redeemer.insert(
            RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0,
            },
            RedeemersValue {
                data: PlutusData::integer(0),
                ex_units: ExUnits::new(1_000_000, 1_000_000_000),
            },
        );
        let body = TransactionBody {
            inputs: [input].into(),
            outputs: vec![TransactionOutput::new(
                out_address,
                Value::from_coin(9_800_000),
            )],
            fee: 200_000,
            ..TransactionBody::default()
        };
        (Transaction::new(body, witness_set), utxos)
    }

    #[test]
    fn succeeding_script_reports_units_and_no_failure() {
        let (tx, utxos) = script_locked_setup(always_succeeds_v2());
        let outcome = evaluate_transaction(
            &tx,
            &utxos,
            &ProtocolParams::default(),
            &SlotConfig::default(),
            EvaluationMode::EvaluateAndComputeCost,
        )
        .unwrap();
        assert!(outcome.failure.is_none());
        let units = outcome
            .ex_units
            .get(&RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0,
            })
            .unwrap();
        assert!(units.mem > 0 && units.steps > 0);
    }

    #[test]
    fn failing_script_lands_in_the_outcome() {
        let (tx, utxos) = script_locked_setup(always_fails_v2());
        let outcome = evaluate_transaction(
            &tx,
            &utxos,
            &ProtocolParams::default(),
            &SlotConfig::default(),
            EvaluationMode::Validate,
        )
        .unwrap();
        let failure = outcome.failure.expect("script must fail");
        assert_eq!(
            failure.key,
            RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0
            }
        );
    }

    #[test]
    fn missing_script_is_a_resolution_error() {
        let (mut tx, utxos) = script_locked_setup(always_succeeds_v2());
        tx.witness_set.plutus_v2_script.clear();
        let result = evaluate_transaction(
            &tx,
            &utxos,
            &ProtocolParams::default(),
            &SlotConfig::default(),
            EvaluationMode::Validate,
        );
        assert!(matches!(result, Err(Phase2Error::MissingScript(_))));
    }

    #[test]
    fn no_redeemers_means_empty_outcome() {
        let tx = Transaction::new(TransactionBody::default(), WitnessSet::default());
        let outcome = evaluate_transaction(
            &tx,
            &Utxos::new(),
            &ProtocolParams::default(),
            &SlotConfig::default(),
            EvaluationMode::Validate,
        )
        .unwrap();
        assert!(outcome.ex_units.is_empty() && outcome.failure.is_none());
    }
}
