//! weir, a Cardano ledger core.
//!
//! Two tightly coupled subsystems: a phase-1 rules engine (a pipeline of
//! predicates and state transitions over the ledger state) and a phase-2
//! Plutus Core evaluator (a budget-metered CEK machine). Both are pure:
//! all state travels through explicit values, and identical inputs always
//! produce identical verdicts, fees and execution-unit measurements.

pub mod context;
pub mod errors;
pub mod machine;
pub mod mutators;
pub mod params;
pub mod phase2;
pub mod primitives;
pub mod rules;
pub mod script_data;
pub mod state;
pub mod sts;

use std::collections::BTreeMap;

use tracing::debug;

pub use context::ValidationContext;
pub use errors::TransactionError;
pub use params::{ProtocolParams, SlotConfig};
pub use primitives::{ExUnits, RedeemersKey, Transaction};
pub use script_data::compute_script_data_hash;
pub use state::{LedgerState, Utxos};

use phase2::EvaluationMode;
use sts::Mutator;

/// Runs the full validator pipeline, then the canonical mutator pipeline.
/// On success the returned state reflects the transaction; on failure the
/// input state is untouched.
pub fn apply_transaction(
    ctx: &ValidationContext,
    state: &LedgerState,
    tx: &Transaction,
) -> Result<LedgerState, TransactionError> {
    debug!(transaction_id = %tx.id(), "applying transaction");
    sts::validate_all(&rules::phase1_validators(), ctx, state, tx)?;

    let phase2_mutator = mutators::PlutusScriptsTransactionMutator::new(state.utxos.clone());
    let pipeline: [&dyn Mutator<_, _, _, _>; 5] = [
        &mutators::RemoveInputsFromUtxo,
        &phase2_mutator,
        &mutators::AddOutputsToUtxo,
        &mutators::FeeMutator,
        &mutators::StakeCertificatesMutator,
    ];
    sts::mutate_all(&pipeline, ctx, state.clone(), tx)
}

/// Standalone phase-2 evaluation for fee estimation and pre-submission
/// checks: measures the execution units of every redeemer without
/// enforcing declared budgets.
pub fn evaluate_plutus_scripts(
    tx: &Transaction,
    utxos: &Utxos,
    params: &ProtocolParams,
    slot_config: &SlotConfig,
) -> Result<BTreeMap<RedeemersKey, ExUnits>, TransactionError> {
    let transaction_id = tx.id();
    let outcome = phase2::evaluate_transaction(
        tx,
        utxos,
        params,
        slot_config,
        EvaluationMode::EvaluateAndComputeCost,
    )
    .map_err(|error| TransactionError::PlutusScriptValidation {
        transaction_id,
        message: error.to_string(),
        logs: vec![],
    })?;

    if let Some(failure) = outcome.failure {
        return Err(TransactionError::PlutusScriptValidation {
            transaction_id,
            message: failure.message,
            logs: failure.logs,
        });
    }
    Ok(outcome.ex_units)
}
