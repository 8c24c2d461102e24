//! Script witness rules: hash coverage, native script evaluation,
//! well-formedness, redeemer exactness, datum coverage and the script-data
//! hash equation.

use std::collections::BTreeSet;

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::machine::flat::Program;
use crate::primitives::{DatumHash, Language, Script, Transaction};
use crate::script_data::compute_script_data_hash;
use crate::state::LedgerState;
use crate::sts::Validator;

use super::resolution::{
    available_scripts, needed_redeemers, needed_script_hashes, reference_scripts, witness_key_hashes,
    witness_scripts,
};

/// Witness scripts must be exactly the needed ones that references do not
/// already provide.
pub struct MissingOrExtraScriptHashes;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for MissingOrExtraScriptHashes
{
    fn name(&self) -> &'static str {
        "missing-or-extra-script-hashes"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let needed = needed_script_hashes(tx, &state.utxos);
        let provided: BTreeSet<_> = witness_scripts(tx).into_keys().collect();
        let by_reference: BTreeSet<_> = reference_scripts(tx, &state.utxos).into_keys().collect();

        let missing: BTreeSet<_> = needed
            .iter()
            .filter(|hash| !by_reference.contains(*hash) && !provided.contains(*hash))
            .copied()
            .collect();
        let extra: BTreeSet<_> = provided
            .iter()
            .filter(|hash| !needed.contains(*hash))
            .copied()
            .collect();

        if !missing.is_empty() || !extra.is_empty() {
            return Err(TransactionError::MissingOrExtraScriptHashes {
                transaction_id: tx.id(),
                missing,
                extra,
            });
        }
        Ok(())
    }
}

/// Every needed native script evaluates to true against the validity
/// interval and the present signatories.
pub struct NativeScripts;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for NativeScripts {
    fn name(&self) -> &'static str {
        "native-scripts"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let needed = needed_script_hashes(tx, &state.utxos);
        let available = available_scripts(tx, &state.utxos);
        let signatories = witness_key_hashes(tx);

        let failed: Vec<_> = needed
            .iter()
            .filter_map(|hash| match available.get(hash) {
                Some(Script::Native(script)) => Some((hash, script)),
                _ => None,
            })
            .filter(|(_, script)| {
                !script.eval(
                    tx.body.validity_interval_start,
                    tx.body.ttl,
                    &signatories,
                )
            })
            .map(|(hash, _)| *hash)
            .collect();

        if !failed.is_empty() {
            return Err(TransactionError::NativeScripts {
                transaction_id: tx.id(),
                failed,
            });
        }
        Ok(())
    }
}

/// Every provided Plutus script must decode as well-formed Plutus Core for
/// its language version.
pub struct ScriptsWellFormed;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for ScriptsWellFormed
{
    fn name(&self) -> &'static str {
        "scripts-well-formed"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut malformed = Vec::new();
        for script in tx.witness_set.scripts() {
            let language = match script.language() {
                Some(language) => language,
                None => continue,
            };
            let bytes = script.plutus_bytes().unwrap_or_default();
            if !well_formed(bytes, language) {
                malformed.push(script.hash());
            }
        }
        if !malformed.is_empty() {
            return Err(TransactionError::IllFormedScripts {
                transaction_id: tx.id(),
                scripts: malformed,
            });
        }
        Ok(())
    }
}

fn well_formed(bytes: &[u8], language: Language) -> bool {
    match Program::from_cbor(bytes) {
        Ok(program) => language >= Language::PlutusV3 || !program.uses_sums_of_products(),
        Err(_) => false,
    }
}

/// The declared redeemer pointers must be exactly the needed ones.
pub struct ExactSetOfRedeemers;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for ExactSetOfRedeemers
{
    fn name(&self) -> &'static str {
        "exact-set-of-redeemers"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let needed: BTreeSet<_> = needed_redeemers(tx, &state.utxos).into_iter().collect();
        let declared: BTreeSet<_> = tx.witness_set.redeemer.keys().copied().collect();

        let missing: Vec<_> = needed.difference(&declared).copied().collect();
        let extra: Vec<_> = declared.difference(&needed).copied().collect();

        if !missing.is_empty() || !extra.is_empty() {
            return Err(TransactionError::ExactSetOfRedeemers {
                transaction_id: tx.id(),
                missing,
                extra,
            });
        }
        Ok(())
    }
}

/// Hash datums of Plutus-locked inputs need their preimages witnessed;
/// witnessed datums must be reachable from the transaction.
pub struct MissingRequiredDatums;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for MissingRequiredDatums
{
    fn name(&self) -> &'static str {
        "missing-required-datums"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let available = available_scripts(tx, &state.utxos);
        let witnessed: BTreeSet<DatumHash> =
            tx.witness_set.datums_by_hash().into_keys().collect();

        // Datum hashes the scripts will demand: spent inputs locked by a
        // Plutus script and carrying a hash datum.
        let mut required: BTreeSet<DatumHash> = BTreeSet::new();
        for input in &tx.body.inputs {
            let Some(output) = state.utxos.get(input) else {
                continue;
            };
            let plutus_locked = output
                .payment_script_hash()
                .and_then(|hash| available.get(&hash))
                .map(|script| script.is_plutus())
                .unwrap_or(false);
            if plutus_locked {
                if let Some(hash) = output.datum_hash() {
                    required.insert(hash);
                }
            }
        }

        let missing: BTreeSet<_> = required.difference(&witnessed).copied().collect();

        // Every other witnessed datum must appear somewhere the
        // transaction can see: its outputs, the collateral return, spent
        // inputs or reference inputs.
        let mut allowed = required.clone();
        for output in tx
            .body
            .outputs
            .iter()
            .chain(tx.body.collateral_return.iter())
        {
            if let Some(hash) = output.datum_hash() {
                allowed.insert(hash);
            }
        }
        for input in tx.body.inputs.iter().chain(tx.body.reference_inputs.iter()) {
            if let Some(hash) = state.utxos.get(input).and_then(|output| output.datum_hash()) {
                allowed.insert(hash);
            }
        }
        let supplemental: BTreeSet<_> = witnessed.difference(&allowed).copied().collect();

        if !missing.is_empty() || !supplemental.is_empty() {
            return Err(TransactionError::Datums {
                transaction_id: tx.id(),
                missing,
                supplemental,
            });
        }
        Ok(())
    }
}

/// The annotated script-data hash must equal the recomputed one, exactly
/// when the transaction involves Plutus scripts. Skipped for transactions
/// that expect phase-2 failure.
pub struct ProtocolParamsViewHashesMatch;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for ProtocolParamsViewHashesMatch
{
    fn name(&self) -> &'static str {
        "protocol-params-view-hashes-match"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        if !tx.is_valid {
            return Ok(());
        }
        let computed = compute_script_data_hash(tx, &state.utxos, &ctx.params);
        if tx.body.script_data_hash != computed {
            return Err(TransactionError::InvalidScriptDataHash {
                transaction_id: tx.id(),
                annotated: tx.body.script_data_hash,
                computed,
            });
        }
        Ok(())
    }
}
