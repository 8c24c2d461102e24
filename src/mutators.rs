//! The canonical mutator pipeline. Ordering is consensus: inputs leave the
//! utxo set, phase-2 settles which path the transaction takes, outputs and
//! fees land, certificates apply.
//!
//! The invalid path (phase-2 failure expected and observed) takes effect
//! entirely inside [`PlutusScriptsTransactionMutator`]; the surrounding
//! mutators are no-ops for such transactions.

use tracing::debug;

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::phase2::{EvaluationMode, evaluate_transaction};
use crate::primitives::{Certificate, Transaction, TransactionInput};
use crate::state::{LedgerState, PoolParams, Utxos};
use crate::sts::Mutator;

/// Collateral return outputs land at an index clamped to the 16-bit wire
/// range.
const COLLATERAL_RETURN_INDEX_CAP: u64 = 65_535;

/// Spent inputs leave the utxo set (valid path only; the invalid path
/// consumes collateral instead).
pub struct RemoveInputsFromUtxo;

impl Mutator<ValidationContext, LedgerState, Transaction, TransactionError>
    for RemoveInputsFromUtxo
{
    fn name(&self) -> &'static str {
        "remove-inputs-from-utxo"
    }

    fn mutate(
        &self,
        _ctx: &ValidationContext,
        mut state: LedgerState,
        tx: &Transaction,
    ) -> Result<LedgerState, TransactionError> {
        if tx.is_valid {
            for input in &tx.body.inputs {
                state.utxos.remove(input);
            }
        }
        Ok(state)
    }
}

/// Runs phase-2 and applies its verdict: thread outputs and donation on
/// success, consume collateral on expected failure, hard-fail on any
/// disagreement with the `is_valid` flag.
pub struct PlutusScriptsTransactionMutator {
    /// Utxo view captured before inputs were removed; script resolution
    /// needs the spent outputs.
    resolved: Utxos,
}

impl PlutusScriptsTransactionMutator {
    pub fn new(resolved: Utxos) -> Self {
        Self { resolved }
    }
}

impl Mutator<ValidationContext, LedgerState, Transaction, TransactionError>
    for PlutusScriptsTransactionMutator
{
    fn name(&self) -> &'static str {
        "plutus-scripts-transaction"
    }

    fn mutate(
        &self,
        ctx: &ValidationContext,
        mut state: LedgerState,
        tx: &Transaction,
    ) -> Result<LedgerState, TransactionError> {
        let transaction_id = tx.id();

        if tx.witness_set.redeemer.is_empty() {
            // Nothing for phase-2 to decide; expecting failure is a
            // contradiction.
            if !tx.is_valid {
                return Err(TransactionError::UnexpectedPhase2Outcome {
                    transaction_id,
                    is_valid: false,
                });
            }
            if let Some(donation) = tx.body.donation {
                state.donations = state
                    .donations
                    .checked_add(donation)
                    .ok_or(TransactionError::NumericOverflow { transaction_id })?;
            }
            return Ok(state);
        }

        let outcome = evaluate_transaction(
            tx,
            &self.resolved,
            &ctx.params,
            &ctx.slot_config,
            EvaluationMode::Validate,
        )
        .map_err(|error| TransactionError::PlutusScriptValidation {
            transaction_id,
            message: error.to_string(),
            logs: vec![],
        })?;

        match (&outcome.failure, tx.is_valid) {
            (None, true) => {
                debug!(%transaction_id, scripts = outcome.ex_units.len(), "phase-2 succeeded");
                for (index, output) in tx.body.outputs.iter().enumerate() {
                    state.utxos.insert(
                        TransactionInput::new(transaction_id, index as u64),
                        output.clone(),
                    );
                }
                if let Some(donation) = tx.body.donation {
                    state.donations = state
                        .donations
                        .checked_add(donation)
                        .ok_or(TransactionError::NumericOverflow { transaction_id })?;
                }
                Ok(state)
            }
            (Some(failure), false) => {
                debug!(%transaction_id, reason = %failure.message, "phase-2 failed as declared, consuming collateral");
                let mut forfeited: u64 = 0;
                for input in &tx.body.collateral {
                    if let Some(output) = state.utxos.remove(input) {
                        forfeited = forfeited
                            .checked_add(output.lovelace())
                            .ok_or(TransactionError::NumericOverflow { transaction_id })?;
                    }
                }
                if let Some(output) = &tx.body.collateral_return {
                    forfeited = forfeited.saturating_sub(output.lovelace());
                    let index = (tx.body.outputs.len() as u64).min(COLLATERAL_RETURN_INDEX_CAP);
                    state
                        .utxos
                        .insert(TransactionInput::new(transaction_id, index), output.clone());
                }
                state.fees = state
                    .fees
                    .checked_add(forfeited)
                    .ok_or(TransactionError::NumericOverflow { transaction_id })?;
                Ok(state)
            }
            (Some(failure), true) => Err(TransactionError::PlutusScriptValidation {
                transaction_id,
                message: failure.message.clone(),
                logs: failure.logs.clone(),
            }),
            (None, false) => Err(TransactionError::UnexpectedPhase2Outcome {
                transaction_id,
                is_valid: false,
            }),
        }
    }
}

/// Produced outputs enter the utxo set at `(txId, index)`. Idempotent with
/// the success path of the phase-2 mutator; kept for standalone use.
pub struct AddOutputsToUtxo;

impl Mutator<ValidationContext, LedgerState, Transaction, TransactionError> for AddOutputsToUtxo {
    fn name(&self) -> &'static str {
        "add-outputs-to-utxo"
    }

    fn mutate(
        &self,
        _ctx: &ValidationContext,
        mut state: LedgerState,
        tx: &Transaction,
    ) -> Result<LedgerState, TransactionError> {
        if tx.is_valid {
            let transaction_id = tx.id();
            for (index, output) in tx.body.outputs.iter().enumerate() {
                state.utxos.insert(
                    TransactionInput::new(transaction_id, index as u64),
                    output.clone(),
                );
            }
        }
        Ok(state)
    }
}

/// Accumulates the declared fee into the ledger's fee pot.
pub struct FeeMutator;

impl Mutator<ValidationContext, LedgerState, Transaction, TransactionError> for FeeMutator {
    fn name(&self) -> &'static str {
        "fee"
    }

    fn mutate(
        &self,
        _ctx: &ValidationContext,
        mut state: LedgerState,
        tx: &Transaction,
    ) -> Result<LedgerState, TransactionError> {
        if tx.is_valid {
            state.fees = state
                .fees
                .checked_add(tx.body.fee)
                .ok_or(TransactionError::NumericOverflow {
                    transaction_id: tx.id(),
                })?;
        }
        Ok(state)
    }
}

/// Applies accepted certificates to the certificate state. Runs after the
/// validators, so the sequence is known to be well formed.
pub struct StakeCertificatesMutator;

impl Mutator<ValidationContext, LedgerState, Transaction, TransactionError>
    for StakeCertificatesMutator
{
    fn name(&self) -> &'static str {
        "stake-certificates"
    }

    fn mutate(
        &self,
        ctx: &ValidationContext,
        mut state: LedgerState,
        tx: &Transaction,
    ) -> Result<LedgerState, TransactionError> {
        if !tx.is_valid {
            return Ok(state);
        }
        for cert in &tx.body.certificates {
            match cert {
                Certificate::StakeRegistration(cred) => {
                    state
                        .certs
                        .delegation
                        .register(*cred, ctx.params.stake_address_deposit);
                }
                Certificate::Reg(cred, deposit) => {
                    state.certs.delegation.register(*cred, *deposit);
                }
                Certificate::StakeDeregistration(cred) | Certificate::UnReg(cred, _) => {
                    state.certs.delegation.deregister(cred);
                }
                Certificate::StakeDelegation(cred, pool) => {
                    state.certs.delegation.stake_pools.insert(*cred, *pool);
                }
                Certificate::VoteDeleg(cred, drep) => {
                    state.certs.delegation.dreps.insert(*cred, *drep);
                }
                Certificate::StakeVoteDeleg(cred, pool, drep) => {
                    state.certs.delegation.stake_pools.insert(*cred, *pool);
                    state.certs.delegation.dreps.insert(*cred, *drep);
                }
                Certificate::StakeRegDeleg(cred, pool, deposit) => {
                    state.certs.delegation.register(*cred, *deposit);
                    state.certs.delegation.stake_pools.insert(*cred, *pool);
                }
                Certificate::VoteRegDeleg(cred, drep, deposit) => {
                    state.certs.delegation.register(*cred, *deposit);
                    state.certs.delegation.dreps.insert(*cred, *drep);
                }
                Certificate::StakeVoteRegDeleg(cred, pool, drep, deposit) => {
                    state.certs.delegation.register(*cred, *deposit);
                    state.certs.delegation.stake_pools.insert(*cred, *pool);
                    state.certs.delegation.dreps.insert(*cred, *drep);
                }
                Certificate::RegDRepCert(cred, deposit) => {
                    state.certs.voting.drep_deposits.insert(*cred, *deposit);
                }
                Certificate::UnRegDRepCert(cred, _) => {
                    state.certs.voting.drep_deposits.remove(cred);
                }
                Certificate::UpdateDRepCert(_) => {}
                Certificate::PoolRegistration {
                    operator,
                    vrf_keyhash,
                    pledge,
                    cost,
                    margin,
                    reward_account,
                    pool_owners,
                    ..
                } => {
                    state.certs.pools.stake_pools.insert(
                        *operator,
                        PoolParams {
                            vrf_keyhash: *vrf_keyhash,
                            pledge: *pledge,
                            cost: *cost,
                            margin: margin.clone(),
                            reward_account: reward_account.clone(),
                            pool_owners: pool_owners.iter().copied().collect(),
                        },
                    );
                    // Re-registration cancels a pending retirement.
                    state.certs.pools.retiring.remove(operator);
                }
                Certificate::PoolRetirement(pool, epoch) => {
                    state.certs.pools.retiring.insert(*pool, *epoch);
                }
            }
        }
        Ok(state)
    }
}
