//! Input presence and disjointness rules.

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::Transaction;
use crate::state::LedgerState;
use crate::sts::Validator;

use super::resolution::missing_inputs;

/// The set of transaction inputs must not be empty.
pub struct EmptyInputs;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for EmptyInputs {
    fn name(&self) -> &'static str {
        "empty-inputs"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        if tx.body.inputs.is_empty() {
            return Err(TransactionError::EmptyInputs {
                transaction_id: tx.id(),
            });
        }
        Ok(())
    }
}

/// Every input, collateral input and reference input must resolve in the
/// UTxO set.
pub struct AllInputsMustBeInUtxo;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for AllInputsMustBeInUtxo
{
    fn name(&self) -> &'static str {
        "all-inputs-in-utxo"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let missing = missing_inputs(&state.utxos, &tx.body.inputs);
        if !missing.is_empty() {
            return Err(TransactionError::BadInputsUtxo {
                transaction_id: tx.id(),
                missing,
            });
        }
        let missing = missing_inputs(&state.utxos, &tx.body.collateral);
        if !missing.is_empty() {
            return Err(TransactionError::BadCollateralInputsUtxo {
                transaction_id: tx.id(),
                missing,
            });
        }
        let missing = missing_inputs(&state.utxos, &tx.body.reference_inputs);
        if !missing.is_empty() {
            return Err(TransactionError::BadReferenceInputsUtxo {
                transaction_id: tx.id(),
                missing,
            });
        }
        Ok(())
    }
}

/// Spent inputs and reference inputs must not overlap.
pub struct InputsAndReferenceInputsDisjoint;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ProtocolParams;
    use crate::primitives::{NetworkId, TransactionBody, TransactionInput, TxHash, WitnessSet};

    fn ctx() -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default())
    }

    #[test]
    fn no_inputs_is_rejected() {
        let tx = Transaction::new(TransactionBody::default(), WitnessSet::default());
        assert!(matches!(
            EmptyInputs.validate(&ctx(), &LedgerState::default(), &tx),
            Err(TransactionError::EmptyInputs { .. })
        ));
    }

    #[test]
    fn unresolvable_inputs_are_reported_per_category() {
        let missing = TransactionInput::new(TxHash::from([9u8; 32]), 0);
        let tx = Transaction::new(
            TransactionBody {
                inputs: [missing].into(),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        match AllInputsMustBeInUtxo.validate(&ctx(), &LedgerState::default(), &tx) {
            Err(TransactionError::BadInputsUtxo { missing: set, .. }) => {
                assert_eq!(set, [missing].into())
            }
            other => panic!("expected BadInputsUtxo, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_reference_inputs_are_rejected() {
        let shared = TransactionInput::new(TxHash::from([1u8; 32]), 0);
        let tx = Transaction::new(
            TransactionBody {
                inputs: [shared].into(),
                reference_inputs: [shared].into(),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        assert!(matches!(
            InputsAndReferenceInputsDisjoint.validate(&ctx(), &LedgerState::default(), &tx),
            Err(TransactionError::NonDisjointInputsAndReferenceInputs { .. })
        ));
    }
}

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for InputsAndReferenceInputsDisjoint
{
    fn name(&self) -> &'static str {
        "inputs-and-reference-inputs-disjoint"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let overlap: std::collections::BTreeSet<_> = tx
            .body
            .inputs
            .intersection(&tx.body.reference_inputs)
            .copied()
            .collect();
        if !overlap.is_empty() {
            return Err(TransactionError::NonDisjointInputsAndReferenceInputs {
                transaction_id: tx.id(),
                overlap,
            });
        }
        Ok(())
    }
}
