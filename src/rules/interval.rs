//! Validity interval rules.

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::Transaction;
use crate::state::LedgerState;
use crate::sts::Validator;

/// The current slot must lie within `[validity_start, ttl)`; the upper
/// bound is exclusive.
pub struct OutsideValidityInterval;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for OutsideValidityInterval
{
    fn name(&self) -> &'static str {
        "outside-validity-interval"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let start = tx.body.validity_interval_start;
        let end = tx.body.ttl;
        let out_of_range = start.is_some_and(|start| ctx.slot < start)
            || end.is_some_and(|end| ctx.slot >= end);
        if out_of_range {
            return Err(TransactionError::OutsideValidityInterval {
                transaction_id: tx.id(),
                slot: ctx.slot,
                start,
                end,
            });
        }
        Ok(())
    }
}

/// When scripts will observe the validity interval, both of its bounds
/// must convert to wall-clock time under the current slot configuration.
pub struct OutsideForecast;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for OutsideForecast {
    fn name(&self) -> &'static str {
        "outside-forecast"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        if tx.witness_set.redeemer.is_empty() {
            return Ok(());
        }
        for bound in [tx.body.validity_interval_start, tx.body.ttl]
            .into_iter()
            .flatten()
        {
            if ctx.slot_config.slot_to_posix_time(bound).is_none() {
                return Err(TransactionError::OutsideForecast {
                    transaction_id: tx.id(),
                    slot: bound,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ProtocolParams;
    use crate::primitives::{NetworkId, TransactionBody, WitnessSet};

    fn context(slot: u64) -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, slot, 0, ProtocolParams::default())
    }

    fn tx_with_interval(start: Option<u64>, end: Option<u64>) -> Transaction {
        Transaction::new(
            TransactionBody {
                validity_interval_start: start,
                ttl: end,
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        )
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let tx = tx_with_interval(Some(10), Some(10));
        let state = LedgerState::default();
        // the degenerate interval [s, s) contains nothing, not even s
        assert!(
            OutsideValidityInterval
                .validate(&context(10), &state, &tx)
                .is_err()
        );
        let tx = tx_with_interval(Some(10), Some(11));
        assert!(
            OutsideValidityInterval
                .validate(&context(10), &state, &tx)
                .is_ok()
        );
        assert!(
            OutsideValidityInterval
                .validate(&context(11), &state, &tx)
                .is_err()
        );
    }

    #[test]
    fn open_bounds_always_pass() {
        let tx = tx_with_interval(None, None);
        assert!(
            OutsideValidityInterval
                .validate(&context(999), &LedgerState::default(), &tx)
                .is_ok()
        );
    }
}
