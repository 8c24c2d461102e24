//! Size and resource-limit rules.

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::Transaction;
use crate::state::LedgerState;
use crate::sts::Validator;

/// The serialized transaction must fit the protocol's size limit.
pub struct TransactionSize;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for TransactionSize {
    fn name(&self) -> &'static str {
        "transaction-size"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let actual = tx.encoded_size();
        if actual > ctx.params.max_tx_size {
            return Err(TransactionError::InvalidTransactionSize {
                transaction_id: tx.id(),
                actual,
                maximum: ctx.params.max_tx_size,
            });
        }
        Ok(())
    }
}

/// Total declared execution units must not exceed the per-transaction
/// maximum. The limit itself is acceptable.
pub struct ExUnitsTooBig;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for ExUnitsTooBig {
    fn name(&self) -> &'static str {
        "ex-units-too-big"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let total = tx
            .witness_set
            .redeemer
            .total_ex_units()
            .ok_or(TransactionError::NumericOverflow {
                transaction_id: tx.id(),
            })?;
        if !total.fits_within(&ctx.params.max_tx_ex_units) {
            return Err(TransactionError::ExUnitsExceedMax {
                transaction_id: tx.id(),
                actual: total,
                maximum: ctx.params.max_tx_ex_units,
            });
        }
        Ok(())
    }
}

/// Collateral input count limit.
pub struct TooManyCollateralInputs;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for TooManyCollateralInputs
{
    fn name(&self) -> &'static str {
        "too-many-collateral-inputs"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let actual = tx.body.collateral.len() as u64;
        if actual > ctx.params.max_collateral_inputs {
            return Err(TransactionError::TooManyCollateralInputs {
                transaction_id: tx.id(),
                actual,
                maximum: ctx.params.max_collateral_inputs,
            });
        }
        Ok(())
    }
}

/// Serialized value size limit, per output.
pub struct OutputsHaveTooBigValueStorageSize;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for OutputsHaveTooBigValueStorageSize
{
    fn name(&self) -> &'static str {
        "outputs-value-storage-size"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let maximum = ctx.params.max_value_size;
        let offenders: Vec<(usize, u64)> = tx
            .body
            .outputs
            .iter()
            .chain(tx.body.collateral_return.iter())
            .enumerate()
            .map(|(index, output)| (index, output.value.encoded_size()))
            .filter(|(_, size)| *size > maximum)
            .collect();
        if !offenders.is_empty() {
            return Err(TransactionError::OutputsHaveTooBigValueStorageSize {
                transaction_id: tx.id(),
                offenders,
                maximum,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ProtocolParams;
    use crate::primitives::{
        ExUnits, NetworkId, PlutusData, RedeemerTag, Redeemers, RedeemersKey, RedeemersValue,
        TransactionBody, TransactionInput, TxHash, WitnessSet,
    };

    fn ctx() -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default())
    }

    #[test]
    fn collateral_count_limit_is_inclusive() {
        let maximum = ProtocolParams::default().max_collateral_inputs;
        let collateral = |count: u64| {
            let inputs: std::collections::BTreeSet<_> = (0..count)
                .map(|index| TransactionInput::new(TxHash::from([7u8; 32]), index))
                .collect();
            Transaction::new(
                TransactionBody {
                    collateral: inputs,
                    ..TransactionBody::default()
                },
                WitnessSet::default(),
            )
        };
        let state = LedgerState::default();
        assert!(
            TooManyCollateralInputs
                .validate(&ctx(), &state, &collateral(maximum))
                .is_ok()
        );
        assert!(matches!(
            TooManyCollateralInputs.validate(&ctx(), &state, &collateral(maximum + 1)),
            Err(TransactionError::TooManyCollateralInputs { .. })
        ));
    }

    #[test]
    fn total_ex_units_exactly_at_the_maximum_pass() {
        let maximum = ProtocolParams::default().max_tx_ex_units;
        let with_units = |units: ExUnits| {
            let mut redeemers = Redeemers::default();
            redeemers.insert(
                RedeemersKey {
                    tag: RedeemerTag::Spend,
                    index: 0,
                },
                RedeemersValue {
                    data: PlutusData::unit(),
                    ex_units: units,
                },
            );
            let mut witness_set = WitnessSet::default();
            witness_set.redeemer = redeemers;
            Transaction::new(TransactionBody::default(), witness_set)
        };
        let state = LedgerState::default();
        assert!(
            ExUnitsTooBig
                .validate(&ctx(), &state, &with_units(maximum))
                .is_ok()
        );
        assert!(matches!(
            ExUnitsTooBig.validate(
                &ctx(),
                &state,
                &with_units(ExUnits::new(maximum.mem + 1, maximum.steps))
            ),
            Err(TransactionError::ExUnitsExceedMax { .. })
        ));
    }
}
