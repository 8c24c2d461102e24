//! The fee predicate: minimum fee (size, execution units, reference
//! scripts) and the collateral regime.

use num::{BigInt, BigRational, ToPrimitive};

use crate::context::ValidationContext;
use crate::errors::{FeeViolation, TransactionError};
use crate::params::ProtocolParams;
use crate::primitives::{Coin, ExUnits, Transaction, UnitInterval, Value};
use crate::state::{LedgerState, Utxos};
use crate::sts::Validator;

/// Reference scripts are priced in 25 KiB tiers, each tier 1.2 times more
/// expensive than the previous one.
const REF_SCRIPT_TIER: u64 = 25_600;

fn rational(interval: &UnitInterval) -> BigRational {
    BigRational::new(
        BigInt::from(interval.numerator),
        BigInt::from(interval.denominator.max(1)),
    )
}

fn ceil_to_coin(value: BigRational) -> Coin {
    value
        .ceil()
        .to_integer()
        .to_u64()
        .unwrap_or(u64::MAX)
}

/// Fee owed for the declared execution units.
pub fn ex_units_fee(total: &ExUnits, params: &ProtocolParams) -> Coin {
    let mem = BigRational::from_integer(BigInt::from(total.mem))
        * rational(&params.ex_unit_prices.mem_price);
    let steps = BigRational::from_integer(BigInt::from(total.steps))
        * rational(&params.ex_unit_prices.step_price);
    ceil_to_coin(mem + steps)
}

/// Total serialized size of scripts provided by reference, across both
/// spent and reference inputs.
pub fn ref_scripts_size(tx: &Transaction, utxos: &Utxos) -> u64 {
    tx.body
        .inputs
        .iter()
        .chain(tx.body.reference_inputs.iter())
        .filter_map(|input| utxos.get(input))
        .filter_map(|output| output.script_ref.as_ref())
        .map(|script| {
            minicbor::to_vec(script)
                .expect("script encoding to a vector cannot fail")
                .len() as u64
        })
        .sum()
}

/// Tiered reference-script fee over the total provided script size.
pub fn ref_scripts_fee(total_size: u64, params: &ProtocolParams) -> Coin {
    let multiplier = BigRational::new(BigInt::from(6), BigInt::from(5));
    let base = BigRational::from_integer(BigInt::from(params.min_fee_ref_script_cost_per_byte));

    let mut fee = BigRational::from_integer(BigInt::from(0));
    let mut price = base;
    let mut remaining = total_size;
    while remaining > 0 {
        let chunk = remaining.min(REF_SCRIPT_TIER);
        fee += BigRational::from_integer(BigInt::from(chunk)) * price.clone();
        price *= multiplier.clone();
        remaining -= chunk;
    }
    fee.floor().to_integer().to_u64().unwrap_or(u64::MAX)
}

/// The minimum fee of a transaction: size fee plus execution-unit fee plus
/// the reference-script fee.
pub fn min_fee(tx: &Transaction, utxos: &Utxos, params: &ProtocolParams) -> Coin {
    let size_fee = params
        .min_fee_b
        .saturating_add(params.min_fee_a.saturating_mul(tx.encoded_size()));
    let total_units = tx.witness_set.redeemer.total_ex_units().unwrap_or(ExUnits {
        mem: u64::MAX,
        steps: u64::MAX,
    });
    size_fee
        .saturating_add(ex_units_fee(&total_units, params))
        .saturating_add(ref_scripts_fee(ref_scripts_size(tx, utxos), params))
}

/// The compound fee predicate. All sub-violations are collected and
/// reported together.
pub struct FeesOk;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for FeesOk {
    fn name(&self) -> &'static str {
        "fees-ok"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut violations = Vec::new();

        let minimum = min_fee(tx, &state.utxos, &ctx.params);
        if tx.body.fee < minimum {
            violations.push(FeeViolation::FeeTooSmall {
                minimum,
                actual: tx.body.fee,
            });
        }

        let total_units = tx
            .witness_set
            .redeemer
            .total_ex_units()
            .unwrap_or(ExUnits::ZERO);

        // A transaction without script execution needs no collateral.
        if !total_units.is_zero() {
            if tx.body.collateral.is_empty() {
                violations.push(FeeViolation::NoCollateralInputs);
            }

            let not_key_locked: Vec<_> = tx
                .body
                .collateral
                .iter()
                .filter(|input| {
                    state
                        .utxos
                        .get(input)
                        .map(|output| !output.is_key_locked())
                        .unwrap_or(false)
                })
                .copied()
                .collect();
            if !not_key_locked.is_empty() {
                violations.push(FeeViolation::CollateralNotKeyLocked {
                    offenders: not_key_locked,
                });
            }

            let mut collateral_in = Value::default();
            for input in &tx.body.collateral {
                if let Some(output) = state.utxos.get(input) {
                    collateral_in = collateral_in
                        .checked_add(&output.value)
                        .map_err(|_| TransactionError::NumericOverflow {
                            transaction_id: tx.id(),
                        })?;
                }
            }
            let collateral_return = tx
                .body
                .collateral_return
                .as_ref()
                .map(|output| output.value.clone())
                .unwrap_or_default();

            // After change, only ada may be consumed.
            if collateral_in.assets != collateral_return.assets {
                violations.push(FeeViolation::CollateralNotAdaOnly);
            }

            let paid = collateral_in
                .coin
                .saturating_sub(collateral_return.coin);
            let required = tx
                .body
                .fee
                .checked_mul(ctx.params.collateral_percentage)
                .ok_or(TransactionError::NumericOverflow {
                    transaction_id: tx.id(),
                })?;
            if paid.checked_mul(100).map(|scaled| scaled < required).unwrap_or(false) {
                violations.push(FeeViolation::CollateralInsufficient {
                    provided: paid,
                    fee: tx.body.fee,
                    percentage: ctx.params.collateral_percentage,
                });
            }

            if let Some(annotated) = tx.body.total_collateral {
                if annotated != paid {
                    violations.push(FeeViolation::TotalCollateralMismatch {
                        annotated,
                        actual: paid,
                    });
                }
            }
        }

        if !violations.is_empty() {
            return Err(TransactionError::FeesOk {
                transaction_id: tx.id(),
                violations,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        AddrKeyhash, NetworkId, PlutusData, RedeemerTag, Redeemers, RedeemersKey, RedeemersValue,
        ScriptHash, TransactionBody, TransactionInput, TransactionOutput, TxHash, WitnessSet,
    };
    use pallas_addresses::{
        Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart,
    };

    fn key_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(AddrKeyhash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    fn script_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Script(ScriptHash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    fn redeemers_with_units(mem: u64, steps: u64) -> Redeemers {
        let mut redeemers = Redeemers::default();
        redeemers.insert(
            RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0,
            },
            RedeemersValue {
                data: PlutusData::unit(),
                ex_units: ExUnits::new(mem, steps),
            },
        );
        redeemers
    }

    #[test]
    fn ex_units_fee_rounds_up() {
        let params = ProtocolParams::default();
        // 1 step at 721/10_000_000 lovelace must still cost a lovelace
        assert_eq!(ex_units_fee(&ExUnits::new(0, 1), &params), 1);
        assert_eq!(ex_units_fee(&ExUnits::ZERO, &params), 0);
    }

    #[test]
    fn ref_script_fee_escalates_per_tier() {
        let params = ProtocolParams::default();
        let flat = ref_scripts_fee(REF_SCRIPT_TIER, &params);
        assert_eq!(flat, REF_SCRIPT_TIER * params.min_fee_ref_script_cost_per_byte);

        // one byte into the second tier costs 1.2x the base rate, floored
        let escalated = ref_scripts_fee(REF_SCRIPT_TIER + 1, &params);
        assert_eq!(
            escalated,
            flat + (params.min_fee_ref_script_cost_per_byte * 6) / 5
        );
    }

    #[test]
    fn collateral_insufficiency_is_reported_with_the_percentage() {
        // fee 1_000_000 at 150% needs 1_500_000; 1_400_000 provided
        let collateral_input = TransactionInput::new(TxHash::from([5u8; 32]), 0);
        let mut state = LedgerState::default();
        state.utxos.insert(
            collateral_input,
            TransactionOutput::new(key_address(1), Value::from_coin(1_400_000)),
        );

        let body = TransactionBody {
            fee: 1_000_000,
            collateral: [collateral_input].into(),
            ..TransactionBody::default()
        };
        let mut witness_set = WitnessSet::default();
        witness_set.redeemer = redeemers_with_units(10, 10);
        let tx = Transaction::new(body, witness_set);

        let ctx = ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default());
        match FeesOk.validate(&ctx, &state, &tx) {
            Err(TransactionError::FeesOk { violations, .. }) => {
                assert!(violations.iter().any(|violation| matches!(
                    violation,
                    FeeViolation::CollateralInsufficient {
                        provided: 1_400_000,
                        fee: 1_000_000,
                        percentage: 150,
                    }
                )));
            }
            other => panic!("expected FeesOk error, got {other:?}"),
        }
    }

    #[test]
    fn script_collateral_is_rejected() {
        let collateral_input = TransactionInput::new(TxHash::from([5u8; 32]), 0);
        let mut state = LedgerState::default();
        state.utxos.insert(
            collateral_input,
            TransactionOutput::new(script_address(2), Value::from_coin(10_000_000)),
        );

        let body = TransactionBody {
            fee: 200_000,
            collateral: [collateral_input].into(),
            ..TransactionBody::default()
        };
        let mut witness_set = WitnessSet::default();
        witness_set.redeemer = redeemers_with_units(10, 10);
        let tx = Transaction::new(body, witness_set);

        let ctx = ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default());
        match FeesOk.validate(&ctx, &state, &tx) {
            Err(TransactionError::FeesOk { violations, .. }) => {
                assert!(violations
                    .iter()
                    .any(|violation| matches!(violation, FeeViolation::CollateralNotKeyLocked { .. })));
            }
            other => panic!("expected FeesOk error, got {other:?}"),
        }
    }

    #[test]
    fn pure_transfer_skips_collateral_checks() {
        let body = TransactionBody {
            fee: 1_000_000,
            ..TransactionBody::default()
        };
        let tx = Transaction::new(body, WitnessSet::default());
        let ctx = ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default());
        // no collateral at all, but also no ex units: only the min-fee rule
        // applies, and 1 ada covers it for an empty transaction
        assert!(FeesOk.validate(&ctx, &LedgerState::default(), &tx).is_ok());
    }
}
