//! Stake pool certificate rules.

use crate::context::ValidationContext;
use crate::errors::{PoolViolation, TransactionError};
use crate::primitives::{Certificate, Transaction};
use crate::state::LedgerState;
use crate::sts::Validator;

/// Pool registration must respect the minimum cost; retirement must name a
/// registered pool and land within the retirement window. The window is
/// expressed in epochs, which is why the context carries the current epoch
/// explicitly.
pub struct StakePoolCertificates;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for StakePoolCertificates
{
    fn name(&self) -> &'static str {
        "stake-pool-certificates"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut violations = Vec::new();
        let mut registered_in_tx = std::collections::BTreeSet::new();

        for cert in &tx.body.certificates {
            match cert {
                Certificate::PoolRegistration { operator, cost, .. } => {
                    if *cost < ctx.params.min_pool_cost {
                        violations.push(PoolViolation::CostBelowMinimum {
                            pool: *operator,
                            cost: *cost,
                            minimum: ctx.params.min_pool_cost,
                        });
                    }
                    registered_in_tx.insert(*operator);
                }
                Certificate::PoolRetirement(pool, epoch) => {
                    let known = state.certs.pools.stake_pools.contains_key(pool)
                        || registered_in_tx.contains(pool);
                    if !known {
                        violations.push(PoolViolation::NotRegistered { pool: *pool });
                    }
                    let latest = ctx.epoch + ctx.params.pool_retire_max_epoch;
                    if *epoch <= ctx.epoch || *epoch > latest {
                        violations.push(PoolViolation::RetirementOutOfBounds {
                            pool: *pool,
                            epoch: *epoch,
                            current: ctx.epoch,
                            latest,
                        });
                    }
                }
                _ => {}
            }
        }

        if !violations.is_empty() {
            return Err(TransactionError::StakePool {
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
    use crate::params::ProtocolParams;
    use crate::primitives::{
        NetworkId, PoolKeyhash, RewardAccount, TransactionBody, UnitInterval, VrfKeyhash,
        WitnessSet,
    };
    use crate::state::PoolParams;

    fn pool(n: u8) -> PoolKeyhash {
        PoolKeyhash::from([n; 28])
    }

    fn registration(operator: PoolKeyhash, cost: u64) -> Certificate {
        Certificate::PoolRegistration {
            operator,
            vrf_keyhash: VrfKeyhash::from([0u8; 32]),
            pledge: 0,
            cost,
            margin: UnitInterval {
                numerator: 1,
                denominator: 100,
            },
            reward_account: RewardAccount::from_key(
                NetworkId::Testnet,
                PoolKeyhash::from([1u8; 28]),
            ),
            pool_owners: [].into(),
            relays: vec![],
            pool_metadata: None,
        }
    }

    fn ctx(epoch: u64) -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, 0, epoch, ProtocolParams::default())
    }

    fn tx_with_certs(certs: Vec<Certificate>) -> Transaction {
        Transaction::new(
            TransactionBody {
                certificates: certs,
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        )
    }

    #[test]
    fn cheap_pools_are_rejected() {
        let minimum = ProtocolParams::default().min_pool_cost;
        let tx = tx_with_certs(vec![registration(pool(1), minimum - 1)]);
        assert!(matches!(
            StakePoolCertificates.validate(&ctx(0), &LedgerState::default(), &tx),
            Err(TransactionError::StakePool { .. })
        ));

        let tx = tx_with_certs(vec![registration(pool(1), minimum)]);
        assert!(
            StakePoolCertificates
                .validate(&ctx(0), &LedgerState::default(), &tx)
                .is_ok()
        );
    }

    #[test]
    fn retirement_window_is_half_open() {
        let mut state = LedgerState::default();
        state.certs.pools.stake_pools.insert(
            pool(1),
            PoolParams {
                vrf_keyhash: VrfKeyhash::from([0u8; 32]),
                pledge: 0,
                cost: 170_000_000,
                margin: UnitInterval {
                    numerator: 1,
                    denominator: 100,
                },
                reward_account: RewardAccount::from_key(
                    NetworkId::Testnet,
                    PoolKeyhash::from([1u8; 28]),
                ),
                pool_owners: vec![],
            },
        );

        let window = ProtocolParams::default().pool_retire_max_epoch;
        let current = 10;

        // retiring in the current epoch is too early
        let tx = tx_with_certs(vec![Certificate::PoolRetirement(pool(1), current)]);
        assert!(StakePoolCertificates.validate(&ctx(current), &state, &tx).is_err());

        let tx = tx_with_certs(vec![Certificate::PoolRetirement(pool(1), current + 1)]);
        assert!(StakePoolCertificates.validate(&ctx(current), &state, &tx).is_ok());

        let tx = tx_with_certs(vec![Certificate::PoolRetirement(pool(1), current + window)]);
        assert!(StakePoolCertificates.validate(&ctx(current), &state, &tx).is_ok());

        let tx = tx_with_certs(vec![Certificate::PoolRetirement(
            pool(1),
            current + window + 1,
        )]);
        assert!(StakePoolCertificates.validate(&ctx(current), &state, &tx).is_err());
    }

    #[test]
    fn retiring_an_unknown_pool_is_flagged() {
        let tx = tx_with_certs(vec![Certificate::PoolRetirement(pool(9), 11)]);
        match StakePoolCertificates.validate(&ctx(10), &LedgerState::default(), &tx) {
            Err(TransactionError::StakePool { violations, .. }) => {
                assert!(matches!(violations[0], PoolViolation::NotRegistered { .. }));
            }
            other => panic!("expected StakePool, got {other:?}"),
        }
    }
}
