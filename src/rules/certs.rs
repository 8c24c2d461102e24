//! The stake-certificate state machine. Certificates are checked left to
//! right against a transient registration overlay; violations accumulate
//! instead of short-circuiting so the whole sequence is diagnosed at once.

use std::collections::BTreeSet;

use crate::context::ValidationContext;
use crate::errors::{CertViolation, TransactionError};
use crate::primitives::{Certificate, Coin, StakeCredential, Transaction};
use crate::state::LedgerState;
use crate::sts::Validator;

/// Transient view of registrations while walking a certificate sequence.
struct Overlay<'a> {
    state: &'a LedgerState,
    newly_registered: BTreeSet<StakeCredential>,
    deregistered: BTreeSet<StakeCredential>,
}

impl<'a> Overlay<'a> {
    fn new(state: &'a LedgerState) -> Self {
        Self {
            state,
            newly_registered: BTreeSet::new(),
            deregistered: BTreeSet::new(),
        }
    }

    fn is_registered(&self, cred: &StakeCredential) -> bool {
        if self.deregistered.contains(cred) {
            return false;
        }
        self.newly_registered.contains(cred) || self.state.certs.delegation.is_registered(cred)
    }

    fn register(&mut self, cred: StakeCredential) {
        self.deregistered.remove(&cred);
        self.newly_registered.insert(cred);
    }

    fn deregister(&mut self, cred: StakeCredential) {
        self.newly_registered.remove(&cred);
        self.deregistered.insert(cred);
    }

    fn recorded_deposit(&self, cred: &StakeCredential, fallback: Coin) -> Coin {
        self.state
            .certs
            .delegation
            .deposits
            .get(cred)
            .copied()
            .unwrap_or(fallback)
    }
}

fn check_registration(
    overlay: &mut Overlay<'_>,
    violations: &mut Vec<CertViolation>,
    cred: StakeCredential,
    deposit: Option<Coin>,
    required_deposit: Coin,
) {
    if overlay.is_registered(&cred) {
        violations.push(CertViolation::AlreadyRegistered { credential: cred });
        return;
    }
    if let Some(supplied) = deposit {
        if supplied != required_deposit {
            violations.push(CertViolation::InvalidDeposit {
                credential: cred,
                supplied,
                required: required_deposit,
            });
            return;
        }
    }
    overlay.register(cred);
}

pub struct StakeCertificates;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for StakeCertificates
{
    fn name(&self) -> &'static str {
        "stake-certificates"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let required_deposit = ctx.params.stake_address_deposit;
        let mut overlay = Overlay::new(state);
        let mut violations = Vec::new();

        for cert in &tx.body.certificates {
            match cert {
                Certificate::StakeRegistration(cred) => {
                    check_registration(&mut overlay, &mut violations, *cred, None, required_deposit);
                }
                Certificate::Reg(cred, deposit) => {
                    check_registration(
                        &mut overlay,
                        &mut violations,
                        *cred,
                        Some(*deposit),
                        required_deposit,
                    );
                }
                Certificate::StakeRegDeleg(cred, _, deposit)
                | Certificate::VoteRegDeleg(cred, _, deposit)
                | Certificate::StakeVoteRegDeleg(cred, _, _, deposit) => {
                    check_registration(
                        &mut overlay,
                        &mut violations,
                        *cred,
                        Some(*deposit),
                        required_deposit,
                    );
                }
                Certificate::StakeDeregistration(cred) | Certificate::UnReg(cred, _) => {
                    if !overlay.is_registered(cred) {
                        violations.push(CertViolation::MissingRegistration { credential: *cred });
                        continue;
                    }
                    if let Certificate::UnReg(_, refund) = cert {
                        let recorded = overlay.recorded_deposit(cred, required_deposit);
                        if *refund != recorded {
                            violations.push(CertViolation::RefundMismatch {
                                credential: *cred,
                                supplied: *refund,
                                recorded,
                            });
                        }
                    }
                    let balance = state.certs.delegation.reward_balance(cred);
                    if balance != 0 {
                        violations.push(CertViolation::RewardsNotZero {
                            credential: *cred,
                            balance,
                        });
                    }
                    overlay.deregister(*cred);
                }
                Certificate::StakeDelegation(cred, _) | Certificate::VoteDeleg(cred, _)
                | Certificate::StakeVoteDeleg(cred, _, _) => {
                    if !overlay.is_registered(cred) {
                        violations.push(CertViolation::MissingRegistration { credential: *cred });
                    }
                }
                // DRep registration uses its own deposit schedule.
                Certificate::RegDRepCert(cred, deposit) => {
                    if state.certs.voting.drep_deposits.contains_key(cred) {
                        violations.push(CertViolation::AlreadyRegistered { credential: *cred });
                    } else if *deposit != ctx.params.drep_deposit {
                        violations.push(CertViolation::InvalidDeposit {
                            credential: *cred,
                            supplied: *deposit,
                            required: ctx.params.drep_deposit,
                        });
                    }
                }
                Certificate::UnRegDRepCert(cred, refund) => {
                    match state.certs.voting.drep_deposits.get(cred) {
                        None => violations
                            .push(CertViolation::MissingRegistration { credential: *cred }),
                        Some(recorded) if recorded != refund => {
                            violations.push(CertViolation::RefundMismatch {
                                credential: *cred,
                                supplied: *refund,
                                recorded: *recorded,
                            });
                        }
                        Some(_) => {}
                    }
                }
                Certificate::UpdateDRepCert(cred) => {
                    if !state.certs.voting.drep_deposits.contains_key(cred) {
                        violations
                            .push(CertViolation::MissingRegistration { credential: *cred });
                    }
                }
                Certificate::PoolRegistration { .. } | Certificate::PoolRetirement(..) => {}
            }
        }

        if !violations.is_empty() {
            return Err(TransactionError::StakeCertificates {
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
    use crate::primitives::{AddrKeyhash, NetworkId, TransactionBody, WitnessSet};

    fn cred(n: u8) -> StakeCredential {
        StakeCredential::AddrKeyhash(AddrKeyhash::from([n; 28]))
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default())
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
    fn register_then_delegate_in_one_sequence() {
        let tx = tx_with_certs(vec![
            Certificate::Reg(cred(1), 2_000_000),
            Certificate::StakeDelegation(cred(1), AddrKeyhash::from([9u8; 28])),
        ]);
        assert!(
            StakeCertificates
                .validate(&ctx(), &LedgerState::default(), &tx)
                .is_ok()
        );
    }

    #[test]
    fn double_registration_is_flagged() {
        let tx = tx_with_certs(vec![
            Certificate::Reg(cred(1), 2_000_000),
            Certificate::Reg(cred(1), 2_000_000),
        ]);
        match StakeCertificates.validate(&ctx(), &LedgerState::default(), &tx) {
            Err(TransactionError::StakeCertificates { violations, .. }) => {
                assert_eq!(violations.len(), 1);
                assert!(matches!(
                    violations[0],
                    CertViolation::AlreadyRegistered { .. }
                ));
            }
            other => panic!("expected StakeCertificates, got {other:?}"),
        }
    }

    #[test]
    fn wrong_deposit_is_flagged() {
        let tx = tx_with_certs(vec![Certificate::Reg(cred(1), 42)]);
        match StakeCertificates.validate(&ctx(), &LedgerState::default(), &tx) {
            Err(TransactionError::StakeCertificates { violations, .. }) => {
                assert!(matches!(violations[0], CertViolation::InvalidDeposit { .. }));
            }
            other => panic!("expected StakeCertificates, got {other:?}"),
        }
    }

    #[test]
    fn deregistration_requires_zero_rewards_and_exact_refund() {
        let mut state = LedgerState::default();
        state.certs.delegation.register(cred(1), 2_000_000);
        state.certs.delegation.rewards.insert(cred(1), 55);

        let tx = tx_with_certs(vec![Certificate::UnReg(cred(1), 1_999_999)]);
        match StakeCertificates.validate(&ctx(), &state, &tx) {
            Err(TransactionError::StakeCertificates { violations, .. }) => {
                assert_eq!(violations.len(), 2);
                assert!(violations.iter().any(|violation| matches!(
                    violation,
                    CertViolation::RefundMismatch { supplied: 1_999_999, recorded: 2_000_000, .. }
                )));
                assert!(violations.iter().any(|violation| matches!(
                    violation,
                    CertViolation::RewardsNotZero { balance: 55, .. }
                )));
            }
            other => panic!("expected StakeCertificates, got {other:?}"),
        }
    }

    #[test]
    fn delegating_an_unregistered_credential_is_flagged() {
        let tx = tx_with_certs(vec![Certificate::VoteDeleg(
            cred(2),
            crate::primitives::DRep::Abstain,
        )]);
        match StakeCertificates.validate(&ctx(), &LedgerState::default(), &tx) {
            Err(TransactionError::StakeCertificates { violations, .. }) => {
                assert!(matches!(
                    violations[0],
                    CertViolation::MissingRegistration { .. }
                ));
            }
            other => panic!("expected StakeCertificates, got {other:?}"),
        }
    }

    #[test]
    fn deregister_then_reregister_is_allowed() {
        let mut state = LedgerState::default();
        state.certs.delegation.register(cred(1), 2_000_000);
        let tx = tx_with_certs(vec![
            Certificate::UnReg(cred(1), 2_000_000),
            Certificate::Reg(cred(1), 2_000_000),
        ]);
        assert!(StakeCertificates.validate(&ctx(), &state, &tx).is_ok());
    }
}
