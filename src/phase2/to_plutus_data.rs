//! Translation of ledger types into the `Data` layouts the Plutus ledger
//! API defines. Constructor indices are consensus-critical.

use num::BigInt;
use pallas_addresses::{Address, ShelleyDelegationPart, ShelleyPaymentPart, StakePayload};

use crate::primitives::{
    Certificate, Coin, DRep, DatumOption, GovAction, GovActionId, MultiAsset, PlutusData,
    ProposalProcedure, StakeCredential, TransactionInput, TransactionOutput, UnitInterval, Vote,
    Voter, VotingProcedure,
};

use super::script_context::TimeRange;

pub trait ToPlutusData {
    fn to_plutus_data(&self) -> PlutusData;
}

impl ToPlutusData for u64 {
    fn to_plutus_data(&self) -> PlutusData {
        PlutusData::integer(*self)
    }
}

impl ToPlutusData for BigInt {
    fn to_plutus_data(&self) -> PlutusData {
        PlutusData::I(self.clone())
    }
}

impl ToPlutusData for bool {
    fn to_plutus_data(&self) -> PlutusData {
        PlutusData::constr(*self as u64, vec![])
    }
}

impl<const N: usize> ToPlutusData for pallas_crypto::hash::Hash<N> {
    fn to_plutus_data(&self) -> PlutusData {
        PlutusData::bytes(self.as_ref().to_vec())
    }
}

impl<T: ToPlutusData> ToPlutusData for Option<T> {
    fn to_plutus_data(&self) -> PlutusData {
        match self {
            Some(value) => PlutusData::constr(0, vec![value.to_plutus_data()]),
            None => PlutusData::constr(1, vec![]),
        }
    }
}

impl<T: ToPlutusData> ToPlutusData for Vec<T> {
    fn to_plutus_data(&self) -> PlutusData {
        PlutusData::list(self.iter().map(ToPlutusData::to_plutus_data).collect())
    }
}

impl ToPlutusData for PlutusData {
    fn to_plutus_data(&self) -> PlutusData {
        self.clone()
    }
}

pub fn credential_data(credential: &StakeCredential) -> PlutusData {
    match credential {
        StakeCredential::AddrKeyhash(hash) => {
            PlutusData::constr(0, vec![hash.to_plutus_data()])
        }
        StakeCredential::ScriptHash(hash) => PlutusData::constr(1, vec![hash.to_plutus_data()]),
    }
}

fn staking_credential_data(credential: &StakeCredential) -> PlutusData {
    PlutusData::constr(0, vec![credential_data(credential)])
}

pub fn address_data(address: &Address) -> PlutusData {
    match address {
        Address::Shelley(shelley) => {
            let payment = match shelley.payment() {
                ShelleyPaymentPart::Key(hash) => PlutusData::constr(0, vec![hash.to_plutus_data()]),
                ShelleyPaymentPart::Script(hash) => {
                    PlutusData::constr(1, vec![hash.to_plutus_data()])
                }
            };
            let staking = match shelley.delegation() {
                ShelleyDelegationPart::Null => PlutusData::constr(1, vec![]),
                ShelleyDelegationPart::Key(hash) => PlutusData::constr(
                    0,
                    vec![PlutusData::constr(
                        0,
                        vec![PlutusData::constr(0, vec![hash.to_plutus_data()])],
                    )],
                ),
                ShelleyDelegationPart::Script(hash) => PlutusData::constr(
                    0,
                    vec![PlutusData::constr(
                        0,
                        vec![PlutusData::constr(1, vec![hash.to_plutus_data()])],
                    )],
                ),
                // Pointers serialize as their three coordinates.
                ShelleyDelegationPart::Pointer(pointer) => PlutusData::constr(
                    0,
                    vec![PlutusData::constr(
                        1,
                        vec![
                            PlutusData::integer(pointer.slot()),
                            PlutusData::integer(pointer.tx_idx()),
                            PlutusData::integer(pointer.cert_idx()),
                        ],
                    )],
                ),
            };
            PlutusData::constr(0, vec![payment, staking])
        }
        // Byron addresses surface as a key credential over the whole
        // address root; scripts never spend them, this is display-only.
        Address::Byron(byron) => PlutusData::constr(
            0,
            vec![
                PlutusData::constr(0, vec![PlutusData::bytes(byron.to_vec())]),
                PlutusData::constr(1, vec![]),
            ],
        ),
        Address::Stake(stake) => {
            let credential = match stake.payload() {
                StakePayload::Stake(hash) => PlutusData::constr(0, vec![hash.to_plutus_data()]),
                StakePayload::Script(hash) => PlutusData::constr(1, vec![hash.to_plutus_data()]),
            };
            PlutusData::constr(0, vec![credential, PlutusData::constr(1, vec![])])
        }
    }
}

/// Values encode as nested maps. Script contexts in V1/V2 carry an
/// explicit zero-ada entry in mint values; V3 drops it.
pub fn value_data(coin: Coin, assets: &MultiAsset, include_ada: bool) -> PlutusData {
    let mut outer = Vec::new();
    if include_ada || coin > 0 {
        outer.push((
            PlutusData::bytes(vec![]),
            PlutusData::map(vec![(PlutusData::bytes(vec![]), PlutusData::integer(coin))]),
        ));
    }
    for (policy, names) in assets.iter() {
        let inner = names
            .iter()
            .map(|(name, quantity)| {
                (
                    PlutusData::bytes(name.as_slice().to_vec()),
                    PlutusData::integer(*quantity),
                )
            })
            .collect();
        outer.push((policy.to_plutus_data(), PlutusData::map(inner)));
    }
    PlutusData::map(outer)
}

/// V1/V2 `TxOutRef`: the transaction id sits in its own wrapper.
pub fn out_ref_data_v1(input: &TransactionInput) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            PlutusData::constr(0, vec![input.transaction_id.to_plutus_data()]),
            PlutusData::integer(input.index),
        ],
    )
}

/// V3 `TxOutRef`: the wrapper is gone.
pub fn out_ref_data_v3(input: &TransactionInput) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            input.transaction_id.to_plutus_data(),
            PlutusData::integer(input.index),
        ],
    )
}

pub fn output_data_v1(output: &TransactionOutput) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            address_data(&output.address),
            value_data(output.value.coin, &output.value.assets, true),
            output.datum_hash().to_plutus_data(),
        ],
    )
}

fn output_datum_data(datum: &Option<DatumOption>) -> PlutusData {
    match datum {
        None => PlutusData::constr(0, vec![]),
        Some(DatumOption::Hash(hash)) => PlutusData::constr(1, vec![hash.to_plutus_data()]),
        Some(DatumOption::Inline(data)) => PlutusData::constr(2, vec![data.clone()]),
    }
}

pub fn output_data_v2(output: &TransactionOutput) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            address_data(&output.address),
            value_data(output.value.coin, &output.value.assets, true),
            output_datum_data(&output.datum),
            output
                .script_ref
                .as_ref()
                .map(|script| script.hash())
                .to_plutus_data(),
        ],
    )
}

pub fn time_range_data(range: &TimeRange) -> PlutusData {
    let lower = match range.lower_bound {
        Some(time) => PlutusData::constr(
            0,
            vec![
                PlutusData::constr(1, vec![PlutusData::integer(time)]),
                true.to_plutus_data(),
            ],
        ),
        None => PlutusData::constr(
            0,
            vec![PlutusData::constr(0, vec![]), true.to_plutus_data()],
        ),
    };
    let upper = match range.upper_bound {
        // The ledger's upper slot bound is exclusive, hence the open
        // closure on finite upper bounds.
        Some(time) => PlutusData::constr(
            0,
            vec![
                PlutusData::constr(1, vec![PlutusData::integer(time)]),
                false.to_plutus_data(),
            ],
        ),
        None => PlutusData::constr(
            0,
            vec![PlutusData::constr(2, vec![]), true.to_plutus_data()],
        ),
    };
    PlutusData::constr(0, vec![lower, upper])
}

/// V1/V2 `DCert`.
pub fn certificate_data_v1(cert: &Certificate) -> PlutusData {
    match cert {
        Certificate::StakeRegistration(cred)
        | Certificate::Reg(cred, _)
        | Certificate::StakeRegDeleg(cred, _, _)
        | Certificate::VoteRegDeleg(cred, _, _)
        | Certificate::StakeVoteRegDeleg(cred, _, _, _) => {
            PlutusData::constr(0, vec![staking_credential_data(cred)])
        }
        Certificate::StakeDeregistration(cred) | Certificate::UnReg(cred, _) => {
            PlutusData::constr(1, vec![staking_credential_data(cred)])
        }
        Certificate::StakeDelegation(cred, pool) => PlutusData::constr(
            2,
            vec![staking_credential_data(cred), pool.to_plutus_data()],
        ),
        Certificate::PoolRegistration {
            operator,
            vrf_keyhash,
            ..
        } => PlutusData::constr(
            3,
            vec![operator.to_plutus_data(), vrf_keyhash.to_plutus_data()],
        ),
        Certificate::PoolRetirement(pool, epoch) => PlutusData::constr(
            4,
            vec![pool.to_plutus_data(), PlutusData::integer(*epoch)],
        ),
        // Vote delegation and drep certificates have no V1/V2 image; the
        // genesis constructor slot is reused as the ledger does for
        // unrepresentable certificates.
        Certificate::VoteDeleg(..)
        | Certificate::StakeVoteDeleg(..)
        | Certificate::RegDRepCert(..)
        | Certificate::UnRegDRepCert(..)
        | Certificate::UpdateDRepCert(..) => PlutusData::constr(5, vec![]),
    }
}

fn drep_data(drep: &DRep) -> PlutusData {
    match drep {
        DRep::Key(hash) => PlutusData::constr(
            0,
            vec![PlutusData::constr(0, vec![hash.to_plutus_data()])],
        ),
        DRep::Script(hash) => PlutusData::constr(
            0,
            vec![PlutusData::constr(1, vec![hash.to_plutus_data()])],
        ),
        DRep::Abstain => PlutusData::constr(1, vec![]),
        DRep::NoConfidence => PlutusData::constr(2, vec![]),
    }
}

fn delegatee_stake(pool: &crate::primitives::PoolKeyhash) -> PlutusData {
    PlutusData::constr(0, vec![pool.to_plutus_data()])
}

/// V3 `TxCert`.
pub fn certificate_data_v3(cert: &Certificate) -> PlutusData {
    match cert {
        Certificate::StakeRegistration(cred) => PlutusData::constr(
            0,
            vec![credential_data(cred), None::<u64>.to_plutus_data()],
        ),
        Certificate::Reg(cred, deposit) => PlutusData::constr(
            0,
            vec![credential_data(cred), Some(*deposit).to_plutus_data()],
        ),
        Certificate::StakeDeregistration(cred) => PlutusData::constr(
            1,
            vec![credential_data(cred), None::<u64>.to_plutus_data()],
        ),
        Certificate::UnReg(cred, refund) => PlutusData::constr(
            1,
            vec![credential_data(cred), Some(*refund).to_plutus_data()],
        ),
        Certificate::StakeDelegation(cred, pool) => {
            PlutusData::constr(2, vec![credential_data(cred), delegatee_stake(pool)])
        }
        Certificate::VoteDeleg(cred, drep) => PlutusData::constr(
            2,
            vec![
                credential_data(cred),
                PlutusData::constr(1, vec![drep_data(drep)]),
            ],
        ),
        Certificate::StakeVoteDeleg(cred, pool, drep) => PlutusData::constr(
            2,
            vec![
                credential_data(cred),
                PlutusData::constr(2, vec![pool.to_plutus_data(), drep_data(drep)]),
            ],
        ),
        Certificate::StakeRegDeleg(cred, pool, deposit) => PlutusData::constr(
            3,
            vec![
                credential_data(cred),
                delegatee_stake(pool),
                PlutusData::integer(*deposit),
            ],
        ),
        Certificate::VoteRegDeleg(cred, drep, deposit) => PlutusData::constr(
            3,
            vec![
                credential_data(cred),
                PlutusData::constr(1, vec![drep_data(drep)]),
                PlutusData::integer(*deposit),
            ],
        ),
        Certificate::StakeVoteRegDeleg(cred, pool, drep, deposit) => PlutusData::constr(
            3,
            vec![
                credential_data(cred),
                PlutusData::constr(2, vec![pool.to_plutus_data(), drep_data(drep)]),
                PlutusData::integer(*deposit),
            ],
        ),
        Certificate::RegDRepCert(cred, deposit) => PlutusData::constr(
            4,
            vec![credential_data(cred), PlutusData::integer(*deposit)],
        ),
        Certificate::UpdateDRepCert(cred) => PlutusData::constr(5, vec![credential_data(cred)]),
        Certificate::UnRegDRepCert(cred, refund) => PlutusData::constr(
            6,
            vec![credential_data(cred), PlutusData::integer(*refund)],
        ),
        Certificate::PoolRegistration {
            operator,
            vrf_keyhash,
            ..
        } => PlutusData::constr(
            7,
            vec![operator.to_plutus_data(), vrf_keyhash.to_plutus_data()],
        ),
        Certificate::PoolRetirement(pool, epoch) => PlutusData::constr(
            8,
            vec![pool.to_plutus_data(), PlutusData::integer(*epoch)],
        ),
    }
}

pub fn voter_data(voter: &Voter) -> PlutusData {
    match voter {
        Voter::ConstitutionalCommitteeScript(hash) => PlutusData::constr(
            0,
            vec![PlutusData::constr(1, vec![hash.to_plutus_data()])],
        ),
        Voter::ConstitutionalCommitteeKey(hash) => PlutusData::constr(
            0,
            vec![PlutusData::constr(0, vec![hash.to_plutus_data()])],
        ),
        Voter::DRepScript(hash) => PlutusData::constr(
            1,
            vec![PlutusData::constr(1, vec![hash.to_plutus_data()])],
        ),
        Voter::DRepKey(hash) => PlutusData::constr(
            1,
            vec![PlutusData::constr(0, vec![hash.to_plutus_data()])],
        ),
        Voter::StakePoolKey(hash) => PlutusData::constr(2, vec![hash.to_plutus_data()]),
    }
}

pub fn gov_action_id_data(id: &GovActionId) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            id.transaction_id.to_plutus_data(),
            PlutusData::integer(id.action_index),
        ],
    )
}

impl ToPlutusData for u32 {
    fn to_plutus_data(&self) -> PlutusData {
        PlutusData::integer(*self)
    }
}

pub fn vote_data(procedure: &VotingProcedure) -> PlutusData {
    PlutusData::constr(
        match procedure.vote {
            Vote::No => 0,
            Vote::Yes => 1,
            Vote::Abstain => 2,
        },
        vec![],
    )
}

fn rational_data(interval: &UnitInterval) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            PlutusData::integer(interval.numerator),
            PlutusData::integer(interval.denominator),
        ],
    )
}

fn reward_account_credential(account: &crate::primitives::RewardAccount) -> PlutusData {
    match account.stake_credential() {
        Some(cred) => credential_data(&cred),
        None => PlutusData::constr(0, vec![PlutusData::bytes(account.as_slice().to_vec())]),
    }
}

pub fn gov_action_data(action: &GovAction) -> PlutusData {
    match action {
        GovAction::ParameterChange {
            previous,
            update,
            guardrail,
        } => PlutusData::constr(
            0,
            vec![
                maybe_gov_action_id(previous),
                update.clone(),
                guardrail.to_plutus_data(),
            ],
        ),
        GovAction::HardForkInitiation {
            previous,
            protocol_version,
        } => PlutusData::constr(
            1,
            vec![
                maybe_gov_action_id(previous),
                PlutusData::constr(
                    0,
                    vec![
                        PlutusData::integer(protocol_version.0),
                        PlutusData::integer(protocol_version.1),
                    ],
                ),
            ],
        ),
        GovAction::TreasuryWithdrawals {
            withdrawals,
            guardrail,
        } => PlutusData::constr(
            2,
            vec![
                PlutusData::map(
                    withdrawals
                        .iter()
                        .map(|(account, coin)| {
                            (reward_account_credential(account), PlutusData::integer(*coin))
                        })
                        .collect(),
                ),
                guardrail.to_plutus_data(),
            ],
        ),
        GovAction::NoConfidence { previous } => {
            PlutusData::constr(3, vec![maybe_gov_action_id(previous)])
        }
        GovAction::UpdateCommittee {
            previous,
            removed,
            added,
            quorum,
        } => PlutusData::constr(
            4,
            vec![
                maybe_gov_action_id(previous),
                PlutusData::list(removed.iter().map(credential_data).collect()),
                PlutusData::map(
                    added
                        .iter()
                        .map(|(cred, epoch)| (credential_data(cred), PlutusData::integer(*epoch)))
                        .collect(),
                ),
                rational_data(quorum),
            ],
        ),
        GovAction::NewConstitution {
            previous,
            constitution,
        } => PlutusData::constr(
            5,
            vec![
                maybe_gov_action_id(previous),
                PlutusData::constr(0, vec![constitution.guardrail_script.to_plutus_data()]),
            ],
        ),
        GovAction::Information => PlutusData::constr(6, vec![]),
    }
}

fn maybe_gov_action_id(id: &Option<GovActionId>) -> PlutusData {
    match id {
        Some(id) => PlutusData::constr(0, vec![gov_action_id_data(id)]),
        None => PlutusData::constr(1, vec![]),
    }
}

pub fn proposal_data(procedure: &ProposalProcedure) -> PlutusData {
    PlutusData::constr(
        0,
        vec![
            PlutusData::integer(procedure.deposit),
            reward_account_credential(&procedure.reward_account),
            gov_action_data(&procedure.gov_action),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::AddrKeyhash;
    use pallas_addresses::{Network, ShelleyAddress};

    #[test]
    fn maybe_layout_matches_the_ledger_api() {
        assert_eq!(
            Some(7u64).to_plutus_data(),
            PlutusData::constr(0, vec![PlutusData::integer(7)])
        );
        assert_eq!(None::<u64>.to_plutus_data(), PlutusData::constr(1, vec![]));
    }

    #[test]
    fn no_stake_part_encodes_as_constr_one() {
        let address = Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(AddrKeyhash::from([1u8; 28])),
            ShelleyDelegationPart::Null,
        ));
        match address_data(&address) {
            PlutusData::Constr { tag: 0, fields } => {
                assert_eq!(fields[1], PlutusData::constr(1, vec![]));
            }
            other => panic!("unexpected address encoding {other:?}"),
        }
    }

    #[test]
    fn finite_upper_bound_is_open() {
        let range = TimeRange {
            lower_bound: Some(10),
            upper_bound: Some(20),
        };
        match time_range_data(&range) {
            PlutusData::Constr { fields, .. } => {
                // upper bound: Constr 0 [Finite 20, False]
                assert_eq!(
                    fields[1],
                    PlutusData::constr(
                        0,
                        vec![
                            PlutusData::constr(1, vec![PlutusData::integer(20)]),
                            PlutusData::constr(0, vec![]),
                        ]
                    )
                );
            }
            other => panic!("unexpected interval encoding {other:?}"),
        }
    }
}
