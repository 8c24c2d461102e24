//! Script purposes, datum/script lookup tables and the version-specific
//! `TxInfo` translation.

use std::collections::BTreeMap;

use pallas_addresses::Address;

use crate::params::SlotConfig;
use crate::primitives::{
    Certificate, DatumHash, DatumOption, Language, PlutusData, PolicyId, ProposalProcedure,
    RedeemerTag, RedeemersKey, RewardAccount, Script, ScriptHash, StakeCredential, Transaction,
    TransactionInput, Voter,
};
use crate::state::Utxos;

use super::to_plutus_data::{
    ToPlutusData, address_data, certificate_data_v1, certificate_data_v3, credential_data,
    gov_action_id_data, out_ref_data_v1, out_ref_data_v3, output_data_v1, output_data_v2,
    proposal_data, time_range_data, value_data, vote_data, voter_data,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Phase2Error {
    #[error("no script found for hash {0}")]
    MissingScript(ScriptHash),
    #[error("no datum witnessed for hash {0}")]
    MissingDatum(DatumHash),
    #[error("spending a v1/v2 script output requires a datum")]
    MissingSpendDatum,
    #[error("redeemer {0:?} points at nothing")]
    ExtraneousRedeemer(RedeemersKey),
    #[error("redeemer {0:?} points at a non-script item")]
    NonScriptPurpose(RedeemersKey),
    #[error("byron inputs cannot be evaluated in script contexts")]
    ByronInputNotAllowed,
    #[error("plutus v1 scripts cannot coexist with reference inputs")]
    ReferenceInputsNotAllowedInV1,
    #[error("plutus v1 scripts cannot coexist with inline datums")]
    InlineDatumNotAllowedInV1,
    #[error("plutus v1 scripts cannot coexist with reference scripts")]
    ScriptRefNotAllowedInV1,
    #[error("validity bound {0} precedes the forecast horizon")]
    SlotOutOfForecast(u64),
    #[error("voting and proposing purposes require plutus v3")]
    GovernancePurposeBeforeV3,
    #[error("script {0} does not decode")]
    IllFormedScript(ScriptHash),
    #[error("no cost model for {0}")]
    MissingCostModel(Language),
}

/// POSIX-millisecond validity range, after slot conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub lower_bound: Option<u64>,
    pub upper_bound: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptPurpose {
    Minting(PolicyId),
    Spending(TransactionInput),
    Rewarding(StakeCredential),
    Certifying(usize, Certificate),
    Voting(Voter),
    Proposing(usize, ProposalProcedure),
}

/// Maps a redeemer pointer back to the item it names.
pub fn resolve_purpose(
    tx: &Transaction,
    key: &RedeemersKey,
) -> Result<ScriptPurpose, Phase2Error> {
    let index = key.index as usize;
    match key.tag {
        RedeemerTag::Spend => tx
            .body
            .inputs
            .iter()
            .nth(index)
            .map(|input| ScriptPurpose::Spending(*input))
            .ok_or(Phase2Error::ExtraneousRedeemer(*key)),
        RedeemerTag::Mint => tx
            .body
            .mint
            .policies()
            .nth(index)
            .map(|policy| ScriptPurpose::Minting(*policy))
            .ok_or(Phase2Error::ExtraneousRedeemer(*key)),
        RedeemerTag::Cert => tx
            .body
            .certificates
            .get(index)
            .map(|cert| ScriptPurpose::Certifying(index, cert.clone()))
            .ok_or(Phase2Error::ExtraneousRedeemer(*key)),
        RedeemerTag::Reward => tx
            .body
            .withdrawals
            .keys()
            .nth(index)
            .map(|account| account.stake_credential())
            .ok_or(Phase2Error::ExtraneousRedeemer(*key))?
            .map(ScriptPurpose::Rewarding)
            .ok_or(Phase2Error::NonScriptPurpose(*key)),
        RedeemerTag::Vote => tx
            .body
            .voting_procedures
            .keys()
            .nth(index)
            .map(|voter| ScriptPurpose::Voting(*voter))
            .ok_or(Phase2Error::ExtraneousRedeemer(*key)),
        RedeemerTag::Propose => tx
            .body
            .proposal_procedures
            .get(index)
            .map(|procedure| ScriptPurpose::Proposing(index, procedure.clone()))
            .ok_or(Phase2Error::ExtraneousRedeemer(*key)),
    }
}

/// Datums and scripts reachable by the transaction, keyed by hash.
pub struct DataLookupTable {
    pub datums: BTreeMap<DatumHash, PlutusData>,
    pub scripts: BTreeMap<ScriptHash, Script>,
}

impl DataLookupTable {
    pub fn from_transaction(tx: &Transaction, utxos: &Utxos) -> DataLookupTable {
        let datums = tx
            .witness_set
            .plutus_data
            .iter()
            .map(|data| (data.hash(), data.clone()))
            .collect();
        let scripts = crate::rules::resolution::available_scripts(tx, utxos);
        DataLookupTable { datums, scripts }
    }
}

/// Resolves the script (and, for spending, the datum) a redeemer invokes.
pub fn find_script(
    purpose: &ScriptPurpose,
    key: &RedeemersKey,
    utxos: &Utxos,
    table: &DataLookupTable,
) -> Result<(Script, Option<PlutusData>), Phase2Error> {
    let lookup = |hash: &ScriptHash| {
        table
            .scripts
            .get(hash)
            .cloned()
            .ok_or(Phase2Error::MissingScript(*hash))
    };

    match purpose {
        ScriptPurpose::Minting(policy) => Ok((lookup(policy)?, None)),
        ScriptPurpose::Rewarding(cred) => {
            let hash = cred
                .script_hash()
                .ok_or(Phase2Error::NonScriptPurpose(*key))?;
            Ok((lookup(&hash)?, None))
        }
        ScriptPurpose::Certifying(_, cert) => {
            let hash = cert
                .script_hash()
                .ok_or(Phase2Error::NonScriptPurpose(*key))?;
            Ok((lookup(&hash)?, None))
        }
        ScriptPurpose::Voting(voter) => {
            let hash = voter
                .script_hash()
                .ok_or(Phase2Error::NonScriptPurpose(*key))?;
            Ok((lookup(&hash)?, None))
        }
        ScriptPurpose::Proposing(_, procedure) => {
            let hash = procedure
                .gov_action
                .guardrail_script()
                .ok_or(Phase2Error::NonScriptPurpose(*key))?;
            Ok((lookup(&hash)?, None))
        }
        ScriptPurpose::Spending(input) => {
            let output = utxos
                .get(input)
                .ok_or(Phase2Error::ExtraneousRedeemer(*key))?;
            let hash = output
                .payment_script_hash()
                .ok_or(Phase2Error::NonScriptPurpose(*key))?;
            let script = lookup(&hash)?;
            let datum = match &output.datum {
                Some(DatumOption::Inline(data)) => Some(data.clone()),
                Some(DatumOption::Hash(hash)) => Some(
                    table
                        .datums
                        .get(hash)
                        .cloned()
                        .ok_or(Phase2Error::MissingDatum(*hash))?,
                ),
                None => None,
            };
            if datum.is_none()
                && matches!(script, Script::PlutusV1(_) | Script::PlutusV2(_))
            {
                return Err(Phase2Error::MissingSpendDatum);
            }
            Ok((script, datum))
        }
    }
}

fn validity_range(
    tx: &Transaction,
    slot_config: &SlotConfig,
) -> Result<TimeRange, Phase2Error> {
    let convert = |slot: Option<u64>| {
        slot.map(|slot| {
            slot_config
                .slot_to_posix_time(slot)
                .ok_or(Phase2Error::SlotOutOfForecast(slot))
        })
        .transpose()
    };
    Ok(TimeRange {
        lower_bound: convert(tx.body.validity_interval_start)?,
        upper_bound: convert(tx.body.ttl)?,
    })
}

/// Canonical withdrawal order for script contexts: network first, script
/// credentials before key credentials, then hash order.
fn sorted_withdrawals(tx: &Transaction) -> Vec<(&RewardAccount, u64)> {
    use itertools::Itertools;

    let rank = |account: &RewardAccount| match account.stake_credential() {
        Some(StakeCredential::ScriptHash(hash)) => (0u8, hash),
        Some(StakeCredential::AddrKeyhash(hash)) => (1u8, hash),
        None => (2u8, ScriptHash::from([0u8; 28])),
    };
    let network = |account: &RewardAccount| {
        account.as_slice().first().map(|byte| byte & 0x0f).unwrap_or(0)
    };

    tx.body
        .withdrawals
        .iter()
        .map(|(account, coin)| (account, *coin))
        .sorted_by(|(a, _), (b, _)| {
            network(a)
                .cmp(&network(b))
                .then_with(|| rank(a).cmp(&rank(b)))
        })
        .collect()
}

fn resolved_inputs<'a, 'u>(
    inputs: impl Iterator<Item = &'a TransactionInput>,
    utxos: &'u Utxos,
    language: Language,
) -> Result<Vec<(TransactionInput, &'u crate::primitives::TransactionOutput)>, Phase2Error> {
    let mut out = Vec::new();
    for input in inputs {
        let Some(output) = utxos.get(input) else {
            // Unresolvable inputs are rejected by phase-1; skipping keeps
            // standalone evaluation usable on partial utxo views.
            continue;
        };
        if matches!(output.address, Address::Byron(_)) {
            return Err(Phase2Error::ByronInputNotAllowed);
        }
        if language == Language::PlutusV1 {
            if matches!(output.datum, Some(DatumOption::Inline(_))) {
                return Err(Phase2Error::InlineDatumNotAllowedInV1);
            }
            if output.script_ref.is_some() {
                return Err(Phase2Error::ScriptRefNotAllowedInV1);
            }
        }
        out.push((*input, output));
    }
    Ok(out)
}

fn tx_in_info(
    inputs: &[(TransactionInput, &crate::primitives::TransactionOutput)],
    language: Language,
) -> PlutusData {
    PlutusData::list(
        inputs
            .iter()
            .map(|(input, output)| {
                let (out_ref, output_data) = match language {
                    Language::PlutusV1 => (out_ref_data_v1(input), output_data_v1(output)),
                    Language::PlutusV2 => (out_ref_data_v1(input), output_data_v2(output)),
                    Language::PlutusV3 => (out_ref_data_v3(input), output_data_v2(output)),
                };
                PlutusData::constr(0, vec![out_ref, output_data])
            })
            .collect(),
    )
}

fn purpose_data(purpose: &ScriptPurpose, language: Language) -> Result<PlutusData, Phase2Error> {
    let data = match purpose {
        ScriptPurpose::Minting(policy) => {
            PlutusData::constr(0, vec![policy.to_plutus_data()])
        }
        ScriptPurpose::Spending(input) => {
            let out_ref = if language == Language::PlutusV3 {
                out_ref_data_v3(input)
            } else {
                out_ref_data_v1(input)
            };
            PlutusData::constr(1, vec![out_ref])
        }
        ScriptPurpose::Rewarding(cred) => {
            let cred_data = if language == Language::PlutusV3 {
                credential_data(cred)
            } else {
                PlutusData::constr(0, vec![credential_data(cred)])
            };
            PlutusData::constr(2, vec![cred_data])
        }
        ScriptPurpose::Certifying(index, cert) => {
            if language == Language::PlutusV3 {
                PlutusData::constr(
                    3,
                    vec![PlutusData::integer(*index as u64), certificate_data_v3(cert)],
                )
            } else {
                PlutusData::constr(3, vec![certificate_data_v1(cert)])
            }
        }
        ScriptPurpose::Voting(voter) => {
            if language != Language::PlutusV3 {
                return Err(Phase2Error::GovernancePurposeBeforeV3);
            }
            PlutusData::constr(4, vec![voter_data(voter)])
        }
        ScriptPurpose::Proposing(index, procedure) => {
            if language != Language::PlutusV3 {
                return Err(Phase2Error::GovernancePurposeBeforeV3);
            }
            PlutusData::constr(
                5,
                vec![PlutusData::integer(*index as u64), proposal_data(procedure)],
            )
        }
    };
    Ok(data)
}

fn redeemers_map(tx: &Transaction, language: Language) -> Result<PlutusData, Phase2Error> {
    let mut pairs = Vec::new();
    for (key, value) in tx.witness_set.redeemer.iter() {
        let purpose = resolve_purpose(tx, key)?;
        pairs.push((purpose_data(&purpose, language)?, value.data.clone()));
    }
    Ok(PlutusData::map(pairs))
}

fn datum_pairs(tx: &Transaction) -> Vec<(PlutusData, PlutusData)> {
    tx.witness_set
        .plutus_data
        .iter()
        .map(|data| (data.hash().to_plutus_data(), data.clone()))
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .collect()
}

/// Builds the version-specific `TxInfo` as `Data`.
pub fn build_tx_info(
    tx: &Transaction,
    utxos: &Utxos,
    slot_config: &SlotConfig,
    language: Language,
) -> Result<PlutusData, Phase2Error> {
    let range = validity_range(tx, slot_config)?;
    let inputs = resolved_inputs(tx.body.inputs.iter(), utxos, language)?;
    let outputs: Vec<PlutusData> = tx
        .body
        .outputs
        .iter()
        .map(|output| match language {
            Language::PlutusV1 => output_data_v1(output),
            _ => output_data_v2(output),
        })
        .collect();
    let signatories: Vec<PlutusData> = tx
        .body
        .required_signers
        .iter()
        .map(|hash| hash.to_plutus_data())
        .collect();
    let certificates_v1: Vec<PlutusData> = tx
        .body
        .certificates
        .iter()
        .map(certificate_data_v1)
        .collect();

    match language {
        Language::PlutusV1 => {
            if !tx.body.reference_inputs.is_empty() {
                return Err(Phase2Error::ReferenceInputsNotAllowedInV1);
            }
            let withdrawals = PlutusData::list(
                sorted_withdrawals(tx)
                    .into_iter()
                    .map(|(account, coin)| {
                        PlutusData::constr(
                            0,
                            vec![
                                PlutusData::constr(
                                    0,
                                    vec![account
                                        .stake_credential()
                                        .map(|cred| credential_data(&cred))
                                        .unwrap_or_else(|| {
                                            PlutusData::bytes(account.as_slice().to_vec())
                                        })],
                                ),
                                PlutusData::integer(coin),
                            ],
                        )
                    })
                    .collect(),
            );
            let data = PlutusData::list(
                datum_pairs(tx)
                    .into_iter()
                    .map(|(hash, datum)| PlutusData::constr(0, vec![hash, datum]))
                    .collect(),
            );
            Ok(PlutusData::constr(
                0,
                vec![
                    tx_in_info(&inputs, language),
                    PlutusData::list(outputs),
                    value_data(tx.body.fee, &Default::default(), true),
                    value_data(0, &tx.body.mint, true),
                    PlutusData::list(certificates_v1),
                    withdrawals,
                    time_range_data(&range),
                    PlutusData::list(signatories),
                    data,
                    PlutusData::constr(0, vec![tx.id().to_plutus_data()]),
                ],
            ))
        }
        Language::PlutusV2 => {
            let reference = resolved_inputs(tx.body.reference_inputs.iter(), utxos, language)?;
            let withdrawals = PlutusData::map(
                sorted_withdrawals(tx)
                    .into_iter()
                    .map(|(account, coin)| {
                        (
                            PlutusData::constr(
                                0,
                                vec![account
                                    .stake_credential()
                                    .map(|cred| credential_data(&cred))
                                    .unwrap_or_else(|| {
                                        PlutusData::bytes(account.as_slice().to_vec())
                                    })],
                            ),
                            PlutusData::integer(coin),
                        )
                    })
                    .collect(),
            );
            Ok(PlutusData::constr(
                0,
                vec![
                    tx_in_info(&inputs, language),
                    tx_in_info(&reference, language),
                    PlutusData::list(outputs),
                    value_data(tx.body.fee, &Default::default(), true),
                    value_data(0, &tx.body.mint, true),
                    PlutusData::list(certificates_v1),
                    withdrawals,
                    time_range_data(&range),
                    PlutusData::list(signatories),
                    redeemers_map(tx, language)?,
                    PlutusData::map(datum_pairs(tx)),
                    PlutusData::constr(0, vec![tx.id().to_plutus_data()]),
                ],
            ))
        }
        Language::PlutusV3 => {
            let reference = resolved_inputs(tx.body.reference_inputs.iter(), utxos, language)?;
            let certificates: Vec<PlutusData> = tx
                .body
                .certificates
                .iter()
                .map(certificate_data_v3)
                .collect();
            let withdrawals = PlutusData::map(
                sorted_withdrawals(tx)
                    .into_iter()
                    .map(|(account, coin)| {
                        (
                            account
                                .stake_credential()
                                .map(|cred| credential_data(&cred))
                                .unwrap_or_else(|| {
                                    PlutusData::bytes(account.as_slice().to_vec())
                                }),
                            PlutusData::integer(coin),
                        )
                    })
                    .collect(),
            );
            let votes = PlutusData::map(
                tx.body
                    .voting_procedures
                    .iter()
                    .map(|(voter, procedures)| {
                        (
                            voter_data(voter),
                            PlutusData::map(
                                procedures
                                    .iter()
                                    .map(|(id, procedure)| {
                                        (gov_action_id_data(id), vote_data(procedure))
                                    })
                                    .collect(),
                            ),
                        )
                    })
                    .collect(),
            );
            let proposals = PlutusData::list(
                tx.body.proposal_procedures.iter().map(proposal_data).collect(),
            );
            Ok(PlutusData::constr(
                0,
                vec![
                    tx_in_info(&inputs, language),
                    tx_in_info(&reference, language),
                    PlutusData::list(outputs),
                    PlutusData::integer(tx.body.fee),
                    value_data(0, &tx.body.mint, false),
                    PlutusData::list(certificates),
                    withdrawals,
                    time_range_data(&range),
                    PlutusData::list(signatories),
                    redeemers_map(tx, language)?,
                    PlutusData::map(datum_pairs(tx)),
                    tx.id().to_plutus_data(),
                    votes,
                    proposals,
                    tx.body.treasury_value.to_plutus_data(),
                    tx.body.donation.to_plutus_data(),
                ],
            ))
        }
    }
}

/// Assembles the final `ScriptContext` value handed to the script.
pub fn build_script_context(
    language: Language,
    tx_info: PlutusData,
    purpose: &ScriptPurpose,
    datum: Option<&PlutusData>,
    redeemer: &PlutusData,
) -> Result<PlutusData, Phase2Error> {
    match language {
        Language::PlutusV1 | Language::PlutusV2 => Ok(PlutusData::constr(
            0,
            vec![tx_info, purpose_data(purpose, language)?],
        )),
        Language::PlutusV3 => {
            let script_info = match purpose {
                ScriptPurpose::Spending(input) => PlutusData::constr(
                    1,
                    vec![out_ref_data_v3(input), datum.cloned().to_plutus_data()],
                ),
                other => purpose_data(other, language)?,
            };
            Ok(PlutusData::constr(
                0,
                vec![tx_info, redeemer.clone(), script_info],
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        AddrKeyhash, TransactionBody, TransactionOutput, TxHash, Value, WitnessSet,
    };
    use pallas_addresses::{Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};

    fn key_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(AddrKeyhash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    #[test]
    fn v1_rejects_reference_inputs() {
        let input = TransactionInput::new(TxHash::from([1u8; 32]), 0);
        let mut utxos = Utxos::new();
        utxos.insert(
            input,
            TransactionOutput::new(key_address(1), Value::from_coin(5)),
        );
        let tx = Transaction::new(
            TransactionBody {
                inputs: [input].into(),
                reference_inputs: [TransactionInput::new(TxHash::from([2u8; 32]), 0)].into(),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        // the reference input does not resolve, which is fine: the rule
        // fires before resolution
        assert_eq!(
            build_tx_info(&tx, &utxos, &SlotConfig::default(), Language::PlutusV1),
            Err(Phase2Error::ReferenceInputsNotAllowedInV1)
        );
        assert!(
            build_tx_info(&tx, &utxos, &SlotConfig::default(), Language::PlutusV2).is_ok()
        );
    }

    #[test]
    fn v3_tx_info_has_sixteen_fields() {
        let input = TransactionInput::new(TxHash::from([1u8; 32]), 0);
        let mut utxos = Utxos::new();
        utxos.insert(
            input,
            TransactionOutput::new(key_address(1), Value::from_coin(5)),
        );
        let tx = Transaction::new(
            TransactionBody {
                inputs: [input].into(),
                fee: 2,
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        match build_tx_info(&tx, &utxos, &SlotConfig::default(), Language::PlutusV3).unwrap() {
            PlutusData::Constr { tag: 0, fields } => assert_eq!(fields.len(), 16),
            other => panic!("unexpected tx info shape {other:?}"),
        }
    }

    #[test]
    fn spending_purpose_resolves_by_sorted_input_index() {
        let input_a = TransactionInput::new(TxHash::from([1u8; 32]), 7);
        let input_b = TransactionInput::new(TxHash::from([3u8; 32]), 0);
        let tx = Transaction::new(
            TransactionBody {
                inputs: [input_b, input_a].into(),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        let purpose = resolve_purpose(
            &tx,
            &RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0,
            },
        )
        .unwrap();
        assert_eq!(purpose, ScriptPurpose::Spending(input_a));
    }
}
