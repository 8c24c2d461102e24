//! Shared resolution helpers: which scripts a transaction needs, which it
//! provides, and which keys must sign. Both the witness rules and the
//! phase-2 evaluator build on these.

use std::collections::{BTreeMap, BTreeSet};

use pallas_addresses::{Address, ShelleyPaymentPart};

use crate::primitives::{
    AddrKeyhash, Language, RedeemerTag, RedeemersKey, Script, ScriptHash, Transaction,
    TransactionInput,
};
use crate::state::Utxos;

/// Splits the named inputs into resolved and missing.
pub fn missing_inputs<'a, I>(utxos: &Utxos, inputs: I) -> BTreeSet<TransactionInput>
where
    I: IntoIterator<Item = &'a TransactionInput>,
{
    inputs
        .into_iter()
        .filter(|input| !utxos.contains_key(input))
        .copied()
        .collect()
}

/// Scripts carried in the witness set, by hash.
pub fn witness_scripts(tx: &Transaction) -> BTreeMap<ScriptHash, Script> {
    tx.witness_set
        .scripts()
        .into_iter()
        .map(|script| (script.hash(), script))
        .collect()
}

/// Scripts provided by reference, from the outputs of both spent and
/// reference inputs.
pub fn reference_scripts(tx: &Transaction, utxos: &Utxos) -> BTreeMap<ScriptHash, Script> {
    tx.body
        .inputs
        .iter()
        .chain(tx.body.reference_inputs.iter())
        .filter_map(|input| utxos.get(input))
        .filter_map(|output| output.script_ref.clone())
        .map(|script| (script.hash(), script))
        .collect()
}

/// Every script reachable by the transaction: witness-provided plus
/// reference-provided.
pub fn available_scripts(tx: &Transaction, utxos: &Utxos) -> BTreeMap<ScriptHash, Script> {
    let mut scripts = reference_scripts(tx, utxos);
    scripts.extend(witness_scripts(tx));
    scripts
}

/// The scripts the transaction *needs*, each at its canonical redeemer
/// pointer. Spending indices count sorted inputs; minting indices count
/// sorted policies; certificate and proposal indices follow list order;
/// withdrawal and voting indices follow their canonical map order.
pub fn needed_scripts(tx: &Transaction, utxos: &Utxos) -> Vec<(RedeemersKey, ScriptHash)> {
    let mut needed = Vec::new();

    for (index, input) in tx.body.inputs.iter().enumerate() {
        if let Some(hash) = utxos.get(input).and_then(|output| output.payment_script_hash()) {
            needed.push((
                RedeemersKey {
                    tag: RedeemerTag::Spend,
                    index: index as u32,
                },
                hash,
            ));
        }
    }

    for (index, policy) in tx.body.mint.policies().enumerate() {
        needed.push((
            RedeemersKey {
                tag: RedeemerTag::Mint,
                index: index as u32,
            },
            *policy,
        ));
    }

    for (index, cert) in tx.body.certificates.iter().enumerate() {
        if let Some(hash) = cert.script_hash() {
            needed.push((
                RedeemersKey {
                    tag: RedeemerTag::Cert,
                    index: index as u32,
                },
                hash,
            ));
        }
    }

    for (index, account) in tx.body.withdrawals.keys().enumerate() {
        if let Some(hash) = account.script_hash() {
            needed.push((
                RedeemersKey {
                    tag: RedeemerTag::Reward,
                    index: index as u32,
                },
                hash,
            ));
        }
    }

    for (index, voter) in tx.body.voting_procedures.keys().enumerate() {
        if let Some(hash) = voter.script_hash() {
            needed.push((
                RedeemersKey {
                    tag: RedeemerTag::Vote,
                    index: index as u32,
                },
                hash,
            ));
        }
    }

    for (index, procedure) in tx.body.proposal_procedures.iter().enumerate() {
        if let Some(hash) = procedure.gov_action.guardrail_script() {
            needed.push((
                RedeemersKey {
                    tag: RedeemerTag::Propose,
                    index: index as u32,
                },
                hash,
            ));
        }
    }

    needed
}

/// Needed script hashes, deduplicated.
pub fn needed_script_hashes(tx: &Transaction, utxos: &Utxos) -> BTreeSet<ScriptHash> {
    needed_scripts(tx, utxos)
        .into_iter()
        .map(|(_, hash)| hash)
        .collect()
}

/// The redeemer pointers the transaction must carry: one per needed script
/// that resolves to a Plutus script.
pub fn needed_redeemers(tx: &Transaction, utxos: &Utxos) -> Vec<RedeemersKey> {
    let available = available_scripts(tx, utxos);
    needed_scripts(tx, utxos)
        .into_iter()
        .filter(|(_, hash)| {
            available
                .get(hash)
                .map(|script| script.is_plutus())
                .unwrap_or(false)
        })
        .map(|(key, _)| key)
        .collect()
}

/// Languages of the Plutus scripts that are both needed and available;
/// these are the cost-model views bound by the script-data hash.
pub fn used_languages(tx: &Transaction, utxos: &Utxos) -> Vec<Language> {
    let available = available_scripts(tx, utxos);
    let mut languages: Vec<Language> = needed_script_hashes(tx, utxos)
        .iter()
        .filter_map(|hash| available.get(hash))
        .filter_map(|script| script.language())
        .collect();
    languages.sort();
    languages.dedup();
    languages
}

/// Whether phase-2 evaluation has anything to do.
pub fn has_plutus_scripts(tx: &Transaction, utxos: &Utxos) -> bool {
    !used_languages(tx, utxos).is_empty()
}

/// Key hashes of the witnesses actually present.
pub fn witness_key_hashes(tx: &Transaction) -> BTreeSet<AddrKeyhash> {
    tx.witness_set
        .vkeywitness
        .iter()
        .map(|witness| witness.key_hash())
        .collect()
}

/// Every key hash that must have a verifying witness: payment keys of
/// spent and collateral inputs, withdrawal credentials, certificate
/// signers, voters and the explicitly required signers.
pub fn required_key_hashes(tx: &Transaction, utxos: &Utxos) -> BTreeSet<AddrKeyhash> {
    let mut required = BTreeSet::new();

    for input in tx.body.inputs.iter().chain(tx.body.collateral.iter()) {
        if let Some(output) = utxos.get(input) {
            if let Address::Shelley(shelley) = &output.address {
                if let ShelleyPaymentPart::Key(hash) = shelley.payment() {
                    required.insert(*hash);
                }
            }
        }
    }

    for account in tx.body.withdrawals.keys() {
        if let Some(cred) = account.stake_credential() {
            if let Some(hash) = cred.key_hash() {
                required.insert(hash);
            }
        }
    }

    for cert in &tx.body.certificates {
        required.extend(cert.required_key_hashes());
    }

    for voter in tx.body.voting_procedures.keys() {
        if let Some(hash) = voter.key_hash() {
            required.insert(hash);
        }
    }

    required.extend(tx.body.required_signers.iter().copied());

    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        NetworkId, RewardAccount, TransactionBody, TransactionOutput, TxHash, Value, WitnessSet,
    };
    use pallas_addresses::{Network, ShelleyAddress, ShelleyDelegationPart};

    fn script_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Script(ScriptHash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    fn key_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(AddrKeyhash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    #[test]
    fn spending_indices_follow_sorted_inputs() {
        let input_a = TransactionInput::new(TxHash::from([1u8; 32]), 0);
        let input_b = TransactionInput::new(TxHash::from([2u8; 32]), 0);

        let mut utxos = Utxos::new();
        utxos.insert(
            input_a,
            TransactionOutput::new(key_address(1), Value::from_coin(5)),
        );
        utxos.insert(
            input_b,
            TransactionOutput::new(script_address(7), Value::from_coin(5)),
        );

        let body = TransactionBody {
            inputs: [input_a, input_b].into(),
            ..TransactionBody::default()
        };
        let tx = Transaction::new(body, WitnessSet::default());

        let needed = needed_scripts(&tx, &utxos);
        assert_eq!(needed.len(), 1);
        assert_eq!(
            needed[0],
            (
                RedeemersKey {
                    tag: RedeemerTag::Spend,
                    index: 1
                },
                ScriptHash::from([7u8; 28])
            )
        );
    }

    #[test]
    fn withdrawal_key_credentials_require_signatures() {
        let key = AddrKeyhash::from([3u8; 28]);
        let body = TransactionBody {
            withdrawals: [(RewardAccount::from_key(NetworkId::Testnet, key), 10u64)].into(),
            ..TransactionBody::default()
        };
        let tx = Transaction::new(body, WitnessSet::default());
        let required = required_key_hashes(&tx, &Utxos::new());
        assert!(required.contains(&key));
    }
}
