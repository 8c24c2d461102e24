//! The script-data (script integrity) hash: binds redeemers, witness
//! datums and the cost-model views of the languages the transaction
//! actually uses, so none of them can be substituted after signing.

use pallas_crypto::hash::{Hash, Hasher};

use crate::params::ProtocolParams;
use crate::primitives::Transaction;
use crate::rules::resolution::used_languages;
use crate::state::Utxos;

/// `BLAKE2b-256(enc(redeemers) ‖ enc(datums) ‖ enc(restricted cost
/// models))`. `None` when the transaction involves no Plutus scripts, no
/// redeemers and no datums.
pub fn compute_script_data_hash(
    tx: &Transaction,
    utxos: &Utxos,
    params: &ProtocolParams,
) -> Option<Hash<32>> {
    let languages = used_languages(tx, utxos);
    let redeemers = &tx.witness_set.redeemer;
    let datums = &tx.witness_set.plutus_data;

    if languages.is_empty() && redeemers.is_empty() && datums.is_empty() {
        return None;
    }

    let mut preimage = Vec::new();

    preimage.extend(
        minicbor::to_vec(redeemers).expect("redeemer encoding to a vector cannot fail"),
    );

    // The datum segment is omitted entirely when no datums are witnessed.
    if !datums.is_empty() {
        let mut segment = Vec::new();
        {
            let mut e = minicbor::Encoder::new(&mut segment);
            let _ = e.array(datums.len() as u64);
            for datum in datums {
                let _ = e.encode(datum);
            }
        }
        preimage.extend(segment);
    }

    let restricted = params.cost_models.restricted(&languages);
    let mut models = Vec::new();
    {
        let mut e = minicbor::Encoder::new(&mut models);
        let _ = e.map(restricted.len() as u64);
        for (language, values) in &restricted {
            let _ = e.u8(language.tag() - 1);
            let _ = e.array(values.len() as u64);
            for value in values {
                let _ = e.i64(*value);
            }
        }
    }
    preimage.extend(models);

    Some(Hasher::<256>::hash(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CostModels;
    use crate::primitives::{
        ExUnits, PlutusData, RedeemerTag, RedeemersKey, RedeemersValue, TransactionBody,
        WitnessSet,
    };

    fn tx_with_redeemer() -> Transaction {
        let mut witness_set = WitnessSet::default();
        witness_set.redeemer.insert(
            RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0,
            },
            RedeemersValue {
                data: PlutusData::integer(1),
                ex_units: ExUnits::new(10, 10),
            },
        );
        Transaction::new(TransactionBody::default(), witness_set)
    }

    #[test]
    fn absent_without_scripts_redeemers_or_datums() {
        let tx = Transaction::new(TransactionBody::default(), WitnessSet::default());
        assert_eq!(
            compute_script_data_hash(&tx, &Utxos::new(), &ProtocolParams::default()),
            None
        );
    }

    #[test]
    fn deterministic_over_equal_inputs() {
        let tx = tx_with_redeemer();
        let params = ProtocolParams::default();
        let first = compute_script_data_hash(&tx, &Utxos::new(), &params);
        let second = compute_script_data_hash(&tx, &Utxos::new(), &params);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn sensitive_to_redeemer_content_and_cost_models() {
        let tx = tx_with_redeemer();
        let params = ProtocolParams::default();
        let baseline = compute_script_data_hash(&tx, &Utxos::new(), &params);

        let mut changed = tx.clone();
        changed.witness_set.redeemer.insert(
            RedeemersKey {
                tag: RedeemerTag::Spend,
                index: 0,
            },
            RedeemersValue {
                data: PlutusData::integer(2),
                ex_units: ExUnits::new(10, 10),
            },
        );
        assert_ne!(
            baseline,
            compute_script_data_hash(&changed, &Utxos::new(), &params)
        );

        // an unused language's cost model does not participate
        let mut with_models = params.clone();
        with_models.cost_models = CostModels {
            plutus_v1: Some(vec![1, 2, 3]),
            plutus_v2: None,
            plutus_v3: None,
        };
        assert_eq!(
            baseline,
            compute_script_data_hash(&tx, &Utxos::new(), &with_models)
        );
    }

    #[test]
    fn datums_alone_still_hash() {
        let mut witness_set = WitnessSet::default();
        witness_set.plutus_data.push(PlutusData::integer(5));
        let tx = Transaction::new(TransactionBody::default(), witness_set);
        assert!(
            compute_script_data_hash(&tx, &Utxos::new(), &ProtocolParams::default()).is_some()
        );
    }
}
