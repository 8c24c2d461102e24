//! Key witness rules: presence and signature validity.

use pallas_crypto::key::ed25519::{PublicKey, Signature};

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::{AddrKeyhash, Transaction};
use crate::state::LedgerState;
use crate::sts::Validator;

use super::resolution::{required_key_hashes, witness_key_hashes};

/// Every required signing key hash has a witness. Extra witnesses are not
/// an error here; they may back native scripts.
pub struct MissingKeyHashes;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for MissingKeyHashes {
    fn name(&self) -> &'static str {
        "missing-key-hashes"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let required = required_key_hashes(tx, &state.utxos);
        let provided = witness_key_hashes(tx);
        let missing: std::collections::BTreeSet<AddrKeyhash> =
            required.difference(&provided).copied().collect();
        if !missing.is_empty() {
            return Err(TransactionError::MissingKeyHashes {
                transaction_id: tx.id(),
                missing,
            });
        }
        Ok(())
    }
}

fn verify(vkey: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let Ok(vkey): Result<[u8; PublicKey::SIZE], _> = vkey.try_into() else {
        return false;
    };
    let Ok(signature): Result<[u8; Signature::SIZE], _> = signature.try_into() else {
        return false;
    };
    PublicKey::from(vkey).verify(message, &Signature::from(signature))
}

/// Every vkey and bootstrap witness signature verifies against the body
/// hash.
pub struct VerifiedSignaturesInWitnesses;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for VerifiedSignaturesInWitnesses
{
    fn name(&self) -> &'static str {
        "verified-signatures-in-witnesses"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let message = tx.id();
        let mut invalid = Vec::new();

        for witness in &tx.witness_set.vkeywitness {
            if !verify(&witness.vkey, &witness.signature, message.as_ref()) {
                invalid.push(witness.key_hash());
            }
        }
        for witness in &tx.witness_set.bootstrap_witness {
            if !verify(&witness.public_key, &witness.signature, message.as_ref()) {
                invalid.push(pallas_crypto::hash::Hasher::<224>::hash(&witness.public_key));
            }
        }

        if !invalid.is_empty() {
            return Err(TransactionError::InvalidSignaturesInWitnesses {
                transaction_id: tx.id(),
                invalid,
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
        NetworkId, TransactionBody, TransactionInput, TransactionOutput, TxHash, VKeyWitness,
        Value, WitnessSet,
    };
    use pallas_addresses::{
        Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart,
    };
    use pallas_crypto::key::ed25519::SecretKey;

    fn ctx() -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default())
    }

    #[test]
    fn valid_signature_passes_and_tampered_fails() {
        let secret = SecretKey::from([42u8; 32]);
        let public = secret.public_key();

        let input = TransactionInput::new(TxHash::from([1u8; 32]), 0);
        let address = Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(pallas_crypto::hash::Hasher::<224>::hash(public.as_ref())),
            ShelleyDelegationPart::Null,
        ));
        let mut state = LedgerState::default();
        state
            .utxos
            .insert(input, TransactionOutput::new(address, Value::from_coin(5)));

        let body = TransactionBody {
            inputs: [input].into(),
            fee: 1,
            ..TransactionBody::default()
        };
        let mut tx = Transaction::new(body, WitnessSet::default());
        let signature = secret.sign(tx.id().as_ref());
        tx.witness_set.vkeywitness.push(VKeyWitness {
            vkey: public.as_ref().to_vec(),
            signature: signature.as_ref().to_vec(),
        });

        assert!(MissingKeyHashes.validate(&ctx(), &state, &tx).is_ok());
        assert!(
            VerifiedSignaturesInWitnesses
                .validate(&ctx(), &state, &tx)
                .is_ok()
        );

        // flip a byte in the signature
        tx.witness_set.vkeywitness[0].signature[0] ^= 0xff;
        assert!(
            VerifiedSignaturesInWitnesses
                .validate(&ctx(), &state, &tx)
                .is_err()
        );
    }

    #[test]
    fn missing_witness_is_the_set_difference() {
        let input = TransactionInput::new(TxHash::from([1u8; 32]), 0);
        let expected = AddrKeyhash::from([7u8; 28]);
        let address = Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(expected),
            ShelleyDelegationPart::Null,
        ));
        let mut state = LedgerState::default();
        state
            .utxos
            .insert(input, TransactionOutput::new(address, Value::from_coin(5)));

        let tx = Transaction::new(
            TransactionBody {
                inputs: [input].into(),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        match MissingKeyHashes.validate(&ctx(), &state, &tx) {
            Err(TransactionError::MissingKeyHashes { missing, .. }) => {
                assert_eq!(missing, [expected].into());
            }
            other => panic!("expected MissingKeyHashes, got {other:?}"),
        }
    }
}
