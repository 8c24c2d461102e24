//! Auxiliary-data hash agreement.

use crate::context::ValidationContext;
use crate::errors::{MetadataViolation, TransactionError};
use crate::primitives::Transaction;
use crate::state::LedgerState;
use crate::sts::Validator;

/// The auxiliary-data hash is present exactly when auxiliary data is, and
/// matches it.
pub struct Metadata;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for Metadata {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let violation = match (&tx.body.auxiliary_data_hash, &tx.auxiliary_data) {
            (None, None) => return Ok(()),
            (Some(_), None) => MetadataViolation::DataMissing,
            (None, Some(_)) => MetadataViolation::HashMissing,
            (Some(annotated), Some(data)) => {
                let computed = data.hash();
                if *annotated == computed {
                    return Ok(());
                }
                MetadataViolation::HashMismatch {
                    annotated: *annotated,
                    computed,
                }
            }
        };
        Err(TransactionError::Metadata {
            transaction_id: tx.id(),
            violation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ProtocolParams;
    use crate::primitives::{AuxiliaryData, NetworkId, TransactionBody, WitnessSet};

    fn ctx() -> ValidationContext {
        ValidationContext::new(NetworkId::Testnet, 0, 0, ProtocolParams::default())
    }

    #[test]
    fn matching_hash_passes() {
        let aux = AuxiliaryData(vec![0xa0]);
        let mut tx = Transaction::new(
            TransactionBody {
                auxiliary_data_hash: Some(aux.hash()),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        tx.auxiliary_data = Some(aux);
        assert!(Metadata.validate(&ctx(), &LedgerState::default(), &tx).is_ok());
    }

    #[test]
    fn presence_must_be_mutual() {
        let aux = AuxiliaryData(vec![0xa0]);
        let mut with_data_only = Transaction::new(TransactionBody::default(), WitnessSet::default());
        with_data_only.auxiliary_data = Some(aux.clone());
        assert!(matches!(
            Metadata.validate(&ctx(), &LedgerState::default(), &with_data_only),
            Err(TransactionError::Metadata {
                violation: MetadataViolation::HashMissing,
                ..
            })
        ));

        let with_hash_only = Transaction::new(
            TransactionBody {
                auxiliary_data_hash: Some(aux.hash()),
                ..TransactionBody::default()
            },
            WitnessSet::default(),
        );
        assert!(matches!(
            Metadata.validate(&ctx(), &LedgerState::default(), &with_hash_only),
            Err(TransactionError::Metadata {
                violation: MetadataViolation::DataMissing,
                ..
            })
        ));
    }
}
