//! Network discriminant rules. Each collects *all* offenders before
//! reporting.

use pallas_addresses::Address;

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::Transaction;
use crate::state::LedgerState;
use crate::sts::Validator;

/// Every output address must belong to the environment's network.
pub struct WrongNetwork;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError> for WrongNetwork {
    fn name(&self) -> &'static str {
        "wrong-network"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut offenders = Vec::new();
        for output in tx
            .body
            .outputs
            .iter()
            .chain(tx.body.collateral_return.iter())
        {
            let matches = match &output.address {
                Address::Shelley(shelley) => ctx.network.matches(shelley.network()),
                Address::Stake(stake) => ctx.network.matches(stake.network()),
                // Byron addresses carry their discriminant in the magic
                // attribute; absence means mainnet and is accepted as-is.
                Address::Byron(_) => true,
            };
            if !matches {
                offenders.push(output.address.to_vec());
            }
        }
        if !offenders.is_empty() {
            return Err(TransactionError::WrongNetworkAddress {
                transaction_id: tx.id(),
                offenders,
            });
        }
        Ok(())
    }
}

/// An annotated body network id must equal the environment's.
pub struct WrongNetworkInTxBody;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for WrongNetworkInTxBody
{
    fn name(&self) -> &'static str {
        "wrong-network-in-tx-body"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        if let Some(annotated) = tx.body.network_id {
            if annotated != ctx.network {
                return Err(TransactionError::WrongNetworkInTxBody {
                    transaction_id: tx.id(),
                    actual: annotated,
                    expected: ctx.network,
                });
            }
        }
        Ok(())
    }
}

/// Every withdrawal's reward account must belong to the environment's
/// network.
pub struct WrongNetworkWithdrawal;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for WrongNetworkWithdrawal
{
    fn name(&self) -> &'static str {
        "wrong-network-withdrawal"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut offenders = Vec::new();
        for account in tx.body.withdrawals.keys() {
            let ok = match account.to_address() {
                Some(Address::Stake(stake)) => ctx.network.matches(stake.network()),
                _ => false,
            };
            if !ok {
                offenders.push(account.clone());
            }
        }
        if !offenders.is_empty() {
            return Err(TransactionError::WrongNetworkWithdrawal {
                transaction_id: tx.id(),
                offenders,
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
        AddrKeyhash, NetworkId, TransactionBody, TransactionOutput, Value, WitnessSet,
    };
    use pallas_addresses::{Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};

    fn address(network: Network, n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            network,
            ShelleyPaymentPart::Key(AddrKeyhash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    #[test]
    fn all_offending_addresses_are_reported() {
        let body = TransactionBody {
            outputs: vec![
                TransactionOutput::new(address(Network::Testnet, 1), Value::from_coin(1)),
                TransactionOutput::new(address(Network::Mainnet, 2), Value::from_coin(1)),
                TransactionOutput::new(address(Network::Testnet, 3), Value::from_coin(1)),
            ],
            ..TransactionBody::default()
        };
        let tx = Transaction::new(body, WitnessSet::default());
        let ctx = ValidationContext::new(NetworkId::Mainnet, 0, 0, ProtocolParams::default());

        match WrongNetwork.validate(&ctx, &LedgerState::default(), &tx) {
            Err(TransactionError::WrongNetworkAddress { offenders, .. }) => {
                assert_eq!(offenders.len(), 2)
            }
            other => panic!("expected WrongNetworkAddress, got {other:?}"),
        }
    }
}
