//! Per-output rules: minimum coin and Byron attribute bounds.

use pallas_addresses::Address;

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::{Coin, Transaction, TransactionOutput};
use crate::state::LedgerState;
use crate::sts::Validator;

/// Serialization overhead constant of the min-ada formula.
const OUTPUT_OVERHEAD: u64 = 160;

pub fn min_ada(output: &TransactionOutput, utxo_cost_per_byte: Coin) -> Coin {
    (OUTPUT_OVERHEAD + output.encoded_size()) * utxo_cost_per_byte
}

/// Every output (and the collateral return) must carry at least the
/// size-scaled minimum of lovelace and no negative asset quantities.
pub struct OutputsHaveNotEnoughCoins;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for OutputsHaveNotEnoughCoins
{
    fn name(&self) -> &'static str {
        "outputs-have-not-enough-coins"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut offenders = Vec::new();
        for (index, output) in tx
            .body
            .outputs
            .iter()
            .chain(tx.body.collateral_return.iter())
            .enumerate()
        {
            let required = min_ada(output, ctx.params.utxo_cost_per_byte);
            if output.lovelace() < required || output.value.has_negative_assets() {
                offenders.push((index, output.lovelace(), required));
            }
        }
        if !offenders.is_empty() {
            return Err(TransactionError::OutputsHaveNotEnoughCoins {
                transaction_id: tx.id(),
                offenders,
            });
        }
        Ok(())
    }
}

/// Byron outputs: derivation path plus unknown attributes must fit in 64
/// bytes; the network magic attribute is exempt.
pub struct OutputBootAddrAttrsSize;

const BOOT_ATTRS_MAX: u64 = 64;
const NETWORK_MAGIC_ATTR: u8 = 2;

/// Total size of the non-magic attribute values in a Byron address, or
/// `None` when the payload does not decode.
fn bootstrap_attributes_size(address_bytes: &[u8]) -> Option<u64> {
    let mut d = minicbor::decode::Decoder::new(address_bytes);
    d.array().ok()?;
    d.tag().ok()?; // CBOR-in-CBOR (24)
    let payload = d.bytes().ok()?;

    let mut d = minicbor::decode::Decoder::new(payload);
    d.array().ok()?;
    d.skip().ok()?; // address root
    let entries = d.map().ok()??;
    let mut total = 0u64;
    for _ in 0..entries {
        let key = d.u8().ok()?;
        let value = d.bytes().ok()?;
        if key != NETWORK_MAGIC_ATTR {
            total += value.len() as u64;
        }
    }
    Some(total)
}

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for OutputBootAddrAttrsSize
{
    fn name(&self) -> &'static str {
        "output-boot-addr-attrs-size"
    }

    fn validate(
        &self,
        _ctx: &ValidationContext,
        _state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let mut offenders = Vec::new();
        for (index, output) in tx.body.outputs.iter().enumerate() {
            if let Address::Byron(byron) = &output.address {
                match bootstrap_attributes_size(&byron.to_vec()) {
                    Some(size) if size <= BOOT_ATTRS_MAX => {}
                    _ => offenders.push(index),
                }
            }
        }
        if !offenders.is_empty() {
            return Err(TransactionError::OutputBootAddrAttrsTooBig {
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
    use crate::primitives::{AddrKeyhash, NetworkId, TransactionBody, Value, WitnessSet};
    use pallas_addresses::{Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};

    fn key_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(AddrKeyhash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    #[test]
    fn one_lovelace_below_the_minimum_is_rejected() {
        let output = TransactionOutput::new(key_address(1), Value::from_coin(0));
        let params = crate::params::ProtocolParams::default();
        let required = min_ada(&output, params.utxo_cost_per_byte);

        let make_tx = |coin| {
            Transaction::new(
                TransactionBody {
                    outputs: vec![TransactionOutput::new(key_address(1), Value::from_coin(coin))],
                    ..TransactionBody::default()
                },
                WitnessSet::default(),
            )
        };

        let ctx = ValidationContext::new(NetworkId::Testnet, 0, 0, params);
        let state = LedgerState::default();
        assert!(
            OutputsHaveNotEnoughCoins
                .validate(&ctx, &state, &make_tx(required - 1))
                .is_err()
        );
        assert!(
            OutputsHaveNotEnoughCoins
                .validate(&ctx, &state, &make_tx(required))
                .is_ok()
        );
    }

    fn byron_address_with_derivation_path(len: usize) -> Vec<u8> {
        // payload = [root(28 bytes), {1: derivation, 2: magic}, 0]
        let mut payload = Vec::new();
        {
            let mut e = minicbor::Encoder::new(&mut payload);
            e.array(3).unwrap();
            e.bytes(&[0u8; 28]).unwrap();
            e.map(2).unwrap();
            e.u8(1).unwrap();
            e.bytes(&vec![9u8; len]).unwrap();
            e.u8(2).unwrap();
            e.bytes(&[1, 2, 3, 4]).unwrap();
            e.u8(0).unwrap();
        }
        let mut address = Vec::new();
        {
            let mut e = minicbor::Encoder::new(&mut address);
            e.array(2).unwrap();
            e.tag(minicbor::data::Tag::new(24)).unwrap();
            e.bytes(&payload).unwrap();
            e.u32(0).unwrap();
        }
        address
    }

    #[test]
    fn attribute_size_decodes_hand_built_byron_payloads() {
        // the 4-byte magic is exempt, the 10-byte derivation path counts
        assert_eq!(
            bootstrap_attributes_size(&byron_address_with_derivation_path(10)),
            Some(10)
        );
    }

    #[test]
    fn sixty_five_attribute_bytes_are_over_the_line() {
        assert!(bootstrap_attributes_size(&byron_address_with_derivation_path(64)).unwrap() <= 64);
        assert!(bootstrap_attributes_size(&byron_address_with_derivation_path(65)).unwrap() > 64);
    }
}
