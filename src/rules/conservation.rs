//! The value conservation equation.

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::params::ProtocolParams;
use crate::primitives::{Certificate, Coin, Transaction, Value};
use crate::state::LedgerState;
use crate::sts::Validator;

/// Total deposits the transaction pays: stake and drep registrations, new
/// pool registrations and proposal deposits.
pub fn deposits(tx: &Transaction, state: &LedgerState, params: &ProtocolParams) -> Option<Coin> {
    let mut total = 0u64;
    for cert in &tx.body.certificates {
        let deposit = match cert {
            Certificate::StakeRegistration(_) => params.stake_address_deposit,
            Certificate::Reg(_, coin)
            | Certificate::StakeRegDeleg(_, _, coin)
            | Certificate::VoteRegDeleg(_, _, coin)
            | Certificate::StakeVoteRegDeleg(_, _, _, coin)
            | Certificate::RegDRepCert(_, coin) => *coin,
            Certificate::PoolRegistration { operator, .. }
                if !state.certs.pools.stake_pools.contains_key(operator) =>
            {
                params.stake_pool_deposit
            }
            _ => 0,
        };
        total = total.checked_add(deposit)?;
    }
    for procedure in &tx.body.proposal_procedures {
        total = total.checked_add(procedure.deposit)?;
    }
    Some(total)
}

/// Total refunds the transaction collects from deregistrations.
pub fn refunds(tx: &Transaction, state: &LedgerState, params: &ProtocolParams) -> Option<Coin> {
    let mut total = 0u64;
    for cert in &tx.body.certificates {
        let refund = match cert {
            Certificate::StakeDeregistration(cred) => state
                .certs
                .delegation
                .deposits
                .get(cred)
                .copied()
                .unwrap_or(params.stake_address_deposit),
            Certificate::UnReg(_, coin) | Certificate::UnRegDRepCert(_, coin) => *coin,
            _ => 0,
        };
        total = total.checked_add(refund)?;
    }
    Some(total)
}

/// `Σ inputs + mint + Σ withdrawals + refunds = Σ outputs + fee + deposits
/// + donation`. Collateral does not participate here.
pub struct ValueNotConservedUtxo;

impl Validator<ValidationContext, LedgerState, Transaction, TransactionError>
    for ValueNotConservedUtxo
{
    fn name(&self) -> &'static str {
        "value-not-conserved"
    }

    fn validate(
        &self,
        ctx: &ValidationContext,
        state: &LedgerState,
        tx: &Transaction,
    ) -> Result<(), TransactionError> {
        let overflow = |_| TransactionError::NumericOverflow {
            transaction_id: tx.id(),
        };
        let overflow_opt = TransactionError::NumericOverflow {
            transaction_id: tx.id(),
        };

        let mut consumed = Value::default();
        for input in &tx.body.inputs {
            if let Some(output) = state.utxos.get(input) {
                consumed = consumed.checked_add(&output.value).map_err(overflow)?;
            }
        }
        consumed = consumed
            .checked_add_assets(&tx.body.mint)
            .map_err(overflow)?;
        for coin in tx.body.withdrawals.values() {
            consumed = consumed
                .checked_add(&Value::from_coin(*coin))
                .map_err(overflow)?;
        }
        let refunded = refunds(tx, state, &ctx.params).ok_or(overflow_opt.clone())?;
        consumed = consumed
            .checked_add(&Value::from_coin(refunded))
            .map_err(overflow)?;

        let mut produced = Value::default();
        for output in &tx.body.outputs {
            produced = produced.checked_add(&output.value).map_err(overflow)?;
        }
        produced = produced
            .checked_add(&Value::from_coin(tx.body.fee))
            .map_err(overflow)?;
        let deposited = deposits(tx, state, &ctx.params).ok_or(overflow_opt)?;
        produced = produced
            .checked_add(&Value::from_coin(deposited))
            .map_err(overflow)?;
        if let Some(donation) = tx.body.donation {
            produced = produced
                .checked_add(&Value::from_coin(donation))
                .map_err(overflow)?;
        }

        if consumed != produced {
            return Err(TransactionError::ValueNotConservedUtxo {
                transaction_id: tx.id(),
                consumed,
                produced,
            });
        }
        Ok(())
    }
}
