//! The phase-1 validator catalogue.
//!
//! Each rule is an independent predicate over (context, state,
//! transaction); [`phase1_validators`] lists them in the canonical pipeline
//! order used by `apply_transaction`.

pub mod certs;
pub mod conservation;
pub mod fees;
pub mod inputs;
pub mod interval;
pub mod limits;
pub mod metadata;
pub mod network;
pub mod outputs;
pub mod pools;
pub mod resolution;
pub mod scripts;
pub mod witnesses;

use crate::context::ValidationContext;
use crate::errors::TransactionError;
use crate::primitives::Transaction;
use crate::state::LedgerState;
use crate::sts::Validator;

pub type TxValidator =
    dyn Validator<ValidationContext, LedgerState, Transaction, TransactionError>;

/// The full catalogue, in pipeline order. Every validator observes the
/// initial state; ordering only affects which error is reported first.
pub fn phase1_validators() -> Vec<&'static TxValidator> {
    vec![
        &inputs::EmptyInputs,
        &inputs::AllInputsMustBeInUtxo,
        &inputs::InputsAndReferenceInputsDisjoint,
        &limits::TransactionSize,
        &interval::OutsideValidityInterval,
        &interval::OutsideForecast,
        &outputs::OutputsHaveNotEnoughCoins,
        &limits::OutputsHaveTooBigValueStorageSize,
        &outputs::OutputBootAddrAttrsSize,
        &network::WrongNetwork,
        &network::WrongNetworkInTxBody,
        &network::WrongNetworkWithdrawal,
        &conservation::ValueNotConservedUtxo,
        &fees::FeesOk,
        &limits::ExUnitsTooBig,
        &limits::TooManyCollateralInputs,
        &metadata::Metadata,
        &witnesses::MissingKeyHashes,
        &witnesses::VerifiedSignaturesInWitnesses,
        &scripts::MissingOrExtraScriptHashes,
        &scripts::NativeScripts,
        &scripts::ScriptsWellFormed,
        &scripts::ExactSetOfRedeemers,
        &scripts::MissingRequiredDatums,
        &scripts::ProtocolParamsViewHashesMatch,
        &certs::StakeCertificates,
        &pools::StakePoolCertificates,
    ]
}
