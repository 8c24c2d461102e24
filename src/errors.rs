//! The closed error sum of the rules engine. One kind per validator (or
//! small family), each carrying the transaction id plus enough payload to
//! pinpoint the offending part of the transaction.

use std::collections::BTreeSet;

use crate::primitives::{
    AddrKeyhash, Coin, DatumHash, ExUnits, Hash, NetworkId, PoolKeyhash, RedeemersKey,
    RewardAccount, ScriptHash, StakeCredential, TransactionInput, TxHash, Value,
};

/// One of the up-to-six independent violations `FeesOk` can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeeViolation {
    #[error("fee {actual} is below the minimum {minimum}")]
    FeeTooSmall { minimum: Coin, actual: Coin },
    #[error("collateral inputs are not all key locked: {offenders:?}")]
    CollateralNotKeyLocked { offenders: Vec<TransactionInput> },
    #[error("collateral balance contains non-ada assets")]
    CollateralNotAdaOnly,
    #[error("collateral {provided} does not cover {percentage}% of fee {fee}")]
    CollateralInsufficient {
        provided: Coin,
        fee: Coin,
        percentage: u64,
    },
    #[error("annotated total collateral {annotated} differs from actual {actual}")]
    TotalCollateralMismatch { annotated: Coin, actual: Coin },
    #[error("transaction runs scripts but has no collateral inputs")]
    NoCollateralInputs,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetadataViolation {
    #[error("auxiliary data hash is annotated but no auxiliary data is present")]
    DataMissing,
    #[error("auxiliary data is present but no hash is annotated")]
    HashMissing,
    #[error("auxiliary data hash mismatch: annotated {annotated}, computed {computed}")]
    HashMismatch { annotated: Hash<32>, computed: Hash<32> },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CertViolation {
    #[error("stake credential is already registered")]
    AlreadyRegistered { credential: StakeCredential },
    #[error("stake credential is not registered")]
    MissingRegistration { credential: StakeCredential },
    #[error("certificate deposit {supplied} differs from required {required}")]
    InvalidDeposit {
        credential: StakeCredential,
        supplied: Coin,
        required: Coin,
    },
    #[error("deregistration refund {supplied} differs from recorded deposit {recorded}")]
    RefundMismatch {
        credential: StakeCredential,
        supplied: Coin,
        recorded: Coin,
    },
    #[error("stake credential still has {balance} in rewards")]
    RewardsNotZero {
        credential: StakeCredential,
        balance: Coin,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoolViolation {
    #[error("pool cost {cost} is below the minimum {minimum}")]
    CostBelowMinimum {
        pool: PoolKeyhash,
        cost: Coin,
        minimum: Coin,
    },
    #[error("pool retirement epoch {epoch} is outside ({current}, {latest}]")]
    RetirementOutOfBounds {
        pool: PoolKeyhash,
        epoch: u64,
        current: u64,
        latest: u64,
    },
    #[error("retiring pool is not registered")]
    NotRegistered { pool: PoolKeyhash },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransactionError {
    #[error("transaction {transaction_id} has no inputs")]
    EmptyInputs { transaction_id: TxHash },

    #[error("transaction {transaction_id}: inputs not in the utxo set: {missing:?}")]
    BadInputsUtxo {
        transaction_id: TxHash,
        missing: BTreeSet<TransactionInput>,
    },

    #[error("transaction {transaction_id}: collateral inputs not in the utxo set: {missing:?}")]
    BadCollateralInputsUtxo {
        transaction_id: TxHash,
        missing: BTreeSet<TransactionInput>,
    },

    #[error("transaction {transaction_id}: reference inputs not in the utxo set: {missing:?}")]
    BadReferenceInputsUtxo {
        transaction_id: TxHash,
        missing: BTreeSet<TransactionInput>,
    },

    #[error("transaction {transaction_id}: inputs and reference inputs overlap: {overlap:?}")]
    NonDisjointInputsAndReferenceInputs {
        transaction_id: TxHash,
        overlap: BTreeSet<TransactionInput>,
    },

    #[error("transaction {transaction_id} is {actual} bytes, over the {maximum} byte limit")]
    InvalidTransactionSize {
        transaction_id: TxHash,
        actual: u64,
        maximum: u64,
    },

    #[error("transaction {transaction_id}: slot {slot} outside validity interval")]
    OutsideValidityInterval {
        transaction_id: TxHash,
        slot: u64,
        start: Option<u64>,
        end: Option<u64>,
    },

    #[error("transaction {transaction_id}: validity bound precedes the forecast horizon")]
    OutsideForecast { transaction_id: TxHash, slot: u64 },

    #[error("transaction {transaction_id}: outputs below the minimum coin requirement")]
    OutputsHaveNotEnoughCoins {
        transaction_id: TxHash,
        /// (output index, actual coin, required coin); the collateral
        /// return output reports index `|outputs|`.
        offenders: Vec<(usize, Coin, Coin)>,
    },

    #[error("transaction {transaction_id}: output values over the {maximum} byte size limit")]
    OutputsHaveTooBigValueStorageSize {
        transaction_id: TxHash,
        offenders: Vec<(usize, u64)>,
        maximum: u64,
    },

    #[error("transaction {transaction_id}: byron output attributes over 64 bytes")]
    OutputBootAddrAttrsTooBig {
        transaction_id: TxHash,
        offenders: Vec<usize>,
    },

    #[error("transaction {transaction_id}: outputs addressed to the wrong network")]
    WrongNetworkAddress {
        transaction_id: TxHash,
        /// Raw address bytes of every offending output.
        offenders: Vec<Vec<u8>>,
    },

    #[error("transaction {transaction_id}: withdrawals from the wrong network")]
    WrongNetworkWithdrawal {
        transaction_id: TxHash,
        offenders: Vec<RewardAccount>,
    },

    #[error("transaction {transaction_id}: body network id {actual:?} differs from {expected:?}")]
    WrongNetworkInTxBody {
        transaction_id: TxHash,
        actual: NetworkId,
        expected: NetworkId,
    },

    #[error(
        "transaction {transaction_id}: value not conserved (consumed {consumed:?}, produced {produced:?})"
    )]
    ValueNotConservedUtxo {
        transaction_id: TxHash,
        consumed: Value,
        produced: Value,
    },

    #[error("transaction {transaction_id}: fee checks failed: {violations:?}")]
    FeesOk {
        transaction_id: TxHash,
        violations: Vec<FeeViolation>,
    },

    #[error("transaction {transaction_id}: execution units {actual:?} over maximum {maximum:?}")]
    ExUnitsExceedMax {
        transaction_id: TxHash,
        actual: ExUnits,
        maximum: ExUnits,
    },

    #[error("transaction {transaction_id}: {actual} collateral inputs, over the {maximum} limit")]
    TooManyCollateralInputs {
        transaction_id: TxHash,
        actual: u64,
        maximum: u64,
    },

    #[error("transaction {transaction_id}: metadata check failed: {violation}")]
    Metadata {
        transaction_id: TxHash,
        violation: MetadataViolation,
    },

    #[error("transaction {transaction_id}: missing key hashes: {missing:?}")]
    MissingKeyHashes {
        transaction_id: TxHash,
        missing: BTreeSet<AddrKeyhash>,
    },

    #[error("transaction {transaction_id}: invalid signatures for keys: {invalid:?}")]
    InvalidSignaturesInWitnesses {
        transaction_id: TxHash,
        invalid: Vec<AddrKeyhash>,
    },

    #[error(
        "transaction {transaction_id}: script witnesses mismatch (missing {missing:?}, extra {extra:?})"
    )]
    MissingOrExtraScriptHashes {
        transaction_id: TxHash,
        missing: BTreeSet<ScriptHash>,
        extra: BTreeSet<ScriptHash>,
    },

    #[error("transaction {transaction_id}: native scripts evaluated to false: {failed:?}")]
    NativeScripts {
        transaction_id: TxHash,
        failed: Vec<ScriptHash>,
    },

    #[error("transaction {transaction_id}: ill-formed plutus scripts: {scripts:?}")]
    IllFormedScripts {
        transaction_id: TxHash,
        scripts: Vec<ScriptHash>,
    },

    #[error(
        "transaction {transaction_id}: redeemer set mismatch (missing {missing:?}, extra {extra:?})"
    )]
    ExactSetOfRedeemers {
        transaction_id: TxHash,
        missing: Vec<RedeemersKey>,
        extra: Vec<RedeemersKey>,
    },

    #[error(
        "transaction {transaction_id}: datum mismatch (missing {missing:?}, supplemental {supplemental:?})"
    )]
    Datums {
        transaction_id: TxHash,
        missing: BTreeSet<DatumHash>,
        supplemental: BTreeSet<DatumHash>,
    },

    #[error(
        "transaction {transaction_id}: script data hash mismatch (annotated {annotated:?}, computed {computed:?})"
    )]
    InvalidScriptDataHash {
        transaction_id: TxHash,
        annotated: Option<Hash<32>>,
        computed: Option<Hash<32>>,
    },

    #[error("transaction {transaction_id}: stake certificate violations: {violations:?}")]
    StakeCertificates {
        transaction_id: TxHash,
        violations: Vec<CertViolation>,
    },

    #[error("transaction {transaction_id}: stake pool violations: {violations:?}")]
    StakePool {
        transaction_id: TxHash,
        violations: Vec<PoolViolation>,
    },

    #[error("transaction {transaction_id}: plutus validation failed: {message}")]
    PlutusScriptValidation {
        transaction_id: TxHash,
        message: String,
        logs: Vec<String>,
    },

    #[error(
        "transaction {transaction_id}: phase-2 outcome disagrees with the is-valid flag ({is_valid})"
    )]
    UnexpectedPhase2Outcome {
        transaction_id: TxHash,
        is_valid: bool,
    },

    #[error("transaction {transaction_id}: arithmetic overflow during accounting")]
    NumericOverflow { transaction_id: TxHash },
}

impl TransactionError {
    pub fn transaction_id(&self) -> TxHash {
        use TransactionError::*;
        match self {
            EmptyInputs { transaction_id }
            | BadInputsUtxo { transaction_id, .. }
            | BadCollateralInputsUtxo { transaction_id, .. }
            | BadReferenceInputsUtxo { transaction_id, .. }
            | NonDisjointInputsAndReferenceInputs { transaction_id, .. }
            | InvalidTransactionSize { transaction_id, .. }
            | OutsideValidityInterval { transaction_id, .. }
            | OutsideForecast { transaction_id, .. }
            | OutputsHaveNotEnoughCoins { transaction_id, .. }
            | OutputsHaveTooBigValueStorageSize { transaction_id, .. }
            | OutputBootAddrAttrsTooBig { transaction_id, .. }
            | WrongNetworkAddress { transaction_id, .. }
            | WrongNetworkWithdrawal { transaction_id, .. }
            | WrongNetworkInTxBody { transaction_id, .. }
            | ValueNotConservedUtxo { transaction_id, .. }
            | FeesOk { transaction_id, .. }
            | ExUnitsExceedMax { transaction_id, .. }
            | TooManyCollateralInputs { transaction_id, .. }
            | Metadata { transaction_id, .. }
            | MissingKeyHashes { transaction_id, .. }
            | InvalidSignaturesInWitnesses { transaction_id, .. }
            | MissingOrExtraScriptHashes { transaction_id, .. }
            | NativeScripts { transaction_id, .. }
            | IllFormedScripts { transaction_id, .. }
            | ExactSetOfRedeemers { transaction_id, .. }
            | Datums { transaction_id, .. }
            | InvalidScriptDataHash { transaction_id, .. }
            | StakeCertificates { transaction_id, .. }
            | StakePool { transaction_id, .. }
            | PlutusScriptValidation { transaction_id, .. }
            | UnexpectedPhase2Outcome { transaction_id, .. }
            | NumericOverflow { transaction_id } => *transaction_id,
        }
    }
}
