//! Ledger primitives: coins, multi-assets, datums, scripts and the
//! transaction model itself.

pub mod data;
pub mod input;
pub mod network;
pub mod output;
pub mod script;
pub mod tx;
pub mod value;

pub use data::PlutusData;
pub use input::TransactionInput;
pub use network::NetworkId;
pub use output::{DatumOption, TransactionOutput};
pub use script::{Language, NativeScript, Script};
pub use tx::{
    Anchor, AuxiliaryData, BootstrapWitness, Certificate, Constitution, DRep, GovAction,
    GovActionId, PoolMetadata, ProposalProcedure, RedeemerTag, Redeemers, RedeemersKey,
    RedeemersValue, Relay, RewardAccount, StakeCredential, Transaction, TransactionBody,
    UnitInterval, VKeyWitness, Vote, Voter, VotingProcedure, VotingProcedures, WitnessSet,
    Withdrawals,
};
pub use value::{AssetName, Coin, MultiAsset, Value};

pub use pallas_crypto::hash::Hash;

pub type TxHash = Hash<32>;
pub type DatumHash = Hash<32>;
pub type ScriptHash = Hash<28>;
pub type PolicyId = Hash<28>;
pub type AddrKeyhash = Hash<28>;
pub type PoolKeyhash = Hash<28>;
pub type VrfKeyhash = Hash<32>;

pub type Slot = u64;
pub type Epoch = u64;

/// Script execution budget: memory units and cpu steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

impl ExUnits {
    pub const ZERO: ExUnits = ExUnits { mem: 0, steps: 0 };

    pub fn new(mem: u64, steps: u64) -> Self {
        Self { mem, steps }
    }

    pub fn is_zero(&self) -> bool {
        self.mem == 0 && self.steps == 0
    }

    /// Componentwise addition; overflow is an error, never a wrap.
    pub fn checked_add(&self, other: &ExUnits) -> Option<ExUnits> {
        Some(ExUnits {
            mem: self.mem.checked_add(other.mem)?,
            steps: self.steps.checked_add(other.steps)?,
        })
    }

    pub fn fits_within(&self, limit: &ExUnits) -> bool {
        self.mem <= limit.mem && self.steps <= limit.steps
    }
}

impl<C> minicbor::encode::Encode<C> for ExUnits {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?.u64(self.mem)?.u64(self.steps)?;
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for ExUnits {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let _ = d.array()?;
        Ok(ExUnits {
            mem: d.u64()?,
            steps: d.u64()?,
        })
    }
}
