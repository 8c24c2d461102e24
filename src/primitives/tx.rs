//! The transaction model: body, witness set, certificates, governance
//! procedures and redeemers.
//!
//! Field numbering in the canonical encodings follows the Conway CDDL; the
//! body hash and the serialized transaction size both derive from these
//! encodings.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

use pallas_addresses::{Address, StakePayload};
use pallas_crypto::hash::{Hash, Hasher};

use super::{
    AddrKeyhash, Coin, DatumHash, Epoch, ExUnits, MultiAsset, NativeScript, NetworkId, PlutusData,
    PoolKeyhash, Script, ScriptHash, TransactionInput, TransactionOutput, TxHash, VrfKeyhash,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StakeCredential {
    AddrKeyhash(AddrKeyhash),
    ScriptHash(ScriptHash),
}

impl StakeCredential {
    pub fn script_hash(&self) -> Option<ScriptHash> {
        match self {
            StakeCredential::ScriptHash(hash) => Some(*hash),
            StakeCredential::AddrKeyhash(_) => None,
        }
    }

    pub fn key_hash(&self) -> Option<AddrKeyhash> {
        match self {
            StakeCredential::AddrKeyhash(hash) => Some(*hash),
            StakeCredential::ScriptHash(_) => None,
        }
    }
}

impl<C> minicbor::encode::Encode<C> for StakeCredential {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            StakeCredential::AddrKeyhash(hash) => e.array(2)?.u8(0)?.bytes(hash.as_ref())?,
            StakeCredential::ScriptHash(hash) => e.array(2)?.u8(1)?.bytes(hash.as_ref())?,
        };
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DRep {
    Key(AddrKeyhash),
    Script(ScriptHash),
    Abstain,
    NoConfidence,
}

impl<C> minicbor::encode::Encode<C> for DRep {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            DRep::Key(hash) => e.array(2)?.u8(0)?.bytes(hash.as_ref())?,
            DRep::Script(hash) => e.array(2)?.u8(1)?.bytes(hash.as_ref())?,
            DRep::Abstain => e.array(1)?.u8(2)?,
            DRep::NoConfidence => e.array(1)?.u8(3)?,
        };
        Ok(())
    }
}

/// A reward (stake) address in raw bytes, as used for withdrawal map keys.
/// Ordered bytewise, which is also the canonical map-key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RewardAccount(Vec<u8>);

impl RewardAccount {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_key(network: NetworkId, hash: AddrKeyhash) -> Self {
        let mut bytes = vec![0xe0 | network.value()];
        bytes.extend_from_slice(hash.as_ref());
        Self(bytes)
    }

    pub fn from_script(network: NetworkId, hash: ScriptHash) -> Self {
        let mut bytes = vec![0xf0 | network.value()];
        bytes.extend_from_slice(hash.as_ref());
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_address(&self) -> Option<Address> {
        Address::from_bytes(&self.0).ok()
    }

    pub fn stake_credential(&self) -> Option<StakeCredential> {
        match self.to_address()? {
            Address::Stake(stake) => Some(match stake.payload() {
                StakePayload::Stake(hash) => StakeCredential::AddrKeyhash(*hash),
                StakePayload::Script(hash) => StakeCredential::ScriptHash(*hash),
            }),
            _ => None,
        }
    }

    pub fn script_hash(&self) -> Option<ScriptHash> {
        self.stake_credential().and_then(|cred| cred.script_hash())
    }
}

pub type Withdrawals = BTreeMap<RewardAccount, Coin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInterval {
    pub numerator: u64,
    pub denominator: u64,
}

impl<C> minicbor::encode::Encode<C> for UnitInterval {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.tag(minicbor::data::Tag::new(30))?;
        e.array(2)?.u64(self.numerator)?.u64(self.denominator)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relay {
    SingleHostAddr {
        port: Option<u32>,
        ipv4: Option<[u8; 4]>,
        ipv6: Option<[u8; 16]>,
    },
    SingleHostName {
        port: Option<u32>,
        dns_name: String,
    },
    MultiHostName {
        dns_name: String,
    },
}

impl<C> minicbor::encode::Encode<C> for Relay {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        fn opt_port<W: minicbor::encode::Write>(
            e: &mut minicbor::Encoder<W>,
            port: &Option<u32>,
        ) -> Result<(), minicbor::encode::Error<W::Error>> {
            match port {
                Some(port) => e.u32(*port)?,
                None => e.null()?,
            };
            Ok(())
        }

        match self {
            Relay::SingleHostAddr { port, ipv4, ipv6 } => {
                e.array(4)?.u8(0)?;
                opt_port(e, port)?;
                match ipv4 {
                    Some(ip) => e.bytes(ip)?,
                    None => e.null()?,
                };
                match ipv6 {
                    Some(ip) => e.bytes(ip)?,
                    None => e.null()?,
                };
            }
            Relay::SingleHostName { port, dns_name } => {
                e.array(3)?.u8(1)?;
                opt_port(e, port)?;
                e.str(dns_name)?;
            }
            Relay::MultiHostName { dns_name } => {
                e.array(2)?.u8(2)?.str(dns_name)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetadata {
    pub url: String,
    pub hash: Hash<32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration(StakeCredential),
    StakeDeregistration(StakeCredential),
    StakeDelegation(StakeCredential, PoolKeyhash),
    PoolRegistration {
        operator: PoolKeyhash,
        vrf_keyhash: VrfKeyhash,
        pledge: Coin,
        cost: Coin,
        margin: UnitInterval,
        reward_account: RewardAccount,
        pool_owners: BTreeSet<AddrKeyhash>,
        relays: Vec<Relay>,
        pool_metadata: Option<PoolMetadata>,
    },
    PoolRetirement(PoolKeyhash, Epoch),
    Reg(StakeCredential, Coin),
    UnReg(StakeCredential, Coin),
    VoteDeleg(StakeCredential, DRep),
    StakeVoteDeleg(StakeCredential, PoolKeyhash, DRep),
    StakeRegDeleg(StakeCredential, PoolKeyhash, Coin),
    VoteRegDeleg(StakeCredential, DRep, Coin),
    StakeVoteRegDeleg(StakeCredential, PoolKeyhash, DRep, Coin),
    RegDRepCert(StakeCredential, Coin),
    UnRegDRepCert(StakeCredential, Coin),
    UpdateDRepCert(StakeCredential),
}

impl Certificate {
    /// The stake credential a certificate acts on, when it has one.
    pub fn stake_credential(&self) -> Option<&StakeCredential> {
        match self {
            Certificate::StakeRegistration(cred)
            | Certificate::StakeDeregistration(cred)
            | Certificate::StakeDelegation(cred, _)
            | Certificate::Reg(cred, _)
            | Certificate::UnReg(cred, _)
            | Certificate::VoteDeleg(cred, _)
            | Certificate::StakeVoteDeleg(cred, _, _)
            | Certificate::StakeRegDeleg(cred, _, _)
            | Certificate::VoteRegDeleg(cred, _, _)
            | Certificate::StakeVoteRegDeleg(cred, _, _, _)
            | Certificate::RegDRepCert(cred, _)
            | Certificate::UnRegDRepCert(cred, _)
            | Certificate::UpdateDRepCert(cred) => Some(cred),
            Certificate::PoolRegistration { .. } | Certificate::PoolRetirement(..) => None,
        }
    }

    /// The script hash that must authorize this certificate, if its
    /// credential is script locked. Plain (legacy) registrations never
    /// require a script witness.
    pub fn script_hash(&self) -> Option<ScriptHash> {
        match self {
            Certificate::StakeRegistration(_) => None,
            other => other.stake_credential().and_then(|cred| cred.script_hash()),
        }
    }

    /// Key hashes whose signatures this certificate demands.
    pub fn required_key_hashes(&self) -> Vec<AddrKeyhash> {
        match self {
            Certificate::PoolRegistration {
                operator,
                pool_owners,
                ..
            } => {
                let mut keys = vec![*operator];
                keys.extend(pool_owners.iter().copied());
                keys
            }
            Certificate::PoolRetirement(operator, _) => vec![*operator],
            Certificate::StakeRegistration(_) => vec![],
            other => other
                .stake_credential()
                .and_then(|cred| cred.key_hash())
                .into_iter()
                .collect(),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for Certificate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Certificate::StakeRegistration(cred) => {
                e.array(2)?.u8(0)?;
                cred.encode(e, ctx)?;
            }
            Certificate::StakeDeregistration(cred) => {
                e.array(2)?.u8(1)?;
                cred.encode(e, ctx)?;
            }
            Certificate::StakeDelegation(cred, pool) => {
                e.array(3)?.u8(2)?;
                cred.encode(e, ctx)?;
                e.bytes(pool.as_ref())?;
            }
            Certificate::PoolRegistration {
                operator,
                vrf_keyhash,
                pledge,
                cost,
                margin,
                reward_account,
                pool_owners,
                relays,
                pool_metadata,
            } => {
                e.array(10)?.u8(3)?;
                e.bytes(operator.as_ref())?;
                e.bytes(vrf_keyhash.as_ref())?;
                e.u64(*pledge)?;
                e.u64(*cost)?;
                margin.encode(e, ctx)?;
                e.bytes(reward_account.as_slice())?;
                e.array(pool_owners.len() as u64)?;
                for owner in pool_owners {
                    e.bytes(owner.as_ref())?;
                }
                e.array(relays.len() as u64)?;
                for relay in relays {
                    relay.encode(e, ctx)?;
                }
                match pool_metadata {
                    Some(metadata) => {
                        e.array(2)?.str(&metadata.url)?.bytes(metadata.hash.as_ref())?;
                    }
                    None => {
                        e.null()?;
                    }
                }
            }
            Certificate::PoolRetirement(pool, epoch) => {
                e.array(3)?.u8(4)?.bytes(pool.as_ref())?.u64(*epoch)?;
            }
            Certificate::Reg(cred, deposit) => {
                e.array(3)?.u8(7)?;
                cred.encode(e, ctx)?;
                e.u64(*deposit)?;
            }
            Certificate::UnReg(cred, refund) => {
                e.array(3)?.u8(8)?;
                cred.encode(e, ctx)?;
                e.u64(*refund)?;
            }
            Certificate::VoteDeleg(cred, drep) => {
                e.array(3)?.u8(9)?;
                cred.encode(e, ctx)?;
                drep.encode(e, ctx)?;
            }
            Certificate::StakeVoteDeleg(cred, pool, drep) => {
                e.array(4)?.u8(10)?;
                cred.encode(e, ctx)?;
                e.bytes(pool.as_ref())?;
                drep.encode(e, ctx)?;
            }
            Certificate::StakeRegDeleg(cred, pool, deposit) => {
                e.array(4)?.u8(11)?;
                cred.encode(e, ctx)?;
                e.bytes(pool.as_ref())?;
                e.u64(*deposit)?;
            }
            Certificate::VoteRegDeleg(cred, drep, deposit) => {
                e.array(4)?.u8(12)?;
                cred.encode(e, ctx)?;
                drep.encode(e, ctx)?;
                e.u64(*deposit)?;
            }
            Certificate::StakeVoteRegDeleg(cred, pool, drep, deposit) => {
                e.array(5)?.u8(13)?;
                cred.encode(e, ctx)?;
                e.bytes(pool.as_ref())?;
                drep.encode(e, ctx)?;
                e.u64(*deposit)?;
            }
            Certificate::RegDRepCert(cred, deposit) => {
                e.array(4)?.u8(16)?;
                cred.encode(e, ctx)?;
                e.u64(*deposit)?;
                e.null()?;
            }
            Certificate::UnRegDRepCert(cred, refund) => {
                e.array(3)?.u8(17)?;
                cred.encode(e, ctx)?;
                e.u64(*refund)?;
            }
            Certificate::UpdateDRepCert(cred) => {
                e.array(3)?.u8(18)?;
                cred.encode(e, ctx)?;
                e.null()?;
            }
        }
        Ok(())
    }
}

// --- governance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Voter {
    ConstitutionalCommitteeScript(ScriptHash),
    ConstitutionalCommitteeKey(AddrKeyhash),
    DRepScript(ScriptHash),
    DRepKey(AddrKeyhash),
    StakePoolKey(AddrKeyhash),
}

impl Voter {
    pub fn script_hash(&self) -> Option<ScriptHash> {
        match self {
            Voter::ConstitutionalCommitteeScript(hash) | Voter::DRepScript(hash) => Some(*hash),
            _ => None,
        }
    }

    pub fn key_hash(&self) -> Option<AddrKeyhash> {
        match self {
            Voter::ConstitutionalCommitteeKey(hash)
            | Voter::DRepKey(hash)
            | Voter::StakePoolKey(hash) => Some(*hash),
            _ => None,
        }
    }
}

impl<C> minicbor::encode::Encode<C> for Voter {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let (tag, hash): (u8, &[u8]) = match self {
            Voter::ConstitutionalCommitteeKey(hash) => (0, hash.as_ref()),
            Voter::ConstitutionalCommitteeScript(hash) => (1, hash.as_ref()),
            Voter::DRepKey(hash) => (2, hash.as_ref()),
            Voter::DRepScript(hash) => (3, hash.as_ref()),
            Voter::StakePoolKey(hash) => (4, hash.as_ref()),
        };
        e.array(2)?.u8(tag)?.bytes(hash)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GovActionId {
    pub transaction_id: TxHash,
    pub action_index: u32,
}

impl<C> minicbor::encode::Encode<C> for GovActionId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?
            .bytes(self.transaction_id.as_ref())?
            .u32(self.action_index)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    No,
    Yes,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub url: String,
    pub content_hash: Hash<32>,
}

impl<C> minicbor::encode::Encode<C> for Anchor {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?.str(&self.url)?.bytes(self.content_hash.as_ref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingProcedure {
    pub vote: Vote,
    pub anchor: Option<Anchor>,
}

impl<C> minicbor::encode::Encode<C> for VotingProcedure {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.u8(match self.vote {
            Vote::No => 0,
            Vote::Yes => 1,
            Vote::Abstain => 2,
        })?;
        match &self.anchor {
            Some(anchor) => anchor.encode(e, ctx)?,
            None => {
                e.null()?;
            }
        }
        Ok(())
    }
}

pub type VotingProcedures = BTreeMap<Voter, BTreeMap<GovActionId, VotingProcedure>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constitution {
    pub anchor: Anchor,
    pub guardrail_script: Option<ScriptHash>,
}

/// Governance actions. Parameter updates are carried opaquely as `Data`;
/// the rules engine only inspects the guardrail script hashes.
#[derive(Debug, Clone, PartialEq)]
pub enum GovAction {
    ParameterChange {
        previous: Option<GovActionId>,
        update: PlutusData,
        guardrail: Option<ScriptHash>,
    },
    HardForkInitiation {
        previous: Option<GovActionId>,
        protocol_version: (u64, u64),
    },
    TreasuryWithdrawals {
        withdrawals: BTreeMap<RewardAccount, Coin>,
        guardrail: Option<ScriptHash>,
    },
    NoConfidence {
        previous: Option<GovActionId>,
    },
    UpdateCommittee {
        previous: Option<GovActionId>,
        removed: BTreeSet<StakeCredential>,
        added: BTreeMap<StakeCredential, Epoch>,
        quorum: UnitInterval,
    },
    NewConstitution {
        previous: Option<GovActionId>,
        constitution: Constitution,
    },
    Information,
}

impl GovAction {
    pub fn guardrail_script(&self) -> Option<ScriptHash> {
        match self {
            GovAction::ParameterChange { guardrail, .. }
            | GovAction::TreasuryWithdrawals { guardrail, .. } => *guardrail,
            _ => None,
        }
    }
}

impl<C> minicbor::encode::Encode<C> for GovAction {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        fn opt_id<W: minicbor::encode::Write>(
            e: &mut minicbor::Encoder<W>,
            id: &Option<GovActionId>,
        ) -> Result<(), minicbor::encode::Error<W::Error>> {
            match id {
                Some(id) => id.encode(e, &mut ())?,
                None => {
                    e.null()?;
                }
            }
            Ok(())
        }

        fn opt_script<W: minicbor::encode::Write>(
            e: &mut minicbor::Encoder<W>,
            hash: &Option<ScriptHash>,
        ) -> Result<(), minicbor::encode::Error<W::Error>> {
            match hash {
                Some(hash) => {
                    e.bytes(hash.as_ref())?;
                }
                None => {
                    e.null()?;
                }
            }
            Ok(())
        }

        match self {
            GovAction::ParameterChange {
                previous,
                update,
                guardrail,
            } => {
                e.array(4)?.u8(0)?;
                opt_id(e, previous)?;
                update.encode(e, ctx)?;
                opt_script(e, guardrail)?;
            }
            GovAction::HardForkInitiation {
                previous,
                protocol_version,
            } => {
                e.array(3)?.u8(1)?;
                opt_id(e, previous)?;
                e.array(2)?
                    .u64(protocol_version.0)?
                    .u64(protocol_version.1)?;
            }
            GovAction::TreasuryWithdrawals {
                withdrawals,
                guardrail,
            } => {
                e.array(3)?.u8(2)?;
                e.map(withdrawals.len() as u64)?;
                for (account, coin) in withdrawals {
                    e.bytes(account.as_slice())?.u64(*coin)?;
                }
                opt_script(e, guardrail)?;
            }
            GovAction::NoConfidence { previous } => {
                e.array(2)?.u8(3)?;
                opt_id(e, previous)?;
            }
            GovAction::UpdateCommittee {
                previous,
                removed,
                added,
                quorum,
            } => {
                e.array(5)?.u8(4)?;
                opt_id(e, previous)?;
                e.array(removed.len() as u64)?;
                for cred in removed {
                    cred.encode(e, ctx)?;
                }
                e.map(added.len() as u64)?;
                for (cred, epoch) in added {
                    cred.encode(e, ctx)?;
                    e.u64(*epoch)?;
                }
                quorum.encode(e, ctx)?;
            }
            GovAction::NewConstitution {
                previous,
                constitution,
            } => {
                e.array(3)?.u8(5)?;
                opt_id(e, previous)?;
                e.array(2)?;
                constitution.anchor.encode(e, ctx)?;
                opt_script(e, &constitution.guardrail_script)?;
            }
            GovAction::Information => {
                e.array(1)?.u8(6)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposalProcedure {
    pub deposit: Coin,
    pub reward_account: RewardAccount,
    pub gov_action: GovAction,
    pub anchor: Anchor,
}

impl<C> minicbor::encode::Encode<C> for ProposalProcedure {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(4)?.u64(self.deposit)?;
        e.bytes(self.reward_account.as_slice())?;
        self.gov_action.encode(e, ctx)?;
        self.anchor.encode(e, ctx)?;
        Ok(())
    }
}

// --- redeemers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
    Vote,
    Propose,
}

impl RedeemerTag {
    pub fn value(&self) -> u8 {
        match self {
            RedeemerTag::Spend => 0,
            RedeemerTag::Mint => 1,
            RedeemerTag::Cert => 2,
            RedeemerTag::Reward => 3,
            RedeemerTag::Vote => 4,
            RedeemerTag::Propose => 5,
        }
    }
}

impl std::fmt::Display for RedeemerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedeemerTag::Spend => write!(f, "spend"),
            RedeemerTag::Mint => write!(f, "mint"),
            RedeemerTag::Cert => write!(f, "cert"),
            RedeemerTag::Reward => write!(f, "reward"),
            RedeemerTag::Vote => write!(f, "vote"),
            RedeemerTag::Propose => write!(f, "propose"),
        }
    }
}

/// Redeemer pointer: purpose tag plus index into the purpose's canonical
/// ordering. The derived `Ord` (tag first, then index) is the canonical
/// redeemer ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedeemersKey {
    pub tag: RedeemerTag,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedeemersValue {
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Redeemers(BTreeMap<RedeemersKey, RedeemersValue>);

impl Deref for Redeemers {
    type Target = BTreeMap<RedeemersKey, RedeemersValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Redeemers {
    pub fn from_map(map: BTreeMap<RedeemersKey, RedeemersValue>) -> Self {
        Self(map)
    }

    pub fn insert(&mut self, key: RedeemersKey, value: RedeemersValue) {
        self.0.insert(key, value);
    }

    /// Componentwise total; `None` on overflow.
    pub fn total_ex_units(&self) -> Option<ExUnits> {
        self.0
            .values()
            .try_fold(ExUnits::ZERO, |acc, redeemer| {
                acc.checked_add(&redeemer.ex_units)
            })
    }
}

impl<C> minicbor::encode::Encode<C> for Redeemers {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.map(self.0.len() as u64)?;
        for (key, value) in self.0.iter() {
            e.array(2)?.u8(key.tag.value())?.u32(key.index)?;
            e.array(2)?;
            value.data.encode(e, ctx)?;
            value.ex_units.encode(e, ctx)?;
        }
        Ok(())
    }
}

// --- witnesses ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VKeyWitness {
    pub vkey: Vec<u8>,
    pub signature: Vec<u8>,
}

impl VKeyWitness {
    pub fn key_hash(&self) -> AddrKeyhash {
        Hasher::<224>::hash(&self.vkey)
    }
}

impl<C> minicbor::encode::Encode<C> for VKeyWitness {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?.bytes(&self.vkey)?.bytes(&self.signature)?;
        Ok(())
    }
}

/// Byron-era witness; verification uses the plain Ed25519 key, the extra
/// fields only participate in address reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapWitness {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub chain_code: Vec<u8>,
    pub attributes: Vec<u8>,
}

impl<C> minicbor::encode::Encode<C> for BootstrapWitness {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(4)?
            .bytes(&self.public_key)?
            .bytes(&self.signature)?
            .bytes(&self.chain_code)?
            .bytes(&self.attributes)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WitnessSet {
    pub vkeywitness: Vec<VKeyWitness>,
    pub native_script: Vec<NativeScript>,
    pub bootstrap_witness: Vec<BootstrapWitness>,
    pub plutus_v1_script: Vec<Vec<u8>>,
    pub plutus_data: Vec<PlutusData>,
    pub redeemer: Redeemers,
    pub plutus_v2_script: Vec<Vec<u8>>,
    pub plutus_v3_script: Vec<Vec<u8>>,
}

impl WitnessSet {
    /// All scripts carried in this witness set, in their `Script` form.
    pub fn scripts(&self) -> Vec<Script> {
        let mut scripts: Vec<Script> = Vec::new();
        scripts.extend(self.native_script.iter().cloned().map(Script::Native));
        scripts.extend(self.plutus_v1_script.iter().cloned().map(Script::PlutusV1));
        scripts.extend(self.plutus_v2_script.iter().cloned().map(Script::PlutusV2));
        scripts.extend(self.plutus_v3_script.iter().cloned().map(Script::PlutusV3));
        scripts
    }

    pub fn datums_by_hash(&self) -> BTreeMap<DatumHash, &PlutusData> {
        self.plutus_data
            .iter()
            .map(|data| (data.hash(), data))
            .collect()
    }
}

impl<C> minicbor::encode::Encode<C> for WitnessSet {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let len = !self.vkeywitness.is_empty() as u64
            + !self.native_script.is_empty() as u64
            + !self.bootstrap_witness.is_empty() as u64
            + !self.plutus_v1_script.is_empty() as u64
            + !self.plutus_data.is_empty() as u64
            + !self.redeemer.is_empty() as u64
            + !self.plutus_v2_script.is_empty() as u64
            + !self.plutus_v3_script.is_empty() as u64;
        e.map(len)?;
        if !self.vkeywitness.is_empty() {
            e.u8(0)?.array(self.vkeywitness.len() as u64)?;
            for witness in &self.vkeywitness {
                witness.encode(e, ctx)?;
            }
        }
        if !self.native_script.is_empty() {
            e.u8(1)?.array(self.native_script.len() as u64)?;
            for script in &self.native_script {
                script.encode(e, ctx)?;
            }
        }
        if !self.bootstrap_witness.is_empty() {
            e.u8(2)?.array(self.bootstrap_witness.len() as u64)?;
            for witness in &self.bootstrap_witness {
                witness.encode(e, ctx)?;
            }
        }
        if !self.plutus_v1_script.is_empty() {
            e.u8(3)?.array(self.plutus_v1_script.len() as u64)?;
            for script in &self.plutus_v1_script {
                e.bytes(script)?;
            }
        }
        if !self.plutus_data.is_empty() {
            e.u8(4)?.array(self.plutus_data.len() as u64)?;
            for data in &self.plutus_data {
                data.encode(e, ctx)?;
            }
        }
        if !self.redeemer.is_empty() {
            e.u8(5)?;
            self.redeemer.encode(e, ctx)?;
        }
        if !self.plutus_v2_script.is_empty() {
            e.u8(6)?.array(self.plutus_v2_script.len() as u64)?;
            for script in &self.plutus_v2_script {
                e.bytes(script)?;
            }
        }
        if !self.plutus_v3_script.is_empty() {
            e.u8(7)?.array(self.plutus_v3_script.len() as u64)?;
            for script in &self.plutus_v3_script {
                e.bytes(script)?;
            }
        }
        Ok(())
    }
}

/// Auxiliary (metadata) payload, kept as raw bytes; only its hash matters
/// to the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryData(pub Vec<u8>);

impl AuxiliaryData {
    pub fn hash(&self) -> Hash<32> {
        Hasher::<256>::hash(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionBody {
    pub inputs: BTreeSet<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: Coin,
    pub ttl: Option<u64>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Withdrawals,
    pub auxiliary_data_hash: Option<Hash<32>>,
    pub validity_interval_start: Option<u64>,
    pub mint: MultiAsset,
    pub script_data_hash: Option<Hash<32>>,
    pub collateral: BTreeSet<TransactionInput>,
    pub required_signers: BTreeSet<AddrKeyhash>,
    pub network_id: Option<NetworkId>,
    pub collateral_return: Option<TransactionOutput>,
    pub total_collateral: Option<Coin>,
    pub reference_inputs: BTreeSet<TransactionInput>,
    pub voting_procedures: VotingProcedures,
    pub proposal_procedures: Vec<ProposalProcedure>,
    pub treasury_value: Option<Coin>,
    pub donation: Option<Coin>,
}

impl<C> minicbor::encode::Encode<C> for TransactionBody {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let len = 3
            + self.ttl.is_some() as u64
            + !self.certificates.is_empty() as u64
            + !self.withdrawals.is_empty() as u64
            + self.auxiliary_data_hash.is_some() as u64
            + self.validity_interval_start.is_some() as u64
            + !self.mint.is_empty() as u64
            + self.script_data_hash.is_some() as u64
            + !self.collateral.is_empty() as u64
            + !self.required_signers.is_empty() as u64
            + self.network_id.is_some() as u64
            + self.collateral_return.is_some() as u64
            + self.total_collateral.is_some() as u64
            + !self.reference_inputs.is_empty() as u64
            + !self.voting_procedures.is_empty() as u64
            + !self.proposal_procedures.is_empty() as u64
            + self.treasury_value.is_some() as u64
            + self.donation.is_some() as u64;
        e.map(len)?;

        e.u8(0)?.array(self.inputs.len() as u64)?;
        for input in &self.inputs {
            input.encode(e, ctx)?;
        }
        e.u8(1)?.array(self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.encode(e, ctx)?;
        }
        e.u8(2)?.u64(self.fee)?;
        if let Some(ttl) = self.ttl {
            e.u8(3)?.u64(ttl)?;
        }
        if !self.certificates.is_empty() {
            e.u8(4)?.array(self.certificates.len() as u64)?;
            for cert in &self.certificates {
                cert.encode(e, ctx)?;
            }
        }
        if !self.withdrawals.is_empty() {
            e.u8(5)?.map(self.withdrawals.len() as u64)?;
            for (account, coin) in &self.withdrawals {
                e.bytes(account.as_slice())?.u64(*coin)?;
            }
        }
        if let Some(hash) = &self.auxiliary_data_hash {
            e.u8(7)?.bytes(hash.as_ref())?;
        }
        if let Some(start) = self.validity_interval_start {
            e.u8(8)?.u64(start)?;
        }
        if !self.mint.is_empty() {
            e.u8(9)?.map(self.mint.len() as u64)?;
            for (policy, assets) in self.mint.iter() {
                e.bytes(policy.as_ref())?.map(assets.len() as u64)?;
                for (name, quantity) in assets {
                    e.bytes(name.as_slice())?.i64(*quantity)?;
                }
            }
        }
        if let Some(hash) = &self.script_data_hash {
            e.u8(11)?.bytes(hash.as_ref())?;
        }
        if !self.collateral.is_empty() {
            e.u8(13)?.array(self.collateral.len() as u64)?;
            for input in &self.collateral {
                input.encode(e, ctx)?;
            }
        }
        if !self.required_signers.is_empty() {
            e.u8(14)?.array(self.required_signers.len() as u64)?;
            for signer in &self.required_signers {
                e.bytes(signer.as_ref())?;
            }
        }
        if let Some(network) = self.network_id {
            e.u8(15)?.u8(network.value())?;
        }
        if let Some(output) = &self.collateral_return {
            e.u8(16)?;
            output.encode(e, ctx)?;
        }
        if let Some(total) = self.total_collateral {
            e.u8(17)?.u64(total)?;
        }
        if !self.reference_inputs.is_empty() {
            e.u8(18)?.array(self.reference_inputs.len() as u64)?;
            for input in &self.reference_inputs {
                input.encode(e, ctx)?;
            }
        }
        if !self.voting_procedures.is_empty() {
            e.u8(19)?.map(self.voting_procedures.len() as u64)?;
            for (voter, votes) in &self.voting_procedures {
                voter.encode(e, ctx)?;
                e.map(votes.len() as u64)?;
                for (action, procedure) in votes {
                    action.encode(e, ctx)?;
                    procedure.encode(e, ctx)?;
                }
            }
        }
        if !self.proposal_procedures.is_empty() {
            e.u8(20)?.array(self.proposal_procedures.len() as u64)?;
            for procedure in &self.proposal_procedures {
                procedure.encode(e, ctx)?;
            }
        }
        if let Some(value) = self.treasury_value {
            e.u8(21)?.u64(value)?;
        }
        if let Some(donation) = self.donation {
            e.u8(22)?.u64(donation)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub body: TransactionBody,
    pub witness_set: WitnessSet,
    pub is_valid: bool,
    pub auxiliary_data: Option<AuxiliaryData>,
}

impl Transaction {
    pub fn new(body: TransactionBody, witness_set: WitnessSet) -> Self {
        Self {
            body,
            witness_set,
            is_valid: true,
            auxiliary_data: None,
        }
    }

    /// Transaction id: BLAKE2b-256 over the canonical body encoding. This is
    /// the value signatures are verified against.
    pub fn id(&self) -> TxHash {
        let body = minicbor::to_vec(&self.body).expect("body encoding to a vector cannot fail");
        Hasher::<256>::hash(&body)
    }

    /// Size, in bytes, of the canonical full-transaction encoding.
    pub fn encoded_size(&self) -> u64 {
        minicbor::to_vec(self)
            .expect("transaction encoding to a vector cannot fail")
            .len() as u64
    }
}

impl<C> minicbor::encode::Encode<C> for Transaction {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(4)?;
        self.body.encode(e, ctx)?;
        self.witness_set.encode(e, ctx)?;
        e.bool(self.is_valid)?;
        match &self.auxiliary_data {
            // Auxiliary bytes are spliced verbatim: they are already CBOR.
            Some(aux) => e.writer_mut().write_all(&aux.0).map_err(minicbor::encode::Error::write)?,
            None => {
                e.null()?;
            }
        }
        Ok(())
    }
}
