//! Persistent ledger state threaded through the rules pipeline.

use std::collections::BTreeMap;

use crate::primitives::{
    AddrKeyhash, Coin, DRep, Epoch, PoolKeyhash, RewardAccount, StakeCredential, TransactionInput,
    TransactionOutput, UnitInterval, VrfKeyhash,
};

/// The UTxO set. All inputs a transaction names must resolve here before
/// validation starts.
pub type Utxos = BTreeMap<TransactionInput, TransactionOutput>;

/// Registered stake pool parameters, as recorded by a registration
/// certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolParams {
    pub vrf_keyhash: VrfKeyhash,
    pub pledge: Coin,
    pub cost: Coin,
    pub margin: UnitInterval,
    pub reward_account: RewardAccount,
    pub pool_owners: Vec<AddrKeyhash>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoolsState {
    pub stake_pools: BTreeMap<PoolKeyhash, PoolParams>,
    pub retiring: BTreeMap<PoolKeyhash, Epoch>,
}

/// Per-credential delegation bookkeeping.
///
/// Invariants: every key of `deposits` is also a key of `rewards`; the key
/// sets of `stake_pools` and `dreps` are subsets of `deposits`' keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DelegationState {
    pub deposits: BTreeMap<StakeCredential, Coin>,
    pub rewards: BTreeMap<StakeCredential, Coin>,
    pub stake_pools: BTreeMap<StakeCredential, PoolKeyhash>,
    pub dreps: BTreeMap<StakeCredential, DRep>,
}

impl DelegationState {
    pub fn is_registered(&self, credential: &StakeCredential) -> bool {
        self.deposits.contains_key(credential)
    }

    pub fn register(&mut self, credential: StakeCredential, deposit: Coin) {
        self.deposits.insert(credential, deposit);
        self.rewards.entry(credential).or_insert(0);
    }

    pub fn deregister(&mut self, credential: &StakeCredential) {
        self.deposits.remove(credential);
        self.rewards.remove(credential);
        self.stake_pools.remove(credential);
        self.dreps.remove(credential);
    }

    pub fn reward_balance(&self, credential: &StakeCredential) -> Coin {
        self.rewards.get(credential).copied().unwrap_or(0)
    }

    /// Checks the structural invariants; used by tests and debug assertions.
    pub fn invariants_hold(&self) -> bool {
        self.deposits.keys().all(|cred| self.rewards.contains_key(cred))
            && self
                .stake_pools
                .keys()
                .all(|cred| self.deposits.contains_key(cred))
            && self.dreps.keys().all(|cred| self.deposits.contains_key(cred))
    }
}

/// DRep registration state; voting power bookkeeping beyond deposits is a
/// non-goal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VotingState {
    pub drep_deposits: BTreeMap<StakeCredential, Coin>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CertState {
    pub voting: VotingState,
    pub pools: PoolsState,
    pub delegation: DelegationState,
}

/// The full ledger state a transaction is validated against and which
/// mutators thread forward.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerState {
    pub utxos: Utxos,
    pub certs: CertState,
    pub fees: Coin,
    pub donations: Coin,
}

impl LedgerState {
    pub fn from_utxos(utxos: Utxos) -> Self {
        LedgerState {
            utxos,
            ..LedgerState::default()
        }
    }

    pub fn resolve(&self, input: &TransactionInput) -> Option<&TransactionOutput> {
        self.utxos.get(input)
    }
}
