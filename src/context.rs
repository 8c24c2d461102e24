//! The transient environment a transaction is validated in.

use crate::params::{ProtocolParams, SlotConfig};
use crate::primitives::{Epoch, NetworkId, Slot};

/// Everything the pipeline needs besides ledger state and the transaction
/// itself. There is no process-wide default: callers construct one per
/// validation run.
///
/// `epoch` is an explicit field on purpose: pool retirement windows are
/// defined in epochs, and deriving an epoch from the slot here would bake
/// an era-dependent epoch length into consensus rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationContext {
    pub network: NetworkId,
    pub slot: Slot,
    pub epoch: Epoch,
    pub params: ProtocolParams,
    pub slot_config: SlotConfig,
}

impl ValidationContext {
    pub fn new(network: NetworkId, slot: Slot, epoch: Epoch, params: ProtocolParams) -> Self {
        Self {
            network,
            slot,
            epoch,
            params,
            slot_config: SlotConfig::default(),
        }
    }
}
