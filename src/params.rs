//! Protocol parameters and slot arithmetic consumed by the rules engine
//! and the script evaluator.

use std::collections::BTreeMap;

use crate::primitives::{Coin, Epoch, ExUnits, Language, Slot, UnitInterval};

/// Prices per execution unit, as exact rationals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExUnitPrices {
    pub mem_price: UnitInterval,
    pub step_price: UnitInterval,
}

/// One integer parameter vector per Plutus language version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CostModels {
    pub plutus_v1: Option<Vec<i64>>,
    pub plutus_v2: Option<Vec<i64>>,
    pub plutus_v3: Option<Vec<i64>>,
}

impl CostModels {
    pub fn get(&self, language: Language) -> Option<&Vec<i64>> {
        match language {
            Language::PlutusV1 => self.plutus_v1.as_ref(),
            Language::PlutusV2 => self.plutus_v2.as_ref(),
            Language::PlutusV3 => self.plutus_v3.as_ref(),
        }
    }

    /// The view restricted to the given languages, in language order; this
    /// is the set that feeds the script-data hash.
    pub fn restricted(&self, languages: &[Language]) -> BTreeMap<Language, Vec<i64>> {
        let mut out = BTreeMap::new();
        for language in languages {
            if let Some(model) = self.get(*language) {
                out.insert(*language, model.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParams {
    /// Fee per transaction byte.
    pub min_fee_a: u64,
    /// Constant fee summand.
    pub min_fee_b: u64,
    pub max_tx_size: u64,
    pub max_value_size: u64,
    pub utxo_cost_per_byte: Coin,
    pub collateral_percentage: u64,
    pub max_collateral_inputs: u64,
    pub max_tx_ex_units: ExUnits,
    pub ex_unit_prices: ExUnitPrices,
    pub cost_models: CostModels,
    pub stake_address_deposit: Coin,
    pub stake_pool_deposit: Coin,
    pub min_pool_cost: Coin,
    pub pool_retire_max_epoch: Epoch,
    pub drep_deposit: Coin,
    pub protocol_version: (u64, u64),
    /// Base price, lovelace per byte, of scripts provided through reference
    /// inputs. The effective price escalates per 25 KiB tier.
    pub min_fee_ref_script_cost_per_byte: u64,
}

impl Default for ProtocolParams {
    /// Mainnet-shaped defaults; tests override the fields they exercise.
    fn default() -> Self {
        ProtocolParams {
            min_fee_a: 44,
            min_fee_b: 155_381,
            max_tx_size: 16_384,
            max_value_size: 5_000,
            utxo_cost_per_byte: 4_310,
            collateral_percentage: 150,
            max_collateral_inputs: 3,
            max_tx_ex_units: ExUnits {
                mem: 14_000_000,
                steps: 10_000_000_000,
            },
            ex_unit_prices: ExUnitPrices {
                mem_price: UnitInterval {
                    numerator: 577,
                    denominator: 10_000,
                },
                step_price: UnitInterval {
                    numerator: 721,
                    denominator: 10_000_000,
                },
            },
            cost_models: CostModels::default(),
            stake_address_deposit: 2_000_000,
            stake_pool_deposit: 500_000_000,
            min_pool_cost: 170_000_000,
            pool_retire_max_epoch: 18,
            drep_deposit: 500_000_000,
            protocol_version: (9, 0),
            min_fee_ref_script_cost_per_byte: 15,
        }
    }
}

/// Slot-to-wallclock conversion for validity intervals and script contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    pub slot_length: u64,
    pub zero_slot: Slot,
    pub zero_time: u64,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            slot_length: 1000,
            zero_slot: 4_492_800,
            zero_time: 1_596_059_091_000,
        }
    }
}

impl SlotConfig {
    /// POSIX milliseconds at the *beginning* of the slot. Slots before the
    /// config's zero slot are outside the forecast horizon.
    pub fn slot_to_posix_time(&self, slot: Slot) -> Option<u64> {
        let elapsed = slot.checked_sub(self.zero_slot)?;
        Some(self.zero_time + elapsed * self.slot_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_conversion_is_linear() {
        let config = SlotConfig {
            slot_length: 1000,
            zero_slot: 100,
            zero_time: 50_000,
        };
        assert_eq!(config.slot_to_posix_time(100), Some(50_000));
        assert_eq!(config.slot_to_posix_time(103), Some(53_000));
        assert_eq!(config.slot_to_posix_time(99), None);
    }

    #[test]
    fn restricted_cost_models_follow_usage() {
        let models = CostModels {
            plutus_v1: Some(vec![1, 2]),
            plutus_v2: Some(vec![3]),
            plutus_v3: None,
        };
        let restricted = models.restricted(&[Language::PlutusV2, Language::PlutusV3]);
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted.get(&Language::PlutusV2), Some(&vec![3]));
    }
}
