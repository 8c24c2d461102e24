//! Coins, native assets and the `Value` type used for conservation
//! accounting.

use std::collections::BTreeMap;
use std::ops::Deref;

use super::PolicyId;

pub type Coin = u64;

/// An asset name: up to 32 raw bytes, ordered bytewise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssetName(Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("coin arithmetic overflows")]
    CoinOverflow,
    #[error("asset quantity arithmetic overflows")]
    AssetOverflow,
}

impl AssetName {
    pub const MAX_LEN: usize = 32;

    pub fn new(bytes: Vec<u8>) -> Result<Self, Vec<u8>> {
        if bytes.len() > Self::MAX_LEN {
            Err(bytes)
        } else {
            Ok(Self(bytes))
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for AssetName {
    type Error = Vec<u8>;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl std::fmt::Display for AssetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Nested policy -> asset name -> signed quantity mapping, kept in
/// canonical form: no zero quantities, no empty inner maps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiAsset(BTreeMap<PolicyId, BTreeMap<AssetName, i64>>);

impl Deref for MultiAsset {
    type Target = BTreeMap<PolicyId, BTreeMap<AssetName, i64>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MultiAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a canonical multi-asset from arbitrary entries, summing
    /// duplicates and dropping zeroes.
    pub fn from_entries<I>(entries: I) -> Result<Self, ValueError>
    where
        I: IntoIterator<Item = (PolicyId, AssetName, i64)>,
    {
        let mut out = MultiAsset::new();
        for (policy, name, quantity) in entries {
            out.add_quantity(policy, name, quantity)?;
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn quantity(&self, policy: &PolicyId, name: &AssetName) -> i64 {
        self.0
            .get(policy)
            .and_then(|assets| assets.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn add_quantity(
        &mut self,
        policy: PolicyId,
        name: AssetName,
        quantity: i64,
    ) -> Result<(), ValueError> {
        if quantity == 0 {
            return Ok(());
        }
        let assets = self.0.entry(policy).or_default();
        let slot = assets.entry(name.clone()).or_insert(0);
        *slot = slot.checked_add(quantity).ok_or(ValueError::AssetOverflow)?;
        if *slot == 0 {
            assets.remove(&name);
        }
        if assets.is_empty() {
            self.0.remove(&policy);
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &MultiAsset) -> Result<MultiAsset, ValueError> {
        let mut out = self.clone();
        for (policy, assets) in other.iter() {
            for (name, quantity) in assets {
                out.add_quantity(*policy, name.clone(), *quantity)?;
            }
        }
        Ok(out)
    }

    pub fn negated(&self) -> MultiAsset {
        let mut out = self.clone();
        for assets in out.0.values_mut() {
            for quantity in assets.values_mut() {
                *quantity = -*quantity;
            }
        }
        out
    }

    pub fn has_negative(&self) -> bool {
        self.0
            .values()
            .any(|assets| assets.values().any(|quantity| *quantity < 0))
    }

    /// Iterates policies in key order; used wherever a canonical policy
    /// ordering is required (mint redeemer indices, context building).
    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> {
        self.0.keys()
    }
}

/// A full ledger value: lovelace plus native assets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value {
    pub coin: Coin,
    pub assets: MultiAsset,
}

impl Value {
    pub fn from_coin(coin: Coin) -> Self {
        Value {
            coin,
            assets: MultiAsset::new(),
        }
    }

    pub fn new(coin: Coin, assets: MultiAsset) -> Self {
        Value { coin, assets }
    }

    pub fn is_ada_only(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        Ok(Value {
            coin: self
                .coin
                .checked_add(other.coin)
                .ok_or(ValueError::CoinOverflow)?,
            assets: self.assets.checked_add(&other.assets)?,
        })
    }

    pub fn checked_add_assets(&self, assets: &MultiAsset) -> Result<Value, ValueError> {
        Ok(Value {
            coin: self.coin,
            assets: self.assets.checked_add(assets)?,
        })
    }

    pub fn has_negative_assets(&self) -> bool {
        self.assets.has_negative()
    }

    /// Canonical serialized size, in bytes, of this value.
    pub fn encoded_size(&self) -> u64 {
        minicbor::to_vec(self)
            .expect("value encoding to a vector cannot fail")
            .len() as u64
    }
}

impl<C> minicbor::encode::Encode<C> for Value {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if self.assets.is_empty() {
            e.u64(self.coin)?;
            return Ok(());
        }
        e.array(2)?.u64(self.coin)?;
        e.map(self.assets.len() as u64)?;
        for (policy, assets) in self.assets.iter() {
            e.bytes(policy.as_ref())?;
            e.map(assets.len() as u64)?;
            for (name, quantity) in assets {
                e.bytes(name.as_slice())?;
                e.i64(*quantity)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for Value {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        use minicbor::data::Type;

        match d.datatype()? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(Value::from_coin(d.u64()?)),
            Type::Array | Type::ArrayIndef => {
                let _ = d.array()?;
                let coin = d.u64()?;
                let mut assets = MultiAsset::new();
                let outer = d
                    .map()?
                    .ok_or_else(|| minicbor::decode::Error::message("indefinite asset map"))?;
                for _ in 0..outer {
                    let policy: [u8; 28] = d.bytes()?.try_into().map_err(|_| {
                        minicbor::decode::Error::message("policy id must be 28 bytes")
                    })?;
                    let inner = d
                        .map()?
                        .ok_or_else(|| minicbor::decode::Error::message("indefinite asset map"))?;
                    for _ in 0..inner {
                        let name = AssetName::new(d.bytes()?.to_vec()).map_err(|_| {
                            minicbor::decode::Error::message("asset name longer than 32 bytes")
                        })?;
                        let quantity = d.i64()?;
                        assets
                            .add_quantity(PolicyId::from(policy), name, quantity)
                            .map_err(|_| {
                                minicbor::decode::Error::message("asset quantity overflow")
                            })?;
                    }
                }
                Ok(Value::new(coin, assets))
            }
            other => Err(minicbor::decode::Error::message(format!(
                "unexpected type for value: {other}"
            ))),
        }
    }
}
