//! Transaction outputs and datum attachments.

use minicbor::data::Tag;
use pallas_addresses::{Address, ShelleyPaymentPart};

use super::{DatumHash, PlutusData, Script, ScriptHash, Value};

/// Datum attached to an output: either a hash whose preimage must travel in
/// the witness set, or the datum itself stored inline.
#[derive(Debug, Clone, PartialEq)]
pub enum DatumOption {
    Hash(DatumHash),
    Inline(PlutusData),
}

impl DatumOption {
    pub fn hash(&self) -> DatumHash {
        match self {
            DatumOption::Hash(hash) => *hash,
            DatumOption::Inline(data) => data.hash(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutput {
    pub address: Address,
    pub value: Value,
    pub datum: Option<DatumOption>,
    pub script_ref: Option<Script>,
}

impl TransactionOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
            script_ref: None,
        }
    }

    pub fn with_datum(mut self, datum: DatumOption) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_script_ref(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }

    pub fn lovelace(&self) -> u64 {
        self.value.coin
    }

    /// The payment-part script hash, when the output is script locked.
    pub fn payment_script_hash(&self) -> Option<ScriptHash> {
        match &self.address {
            Address::Shelley(shelley) => match shelley.payment() {
                ShelleyPaymentPart::Script(hash) => Some(*hash),
                ShelleyPaymentPart::Key(_) => None,
            },
            _ => None,
        }
    }

    pub fn is_key_locked(&self) -> bool {
        match &self.address {
            Address::Shelley(shelley) => {
                matches!(shelley.payment(), ShelleyPaymentPart::Key(_))
            }
            Address::Byron(_) => true,
            Address::Stake(_) => false,
        }
    }

    pub fn datum_hash(&self) -> Option<DatumHash> {
        match &self.datum {
            Some(DatumOption::Hash(hash)) => Some(*hash),
            _ => None,
        }
    }

    pub fn encoded_size(&self) -> u64 {
        minicbor::to_vec(self)
            .expect("output encoding to a vector cannot fail")
            .len() as u64
    }
}

impl<C> minicbor::encode::Encode<C> for TransactionOutput {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let len = 2 + self.datum.is_some() as u64 + self.script_ref.is_some() as u64;
        e.map(len)?;
        e.u8(0)?.bytes(&self.address.to_vec())?;
        e.u8(1)?;
        self.value.encode(e, ctx)?;
        if let Some(datum) = &self.datum {
            e.u8(2)?;
            match datum {
                DatumOption::Hash(hash) => {
                    e.array(2)?.u8(0)?.bytes(hash.as_ref())?;
                }
                DatumOption::Inline(data) => {
                    e.array(2)?.u8(1)?;
                    e.tag(Tag::new(24))?.bytes(&data.to_vec())?;
                }
            }
        }
        if let Some(script) = &self.script_ref {
            e.u8(3)?;
            e.tag(Tag::new(24))?;
            e.bytes(&minicbor::to_vec(script).expect("script encoding to a vector cannot fail"))?;
        }
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for TransactionOutput {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let len = d
            .map()?
            .ok_or_else(|| minicbor::decode::Error::message("indefinite output map"))?;
        let mut address = None;
        let mut value = None;
        let mut datum = None;
        let mut script_ref = None;
        for _ in 0..len {
            match d.u8()? {
                0 => {
                    address = Some(Address::from_bytes(d.bytes()?).map_err(|_| {
                        minicbor::decode::Error::message("undecodable output address")
                    })?);
                }
                1 => value = Some(d.decode::<Value>()?),
                2 => {
                    let _ = d.array()?;
                    match d.u8()? {
                        0 => {
                            let hash: [u8; 32] = d.bytes()?.try_into().map_err(|_| {
                                minicbor::decode::Error::message("datum hash must be 32 bytes")
                            })?;
                            datum = Some(DatumOption::Hash(DatumHash::from(hash)));
                        }
                        1 => {
                            let _ = d.tag()?;
                            let data: PlutusData = minicbor::decode(d.bytes()?)?;
                            datum = Some(DatumOption::Inline(data));
                        }
                        other => {
                            return Err(minicbor::decode::Error::message(format!(
                                "unknown datum option {other}"
                            )));
                        }
                    }
                }
                3 => {
                    let _ = d.tag()?;
                    script_ref = Some(minicbor::decode::<Script>(d.bytes()?)?);
                }
                other => {
                    return Err(minicbor::decode::Error::message(format!(
                        "unknown output key {other}"
                    )));
                }
            }
        }
        Ok(TransactionOutput {
            address: address
                .ok_or_else(|| minicbor::decode::Error::message("output without address"))?,
            value: value.ok_or_else(|| minicbor::decode::Error::message("output without value"))?,
            datum,
            script_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallas_addresses::{Network, ShelleyAddress, ShelleyDelegationPart};

    fn key_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Key(super::super::AddrKeyhash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    fn script_address(n: u8) -> Address {
        Address::Shelley(ShelleyAddress::new(
            Network::Testnet,
            ShelleyPaymentPart::Script(super::super::ScriptHash::from([n; 28])),
            ShelleyDelegationPart::Null,
        ))
    }

    #[test]
    fn payment_script_hash_only_on_script_outputs() {
        let keyed = TransactionOutput::new(key_address(1), Value::from_coin(1));
        assert_eq!(keyed.payment_script_hash(), None);
        assert!(keyed.is_key_locked());

        let scripted = TransactionOutput::new(script_address(2), Value::from_coin(1));
        assert_eq!(
            scripted.payment_script_hash(),
            Some(super::super::ScriptHash::from([2u8; 28]))
        );
        assert!(!scripted.is_key_locked());
    }

    #[test]
    fn output_roundtrips_with_inline_datum() {
        let output = TransactionOutput::new(key_address(3), Value::from_coin(5))
            .with_datum(DatumOption::Inline(PlutusData::integer(9)));
        let bytes = minicbor::to_vec(&output).unwrap();
        let decoded: TransactionOutput = minicbor::decode(&bytes).unwrap();
        assert_eq!(decoded, output);
    }

    #[test]
    fn inline_datum_hash_matches_data_hash() {
        let data = PlutusData::integer(7);
        assert_eq!(DatumOption::Inline(data.clone()).hash(), data.hash());
    }
}
