//! Plutus `Data` and its canonical, byte-exact CBOR form.
//!
//! Hashes computed over these encodings are consensus-critical: constructor
//! tags use the 121/1280/102 scheme, integers are minimal-width with bignum
//! fallback, and byte strings longer than 64 bytes are chunked.

use minicbor::Encode;
use minicbor::data::{Int, Tag, Type};
use num::BigInt;
use num::bigint::Sign;
use pallas_crypto::hash::{Hash, Hasher};

/// The tagged sum at the heart of every datum, redeemer and script context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    I(BigInt),
    B(Vec<u8>),
}

impl PlutusData {
    pub fn unit() -> Self {
        PlutusData::Constr {
            tag: 0,
            fields: vec![],
        }
    }

    pub fn constr(tag: u64, fields: Vec<PlutusData>) -> Self {
        PlutusData::Constr { tag, fields }
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        PlutusData::I(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        PlutusData::B(value.into())
    }

    pub fn list(items: Vec<PlutusData>) -> Self {
        PlutusData::List(items)
    }

    pub fn map(pairs: Vec<(PlutusData, PlutusData)>) -> Self {
        PlutusData::Map(pairs)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        minicbor::to_vec(self).expect("data encoding to a vector cannot fail")
    }

    /// BLAKE2b-256 of the canonical encoding; this is the on-chain datum hash.
    pub fn hash(&self) -> Hash<32> {
        Hasher::<256>::hash(&self.to_vec())
    }
}

const CHUNK: usize = 64;

fn encode_bounded_bytes<W: minicbor::encode::Write>(
    e: &mut minicbor::Encoder<W>,
    bytes: &[u8],
) -> Result<(), minicbor::encode::Error<W::Error>> {
    if bytes.len() <= CHUNK {
        e.bytes(bytes)?;
    } else {
        e.begin_bytes()?;
        for chunk in bytes.chunks(CHUNK) {
            e.bytes(chunk)?;
        }
        e.end()?;
    }
    Ok(())
}

fn encode_list<C, W: minicbor::encode::Write>(
    e: &mut minicbor::Encoder<W>,
    ctx: &mut C,
    items: &[PlutusData],
) -> Result<(), minicbor::encode::Error<W::Error>> {
    // Non-empty lists are indefinite on the wire; empty ones are a
    // zero-length definite array. Datum hashes depend on this.
    if items.is_empty() {
        e.array(0)?;
    } else {
        e.begin_array()?;
        for item in items {
            item.encode(e, ctx)?;
        }
        e.end()?;
    }
    Ok(())
}

impl<C> minicbor::encode::Encode<C> for PlutusData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            PlutusData::Constr { tag, fields } => {
                if *tag <= 6 {
                    e.tag(Tag::new(121 + tag))?;
                    encode_list(e, ctx, fields)?;
                } else if (7..=127).contains(tag) {
                    e.tag(Tag::new(1280 + (tag - 7)))?;
                    encode_list(e, ctx, fields)?;
                } else {
                    e.tag(Tag::new(102))?;
                    e.array(2)?.u64(*tag)?;
                    encode_list(e, ctx, fields)?;
                }
            }
            PlutusData::Map(pairs) => {
                e.map(pairs.len() as u64)?;
                for (key, value) in pairs {
                    key.encode(e, ctx)?;
                    value.encode(e, ctx)?;
                }
            }
            PlutusData::List(items) => encode_list(e, ctx, items)?,
            PlutusData::I(value) => encode_integer(e, value)?,
            PlutusData::B(bytes) => encode_bounded_bytes(e, bytes)?,
        }
        Ok(())
    }
}

fn encode_integer<W: minicbor::encode::Write>(
    e: &mut minicbor::Encoder<W>,
    value: &BigInt,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    let bound: BigInt = BigInt::from(1u8) << 64;
    let lo: BigInt = -bound.clone();
    let hi: BigInt = bound - 1;
    if value >= &lo && value <= &hi {
        // Fits a plain CBOR integer; minicbor picks the minimal width.
        let small: i128 =
            num::ToPrimitive::to_i128(value).expect("range-checked integer must fit an i128");
        let int = Int::try_from(small).expect("range-checked integer must fit a cbor int");
        e.int(int)?;
    } else if value.sign() == Sign::Minus {
        let magnitude = (-value - 1u8).to_bytes_be().1;
        e.tag(Tag::new(3))?;
        encode_bounded_bytes(e, &magnitude)?;
    } else {
        let magnitude = value.to_bytes_be().1;
        e.tag(Tag::new(2))?;
        encode_bounded_bytes(e, &magnitude)?;
    }
    Ok(())
}

fn decode_bytes(d: &mut minicbor::decode::Decoder<'_>) -> Result<Vec<u8>, minicbor::decode::Error> {
    match d.datatype()? {
        Type::Bytes => Ok(d.bytes()?.to_vec()),
        Type::BytesIndef => {
            let mut out = Vec::new();
            for chunk in d.bytes_iter()? {
                out.extend_from_slice(chunk?);
            }
            Ok(out)
        }
        other => Err(minicbor::decode::Error::message(format!(
            "expected bytes, found {other}"
        ))),
    }
}

fn decode_list<'b>(
    d: &mut minicbor::decode::Decoder<'b>,
) -> Result<Vec<PlutusData>, minicbor::decode::Error> {
    let mut items = Vec::new();
    for item in d.array_iter::<PlutusData>()? {
        items.push(item?);
    }
    Ok(items)
}

impl<'b, C> minicbor::decode::Decode<'b, C> for PlutusData {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            Type::Tag => {
                let tag = d.tag()?.as_u64();
                match tag {
                    121..=127 => Ok(PlutusData::Constr {
                        tag: tag - 121,
                        fields: decode_list(d)?,
                    }),
                    1280..=1400 => Ok(PlutusData::Constr {
                        tag: 7 + (tag - 1280),
                        fields: decode_list(d)?,
                    }),
                    102 => {
                        let _ = d.array()?;
                        let ctag = d.u64()?;
                        Ok(PlutusData::Constr {
                            tag: ctag,
                            fields: decode_list(d)?,
                        })
                    }
                    2 => {
                        let magnitude = decode_bytes(d)?;
                        Ok(PlutusData::I(BigInt::from_bytes_be(Sign::Plus, &magnitude)))
                    }
                    3 => {
                        let magnitude = decode_bytes(d)?;
                        Ok(PlutusData::I(
                            -BigInt::from_bytes_be(Sign::Plus, &magnitude) - 1,
                        ))
                    }
                    other => Err(minicbor::decode::Error::message(format!(
                        "unexpected tag in data: {other}"
                    ))),
                }
            }
            Type::Map | Type::MapIndef => {
                let mut pairs = Vec::new();
                for pair in d.map_iter::<PlutusData, PlutusData>()? {
                    pairs.push(pair?);
                }
                Ok(PlutusData::Map(pairs))
            }
            Type::Array | Type::ArrayIndef => Ok(PlutusData::List(decode_list(d)?)),
            Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::I8 | Type::I16 | Type::I32
            | Type::I64 | Type::Int => {
                let int = d.int()?;
                Ok(PlutusData::I(BigInt::from(i128::from(int))))
            }
            Type::Bytes | Type::BytesIndef => Ok(PlutusData::B(decode_bytes(d)?)),
            other => Err(minicbor::decode::Error::message(format!(
                "unexpected type in data: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(data: &PlutusData) -> PlutusData {
        minicbor::decode(&data.to_vec()).unwrap()
    }

    #[test]
    fn unit_encodes_as_constr_zero() {
        assert_eq!(PlutusData::unit().to_vec(), hex::decode("d87980").unwrap());
    }

    #[test]
    fn constr_tags_follow_the_three_ranges() {
        let low = PlutusData::constr(6, vec![]);
        assert_eq!(low.to_vec(), hex::decode("d87f80").unwrap());

        let mid = PlutusData::constr(7, vec![]);
        assert_eq!(mid.to_vec(), hex::decode("d9050080").unwrap());

        let high = PlutusData::constr(200, vec![PlutusData::integer(1)]);
        assert_eq!(roundtrip(&high), high);
    }

    #[test]
    fn nonempty_fields_are_indefinite() {
        let data = PlutusData::constr(0, vec![PlutusData::integer(1)]);
        assert_eq!(data.to_vec(), hex::decode("d8799f01ff").unwrap());
    }

    #[test]
    fn integers_use_minimal_widths_then_bignums() {
        assert_eq!(PlutusData::integer(0).to_vec(), vec![0x00]);
        assert_eq!(PlutusData::integer(-1).to_vec(), vec![0x20]);
        assert_eq!(PlutusData::integer(24).to_vec(), vec![0x18, 0x18]);

        let big = BigInt::parse_bytes(b"18446744073709551616", 10).unwrap(); // 2^64
        let data = PlutusData::I(big.clone());
        assert_eq!(data.to_vec(), hex::decode("c249010000000000000000").unwrap());
        assert_eq!(roundtrip(&data), data);

        let negative = PlutusData::I(-big - 1);
        assert_eq!(
            negative.to_vec(),
            hex::decode("c349010000000000000000").unwrap()
        );
        assert_eq!(roundtrip(&negative), negative);
    }

    #[test]
    fn long_byte_strings_are_chunked() {
        let data = PlutusData::bytes(vec![0xabu8; 100]);
        let encoded = data.to_vec();
        assert_eq!(encoded[0], 0x5f); // indefinite bytes
        assert_eq!(roundtrip(&data), data);

        let short = PlutusData::bytes(vec![0xabu8; 64]);
        assert_eq!(short.to_vec()[0], 0x58); // definite, one-byte length
    }

    #[test]
    fn hashing_is_stable() {
        let data = PlutusData::constr(
            0,
            vec![PlutusData::integer(42), PlutusData::bytes(b"datum".to_vec())],
        );
        assert_eq!(data.hash(), data.clone().hash());
        assert_ne!(data.hash(), PlutusData::unit().hash());
    }
}
