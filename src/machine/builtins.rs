//! The default builtin functions: identities, arities and semantics.

use std::rc::Rc;

use cryptoxide::digest::Digest;
use num::{BigInt, Integer, Signed, ToPrimitive, Zero};
use pallas_crypto::hash::Hasher;

use crate::primitives::PlutusData;

use super::error::MachineError;
use super::term::{Constant, Type};
use super::value::Value;

/// Builtin identities, numbered as in the flat encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DefaultFunction {
    AddInteger = 0,
    SubtractInteger = 1,
    MultiplyInteger = 2,
    DivideInteger = 3,
    QuotientInteger = 4,
    RemainderInteger = 5,
    ModInteger = 6,
    EqualsInteger = 7,
    LessThanInteger = 8,
    LessThanEqualsInteger = 9,
    AppendByteString = 10,
    ConsByteString = 11,
    SliceByteString = 12,
    LengthOfByteString = 13,
    IndexByteString = 14,
    EqualsByteString = 15,
    LessThanByteString = 16,
    LessThanEqualsByteString = 17,
    Sha2_256 = 18,
    Sha3_256 = 19,
    Blake2b_256 = 20,
    VerifyEd25519Signature = 21,
    AppendString = 22,
    EqualsString = 23,
    EncodeUtf8 = 24,
    DecodeUtf8 = 25,
    IfThenElse = 26,
    ChooseUnit = 27,
    Trace = 28,
    FstPair = 29,
    SndPair = 30,
    ChooseList = 31,
    MkCons = 32,
    HeadList = 33,
    TailList = 34,
    NullList = 35,
    ChooseData = 36,
    ConstrData = 37,
    MapData = 38,
    ListData = 39,
    IData = 40,
    BData = 41,
    UnConstrData = 42,
    UnMapData = 43,
    UnListData = 44,
    UnIData = 45,
    UnBData = 46,
    EqualsData = 47,
    MkPairData = 48,
    MkNilData = 49,
    MkNilPairData = 50,
    SerialiseData = 51,
    VerifyEcdsaSecp256k1Signature = 52,
    VerifySchnorrSecp256k1Signature = 53,
    Bls12_381G1Add = 54,
    Bls12_381G1Neg = 55,
    Bls12_381G1ScalarMul = 56,
    Bls12_381G1Equal = 57,
    Bls12_381G1Compress = 58,
    Bls12_381G1Uncompress = 59,
    Bls12_381G1HashToGroup = 60,
    Bls12_381G2Add = 61,
    Bls12_381G2Neg = 62,
    Bls12_381G2ScalarMul = 63,
    Bls12_381G2Equal = 64,
    Bls12_381G2Compress = 65,
    Bls12_381G2Uncompress = 66,
    Bls12_381G2HashToGroup = 67,
    Bls12_381MillerLoop = 68,
    Bls12_381MulMlResult = 69,
    Bls12_381FinalVerify = 70,
    Keccak256 = 71,
    Blake2b_224 = 72,
    IntegerToByteString = 73,
    ByteStringToInteger = 74,
    AndByteString = 75,
    OrByteString = 76,
    XorByteString = 77,
    ComplementByteString = 78,
    ReadBit = 79,
    WriteBits = 80,
    ReplicateByte = 81,
    ShiftByteString = 82,
    RotateByteString = 83,
    CountSetBits = 84,
    FindFirstSetBit = 85,
    Ripemd160 = 86,
    ExpModInteger = 87,
    LengthOfArray = 88,
    ListToArray = 89,
    IndexArray = 90,
}

impl DefaultFunction {
    pub const COUNT: usize = 91;

    pub fn from_id(id: u8) -> Option<DefaultFunction> {
        if (id as usize) < Self::COUNT {
            // Safety of the transmute-free path: match below is exhaustive.
            Some(ALL[id as usize])
        } else {
            None
        }
    }

    /// Number of term arguments before the builtin saturates.
    pub fn arity(&self) -> usize {
        use DefaultFunction::*;
        match self {
            AddInteger | SubtractInteger | MultiplyInteger | DivideInteger | QuotientInteger
            | RemainderInteger | ModInteger | EqualsInteger | LessThanInteger
            | LessThanEqualsInteger | AppendByteString | ConsByteString | IndexByteString
            | EqualsByteString | LessThanByteString | LessThanEqualsByteString | AppendString
            | EqualsString | ChooseUnit | Trace | MkCons | ConstrData | EqualsData | MkPairData
            | ByteStringToInteger | ReplicateByte | ShiftByteString | RotateByteString
            | Bls12_381G1Add | Bls12_381G1ScalarMul | Bls12_381G1Equal | Bls12_381G1HashToGroup
            | Bls12_381G2Add | Bls12_381G2ScalarMul | Bls12_381G2Equal | Bls12_381G2HashToGroup
            | Bls12_381MillerLoop | Bls12_381MulMlResult | Bls12_381FinalVerify | ReadBit
            | IndexArray => 2,
            SliceByteString | VerifyEd25519Signature | VerifyEcdsaSecp256k1Signature
            | VerifySchnorrSecp256k1Signature | IfThenElse | IntegerToByteString
            | AndByteString | OrByteString | XorByteString | WriteBits | ExpModInteger => 3,
            ChooseList => 3,
            ChooseData => 6,
            LengthOfByteString | Sha2_256 | Sha3_256 | Blake2b_256 | Blake2b_224 | Keccak256
            | Ripemd160 | EncodeUtf8 | DecodeUtf8 | FstPair | SndPair | HeadList | TailList
            | NullList | MapData | ListData | IData | BData | UnConstrData | UnMapData
            | UnListData | UnIData | UnBData | MkNilData | MkNilPairData | SerialiseData
            | ComplementByteString | CountSetBits | FindFirstSetBit | Bls12_381G1Neg
            | Bls12_381G1Compress | Bls12_381G1Uncompress | Bls12_381G2Neg
            | Bls12_381G2Compress | Bls12_381G2Uncompress | LengthOfArray | ListToArray => 1,
        }
    }

    /// Number of forces (type instantiations) before arguments may be
    /// applied.
    pub fn forces(&self) -> u32 {
        use DefaultFunction::*;
        match self {
            IfThenElse | ChooseUnit | Trace | MkCons | HeadList | TailList | NullList
            | ChooseData | LengthOfArray | ListToArray | IndexArray => 1,
            FstPair | SndPair | ChooseList => 2,
            _ => 0,
        }
    }

    pub fn call(
        &self,
        args: &[Value],
        logs: &mut Vec<String>,
    ) -> Result<Value, MachineError> {
        use DefaultFunction::*;

        let fun = *self;
        match fun {
            AddInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::Integer(a + b)))
            }
            SubtractInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::Integer(a - b)))
            }
            MultiplyInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::Integer(a * b)))
            }
            DivideInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero);
                }
                Ok(Value::con(Constant::Integer(a.div_floor(b))))
            }
            QuotientInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero);
                }
                Ok(Value::con(Constant::Integer(a / b)))
            }
            RemainderInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero);
                }
                Ok(Value::con(Constant::Integer(a % b)))
            }
            ModInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                if b.is_zero() {
                    return Err(MachineError::DivisionByZero);
                }
                Ok(Value::con(Constant::Integer(a.mod_floor(b))))
            }
            EqualsInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::Bool(a == b)))
            }
            LessThanInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::Bool(a < b)))
            }
            LessThanEqualsInteger => {
                let a = args[0].expect_integer(fun)?;
                let b = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::Bool(a <= b)))
            }
            AppendByteString => {
                let a = args[0].expect_byte_string(fun)?;
                let b = args[1].expect_byte_string(fun)?;
                Ok(Value::con(Constant::ByteString(
                    [a, b].concat(),
                )))
            }
            ConsByteString => {
                let head = args[0].expect_integer(fun)?;
                let tail = args[1].expect_byte_string(fun)?;
                let byte = head
                    .to_u8()
                    .ok_or(MachineError::ByteStringOutOfBounds)?;
                let mut out = Vec::with_capacity(tail.len() + 1);
                out.push(byte);
                out.extend_from_slice(tail);
                Ok(Value::con(Constant::ByteString(out)))
            }
            SliceByteString => {
                let start = args[0].expect_integer(fun)?;
                let count = args[1].expect_integer(fun)?;
                let bytes = args[2].expect_byte_string(fun)?;
                let skip = start.to_usize().unwrap_or(0).min(bytes.len());
                let take = count.to_usize().unwrap_or(0);
                Ok(Value::con(Constant::ByteString(
                    bytes[skip..].iter().take(take).copied().collect(),
                )))
            }
            LengthOfByteString => {
                let bytes = args[0].expect_byte_string(fun)?;
                Ok(Value::con(Constant::Integer(BigInt::from(bytes.len()))))
            }
            IndexByteString => {
                let bytes = args[0].expect_byte_string(fun)?;
                let index = args[1].expect_integer(fun)?;
                let index = index
                    .to_usize()
                    .filter(|index| *index < bytes.len())
                    .ok_or(MachineError::ByteStringOutOfBounds)?;
                Ok(Value::con(Constant::Integer(BigInt::from(bytes[index]))))
            }
            EqualsByteString => {
                let a = args[0].expect_byte_string(fun)?;
                let b = args[1].expect_byte_string(fun)?;
                Ok(Value::con(Constant::Bool(a == b)))
            }
            LessThanByteString => {
                let a = args[0].expect_byte_string(fun)?;
                let b = args[1].expect_byte_string(fun)?;
                Ok(Value::con(Constant::Bool(a < b)))
            }
            LessThanEqualsByteString => {
                let a = args[0].expect_byte_string(fun)?;
                let b = args[1].expect_byte_string(fun)?;
                Ok(Value::con(Constant::Bool(a <= b)))
            }
            Sha2_256 => {
                let bytes = args[0].expect_byte_string(fun)?;
                let mut hasher = cryptoxide::sha2::Sha256::new();
                hasher.input(bytes);
                let mut out = [0u8; 32];
                hasher.result(&mut out);
                Ok(Value::con(Constant::ByteString(out.to_vec())))
            }
            Sha3_256 => {
                let bytes = args[0].expect_byte_string(fun)?;
                let mut hasher = cryptoxide::sha3::Sha3_256::new();
                hasher.input(bytes);
                let mut out = [0u8; 32];
                hasher.result(&mut out);
                Ok(Value::con(Constant::ByteString(out.to_vec())))
            }
            Keccak256 => {
                let bytes = args[0].expect_byte_string(fun)?;
                let mut hasher = cryptoxide::sha3::Keccak256::new();
                hasher.input(bytes);
                let mut out = [0u8; 32];
                hasher.result(&mut out);
                Ok(Value::con(Constant::ByteString(out.to_vec())))
            }
            Ripemd160 => {
                let bytes = args[0].expect_byte_string(fun)?;
                let mut hasher = cryptoxide::ripemd160::Ripemd160::new();
                hasher.input(bytes);
                let mut out = [0u8; 20];
                hasher.result(&mut out);
                Ok(Value::con(Constant::ByteString(out.to_vec())))
            }
            Blake2b_256 => {
                let bytes = args[0].expect_byte_string(fun)?;
                Ok(Value::con(Constant::ByteString(
                    Hasher::<256>::hash(bytes).to_vec(),
                )))
            }
            Blake2b_224 => {
                let bytes = args[0].expect_byte_string(fun)?;
                Ok(Value::con(Constant::ByteString(
                    Hasher::<224>::hash(bytes).to_vec(),
                )))
            }
            VerifyEd25519Signature => {
                use pallas_crypto::key::ed25519::{PublicKey, Signature};
                let key = args[0].expect_byte_string(fun)?;
                let message = args[1].expect_byte_string(fun)?;
                let signature = args[2].expect_byte_string(fun)?;
                let key: [u8; PublicKey::SIZE] =
                    key.try_into().map_err(|_| MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "32-byte ed25519 public key",
                    })?;
                let signature: [u8; Signature::SIZE] =
                    signature
                        .try_into()
                        .map_err(|_| MachineError::BuiltinTypeMismatch {
                            fun,
                            expected: "64-byte ed25519 signature",
                        })?;
                Ok(Value::con(Constant::Bool(
                    PublicKey::from(key).verify(message, &Signature::from(signature)),
                )))
            }
            VerifyEcdsaSecp256k1Signature => {
                let key = args[0].expect_byte_string(fun)?;
                let message = args[1].expect_byte_string(fun)?;
                let signature = args[2].expect_byte_string(fun)?;
                if message.len() != 32 {
                    return Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "32-byte message hash",
                    });
                }
                let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(key).map_err(|_| {
                    MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "33-byte compressed secp256k1 key",
                    }
                })?;
                let signature = k256::ecdsa::Signature::from_slice(signature).map_err(|_| {
                    MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "64-byte ecdsa signature",
                    }
                })?;
                use k256::ecdsa::signature::hazmat::PrehashVerifier;
                Ok(Value::con(Constant::Bool(
                    key.verify_prehash(message, &signature).is_ok(),
                )))
            }
            VerifySchnorrSecp256k1Signature => {
                let key = args[0].expect_byte_string(fun)?;
                let message = args[1].expect_byte_string(fun)?;
                let signature = args[2].expect_byte_string(fun)?;
                let key = k256::schnorr::VerifyingKey::from_bytes(key).map_err(|_| {
                    MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "32-byte x-only schnorr key",
                    }
                })?;
                let signature = k256::schnorr::Signature::try_from(signature).map_err(|_| {
                    MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "64-byte schnorr signature",
                    }
                })?;
                Ok(Value::con(Constant::Bool(
                    key.verify_raw(message, &signature).is_ok(),
                )))
            }
            AppendString => {
                let a = args[0].expect_string(fun)?;
                let b = args[1].expect_string(fun)?;
                Ok(Value::con(Constant::String(format!("{a}{b}"))))
            }
            EqualsString => {
                let a = args[0].expect_string(fun)?;
                let b = args[1].expect_string(fun)?;
                Ok(Value::con(Constant::Bool(a == b)))
            }
            EncodeUtf8 => {
                let text = args[0].expect_string(fun)?;
                Ok(Value::con(Constant::ByteString(text.as_bytes().to_vec())))
            }
            DecodeUtf8 => {
                let bytes = args[0].expect_byte_string(fun)?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| MachineError::Utf8DecodeFailure)?;
                Ok(Value::con(Constant::String(text)))
            }
            IfThenElse => {
                let condition = args[0].expect_bool(fun)?;
                Ok(if condition {
                    args[1].clone()
                } else {
                    args[2].clone()
                })
            }
            ChooseUnit => {
                args[0].expect_unit(fun)?;
                Ok(args[1].clone())
            }
            Trace => {
                logs.push(args[0].expect_string(fun)?.to_string());
                Ok(args[1].clone())
            }
            FstPair => {
                let (first, _) = args[0].expect_pair(fun)?;
                Ok(Value::con(first.clone()))
            }
            SndPair => {
                let (_, second) = args[0].expect_pair(fun)?;
                Ok(Value::con(second.clone()))
            }
            ChooseList => {
                let (_, items) = args[0].expect_list(fun)?;
                Ok(if items.is_empty() {
                    args[1].clone()
                } else {
                    args[2].clone()
                })
            }
            MkCons => {
                let head = args[0].expect_constant(fun)?;
                let (inner, items) = args[1].expect_list(fun)?;
                if head.type_of() != *inner {
                    return Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "element of the list's type",
                    });
                }
                let mut out = Vec::with_capacity(items.len() + 1);
                out.push(head.clone());
                out.extend(items.iter().cloned());
                Ok(Value::con(Constant::ProtoList(inner.clone(), out)))
            }
            HeadList => {
                let (_, items) = args[0].expect_list(fun)?;
                items
                    .first()
                    .cloned()
                    .map(Value::con)
                    .ok_or(MachineError::ByteStringOutOfBounds)
            }
            TailList => {
                let (inner, items) = args[0].expect_list(fun)?;
                if items.is_empty() {
                    return Err(MachineError::ByteStringOutOfBounds);
                }
                Ok(Value::con(Constant::ProtoList(
                    inner.clone(),
                    items[1..].to_vec(),
                )))
            }
            NullList => {
                let (_, items) = args[0].expect_list(fun)?;
                Ok(Value::con(Constant::Bool(items.is_empty())))
            }
            ChooseData => {
                let data = args[0].expect_data(fun)?;
                let branch = match data {
                    PlutusData::Constr { .. } => 1,
                    PlutusData::Map(_) => 2,
                    PlutusData::List(_) => 3,
                    PlutusData::I(_) => 4,
                    PlutusData::B(_) => 5,
                };
                Ok(args[branch].clone())
            }
            ConstrData => {
                let tag = args[0].expect_integer(fun)?;
                let (inner, items) = args[1].expect_list(fun)?;
                if *inner != Type::Data {
                    return Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "list of data",
                    });
                }
                let tag = tag.to_u64().ok_or(MachineError::BuiltinTypeMismatch {
                    fun,
                    expected: "non-negative constructor tag",
                })?;
                let fields = items
                    .iter()
                    .map(|item| match item {
                        Constant::Data(data) => Ok(data.clone()),
                        _ => Err(MachineError::BuiltinTypeMismatch {
                            fun,
                            expected: "list of data",
                        }),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value::con(Constant::Data(PlutusData::Constr { tag, fields })))
            }
            MapData => {
                let (inner, items) = args[0].expect_list(fun)?;
                let ok_type = matches!(
                    inner,
                    Type::Pair(first, second)
                        if **first == Type::Data && **second == Type::Data
                );
                if !ok_type {
                    return Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "list of data pairs",
                    });
                }
                let pairs = items
                    .iter()
                    .map(|item| match item {
                        Constant::ProtoPair(_, _, first, second) => {
                            match (first.as_ref(), second.as_ref()) {
                                (Constant::Data(key), Constant::Data(value)) => {
                                    Ok((key.clone(), value.clone()))
                                }
                                _ => Err(MachineError::BuiltinTypeMismatch {
                                    fun,
                                    expected: "list of data pairs",
                                }),
                            }
                        }
                        _ => Err(MachineError::BuiltinTypeMismatch {
                            fun,
                            expected: "list of data pairs",
                        }),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value::con(Constant::Data(PlutusData::Map(pairs))))
            }
            ListData => {
                let (inner, items) = args[0].expect_list(fun)?;
                if *inner != Type::Data {
                    return Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "list of data",
                    });
                }
                let list = items
                    .iter()
                    .map(|item| match item {
                        Constant::Data(data) => Ok(data.clone()),
                        _ => Err(MachineError::BuiltinTypeMismatch {
                            fun,
                            expected: "list of data",
                        }),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value::con(Constant::Data(PlutusData::List(list))))
            }
            IData => {
                let value = args[0].expect_integer(fun)?;
                Ok(Value::con(Constant::Data(PlutusData::I(value.clone()))))
            }
            BData => {
                let bytes = args[0].expect_byte_string(fun)?;
                Ok(Value::con(Constant::Data(PlutusData::B(bytes.to_vec()))))
            }
            UnConstrData => {
                match args[0].expect_data(fun)? {
                    PlutusData::Constr { tag, fields } => Ok(Value::con(Constant::ProtoPair(
                        Type::Integer,
                        Type::List(Rc::new(Type::Data)),
                        Box::new(Constant::Integer(BigInt::from(*tag))),
                        Box::new(Constant::ProtoList(
                            Type::Data,
                            fields.iter().cloned().map(Constant::Data).collect(),
                        )),
                    ))),
                    _ => Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "constr data",
                    }),
                }
            }
            UnMapData => match args[0].expect_data(fun)? {
                PlutusData::Map(pairs) => Ok(Value::con(Constant::ProtoList(
                    Type::Pair(Rc::new(Type::Data), Rc::new(Type::Data)),
                    pairs
                        .iter()
                        .map(|(key, value)| {
                            Constant::ProtoPair(
                                Type::Data,
                                Type::Data,
                                Box::new(Constant::Data(key.clone())),
                                Box::new(Constant::Data(value.clone())),
                            )
                        })
                        .collect(),
                ))),
                _ => Err(MachineError::BuiltinTypeMismatch {
                    fun,
                    expected: "map data",
                }),
            },
            UnListData => match args[0].expect_data(fun)? {
                PlutusData::List(items) => Ok(Value::con(Constant::ProtoList(
                    Type::Data,
                    items.iter().cloned().map(Constant::Data).collect(),
                ))),
                _ => Err(MachineError::BuiltinTypeMismatch {
                    fun,
                    expected: "list data",
                }),
            },
            UnIData => match args[0].expect_data(fun)? {
                PlutusData::I(value) => Ok(Value::con(Constant::Integer(value.clone()))),
                _ => Err(MachineError::BuiltinTypeMismatch {
                    fun,
                    expected: "integer data",
                }),
            },
            UnBData => match args[0].expect_data(fun)? {
                PlutusData::B(bytes) => Ok(Value::con(Constant::ByteString(bytes.clone()))),
                _ => Err(MachineError::BuiltinTypeMismatch {
                    fun,
                    expected: "bytestring data",
                }),
            },
            EqualsData => {
                let a = args[0].expect_data(fun)?;
                let b = args[1].expect_data(fun)?;
                Ok(Value::con(Constant::Bool(a == b)))
            }
            MkPairData => {
                let a = args[0].expect_data(fun)?;
                let b = args[1].expect_data(fun)?;
                Ok(Value::con(Constant::ProtoPair(
                    Type::Data,
                    Type::Data,
                    Box::new(Constant::Data(a.clone())),
                    Box::new(Constant::Data(b.clone())),
                )))
            }
            MkNilData => {
                args[0].expect_unit(fun)?;
                Ok(Value::con(Constant::ProtoList(Type::Data, vec![])))
            }
            MkNilPairData => {
                args[0].expect_unit(fun)?;
                Ok(Value::con(Constant::ProtoList(
                    Type::Pair(Rc::new(Type::Data), Rc::new(Type::Data)),
                    vec![],
                )))
            }
            SerialiseData => {
                let data = args[0].expect_data(fun)?;
                Ok(Value::con(Constant::ByteString(data.to_vec())))
            }
            IntegerToByteString => {
                let big_endian = args[0].expect_bool(fun)?;
                let width = args[1].expect_integer(fun)?;
                let value = args[2].expect_integer(fun)?;
                integer_to_byte_string(big_endian, width, value)
            }
            ByteStringToInteger => {
                let big_endian = args[0].expect_bool(fun)?;
                let bytes = args[1].expect_byte_string(fun)?;
                let value = if big_endian {
                    BigInt::from_bytes_be(num::bigint::Sign::Plus, bytes)
                } else {
                    BigInt::from_bytes_le(num::bigint::Sign::Plus, bytes)
                };
                Ok(Value::con(Constant::Integer(value)))
            }
            AndByteString => bitwise(fun, args, |a, b| a & b, 0xff),
            OrByteString => bitwise(fun, args, |a, b| a | b, 0x00),
            XorByteString => bitwise(fun, args, |a, b| a ^ b, 0x00),
            ComplementByteString => {
                let bytes = args[0].expect_byte_string(fun)?;
                Ok(Value::con(Constant::ByteString(
                    bytes.iter().map(|byte| !byte).collect(),
                )))
            }
            ReadBit => {
                let bytes = args[0].expect_byte_string(fun)?;
                let index = args[1].expect_integer(fun)?;
                let index = index
                    .to_usize()
                    .filter(|index| *index < bytes.len() * 8)
                    .ok_or(MachineError::ByteStringOutOfBounds)?;
                Ok(Value::con(Constant::Bool(read_bit(bytes, index))))
            }
            WriteBits => {
                let bytes = args[0].expect_byte_string(fun)?;
                let (inner, indices) = args[1].expect_list(fun)?;
                if *inner != Type::Integer {
                    return Err(MachineError::BuiltinTypeMismatch {
                        fun,
                        expected: "list of integers",
                    });
                }
                let set = args[2].expect_bool(fun)?;
                let mut out = bytes.to_vec();
                for index in indices {
                    let Constant::Integer(index) = index else {
                        return Err(MachineError::BuiltinTypeMismatch {
                            fun,
                            expected: "list of integers",
                        });
                    };
                    let index = index
                        .to_usize()
                        .filter(|index| *index < out.len() * 8)
                        .ok_or(MachineError::ByteStringOutOfBounds)?;
                    write_bit(&mut out, index, set);
                }
                Ok(Value::con(Constant::ByteString(out)))
            }
            ReplicateByte => {
                let length = args[0].expect_integer(fun)?;
                let byte = args[1].expect_integer(fun)?;
                let length = length
                    .to_usize()
                    .filter(|length| *length <= 8192)
                    .ok_or(MachineError::ByteStringOutOfBounds)?;
                let byte = byte.to_u8().ok_or(MachineError::ByteStringOutOfBounds)?;
                Ok(Value::con(Constant::ByteString(vec![byte; length])))
            }
            ShiftByteString => {
                let bytes = args[0].expect_byte_string(fun)?;
                let shift = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::ByteString(shift_bytes(
                    bytes,
                    shift,
                    false,
                ))))
            }
            RotateByteString => {
                let bytes = args[0].expect_byte_string(fun)?;
                let shift = args[1].expect_integer(fun)?;
                Ok(Value::con(Constant::ByteString(shift_bytes(
                    bytes,
                    shift,
                    true,
                ))))
            }
            CountSetBits => {
                let bytes = args[0].expect_byte_string(fun)?;
                let count: u32 = bytes.iter().map(|byte| byte.count_ones()).sum();
                Ok(Value::con(Constant::Integer(BigInt::from(count))))
            }
            FindFirstSetBit => {
                let bytes = args[0].expect_byte_string(fun)?;
                let total_bits = bytes.len() * 8;
                let found = (0..total_bits).find(|index| read_bit(bytes, *index));
                Ok(Value::con(Constant::Integer(match found {
                    Some(index) => BigInt::from(index),
                    None => BigInt::from(-1),
                })))
            }
            ExpModInteger => {
                let base = args[0].expect_integer(fun)?;
                let exponent = args[1].expect_integer(fun)?;
                let modulus = args[2].expect_integer(fun)?;
                exp_mod(base, exponent, modulus)
            }
            LengthOfArray => {
                let (_, items) = args[0].expect_array(fun)?;
                Ok(Value::con(Constant::Integer(BigInt::from(items.len()))))
            }
            ListToArray => {
                let (inner, items) = args[0].expect_list(fun)?;
                Ok(Value::con(Constant::Array(inner.clone(), items.clone())))
            }
            IndexArray => {
                let (_, items) = args[0].expect_array(fun)?;
                let index = args[1].expect_integer(fun)?;
                let index = index
                    .to_usize()
                    .filter(|index| *index < items.len())
                    .ok_or(MachineError::ByteStringOutOfBounds)?;
                Ok(Value::con(items[index].clone()))
            }
            Bls12_381G1Add | Bls12_381G1Neg | Bls12_381G1ScalarMul | Bls12_381G1Equal
            | Bls12_381G1Compress | Bls12_381G1Uncompress | Bls12_381G1HashToGroup
            | Bls12_381G2Add | Bls12_381G2Neg | Bls12_381G2ScalarMul | Bls12_381G2Equal
            | Bls12_381G2Compress | Bls12_381G2Uncompress | Bls12_381G2HashToGroup
            | Bls12_381MillerLoop | Bls12_381MulMlResult | Bls12_381FinalVerify => {
                Err(MachineError::UnsupportedBuiltin(fun))
            }
        }
    }
}

/// Bit indices count from the least significant bit of the final byte.
fn read_bit(bytes: &[u8], index: usize) -> bool {
    let byte = bytes[bytes.len() - 1 - index / 8];
    byte >> (index % 8) & 1 == 1
}

fn write_bit(bytes: &mut [u8], index: usize, set: bool) {
    let position = bytes.len() - 1 - index / 8;
    let mask = 1u8 << (index % 8);
    if set {
        bytes[position] |= mask;
    } else {
        bytes[position] &= !mask;
    }
}

fn bitwise(
    fun: DefaultFunction,
    args: &[Value],
    op: fn(u8, u8) -> u8,
    pad: u8,
) -> Result<Value, MachineError> {
    let extend = args[0].expect_bool(fun)?;
    let a = args[1].expect_byte_string(fun)?;
    let b = args[2].expect_byte_string(fun)?;
    let length = if extend {
        a.len().max(b.len())
    } else {
        a.len().min(b.len())
    };
    let mut out = Vec::with_capacity(length);
    for index in 0..length {
        let left = a.get(index).copied().unwrap_or(pad);
        let right = b.get(index).copied().unwrap_or(pad);
        out.push(op(left, right));
    }
    Ok(Value::con(Constant::ByteString(out)))
}

fn shift_bytes(bytes: &[u8], shift: &BigInt, rotate: bool) -> Vec<u8> {
    let total_bits = bytes.len() * 8;
    if total_bits == 0 {
        return Vec::new();
    }
    let mut out = vec![0u8; bytes.len()];
    let shift = if rotate {
        shift.mod_floor(&BigInt::from(total_bits))
    } else {
        shift.clone()
    };
    for index in 0..total_bits {
        if !read_bit(bytes, index) {
            continue;
        }
        let target = BigInt::from(index) + &shift;
        if rotate {
            let target = target.mod_floor(&BigInt::from(total_bits));
            write_bit(&mut out, target.to_usize().unwrap_or(0), true);
        } else if let Some(target) = target.to_usize().filter(|target| *target < total_bits) {
            write_bit(&mut out, target, true);
        }
    }
    out
}

const MAX_INTEGER_BYTES: usize = 8192;

fn integer_to_byte_string(
    big_endian: bool,
    width: &BigInt,
    value: &BigInt,
) -> Result<Value, MachineError> {
    if value.is_negative() {
        return Err(MachineError::IntegerConversion("negative input"));
    }
    let width = width
        .to_usize()
        .filter(|width| *width <= MAX_INTEGER_BYTES)
        .ok_or(MachineError::IntegerConversion("width out of range"))?;
    let mut bytes = value.to_bytes_le().1;
    if value.is_zero() {
        bytes.clear();
    }
    if width > 0 {
        if bytes.len() > width {
            return Err(MachineError::IntegerConversion("value wider than requested"));
        }
        bytes.resize(width, 0);
    } else if bytes.len() > MAX_INTEGER_BYTES {
        return Err(MachineError::IntegerConversion("value too wide"));
    }
    if big_endian {
        bytes.reverse();
    }
    Ok(Value::con(Constant::ByteString(bytes)))
}

fn exp_mod(base: &BigInt, exponent: &BigInt, modulus: &BigInt) -> Result<Value, MachineError> {
    if !modulus.is_positive() {
        return Err(MachineError::ExpModFailure("modulus must be positive"));
    }
    let base = base.mod_floor(modulus);
    if exponent.is_negative() {
        let gcd = base.extended_gcd(modulus);
        if !gcd.gcd.is_one() {
            return Err(MachineError::ExpModFailure("base is not invertible"));
        }
        let inverse = gcd.x.mod_floor(modulus);
        Ok(Value::con(Constant::Integer(
            inverse.modpow(&-exponent, modulus),
        )))
    } else {
        Ok(Value::con(Constant::Integer(base.modpow(exponent, modulus))))
    }
}

use num::One;

/// Identity table backing [`DefaultFunction::from_id`].
const ALL: [DefaultFunction; DefaultFunction::COUNT] = {
    use DefaultFunction::*;
    [
        AddInteger,
        SubtractInteger,
        MultiplyInteger,
        DivideInteger,
        QuotientInteger,
        RemainderInteger,
        ModInteger,
        EqualsInteger,
        LessThanInteger,
        LessThanEqualsInteger,
        AppendByteString,
        ConsByteString,
        SliceByteString,
        LengthOfByteString,
        IndexByteString,
        EqualsByteString,
        LessThanByteString,
        LessThanEqualsByteString,
        Sha2_256,
        Sha3_256,
        Blake2b_256,
        VerifyEd25519Signature,
        AppendString,
        EqualsString,
        EncodeUtf8,
        DecodeUtf8,
        IfThenElse,
        ChooseUnit,
        Trace,
        FstPair,
        SndPair,
        ChooseList,
        MkCons,
        HeadList,
        TailList,
        NullList,
        ChooseData,
        ConstrData,
        MapData,
        ListData,
        IData,
        BData,
        UnConstrData,
        UnMapData,
        UnListData,
        UnIData,
        UnBData,
        EqualsData,
        MkPairData,
        MkNilData,
        MkNilPairData,
        SerialiseData,
        VerifyEcdsaSecp256k1Signature,
        VerifySchnorrSecp256k1Signature,
        Bls12_381G1Add,
        Bls12_381G1Neg,
        Bls12_381G1ScalarMul,
        Bls12_381G1Equal,
        Bls12_381G1Compress,
        Bls12_381G1Uncompress,
        Bls12_381G1HashToGroup,
        Bls12_381G2Add,
        Bls12_381G2Neg,
        Bls12_381G2ScalarMul,
        Bls12_381G2Equal,
        Bls12_381G2Compress,
        Bls12_381G2Uncompress,
        Bls12_381G2HashToGroup,
        Bls12_381MillerLoop,
        Bls12_381MulMlResult,
        Bls12_381FinalVerify,
        Keccak256,
        Blake2b_224,
        IntegerToByteString,
        ByteStringToInteger,
        AndByteString,
        OrByteString,
        XorByteString,
        ComplementByteString,
        ReadBit,
        WriteBits,
        ReplicateByte,
        ShiftByteString,
        RotateByteString,
        CountSetBits,
        FindFirstSetBit,
        Ripemd160,
        ExpModInteger,
        LengthOfArray,
        ListToArray,
        IndexArray,
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> Value {
        Value::con(Constant::Integer(BigInt::from(value)))
    }

    fn bytes(value: &[u8]) -> Value {
        Value::con(Constant::ByteString(value.to_vec()))
    }

    fn unwrap_integer(value: Value) -> BigInt {
        match value {
            Value::Con(constant) => match constant.as_ref() {
                Constant::Integer(value) => value.clone(),
                other => panic!("expected integer, got {other:?}"),
            },
            other => panic!("expected constant, got {other:?}"),
        }
    }

    fn unwrap_bytes(value: Value) -> Vec<u8> {
        match value {
            Value::Con(constant) => match constant.as_ref() {
                Constant::ByteString(value) => value.clone(),
                other => panic!("expected bytestring, got {other:?}"),
            },
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn division_follows_floor_and_quotient_truncates() {
        let mut logs = vec![];
        let div = DefaultFunction::DivideInteger
            .call(&[int(-7), int(2)], &mut logs)
            .unwrap();
        assert_eq!(unwrap_integer(div), BigInt::from(-4));

        let quot = DefaultFunction::QuotientInteger
            .call(&[int(-7), int(2)], &mut logs)
            .unwrap();
        assert_eq!(unwrap_integer(quot), BigInt::from(-3));

        assert_eq!(
            DefaultFunction::DivideInteger.call(&[int(1), int(0)], &mut logs),
            Err(MachineError::DivisionByZero)
        );
    }

    #[test]
    fn trace_appends_to_the_log() {
        let mut logs = vec![];
        let result = DefaultFunction::Trace
            .call(
                &[Value::con(Constant::String("hello".into())), int(5)],
                &mut logs,
            )
            .unwrap();
        assert_eq!(logs, vec!["hello".to_string()]);
        assert_eq!(unwrap_integer(result), BigInt::from(5));
    }

    #[test]
    fn integer_byte_string_conversions_roundtrip() {
        let mut logs = vec![];
        let encoded = DefaultFunction::IntegerToByteString
            .call(
                &[Value::con(Constant::Bool(true)), int(4), int(0x01_02)],
                &mut logs,
            )
            .unwrap();
        assert_eq!(unwrap_bytes(encoded.clone()), vec![0, 0, 1, 2]);

        let decoded = DefaultFunction::ByteStringToInteger
            .call(&[Value::con(Constant::Bool(true)), encoded], &mut logs)
            .unwrap();
        assert_eq!(unwrap_integer(decoded), BigInt::from(0x01_02));
    }

    #[test]
    fn bit_reads_count_from_the_low_end() {
        let mut logs = vec![];
        let result = DefaultFunction::ReadBit
            .call(&[bytes(&[0x00, 0x01]), int(0)], &mut logs)
            .unwrap();
        assert!(matches!(result, Value::Con(constant) if *constant == Constant::Bool(true)));

        let result = DefaultFunction::ReadBit
            .call(&[bytes(&[0x80, 0x00]), int(15)], &mut logs)
            .unwrap();
        assert!(matches!(result, Value::Con(constant) if *constant == Constant::Bool(true)));
    }

    #[test]
    fn exp_mod_handles_negative_exponents() {
        let mut logs = vec![];
        // 3^-1 mod 7 = 5
        let result = DefaultFunction::ExpModInteger
            .call(&[int(3), int(-1), int(7)], &mut logs)
            .unwrap();
        assert_eq!(unwrap_integer(result), BigInt::from(5));

        assert!(
            DefaultFunction::ExpModInteger
                .call(&[int(2), int(-1), int(4)], &mut logs)
                .is_err()
        );
    }

    #[test]
    fn bls_builtins_fail_deterministically() {
        let mut logs = vec![];
        assert_eq!(
            DefaultFunction::Bls12_381G1Add.call(&[int(0), int(0)], &mut logs),
            Err(MachineError::UnsupportedBuiltin(
                DefaultFunction::Bls12_381G1Add
            ))
        );
    }

    #[test]
    fn ids_roundtrip() {
        for id in 0..DefaultFunction::COUNT as u8 {
            let fun = DefaultFunction::from_id(id).unwrap();
            assert_eq!(fun as u8, id);
        }
        assert_eq!(DefaultFunction::from_id(DefaultFunction::COUNT as u8), None);
    }
}
