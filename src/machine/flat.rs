//! Bit-level decoder for flat-encoded Plutus Core programs.
//!
//! Scripts travel as a CBOR byte string wrapping the flat payload; the
//! ledger only ever decodes (well-formedness and evaluation), it never
//! re-encodes.

use std::rc::Rc;

use num::BigInt;
use num::bigint::Sign;

use super::builtins::DefaultFunction;
use super::term::{Constant, Term, Type};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlatDecodeError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unknown term tag {0}")]
    UnknownTermTag(u8),
    #[error("unknown builtin id {0}")]
    UnknownBuiltin(u8),
    #[error("unknown or misplaced type tag {0}")]
    UnknownTypeTag(u8),
    #[error("constant type has no value representation here")]
    UnsupportedConstantType,
    #[error("de bruijn indices start at one")]
    ZeroDeBruijnIndex,
    #[error("string constant is not valid utf-8")]
    InvalidUtf8,
    #[error("data constant does not decode")]
    InvalidData,
    #[error("script wrapper is not a cbor byte string")]
    InvalidWrapper,
    #[error("term nesting exceeds the decoder limit")]
    TooDeep,
}

const MAX_DEPTH: usize = 10_000;

struct BitReader<'a> {
    bytes: &'a [u8],
    /// Position in bits from the start of the input.
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn bit(&mut self) -> Result<bool, FlatDecodeError> {
        let byte = self
            .bytes
            .get(self.position / 8)
            .ok_or(FlatDecodeError::UnexpectedEnd)?;
        let bit = byte >> (7 - self.position % 8) & 1;
        self.position += 1;
        Ok(bit == 1)
    }

    /// Up to eight bits, most significant first.
    fn bits(&mut self, count: usize) -> Result<u8, FlatDecodeError> {
        let mut out = 0u8;
        for _ in 0..count {
            out = out << 1 | self.bit()? as u8;
        }
        Ok(out)
    }

    /// Variable-length word: 7-bit chunks, least significant chunk first,
    /// high bit of each byte flags continuation.
    fn word(&mut self) -> Result<u64, FlatDecodeError> {
        let mut out = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.bits(8)?;
            out |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(out);
            }
            shift += 7;
            if shift > 63 {
                return Err(FlatDecodeError::UnexpectedEnd);
            }
        }
    }

    /// Like [`word`] but without a size bound, for integer constants.
    fn big_word(&mut self) -> Result<BigInt, FlatDecodeError> {
        let mut out = BigInt::from(0u8);
        let mut shift = 0u32;
        loop {
            let byte = self.bits(8)?;
            out += BigInt::from(byte & 0x7f) << (shift as usize);
            if byte & 0x80 == 0 {
                return Ok(out);
            }
            shift += 7;
        }
    }

    fn integer(&mut self) -> Result<BigInt, FlatDecodeError> {
        // zigzag
        let word = self.big_word()?;
        if num::Integer::is_even(&word) {
            Ok(word >> 1usize)
        } else {
            Ok(-((word + 1u8) >> 1usize))
        }
    }

    fn align(&mut self) {
        if self.position % 8 != 0 {
            self.position += 8 - self.position % 8;
        }
    }

    /// Byte-aligned block list: each block prefixed by its length, a zero
    /// length terminates.
    fn byte_string(&mut self) -> Result<Vec<u8>, FlatDecodeError> {
        self.align();
        let mut out = Vec::new();
        loop {
            let mut index = self.position / 8;
            let length = *self
                .bytes
                .get(index)
                .ok_or(FlatDecodeError::UnexpectedEnd)? as usize;
            index += 1;
            if length == 0 {
                self.position = index * 8;
                return Ok(out);
            }
            let chunk = self
                .bytes
                .get(index..index + length)
                .ok_or(FlatDecodeError::UnexpectedEnd)?;
            out.extend_from_slice(chunk);
            self.position = (index + length) * 8;
        }
    }
}

fn decode_type(tags: &mut std::vec::IntoIter<u8>) -> Result<Type, FlatDecodeError> {
    let tag = tags.next().ok_or(FlatDecodeError::UnexpectedEnd)?;
    match tag {
        0 => Ok(Type::Integer),
        1 => Ok(Type::ByteString),
        2 => Ok(Type::String),
        3 => Ok(Type::Unit),
        4 => Ok(Type::Bool),
        8 => Ok(Type::Data),
        9 => Ok(Type::Bls12_381G1Element),
        10 => Ok(Type::Bls12_381G2Element),
        11 => Ok(Type::Bls12_381MlResult),
        7 => {
            let applied = tags.next().ok_or(FlatDecodeError::UnexpectedEnd)?;
            match applied {
                5 => Ok(Type::List(Rc::new(decode_type(tags)?))),
                12 => Ok(Type::Array(Rc::new(decode_type(tags)?))),
                7 => {
                    let pair = tags.next().ok_or(FlatDecodeError::UnexpectedEnd)?;
                    if pair != 6 {
                        return Err(FlatDecodeError::UnknownTypeTag(pair));
                    }
                    let first = decode_type(tags)?;
                    let second = decode_type(tags)?;
                    Ok(Type::Pair(Rc::new(first), Rc::new(second)))
                }
                other => Err(FlatDecodeError::UnknownTypeTag(other)),
            }
        }
        other => Err(FlatDecodeError::UnknownTypeTag(other)),
    }
}

fn decode_constant_value(
    reader: &mut BitReader,
    of_type: &Type,
) -> Result<Constant, FlatDecodeError> {
    match of_type {
        Type::Integer => Ok(Constant::Integer(reader.integer()?)),
        Type::ByteString => Ok(Constant::ByteString(reader.byte_string()?)),
        Type::String => {
            let bytes = reader.byte_string()?;
            String::from_utf8(bytes)
                .map(Constant::String)
                .map_err(|_| FlatDecodeError::InvalidUtf8)
        }
        Type::Unit => Ok(Constant::Unit),
        Type::Bool => Ok(Constant::Bool(reader.bit()?)),
        Type::Data => {
            let bytes = reader.byte_string()?;
            let data = minicbor::decode(&bytes).map_err(|_| FlatDecodeError::InvalidData)?;
            Ok(Constant::Data(data))
        }
        Type::List(inner) => {
            let mut items = Vec::new();
            while reader.bit()? {
                items.push(decode_constant_value(reader, inner)?);
            }
            Ok(Constant::ProtoList(inner.as_ref().clone(), items))
        }
        Type::Array(inner) => {
            let mut items = Vec::new();
            while reader.bit()? {
                items.push(decode_constant_value(reader, inner)?);
            }
            Ok(Constant::Array(inner.as_ref().clone(), items))
        }
        Type::Pair(first, second) => {
            let left = decode_constant_value(reader, first)?;
            let right = decode_constant_value(reader, second)?;
            Ok(Constant::ProtoPair(
                first.as_ref().clone(),
                second.as_ref().clone(),
                Box::new(left),
                Box::new(right),
            ))
        }
        Type::Bls12_381G1Element | Type::Bls12_381G2Element | Type::Bls12_381MlResult => {
            Err(FlatDecodeError::UnsupportedConstantType)
        }
    }
}

fn decode_constant(reader: &mut BitReader) -> Result<Constant, FlatDecodeError> {
    let mut tags = Vec::new();
    while reader.bit()? {
        tags.push(reader.bits(4)?);
    }
    let mut tags = tags.into_iter();
    let of_type = decode_type(&mut tags)?;
    decode_constant_value(reader, &of_type)
}

fn decode_term(reader: &mut BitReader, depth: usize) -> Result<Term, FlatDecodeError> {
    if depth > MAX_DEPTH {
        return Err(FlatDecodeError::TooDeep);
    }
    let tag = reader.bits(4)?;
    match tag {
        0 => {
            let index = reader.word()? as usize;
            if index == 0 {
                return Err(FlatDecodeError::ZeroDeBruijnIndex);
            }
            Ok(Term::Var(index))
        }
        1 => Ok(Term::Delay(Rc::new(decode_term(reader, depth + 1)?))),
        2 => Ok(Term::Lambda(Rc::new(decode_term(reader, depth + 1)?))),
        3 => {
            let function = decode_term(reader, depth + 1)?;
            let argument = decode_term(reader, depth + 1)?;
            Ok(Term::Apply {
                function: Rc::new(function),
                argument: Rc::new(argument),
            })
        }
        4 => Ok(Term::Constant(Rc::new(decode_constant(reader)?))),
        5 => Ok(Term::Force(Rc::new(decode_term(reader, depth + 1)?))),
        6 => Ok(Term::Error),
        7 => {
            let id = reader.bits(7)?;
            DefaultFunction::from_id(id)
                .map(Term::Builtin)
                .ok_or(FlatDecodeError::UnknownBuiltin(id))
        }
        8 => {
            let constr_tag = reader.word()?;
            let mut fields = Vec::new();
            while reader.bit()? {
                fields.push(decode_term(reader, depth + 1)?);
            }
            Ok(Term::Constr {
                tag: constr_tag,
                fields,
            })
        }
        9 => {
            let constr = decode_term(reader, depth + 1)?;
            let mut branches = Vec::new();
            while reader.bit()? {
                branches.push(decode_term(reader, depth + 1)?);
            }
            Ok(Term::Case {
                constr: Rc::new(constr),
                branches,
            })
        }
        other => Err(FlatDecodeError::UnknownTermTag(other)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub version: (u64, u64, u64),
    pub term: Term,
}

impl Program {
    pub fn from_flat(bytes: &[u8]) -> Result<Program, FlatDecodeError> {
        let mut reader = BitReader::new(bytes);
        let version = (reader.word()?, reader.word()?, reader.word()?);
        let term = decode_term(&mut reader, 0)?;
        Ok(Program { version, term })
    }

    /// Decodes the on-wire form: a CBOR byte string (possibly chunked)
    /// wrapping the flat payload.
    pub fn from_cbor(bytes: &[u8]) -> Result<Program, FlatDecodeError> {
        let mut d = minicbor::decode::Decoder::new(bytes);
        let payload = match d.datatype() {
            Ok(minicbor::data::Type::Bytes) => d
                .bytes()
                .map_err(|_| FlatDecodeError::InvalidWrapper)?
                .to_vec(),
            Ok(minicbor::data::Type::BytesIndef) => {
                let mut out = Vec::new();
                for chunk in d.bytes_iter().map_err(|_| FlatDecodeError::InvalidWrapper)? {
                    out.extend_from_slice(chunk.map_err(|_| FlatDecodeError::InvalidWrapper)?);
                }
                out
            }
            _ => return Err(FlatDecodeError::InvalidWrapper),
        };
        Program::from_flat(&payload)
    }

    pub fn uses_sums_of_products(&self) -> bool {
        self.term.uses_sums_of_products()
    }
}

/// Zigzag helper exposed for tests and encoders in test fixtures.
pub fn zigzag(value: &BigInt) -> BigInt {
    if value.sign() == Sign::Minus {
        -(value.clone() << 1usize) - 1
    } else {
        value.clone() << 1usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unit_constant_program_decodes() {
        // (program 1.0.0 (con unit ())), hand-assembled:
        // version bytes, then bits 0100 1 0011 0 + padding
        let bytes = [0x01, 0x00, 0x00, 0x49, 0x81];
        let program = Program::from_flat(&bytes).unwrap();
        assert_eq!(program.version, (1, 0, 0));
        assert_eq!(program.term, Term::unit());
    }

    #[test]
    fn identity_function_decodes() {
        // (program 1.1.0 (lam (var 1))): bits 0010 0000 00000001
        let bytes = [0x01, 0x01, 0x00, 0x20, 0x01, 0x01];
        let program = Program::from_flat(&bytes).unwrap();
        assert_eq!(program.version, (1, 1, 0));
        assert_eq!(program.term, Term::Lambda(Rc::new(Term::Var(1))));
    }

    #[test]
    fn integer_constant_decodes_with_zigzag() {
        // (con integer 42): term tag 0100, type list 1 0000 0, value
        // zigzag(42) = 84 = 0b01010100
        // bits: 0100 1 0000 0 01010100 -> 0100_1000 , 0001_0101 , 00...
        let bytes = [0x01, 0x00, 0x00, 0x48, 0x15, 0x01];
        let program = Program::from_flat(&bytes).unwrap();
        match program.term {
            Term::Constant(constant) => {
                assert_eq!(*constant, Constant::Integer(BigInt::from(42)))
            }
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn zero_de_bruijn_is_rejected() {
        // (lam (var 0)) is malformed
        let bytes = [0x01, 0x00, 0x00, 0x20, 0x00, 0x01];
        assert_eq!(
            Program::from_flat(&bytes),
            Err(FlatDecodeError::ZeroDeBruijnIndex)
        );
    }

    #[test]
    fn cbor_wrapper_unwraps() {
        let flat = [0x01u8, 0x00, 0x00, 0x49, 0x81];
        let wrapped = minicbor::to_vec(minicbor::bytes::ByteVec::from(flat.to_vec())).unwrap();
        let program = Program::from_cbor(&wrapped).unwrap();
        assert_eq!(program.term, Term::unit());
    }

    #[test]
    fn zigzag_matches_reference_values() {
        assert_eq!(zigzag(&BigInt::from(0)), BigInt::from(0));
        assert_eq!(zigzag(&BigInt::from(-1)), BigInt::from(1));
        assert_eq!(zigzag(&BigInt::from(1)), BigInt::from(2));
        assert_eq!(zigzag(&BigInt::from(-2)), BigInt::from(3));
    }
}
