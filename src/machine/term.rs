//! Plutus Core terms and constants.

use std::rc::Rc;

use num::BigInt;

use crate::primitives::PlutusData;

use super::builtins::DefaultFunction;

/// Builtin types, used to type-check polymorphic list and pair builtins at
/// runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    ByteString,
    String,
    Unit,
    Bool,
    List(Rc<Type>),
    Pair(Rc<Type>, Rc<Type>),
    Data,
    Array(Rc<Type>),
    Bls12_381G1Element,
    Bls12_381G2Element,
    Bls12_381MlResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Integer(BigInt),
    ByteString(Vec<u8>),
    String(String),
    Unit,
    Bool(bool),
    Data(PlutusData),
    ProtoList(Type, Vec<Constant>),
    ProtoPair(Type, Type, Box<Constant>, Box<Constant>),
    Array(Type, Vec<Constant>),
}

impl Constant {
    pub fn type_of(&self) -> Type {
        match self {
            Constant::Integer(_) => Type::Integer,
            Constant::ByteString(_) => Type::ByteString,
            Constant::String(_) => Type::String,
            Constant::Unit => Type::Unit,
            Constant::Bool(_) => Type::Bool,
            Constant::Data(_) => Type::Data,
            Constant::ProtoList(inner, _) => Type::List(Rc::new(inner.clone())),
            Constant::ProtoPair(first, second, _, _) => {
                Type::Pair(Rc::new(first.clone()), Rc::new(second.clone()))
            }
            Constant::Array(inner, _) => Type::Array(Rc::new(inner.clone())),
        }
    }

    /// Abstract memory footprint in 8-byte words, the unit the memory
    /// budget is metered in.
    pub fn ex_mem(&self) -> i64 {
        match self {
            Constant::Integer(value) => integer_ex_mem(value),
            Constant::ByteString(bytes) => byte_string_ex_mem(bytes),
            Constant::String(text) => text.chars().count() as i64,
            Constant::Unit => 1,
            Constant::Bool(_) => 1,
            Constant::Data(data) => data_ex_mem(data),
            Constant::ProtoList(_, items) | Constant::Array(_, items) => {
                items.iter().map(Constant::ex_mem).sum::<i64>().max(1)
            }
            Constant::ProtoPair(_, _, first, second) => 1 + first.ex_mem() + second.ex_mem(),
        }
    }
}

pub fn integer_ex_mem(value: &BigInt) -> i64 {
    if value == &BigInt::from(0u8) {
        1
    } else {
        (value.bits() as i64 - 1) / 64 + 1
    }
}

pub fn byte_string_ex_mem(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        1
    } else {
        (bytes.len() as i64 - 1) / 8 + 1
    }
}

fn data_ex_mem(data: &PlutusData) -> i64 {
    // Every node costs four words plus its payload.
    const NODE: i64 = 4;
    match data {
        PlutusData::Constr { fields, .. } => NODE + fields.iter().map(data_ex_mem).sum::<i64>(),
        PlutusData::Map(pairs) => {
            NODE + pairs
                .iter()
                .map(|(key, value)| data_ex_mem(key) + data_ex_mem(value))
                .sum::<i64>()
        }
        PlutusData::List(items) => NODE + items.iter().map(data_ex_mem).sum::<i64>(),
        PlutusData::I(value) => NODE + integer_ex_mem(value),
        PlutusData::B(bytes) => NODE + byte_string_ex_mem(bytes),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// DeBruijn index, 1-based: 1 is the innermost binder.
    Var(usize),
    Delay(Rc<Term>),
    Lambda(Rc<Term>),
    Apply {
        function: Rc<Term>,
        argument: Rc<Term>,
    },
    Constant(Rc<Constant>),
    Force(Rc<Term>),
    Error,
    Builtin(DefaultFunction),
    Constr {
        tag: u64,
        fields: Vec<Term>,
    },
    Case {
        constr: Rc<Term>,
        branches: Vec<Term>,
    },
}

impl Term {
    pub fn unit() -> Term {
        Term::Constant(Rc::new(Constant::Unit))
    }

    pub fn data(data: PlutusData) -> Term {
        Term::Constant(Rc::new(Constant::Data(data)))
    }

    pub fn apply(self, argument: Term) -> Term {
        Term::Apply {
            function: Rc::new(self),
            argument: Rc::new(argument),
        }
    }

    /// Whether the term uses the sums-of-products constructs that only
    /// exist from Plutus V3 on.
    pub fn uses_sums_of_products(&self) -> bool {
        match self {
            Term::Constr { .. } | Term::Case { .. } => true,
            Term::Var(_) | Term::Constant(_) | Term::Error | Term::Builtin(_) => false,
            Term::Delay(inner) | Term::Lambda(inner) | Term::Force(inner) => {
                inner.uses_sums_of_products()
            }
            Term::Apply { function, argument } => {
                function.uses_sums_of_products() || argument.uses_sums_of_products()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_memory_grows_with_magnitude() {
        assert_eq!(integer_ex_mem(&BigInt::from(0)), 1);
        assert_eq!(integer_ex_mem(&BigInt::from(u64::MAX)), 1);
        let wide = BigInt::from(u64::MAX) + 1;
        assert_eq!(integer_ex_mem(&wide), 2);
    }

    #[test]
    fn byte_string_memory_rounds_to_words() {
        assert_eq!(byte_string_ex_mem(&[]), 1);
        assert_eq!(byte_string_ex_mem(&[0; 8]), 1);
        assert_eq!(byte_string_ex_mem(&[0; 9]), 2);
    }

    #[test]
    fn sums_of_products_detection_descends() {
        let nested = Term::Lambda(Rc::new(Term::Constr {
            tag: 0,
            fields: vec![],
        }));
        assert!(nested.uses_sums_of_products());
        assert!(!Term::unit().uses_sums_of_products());
    }
}
