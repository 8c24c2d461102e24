//! Runtime values and environments of the CEK machine.

use std::rc::Rc;

use num::BigInt;

use crate::primitives::PlutusData;

use super::builtins::DefaultFunction;
use super::error::MachineError;
use super::term::{Constant, Term, Type};

/// Environments are persistent singly-linked frames addressed by DeBruijn
/// index. Recursion is expressed by self-application in the term language,
/// so no cycles ever need to be built here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env(Option<Rc<EnvNode>>);

#[derive(Debug, PartialEq)]
struct EnvNode {
    value: Value,
    parent: Env,
}

impl Env {
    pub fn new() -> Env {
        Env(None)
    }

    pub fn push(&self, value: Value) -> Env {
        Env(Some(Rc::new(EnvNode {
            value,
            parent: self.clone(),
        })))
    }

    /// 1-based lookup: index 1 is the innermost binding.
    pub fn lookup(&self, index: usize) -> Option<&Value> {
        let mut node = self.0.as_deref()?;
        for _ in 1..index {
            node = node.parent.0.as_deref()?;
        }
        Some(&node.value)
    }
}

/// A partially applied builtin: forces seen so far plus accumulated
/// arguments. Invoked once saturated.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinRuntime {
    pub fun: DefaultFunction,
    pub forces: u32,
    pub args: Vec<Value>,
}

impl BuiltinRuntime {
    pub fn new(fun: DefaultFunction) -> Self {
        Self {
            fun,
            forces: 0,
            args: Vec::new(),
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.args.len() == self.fun.arity()
    }

    pub fn needs_force(&self) -> bool {
        self.forces < self.fun.forces()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Con(Rc<Constant>),
    Delay(Rc<Term>, Env),
    Lambda { body: Rc<Term>, env: Env },
    Builtin(BuiltinRuntime),
    Constr { tag: u64, values: Vec<Value> },
}

impl Value {
    pub fn con(constant: Constant) -> Value {
        Value::Con(Rc::new(constant))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Con(constant) if **constant == Constant::Unit)
    }

    /// Abstract size used for builtin costing.
    pub fn ex_mem(&self) -> i64 {
        match self {
            Value::Con(constant) => constant.ex_mem(),
            _ => 1,
        }
    }

    fn mismatch(fun: DefaultFunction, expected: &'static str) -> MachineError {
        MachineError::BuiltinTypeMismatch { fun, expected }
    }

    pub fn expect_integer(&self, fun: DefaultFunction) -> Result<&BigInt, MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::Integer(value) => Ok(value),
                _ => Err(Self::mismatch(fun, "integer")),
            },
            _ => Err(Self::mismatch(fun, "integer")),
        }
    }

    pub fn expect_byte_string(&self, fun: DefaultFunction) -> Result<&[u8], MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::ByteString(bytes) => Ok(bytes),
                _ => Err(Self::mismatch(fun, "bytestring")),
            },
            _ => Err(Self::mismatch(fun, "bytestring")),
        }
    }

    pub fn expect_string(&self, fun: DefaultFunction) -> Result<&str, MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::String(text) => Ok(text),
                _ => Err(Self::mismatch(fun, "string")),
            },
            _ => Err(Self::mismatch(fun, "string")),
        }
    }

    pub fn expect_bool(&self, fun: DefaultFunction) -> Result<bool, MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::Bool(value) => Ok(*value),
                _ => Err(Self::mismatch(fun, "bool")),
            },
            _ => Err(Self::mismatch(fun, "bool")),
        }
    }

    pub fn expect_unit(&self, fun: DefaultFunction) -> Result<(), MachineError> {
        match self {
            Value::Con(constant) if **constant == Constant::Unit => Ok(()),
            _ => Err(Self::mismatch(fun, "unit")),
        }
    }

    pub fn expect_data(&self, fun: DefaultFunction) -> Result<&PlutusData, MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::Data(data) => Ok(data),
                _ => Err(Self::mismatch(fun, "data")),
            },
            _ => Err(Self::mismatch(fun, "data")),
        }
    }

    pub fn expect_list(
        &self,
        fun: DefaultFunction,
    ) -> Result<(&Type, &Vec<Constant>), MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::ProtoList(inner, items) => Ok((inner, items)),
                _ => Err(Self::mismatch(fun, "list")),
            },
            _ => Err(Self::mismatch(fun, "list")),
        }
    }

    pub fn expect_array(
        &self,
        fun: DefaultFunction,
    ) -> Result<(&Type, &Vec<Constant>), MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::Array(inner, items) => Ok((inner, items)),
                _ => Err(Self::mismatch(fun, "array")),
            },
            _ => Err(Self::mismatch(fun, "array")),
        }
    }

    pub fn expect_pair(
        &self,
        fun: DefaultFunction,
    ) -> Result<(&Constant, &Constant), MachineError> {
        match self {
            Value::Con(constant) => match constant.as_ref() {
                Constant::ProtoPair(_, _, first, second) => Ok((first, second)),
                _ => Err(Self::mismatch(fun, "pair")),
            },
            _ => Err(Self::mismatch(fun, "pair")),
        }
    }

    pub fn expect_constant(&self, fun: DefaultFunction) -> Result<&Constant, MachineError> {
        match self {
            Value::Con(constant) => Ok(constant),
            _ => Err(Self::mismatch(fun, "constant")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lookup_is_one_based_from_the_top() {
        let env = Env::new()
            .push(Value::con(Constant::Integer(BigInt::from(1))))
            .push(Value::con(Constant::Integer(BigInt::from(2))));
        let top = env.lookup(1).unwrap();
        assert_eq!(
            top.expect_integer(DefaultFunction::AddInteger).unwrap(),
            &BigInt::from(2)
        );
        let below = env.lookup(2).unwrap();
        assert_eq!(
            below.expect_integer(DefaultFunction::AddInteger).unwrap(),
            &BigInt::from(1)
        );
        assert!(env.lookup(3).is_none());
    }
}
