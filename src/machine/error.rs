//! Evaluator failures.

use super::builtins::DefaultFunction;
use super::cost::ExBudget;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MachineError {
    #[error("execution budget exhausted ({budget:?} remaining)")]
    OutOfBudget { budget: ExBudget },

    #[error("the script evaluated to the error term")]
    EvaluationFailure,

    #[error("open term: de bruijn index {index} escapes the environment")]
    OpenTerm { index: usize },

    #[error("applied a non-function value")]
    NonFunctionApplication,

    #[error("forced a value that is not delayed")]
    NonPolymorphicInstantiation,

    #[error("builtin {0:?} applied to too many arguments")]
    BuiltinArityExceeded(DefaultFunction),

    #[error("builtin {0:?} must be forced before applying arguments")]
    BuiltinAwaitingForce(DefaultFunction),

    #[error("builtin {fun:?} expected {expected} but received an incompatible argument")]
    BuiltinTypeMismatch {
        fun: DefaultFunction,
        expected: &'static str,
    },

    #[error("builtin {0:?} forced more times than its type arguments allow")]
    BuiltinForceExceeded(DefaultFunction),

    #[error("builtin {0:?} has no backing implementation in this build")]
    UnsupportedBuiltin(DefaultFunction),

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("index out of bounds or empty structure")]
    ByteStringOutOfBounds,

    #[error("decodeUtf8: byte string is not valid utf-8")]
    Utf8DecodeFailure,

    #[error("case on constructor tag {tag} with no matching branch")]
    MissingCaseBranch { tag: u64 },

    #[error("case applied to a non-constructor value")]
    NonConstructorScrutinee,

    #[error("the final value is not unit")]
    ResultNotUnit,

    #[error("integerToByteString: {0}")]
    IntegerConversion(&'static str),

    #[error("expModInteger: {0}")]
    ExpModFailure(&'static str),
}
