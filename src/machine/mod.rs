//! The Plutus Core evaluator: a budget-metered CEK machine.
//!
//! Term traversal never touches the host call stack; pending work lives in
//! an explicit frame stack so memory use is bounded by the budget.

pub mod builtins;
pub mod cost;
pub mod error;
pub mod flat;
pub mod term;
pub mod value;

use std::rc::Rc;

pub use builtins::DefaultFunction;
pub use cost::{Budget, CostModel, ExBudget};
pub use error::MachineError;
pub use flat::{FlatDecodeError, Program};
pub use term::{Constant, Term};
pub use value::{BuiltinRuntime, Env, Value};

use cost::StepKind;

use crate::primitives::{ExUnits, PlutusData};

enum Frame {
    /// Function evaluated, argument term pending.
    AwaitFunTerm { env: Env, argument: Rc<Term> },
    /// Argument evaluating, function value in hand.
    AwaitArg { function: Value },
    /// Argument already a value, function evaluating.
    AwaitFunValue { argument: Value },
    Force,
    Constr {
        env: Env,
        tag: u64,
        remaining: Vec<Term>,
        done: Vec<Value>,
    },
    Cases { env: Env, branches: Vec<Term> },
}

enum MachineState {
    Compute { term: Rc<Term>, env: Env },
    Return { value: Value },
}

pub struct Machine {
    costs: CostModel,
    budget: Budget,
    pub logs: Vec<String>,
}

impl Machine {
    pub fn new(costs: CostModel, limit: ExBudget) -> Self {
        Self {
            costs,
            budget: Budget::new(limit),
            logs: Vec::new(),
        }
    }

    pub fn consumed(&self) -> ExUnits {
        self.budget.consumed().to_ex_units()
    }

    pub fn remaining(&self) -> ExBudget {
        self.budget.remaining()
    }

    fn step(&mut self, kind: StepKind) -> Result<(), MachineError> {
        self.budget.spend(self.costs.machine.get(kind))
    }

    /// Evaluates a closed term to a value.
    pub fn run(&mut self, term: &Term) -> Result<Value, MachineError> {
        self.step(StepKind::Startup)?;

        let mut stack: Vec<Frame> = Vec::new();
        let mut state = MachineState::Compute {
            term: Rc::new(term.clone()),
            env: Env::new(),
        };

        loop {
            state = match state {
                MachineState::Compute { term, env } => self.compute(&mut stack, term, env)?,
                MachineState::Return { value } => match stack.pop() {
                    None => return Ok(value),
                    Some(frame) => self.unwind(&mut stack, frame, value)?,
                },
            };
        }
    }

    fn compute(
        &mut self,
        stack: &mut Vec<Frame>,
        term: Rc<Term>,
        env: Env,
    ) -> Result<MachineState, MachineError> {
        match term.as_ref() {
            Term::Var(index) => {
                self.step(StepKind::Var)?;
                let value = env
                    .lookup(*index)
                    .cloned()
                    .ok_or(MachineError::OpenTerm { index: *index })?;
                Ok(MachineState::Return { value })
            }
            Term::Delay(body) => {
                self.step(StepKind::Delay)?;
                Ok(MachineState::Return {
                    value: Value::Delay(body.clone(), env),
                })
            }
            Term::Lambda(body) => {
                self.step(StepKind::Lambda)?;
                Ok(MachineState::Return {
                    value: Value::Lambda {
                        body: body.clone(),
                        env,
                    },
                })
            }
            Term::Apply { function, argument } => {
                self.step(StepKind::Apply)?;
                stack.push(Frame::AwaitFunTerm {
                    env: env.clone(),
                    argument: argument.clone(),
                });
                Ok(MachineState::Compute {
                    term: function.clone(),
                    env,
                })
            }
            Term::Constant(constant) => {
                self.step(StepKind::Constant)?;
                Ok(MachineState::Return {
                    value: Value::Con(constant.clone()),
                })
            }
            Term::Force(inner) => {
                self.step(StepKind::Force)?;
                stack.push(Frame::Force);
                Ok(MachineState::Compute {
                    term: inner.clone(),
                    env,
                })
            }
            Term::Error => Err(MachineError::EvaluationFailure),
            Term::Builtin(fun) => {
                self.step(StepKind::Builtin)?;
                Ok(MachineState::Return {
                    value: Value::Builtin(BuiltinRuntime::new(*fun)),
                })
            }
            Term::Constr { tag, fields } => {
                self.step(StepKind::Constr)?;
                match fields.split_first() {
                    None => Ok(MachineState::Return {
                        value: Value::Constr {
                            tag: *tag,
                            values: vec![],
                        },
                    }),
                    Some((first, rest)) => {
                        stack.push(Frame::Constr {
                            env: env.clone(),
                            tag: *tag,
                            remaining: rest.to_vec(),
                            done: vec![],
                        });
                        Ok(MachineState::Compute {
                            term: Rc::new(first.clone()),
                            env,
                        })
                    }
                }
            }
            Term::Case { constr, branches } => {
                self.step(StepKind::Case)?;
                stack.push(Frame::Cases {
                    env: env.clone(),
                    branches: branches.clone(),
                });
                Ok(MachineState::Compute {
                    term: constr.clone(),
                    env,
                })
            }
        }
    }

    fn unwind(
        &mut self,
        stack: &mut Vec<Frame>,
        frame: Frame,
        value: Value,
    ) -> Result<MachineState, MachineError> {
        match frame {
            Frame::AwaitFunTerm { env, argument } => {
                stack.push(Frame::AwaitArg { function: value });
                Ok(MachineState::Compute {
                    term: argument,
                    env,
                })
            }
            Frame::AwaitArg { function } => self.apply(function, value),
            Frame::AwaitFunValue { argument } => self.apply(value, argument),
            Frame::Force => self.force(value),
            Frame::Constr {
                env,
                tag,
                mut remaining,
                mut done,
            } => {
                done.push(value);
                if remaining.is_empty() {
                    Ok(MachineState::Return {
                        value: Value::Constr { tag, values: done },
                    })
                } else {
                    let next = remaining.remove(0);
                    stack.push(Frame::Constr {
                        env: env.clone(),
                        tag,
                        remaining,
                        done,
                    });
                    Ok(MachineState::Compute {
                        term: Rc::new(next),
                        env,
                    })
                }
            }
            Frame::Cases { env, branches } => match value {
                Value::Constr { tag, values } => {
                    let branch = branches
                        .get(tag as usize)
                        .ok_or(MachineError::MissingCaseBranch { tag })?
                        .clone();
                    // The branch is applied to the constructor fields in
                    // order; fields are already values.
                    for argument in values.into_iter().rev() {
                        stack.push(Frame::AwaitFunValue { argument });
                    }
                    Ok(MachineState::Compute {
                        term: Rc::new(branch),
                        env,
                    })
                }
                _ => Err(MachineError::NonConstructorScrutinee),
            },
        }
    }

    fn apply(&mut self, function: Value, argument: Value) -> Result<MachineState, MachineError> {
        match function {
            Value::Lambda { body, env } => Ok(MachineState::Compute {
                term: body,
                env: env.push(argument),
            }),
            Value::Builtin(mut runtime) => {
                if runtime.needs_force() {
                    return Err(MachineError::BuiltinAwaitingForce(runtime.fun));
                }
                if runtime.is_saturated() {
                    return Err(MachineError::BuiltinArityExceeded(runtime.fun));
                }
                runtime.args.push(argument);
                if runtime.is_saturated() {
                    self.invoke(runtime)
                } else {
                    Ok(MachineState::Return {
                        value: Value::Builtin(runtime),
                    })
                }
            }
            _ => Err(MachineError::NonFunctionApplication),
        }
    }

    fn force(&mut self, value: Value) -> Result<MachineState, MachineError> {
        match value {
            Value::Delay(term, env) => Ok(MachineState::Compute { term, env }),
            Value::Builtin(mut runtime) => {
                if !runtime.needs_force() {
                    return Err(MachineError::BuiltinForceExceeded(runtime.fun));
                }
                runtime.forces += 1;
                Ok(MachineState::Return {
                    value: Value::Builtin(runtime),
                })
            }
            _ => Err(MachineError::NonPolymorphicInstantiation),
        }
    }

    fn invoke(&mut self, runtime: BuiltinRuntime) -> Result<MachineState, MachineError> {
        let sizes: Vec<i64> = runtime.args.iter().map(Value::ex_mem).collect();
        self.budget
            .spend(self.costs.builtin(runtime.fun).charge(&sizes))?;
        let value = runtime.fun.call(&runtime.args, &mut self.logs)?;
        Ok(MachineState::Return { value })
    }
}

/// Wraps a term in one application node per argument, the way scripts
/// receive their datum, redeemer and context.
pub fn apply_data_args(term: Term, args: &[PlutusData]) -> Term {
    let mut out = term;
    for arg in args {
        out = out.apply(Term::data(arg.clone()));
    }
    out
}
