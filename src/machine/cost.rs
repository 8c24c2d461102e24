//! Budget accounting and the cost model.
//!
//! Parameter vectors are consumed positionally: nine machine step pairs
//! first (cpu, mem each), then four values per builtin in enum order
//! (cpu intercept, cpu slope, mem intercept, mem slope), the slopes
//! applying to the summed abstract sizes of the arguments. A vector that
//! runs short falls back to deliberately expensive defaults, so an
//! underspecified model can only over-charge.

use crate::primitives::ExUnits;

use super::builtins::DefaultFunction;
use super::error::MachineError;

/// Remaining (or consumed) budget. Signed so exhaustion is observable as
/// a negative remainder before the step takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExBudget {
    pub mem: i64,
    pub cpu: i64,
}

impl ExBudget {
    pub const ZERO: ExBudget = ExBudget { mem: 0, cpu: 0 };

    /// Effectively unbounded, for cost-measurement runs.
    pub fn max() -> ExBudget {
        ExBudget {
            mem: i64::MAX,
            cpu: i64::MAX,
        }
    }

    pub fn from_ex_units(units: &ExUnits) -> ExBudget {
        ExBudget {
            mem: units.mem.min(i64::MAX as u64) as i64,
            cpu: units.steps.min(i64::MAX as u64) as i64,
        }
    }

    pub fn to_ex_units(self) -> ExUnits {
        ExUnits {
            mem: self.mem.max(0) as u64,
            steps: self.cpu.max(0) as u64,
        }
    }

}

impl std::ops::Sub for ExBudget {
    type Output = ExBudget;

    fn sub(self, rhs: ExBudget) -> ExBudget {
        ExBudget {
            mem: self.mem - rhs.mem,
            cpu: self.cpu - rhs.cpu,
        }
    }
}

/// One budget charge per machine transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Startup,
    Var,
    Constant,
    Lambda,
    Delay,
    Force,
    Apply,
    Builtin,
    Constr,
    Case,
}

impl StepKind {
    pub const COUNT: usize = 10;

    fn index(self) -> usize {
        match self {
            StepKind::Startup => 0,
            StepKind::Var => 1,
            StepKind::Constant => 2,
            StepKind::Lambda => 3,
            StepKind::Delay => 4,
            StepKind::Force => 5,
            StepKind::Apply => 6,
            StepKind::Builtin => 7,
            StepKind::Constr => 8,
            StepKind::Case => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineCosts {
    steps: [ExBudget; StepKind::COUNT],
}

impl Default for MachineCosts {
    fn default() -> Self {
        let step = ExBudget { mem: 100, cpu: 23_000 };
        let mut steps = [step; StepKind::COUNT];
        steps[StepKind::Startup.index()] = ExBudget { mem: 100, cpu: 100 };
        Self { steps }
    }
}

impl MachineCosts {
    pub fn get(&self, kind: StepKind) -> ExBudget {
        self.steps[kind.index()]
    }
}

/// Linear costing in the summed argument sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearCost {
    pub intercept: i64,
    pub slope: i64,
}

impl LinearCost {
    fn at(&self, size: i64) -> i64 {
        self.intercept.saturating_add(self.slope.saturating_mul(size.max(0)))
    }
}

/// Fallback for builtins a short parameter vector does not cover.
const EXPENSIVE: LinearCost = LinearCost {
    intercept: 10_000_000,
    slope: 10_000,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinCost {
    pub cpu: LinearCost,
    pub mem: LinearCost,
}

impl Default for BuiltinCost {
    fn default() -> Self {
        BuiltinCost {
            cpu: LinearCost {
                intercept: 1_000,
                slope: 100,
            },
            mem: LinearCost {
                intercept: 32,
                slope: 1,
            },
        }
    }
}

impl BuiltinCost {
    fn expensive() -> Self {
        BuiltinCost {
            cpu: EXPENSIVE,
            mem: EXPENSIVE,
        }
    }

    pub fn charge(&self, arg_sizes: &[i64]) -> ExBudget {
        let total: i64 = arg_sizes.iter().copied().sum();
        ExBudget {
            mem: self.mem.at(total),
            cpu: self.cpu.at(total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostModel {
    pub machine: MachineCosts,
    builtins: Vec<BuiltinCost>,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            machine: MachineCosts::default(),
            builtins: vec![BuiltinCost::default(); DefaultFunction::COUNT],
        }
    }
}

impl CostModel {
    /// Builds a model from a protocol-parameter vector.
    pub fn from_params(params: &[i64]) -> CostModel {
        let mut values = params.iter().copied();
        let mut machine = MachineCosts::default();
        for index in 0..StepKind::COUNT {
            let cpu = values.next();
            let mem = values.next();
            if let (Some(cpu), Some(mem)) = (cpu, mem) {
                machine.steps[index] = ExBudget { mem, cpu };
            }
        }
        let mut builtins = Vec::with_capacity(DefaultFunction::COUNT);
        for _ in 0..DefaultFunction::COUNT {
            let quad = (values.next(), values.next(), values.next(), values.next());
            match quad {
                (Some(ci), Some(cs), Some(mi), Some(ms)) => builtins.push(BuiltinCost {
                    cpu: LinearCost {
                        intercept: ci,
                        slope: cs,
                    },
                    mem: LinearCost {
                        intercept: mi,
                        slope: ms,
                    },
                }),
                _ => builtins.push(BuiltinCost::expensive()),
            }
        }
        CostModel { machine, builtins }
    }

    pub fn builtin(&self, fun: DefaultFunction) -> &BuiltinCost {
        &self.builtins[fun as usize]
    }
}

/// Tracks spending against a hard limit. Every interpreter step and every
/// builtin invocation passes through [`Budget::spend`]; the remaining
/// budget is monotonically non-increasing and a step that would overdraw
/// fails before its effect is observed.
#[derive(Debug, Clone)]
pub struct Budget {
    remaining: ExBudget,
    consumed: ExBudget,
}

impl Budget {
    pub fn new(limit: ExBudget) -> Self {
        Self {
            remaining: limit,
            consumed: ExBudget::ZERO,
        }
    }

    pub fn spend(&mut self, cost: ExBudget) -> Result<(), MachineError> {
        let next = self.remaining - cost;
        if next.mem < 0 || next.cpu < 0 {
            return Err(MachineError::OutOfBudget { budget: next });
        }
        self.remaining = next;
        self.consumed.mem += cost.mem;
        self.consumed.cpu += cost.cpu;
        Ok(())
    }

    pub fn consumed(&self) -> ExBudget {
        self.consumed
    }

    pub fn remaining(&self) -> ExBudget {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overdraw_fails_before_taking_effect() {
        let mut budget = Budget::new(ExBudget { mem: 10, cpu: 10 });
        budget.spend(ExBudget { mem: 6, cpu: 1 }).unwrap();
        let before = budget.remaining();
        assert!(budget.spend(ExBudget { mem: 6, cpu: 1 }).is_err());
        assert_eq!(budget.remaining(), before);
        assert_eq!(budget.consumed(), ExBudget { mem: 6, cpu: 1 });
    }

    #[test]
    fn short_parameter_vectors_over_charge() {
        let model = CostModel::from_params(&[1, 2]);
        let cost = model.builtin(DefaultFunction::AddInteger).charge(&[1, 1]);
        assert!(cost.cpu >= 10_000_000);
    }

    #[test]
    fn parameter_vectors_fill_positionally() {
        let mut params = vec![0i64; StepKind::COUNT * 2];
        params[0] = 7; // startup cpu
        params[1] = 3; // startup mem
        params.extend([11, 1, 5, 0]); // AddInteger
        let model = CostModel::from_params(&params);
        assert_eq!(
            model.machine.get(StepKind::Startup),
            ExBudget { mem: 3, cpu: 7 }
        );
        assert_eq!(
            model.builtin(DefaultFunction::AddInteger).charge(&[2, 2]),
            ExBudget { mem: 5, cpu: 15 }
        );
    }
}
