//! The state-transition-system wiring: uniform contracts for validators
//! (predicates that never touch state) and mutators (transitions that
//! thread it), plus the combinators that compose them into a pipeline.

/// A predicate over (context, state, event). Success carries no data;
/// failure is the pipeline's error sum.
pub trait Validator<Ctx, St, Ev, Err> {
    fn name(&self) -> &'static str;

    fn validate(&self, ctx: &Ctx, state: &St, event: &Ev) -> Result<(), Err>;
}

/// A state transition over (context, state, event).
pub trait Mutator<Ctx, St, Ev, Err> {
    fn name(&self) -> &'static str;

    fn mutate(&self, ctx: &Ctx, state: St, event: &Ev) -> Result<St, Err>;
}

/// Runs every validator against the *initial* state, short-circuiting on
/// the first failure.
pub fn validate_all<Ctx, St, Ev, Err>(
    validators: &[&dyn Validator<Ctx, St, Ev, Err>],
    ctx: &Ctx,
    state: &St,
    event: &Ev,
) -> Result<(), Err> {
    for validator in validators {
        tracing::trace!(rule = validator.name(), "running validator");
        validator.validate(ctx, state, event)?;
    }
    Ok(())
}

/// Threads state through the mutators in order, short-circuiting on the
/// first failure. Order matters: mutator composition is not commutative.
pub fn mutate_all<Ctx, St, Ev, Err>(
    mutators: &[&dyn Mutator<Ctx, St, Ev, Err>],
    ctx: &Ctx,
    state: St,
    event: &Ev,
) -> Result<St, Err> {
    let mut state = state;
    for mutator in mutators {
        tracing::trace!(rule = mutator.name(), "running mutator");
        state = mutator.mutate(ctx, state, event)?;
    }
    Ok(state)
}

/// Validate-then-mutate: all validators observe the initial state, then the
/// mutators run in order on a clone of it.
pub fn apply<Ctx, St: Clone, Ev, Err>(
    validators: &[&dyn Validator<Ctx, St, Ev, Err>],
    mutators: &[&dyn Mutator<Ctx, St, Ev, Err>],
    ctx: &Ctx,
    state: &St,
    event: &Ev,
) -> Result<St, Err> {
    validate_all(validators, ctx, state, event)?;
    mutate_all(mutators, ctx, state.clone(), event)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimumBalance(u64);

    impl Validator<(), u64, u64, String> for MinimumBalance {
        fn name(&self) -> &'static str {
            "minimum-balance"
        }

        fn validate(&self, _ctx: &(), state: &u64, _event: &u64) -> Result<(), String> {
            if *state < self.0 {
                Err(format!("balance {state} below {}", self.0))
            } else {
                Ok(())
            }
        }
    }

    struct Deposit;
    struct Double;

    impl Mutator<(), u64, u64, String> for Deposit {
        fn name(&self) -> &'static str {
            "deposit"
        }

        fn mutate(&self, _ctx: &(), state: u64, event: &u64) -> Result<u64, String> {
            state.checked_add(*event).ok_or_else(|| "overflow".to_string())
        }
    }

    impl Mutator<(), u64, u64, String> for Double {
        fn name(&self) -> &'static str {
            "double"
        }

        fn mutate(&self, _ctx: &(), state: u64, _event: &u64) -> Result<u64, String> {
            state.checked_mul(2).ok_or_else(|| "overflow".to_string())
        }
    }

    #[test]
    fn validators_see_the_initial_state_only() {
        let result = apply(
            &[&MinimumBalance(10)],
            &[&Deposit, &Double],
            &(),
            &10,
            &5,
        );
        assert_eq!(result, Ok(30));
    }

    #[test]
    fn validation_failure_leaves_state_untouched() {
        let state = 3u64;
        let result = apply(&[&MinimumBalance(10)], &[&Deposit], &(), &state, &5);
        assert!(result.is_err());
        assert_eq!(state, 3);
    }

    #[test]
    fn mutator_order_is_observable() {
        let deposit_then_double = mutate_all::<_, _, _, String>(
            &[&Deposit as &dyn Mutator<_, _, _, _>, &Double],
            &(),
            1,
            &5,
        );
        let double_then_deposit = mutate_all::<_, _, _, String>(
            &[&Double as &dyn Mutator<_, _, _, _>, &Deposit],
            &(),
            1,
            &5,
        );
        assert_eq!(deposit_then_double, Ok(12));
        assert_eq!(double_then_deposit, Ok(7));
    }

    #[test]
    fn mutation_short_circuits() {
        let result =
            mutate_all::<_, _, _, String>(&[&Deposit as &dyn Mutator<_, _, _, _>, &Double], &(), u64::MAX, &1);
        assert!(result.is_err());
    }
}
