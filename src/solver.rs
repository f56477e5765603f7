//! Gauss–Newton solver over the normal equations (spec §4.5). Grounded on
//! `ffSketch_Solve`/`ffSketch_calcError` in
//! `original_source/freeform_impl.c` — the pivoting, elimination, and
//! back-substitution logic here is a direct, line-for-line port, preserved
//! quirks and all (see the module-level notes below).

use tracing::{trace, warn};

use crate::constraint::Constraint;
use crate::handle::{ConstraintTag, ParamTag};
use crate::linker::{relink, LinkState};
use crate::param::Parameter;
use crate::slotmap::SlotTable;

/// Pivot epsilon, hard-coded per spec §4.5 "Numeric constants".
const PIVOT_EPSILON: f64 = 1e-10;

/// Runs Gauss–Newton steps until every constraint's residual is within
/// `tolerance` or `max_steps` is exhausted.
///
/// Relinks first if `link_outdated`. Returns `true` (vacuously) if there
/// are no live constraints or no live parameters.
pub fn solve(
    link_outdated: &mut bool,
    state: &mut LinkState,
    constraints: &mut SlotTable<ConstraintTag, Constraint>,
    params: &mut SlotTable<ParamTag, Parameter>,
    tolerance: f64,
    max_steps: u32,
) -> bool {
    if *link_outdated {
        relink(state, constraints, params);
        *link_outdated = false;
    }

    let rows = state.live_constraints.len();
    let cols = state.live_params.len();
    if rows == 0 || cols == 0 {
        return true;
    }

    for step in 0..max_steps {
        trace!(step, rows, cols, "gauss-newton iteration");

        if calc_error(state, constraints, params, tolerance) {
            return true;
        }

        evaluate_jacobian(state, constraints, params);
        assemble_normal_matrix(state, constraints, rows, cols);
        forward_eliminate(state, constraints, rows);
        back_substitute(state, &*constraints, rows);
        apply_correction(state, constraints, params, rows, cols);
    }

    false
}

/// Refreshes each live constraint's residual; returns `true` iff every
/// residual's magnitude is within `tolerance`.
fn calc_error(
    state: &LinkState,
    constraints: &mut SlotTable<ConstraintTag, Constraint>,
    params: &SlotTable<ParamTag, Parameter>,
    tolerance: f64,
) -> bool {
    let mut converged = true;
    for &handle in &state.live_constraints {
        let cons = constraints
            .get_mut(handle)
            .unwrap_or_else(|| crate::error::stale_live_handle(handle));
        cons.err = cons.def.equation.evaluate(params);
        if cons.err.abs() > tolerance {
            converged = false;
        }
    }
    converged
}

fn evaluate_jacobian(
    state: &LinkState,
    constraints: &mut SlotTable<ConstraintTag, Constraint>,
    params: &SlotTable<ParamTag, Parameter>,
) {
    for &handle in &state.live_constraints {
        let cons = constraints
            .get_mut(handle)
            .unwrap_or_else(|| crate::error::stale_live_handle(handle));
        for p in 0..cons.derivs.len() {
            cons.deriv_values[p] = cons.derivs[p].evaluate_with(&cons.def.equation, params);
        }
    }
}

/// `N[r + c*rows] = Σ_k J[r][k] * J[c][k]`, skipping any `k` where either
/// factor is exactly zero (spec §4.5c — a speed win, not a correctness
/// requirement).
fn assemble_normal_matrix(
    state: &mut LinkState,
    constraints: &SlotTable<ConstraintTag, Constraint>,
    rows: usize,
    cols: usize,
) {
    for r in 0..rows {
        let row_cons = constraints
            .get(state.live_constraints[r])
            .unwrap_or_else(|| crate::error::stale_live_handle(state.live_constraints[r]));
        for c in 0..rows {
            let col_cons = constraints
                .get(state.live_constraints[c])
                .unwrap_or_else(|| crate::error::stale_live_handle(state.live_constraints[c]));
            let mut sum = 0.0;
            for k in 0..cols {
                let rv = row_cons.deriv_values[k];
                let cv = col_cons.deriv_values[k];
                if rv == 0.0 || cv == 0.0 {
                    continue;
                }
                sum += rv * cv;
            }
            state.normal_matrix[r + c * rows] = sum;
        }
    }
}

/// Forward elimination with partial pivoting. A degenerate pivot (max
/// column magnitude below [`PIVOT_EPSILON`]) is skipped, not treated as a
/// fatal error — the remaining constraints may still resolve the system
/// (spec §4.5 "Design rationale"). Row swaps permute the corresponding
/// constraints' `err` fields, which is only ever observed again within the
/// same step (spec §4.5 "Numeric constants").
fn forward_eliminate(state: &mut LinkState, constraints: &mut SlotTable<ConstraintTag, Constraint>, rows: usize) {
    let n = &mut state.normal_matrix;
    for row in 0..rows {
        let mut pivot_row = row;
        let mut max_value = 0.0_f64;
        for candidate in row..rows {
            let v = n[candidate + row * rows].abs();
            if v > max_value {
                max_value = v;
                pivot_row = candidate;
            }
        }

        if max_value < PIVOT_EPSILON {
            warn!(row, max_value, "small pivot element, skipping row");
            continue;
        }

        if pivot_row != row {
            for col in 0..rows {
                n.swap(row + col * rows, pivot_row + col * rows);
            }
            let row_handle = state.live_constraints[row];
            let pivot_handle = state.live_constraints[pivot_row];
            let row_err = constraints
                .get(row_handle)
                .unwrap_or_else(|| crate::error::stale_live_handle(row_handle))
                .err;
            let pivot_err = constraints
                .get(pivot_handle)
                .unwrap_or_else(|| crate::error::stale_live_handle(pivot_handle))
                .err;
            constraints
                .get_mut(row_handle)
                .unwrap_or_else(|| crate::error::stale_live_handle(row_handle))
                .err = pivot_err;
            constraints
                .get_mut(pivot_handle)
                .unwrap_or_else(|| crate::error::stale_live_handle(pivot_handle))
                .err = row_err;
        }

        let diag = n[row + row * rows];
        if diag.abs() < PIVOT_EPSILON {
            warn!(row, "division by zero avoided during elimination");
            continue;
        }

        for target in (row + 1)..rows {
            let coefficient = n[target + row * rows] / diag;
            for col in 0..rows {
                n[target + col * rows] -= n[row + col * rows] * coefficient;
            }
            let target_handle = state.live_constraints[target];
            let row_handle = state.live_constraints[row];
            let row_err = constraints
                .get(row_handle)
                .unwrap_or_else(|| crate::error::stale_live_handle(row_handle))
                .err;
            let target_err = constraints
                .get_mut(target_handle)
                .unwrap_or_else(|| crate::error::stale_live_handle(target_handle));
            target_err.err -= row_err * coefficient;
        }
    }
}

/// Back substitution. A degenerate diagonal leaves `intermediate_solution
/// [row]` at whatever value it held before this call — it is *not* reset to
/// zero — per spec §4.5e and §9's open question: this is a known quirk of
/// the system being ported, preserved rather than patched.
fn back_substitute(state: &mut LinkState, constraints: &SlotTable<ConstraintTag, Constraint>, rows: usize) {
    for row in (0..rows).rev() {
        let diag = state.normal_matrix[row + row * rows];
        if diag.abs() < PIVOT_EPSILON {
            warn!(row, "back substitution skipped at near-zero diagonal");
            continue;
        }
        let row_handle = state.live_constraints[row];
        let mut value = constraints
            .get(row_handle)
            .unwrap_or_else(|| crate::error::stale_live_handle(row_handle))
            .err
            / diag;
        for prev in ((row + 1)..rows).rev() {
            value -= state.intermediate_solution[prev] * state.normal_matrix[row + prev * rows] / diag;
        }
        state.intermediate_solution[row] = value;
    }
}

fn apply_correction(
    state: &LinkState,
    constraints: &SlotTable<ConstraintTag, Constraint>,
    params: &mut SlotTable<ParamTag, Parameter>,
    rows: usize,
    cols: usize,
) {
    for c in 0..cols {
        let mut correction = 0.0;
        for r in 0..rows {
            let cons = constraints
                .get(state.live_constraints[r])
                .unwrap_or_else(|| crate::error::stale_live_handle(state.live_constraints[r]));
            correction += state.intermediate_solution[r] * cons.deriv_values[c];
        }
        let param_handle = state.live_params[c];
        if let Some(param) = params.get_mut(param_handle) {
            param.value -= correction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintDef, ConstraintKind};
    use crate::expr::Expr;
    use crate::handle::{ConstraintTag, ParamTag};

    #[test]
    fn single_point_coincidence_converges() {
        crate::test_support::init_tracing();
        // one free parameter p, constraint p - 5 = 0
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(1);
        let p = params.create(Parameter::new(0.0));

        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(1);
        let eq = Expr::sub(Expr::param(p), Expr::constant(5.0));
        constraints.create(Constraint::new(ConstraintDef::new(eq, ConstraintKind(0))));

        let mut state = LinkState::default();
        let mut link_outdated = true;
        let converged = solve(&mut link_outdated, &mut state, &mut constraints, &mut params, 1e-9, 50);

        assert!(converged);
        assert!((params.get(p).unwrap().value - 5.0).abs() < 1e-6);
    }

    #[test]
    fn vacuous_solve_with_no_constraints_converges_immediately() {
        crate::test_support::init_tracing();
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(1);
        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(1);
        let mut state = LinkState::default();
        let mut link_outdated = true;
        assert!(solve(&mut link_outdated, &mut state, &mut constraints, &mut params, 1e-9, 10));
    }

    #[test]
    fn vacuous_solve_with_no_live_parameters_converges_immediately() {
        crate::test_support::init_tracing();
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(1);
        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(1);
        constraints.create(Constraint::new(ConstraintDef::new(Expr::constant(1.0), ConstraintKind(0))));
        let mut state = LinkState::default();
        let mut link_outdated = true;
        assert!(solve(&mut link_outdated, &mut state, &mut constraints, &mut params, 1e-9, 10));
    }

    #[test]
    fn exhausting_step_budget_without_converging_returns_false() {
        crate::test_support::init_tracing();
        // p^2 + 1 = 0 has no real root; gradient descent will never drive
        // the residual below tolerance.
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(1);
        let p = params.create(Parameter::new(1.0));
        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(1);
        let eq = Expr::add(Expr::sqr(Expr::param(p)), Expr::constant(1.0));
        constraints.create(Constraint::new(ConstraintDef::new(eq, ConstraintKind(0))));

        let mut state = LinkState::default();
        let mut link_outdated = true;
        let converged = solve(&mut link_outdated, &mut state, &mut constraints, &mut params, 1e-9, 5);
        assert!(!converged);
    }

    #[test]
    fn distance_constraint_between_two_points_converges() {
        crate::test_support::init_tracing();
        // points at (0,0) and (x, 0); constraint sqrt(x^2) - 3 = 0
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(2);
        let x = params.create(Parameter::new(1.0));

        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(1);
        let dist = Expr::sqrt(Expr::sqr(Expr::param(x)));
        let eq = Expr::sub(dist, Expr::constant(3.0));
        constraints.create(Constraint::new(ConstraintDef::new(eq, ConstraintKind(0))));

        let mut state = LinkState::default();
        let mut link_outdated = true;
        let converged = solve(&mut link_outdated, &mut state, &mut constraints, &mut params, 1e-6, 100);

        assert!(converged);
        assert!((params.get(x).unwrap().value.abs() - 3.0).abs() < 1e-4);
    }
}
