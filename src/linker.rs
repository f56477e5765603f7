//! Relink bookkeeping: (re)builds derivative trees and the compact working
//! arrays whenever the live constraint/parameter set has changed since the
//! last solve (spec §4.4). Grounded on `ffSketch_tryRelink` in
//! `original_source/freeform_impl.c`.

use tracing::debug;

use crate::constraint::{Constraint, ConstraintHandle};
use crate::handle::{ConstraintTag, ParamTag};
use crate::param::{ParamHandle, Parameter};
use crate::slotmap::SlotTable;

/// Scratch state owned by the sketch and rebuilt by [`relink`]. Allocated
/// once per relink and left untouched for the remainder of a solve — the
/// solver writes into `normal_matrix`/`intermediate_solution` in place.
#[derive(Default)]
pub struct LinkState {
    pub live_constraints: Vec<ConstraintHandle>,
    pub live_params: Vec<ParamHandle>,
    /// Column-major, leading dimension `live_constraints.len()`.
    pub normal_matrix: Vec<f64>,
    pub intermediate_solution: Vec<f64>,
    pub cached_params: Vec<f64>,
}

impl LinkState {
    /// Releases every constraint's derivative state, then this table's own
    /// scratch buffers, without touching `link_outdated` (spec §4.3
    /// `free_to_base_state`).
    pub fn free_to_base_state(&mut self, constraints: &mut SlotTable<ConstraintTag, Constraint>) {
        constraints.for_each_live_mut(|_, cons| cons.clear_derivative_state());
        self.live_constraints.clear();
        self.live_params.clear();
        self.normal_matrix.clear();
        self.intermediate_solution.clear();
        self.cached_params.clear();
    }
}

/// Rebuilds `state` from scratch against the current live constraint/
/// parameter sets. Caller is responsible for clearing `link_outdated`
/// afterward (kept on `Sketch` rather than here, since the flag is not part
/// of this scratch state).
pub fn relink(
    state: &mut LinkState,
    constraints: &mut SlotTable<ConstraintTag, Constraint>,
    params: &SlotTable<ParamTag, Parameter>,
) {
    state.free_to_base_state(constraints);

    let live_param_handles: Vec<ParamHandle> = {
        let mut handles = Vec::new();
        params.for_each_live(|h, _| handles.push(h));
        handles
    };
    let rows;
    let cols = live_param_handles.len();

    let mut live_constraint_handles = Vec::new();
    constraints.for_each_live_mut(|h, cons| {
        live_constraint_handles.push(h);
        cons.derivs.reserve(cols);
        cons.deriv_values.reserve(cols);
        for &param_h in &live_param_handles {
            cons.derivs.push(cons.def.equation.derive(param_h, true));
            cons.deriv_values.push(0.0);
        }
    });
    rows = live_constraint_handles.len();

    state.live_constraints = live_constraint_handles;
    state.live_params = live_param_handles;
    state.normal_matrix = vec![0.0; rows * rows];
    state.intermediate_solution = vec![0.0; rows];
    state.cached_params = vec![0.0; cols];

    debug!(constraints = rows, params = cols, "relink complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintDef, ConstraintKind};
    use crate::expr::Expr;
    use crate::handle::{ConstraintTag, ParamTag};

    #[test]
    fn relink_builds_one_derivative_per_live_parameter() {
        crate::test_support::init_tracing();
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(4);
        let p1 = params.create(Parameter::new(1.0));
        let p2 = params.create(Parameter::new(2.0));

        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(4);
        let def = ConstraintDef::new(Expr::sub(Expr::param(p1), Expr::param(p2)), ConstraintKind(0));
        let c1 = constraints.create(Constraint::new(def));

        let mut state = LinkState::default();
        relink(&mut state, &mut constraints, &params);

        assert_eq!(state.live_constraints, vec![c1]);
        assert_eq!(state.live_params.len(), 2);
        assert_eq!(constraints.get(c1).unwrap().derivs.len(), 2);
        assert_eq!(state.normal_matrix.len(), 1);
        assert_eq!(state.intermediate_solution.len(), 1);
        assert_eq!(state.cached_params.len(), 2);
    }

    #[test]
    fn relink_skips_dead_constraints_and_params() {
        crate::test_support::init_tracing();
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(4);
        let p1 = params.create(Parameter::new(1.0));
        let p2 = params.create(Parameter::new(2.0));
        params.destroy(p2);

        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(4);
        let def1 = ConstraintDef::new(Expr::param(p1), ConstraintKind(0));
        let c1 = constraints.create(Constraint::new(def1));
        let def2 = ConstraintDef::new(Expr::param(p1), ConstraintKind(0));
        let c2 = constraints.create(Constraint::new(def2));
        constraints.destroy(c2);

        let mut state = LinkState::default();
        relink(&mut state, &mut constraints, &params);

        assert_eq!(state.live_constraints, vec![c1]);
        assert_eq!(state.live_params, vec![p1]);
    }

    #[test]
    fn free_to_base_state_clears_derivative_state() {
        crate::test_support::init_tracing();
        let mut params: SlotTable<ParamTag, Parameter> = SlotTable::init(2);
        let p1 = params.create(Parameter::new(1.0));

        let mut constraints: SlotTable<ConstraintTag, Constraint> = SlotTable::init(2);
        let def = ConstraintDef::new(Expr::param(p1), ConstraintKind(0));
        let c1 = constraints.create(Constraint::new(def));

        let mut state = LinkState::default();
        relink(&mut state, &mut constraints, &params);
        assert!(!constraints.get(c1).unwrap().derivs.is_empty());

        state.free_to_base_state(&mut constraints);
        assert!(constraints.get(c1).unwrap().derivs.is_empty());
        assert!(state.live_constraints.is_empty());
        assert!(state.normal_matrix.is_empty());
    }
}
