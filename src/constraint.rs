//! Constraint definition, handle type, and solver-state payload
//! (spec §3 "Constraint").

use crate::entity::EntityHandle;
use crate::expr::Expr;
use crate::handle::{ConstraintTag, Handle};
use crate::param::ParamHandle;

/// Maximum number of entity/parameter handles a constraint may reference as
/// metadata, matching `FFCONS_MAXENT`/`FFCONS_MAXPAR` in the source this was
/// distilled from.
pub const MAX_REFERENCED_ENTITIES: usize = 16;
pub const MAX_REFERENCED_PARAMS: usize = 16;

/// Handle into the sketch's constraint table.
pub type ConstraintHandle = Handle<ConstraintTag>;

/// Opaque tag identifying which equation-template produced a constraint's
/// equation. The template library itself (horizontal, distance, tangency,
/// ...) lives outside this core; the core only ever reads and solves the
/// equation it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintKind(pub u32);

/// Everything the caller supplies when adding a constraint.
///
/// `entities`/`params` are metadata for the collaborator library that built
/// `equation` — the core never reads past `entity_count`/`param_count`, and
/// never dereferences these handles itself.
pub struct ConstraintDef {
    pub equation: Expr,
    pub kind: ConstraintKind,
    pub entities: [EntityHandle; MAX_REFERENCED_ENTITIES],
    pub entity_count: usize,
    pub params: [ParamHandle; MAX_REFERENCED_PARAMS],
    pub param_count: usize,
}

impl ConstraintDef {
    pub fn new(equation: Expr, kind: ConstraintKind) -> Self {
        ConstraintDef {
            equation,
            kind,
            entities: [EntityHandle::INVALID; MAX_REFERENCED_ENTITIES],
            entity_count: 0,
            params: [ParamHandle::INVALID; MAX_REFERENCED_PARAMS],
            param_count: 0,
        }
    }

    /// Appends an entity reference, ignoring calls past
    /// [`MAX_REFERENCED_ENTITIES`] (metadata only; never consulted by the
    /// solver itself).
    pub fn with_entity(mut self, handle: EntityHandle) -> Self {
        if self.entity_count < MAX_REFERENCED_ENTITIES {
            self.entities[self.entity_count] = handle;
            self.entity_count += 1;
        }
        self
    }

    /// Appends a parameter reference, ignoring calls past
    /// [`MAX_REFERENCED_PARAMS`].
    pub fn with_param(mut self, handle: ParamHandle) -> Self {
        if self.param_count < MAX_REFERENCED_PARAMS {
            self.params[self.param_count] = handle;
            self.param_count += 1;
        }
        self
    }
}

/// Always `true`: a `ConstraintDef`'s equation is an owned `Expr` value, so
/// the one failure mode the original definition-validity check guarded
/// against (a null equation pointer) cannot occur here, and `kind` is an
/// opaque tag this core does not interpret — the equation-template library
/// that gives `kind` meaning is out of scope. Kept as a function (rather
/// than skipping the call at `Sketch::add_constraint`) so the four-table
/// validate/add pattern stays uniform with parameters and entities.
pub fn is_valid(_def: &ConstraintDef) -> bool {
    true
}

/// The constraint table payload: the caller's definition plus solver state
/// that is owned by the constraint but populated/freed only by the linker
/// (spec §4.4).
pub struct Constraint {
    pub def: ConstraintDef,
    /// Current residual, `equation.evaluate(params)` as of the last
    /// `calc_error` pass.
    pub err: f64,
    /// One derivative tree per live parameter, in the linker's table-order
    /// walk at the time of the last relink. Empty until the first relink.
    pub derivs: Vec<Expr>,
    /// `derivs[i].evaluate_with(&def.equation, params)`, refreshed once per
    /// solver step.
    pub deriv_values: Vec<f64>,
}

impl Constraint {
    pub fn new(def: ConstraintDef) -> Self {
        Constraint {
            def,
            err: 0.0,
            derivs: Vec::new(),
            deriv_values: Vec::new(),
        }
    }

    /// Drops the derivative state built by the last relink, matching the
    /// per-constraint portion of `free_to_base_state` (spec §4.3).
    pub fn clear_derivative_state(&mut self) {
        self.derivs.clear();
        self.deriv_values.clear();
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::new(ConstraintDef::new(Expr::constant(0.0), ConstraintKind::default()))
    }
}
