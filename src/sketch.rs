//! `Sketch`: owns the three slot tables and the solver's scratch state, and
//! is the sole entry point collaborators use (spec §4.3, §6). Grounded on
//! the `ffSketch_*` family in `original_source/freeform_impl.c`.

use crate::constraint::{is_valid as constraint_is_valid, Constraint, ConstraintDef, ConstraintHandle};
use crate::entity::{is_valid as entity_is_valid, Entity, EntityHandle, EntityKind};
use crate::handle::{ConstraintTag, EntityTag, Handle, ParamTag};
use crate::linker::LinkState;
use crate::param::{ParamHandle, Parameter};
use crate::slotmap::SlotTable;
use crate::solver;

/// The constraint solver core. Owns every parameter, entity, and
/// constraint it is handed, plus the scratch state the linker and solver
/// share.
pub struct Sketch {
    params: SlotTable<ParamTag, Parameter>,
    entities: SlotTable<EntityTag, Entity>,
    constraints: SlotTable<ConstraintTag, Constraint>,
    link_state: LinkState,
    link_outdated: bool,
}

impl Sketch {
    /// Allocates the three tables with the given initial capacities
    /// (spec §6 "Sketch operations").
    pub fn init(param_capacity: usize, entity_capacity: usize, constraint_capacity: usize) -> Self {
        Sketch {
            params: SlotTable::init(param_capacity),
            entities: SlotTable::init(entity_capacity),
            constraints: SlotTable::init(constraint_capacity),
            link_state: LinkState::default(),
            link_outdated: true,
        }
    }

    /// Releases every constraint's derivative state and the solver scratch
    /// buffers without touching the tables themselves (spec §4.3).
    pub fn free_to_base_state(&mut self) {
        self.link_state.free_to_base_state(&mut self.constraints);
    }

    // --- Parameters -------------------------------------------------------

    pub fn add_parameter(&mut self, value: f64) -> ParamHandle {
        let handle = self.params.create(Parameter::new(value));
        self.link_outdated = true;
        handle
    }

    pub fn delete_parameter(&mut self, handle: ParamHandle) -> bool {
        let deleted = self.params.destroy(handle);
        if deleted {
            self.link_outdated = true;
        }
        deleted
    }

    pub fn get_parameter(&mut self, handle: ParamHandle) -> Option<&mut Parameter> {
        self.params.get_mut(handle)
    }

    pub fn get_parameter_const(&self, handle: ParamHandle) -> Option<&Parameter> {
        self.params.get(handle)
    }

    // --- Entities -----------------------------------------------------------

    /// Validates `kind` (spec §3 supplement — required Point references
    /// must be alive Points) and, if valid, inserts it. Returns
    /// `EntityHandle::INVALID` on rejection.
    pub fn add_entity(&mut self, kind: EntityKind) -> EntityHandle {
        if !entity_is_valid(&kind, &self.entities) {
            return EntityHandle::INVALID;
        }
        let handle = self.entities.create(Entity { kind });
        self.link_outdated = true;
        handle
    }

    pub fn delete_entity(&mut self, handle: EntityHandle) -> bool {
        let deleted = self.entities.destroy(handle);
        if deleted {
            self.link_outdated = true;
        }
        deleted
    }

    pub fn get_entity(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.entities.get_mut(handle)
    }

    pub fn get_entity_const(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(handle)
    }

    // --- Constraints --------------------------------------------------------

    /// Validates `def` and, if valid, inserts it. Returns
    /// `ConstraintHandle::INVALID` on rejection.
    pub fn add_constraint(&mut self, def: ConstraintDef) -> ConstraintHandle {
        if !constraint_is_valid(&def) {
            return ConstraintHandle::INVALID;
        }
        let handle = self.constraints.create(Constraint::new(def));
        self.link_outdated = true;
        handle
    }

    pub fn delete_constraint(&mut self, handle: ConstraintHandle) -> bool {
        let deleted = self.constraints.destroy(handle);
        if deleted {
            self.link_outdated = true;
        }
        deleted
    }

    pub fn get_constraint(&mut self, handle: ConstraintHandle) -> Option<&mut Constraint> {
        self.constraints.get_mut(handle)
    }

    pub fn get_constraint_const(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    // --- Solving --------------------------------------------------------------

    /// Relinks if needed, then runs Gauss–Newton steps until every
    /// constraint residual is within `tolerance` or `max_steps` is
    /// exhausted (spec §4.5).
    pub fn solve(&mut self, tolerance: f64, max_steps: u32) -> bool {
        solver::solve(
            &mut self.link_outdated,
            &mut self.link_state,
            &mut self.constraints,
            &mut self.params,
            tolerance,
            max_steps,
        )
    }

    pub fn link_outdated(&self) -> bool {
        self.link_outdated
    }
}

/// Structural equality of two handles sharing a flavor, exposed for
/// collaborators that only have type-erased handle bits (spec §6 "Handle
/// equality").
pub fn handles_equal<Tag>(a: Handle<Tag>, b: Handle<Tag>) -> bool {
    a == b
}
