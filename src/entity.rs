//! Entity payload, handle type, and validity checks (spec §3 "Entity").

use crate::handle::{EntityTag, Handle};
use crate::param::ParamHandle;
use crate::slotmap::SlotTable;

/// Handle into the sketch's entity table.
pub type EntityHandle = Handle<EntityTag>;

/// A tagged union over the four supported geometric primitives.
///
/// None of these own the handles they reference — referencing is purely by
/// handle, resolved against the live parameter/entity tables at evaluation
/// time.
#[derive(Debug, Clone, Copy)]
pub enum EntityKind {
    Point { x: ParamHandle, y: ParamHandle },
    Line { p1: EntityHandle, p2: EntityHandle },
    Circle { center: EntityHandle, radius: ParamHandle },
    Arc {
        start: EntityHandle,
        end: EntityHandle,
        center: EntityHandle,
    },
}

impl Default for EntityKind {
    fn default() -> Self {
        EntityKind::Point {
            x: ParamHandle::INVALID,
            y: ParamHandle::INVALID,
        }
    }
}

/// The entity table payload. Currently just the definition, mirroring
/// `ff_Entity { def }` — kept as a struct rather than a bare `EntityKind` so
/// the table's payload type has room to grow without touching call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct Entity {
    pub kind: EntityKind,
}

/// Checks that `kind`'s referenced handles are alive and, for handles that
/// must name a Point, that they actually resolve to one.
///
/// This fills in what `ff_EntityDef_IsValid` left as a stub in every
/// non-Point case: a Line's endpoints, a Circle's center, and an Arc's
/// start/end/center must each be a live entity of kind `Point`.
pub fn is_valid(
    kind: &EntityKind,
    entities: &SlotTable<EntityTag, Entity>,
) -> bool {
    fn is_point(h: EntityHandle, entities: &SlotTable<EntityTag, Entity>) -> bool {
        matches!(entities.get(h), Some(Entity { kind: EntityKind::Point { .. } }))
    }

    match *kind {
        EntityKind::Point { x, y } => !x.is_invalid() && !y.is_invalid(),
        EntityKind::Line { p1, p2 } => is_point(p1, entities) && is_point(p2, entities),
        EntityKind::Circle { center, radius } => {
            is_point(center, entities) && !radius.is_invalid()
        }
        EntityKind::Arc { start, end, center } => {
            is_point(start, entities) && is_point(end, entities) && is_point(center, entities)
        }
    }
}
