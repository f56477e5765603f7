//! Core 2D parametric geometric constraint solver.
//!
//! This crate implements a symbolic expression DAG with evaluation and
//! symbolic differentiation ([`expr`]), a generational slot-table arena
//! ([`slotmap`]) backing the parameter, entity, and constraint tables
//! ([`param`], [`entity`], [`constraint`]), relink bookkeeping ([`linker`])
//! and a Gauss–Newton solver over the normal equations ([`solver`]), all
//! tied together by the [`Sketch`](sketch::Sketch) facade.
//!
//! The per-constraint equation-template library (horizontal, distance,
//! tangency, and similar named constraint kinds), any drawing/UI layer,
//! "closest element" hit-testing, and CLI/file I/O are all out of scope —
//! this crate only implements the core that those layers would be built on
//! top of.

pub mod constraint;
pub mod entity;
pub mod error;
pub mod expr;
pub mod handle;
pub mod linker;
pub mod param;
pub mod sketch;
pub mod slotmap;
pub mod solver;
#[cfg(test)]
mod test_support;

pub use constraint::{Constraint, ConstraintDef, ConstraintHandle, ConstraintKind};
pub use entity::{Entity, EntityHandle, EntityKind};
pub use error::CoreInvariantViolation;
pub use expr::{Expr, ExprId, ExprNode};
pub use handle::Handle;
pub use param::{ParamHandle, Parameter};
pub use sketch::Sketch;
