//! Internal invariant violations (spec §7 "Internal invariant violation:
//! fatal; abort the process").
//!
//! None of these ever surface through the public `Sketch` API — every
//! public operation returns a sentinel handle, `Option`, or `bool` (spec
//! §7). They exist only so the handful of "this is structurally
//! impossible unless a caller broke a documented invariant" panics carry a
//! named shape instead of an ad-hoc format string, matching the teacher's
//! idiom of naming error variants (see `LinearSolverError` in the
//! teacher's `src/linalg/solver.rs`) rather than inlining `panic!("...")`.

use derive_more::{Display, Error};

use crate::handle::Handle;

#[derive(Debug, Display, Error)]
pub enum CoreInvariantViolation {
    /// An `ExtParam` node was evaluated via [`crate::expr::Expr::evaluate`]
    /// instead of [`crate::expr::Expr::evaluate_with`] — i.e. a derivative
    /// tree was handed to the plain, single-arena evaluator. Every call
    /// site in this crate routes derivative trees through `evaluate_with`;
    /// reaching this means that invariant was broken by new code.
    #[display("ExtParam node evaluated without its source equation arena")]
    ExtParamWithoutEquation,

    /// A handle recorded as "live" in [`crate::linker::LinkState`] no
    /// longer resolves in its table. The linker and solver never delete a
    /// constraint or parameter mid-solve (spec §5 "not re-entrant"), so
    /// this can only mean the compact working arrays and the table they
    /// index have drifted out of sync.
    #[display("handle (index {index}, generation {generation}) recorded as live no longer resolves")]
    StaleLiveHandle { index: u16, generation: u32 },
}

/// Panics with [`CoreInvariantViolation::ExtParamWithoutEquation`].
pub fn ext_param_without_equation() -> ! {
    panic!("{}", CoreInvariantViolation::ExtParamWithoutEquation)
}

/// Panics with [`CoreInvariantViolation::StaleLiveHandle`] naming `handle`.
pub fn stale_live_handle<Tag>(handle: Handle<Tag>) -> ! {
    panic!(
        "{}",
        CoreInvariantViolation::StaleLiveHandle {
            index: handle.index,
            generation: handle.generation,
        }
    )
}
