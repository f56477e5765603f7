//! End-to-end sketch scenarios exercising the public `Sketch` surface.

mod common;

use geosolve::constraint::ConstraintDef;
use geosolve::{ConstraintKind, Expr, Sketch};
use rstest::rstest;

const TOLERANCE: f64 = 1e-6;
const MAX_STEPS: u32 = 200;

/// Two points P=(0,0), Q=(3,4) tied together by Q.x - P.x = 0 and
/// Q.y - P.y = 0. Minimum-norm Gauss-Newton splits the correction evenly
/// along the Jacobian row-space, landing both points at the midpoint.
#[test]
fn point_coincidence() {
    common::init_tracing();
    let mut sk = Sketch::init(4, 0, 2);
    let px = sk.add_parameter(0.0);
    let py = sk.add_parameter(0.0);
    let qx = sk.add_parameter(3.0);
    let qy = sk.add_parameter(4.0);

    sk.add_constraint(ConstraintDef::new(
        Expr::sub(Expr::param(qx), Expr::param(px)),
        ConstraintKind(0),
    ));
    sk.add_constraint(ConstraintDef::new(
        Expr::sub(Expr::param(qy), Expr::param(py)),
        ConstraintKind(0),
    ));

    assert!(sk.solve(TOLERANCE, MAX_STEPS));

    let px_v = sk.get_parameter_const(px).unwrap().value;
    let py_v = sk.get_parameter_const(py).unwrap().value;
    let qx_v = sk.get_parameter_const(qx).unwrap().value;
    let qy_v = sk.get_parameter_const(qy).unwrap().value;

    assert!((px_v + qx_v - 3.0).abs() < TOLERANCE.sqrt());
    assert!((py_v + qy_v - 4.0).abs() < TOLERANCE.sqrt());
    assert!((px_v - 1.5).abs() < 1e-3);
    assert!((py_v - 2.0).abs() < 1e-3);
}

/// P=(0,0), Q=(1,2), constraint Q.y - P.y = 0: both y's converge to 1.0,
/// x's are left untouched since no constraint references them.
#[test]
fn horizontal_line() {
    common::init_tracing();
    let mut sk = Sketch::init(4, 0, 1);
    let px = sk.add_parameter(0.0);
    let py = sk.add_parameter(0.0);
    let qx = sk.add_parameter(1.0);
    let qy = sk.add_parameter(2.0);

    sk.add_constraint(ConstraintDef::new(
        Expr::sub(Expr::param(qy), Expr::param(py)),
        ConstraintKind(0),
    ));

    assert!(sk.solve(TOLERANCE, MAX_STEPS));

    assert!((sk.get_parameter_const(py).unwrap().value - 1.0).abs() < TOLERANCE.sqrt());
    assert!((sk.get_parameter_const(qy).unwrap().value - 1.0).abs() < TOLERANCE.sqrt());
    assert_eq!(sk.get_parameter_const(px).unwrap().value, 0.0);
    assert_eq!(sk.get_parameter_const(qx).unwrap().value, 1.0);
}

/// P=(0,0), Q=(1,0), target distance 2: (Q.x-P.x)^2 + (Q.y-P.y)^2 - 4 = 0.
#[test]
fn point_to_point_distance() {
    common::init_tracing();
    let mut sk = Sketch::init(4, 0, 1);
    let px = sk.add_parameter(0.0);
    let py = sk.add_parameter(0.0);
    let qx = sk.add_parameter(1.0);
    let qy = sk.add_parameter(0.0);

    let dx = Expr::sub(Expr::param(qx), Expr::param(px));
    let dy = Expr::sub(Expr::param(qy), Expr::param(py));
    let eq = Expr::sub(
        Expr::add(Expr::sqr(dx), Expr::sqr(dy)),
        Expr::constant(4.0),
    );
    sk.add_constraint(ConstraintDef::new(eq, ConstraintKind(0)));

    assert!(sk.solve(TOLERANCE, MAX_STEPS));

    let px_v = sk.get_parameter_const(px).unwrap().value;
    let py_v = sk.get_parameter_const(py).unwrap().value;
    let qx_v = sk.get_parameter_const(qx).unwrap().value;
    let qy_v = sk.get_parameter_const(qy).unwrap().value;
    let dist = ((qx_v - px_v).powi(2) + (qy_v - py_v).powi(2)).sqrt();
    assert!((dist - 2.0).abs() < TOLERANCE.sqrt());
}

/// One free parameter, no constraints: `solve` returns true immediately.
#[test]
fn vacuous_solve() {
    common::init_tracing();
    let mut sk = Sketch::init(1, 0, 0);
    let p = sk.add_parameter(42.0);
    assert!(sk.solve(TOLERANCE, 5));
    assert_eq!(sk.get_parameter_const(p).unwrap().value, 42.0);
}

/// `p^2 + 1 = 0` has no real root; solve exhausts its step budget and
/// reports non-convergence, leaving `p` at whatever the last iterate
/// produced (no revert-on-failure).
#[test]
fn non_convergence_reports_false() {
    common::init_tracing();
    let mut sk = Sketch::init(1, 0, 1);
    let p = sk.add_parameter(0.0);
    let eq = Expr::add(Expr::sqr(Expr::param(p)), Expr::constant(1.0));
    sk.add_constraint(ConstraintDef::new(eq, ConstraintKind(0)));

    assert!(!sk.solve(TOLERANCE, 10));
}

/// Deleting a parameter invalidates its handle; a handle later produced for
/// the reused slot carries a different generation and is not equal to it.
#[test]
fn stale_handle_after_delete() {
    common::init_tracing();
    let mut sk = Sketch::init(1, 0, 0);
    let p1 = sk.add_parameter(1.0);
    assert!(sk.delete_parameter(p1));
    assert!(sk.get_parameter_const(p1).is_none());

    let p2 = sk.add_parameter(2.0);
    assert_ne!(p1, p2);
    assert_eq!(sk.get_parameter_const(p2).unwrap().value, 2.0);
}

/// Solver idempotence: if every residual already sits below tolerance,
/// `solve` reports convergence without perturbing any parameter.
#[rstest]
#[case(0.0)]
#[case(5.0)]
#[case(-3.5)]
fn solver_is_idempotent_on_converged_input(#[case] target: f64) {
    common::init_tracing();
    let mut sk = Sketch::init(1, 0, 1);
    let p = sk.add_parameter(target);
    let eq = Expr::sub(Expr::param(p), Expr::constant(target));
    sk.add_constraint(ConstraintDef::new(eq, ConstraintKind(0)));

    assert!(sk.solve(TOLERANCE, 50));
    assert_eq!(sk.get_parameter_const(p).unwrap().value, target);
}
