//! Symbolic expression DAG: construction, evaluation, and symbolic
//! differentiation (spec §4.1).
//!
//! An [`Expr`] is its own small arena (`Vec<ExprNode>`) plus a `root` id.
//! Building an equation (`Expr::add`, `Expr::sin`, ...) merges the operand
//! arenas into one. [`Expr::derive`] instead builds a *fresh*, separate
//! arena: any node it needs to reuse from the differentiated expression is
//! referenced through an [`ExprNode::ExtParam`] node holding an [`ExprId`]
//! that indexes into the *original* expression's arena, never copied or
//! re-owned. Dropping a derivative `Expr` therefore only ever drops its own
//! `Vec<ExprNode>` — the equation it was derived from is untouched, because
//! the derivative arena never holds anything but a plain index into it.

use crate::param::{ParamHandle, Parameter};
use crate::slotmap::SlotTable;

/// Index of a node within one [`Expr`]'s arena.
///
/// An `ExprId` is only meaningful relative to the arena it was produced by.
/// `ExprNode::ExtParam` is the one case where an `ExprId` found in one
/// arena (a derivative tree) is meant to be resolved against a *different*
/// arena (the expression it was derived from) — see [`Expr::evaluate_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprId(u32);

/// One node of an expression tree (spec §3 "Expression node").
#[derive(Debug, Clone, Copy)]
pub enum ExprNode {
    Const(f64),
    Param(ParamHandle),
    /// Non-owning reference to a node in a *different* arena — see the
    /// module doc comment. Evaluating this node delegates to that arena.
    ExtParam(ExprId),
    Add(ExprId, ExprId),
    Sub(ExprId, ExprId),
    Mul(ExprId, ExprId),
    Div(ExprId, ExprId),
    Sin(ExprId),
    Cos(ExprId),
    Asin(ExprId),
    Acos(ExprId),
    Sqrt(ExprId),
    Sqr(ExprId),
}

impl ExprNode {
    /// Shifts every `ExprId` held by this node by `offset`. Used when
    /// merging two arenas together (spec §4.1 "Construction").
    fn shifted(self, offset: u32) -> Self {
        let s = |id: ExprId| ExprId(id.0 + offset);
        match self {
            ExprNode::Const(v) => ExprNode::Const(v),
            ExprNode::Param(h) => ExprNode::Param(h),
            ExprNode::ExtParam(id) => ExprNode::ExtParam(s(id)),
            ExprNode::Add(a, b) => ExprNode::Add(s(a), s(b)),
            ExprNode::Sub(a, b) => ExprNode::Sub(s(a), s(b)),
            ExprNode::Mul(a, b) => ExprNode::Mul(s(a), s(b)),
            ExprNode::Div(a, b) => ExprNode::Div(s(a), s(b)),
            ExprNode::Sin(a) => ExprNode::Sin(s(a)),
            ExprNode::Cos(a) => ExprNode::Cos(s(a)),
            ExprNode::Asin(a) => ExprNode::Asin(s(a)),
            ExprNode::Acos(a) => ExprNode::Acos(s(a)),
            ExprNode::Sqrt(a) => ExprNode::Sqrt(s(a)),
            ExprNode::Sqr(a) => ExprNode::Sqr(s(a)),
        }
    }
}

/// An owned expression tree: a small arena plus the id of its root node.
///
/// No de-duplication or hash-consing is performed; every factory call
/// allocates fresh nodes (spec §4.1 "Construction").
#[derive(Debug, Clone)]
pub struct Expr {
    nodes: Vec<ExprNode>,
    root: ExprId,
}

impl Expr {
    fn leaf(node: ExprNode) -> Self {
        Expr {
            nodes: vec![node],
            root: ExprId(0),
        }
    }

    fn push(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn merge_unary(mut a: Expr, make: impl FnOnce(ExprId) -> ExprNode) -> Expr {
        let root = a.root;
        let new_root = a.push(make(root));
        a.root = new_root;
        a
    }

    fn merge_binary(mut a: Expr, b: Expr, make: impl FnOnce(ExprId, ExprId) -> ExprNode) -> Expr {
        let offset = a.nodes.len() as u32;
        let a_root = a.root;
        a.nodes.extend(b.nodes.into_iter().map(|n| n.shifted(offset)));
        let b_root = ExprId(b.root.0 + offset);
        let new_root = a.push(make(a_root, b_root));
        a.root = new_root;
        a
    }

    // --- Construction (spec §4.1 "Construction") ------------------------

    pub fn constant(value: f64) -> Self {
        Expr::leaf(ExprNode::Const(value))
    }

    pub fn param(handle: ParamHandle) -> Self {
        Expr::leaf(ExprNode::Param(handle))
    }

    pub fn add(a: Expr, b: Expr) -> Self {
        Expr::merge_binary(a, b, ExprNode::Add)
    }

    pub fn sub(a: Expr, b: Expr) -> Self {
        Expr::merge_binary(a, b, ExprNode::Sub)
    }

    pub fn mul(a: Expr, b: Expr) -> Self {
        Expr::merge_binary(a, b, ExprNode::Mul)
    }

    pub fn div(a: Expr, b: Expr) -> Self {
        Expr::merge_binary(a, b, ExprNode::Div)
    }

    pub fn sin(a: Expr) -> Self {
        Expr::merge_unary(a, ExprNode::Sin)
    }

    pub fn cos(a: Expr) -> Self {
        Expr::merge_unary(a, ExprNode::Cos)
    }

    pub fn asin(a: Expr) -> Self {
        Expr::merge_unary(a, ExprNode::Asin)
    }

    pub fn acos(a: Expr) -> Self {
        Expr::merge_unary(a, ExprNode::Acos)
    }

    pub fn sqrt(a: Expr) -> Self {
        Expr::merge_unary(a, ExprNode::Sqrt)
    }

    pub fn sqr(a: Expr) -> Self {
        Expr::merge_unary(a, ExprNode::Sqr)
    }

    // --- Evaluation (spec §4.1 "Evaluation") -----------------------------

    /// Evaluates this tree. `self` must not contain any `ExtParam` node —
    /// use [`Expr::evaluate_with`] for a derivative tree.
    pub fn evaluate(&self, params: &SlotTable<crate::handle::ParamTag, Parameter>) -> f64 {
        self.eval_node(self.root, None, params)
    }

    /// Evaluates a derivative tree, resolving any `ExtParam` node against
    /// `equation` — the expression it was derived from.
    pub fn evaluate_with(
        &self,
        equation: &Expr,
        params: &SlotTable<crate::handle::ParamTag, Parameter>,
    ) -> f64 {
        self.eval_node(self.root, Some(equation), params)
    }

    fn eval_node(
        &self,
        id: ExprId,
        external: Option<&Expr>,
        params: &SlotTable<crate::handle::ParamTag, Parameter>,
    ) -> f64 {
        match self.nodes[id.0 as usize] {
            ExprNode::Const(v) => v,
            ExprNode::Param(h) => params.get(h).map(|p| p.value).unwrap_or(0.0),
            ExprNode::ExtParam(target) => {
                let equation = match external {
                    Some(equation) => equation,
                    None => crate::error::ext_param_without_equation(),
                };
                equation.eval_node(target, None, params)
            }
            ExprNode::Add(a, b) => self.eval_node(a, external, params) + self.eval_node(b, external, params),
            ExprNode::Sub(a, b) => self.eval_node(a, external, params) - self.eval_node(b, external, params),
            ExprNode::Mul(a, b) => self.eval_node(a, external, params) * self.eval_node(b, external, params),
            ExprNode::Div(a, b) => self.eval_node(a, external, params) / self.eval_node(b, external, params),
            ExprNode::Sin(a) => self.eval_node(a, external, params).sin(),
            ExprNode::Cos(a) => self.eval_node(a, external, params).cos(),
            ExprNode::Asin(a) => self.eval_node(a, external, params).asin(),
            ExprNode::Acos(a) => self.eval_node(a, external, params).acos(),
            ExprNode::Sqrt(a) => self.eval_node(a, external, params).sqrt(),
            ExprNode::Sqr(a) => {
                let v = self.eval_node(a, external, params);
                v * v
            }
        }
    }

    // --- Differentiation (spec §4.1 "Differentiation") -------------------

    /// Builds a fresh tree representing the symbolic partial derivative of
    /// `self` with respect to `wrt`.
    ///
    /// `self` must not itself contain an `ExtParam` node — this crate only
    /// ever differentiates a constraint's own equation, never a previously
    /// built derivative tree, so that invariant always holds at call sites.
    pub fn derive(&self, wrt: ParamHandle, protect: bool) -> Expr {
        let mut out = Expr {
            nodes: Vec::new(),
            root: ExprId(0),
        };
        let root = self.derive_node(self.root, wrt, protect, &mut out);
        out.root = root;
        out
    }

    /// Deep-copies the subtree at `id` into `out`'s own arena, so `out`
    /// owns an independent copy rather than a cross-arena reference.
    fn copy_subtree(&self, id: ExprId, out: &mut Expr) -> ExprId {
        match self.nodes[id.0 as usize] {
            ExprNode::Const(v) => out.push(ExprNode::Const(v)),
            ExprNode::Param(h) => out.push(ExprNode::Param(h)),
            ExprNode::ExtParam(target) => {
                let copied = self.copy_subtree(target, out);
                out.push(ExprNode::ExtParam(copied))
            }
            ExprNode::Add(a, b) => {
                let a = self.copy_subtree(a, out);
                let b = self.copy_subtree(b, out);
                out.push(ExprNode::Add(a, b))
            }
            ExprNode::Sub(a, b) => {
                let a = self.copy_subtree(a, out);
                let b = self.copy_subtree(b, out);
                out.push(ExprNode::Sub(a, b))
            }
            ExprNode::Mul(a, b) => {
                let a = self.copy_subtree(a, out);
                let b = self.copy_subtree(b, out);
                out.push(ExprNode::Mul(a, b))
            }
            ExprNode::Div(a, b) => {
                let a = self.copy_subtree(a, out);
                let b = self.copy_subtree(b, out);
                out.push(ExprNode::Div(a, b))
            }
            ExprNode::Sin(a) => {
                let a = self.copy_subtree(a, out);
                out.push(ExprNode::Sin(a))
            }
            ExprNode::Cos(a) => {
                let a = self.copy_subtree(a, out);
                out.push(ExprNode::Cos(a))
            }
            ExprNode::Asin(a) => {
                let a = self.copy_subtree(a, out);
                out.push(ExprNode::Asin(a))
            }
            ExprNode::Acos(a) => {
                let a = self.copy_subtree(a, out);
                out.push(ExprNode::Acos(a))
            }
            ExprNode::Sqrt(a) => {
                let a = self.copy_subtree(a, out);
                out.push(ExprNode::Sqrt(a))
            }
            ExprNode::Sqr(a) => {
                let a = self.copy_subtree(a, out);
                out.push(ExprNode::Sqr(a))
            }
        }
    }

    /// Produces a reference to `id` (a node of `self`) suitable for
    /// embedding in the derivative arena `out`: a borrowing `ExtParam` node
    /// when `protect`, or an owned deep copy otherwise.
    fn reused_ref(&self, id: ExprId, protect: bool, out: &mut Expr) -> ExprId {
        if protect {
            out.push(ExprNode::ExtParam(id))
        } else {
            self.copy_subtree(id, out)
        }
    }

    fn derive_node(&self, id: ExprId, wrt: ParamHandle, protect: bool, out: &mut Expr) -> ExprId {
        match self.nodes[id.0 as usize] {
            ExprNode::Const(_) => out.push(ExprNode::Const(0.0)),
            ExprNode::Param(h) => {
                let same = h == wrt;
                out.push(ExprNode::Const(if same { 1.0 } else { 0.0 }))
            }
            ExprNode::ExtParam(_) => {
                unreachable!("derive() is only ever called on a constraint's own equation arena")
            }
            ExprNode::Add(a, b) => {
                let da = self.derive_node(a, wrt, protect, out);
                let db = self.derive_node(b, wrt, protect, out);
                out.push(ExprNode::Add(da, db))
            }
            ExprNode::Sub(a, b) => {
                let da = self.derive_node(a, wrt, protect, out);
                let db = self.derive_node(b, wrt, protect, out);
                out.push(ExprNode::Sub(da, db))
            }
            ExprNode::Mul(a, b) => {
                // d(ab) = a'b + ab'
                let da = self.derive_node(a, wrt, protect, out);
                let b_ref = self.reused_ref(b, protect, out);
                let left = out.push(ExprNode::Mul(da, b_ref));
                let a_ref = self.reused_ref(a, protect, out);
                let db = self.derive_node(b, wrt, protect, out);
                let right = out.push(ExprNode::Mul(a_ref, db));
                out.push(ExprNode::Add(left, right))
            }
            ExprNode::Div(a, b) => {
                // (a'b - ab') / b^2
                let da = self.derive_node(a, wrt, protect, out);
                let b_ref1 = self.reused_ref(b, protect, out);
                let left = out.push(ExprNode::Mul(da, b_ref1));
                let a_ref = self.reused_ref(a, protect, out);
                let db = self.derive_node(b, wrt, protect, out);
                let right = out.push(ExprNode::Mul(a_ref, db));
                let numerator = out.push(ExprNode::Sub(left, right));
                let b_ref2 = self.reused_ref(b, protect, out);
                let b_ref3 = self.reused_ref(b, protect, out);
                let denominator = out.push(ExprNode::Mul(b_ref2, b_ref3));
                out.push(ExprNode::Div(numerator, denominator))
            }
            ExprNode::Sin(a) => {
                // d(sin a) = a' cos(a)
                let da = self.derive_node(a, wrt, protect, out);
                let a_ref = self.reused_ref(a, protect, out);
                let cos_a = out.push(ExprNode::Cos(a_ref));
                out.push(ExprNode::Mul(da, cos_a))
            }
            ExprNode::Cos(a) => {
                // d(cos a) = -a' sin(a)
                let a_ref = self.reused_ref(a, protect, out);
                let sin_a = out.push(ExprNode::Sin(a_ref));
                let neg_one = out.push(ExprNode::Const(-1.0));
                let neg_sin_a = out.push(ExprNode::Mul(neg_one, sin_a));
                let da = self.derive_node(a, wrt, protect, out);
                out.push(ExprNode::Mul(neg_sin_a, da))
            }
            ExprNode::Asin(a) => {
                // d(asin a) = a' / sqrt(1 - a^2)
                let da = self.derive_node(a, wrt, protect, out);
                let a_ref = self.reused_ref(a, protect, out);
                let a_sqr = out.push(ExprNode::Sqr(a_ref));
                let one = out.push(ExprNode::Const(1.0));
                let inner = out.push(ExprNode::Sub(one, a_sqr));
                let denom = out.push(ExprNode::Sqrt(inner));
                out.push(ExprNode::Div(da, denom))
            }
            ExprNode::Acos(a) => {
                // d(acos a) = -a' / sqrt(1 - a^2)
                let da = self.derive_node(a, wrt, protect, out);
                let neg_one = out.push(ExprNode::Const(-1.0));
                let neg_da = out.push(ExprNode::Mul(neg_one, da));
                let a_ref = self.reused_ref(a, protect, out);
                let a_sqr = out.push(ExprNode::Sqr(a_ref));
                let one = out.push(ExprNode::Const(1.0));
                let inner = out.push(ExprNode::Sub(one, a_sqr));
                let denom = out.push(ExprNode::Sqrt(inner));
                out.push(ExprNode::Div(neg_da, denom))
            }
            ExprNode::Sqrt(a) => {
                // d(sqrt a) = a' / (2 sqrt(a))
                let da = self.derive_node(a, wrt, protect, out);
                let a_ref = self.reused_ref(a, protect, out);
                let sqrt_a = out.push(ExprNode::Sqrt(a_ref));
                let two = out.push(ExprNode::Const(2.0));
                let denom = out.push(ExprNode::Mul(two, sqrt_a));
                out.push(ExprNode::Div(da, denom))
            }
            ExprNode::Sqr(a) => {
                // d(a^2) = 2 a a'
                let two = out.push(ExprNode::Const(2.0));
                let a_ref = self.reused_ref(a, protect, out);
                let two_a = out.push(ExprNode::Mul(two, a_ref));
                let da = self.derive_node(a, wrt, protect, out);
                out.push(ExprNode::Mul(two_a, da))
            }
        }
    }
}
