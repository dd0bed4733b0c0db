// Algebraic nodes: constants, decision variables and compound expressions.
//
// Every operator application produces a new node carrying two things: a
// native handle (a linear form over engine-issued variable ids, or a
// normalized relation for comparisons) and a human-readable formula string.
// The formula has no effect on solving; it exists for diagnostics and export.

use std::fmt;
use std::sync::Arc;

use super::errors::{ModelError, Result};
use super::value_objects::{Backend, BinOp, RelOp};

/// Engine-issued identifier of a decision variable.
///
/// Ids are created by exactly one backend at variable construction and are
/// meaningless to any other backend or model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Linear form over engine variables: `sum(coeff_i * var_i) + constant`.
#[derive(Debug, Clone, Default)]
pub(crate) struct LinExpr {
    pub(crate) terms: Vec<(VarId, f64)>,
    pub(crate) constant: f64,
}

impl LinExpr {
    pub(crate) fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub(crate) fn variable(id: VarId) -> Self {
        Self {
            terms: vec![(id, 1.0)],
            constant: 0.0,
        }
    }

    pub(crate) fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    fn push_term(&mut self, id: VarId, coeff: f64) {
        if let Some(entry) = self.terms.iter_mut().find(|(v, _)| *v == id) {
            entry.1 += coeff;
        } else {
            self.terms.push((id, coeff));
        }
    }

    pub(crate) fn add(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.constant += other.constant;
        for &(id, c) in &other.terms {
            out.push_term(id, c);
        }
        out
    }

    pub(crate) fn sub(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.constant -= other.constant;
        for &(id, c) in &other.terms {
            out.push_term(id, -c);
        }
        out
    }

    pub(crate) fn scale(&self, factor: f64) -> Self {
        Self {
            terms: self.terms.iter().map(|&(id, c)| (id, c * factor)).collect(),
            constant: self.constant * factor,
        }
    }

    /// Evaluate the form under a dense value assignment indexed by `VarId`.
    pub(crate) fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(id, c)| c * values.get(id.index()).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

/// Normalized relational handle: `expr ⋈ 0`.
#[derive(Debug, Clone)]
pub(crate) struct Relation {
    pub(crate) expr: LinExpr,
    pub(crate) op: RelOp,
}

impl Relation {
    /// Folds a relation with no variable terms into a boolean.
    pub(crate) fn literal(&self) -> Option<bool> {
        if !self.expr.is_constant() {
            return None;
        }
        let c = self.expr.constant;
        Some(match self.op {
            RelOp::Eq => c == 0.0,
            RelOp::Geq => c >= 0.0,
            RelOp::Leq => c <= 0.0,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Handle {
    Expr(LinExpr),
    Relation(Relation),
}

/// Identity of the model that created a node's native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Origin {
    pub(crate) backend: Backend,
    pub(crate) model: u64,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} model #{}", self.backend, self.model)
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Constant(f64),
    Variable { lb: f64, ub: f64, integer: bool },
    Int { lb: i64, ub: i64 },
    Bool,
    Expr { op: BinOp, left: Node, right: Node },
}

#[derive(Debug)]
struct NodeInner {
    origin: Option<Origin>,
    kind: NodeKind,
    formula: String,
    handle: Handle,
}

/// A constant, decision variable or compound expression.
///
/// Nodes are cheap to clone and immutable; combining two nodes never mutates
/// either operand.
#[derive(Debug, Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

/// Builds a standalone constant node, e.g. for `constant(0.0).sub(&x)`.
pub fn constant(value: f64) -> Node {
    Node {
        inner: Arc::new(NodeInner {
            origin: None,
            kind: NodeKind::Constant(value),
            formula: format!("{}", value),
            handle: Handle::Expr(LinExpr::constant(value)),
        }),
    }
}

impl Node {
    pub(crate) fn variable(
        origin: Origin,
        id: VarId,
        lb: f64,
        ub: f64,
        integer: bool,
        name: String,
    ) -> Node {
        Node {
            inner: Arc::new(NodeInner {
                origin: Some(origin),
                kind: NodeKind::Variable { lb, ub, integer },
                formula: name,
                handle: Handle::Expr(LinExpr::variable(id)),
            }),
        }
    }

    pub(crate) fn int_var(origin: Origin, id: VarId, lb: i64, ub: i64, name: String) -> Node {
        Node {
            inner: Arc::new(NodeInner {
                origin: Some(origin),
                kind: NodeKind::Int { lb, ub },
                formula: name,
                handle: Handle::Expr(LinExpr::variable(id)),
            }),
        }
    }

    pub(crate) fn bool_var(origin: Origin, id: VarId, name: String) -> Node {
        Node {
            inner: Arc::new(NodeInner {
                origin: Some(origin),
                kind: NodeKind::Bool,
                formula: name,
                handle: Handle::Expr(LinExpr::variable(id)),
            }),
        }
    }

    /// Display name of a variable, or the composed formula of an expression.
    pub fn name(&self) -> &str {
        &self.inner.formula
    }

    /// Textual rendering of the node, built bottom-up with identity
    /// elimination and precedence-preserving parenthesization.
    pub fn formula(&self) -> &str {
        &self.inner.formula
    }

    pub(crate) fn origin(&self) -> Option<Origin> {
        self.inner.origin
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    /// Engine id when the node is a single decision variable.
    pub(crate) fn var_id(&self) -> Option<VarId> {
        match self.inner.kind {
            NodeKind::Variable { .. } | NodeKind::Int { .. } | NodeKind::Bool => {
                match &self.inner.handle {
                    Handle::Expr(e) => e.terms.first().map(|&(id, _)| id),
                    Handle::Relation(_) => None,
                }
            }
            _ => None,
        }
    }

    pub(crate) fn relation(&self) -> Option<&Relation> {
        match &self.inner.handle {
            Handle::Relation(rel) => Some(rel),
            Handle::Expr(_) => None,
        }
    }

    pub(crate) fn linear(&self) -> Option<&LinExpr> {
        match &self.inner.handle {
            Handle::Expr(e) => Some(e),
            Handle::Relation(_) => None,
        }
    }

    /// True for variable kinds whose solution value is rounded to an integer.
    pub fn is_integer_kind(&self) -> bool {
        match self.inner.kind {
            NodeKind::Int { .. } | NodeKind::Bool => true,
            NodeKind::Variable { integer, .. } => integer,
            _ => false,
        }
    }

    pub(crate) fn is_decision_var(&self) -> bool {
        matches!(
            self.inner.kind,
            NodeKind::Variable { .. } | NodeKind::Int { .. } | NodeKind::Bool
        )
    }

    fn is_zero_constant(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Constant(v) if v == 0.0)
    }

    fn is_compound(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Expr { .. })
    }

    pub fn add(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Add)
    }

    pub fn sub(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Sub)
    }

    pub fn mul(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Mul)
    }

    pub fn div(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Div)
    }

    pub fn eq(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Eq)
    }

    pub fn geq(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Geq)
    }

    pub fn leq(&self, rhs: impl IntoNode) -> Result<Node> {
        compose(self, &rhs.into_node(), BinOp::Leq)
    }

    /// Strict `<` has no sound encoding in the supported engines.
    pub fn lt(&self, _rhs: impl IntoNode) -> Result<Node> {
        Err(ModelError::UnsupportedOperator("<"))
    }

    /// Strict `>` has no sound encoding in the supported engines.
    pub fn gt(&self, _rhs: impl IntoNode) -> Result<Node> {
        Err(ModelError::UnsupportedOperator(">"))
    }

    /// `!=` has no sound encoding in the supported engines.
    pub fn neq(&self, _rhs: impl IntoNode) -> Result<Node> {
        Err(ModelError::UnsupportedOperator("!="))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = |f: &mut fmt::Formatter<'_>| match self.inner.origin {
            Some(origin) => write!(f, "{}", origin.backend),
            None => write!(f, "unbound"),
        };
        match &self.inner.kind {
            NodeKind::Constant(_) => write!(f, "{}", self.inner.formula),
            NodeKind::Variable { lb, ub, integer } => {
                let kind = if *integer { "Integer" } else { "Continuous" };
                write!(
                    f,
                    "< anymip.{}Var \"{}\" (lb = {}, ub = {}, backend = ",
                    kind, self.inner.formula, lb, ub
                )?;
                backend(f)?;
                write!(f, ") >")
            }
            NodeKind::Int { lb, ub } => {
                write!(
                    f,
                    "< anymip.IntegerVar \"{}\" (lb = {}, ub = {}, backend = ",
                    self.inner.formula, lb, ub
                )?;
                backend(f)?;
                write!(f, ") >")
            }
            NodeKind::Bool => {
                write!(f, "< anymip.BoolVar \"{}\" (backend = ", self.inner.formula)?;
                backend(f)?;
                write!(f, ") >")
            }
            NodeKind::Expr { .. } => {
                write!(f, "< anymip.Expression \"{}\" (backend = ", self.inner.formula)?;
                backend(f)?;
                write!(f, ") >")
            }
        }
    }
}

/// Promotion of numeric literals to constant nodes.
pub trait IntoNode {
    fn into_node(self) -> Node;
}

impl IntoNode for Node {
    fn into_node(self) -> Node {
        self
    }
}

impl IntoNode for &Node {
    fn into_node(self) -> Node {
        self.clone()
    }
}

impl IntoNode for f64 {
    fn into_node(self) -> Node {
        constant(self)
    }
}

impl IntoNode for i64 {
    fn into_node(self) -> Node {
        constant(self as f64)
    }
}

impl IntoNode for i32 {
    fn into_node(self) -> Node {
        constant(self as f64)
    }
}

fn merged_origin(left: &Node, right: &Node) -> Result<Option<Origin>> {
    match (left.origin(), right.origin()) {
        (Some(a), Some(b)) if a != b => Err(ModelError::BackendMismatch {
            expected: a.to_string(),
            found: b.to_string(),
        }),
        (Some(a), _) => Ok(Some(a)),
        (_, b) => Ok(b),
    }
}

fn operand(node: &Node) -> Result<&LinExpr> {
    node.linear()
        .ok_or_else(|| ModelError::RelationalOperand(node.formula().to_string()))
}

fn render(left: &Node, right: &Node, op: BinOp) -> String {
    let l = left.formula();
    let r = right.formula();
    match op {
        BinOp::Add => {
            if left.is_zero_constant() {
                r.to_string()
            } else if right.is_zero_constant() {
                l.to_string()
            } else {
                format!("{} + {}", l, r)
            }
        }
        BinOp::Sub => {
            if right.is_zero_constant() {
                l.to_string()
            } else if left.is_zero_constant() {
                format!("-{}", r)
            } else {
                format!("{} - {}", l, r)
            }
        }
        // Sub-expressions are parenthesized under `*` so the printed form
        // keeps operator precedence; pure variables and constants print bare.
        BinOp::Mul => {
            let lp = if left.is_compound() {
                format!("({})", l)
            } else {
                l.to_string()
            };
            let rp = if right.is_compound() {
                format!("({})", r)
            } else {
                r.to_string()
            };
            format!("{} * {}", lp, rp)
        }
        BinOp::Div => format!("({}) / ({})", l, r),
        rel => format!("{} {} {}", l, rel.symbol(), r),
    }
}

/// Composes two nodes under `op` into a fresh expression node.
///
/// The native handle of the result is a pure function of the operand handles;
/// no backend call happens here.
fn compose(left: &Node, right: &Node, op: BinOp) -> Result<Node> {
    let origin = merged_origin(left, right)?;
    let lf = operand(left)?;
    let rf = operand(right)?;

    let handle = match op {
        BinOp::Add => Handle::Expr(lf.add(rf)),
        BinOp::Sub => Handle::Expr(lf.sub(rf)),
        BinOp::Mul => {
            if rf.is_constant() {
                Handle::Expr(lf.scale(rf.constant))
            } else if lf.is_constant() {
                Handle::Expr(rf.scale(lf.constant))
            } else {
                return Err(ModelError::NonlinearTerm(format!(
                    "`{}` * `{}` multiplies two variable expressions",
                    left.formula(),
                    right.formula()
                )));
            }
        }
        BinOp::Div => {
            if rf.is_constant() {
                // No division-by-zero check here: a zero divisor yields
                // non-finite coefficients that the engine rejects at solve.
                Handle::Expr(lf.scale(1.0 / rf.constant))
            } else {
                return Err(ModelError::NonlinearTerm(format!(
                    "`{}` / `{}` divides by a variable expression",
                    left.formula(),
                    right.formula()
                )));
            }
        }
        BinOp::Eq => Handle::Relation(Relation {
            expr: lf.sub(rf),
            op: RelOp::Eq,
        }),
        BinOp::Geq => Handle::Relation(Relation {
            expr: lf.sub(rf),
            op: RelOp::Geq,
        }),
        BinOp::Leq => Handle::Relation(Relation {
            expr: lf.sub(rf),
            op: RelOp::Leq,
        }),
    };

    Ok(Node {
        inner: Arc::new(NodeInner {
            origin,
            kind: NodeKind::Expr {
                op,
                left: left.clone(),
                right: right.clone(),
            },
            formula: render(left, right, op),
            handle,
        }),
    })
}
