// Model facade: owns one backend engine for its lifetime and exposes
// variable creation, constraint registration, objective assembly, solve
// dispatch and solution retrieval.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{
    Backend, IntoNode, LinExpr, ModelError, Node, NodeKind, Origin, Result, Status, VarId,
};
use crate::solver::engine::{canonical_status, Outcome, SolveEngine, SolveRequest, VarDef};
use crate::solver::factory::create_engine;

/// Prefix of the synthetic boolean wrapped around each constraint when
/// infeasibility diagnosis is enabled.
const ASSUMPTION_PREFIX: &str = "_ASSUMPTION_";

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Configuration for the model facade.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub backend: Backend,
    /// Solve budget handed to the engine; zero means unlimited.
    pub time_limit: Duration,
    /// Wrap constraints with assumption literals for conflict extraction.
    pub compute_iis: bool,
    pub verbose: bool,
    pub export_path: Option<PathBuf>,
    pub problem_name: String,
}

impl SolverConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            time_limit: Duration::ZERO,
            compute_iis: false,
            verbose: false,
            export_path: None,
            problem_name: String::new(),
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_iis(mut self, compute_iis: bool) -> Self {
        self.compute_iis = compute_iis;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    pub fn with_problem_name(mut self, name: impl Into<String>) -> Self {
        self.problem_name = name.into();
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new(Backend::Sat)
    }
}

/// A registered constraint: either a relational expression or the degenerate
/// case where both sides folded to constants at construction time.
#[derive(Debug, Clone)]
pub enum ConstraintExpr {
    Relation(Node),
    Literal(bool),
}

impl ConstraintExpr {
    pub fn formula(&self) -> String {
        match self {
            ConstraintExpr::Relation(node) => node.formula().to_string(),
            ConstraintExpr::Literal(v) => v.to_string(),
        }
    }
}

impl From<Node> for ConstraintExpr {
    fn from(node: Node) -> Self {
        ConstraintExpr::Relation(node)
    }
}

impl From<&Node> for ConstraintExpr {
    fn from(node: &Node) -> Self {
        ConstraintExpr::Relation(node.clone())
    }
}

impl From<bool> for ConstraintExpr {
    fn from(value: bool) -> Self {
        ConstraintExpr::Literal(value)
    }
}

#[derive(Debug, Clone)]
struct ConstraintRecord {
    name: String,
    expr: ConstraintExpr,
}

/// The model facade.
///
/// Single-threaded and synchronous: every operation runs to completion
/// before returning, and `solve()` blocks until the engine comes back.
pub struct Solver {
    config: SolverConfig,
    origin: Origin,
    engine: Box<dyn SolveEngine>,
    all_vars: Vec<Node>,
    obj_vars: HashMap<String, Node>,
    obj_terms: Vec<Node>,
    constraints: Vec<ConstraintRecord>,
    assumptions: Vec<Node>,
    status: Status,
    objective_value: Option<f64>,
}

impl Solver {
    /// Builds a facade bound to the configured backend for its lifetime.
    ///
    /// Fails fast when the backend's runtime component is unavailable.
    pub fn new(config: SolverConfig) -> Result<Self> {
        if !config.backend.is_available() {
            return Err(ModelError::SolverNotAvailable(config.backend));
        }
        let engine = create_engine(config.backend)?;
        let origin = Origin {
            backend: config.backend,
            model: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
        };
        Ok(Self {
            config,
            origin,
            engine,
            all_vars: Vec::new(),
            obj_vars: HashMap::new(),
            obj_terms: Vec::new(),
            constraints: Vec::new(),
            assumptions: Vec::new(),
            status: Status::Idle,
            objective_value: None,
        })
    }

    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    pub fn problem_name(&self) -> &str {
        &self.config.problem_name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Objective value of the last solve; `None` unless the terminal status
    /// was Optimal or Feasible.
    pub fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }

    /// All created variables, in insertion order.
    pub fn all_vars(&self) -> &[Node] {
        &self.all_vars
    }

    /// Variables referenced by the objective, unique by name.
    pub fn obj_vars(&self) -> &HashMap<String, Node> {
        &self.obj_vars
    }

    pub fn objective_formulas(&self) -> Vec<String> {
        self.obj_terms.iter().map(|t| t.formula().to_string()).collect()
    }

    pub fn constraint_formulas(&self) -> Vec<String> {
        self.constraints.iter().map(|c| c.expr.formula()).collect()
    }

    fn check_owned(&self, node: &Node) -> Result<()> {
        match node.origin() {
            Some(origin) if origin == self.origin => Ok(()),
            Some(origin) => Err(ModelError::BackendMismatch {
                expected: self.origin.to_string(),
                found: origin.to_string(),
            }),
            None => Err(ModelError::BackendMismatch {
                expected: self.origin.to_string(),
                found: "an unbound constant expression".to_string(),
            }),
        }
    }

    /// Creates a 0/1 integer variable.
    pub fn new_bool_var(&mut self, name: impl Into<String>) -> Result<Node> {
        let name = name.into();
        let id = self.engine.new_var(VarDef {
            name: name.clone(),
            lb: 0.0,
            ub: 1.0,
            integer: true,
        })?;
        let node = Node::bool_var(self.origin, id, name);
        self.all_vars.push(node.clone());
        Ok(node)
    }

    /// Creates an integer variable with explicit bounds.
    pub fn new_int_var(&mut self, lb: i64, ub: i64, name: impl Into<String>) -> Result<Node> {
        let name = name.into();
        let id = self.engine.new_var(VarDef {
            name: name.clone(),
            lb: lb as f64,
            ub: ub as f64,
            integer: true,
        })?;
        let node = Node::int_var(self.origin, id, lb, ub, name);
        self.all_vars.push(node.clone());
        Ok(node)
    }

    /// Creates a bounded box variable, continuous or integer.
    pub fn new_var(
        &mut self,
        lb: f64,
        ub: f64,
        integer: bool,
        name: impl Into<String>,
    ) -> Result<Node> {
        let name = name.into();
        let id = self.engine.new_var(VarDef {
            name: name.clone(),
            lb,
            ub,
            integer,
        })?;
        let node = Node::variable(self.origin, id, lb, ub, integer, name);
        self.all_vars.push(node.clone());
        Ok(node)
    }

    /// Registers a constraint under `name`.
    ///
    /// Accepts a relational expression node or a literal boolean. A
    /// relational node whose sides both folded to constants is handled as a
    /// literal. With diagnosis enabled on the CP-SAT backend, the constraint
    /// is wrapped with a fresh assumption variable and registered as
    /// enforced-only-if-assumed.
    pub fn add_constraint(
        &mut self,
        constraint: impl Into<ConstraintExpr>,
        name: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        let expr = constraint.into();
        match &expr {
            ConstraintExpr::Literal(value) => {
                self.engine.add_literal(&name, *value)?;
            }
            ConstraintExpr::Relation(node) => {
                self.check_owned(node).or_else(|err| {
                    // constant-only relations carry no origin and are fine
                    if node.relation().map_or(false, |r| r.literal().is_some()) {
                        Ok(())
                    } else {
                        Err(err)
                    }
                })?;
                let rel = node.relation().cloned().ok_or_else(|| {
                    ModelError::InvalidConstraint {
                        name: name.clone(),
                        reason: format!(
                            "`{}` is not a relational expression",
                            node.formula()
                        ),
                    }
                })?;
                if let Some(value) = rel.literal() {
                    self.engine.add_literal(&name, value)?;
                } else if self.config.compute_iis && self.config.backend == Backend::Sat {
                    let assumption =
                        self.new_bool_var(format!("{}{}", ASSUMPTION_PREFIX, name))?;
                    let id = assumption
                        .var_id()
                        .ok_or_else(|| ModelError::NotADecisionVariable(name.clone()))?;
                    self.engine.add_enforced(&name, &rel, id)?;
                    self.assumptions.push(assumption);
                } else {
                    self.engine.add_relation(&name, &rel)?;
                }
            }
        }
        self.constraints.push(ConstraintRecord { name, expr });
        Ok(())
    }

    /// Appends `coeff * var` to the objective.
    ///
    /// Numeric coefficients are promoted to constants. Both `var` and, when
    /// it is itself a variable, `coeff` are recorded in the objective
    /// registry keyed by name; last write wins on a name collision.
    pub fn set_obj(&mut self, coeff: impl IntoNode, var: &Node) -> Result<()> {
        self.check_owned(var)?;
        let coeff = coeff.into_node();
        let term = coeff.mul(var)?;
        self.obj_terms.push(term);
        self.obj_vars.insert(var.name().to_string(), var.clone());
        if coeff.is_decision_var() {
            self.obj_vars.insert(coeff.name().to_string(), coeff);
        }
        Ok(())
    }

    fn folded_objective(&self) -> LinExpr {
        let mut objective = LinExpr::default();
        for term in &self.obj_terms {
            if let Some(lin) = term.linear() {
                objective = objective.add(lin);
            }
        }
        objective
    }

    fn finish(&mut self, outcome: Outcome) -> Result<Status> {
        let status =
            canonical_status(self.config.backend, &outcome.native, outcome.has_solution)?;
        self.status = status;
        self.objective_value = if status.is_feasible() {
            outcome.objective
        } else {
            None
        };
        debug!(backend = %self.config.backend, %status, "solve finished");
        Ok(status)
    }

    /// Solves the assembled model and returns the canonical status.
    ///
    /// Re-invoking performs a fresh solve and overwrites the previous
    /// terminal status.
    pub fn solve(&mut self) -> Result<Status> {
        let objective = self.folded_objective();
        let time_limit = (!self.config.time_limit.is_zero()).then_some(self.config.time_limit);
        let request = SolveRequest {
            objective: &objective,
            time_limit,
            verbose: self.config.verbose,
            assumptions: &[],
        };
        let outcome = self.engine.solve(&request)?;
        self.finish(outcome)
    }

    /// Isolates a sufficient set of conflicting constraint names.
    ///
    /// Re-solves with every assumption literal forced. Returns an empty set
    /// when the model turns out feasible, the conflicting names when it is
    /// infeasible, and fails on any other terminal status.
    pub fn find_conflict_constraints(&mut self) -> Result<Vec<String>> {
        if !(self.config.compute_iis && self.config.backend == Backend::Sat) {
            return Err(ModelError::DiagnosisUnavailable);
        }
        self.engine.validate()?;

        let objective = self.folded_objective();
        let time_limit = (!self.config.time_limit.is_zero()).then_some(self.config.time_limit);
        let assumption_ids: Vec<VarId> = self
            .assumptions
            .iter()
            .filter_map(|a| a.var_id())
            .collect();
        let request = SolveRequest {
            objective: &objective,
            time_limit,
            verbose: self.config.verbose,
            assumptions: &assumption_ids,
        };
        let outcome = self.engine.solve(&request)?;
        let status = self.finish(outcome)?;

        match status {
            Status::Optimal | Status::Feasible => Ok(Vec::new()),
            Status::Infeasible => {
                let core = self.engine.unsat_core()?;
                let names = self
                    .assumptions
                    .iter()
                    .filter(|a| a.var_id().map_or(false, |id| core.contains(&id)))
                    .map(|a| {
                        a.name()
                            .strip_prefix(ASSUMPTION_PREFIX)
                            .unwrap_or(a.name())
                            .to_string()
                    })
                    .collect();
                Ok(names)
            }
            other => Err(ModelError::UndefinedSolverStatus {
                backend: self.config.backend,
                status: other.to_string(),
            }),
        }
    }

    pub fn get_var_name<'a>(&self, var: &'a Node) -> &'a str {
        var.name()
    }

    /// Solution value of a variable from the last solve.
    ///
    /// Rounded to the nearest integer for integer and boolean kinds. Callers
    /// must check the status first; reading after a non-feasible terminal
    /// status is reported by the engine's accessor.
    pub fn get_var_value(&self, var: &Node) -> Result<f64> {
        self.check_owned(var)?;
        let id = var
            .var_id()
            .ok_or_else(|| ModelError::NotADecisionVariable(var.formula().to_string()))?;
        let value = self.engine.value(id)?;
        Ok(if var.is_integer_kind() {
            value.round()
        } else {
            value
        })
    }

    /// Dumps the assembled model to a plain-text LP-format file.
    ///
    /// Supported on the COIN-OR CBC backend only; the other backends refuse
    /// with a warning rather than producing a partial dump. Intermediate
    /// directories are created as needed.
    pub fn export_model(&self, path: Option<&Path>) -> Result<()> {
        if self.config.backend != Backend::Cbc {
            warn!(
                backend = %self.config.backend,
                "only the COIN-OR CBC backend can export an LP-format model file"
            );
            return Ok(());
        }
        let path = match path.or(self.config.export_path.as_deref()) {
            Some(p) => p,
            None => {
                warn!("no export path configured; model not exported");
                return Ok(());
            }
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.render_lp())?;
        Ok(())
    }

    fn render_lp(&self) -> String {
        let names: HashMap<VarId, String> = self
            .all_vars
            .iter()
            .filter_map(|v| v.var_id().map(|id| (id, v.name().to_string())))
            .collect();

        let mut out = String::new();
        if !self.config.problem_name.is_empty() {
            out.push_str(&format!("\\ Problem: {}\n", self.config.problem_name));
        }
        out.push_str("Minimize\n");
        let objective = self.folded_objective();
        out.push_str(&format!(" obj: {}\n", lp_terms(&objective, &names, true)));

        out.push_str("Subject To\n");
        for record in &self.constraints {
            let rel = match &record.expr {
                ConstraintExpr::Relation(node) => match node.relation() {
                    Some(rel) if rel.literal().is_none() => rel,
                    _ => continue,
                },
                ConstraintExpr::Literal(_) => continue,
            };
            out.push_str(&format!(
                " {}: {} {} {}\n",
                record.name,
                lp_terms(&rel.expr, &names, false),
                rel.op.lp_symbol(),
                lp_bound(rel.expr.constant)
            ));
        }

        out.push_str("Bounds\n");
        let mut generals = Vec::new();
        let mut binaries = Vec::new();
        for var in &self.all_vars {
            match var.kind() {
                NodeKind::Variable { lb, ub, integer } => {
                    out.push_str(&format!(" {} <= {} <= {}\n", lb, var.name(), ub));
                    if *integer {
                        generals.push(var.name());
                    }
                }
                NodeKind::Int { lb, ub } => {
                    out.push_str(&format!(" {} <= {} <= {}\n", lb, var.name(), ub));
                    generals.push(var.name());
                }
                NodeKind::Bool => binaries.push(var.name()),
                _ => {}
            }
        }
        if !generals.is_empty() {
            out.push_str("Generals\n");
            for name in generals {
                out.push_str(&format!(" {}\n", name));
            }
        }
        if !binaries.is_empty() {
            out.push_str("Binaries\n");
            for name in binaries {
                out.push_str(&format!(" {}\n", name));
            }
        }
        out.push_str("End\n");
        out
    }
}

/// Right-hand side of a normalized relation, with negative zero flattened
/// so a zero bound never renders as `-0`.
fn lp_bound(constant: f64) -> f64 {
    -constant + 0.0
}

/// Renders the variable terms of a linear form in LP syntax.
fn lp_terms(expr: &LinExpr, names: &HashMap<VarId, String>, with_constant: bool) -> String {
    let mut out = String::new();
    for &(id, coeff) in &expr.terms {
        if coeff == 0.0 {
            continue;
        }
        let name = names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("_v{}", id.index()));
        if out.is_empty() {
            if coeff < 0.0 {
                out.push_str("- ");
            }
        } else if coeff < 0.0 {
            out.push_str(" - ");
        } else {
            out.push_str(" + ");
        }
        let magnitude = coeff.abs();
        if magnitude != 1.0 {
            out.push_str(&format!("{} ", magnitude));
        }
        out.push_str(&name);
    }
    if with_constant && expr.constant != 0.0 {
        if out.is_empty() {
            out.push_str(&format!("{}", expr.constant));
        } else if expr.constant < 0.0 {
            out.push_str(&format!(" - {}", -expr.constant));
        } else {
            out.push_str(&format!(" + {}", expr.constant));
        }
    }
    if out.is_empty() {
        out.push('0');
    }
    out
}
