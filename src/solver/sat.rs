// CP-SAT adapter backed by the varisat incremental SAT solver
//
// Integer variables are order-encoded (bit j means `x >= lb + j + 1`) and
// each linear constraint becomes a partial-sum automaton over per-value
// literals. The SAT search itself is entirely varisat's; this adapter only
// performs the modeling transformation. Assumption literals map one-to-one
// onto the single order bit of a boolean variable, which is what makes
// `failed_core` usable for minimal-conflict extraction.
//
// This backend is integer-only: continuous variables are refused at creation.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;
use varisat::{ExtendFormula, Lit, Solver};

use crate::domain::{Backend, ModelError, RelOp, Relation, Result, VarId};
use crate::solver::engine::{NativeStatus, Outcome, SolveEngine, SolveRequest, VarDef};

/// Cap on reachable partial sums per constraint before the encoder gives up.
const MAX_ENCODING_STATES: usize = 200_000;

/// Cap on a variable's domain width. The order encoding allocates one
/// literal per domain value, so anything wider is refused at creation.
const MAX_DOMAIN_SPAN: i64 = 1 << 20;

struct SatVar {
    name: String,
    lb: i64,
    ub: i64,
}

struct StoredConstraint {
    name: String,
    rel: Relation,
    enforce: Option<VarId>,
}

pub(crate) struct SatEngine {
    vars: Vec<SatVar>,
    constraints: Vec<StoredConstraint>,
    forced_infeasible: Option<String>,
    values: Option<Vec<i64>>,
    core: Vec<VarId>,
}

/// Order-encoding literals of one integer variable.
struct VarBits {
    lb: i64,
    bits: Vec<Lit>,
}

fn as_int(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        Some(x as i64)
    } else {
        None
    }
}

fn alloc_bits(solver: &mut Solver<'_>, lb: i64, ub: i64) -> VarBits {
    let span = (ub - lb) as usize;
    let bits: Vec<Lit> = (0..span).map(|_| solver.new_lit()).collect();
    // bit j implies bit j-1: the encoding is a monotone chain
    for j in 1..span {
        solver.add_clause(&[!bits[j], bits[j - 1]]);
    }
    VarBits { lb, bits }
}

/// One literal per domain value, defined from the order bits in both
/// directions so unit propagation works either way.
fn value_lits(solver: &mut Solver<'_>, vb: &VarBits) -> Vec<(i64, Lit)> {
    let span = vb.bits.len();
    if span == 0 {
        let d = solver.new_lit();
        solver.add_clause(&[d]);
        return vec![(vb.lb, d)];
    }
    (0..=span)
        .map(|t| {
            let d = solver.new_lit();
            let mut reverse = vec![d];
            if t > 0 {
                solver.add_clause(&[!d, vb.bits[t - 1]]);
                reverse.push(!vb.bits[t - 1]);
            }
            if t < span {
                solver.add_clause(&[!d, !vb.bits[t]]);
                reverse.push(vb.bits[t]);
            }
            solver.add_clause(&reverse);
            (vb.lb + t as i64, d)
        })
        .collect()
}

/// Encodes `rel` as a partial-sum automaton; when `enforce` is given the
/// constraint only binds while that literal is true.
fn encode_constraint(
    solver: &mut Solver<'_>,
    name: &str,
    rel: &Relation,
    domains: &[Vec<(i64, Lit)>],
    enforce: Option<Lit>,
) -> Result<()> {
    let mut states: BTreeMap<i64, Option<Lit>> = BTreeMap::new();
    states.insert(0, None);
    for &(id, coeff) in &rel.expr.terms {
        let c = coeff.round() as i64;
        if c == 0 {
            continue;
        }
        let domain = &domains[id.index()];
        let mut next: BTreeMap<i64, Lit> = BTreeMap::new();
        for (&sum, state) in &states {
            for &(v, dlit) in domain {
                let reached = sum + c * v;
                let q = *next.entry(reached).or_insert_with(|| solver.new_lit());
                let mut clause = vec![q, !dlit];
                if let Some(sl) = state {
                    clause.push(!*sl);
                }
                solver.add_clause(&clause);
            }
        }
        if next.len() > MAX_ENCODING_STATES {
            return Err(ModelError::InvalidConstraint {
                name: name.to_string(),
                reason: "too many reachable partial sums to encode".to_string(),
            });
        }
        states = next.into_iter().map(|(s, q)| (s, Some(q))).collect();
    }

    let offset = rel.expr.constant.round() as i64;
    for (&sum, state) in &states {
        let total = sum + offset;
        let satisfied = match rel.op {
            RelOp::Eq => total == 0,
            RelOp::Geq => total >= 0,
            RelOp::Leq => total <= 0,
        };
        if satisfied {
            continue;
        }
        let mut clause = Vec::new();
        if let Some(sl) = state {
            clause.push(!*sl);
        }
        if let Some(e) = enforce {
            clause.push(!e);
        }
        solver.add_clause(&clause);
    }
    Ok(())
}

impl SatEngine {
    pub(crate) fn new() -> Self {
        Self {
            vars: Vec::new(),
            constraints: Vec::new(),
            forced_infeasible: None,
            values: None,
            core: Vec::new(),
        }
    }

    fn check_integral(&self, name: &str, rel: &Relation) -> Result<()> {
        let integral = rel.expr.terms.iter().all(|&(_, c)| as_int(c).is_some())
            && as_int(rel.expr.constant).is_some();
        if integral {
            Ok(())
        } else {
            Err(ModelError::InvalidConstraint {
                name: name.to_string(),
                reason: "CP-SAT constraints require integer coefficients".to_string(),
            })
        }
    }

    /// The single order bit of a boolean variable doubles as its literal.
    fn assumption_lit(&self, bits: &[VarBits], id: VarId) -> Result<Lit> {
        let vb = &bits[id.index()];
        if vb.bits.len() == 1 {
            Ok(vb.bits[0])
        } else {
            Err(ModelError::InvalidVariable {
                name: self.vars[id.index()].name.clone(),
                reason: "assumption literals must be boolean variables".to_string(),
            })
        }
    }
}

impl SolveEngine for SatEngine {
    fn new_var(&mut self, def: VarDef) -> Result<VarId> {
        if !def.integer {
            return Err(ModelError::UnsupportedVariableKind {
                backend: Backend::Sat,
                name: def.name,
                reason: "the CP-SAT backend only supports integer and boolean variables"
                    .to_string(),
            });
        }
        let (lb, ub) = match (as_int(def.lb), as_int(def.ub)) {
            (Some(lb), Some(ub)) => (lb, ub),
            _ => {
                return Err(ModelError::InvalidVariable {
                    name: def.name,
                    reason: "CP-SAT bounds must be finite integers".to_string(),
                })
            }
        };
        // checked_sub also catches spans that overflow i64
        match ub.checked_sub(lb) {
            Some(span) if span <= MAX_DOMAIN_SPAN => {}
            _ => {
                return Err(ModelError::InvalidVariable {
                    name: def.name,
                    reason: format!(
                        "domain [{}, {}] is too wide for the CP-SAT backend (at most {} values)",
                        lb,
                        ub,
                        MAX_DOMAIN_SPAN + 1
                    ),
                })
            }
        }
        let id = VarId(self.vars.len());
        self.vars.push(SatVar {
            name: def.name,
            lb,
            ub,
        });
        Ok(id)
    }

    fn add_relation(&mut self, name: &str, rel: &Relation) -> Result<()> {
        self.check_integral(name, rel)?;
        self.constraints.push(StoredConstraint {
            name: name.to_string(),
            rel: rel.clone(),
            enforce: None,
        });
        Ok(())
    }

    fn add_literal(&mut self, name: &str, value: bool) -> Result<()> {
        if value {
            debug!(constraint = name, "literal constraint is trivially true");
        } else {
            self.forced_infeasible = Some(name.to_string());
        }
        Ok(())
    }

    fn add_enforced(&mut self, name: &str, rel: &Relation, assumption: VarId) -> Result<()> {
        self.check_integral(name, rel)?;
        self.constraints.push(StoredConstraint {
            name: name.to_string(),
            rel: rel.clone(),
            enforce: Some(assumption),
        });
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for v in &self.vars {
            if v.lb > v.ub {
                return Err(ModelError::InvalidVariable {
                    name: v.name.clone(),
                    reason: format!("lower bound {} exceeds upper bound {}", v.lb, v.ub),
                });
            }
        }
        for sc in &self.constraints {
            for &(id, _) in &sc.rel.expr.terms {
                if id.index() >= self.vars.len() {
                    return Err(ModelError::InvalidConstraint {
                        name: sc.name.clone(),
                        reason: format!("references unknown variable id {:?}", id),
                    });
                }
            }
        }
        Ok(())
    }

    fn solve(&mut self, request: &SolveRequest<'_>) -> Result<Outcome> {
        self.validate()?;
        if !request.objective.terms.is_empty() {
            debug!("CP-SAT backend has no objective support; objective ignored");
        }
        if request.time_limit.is_some() {
            debug!("varisat does not support solve deadlines; running without a budget");
        }
        if request.verbose {
            debug!("varisat emits no solver log; verbose flag has no effect");
        }

        let mut solver = Solver::new();
        let bits: Vec<VarBits> = self
            .vars
            .iter()
            .map(|v| alloc_bits(&mut solver, v.lb, v.ub))
            .collect();
        let domains: Vec<Vec<(i64, Lit)>> = bits
            .iter()
            .map(|vb| value_lits(&mut solver, vb))
            .collect();

        for sc in &self.constraints {
            let enforce = match sc.enforce {
                Some(id) => Some(self.assumption_lit(&bits, id)?),
                None => None,
            };
            encode_constraint(&mut solver, &sc.name, &sc.rel, &domains, enforce)?;
        }
        if let Some(name) = &self.forced_infeasible {
            debug!(constraint = name.as_str(), "literal-false constraint forces infeasibility");
            solver.add_clause(&[]);
        }

        let mut lit_to_var = HashMap::new();
        let mut assumed = Vec::new();
        for &id in request.assumptions {
            let lit = self.assumption_lit(&bits, id)?;
            lit_to_var.insert(lit.var(), id);
            assumed.push(lit);
        }
        if !assumed.is_empty() {
            solver.assume(&assumed);
        }

        match solver.solve() {
            Ok(true) => {
                let model = solver.model().ok_or_else(|| {
                    ModelError::ExecutionFailed("varisat reported sat without a model".to_string())
                })?;
                let true_vars: HashSet<varisat::Var> = model
                    .iter()
                    .filter(|l| l.is_positive())
                    .map(|l| l.var())
                    .collect();
                let values: Vec<i64> = bits
                    .iter()
                    .map(|vb| {
                        vb.lb
                            + vb.bits
                                .iter()
                                .filter(|b| true_vars.contains(&b.var()))
                                .count() as i64
                    })
                    .collect();
                self.values = Some(values);
                self.core.clear();
                Ok(Outcome {
                    native: NativeStatus::SatSat,
                    objective: None,
                    has_solution: true,
                })
            }
            Ok(false) => {
                self.core = solver
                    .failed_core()
                    .map(|lits| {
                        lits.iter()
                            .filter_map(|l| lit_to_var.get(&l.var()).copied())
                            .collect()
                    })
                    .unwrap_or_default();
                self.values = None;
                Ok(Outcome {
                    native: NativeStatus::SatUnsat,
                    objective: None,
                    has_solution: false,
                })
            }
            Err(e) => Err(ModelError::ExecutionFailed(format!("varisat: {}", e))),
        }
    }

    fn value(&self, var: VarId) -> Result<f64> {
        let values = self.values.as_ref().ok_or_else(|| {
            ModelError::ExecutionFailed("no solution available; call solve() first".to_string())
        })?;
        values
            .get(var.index())
            .map(|&v| v as f64)
            .ok_or_else(|| ModelError::ExecutionFailed(format!("unknown variable id {:?}", var)))
    }

    fn unsat_core(&self) -> Result<Vec<VarId>> {
        Ok(self.core.clone())
    }
}
