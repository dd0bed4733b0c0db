// COIN-OR CBC adapter, driven through good_lp
//
// Variables and constraints are registered into an in-adapter store and
// translated to a fresh good_lp problem at each solve, so re-invoking
// `solve()` performs a clean fresh solve.

use good_lp::{
    solvers::coin_cbc, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolution, SolverModel, Variable as GoodLpVariable,
};
use tracing::debug;

use crate::domain::{LinExpr, ModelError, RelOp, Relation, Result, VarId};
use crate::solver::engine::{NativeStatus, Outcome, SolveEngine, SolveRequest, VarDef};

pub(crate) struct CbcEngine {
    vars: Vec<VarDef>,
    constraints: Vec<(String, Relation)>,
    /// Name of a literal-false constraint, which makes the model infeasible.
    forced_infeasible: Option<String>,
    values: Vec<f64>,
    solved: bool,
}

impl CbcEngine {
    pub(crate) fn new() -> Self {
        Self {
            vars: Vec::new(),
            constraints: Vec::new(),
            forced_infeasible: None,
            values: Vec::new(),
            solved: false,
        }
    }

    fn check_finite(&self, objective: &LinExpr) -> Result<()> {
        let all_finite = |e: &LinExpr| {
            e.constant.is_finite() && e.terms.iter().all(|&(_, c)| c.is_finite())
        };
        for (name, rel) in &self.constraints {
            if !all_finite(&rel.expr) {
                return Err(ModelError::ExecutionFailed(format!(
                    "constraint `{}` has non-finite coefficients",
                    name
                )));
            }
        }
        if !all_finite(objective) {
            return Err(ModelError::ExecutionFailed(
                "objective has non-finite coefficients".to_string(),
            ));
        }
        Ok(())
    }
}

impl SolveEngine for CbcEngine {
    fn new_var(&mut self, def: VarDef) -> Result<VarId> {
        let id = VarId(self.vars.len());
        self.vars.push(def);
        Ok(id)
    }

    fn add_relation(&mut self, name: &str, rel: &Relation) -> Result<()> {
        self.constraints.push((name.to_string(), rel.clone()));
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

    fn validate(&self) -> Result<()> {
        for def in &self.vars {
            if def.lb > def.ub {
                return Err(ModelError::InvalidVariable {
                    name: def.name.clone(),
                    reason: format!("lower bound {} exceeds upper bound {}", def.lb, def.ub),
                });
            }
        }
        Ok(())
    }

    fn solve(&mut self, request: &SolveRequest<'_>) -> Result<Outcome> {
        self.validate()?;
        self.check_finite(request.objective)?;

        let mut vars = variables!();
        let mut handles: Vec<GoodLpVariable> = Vec::with_capacity(self.vars.len());
        for def in &self.vars {
            let v = if def.integer {
                vars.add(variable().integer().min(def.lb).max(def.ub))
            } else {
                vars.add(variable().min(def.lb).max(def.ub))
            };
            handles.push(v);
        }

        let mut objective: Expression = 0.into();
        objective += request.objective.constant;
        for &(id, coeff) in &request.objective.terms {
            if coeff != 0.0 {
                objective += coeff * handles[id.index()];
            }
        }

        let mut model = vars.minimise(objective).using(coin_cbc::coin_cbc);
        if let Some(limit) = request.time_limit {
            model.set_parameter("seconds", &limit.as_secs_f64().to_string());
        }
        model.set_parameter("logLevel", if request.verbose { "1" } else { "0" });

        for (_, rel) in &self.constraints {
            let mut lhs: Expression = 0.into();
            for &(id, coeff) in &rel.expr.terms {
                if coeff != 0.0 {
                    lhs += coeff * handles[id.index()];
                }
            }
            let bound = -rel.expr.constant;
            model = match rel.op {
                RelOp::Leq => model.with(lhs.leq(bound)),
                RelOp::Eq => model.with(lhs.eq(bound)),
                RelOp::Geq => model.with(lhs.geq(bound)),
            };
        }
        if let Some(name) = &self.forced_infeasible {
            debug!(constraint = name.as_str(), "adding trivially infeasible row");
            let zero: Expression = 0.into();
            model = model.with(zero.geq(1.0));
        }

        match model.solve() {
            Ok(sol) => {
                self.values = handles.iter().map(|&v| sol.value(v)).collect();
                self.solved = true;
                let objective_value = request.objective.evaluate(&self.values);
                Ok(Outcome {
                    native: NativeStatus::CbcSolved,
                    objective: Some(objective_value),
                    has_solution: true,
                })
            }
            Err(ResolutionError::Infeasible) => Ok(Outcome {
                native: NativeStatus::CbcInfeasible,
                objective: None,
                has_solution: false,
            }),
            Err(ResolutionError::Unbounded) => Ok(Outcome {
                native: NativeStatus::CbcUnbounded,
                objective: None,
                has_solution: false,
            }),
            Err(e) => Ok(Outcome {
                native: NativeStatus::CbcOther(format!("{:?}", e)),
                objective: None,
                has_solution: false,
            }),
        }
    }

    fn value(&self, var: VarId) -> Result<f64> {
        if !self.solved {
            return Err(ModelError::ExecutionFailed(
                "no solution available; call solve() first".to_string(),
            ));
        }
        self.values
            .get(var.index())
            .copied()
            .ok_or_else(|| ModelError::ExecutionFailed(format!("unknown variable id {:?}", var)))
    }
}
