// HiGHS adapter
//
// Translates the registered variables and constraints to a HiGHS RowProblem
// at solve time (variables first, then rows). HiGHS has no native notion of
// a literal boolean constraint, so those are skipped with a warning.

use highs::{HighsModelStatus, RowProblem, Sense};
use tracing::warn;

use crate::domain::{ModelError, RelOp, Relation, Result, VarId};
use crate::solver::engine::{NativeStatus, Outcome, SolveEngine, SolveRequest, VarDef};

pub(crate) struct HighsEngine {
    vars: Vec<VarDef>,
    constraints: Vec<(String, Relation)>,
    values: Vec<f64>,
    solved: bool,
}

impl HighsEngine {
    pub(crate) fn new() -> Self {
        Self {
            vars: Vec::new(),
            constraints: Vec::new(),
            values: Vec::new(),
            solved: false,
        }
    }
}

impl SolveEngine for HighsEngine {
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
        warn!(
            constraint = name,
            value,
            "HiGHS requires a relational constraint handle; literal constraint skipped"
        );
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

        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(self.vars.len());
        for (i, def) in self.vars.iter().enumerate() {
            let obj_coeff = request
                .objective
                .terms
                .iter()
                .find(|(id, _)| id.index() == i)
                .map(|&(_, c)| c)
                .unwrap_or(0.0);
            let col = if def.integer {
                pb.add_integer_column(obj_coeff, def.lb..def.ub)
            } else {
                pb.add_column(obj_coeff, def.lb..def.ub)
            };
            cols.push(col);
        }

        for (_, rel) in &self.constraints {
            let mut terms = Vec::new();
            for &(id, coeff) in &rel.expr.terms {
                if coeff != 0.0 {
                    terms.push((cols[id.index()], coeff));
                }
            }
            let bound = -rel.expr.constant;
            match rel.op {
                RelOp::Leq => {
                    pb.add_row(..=bound, &terms);
                }
                RelOp::Eq => {
                    pb.add_row(bound..=bound, &terms);
                }
                RelOp::Geq => {
                    pb.add_row(bound.., &terms);
                }
            }
        }

        let mut model = pb.optimise(Sense::Minimise);
        if let Some(limit) = request.time_limit {
            model.set_option("time_limit", limit.as_secs_f64());
        }
        model.set_option("output_flag", request.verbose);

        let solved = model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {
                self.values = solved.get_solution().columns().to_vec();
                self.solved = true;
                let objective = request.objective.evaluate(&self.values);
                Ok(Outcome {
                    native: NativeStatus::HighsOptimal,
                    objective: Some(objective),
                    has_solution: true,
                })
            }
            HighsModelStatus::Infeasible => Ok(Outcome {
                native: NativeStatus::HighsInfeasible,
                objective: None,
                has_solution: false,
            }),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => Ok(Outcome {
                native: NativeStatus::HighsUnbounded,
                objective: None,
                has_solution: false,
            }),
            HighsModelStatus::ReachedTimeLimit => {
                let columns = solved.get_solution().columns().to_vec();
                let usable = columns.len() == self.vars.len()
                    && columns.iter().all(|v| v.is_finite());
                if usable {
                    self.values = columns;
                    self.solved = true;
                    let objective = request.objective.evaluate(&self.values);
                    Ok(Outcome {
                        native: NativeStatus::HighsTimeLimit,
                        objective: Some(objective),
                        has_solution: true,
                    })
                } else {
                    Ok(Outcome {
                        native: NativeStatus::HighsTimeLimit,
                        objective: None,
                        has_solution: false,
                    })
                }
            }
            status => Ok(Outcome {
                native: NativeStatus::HighsOther(format!("{:?}", status)),
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
