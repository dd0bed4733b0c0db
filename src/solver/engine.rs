// Capability interface that every backend adapter implements
//
// The facade owns exactly one engine for its lifetime and forwards variable
// creation, constraint registration, the assembled objective and solve
// requests through this trait. Engines report their native status verbatim;
// translation to the canonical `Status` happens in the per-backend table
// (`canonical_status`), never inside an adapter.

use std::time::Duration;

use crate::domain::{Backend, LinExpr, ModelError, Relation, Result, Status, VarId};

/// Definition of a decision variable handed to the engine at creation.
#[derive(Debug, Clone)]
pub(crate) struct VarDef {
    pub name: String,
    pub lb: f64,
    pub ub: f64,
    pub integer: bool,
}

/// One solve invocation: the folded objective plus run controls.
pub(crate) struct SolveRequest<'a> {
    pub objective: &'a LinExpr,
    pub time_limit: Option<Duration>,
    pub verbose: bool,
    /// Assumption literals forced for this run (diagnosis only).
    pub assumptions: &'a [VarId],
}

/// Backend-native solve statuses, kept verbatim for the status table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NativeStatus {
    CbcSolved,
    CbcInfeasible,
    CbcUnbounded,
    CbcOther(String),
    HighsOptimal,
    HighsInfeasible,
    HighsUnbounded,
    HighsTimeLimit,
    HighsOther(String),
    SatSat,
    SatUnsat,
}

/// Result of one engine solve.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub native: NativeStatus,
    pub objective: Option<f64>,
    pub has_solution: bool,
}

pub(crate) trait SolveEngine {
    /// Creates a native variable and returns its engine-scoped id.
    fn new_var(&mut self, def: VarDef) -> Result<VarId>;

    /// Registers a relational constraint under `name`.
    fn add_relation(&mut self, name: &str, rel: &Relation) -> Result<()>;

    /// Registers a constraint that folded to a literal boolean.
    ///
    /// Engines whose native constraint API requires a relational handle warn
    /// and skip instead of failing the model.
    fn add_literal(&mut self, name: &str, value: bool) -> Result<()>;

    /// Registers a constraint enforced only while `assumption` is true.
    ///
    /// Only the backend with literal-level unsat cores supports this.
    fn add_enforced(&mut self, _name: &str, _rel: &Relation, _assumption: VarId) -> Result<()> {
        Err(ModelError::DiagnosisUnavailable)
    }

    /// Consistency check of the assembled native model.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn solve(&mut self, request: &SolveRequest<'_>) -> Result<Outcome>;

    /// Native solution value of a variable from the last solve.
    fn value(&self, var: VarId) -> Result<f64>;

    /// Assumption ids certifying infeasibility of the last assumed solve.
    fn unsat_core(&self) -> Result<Vec<VarId>> {
        Err(ModelError::DiagnosisUnavailable)
    }
}

/// Per-backend translation of native statuses into the canonical taxonomy.
///
/// The tables are intentionally closed: a native status without an entry is a
/// programming or environment error and raises immediately, because silently
/// defaulting an unrecognized code risks reporting false feasibility.
pub(crate) fn canonical_status(
    backend: Backend,
    native: &NativeStatus,
    has_solution: bool,
) -> Result<Status> {
    let mapped = match (backend, native) {
        (Backend::Cbc, NativeStatus::CbcSolved) => Some(Status::Optimal),
        (Backend::Cbc, NativeStatus::CbcInfeasible) => Some(Status::Infeasible),

        (Backend::Highs, NativeStatus::HighsOptimal) => Some(Status::Optimal),
        (Backend::Highs, NativeStatus::HighsInfeasible) => Some(Status::Infeasible),
        // HiGHS reports a generic feasible-class status on timeout; widen it
        // to NotSolved when the run produced no incumbent at all.
        (Backend::Highs, NativeStatus::HighsTimeLimit) => {
            if has_solution {
                Some(Status::Feasible)
            } else {
                Some(Status::NotSolved)
            }
        }

        (Backend::Sat, NativeStatus::SatSat) => Some(Status::Optimal),
        (Backend::Sat, NativeStatus::SatUnsat) => Some(Status::Infeasible),

        _ => None,
    };
    mapped.ok_or_else(|| ModelError::UndefinedSolverStatus {
        backend,
        status: format!("{:?}", native),
    })
}
