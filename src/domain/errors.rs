// Error types for the modeling layer
//
// Usage and configuration errors are fatal and surfaced immediately; an
// infeasible or unresolved model is not an error but a terminal `Status`.

use super::value_objects::Backend;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("operator `{0}` is not supported by the modeling layer")]
    UnsupportedOperator(&'static str),

    #[error("backend mismatch: operand from {found} cannot be combined with {expected}")]
    BackendMismatch { expected: String, found: String },

    #[error("relational expression `{0}` cannot be used as an operand")]
    RelationalOperand(String),

    #[error("nonlinear term: {0}")]
    NonlinearTerm(String),

    #[error("backend {backend} cannot create variable `{name}`: {reason}")]
    UnsupportedVariableKind {
        backend: Backend,
        name: String,
        reason: String,
    },

    #[error("variable `{name}`: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("constraint `{name}`: {reason}")]
    InvalidConstraint { name: String, reason: String },

    #[error("`{0}` is not a decision variable")]
    NotADecisionVariable(String),

    #[error("{backend} solver returned undefined status `{status}`")]
    UndefinedSolverStatus { backend: Backend, status: String },

    #[error("solver backend {0} is not available in this build (enable the matching cargo feature)")]
    SolverNotAvailable(Backend),

    #[error("infeasibility diagnosis requires the CP-SAT backend with compute_iis enabled")]
    DiagnosisUnavailable,

    #[error("selection requires exactly {expected} axes, got {got}")]
    SelectionArity { expected: usize, got: usize },

    #[error("boolean tree depth mismatch: {0}")]
    RaggedTree(String),

    #[error("solver execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
