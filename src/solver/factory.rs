// Factory for engine instances, keyed by the configured backend

use crate::domain::{Backend, ModelError, Result};
use crate::solver::engine::SolveEngine;

/// Instantiates the engine for `backend`, failing fast when the matching
/// cargo feature was not compiled in.
pub(crate) fn create_engine(backend: Backend) -> Result<Box<dyn SolveEngine>> {
    match backend {
        #[cfg(feature = "cbc")]
        Backend::Cbc => Ok(Box::new(crate::solver::cbc::CbcEngine::new())),
        #[cfg(feature = "highs")]
        Backend::Highs => Ok(Box::new(crate::solver::highs::HighsEngine::new())),
        #[cfg(feature = "sat")]
        Backend::Sat => Ok(Box::new(crate::solver::sat::SatEngine::new())),
        #[allow(unreachable_patterns)]
        other => Err(ModelError::SolverNotAvailable(other)),
    }
}
