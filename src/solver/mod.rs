// Solver adapters module

pub(crate) mod engine;
pub(crate) mod factory;

#[cfg(feature = "cbc")]
pub(crate) mod cbc;
#[cfg(feature = "highs")]
pub(crate) mod highs;
#[cfg(feature = "sat")]
pub(crate) mod sat;
