// Domain value objects representing core modeling concepts

use std::fmt;

/// Solver backend that owns the native model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// COIN-OR CBC linear/mixed-integer solver, driven through good_lp
    Cbc,
    /// Incremental SAT solver (varisat) with assumption-literal unsat cores
    Sat,
    /// HiGHS mixed-integer solver
    Highs,
}

impl Backend {
    /// Whether the backend was compiled into this build.
    ///
    /// Each backend sits behind a cargo feature; requesting a backend whose
    /// feature is absent is a configuration error at facade construction.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Cbc => cfg!(feature = "cbc"),
            Backend::Sat => cfg!(feature = "sat"),
            Backend::Highs => cfg!(feature = "highs"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cbc => write!(f, "COIN-OR CBC"),
            Backend::Sat => write!(f, "CP-SAT"),
            Backend::Highs => write!(f, "HiGHS"),
        }
    }
}

/// Canonical solve outcome, independent of the active backend.
///
/// `Idle` only exists before the first `solve()`; every solve ends in one of
/// the four other states and the model never returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Model created, never solved
    Idle,
    /// Proven optimal solution
    Optimal,
    /// Feasible solution, optimality not proven
    Feasible,
    /// Proven infeasible
    Infeasible,
    /// Time limit reached with no solution found
    NotSolved,
}

impl Status {
    /// True for the two statuses that carry a usable solution.
    pub fn is_feasible(self) -> bool {
        matches!(self, Status::Optimal | Status::Feasible)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Optimal => write!(f, "Optimal"),
            Status::Feasible => write!(f, "Feasible"),
            Status::Infeasible => write!(f, "Infeasible"),
            Status::NotSolved => write!(f, "Not Solved"),
        }
    }
}

/// Operator of a compound expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Geq,
    Leq,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Geq => ">=",
            BinOp::Leq => "<=",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Geq | BinOp::Leq)
    }
}

/// Comparison of a normalized linear form against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Geq,
    Leq,
}

impl RelOp {
    /// Symbol used in LP-format export.
    pub fn lp_symbol(self) -> &'static str {
        match self {
            RelOp::Eq => "=",
            RelOp::Geq => ">=",
            RelOp::Leq => "<=",
        }
    }
}
