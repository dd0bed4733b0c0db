// Domain module: expression algebra, value objects and errors

pub mod errors;
pub mod expr;
pub mod value_objects;

pub use errors::{ModelError, Result};
pub use expr::{constant, IntoNode, Node, VarId};
pub use value_objects::{Backend, BinOp, RelOp, Status};

pub(crate) use expr::{LinExpr, NodeKind, Origin, Relation};
