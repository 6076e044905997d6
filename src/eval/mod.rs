//! Arithmetic over scoped variables

mod context;
mod expr;

pub use context::{EvalContext, ScopeId, Value, format_number};
pub use expr::Evaluator;
