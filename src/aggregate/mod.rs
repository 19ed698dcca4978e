mod eval;
mod stage;

pub use eval::{eval_expr, run_pipeline};
pub use stage::{Accumulator, Expr, Group, Pipeline, ProjectField, Stage};
