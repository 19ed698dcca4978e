mod eval;
mod native;
mod types;

pub use eval::{apply_projection, compare_bson, compare_docs, eval_filter};
pub(crate) use eval::{as_f64, get_path};
pub use native::{filter_document, projection_document, sort_document};
pub use types::{CmpOp, Filter, FindOptions, Order, Projection, SortSpec};
