use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::stage::{Accumulator, Expr, Group, Pipeline, ProjectField, Stage};
use crate::errors::CatalogError;
use crate::query::{as_f64, compare_bson, compare_docs, get_path};

/// Runs a pipeline over documents in natural order.
///
/// # Errors
/// Returns `CatalogError::Query` for arithmetic on non-numeric values, division by zero,
/// or a non-positive `$limit`.
pub fn run_pipeline(
    docs: Vec<BsonDocument>,
    pipeline: &Pipeline,
) -> Result<Vec<BsonDocument>, CatalogError> {
    let mut cur = docs;
    for stage in &pipeline.stages {
        cur = match stage {
            Stage::Group(g) => group(&cur, g)?,
            Stage::Sort(sort) => {
                // stable: first encountered wins among ties
                cur.sort_by(|a, b| compare_docs(a, b, sort));
                cur
            }
            Stage::Limit(n) => {
                let n = usize::try_from(*n)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| CatalogError::Query(format!("$limit must be positive, got {n}")))?;
                cur.truncate(n);
                cur
            }
            Stage::Project { fields, suppress_id } => cur
                .iter()
                .map(|d| project(d, fields, *suppress_id))
                .collect::<Result<Vec<_>, _>>()?,
        };
    }
    Ok(cur)
}

pub fn eval_expr(doc: &BsonDocument, expr: &Expr) -> Result<Bson, CatalogError> {
    match expr {
        Expr::Field(f) => Ok(get_path(doc, f).cloned().unwrap_or(Bson::Null)),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Floor(e) => match eval_expr(doc, e)? {
            Bson::Null => Ok(Bson::Null),
            v @ (Bson::Int32(_) | Bson::Int64(_)) => Ok(v),
            v => as_f64(&v)
                .map(|f| Bson::Double(f.floor()))
                .ok_or_else(|| CatalogError::Query(format!("$floor only supports numeric types, not {v}"))),
        },
        Expr::Divide(a, b) => {
            let (a, b) = (eval_expr(doc, a)?, eval_expr(doc, b)?);
            if matches!(a, Bson::Null) || matches!(b, Bson::Null) {
                return Ok(Bson::Null);
            }
            let (x, y) = numeric_pair("$divide", &a, &b)?;
            if y == 0.0 {
                return Err(CatalogError::Query("can't $divide by zero".into()));
            }
            Ok(Bson::Double(x / y))
        }
        Expr::Multiply(a, b) => {
            let (a, b) = (eval_expr(doc, a)?, eval_expr(doc, b)?);
            if matches!(a, Bson::Null) || matches!(b, Bson::Null) {
                return Ok(Bson::Null);
            }
            match (int_value(&a), int_value(&b)) {
                #[allow(clippy::cast_precision_loss)]
                (Some(x), Some(y)) => Ok(x
                    .checked_mul(y)
                    .map_or_else(|| Bson::Double(x as f64 * y as f64), narrow_int)),
                _ => {
                    let (x, y) = numeric_pair("$multiply", &a, &b)?;
                    Ok(Bson::Double(x * y))
                }
            }
        }
    }
}

fn numeric_pair(op: &str, a: &Bson, b: &Bson) -> Result<(f64, f64), CatalogError> {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(CatalogError::Query(format!("{op} only supports numeric types"))),
    }
}

const fn int_value(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

fn narrow_int(v: i64) -> Bson {
    i32::try_from(v).map_or(Bson::Int64(v), Bson::Int32)
}

fn same_group_key(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(_) | Bson::Array(_), _) | (_, Bson::Document(_) | Bson::Array(_)) => a == b,
        _ => compare_bson(a, b) == Ordering::Equal,
    }
}

#[derive(Default)]
struct AccState {
    int_sum: i64,
    float_sum: f64,
    saw_float: bool,
    numeric_count: u64,
}

impl AccState {
    fn add(&mut self, v: &Bson) {
        match int_value(v) {
            Some(i) => match self.int_sum.checked_add(i) {
                Some(s) => self.int_sum = s,
                None => {
                    #[allow(clippy::cast_precision_loss)]
                    let f = i as f64;
                    self.float_sum += f;
                    self.saw_float = true;
                }
            },
            None => match as_f64(v) {
                Some(f) => {
                    self.float_sum += f;
                    self.saw_float = true;
                }
                None => return,
            },
        }
        self.numeric_count += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn total(&self) -> f64 {
        self.int_sum as f64 + self.float_sum
    }

    fn finish(&self, acc: &Accumulator) -> Bson {
        match acc {
            Accumulator::Avg(_) if self.numeric_count == 0 => Bson::Null,
            #[allow(clippy::cast_precision_loss)]
            Accumulator::Avg(_) => Bson::Double(self.total() / self.numeric_count as f64),
            Accumulator::Sum(_) if self.saw_float => Bson::Double(self.total()),
            Accumulator::Sum(_) => narrow_int(self.int_sum),
        }
    }
}

fn group(docs: &[BsonDocument], g: &Group) -> Result<Vec<BsonDocument>, CatalogError> {
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for d in docs {
        let key = eval_expr(d, &g.key)?;
        let pos = match groups.iter().position(|(k, _)| same_group_key(k, &key)) {
            Some(p) => p,
            None => {
                groups.push((key, g.accumulators.iter().map(|_| AccState::default()).collect()));
                groups.len() - 1
            }
        };
        for ((_, acc), state) in g.accumulators.iter().zip(groups[pos].1.iter_mut()) {
            let expr = match acc {
                Accumulator::Avg(e) | Accumulator::Sum(e) => e,
            };
            state.add(&eval_expr(d, expr)?);
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", key);
            for ((name, acc), state) in g.accumulators.iter().zip(states.iter()) {
                out.insert(name.clone(), state.finish(acc));
            }
            out
        })
        .collect())
}

fn project(
    doc: &BsonDocument,
    fields: &[(String, ProjectField)],
    suppress_id: bool,
) -> Result<BsonDocument, CatalogError> {
    let mut out = BsonDocument::new();
    if !suppress_id && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for (k, v) in doc {
        if k != "_id" && fields.iter().any(|(n, f)| n == k && matches!(f, ProjectField::Include)) {
            out.insert(k.clone(), v.clone());
        }
    }
    for (name, f) in fields {
        if let ProjectField::Computed(e) = f {
            out.insert(name.clone(), eval_expr(doc, e)?);
        }
    }
    Ok(out)
}
