use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};

use crate::query::{SortSpec, sort_document};

/// Expression evaluated against one input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Field(String),
    Literal(Bson),
    Floor(Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn literal(v: impl Into<Bson>) -> Self {
        Self::Literal(v.into())
    }

    #[must_use]
    pub fn floor(self) -> Self {
        Self::Floor(Box::new(self))
    }

    #[must_use]
    pub fn divide(self, by: Self) -> Self {
        Self::Divide(Box::new(self), Box::new(by))
    }

    #[must_use]
    pub fn multiply(self, by: Self) -> Self {
        Self::Multiply(Box::new(self), Box::new(by))
    }

    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Field(f) => Bson::String(format!("${f}")),
            Self::Literal(v) => v.clone(),
            Self::Floor(e) => Bson::Document(doc! { "$floor": e.to_bson() }),
            Self::Divide(a, b) => Bson::Document(doc! { "$divide": [a.to_bson(), b.to_bson()] }),
            Self::Multiply(a, b) => {
                Bson::Document(doc! { "$multiply": [a.to_bson(), b.to_bson()] })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    Avg(Expr),
    Sum(Expr),
}

impl Accumulator {
    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Avg(e) => Bson::Document(doc! { "$avg": e.to_bson() }),
            Self::Sum(e) => Bson::Document(doc! { "$sum": e.to_bson() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: Expr,
    pub accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectField {
    Include,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Group(Group),
    Sort(Vec<SortSpec>),
    Limit(i64),
    Project { fields: Vec<(String, ProjectField)>, suppress_id: bool },
}

impl Stage {
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        match self {
            Self::Group(g) => {
                let mut body = doc! { "_id": g.key.to_bson() };
                for (name, acc) in &g.accumulators {
                    body.insert(name.clone(), acc.to_bson());
                }
                doc! { "$group": body }
            }
            Self::Sort(sort) => doc! { "$sort": sort_document(sort) },
            Self::Limit(n) => doc! { "$limit": *n },
            Self::Project { fields, suppress_id } => {
                let mut body = BsonDocument::new();
                for (name, f) in fields {
                    match f {
                        ProjectField::Include => body.insert(name.clone(), 1),
                        ProjectField::Computed(e) => body.insert(name.clone(), e.to_bson()),
                    };
                }
                if *suppress_id {
                    body.insert("_id", 0);
                }
                doc! { "$project": body }
            }
        }
    }
}

/// Ordered sequence of stages, applied server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn group(mut self, key: Expr, accumulators: Vec<(&str, Accumulator)>) -> Self {
        let accumulators = accumulators.into_iter().map(|(n, a)| (n.to_string(), a)).collect();
        self.stages.push(Stage::Group(Group { key, accumulators }));
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.stages.push(Stage::Sort(sort));
        self
    }

    #[must_use]
    pub fn limit(mut self, n: i64) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    #[must_use]
    pub fn project(mut self, fields: Vec<(&str, ProjectField)>, suppress_id: bool) -> Self {
        let fields = fields.into_iter().map(|(n, f)| (n.to_string(), f)).collect();
        self.stages.push(Stage::Project { fields, suppress_id });
        self
    }

    /// Native stage documents, in order.
    #[must_use]
    pub fn to_documents(&self) -> Vec<BsonDocument> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}
