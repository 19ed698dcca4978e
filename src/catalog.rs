use crate::aggregate::{Accumulator, Expr, Pipeline, ProjectField};
use crate::index::IndexSpec;
use crate::query::{Filter, FindOptions, Projection, SortSpec};

pub const BASIC_QUERIES: &str = "Task 2: Basic Queries";
pub const ADVANCED_QUERIES: &str = "Task 3: Advanced Queries";
pub const AGGREGATION: &str = "Task 4: Aggregation Pipeline";
pub const INDEXING: &str = "Task 5: Indexing";

/// What an operation sends to the store. Each kind carries exactly its own parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Find { filter: Filter },
    FindWithProjection { filter: Filter, projection: Projection },
    FindSorted { sort: Vec<SortSpec>, projection: Option<Projection> },
    FindPaginated { skip: u64, limit: i64 },
    Aggregate { pipeline: Pipeline },
    CreateIndex { spec: IndexSpec },
    Explain { filter: Filter },
}

impl OperationKind {
    /// `find` options for the find-shaped kinds.
    #[must_use]
    pub fn find_request(&self) -> Option<(Filter, FindOptions)> {
        match self {
            Self::Find { filter } => Some((filter.clone(), FindOptions::default())),
            Self::FindWithProjection { filter, projection } => Some((
                filter.clone(),
                FindOptions { projection: Some(projection.clone()), ..FindOptions::default() },
            )),
            Self::FindSorted { sort, projection } => Some((
                Filter::True,
                FindOptions {
                    sort: Some(sort.clone()),
                    projection: projection.clone(),
                    ..FindOptions::default()
                },
            )),
            Self::FindPaginated { skip, limit } => Some((
                Filter::True,
                FindOptions { skip: Some(*skip), limit: Some(*limit), ..FindOptions::default() },
            )),
            Self::Aggregate { .. } | Self::CreateIndex { .. } | Self::Explain { .. } => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Find { .. } => "find",
            Self::FindWithProjection { .. } => "find+projection",
            Self::FindSorted { .. } => "find+sort",
            Self::FindPaginated { .. } => "find+page",
            Self::Aggregate { .. } => "aggregate",
            Self::CreateIndex { .. } => "createIndex",
            Self::Explain { .. } => "explain",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub section: &'static str,
    pub name: String,
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(section: &'static str, name: impl Into<String>, kind: OperationKind) -> Self {
        Self { section, name: name.into(), kind }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    operations: Vec<Operation>,
}

impl Catalog {
    #[must_use]
    pub const fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The bookstore demonstration, in execution order.
    #[must_use]
    pub fn bookstore() -> Self {
        use OperationKind as K;
        let listing = || Projection::include(["title", "author", "price"]);
        let operations = vec![
            Operation::new(BASIC_QUERIES, "All Books", K::Find { filter: Filter::True }),
            Operation::new(
                BASIC_QUERIES,
                "Books by George Orwell",
                K::Find { filter: Filter::eq("author", "George Orwell") },
            ),
            Operation::new(
                BASIC_QUERIES,
                "Books published after 1950",
                K::Find { filter: Filter::gt("published_year", 1950) },
            ),
            Operation::new(
                BASIC_QUERIES,
                "Fiction books",
                K::Find { filter: Filter::eq("genre", "Fiction") },
            ),
            Operation::new(
                BASIC_QUERIES,
                "In-stock books",
                K::Find { filter: Filter::eq("in_stock", true) },
            ),
            Operation::new(
                ADVANCED_QUERIES,
                "In-stock books published after 2010",
                K::FindWithProjection {
                    filter: Filter::And(vec![
                        Filter::eq("in_stock", true),
                        Filter::gt("published_year", 2010),
                    ]),
                    projection: listing().without_id(),
                },
            ),
            Operation::new(
                ADVANCED_QUERIES,
                "Sort books by price (ascending)",
                K::FindSorted {
                    sort: vec![SortSpec::asc("price")],
                    projection: Some(listing().without_id()),
                },
            ),
            Operation::new(
                ADVANCED_QUERIES,
                "Sort books by price (descending)",
                K::FindSorted {
                    sort: vec![SortSpec::desc("price")],
                    projection: Some(listing().without_id()),
                },
            ),
            Operation::new(
                ADVANCED_QUERIES,
                "Pagination - Page 1 (limit 5)",
                K::FindPaginated { skip: 0, limit: 5 },
            ),
            Operation::new(
                ADVANCED_QUERIES,
                "Pagination - Page 2 (limit 5)",
                K::FindPaginated { skip: 5, limit: 5 },
            ),
            Operation::new(
                AGGREGATION,
                "Average price of books by genre",
                K::Aggregate {
                    pipeline: Pipeline::new().group(
                        Expr::field("genre"),
                        vec![("averagePrice", Accumulator::Avg(Expr::field("price")))],
                    ),
                },
            ),
            Operation::new(
                AGGREGATION,
                "Author with the most books",
                K::Aggregate {
                    pipeline: Pipeline::new()
                        .group(
                            Expr::field("author"),
                            vec![("count", Accumulator::Sum(Expr::literal(1)))],
                        )
                        .sort(vec![SortSpec::desc("count")])
                        .limit(1),
                },
            ),
            Operation::new(
                AGGREGATION,
                "Books grouped by publication decade",
                K::Aggregate {
                    pipeline: Pipeline::new()
                        .group(
                            Expr::field("published_year").divide(Expr::literal(10)).floor(),
                            vec![("count", Accumulator::Sum(Expr::literal(1)))],
                        )
                        .project(
                            vec![
                                (
                                    "decade",
                                    ProjectField::Computed(
                                        Expr::field("_id").multiply(Expr::literal(10)),
                                    ),
                                ),
                                ("count", ProjectField::Include),
                            ],
                            true,
                        )
                        .sort(vec![SortSpec::asc("decade")]),
                },
            ),
            Operation::new(
                INDEXING,
                "Creating index on title",
                K::CreateIndex { spec: IndexSpec::ascending(["title"]) },
            ),
            Operation::new(
                INDEXING,
                "Creating compound index on author and published_year",
                K::CreateIndex { spec: IndexSpec::ascending(["author", "published_year"]) },
            ),
            Operation::new(
                INDEXING,
                "Performance check with explain()",
                K::Explain { filter: Filter::eq("title", "1984") },
            ),
        ];
        Self { operations }
    }
}
