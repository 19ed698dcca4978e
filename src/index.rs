use crate::errors::CatalogError;
use crate::query::{Order, get_path};
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered key specification, e.g. `{author: 1, published_year: 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, Order)>,
}

impl IndexSpec {
    pub fn ascending<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { keys: fields.into_iter().map(|f| (f.into(), Order::Asc)).collect() }
    }

    /// Default index name the store derives from the key spec: `author_1_published_year_1`.
    #[must_use]
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(f, o)| format!("{f}_{}", o.direction()))
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn key_document(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        for (f, o) in &self.keys {
            out.insert(f.clone(), o.direction());
        }
        out
    }

    /// # Errors
    /// Returns `CatalogError::InvalidOperation` for an empty spec or a repeated field.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.keys.is_empty() {
            return Err(CatalogError::InvalidOperation("index spec has no keys".into()));
        }
        let mut seen = BTreeSet::new();
        for (f, _) in &self.keys {
            if f.is_empty() || !seen.insert(f.as_str()) {
                return Err(CatalogError::InvalidOperation(format!("bad index key: {f:?}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKeyKind {
    // Missing fields index as null, like the store does.
    Null,
    F64(OrderedFloat<f64>),
    Str(String),
    Bool(bool),
    Other(String),
}

#[must_use]
pub fn key_from_bson(v: Option<&Bson>) -> IndexKeyKind {
    match v {
        None | Some(Bson::Null) => IndexKeyKind::Null,
        Some(Bson::String(s)) => IndexKeyKind::Str(s.clone()),
        Some(Bson::Int32(i)) => IndexKeyKind::F64(OrderedFloat(f64::from(*i))),
        #[allow(clippy::cast_precision_loss)]
        Some(Bson::Int64(i)) => IndexKeyKind::F64(OrderedFloat(*i as f64)),
        Some(Bson::Double(f)) => IndexKeyKind::F64(OrderedFloat(*f)),
        Some(Bson::Boolean(b)) => IndexKeyKind::Bool(*b),
        Some(other) => IndexKeyKind::Other(other.to_string()),
    }
}

/// Ordered index over one or more fields; values are document positions in natural order.
#[derive(Debug, Clone)]
pub struct CompoundIndex {
    pub spec: IndexSpec,
    pub map: BTreeMap<Vec<IndexKeyKind>, BTreeSet<usize>>,
}

impl CompoundIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { spec, map: BTreeMap::new() }
    }

    pub fn insert(&mut self, doc: &BsonDocument, pos: usize) {
        let key: Vec<IndexKeyKind> =
            self.spec.keys.iter().map(|(f, _)| key_from_bson(get_path(doc, f))).collect();
        self.map.entry(key).or_default().insert(pos);
    }

    /// Equality lookup on the leading key. Returns matching positions and the number
    /// of index keys examined.
    pub fn lookup_prefix_eq(&self, v: &Bson) -> (Vec<usize>, usize) {
        let k = key_from_bson(Some(v));
        let mut out = Vec::new();
        let mut examined = 0usize;
        for (key, set) in self.map.range(vec![k.clone()]..) {
            if key.first() != Some(&k) {
                break;
            }
            examined += set.len();
            out.extend(set.iter().copied());
        }
        out.sort_unstable();
        (out, examined)
    }
}

#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: Vec<CompoundIndex>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: Vec::new() }
    }

    /// Creates and builds an index unless an identical one exists. Returns the index name
    /// and whether it was newly built.
    ///
    /// # Errors
    /// Returns an error for an invalid spec or a name clash with a different key spec.
    pub fn create_index(
        &mut self,
        spec: &IndexSpec,
        docs: &[BsonDocument],
    ) -> Result<(String, bool), CatalogError> {
        spec.validate()?;
        let name = spec.name();
        if let Some(existing) = self.indexes.iter().find(|i| i.spec.name() == name) {
            if existing.spec == *spec {
                return Ok((name, false));
            }
            return Err(CatalogError::Query(format!("index {name} exists with different keys")));
        }
        let mut idx = CompoundIndex::new(spec.clone());
        for (pos, d) in docs.iter().enumerate() {
            idx.insert(d, pos);
        }
        self.indexes.push(idx);
        Ok((name, true))
    }

    pub fn insert_all(&mut self, doc: &BsonDocument, pos: usize) {
        for idx in &mut self.indexes {
            idx.insert(doc, pos);
        }
    }

    /// First index whose leading key is `field`.
    #[must_use]
    pub fn leading_on(&self, field: &str) -> Option<&CompoundIndex> {
        self.indexes.iter().find(|i| i.spec.keys.first().is_some_and(|(f, _)| f == field))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.indexes.iter().map(|i| i.spec.name()).collect()
    }
}
