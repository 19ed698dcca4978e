use bson::{Bson, Document as BsonDocument, doc};

use super::types::{CmpOp, Filter, Projection, SortSpec};

/// Renders a filter as the store's query document.
pub fn filter_document(filter: &Filter) -> BsonDocument {
    match filter {
        Filter::True => BsonDocument::new(),
        Filter::Cmp { path, op: CmpOp::Eq, value } => {
            let mut out = BsonDocument::new();
            out.insert(path.clone(), value.clone());
            out
        }
        Filter::Cmp { path, op, value } => {
            let mut cond = BsonDocument::new();
            cond.insert(op.operator(), value.clone());
            let mut out = BsonDocument::new();
            out.insert(path.clone(), cond);
            out
        }
        Filter::And(fs) => {
            // Implicit AND when every clause targets a distinct field, `$and` otherwise.
            let parts: Vec<BsonDocument> = fs.iter().map(filter_document).collect();
            let mut merged = BsonDocument::new();
            for part in &parts {
                for (k, v) in part {
                    if k.starts_with('$') || merged.contains_key(k) {
                        let clauses: Vec<Bson> = parts.iter().cloned().map(Bson::Document).collect();
                        return doc! { "$and": clauses };
                    }
                    merged.insert(k.clone(), v.clone());
                }
            }
            merged
        }
    }
}

pub fn projection_document(projection: &Projection) -> BsonDocument {
    let mut out = BsonDocument::new();
    for f in &projection.fields {
        out.insert(f.clone(), 1);
    }
    if projection.suppress_id {
        out.insert("_id", 0);
    }
    out
}

pub fn sort_document(sort: &[SortSpec]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for s in sort {
        out.insert(s.field.clone(), s.order.direction());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_filters_render_like_shell_queries() {
        assert_eq!(filter_document(&Filter::True), doc! {});
        assert_eq!(
            filter_document(&Filter::eq("author", "George Orwell")),
            doc! {"author": "George Orwell"}
        );
        assert_eq!(
            filter_document(&Filter::gt("published_year", 1950)),
            doc! {"published_year": {"$gt": 1950}}
        );
    }

    #[test]
    fn and_merges_distinct_fields() {
        let f = Filter::And(vec![Filter::eq("in_stock", true), Filter::gt("published_year", 2010)]);
        assert_eq!(filter_document(&f), doc! {"in_stock": true, "published_year": {"$gt": 2010}});
    }

    #[test]
    fn and_on_same_field_uses_dollar_and() {
        let f = Filter::And(vec![Filter::gt("price", 5), Filter::gt("price", 7)]);
        let d = filter_document(&f);
        assert_eq!(d.get_array("$and").unwrap().len(), 2);
    }

    #[test]
    fn projection_and_sort_documents() {
        let p = Projection::include(["title", "author", "price"]).without_id();
        assert_eq!(projection_document(&p), doc! {"title": 1, "author": 1, "price": 1, "_id": 0});
        assert_eq!(sort_document(&[SortSpec::desc("price")]), doc! {"price": -1});
    }
}
