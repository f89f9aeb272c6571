use super::value::{compare_values, field_matches, lookup_path};
use mongodb::bson::{doc, Bson, Document};
use std::cmp::Ordering;

/// Structural predicate over stored fields.
///
/// Renders to a MongoDB filter document and evaluates in memory with the same
/// semantics, so repository code never builds raw filter literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Bson),
    In(String, Vec<Bson>),
    Gt(String, Bson),
    And(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn all() -> Self {
        Filter::All
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, other) => Filter::And(vec![f, other]),
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            Filter::All => Document::new(),
            Filter::Eq(field, value) => doc! { field.as_str(): value.clone() },
            Filter::In(field, values) => doc! { field.as_str(): { "$in": values.clone() } },
            Filter::Gt(field, value) => doc! { field.as_str(): { "$gt": value.clone() } },
            Filter::And(filters) => {
                let clauses: Vec<Document> = filters.iter().map(Filter::to_document).collect();
                doc! { "$and": clauses }
            }
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => field_matches(lookup_path(document, field).as_ref(), value),
            Filter::In(field, values) => {
                let actual = lookup_path(document, field);
                values.iter().any(|value| field_matches(actual.as_ref(), value))
            }
            Filter::Gt(field, value) => compares(document, field, value, |o| o == Ordering::Greater),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }

    /// Equality clauses, used to seed the document created by an upsert.
    pub fn equality_fields(&self) -> Vec<(String, Bson)> {
        match self {
            Filter::Eq(field, value) => vec![(field.clone(), value.clone())],
            Filter::And(filters) => filters.iter().flat_map(Filter::equality_fields).collect(),
            _ => Vec::new(),
        }
    }
}

fn compares(document: &Document, field: &str, value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    match lookup_path(document, field) {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, value).map(&accept).unwrap_or(false)),
        Some(actual) => compare_values(&actual, value).map(accept).unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_renders_mongo_filter_documents() {
        let filter = Filter::eq("userMail", "a@b.c").and(Filter::is_in("classId", ["1", "2"]));
        assert_eq!(
            filter.to_document(),
            doc! { "$and": [ { "userMail": "a@b.c" }, { "classId": { "$in": ["1", "2"] } } ] }
        );
        assert_eq!(
            Filter::all().and(Filter::gt("availableSeats", 0)).to_document(),
            doc! { "availableSeats": { "$gt": 0 } }
        );
    }

    #[test]
    fn test_in_memory_matching() {
        let id = ObjectId::new();
        let class = doc! { "_id": id, "availableSeats": 1_i64, "status": "approved" };

        assert!(Filter::eq("_id", id).matches(&class));
        assert!(Filter::gt("availableSeats", 0).matches(&class));
        assert!(!Filter::gt("availableSeats", 1).matches(&class));
        assert!(Filter::is_in("status", ["pending", "approved"]).matches(&class));
        assert!(!Filter::eq("status", "pending").matches(&class));
        assert!(!Filter::gt("missing", 0).matches(&class));
    }

    #[test]
    fn test_equality_fields_for_upsert() {
        let filter = Filter::eq("_id", "x").and(Filter::gt("n", 1)).and(Filter::eq("a", 2));
        let fields: Vec<String> = filter.equality_fields().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["_id".to_string(), "a".to_string()]);
    }
}
