// Helpers for comparing and navigating BSON values the way the server does,
// used by the in-memory store and the pipeline evaluator.

use mongodb::bson::{Bson, Document};
use std::cmp::Ordering;

/// Resolves a dotted path against a document.
///
/// Arrays along the path fan out: `instructor.name` on an array of
/// instructors yields an array of names.
pub fn lookup_path(doc: &Document, path: &str) -> Option<Bson> {
    let mut parts = path.splitn(2, '.');
    let head = parts.next()?;
    let value = doc.get(head)?;
    match parts.next() {
        None => Some(value.clone()),
        Some(rest) => descend(value, rest),
    }
}

fn descend(value: &Bson, rest: &str) -> Option<Bson> {
    match value {
        Bson::Document(inner) => lookup_path(inner, rest),
        Bson::Array(items) => {
            let collected: Vec<Bson> = items.iter().filter_map(|item| descend(item, rest)).collect();
            Some(Bson::Array(collected))
        }
        _ => None,
    }
}

/// Sets a top-level or dotted field, creating intermediate documents.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Equality with numeric widening (`Int32(5) == Int64(5) == Double(5.0)`).
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Field-equality semantics: an array field matches when any element does.
pub fn field_matches(field: Option<&Bson>, expected: &Bson) -> bool {
    match field {
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
        None => matches!(expected, Bson::Null),
    }
}

/// Ordering across comparable values; `None` when the types do not compare.
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: missing and null values sort first.
pub fn sort_order(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

/// Adds two numeric values, keeping integers integral where possible.
pub fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Some(Bson::Int64(*x as i64 + *y as i64)),
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => {
            Some(Bson::Int64(*x as i64 + *y))
        }
        (Bson::Int64(x), Bson::Int64(y)) => Some(Bson::Int64(x + y)),
        _ => Some(Bson::Double(as_f64(a)? + as_f64(b)?)),
    }
}

/// Negates a numeric value, used to invert `$inc` during compensation.
pub fn negate(value: &Bson) -> Option<Bson> {
    match value {
        Bson::Int32(v) => Some(Bson::Int32(-v)),
        Bson::Int64(v) => Some(Bson::Int64(-v)),
        Bson::Double(v) => Some(Bson::Double(-v)),
        _ => None,
    }
}
