//! Filter and update evaluation for in-memory documents.
//!
//! This module interprets the rendered documents produced by a chain the way
//! MongoDB would: `$and`, bare equality, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`,
//! `$lte`, `$in`, `$nin` and `$set`. Dotted field names address nested
//! documents.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime};

use mongochain_core::error::{ChainError, ChainResult};


/// Comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that e.g. an `Int32` field compares
/// against an `Int64` operand.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Embedded document; field order is significant.
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Any other BSON type; only equal to an identical value.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


/// Evaluates rendered filter documents against a single stored document.
pub(crate) struct FilterEvaluator<'a> {
    document: &'a Document,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> ChainResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.matches_all(condition)?,
                op if op.starts_with('$') => {
                    return Err(ChainError::InvalidDocument(format!("unsupported top-level operator {op}")));
                },
                path => self.matches_field(path, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn matches_all(&self, clauses: &Bson) -> ChainResult<bool> {
        let clauses = clauses
            .as_array()
            .ok_or_else(|| ChainError::InvalidDocument("$and expects an array".into()))?;

        for clause in clauses {
            let clause = clause
                .as_document()
                .ok_or_else(|| ChainError::InvalidDocument("$and expects documents".into()))?;

            if !self.matches(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn matches_field(&self, path: &str, condition: &Bson) -> ChainResult<bool> {
        let value = lookup(self.document, path);

        match condition {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                for (op, operand) in ops {
                    if !apply_operator(op, value, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            },
            _ => Ok(equals(value, condition)),
        }
    }
}

fn apply_operator(op: &str, value: Option<&Bson>, operand: &Bson) -> ChainResult<bool> {
    match op {
        "$eq" => Ok(equals(value, operand)),
        "$ne" => Ok(!equals(value, operand)),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let Some(value) = value else {
                return Ok(false);
            };

            match Comparable::from(value).partial_cmp(&Comparable::from(operand)) {
                Some(ordering) => Ok(match op {
                    "$gt" => ordering == Ordering::Greater,
                    "$gte" => ordering != Ordering::Less,
                    "$lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }),
                None => Ok(false),
            }
        },
        "$in" | "$nin" => {
            let candidates = operand
                .as_array()
                .ok_or_else(|| ChainError::InvalidDocument(format!("{op} expects an array")))?;
            let found = candidates.iter().any(|candidate| equals(value, candidate));

            Ok(if op == "$in" { found } else { !found })
        },
        other => Err(ChainError::InvalidDocument(format!("unsupported operator {other}"))),
    }
}

/// Equality with MongoDB's array semantics: an array field equals an operand
/// when the whole array or any of its elements does. A missing field only
/// equals null.
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    let expected = Comparable::from(operand);

    match value {
        None => expected == Comparable::Null,
        Some(value) => {
            let actual = Comparable::from(value);
            if actual == expected {
                return true;
            }

            match actual {
                Comparable::Array(items) => items.iter().any(|item| item == &expected),
                _ => false,
            }
        },
    }
}

/// Resolves a dotted path such as `address.city`.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Applies a rendered update document. Returns whether anything changed.
///
/// Dotted field names in `$set` address nested documents; missing
/// intermediate documents are created.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> ChainResult<bool> {
    let mut modified = false;

    for (op, fields) in update {
        if op != "$set" {
            return Err(ChainError::InvalidDocument(format!("unsupported update operator {op}")));
        }

        let fields = fields
            .as_document()
            .ok_or_else(|| ChainError::InvalidDocument("$set expects a document".into()))?;

        for (field, value) in fields {
            if lookup(document, field) != Some(value) {
                set_path(document, field, value.clone())?;
                modified = true;
            }
        }
    }

    Ok(modified)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> ChainResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    if !document.contains_key(head) {
        document.insert(head, Document::new());
    }

    match document.get_mut(head) {
        Some(Bson::Document(child)) => set_path(child, rest, value),
        other => Err(ChainError::InvalidDocument(format!(
            "cannot set {rest} inside {head}, which holds {:?}",
            other.map(|bson| bson.element_type())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use rstest::{fixture, rstest};

    #[fixture]
    fn user() -> Document {
        doc! {
            "name": "A",
            "age": 30,
            "tags": ["admin", "ops"],
            "address": { "city": "Oslo" },
        }
    }

    #[rstest]
    #[case(doc! {}, true)]
    #[case(doc! { "name": "A" }, true)]
    #[case(doc! { "name": "B" }, false)]
    #[case(doc! { "age": { "$gt": 18 } }, true)]
    #[case(doc! { "age": { "$gt": 30 } }, false)]
    #[case(doc! { "age": { "$gte": 30 } }, true)]
    #[case(doc! { "age": { "$lt": 30_i64 } }, false)]
    #[case(doc! { "age": { "$lte": 30.0 } }, true)]
    #[case(doc! { "age": { "$ne": 30 } }, false)]
    #[case(doc! { "missing": { "$ne": 30 } }, true)]
    #[case(doc! { "missing": { "$lt": 30 } }, false)]
    #[case(doc! { "name": { "$in": ["A", "B"] } }, true)]
    #[case(doc! { "name": { "$nin": ["A", "B"] } }, false)]
    #[case(doc! { "tags": "ops" }, true)]
    #[case(doc! { "tags": { "$in": ["dev", "admin"] } }, true)]
    #[case(doc! { "address.city": "Oslo" }, true)]
    #[case(doc! { "address.zip": { "$gt": 0 } }, false)]
    #[case(doc! { "$and": [{ "name": "A" }, { "age": { "$gt": 18 } }] }, true)]
    #[case(doc! { "$and": [{ "name": "A" }, { "age": { "$lt": 18 } }] }, false)]
    fn test_matches(user: Document, #[case] filter: Document, #[case] expected: bool) {
        assert_eq!(FilterEvaluator::new(&user).matches(&filter).unwrap(), expected);
    }

    #[rstest]
    #[case(doc! { "$or": [] })]
    #[case(doc! { "$and": { "name": "A" } })]
    #[case(doc! { "name": { "$in": "A" } })]
    #[case(doc! { "name": { "$regex": "A" } })]
    fn test_rejects_malformed_filters(user: Document, #[case] filter: Document) {
        assert!(matches!(
            FilterEvaluator::new(&user).matches(&filter),
            Err(ChainError::InvalidDocument(_))
        ));
    }

    #[rstest]
    fn test_apply_update_reports_modification(user: Document) {
        let mut user = user;

        assert!(apply_update(&mut user, &doc! { "$set": { "name": "B", "active": true } }).unwrap());
        assert_eq!(user.get_str("name").unwrap(), "B");
        assert!(user.get_bool("active").unwrap());

        assert!(!apply_update(&mut user, &doc! { "$set": { "name": "B" } }).unwrap());
    }

    #[rstest]
    #[case("address.city", doc! { "city": "Bergen" })]
    #[case("address.geo.lat", doc! { "city": "Oslo", "geo": { "lat": "Bergen" } })]
    fn test_apply_update_sets_nested_paths(
        user: Document,
        #[case] path: &str,
        #[case] address: Document,
    ) {
        let mut user = user;

        assert!(apply_update(&mut user, &doc! { "$set": { path: "Bergen" } }).unwrap());
        assert_eq!(user.get_document("address").unwrap(), &address);
        assert!(!user.contains_key(path));
        assert!(FilterEvaluator::new(&user).matches(&doc! { path: "Bergen" }).unwrap());
    }

    #[rstest]
    fn test_apply_update_rejects_path_through_scalar(user: Document) {
        let mut user = user;

        assert!(matches!(
            apply_update(&mut user, &doc! { "$set": { "name.first": "A" } }),
            Err(ChainError::InvalidDocument(_))
        ));
    }

    #[rstest]
    #[case(doc! { "address": { "city": "Oslo" } }, true)]
    #[case(doc! { "meta": { "a": 1, "b": 2_i64 } }, true)]
    #[case(doc! { "meta": { "b": 2, "a": 1 } }, false)]
    fn test_embedded_document_equality_is_ordered(
        user: Document,
        #[case] filter: Document,
        #[case] expected: bool,
    ) {
        let mut user = user;
        user.insert("meta", doc! { "a": 1, "b": 2 });

        assert_eq!(FilterEvaluator::new(&user).matches(&filter).unwrap(), expected);
    }

    #[rstest]
    fn test_apply_update_rejects_other_operators(user: Document) {
        let mut user = user;

        assert!(matches!(
            apply_update(&mut user, &doc! { "$unset": { "name": "" } }),
            Err(ChainError::InvalidDocument(_))
        ));
    }
}
