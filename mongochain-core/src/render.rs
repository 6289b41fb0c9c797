//! Rendering of chain state into MongoDB query documents.
//!
//! This module turns a [`QueryState`] into the filter and update documents that
//! cross the boundary to the database collaborator. Rendering is a pure
//! function of the state: the same state always renders to identical documents.

use bson::{Bson, Document, doc};

use crate::query::{FieldOp, Predicate, QueryState, QueryVisitor};

/// The final filter and, for updates, the final update document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedQuery {
    /// `{}` when no predicates were added, otherwise `{"$and": [...]}`.
    pub filter: Document,
    /// `{"$set": {...}}`, or `None` when no field was set.
    pub update: Option<Document>,
}

impl RenderedQuery {
    /// Renders the given state.
    pub fn from_state(state: &QueryState) -> Self {
        let mut renderer = DocumentRenderer;

        RenderedQuery {
            filter: renderer.visit_filter(state),
            update: renderer.visit_update(state.update_fields()),
        }
    }
}

/// Translates chain state into MongoDB's native BSON query syntax.
pub(crate) struct DocumentRenderer;

impl QueryVisitor for DocumentRenderer {
    type Output = Document;

    fn visit_and(&mut self, predicates: &[Predicate]) -> Self::Output {
        if predicates.is_empty() {
            return doc! {};
        }

        doc! {
            "$and": predicates
                .iter()
                .map(|p| self.visit_predicate(&p.field, p.op, &p.value))
                .collect::<Vec<_>>(),
        }
    }

    fn visit_predicate(&mut self, field: &str, op: FieldOp, value: &Bson) -> Self::Output {
        doc! {
            field: match op {
                FieldOp::Eq => value.clone(),
                FieldOp::Ne => Bson::Document(doc! { "$ne": value }),
                FieldOp::Gt => Bson::Document(doc! { "$gt": value }),
                FieldOp::Gte => Bson::Document(doc! { "$gte": value }),
                FieldOp::Lt => Bson::Document(doc! { "$lt": value }),
                FieldOp::Lte => Bson::Document(doc! { "$lte": value }),
                FieldOp::In => Bson::Document(doc! { "$in": value }),
                FieldOp::Nin => Bson::Document(doc! { "$nin": value }),
            }
        }
    }

    fn visit_update(&mut self, fields: &Document) -> Option<Self::Output> {
        if fields.is_empty() {
            None
        } else {
            Some(doc! { "$set": fields.clone() })
        }
    }
}
