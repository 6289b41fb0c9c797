//! Accumulated filter and update state for a single chain.
//!
//! A chain collects field-level [`Predicate`]s and `$set` fields in a
//! [`QueryState`]. The state is private to its chain and is only turned into
//! documents when a terminal method renders it (see [`crate::render`]).
//!
//! # Operators
//!
//! Every comparison is described by a [`FieldOp`]. Negating an operator yields
//! its complement, and negating twice gives back the original:
//!
//! | operator | negated |
//! |----------|---------|
//! | `Eq`     | `Ne`    |
//! | `Lt`     | `Gte`   |
//! | `Gt`     | `Lte`   |
//! | `In`     | `Nin`   |

use bson::{Bson, Document};

/// Field comparison operators for predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field value is one of the given values.
    In,
    /// Field value is none of the given values.
    Nin,
}

impl FieldOp {
    /// Returns the complementary operator.
    pub fn negate(self) -> Self {
        match self {
            FieldOp::Eq => FieldOp::Ne,
            FieldOp::Ne => FieldOp::Eq,
            FieldOp::Lt => FieldOp::Gte,
            FieldOp::Gte => FieldOp::Lt,
            FieldOp::Gt => FieldOp::Lte,
            FieldOp::Lte => FieldOp::Gt,
            FieldOp::In => FieldOp::Nin,
            FieldOp::Nin => FieldOp::In,
        }
    }

    /// Returns the operator applied when `negated` is set.
    pub fn negated_if(self, negated: bool) -> Self {
        if negated { self.negate() } else { self }
    }
}

/// A single field-level constraint, e.g. "age greater than 18".
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// The field name to compare.
    pub field: String,
    /// The comparison operator.
    pub op: FieldOp,
    /// The value to compare against.
    pub value: Bson,
}

impl Predicate {
    /// Creates a new predicate.
    pub fn new(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Predicate { field: field.into(), op, value: value.into() }
    }
}

/// The accumulating filter and update state of one chain.
///
/// Predicates are appended in call order. The predicates emitted by the most
/// recent comparison form the "last group", which a trailing `not()` on the
/// chain root can flip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    predicates: Vec<Predicate>,
    update_fields: Document,
    last_group: usize,
}

impl QueryState {
    /// Creates an empty state that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulated predicates in call order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the accumulated `$set` fields.
    pub fn update_fields(&self) -> &Document {
        &self.update_fields
    }

    /// Appends the predicates produced by one comparison call.
    pub fn push_group(&mut self, group: impl IntoIterator<Item = Predicate>) {
        let before = self.predicates.len();
        self.predicates.extend(group);
        self.last_group = self.predicates.len() - before;
    }

    /// Flips the operator of every predicate emitted by the last comparison.
    ///
    /// Does nothing before the first comparison.
    pub fn negate_last_group(&mut self) {
        let start = self.predicates.len() - self.last_group;
        for predicate in &mut self.predicates[start..] {
            predicate.op = predicate.op.negate();
        }
    }

    /// Records a replacement value for `field`, overwriting any earlier one.
    ///
    /// A null value means no value was supplied and leaves the state unchanged.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        match value.into() {
            Bson::Null => {}
            value => {
                self.update_fields.insert(field.into(), value);
            }
        }
    }
}

/// Visitor over the accumulated state of a chain.
///
/// Implementations turn a [`QueryState`] into some output, e.g. the BSON
/// documents handed to the database collaborator.
pub trait QueryVisitor {
    type Output;

    fn visit_and(&mut self, predicates: &[Predicate]) -> Self::Output;
    fn visit_predicate(&mut self, field: &str, op: FieldOp, value: &Bson) -> Self::Output;
    fn visit_update(&mut self, fields: &Document) -> Option<Self::Output>;

    fn visit_filter(&mut self, state: &QueryState) -> Self::Output {
        self.visit_and(state.predicates())
    }
}
