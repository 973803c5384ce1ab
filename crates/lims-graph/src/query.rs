//! Attribute filters used when querying subjects by type.

use crate::EntityGraph;
use crate::RelationPath;
use crate::Resolved;
use crate::Result;
use crate::SubjectId;
use crate::Value;

/// A comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Any resolved value equals the operand.
    Eq,
    /// No resolved value equals the operand.
    Ne,
    /// Any resolved text value contains the operand.
    Contains,
}

/// A predicate over a subject's attributes.
///
/// Comparisons resolve a relation path from the candidate subject. A path
/// that cannot be resolved never matches (and so always satisfies
/// [`Op::Ne`]). Subjects are compared to string operands by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every subject.
    All,
    /// Compares the value at a path against an operand.
    Compare {
        /// The path resolved from the candidate subject.
        path: RelationPath,
        /// The comparison operator.
        op: Op,
        /// The operand.
        value: Value,
    },
    /// Matches when every inner filter matches.
    And(Vec<Filter>),
    /// Matches when any inner filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    /// Creates an equality comparison.
    pub fn eq(path: RelationPath, value: impl Into<Value>) -> Self {
        Self::Compare {
            path,
            op: Op::Eq,
            value: value.into(),
        }
    }

    /// Creates an inequality comparison.
    pub fn ne(path: RelationPath, value: impl Into<Value>) -> Self {
        Self::Compare {
            path,
            op: Op::Ne,
            value: value.into(),
        }
    }

    /// Creates a containment comparison.
    pub fn contains(path: RelationPath, value: impl Into<Value>) -> Self {
        Self::Compare {
            path,
            op: Op::Contains,
            value: value.into(),
        }
    }

    /// Combines this filter with another so that both must match.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            Self::All => other,
            filter => Self::And(vec![filter, other]),
        }
    }

    /// Determines if the given subject matches the filter.
    pub fn matches<G: EntityGraph + ?Sized>(&self, graph: &G, id: SubjectId) -> Result<bool> {
        match self {
            Self::All => Ok(true),
            Self::And(filters) => {
                for filter in filters {
                    if !filter.matches(graph, id)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(filters) => {
                for filter in filters {
                    if filter.matches(graph, id)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Compare { path, op, value } => {
                let resolved = match graph.resolve(id, path) {
                    Ok(resolved) => resolved,
                    Err(e) if e.is_not_found() => Resolved::Missing,
                    Err(e) => return Err(e),
                };

                let candidates = match resolved {
                    Resolved::Missing => vec![],
                    Resolved::Scalar(Value::Array(values)) => values,
                    Resolved::Scalar(value) => vec![value],
                    Resolved::Subject(id) => vec![Value::Subject(id)],
                    Resolved::Subjects(ids) => ids.into_iter().map(Value::Subject).collect(),
                };

                Ok(match op {
                    Op::Eq => candidates.iter().any(|c| equals(graph, c, value)),
                    Op::Ne => !candidates.iter().any(|c| equals(graph, c, value)),
                    Op::Contains => candidates.iter().any(|c| contains(graph, c, value)),
                })
            }
        }
    }
}

/// Compares a resolved value with an operand.
fn equals<G: EntityGraph + ?Sized>(graph: &G, candidate: &Value, operand: &Value) -> bool {
    match (candidate, operand) {
        (Value::Subject(id), Value::String(name)) => {
            graph.subject(*id).is_some_and(|s| s.name == *name)
        }
        (a, b) => a == b,
    }
}

/// Determines if a resolved value contains an operand.
fn contains<G: EntityGraph + ?Sized>(graph: &G, candidate: &Value, operand: &Value) -> bool {
    match (candidate, operand) {
        (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
        (Value::Subject(id), Value::String(needle)) => graph
            .subject(*id)
            .is_some_and(|s| s.name.contains(needle.as_str())),
        _ => equals(graph, candidate, operand),
    }
}
