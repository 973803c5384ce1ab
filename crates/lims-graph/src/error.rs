//! Errors raised while traversing the subject graph.

use crate::SubjectId;

/// An error related to graph traversal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The subject does not exist in the graph.
    #[error("subject `{0}` does not exist")]
    UnknownSubject(SubjectId),

    /// A required hop of a relation path yielded no entity.
    #[error("`{subject}` has no `{hop}` (while resolving `{path}`)")]
    NotFound {
        /// The name of the subject the failing hop was taken from.
        subject: String,
        /// The relation path being resolved.
        path: String,
        /// The relation that yielded nothing.
        hop: String,
    },

    /// A relation path tried to step through a scalar value.
    #[error("`{hop}` of `{subject}` is a {kind} and cannot be traversed (while resolving `{path}`)")]
    NotTraversable {
        /// The name of the subject holding the scalar.
        subject: String,
        /// The relation path being resolved.
        path: String,
        /// The relation holding the scalar.
        hop: String,
        /// The kind of scalar that was found.
        kind: &'static str,
    },

    /// A relation path resolved to something of an unexpected shape.
    #[error("`{path}` of `{subject}` resolved to {found} but {expected} was expected")]
    Shape {
        /// The name of the subject the path was resolved from.
        subject: String,
        /// The relation path that was resolved.
        path: String,
        /// What the caller expected.
        expected: &'static str,
        /// What the path resolved to.
        found: &'static str,
    },

    /// A relation path expression could not be parsed.
    #[error("invalid relation path `{path}`: {reason}")]
    InvalidPath {
        /// The path expression.
        path: String,
        /// The reason the path is invalid.
        reason: String,
    },
}

impl Error {
    /// Returns `true` if the error is a missing required hop.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A [`Result`](std::result::Result) with an [`Error`](enum@self::Error).
pub type Result<T> = std::result::Result<T, Error>;
