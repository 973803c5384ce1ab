//! Read-only access to a LIMS subject graph.
//!
//! The LIMS stores its entities (lane subsets, libraries, pools, alignments,
//! ...) as typed [subjects](Subject) connected by named relations. This crate
//! describes walks through that graph as typed [`RelationPath`] values and
//! interprets them against any implementation of [`EntityGraph`].
//!
//! ```
//! use lims_graph::GraphExt;
//! use lims_graph::MemoryGraph;
//! use lims_graph::RelationPath;
//!
//! let mut graph = MemoryGraph::new();
//! let ls = graph.insert("Lane Subset", "LS-1");
//! let lib = graph.insert("DNA_Lib", "Lib-1");
//! graph.set(ls, "Library", lib);
//!
//! let path: RelationPath = r#""Library"->name"#.parse().unwrap();
//! assert_eq!(graph.get_text(ls, &path).unwrap(), "Lib-1");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

mod cache;
mod error;
mod memory;
mod path;
mod query;
mod subject;
mod value;

pub use cache::*;
pub use error::*;
pub use memory::*;
pub use path::Hop;
pub use path::RelationPath;
pub use path::Resolved;
pub use path::Terminal;
pub use query::*;
pub use subject::*;
pub use value::*;

/// A read-only view of the LIMS subject graph.
///
/// Implementations only need to answer direct lookups; relation paths are
/// interpreted on top of them by [`EntityGraph::resolve`].
pub trait EntityGraph {
    /// Gets a subject by identifier.
    fn subject(&self, id: SubjectId) -> Option<Subject>;

    /// Gets the value of a named attribute or relation of a subject.
    ///
    /// Returns `None` if the subject does not exist or the attribute is unset.
    fn attribute(&self, id: SubjectId, name: &str) -> Option<Value>;

    /// Finds up to `limit` subjects of the given type matching a filter.
    fn find(&self, subject_type: &str, filter: &Filter, limit: usize) -> Result<Vec<SubjectId>>;

    /// Finds a subject of the given type by name.
    fn find_by_name(&self, subject_type: &str, name: &str) -> Option<SubjectId>;

    /// Resolves a relation path from a starting subject.
    ///
    /// See [`Resolved`] for the possible shapes of the result.
    fn resolve(&self, id: SubjectId, path: &RelationPath) -> Result<Resolved> {
        path::evaluate(self, id, path)
    }
}

/// Typed accessors over [`EntityGraph::resolve`].
pub trait GraphExt: EntityGraph {
    /// Gets a subject by identifier, failing if it does not exist.
    fn require(&self, id: SubjectId) -> Result<Subject> {
        self.subject(id).ok_or(Error::UnknownSubject(id))
    }

    /// Resolves a path expected to reach exactly one subject.
    fn get_subject(&self, id: SubjectId, path: &RelationPath) -> Result<SubjectId> {
        match self.resolve(id, path)? {
            Resolved::Subject(s) => Ok(s),
            Resolved::Subjects(s) if s.len() == 1 => Ok(s[0]),
            other => Err(self.shape_error(id, path, "a single subject", &other)),
        }
    }

    /// Resolves a path expected to reach at most one subject.
    fn get_optional_subject(
        &self,
        id: SubjectId,
        path: &RelationPath,
    ) -> Result<Option<SubjectId>> {
        match self.resolve(id, path)? {
            Resolved::Missing => Ok(None),
            Resolved::Subject(s) => Ok(Some(s)),
            Resolved::Subjects(s) if s.len() <= 1 => Ok(s.first().copied()),
            other => Err(self.shape_error(id, path, "at most one subject", &other)),
        }
    }

    /// Resolves a path expected to reach any number of subjects.
    fn get_subjects(&self, id: SubjectId, path: &RelationPath) -> Result<Vec<SubjectId>> {
        match self.resolve(id, path)? {
            Resolved::Missing => Ok(Vec::new()),
            Resolved::Subject(s) => Ok(vec![s]),
            Resolved::Subjects(s) => Ok(s),
            other => Err(self.shape_error(id, path, "subjects", &other)),
        }
    }

    /// Resolves a path to a value.
    ///
    /// Subjects are returned as references and an unresolved optional hop is
    /// returned as [`Value::Null`].
    fn get_value(&self, id: SubjectId, path: &RelationPath) -> Result<Value> {
        Ok(match self.resolve(id, path)? {
            Resolved::Missing => Value::Null,
            Resolved::Scalar(v) => v,
            Resolved::Subject(s) => Value::Subject(s),
            Resolved::Subjects(s) => Value::Array(s.into_iter().map(Value::Subject).collect()),
        })
    }

    /// Resolves a path to a single text value.
    ///
    /// Strings are returned as is, other scalars are formatted, and subjects
    /// are represented by their name. Nulls and unresolved optional hops
    /// yield `None`.
    fn get_optional_text(&self, id: SubjectId, path: &RelationPath) -> Result<Option<String>> {
        let resolved = self.resolve(id, path)?;
        match &resolved {
            Resolved::Missing | Resolved::Scalar(Value::Null) => Ok(None),
            Resolved::Scalar(Value::String(s)) => Ok(Some(s.clone())),
            Resolved::Scalar(Value::Array(_)) => {
                Err(self.shape_error(id, path, "a single value", &resolved))
            }
            Resolved::Scalar(v) => Ok(Some(v.to_string())),
            Resolved::Subject(s) => self.require(*s).map(|s| Some(s.name)),
            Resolved::Subjects(_) => Err(self.shape_error(id, path, "a single value", &resolved)),
        }
    }

    /// Resolves a path to a single text value, failing if there is none.
    fn get_text(&self, id: SubjectId, path: &RelationPath) -> Result<String> {
        self.get_optional_text(id, path)?
            .ok_or_else(|| self.shape_error(id, path, "a value", &Resolved::Missing))
    }

    /// Resolves a path to a list of text values.
    ///
    /// A single value becomes a one-element list; nothing becomes an empty
    /// list.
    fn get_texts(&self, id: SubjectId, path: &RelationPath) -> Result<Vec<String>> {
        let text = |value: Value| -> Result<Option<String>> {
            Ok(match value {
                Value::Null => None,
                Value::String(s) => Some(s),
                Value::Subject(s) => Some(self.require(s)?.name),
                v => Some(v.to_string()),
            })
        };

        match self.resolve(id, path)? {
            Resolved::Missing => Ok(Vec::new()),
            Resolved::Scalar(Value::Array(values)) => {
                values.into_iter().filter_map(|v| text(v).transpose()).collect()
            }
            Resolved::Scalar(v) => Ok(text(v)?.into_iter().collect()),
            Resolved::Subject(s) => Ok(vec![self.require(s)?.name]),
            Resolved::Subjects(ids) => ids
                .into_iter()
                .map(|s| self.require(s).map(|s| s.name))
                .collect(),
        }
    }

    /// Creates a shape error for a path resolved from a subject.
    fn shape_error(
        &self,
        id: SubjectId,
        path: &RelationPath,
        expected: &'static str,
        found: &Resolved,
    ) -> Error {
        Error::Shape {
            subject: path::subject_name(self, id),
            path: path.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

impl<G: EntityGraph + ?Sized> GraphExt for G {}
