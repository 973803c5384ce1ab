//! Declarative relation paths and their interpreter.
//!
//! A relation path is a chain of named relations walked from a starting
//! subject, written in the same syntax the LIMS query builder uses:
//!
//! ```text
//! "Component of Pooled SeqReq"->"CoPA"->"Pool Component"->"Library"["Mint_DNA_Lib"]->name
//! ```
//!
//! Each quoted segment is a hop. A hop may carry a subject type guard in
//! brackets (the hop only yields subjects of that type) and may be suffixed
//! with `?` to mark it optional. A trailing bare `name` or `id` segment
//! projects the reached subject(s) onto their name or identifier. Bare
//! segments other than `name` and `id` are hops as well, which allows plain
//! attribute names such as `Reference Sequence` to be used as paths.

use std::fmt;
use std::str::FromStr;

use crate::EntityGraph;
use crate::Error;
use crate::Result;
use crate::SubjectId;
use crate::Value;

/// A single hop of a relation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hop {
    /// The name of the relation or attribute to follow.
    pub relation: String,
    /// The subject type the hop is restricted to, if any.
    pub subject_type: Option<String>,
    /// Whether a hop yielding nothing ends the walk instead of failing it.
    pub optional: bool,
}

impl Hop {
    /// Determines if the given subject passes the hop's type guard.
    fn admits<G: EntityGraph + ?Sized>(&self, graph: &G, id: SubjectId) -> bool {
        match &self.subject_type {
            Some(ty) => graph
                .subject(id)
                .is_some_and(|s| s.subject_type == *ty),
            None => true,
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.relation)?;
        if let Some(ty) = &self.subject_type {
            write!(f, "[\"{ty}\"]")?;
        }
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// What a relation path yields once its last hop has been taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// The value reached by the last hop.
    #[default]
    Value,
    /// The name of the reached subject(s).
    Name,
    /// The identifier of the reached subject(s).
    Id,
}

/// A typed relation path expression.
///
/// Paths are plain data: they can be parsed, printed, compared and composed
/// without a graph, and are interpreted against an [`EntityGraph`] with
/// [`EntityGraph::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RelationPath {
    /// The hops of the path, in walking order.
    hops: Vec<Hop>,
    /// The projection applied after the last hop.
    terminal: Terminal,
}

impl RelationPath {
    /// Creates an empty path, which resolves to the starting subject itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a required hop.
    pub fn hop(mut self, relation: impl Into<String>) -> Self {
        self.hops.push(Hop {
            relation: relation.into(),
            subject_type: None,
            optional: false,
        });
        self
    }

    /// Appends a required hop restricted to subjects of the given type.
    pub fn hop_as(mut self, relation: impl Into<String>, subject_type: impl Into<String>) -> Self {
        self.hops.push(Hop {
            relation: relation.into(),
            subject_type: Some(subject_type.into()),
            optional: false,
        });
        self
    }

    /// Appends an optional hop.
    pub fn maybe(mut self, relation: impl Into<String>) -> Self {
        self.hops.push(Hop {
            relation: relation.into(),
            subject_type: None,
            optional: true,
        });
        self
    }

    /// Projects the reached subject(s) onto their name.
    pub fn name(mut self) -> Self {
        self.terminal = Terminal::Name;
        self
    }

    /// Projects the reached subject(s) onto their identifier.
    pub fn id(mut self) -> Self {
        self.terminal = Terminal::Id;
        self
    }

    /// Creates a new path walking `self` and then `other`.
    ///
    /// The terminal of `other` replaces the terminal of `self`.
    pub fn then(&self, other: &RelationPath) -> Self {
        let mut hops = self.hops.clone();
        hops.extend(other.hops.iter().cloned());
        Self {
            hops,
            terminal: other.terminal,
        }
    }

    /// Gets the hops of the path.
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Gets the terminal projection of the path.
    pub fn terminal(&self) -> Terminal {
        self.terminal
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hop) in self.hops.iter().enumerate() {
            if i > 0 {
                f.write_str("->")?;
            }
            write!(f, "{hop}")?;
        }

        let terminal = match self.terminal {
            Terminal::Value => return Ok(()),
            Terminal::Name => "name",
            Terminal::Id => "id",
        };

        if !self.hops.is_empty() {
            f.write_str("->")?;
        }
        f.write_str(terminal)
    }
}

impl FromStr for RelationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let mut path = RelationPath::new();
        let mut rest = s.trim();
        if rest.is_empty() {
            return Err(invalid("the path is empty"));
        }

        loop {
            if path.terminal != Terminal::Value {
                return Err(invalid("`name` and `id` must be the last segment"));
            }

            let after = if let Some(quoted) = rest.strip_prefix('"') {
                let end = quoted
                    .find('"')
                    .ok_or_else(|| invalid("unterminated quoted relation"))?;
                let relation = &quoted[..end];
                if relation.is_empty() {
                    return Err(invalid("empty relation name"));
                }

                let mut after = &quoted[end + 1..];
                let mut subject_type = None;
                if let Some(guard) = after.strip_prefix("[\"") {
                    let end = guard
                        .find("\"]")
                        .ok_or_else(|| invalid("unterminated subject type guard"))?;
                    subject_type = Some(guard[..end].to_string());
                    after = &guard[end + 2..];
                }

                let optional = match after.strip_prefix('?') {
                    Some(a) => {
                        after = a;
                        true
                    }
                    None => false,
                };

                path.hops.push(Hop {
                    relation: relation.to_string(),
                    subject_type,
                    optional,
                });
                after
            } else {
                let end = rest.find("->").unwrap_or(rest.len());
                let word = rest[..end].trim();
                match word {
                    "" => return Err(invalid("empty segment")),
                    "name" => path.terminal = Terminal::Name,
                    "id" => path.terminal = Terminal::Id,
                    word => {
                        let (relation, optional) = match word.strip_suffix('?') {
                            Some(r) => (r.trim_end(), true),
                            None => (word, false),
                        };
                        path.hops.push(Hop {
                            relation: relation.to_string(),
                            subject_type: None,
                            optional,
                        });
                    }
                }
                &rest[end..]
            };

            let after = after.trim_start();
            if after.is_empty() {
                break;
            }

            rest = after
                .strip_prefix("->")
                .ok_or_else(|| invalid("expected `->` between segments"))?
                .trim_start();
            if rest.is_empty() {
                return Err(invalid("the path ends with `->`"));
            }
        }

        Ok(path)
    }
}

/// The result of resolving a relation path.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// An optional hop yielded nothing.
    Missing,
    /// A scalar (or array) attribute value.
    Scalar(Value),
    /// A single subject.
    Subject(SubjectId),
    /// A collection of subjects from a multi-valued relation; may be empty.
    Subjects(Vec<SubjectId>),
}

impl Resolved {
    /// Gets a short description of the shape for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "nothing",
            Self::Scalar(_) => "a scalar",
            Self::Subject(_) => "a subject",
            Self::Subjects(_) => "a collection of subjects",
        }
    }
}

/// Resolves a relation path from the given starting subject.
///
/// * A required hop that yields no entity fails with [`Error::NotFound`].
/// * An optional hop that yields no entity resolves to [`Resolved::Missing`].
/// * A multi-valued relation with zero targets resolves to an empty
///   [`Resolved::Subjects`]; hops after a multi-valued relation are applied to
///   every target and the results are flattened in order.
pub fn evaluate<G: EntityGraph + ?Sized>(
    graph: &G,
    start: SubjectId,
    path: &RelationPath,
) -> Result<Resolved> {
    if graph.subject(start).is_none() {
        return Err(Error::UnknownSubject(start));
    }

    let resolved = walk(graph, start, path, 0)?;
    project(graph, start, path, resolved)
}

/// Walks the hops of `path` from `index` onwards, starting at `current`.
fn walk<G: EntityGraph + ?Sized>(
    graph: &G,
    current: SubjectId,
    path: &RelationPath,
    index: usize,
) -> Result<Resolved> {
    let Some(hop) = path.hops.get(index) else {
        return Ok(Resolved::Subject(current));
    };

    let last = index + 1 == path.hops.len();
    match step(graph, current, hop, path)? {
        Resolved::Missing => Ok(Resolved::Missing),
        Resolved::Subject(next) => walk(graph, next, path, index + 1),
        Resolved::Subjects(ids) if last => Ok(Resolved::Subjects(ids)),
        Resolved::Subjects(ids) => {
            let mut subjects = Vec::new();
            let mut scalars = Vec::new();
            for id in ids {
                match walk(graph, id, path, index + 1)? {
                    Resolved::Missing => {}
                    Resolved::Subject(s) => subjects.push(s),
                    Resolved::Subjects(s) => subjects.extend(s),
                    Resolved::Scalar(Value::Array(values)) => scalars.extend(values),
                    Resolved::Scalar(value) => scalars.push(value),
                }
            }

            match (subjects.is_empty(), scalars.is_empty()) {
                (_, true) => Ok(Resolved::Subjects(subjects)),
                (true, false) => Ok(Resolved::Scalar(Value::Array(scalars))),
                (false, false) => Err(Error::Shape {
                    subject: subject_name(graph, current),
                    path: path.to_string(),
                    expected: "subjects or scalars",
                    found: "a mix of subjects and scalars",
                }),
            }
        }
        Resolved::Scalar(value) if last => Ok(Resolved::Scalar(value)),
        Resolved::Scalar(value) => Err(Error::NotTraversable {
            subject: subject_name(graph, current),
            path: path.to_string(),
            hop: hop.relation.clone(),
            kind: value.kind(),
        }),
    }
}

/// Takes a single hop from `current`.
fn step<G: EntityGraph + ?Sized>(
    graph: &G,
    current: SubjectId,
    hop: &Hop,
    path: &RelationPath,
) -> Result<Resolved> {
    let missing = || {
        if hop.optional {
            Ok(Resolved::Missing)
        } else {
            Err(Error::NotFound {
                subject: subject_name(graph, current),
                path: path.to_string(),
                hop: hop.relation.clone(),
            })
        }
    };

    match graph.attribute(current, &hop.relation) {
        None | Some(Value::Null) => missing(),
        Some(Value::Subject(id)) if hop.admits(graph, id) => Ok(Resolved::Subject(id)),
        Some(Value::Subject(_)) => missing(),
        Some(Value::Array(items)) if items.iter().all(|v| v.as_subject().is_some()) => {
            Ok(Resolved::Subjects(
                items
                    .iter()
                    .filter_map(Value::as_subject)
                    .filter(|id| hop.admits(graph, *id))
                    .collect(),
            ))
        }
        Some(value) => Ok(Resolved::Scalar(value)),
    }
}

/// Applies the terminal projection of `path` to a walk result.
fn project<G: EntityGraph + ?Sized>(
    graph: &G,
    start: SubjectId,
    path: &RelationPath,
    resolved: Resolved,
) -> Result<Resolved> {
    let field = |id: SubjectId| -> Result<Value> {
        let subject = graph.subject(id).ok_or(Error::UnknownSubject(id))?;
        Ok(match path.terminal {
            Terminal::Name => Value::String(subject.name),
            _ => Value::Integer(subject.id.get() as i64),
        })
    };

    match (path.terminal, resolved) {
        (Terminal::Value, resolved) | (_, resolved @ Resolved::Missing) => Ok(resolved),
        (_, Resolved::Subject(id)) => field(id).map(Resolved::Scalar),
        (_, Resolved::Subjects(ids)) => Ok(Resolved::Scalar(Value::Array(
            ids.into_iter().map(field).collect::<Result<_>>()?,
        ))),
        (_, resolved @ Resolved::Scalar(_)) => Err(Error::Shape {
            subject: subject_name(graph, start),
            path: path.to_string(),
            expected: "a subject",
            found: resolved.kind(),
        }),
    }
}

/// Gets the display name of a subject, falling back to its identifier.
pub(crate) fn subject_name<G: EntityGraph + ?Sized>(graph: &G, id: SubjectId) -> String {
    graph
        .subject(id)
        .map(|s| s.name)
        .unwrap_or_else(|| id.to_string())
}
