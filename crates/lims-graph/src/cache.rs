//! Memoization of relation path resolution.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;

use tracing::trace;

use crate::EntityGraph;
use crate::Filter;
use crate::RelationPath;
use crate::Resolved;
use crate::Result;
use crate::Subject;
use crate::SubjectId;
use crate::Value;
use crate::path;

/// A graph wrapper that memoizes resolved relation paths.
///
/// The cache lives for as long as the wrapper does, which is meant to be a
/// single batch. Only successful resolutions are cached.
#[derive(Debug)]
pub struct CachedGraph<'a, G: ?Sized> {
    /// The wrapped graph.
    inner: &'a G,
    /// The resolved paths, keyed by starting subject and path.
    resolved: RefCell<HashMap<(SubjectId, RelationPath), Resolved>>,
    /// The number of resolutions served from the cache.
    hits: Cell<usize>,
}

impl<'a, G: EntityGraph + ?Sized> CachedGraph<'a, G> {
    /// Wraps a graph with an empty cache.
    pub fn new(inner: &'a G) -> Self {
        Self {
            inner,
            resolved: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
        }
    }

    /// Gets the number of cached resolutions.
    pub fn len(&self) -> usize {
        self.resolved.borrow().len()
    }

    /// Returns `true` if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.resolved.borrow().is_empty()
    }

    /// Gets the number of resolutions served from the cache.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }
}

impl<G: EntityGraph + ?Sized> EntityGraph for CachedGraph<'_, G> {
    fn subject(&self, id: SubjectId) -> Option<Subject> {
        self.inner.subject(id)
    }

    fn attribute(&self, id: SubjectId, name: &str) -> Option<Value> {
        self.inner.attribute(id, name)
    }

    fn find(&self, subject_type: &str, filter: &Filter, limit: usize) -> Result<Vec<SubjectId>> {
        self.inner.find(subject_type, filter, limit)
    }

    fn find_by_name(&self, subject_type: &str, name: &str) -> Option<SubjectId> {
        self.inner.find_by_name(subject_type, name)
    }

    fn resolve(&self, id: SubjectId, path: &RelationPath) -> Result<Resolved> {
        let key = (id, path.clone());
        if let Some(resolved) = self.resolved.borrow().get(&key) {
            trace!("cache hit for `{path}` from subject `{id}`");
            self.hits.set(self.hits.get() + 1);
            return Ok(resolved.clone());
        }

        let resolved = path::evaluate(self.inner, id, path)?;
        self.resolved.borrow_mut().insert(key, resolved.clone());
        Ok(resolved)
    }
}
