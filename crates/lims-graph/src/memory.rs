//! An in-memory subject graph.
//!
//! [`MemoryGraph`] is the graph the host hands over as a serialized
//! snapshot, and the graph tests build lineages in.

use chrono::DateTime;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::EntityGraph;
use crate::Filter;
use crate::Result;
use crate::Subject;
use crate::SubjectId;
use crate::Value;

/// A subject together with its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// The subject.
    #[serde(flatten)]
    pub subject: Subject,
    /// The attributes and relations of the subject, by name.
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
}

/// The serialized form of a [`MemoryGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The subjects of the graph, in insertion order.
    pub subjects: Vec<SubjectRecord>,
}

/// A subject graph held entirely in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Snapshot", into = "Snapshot")]
pub struct MemoryGraph {
    /// The subject records by identifier, in insertion order.
    records: IndexMap<SubjectId, SubjectRecord>,
    /// The identifier given to the next inserted subject.
    next_id: u64,
}

impl MemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Inserts a new subject and returns its identifier.
    ///
    /// Identifiers are allocated in increasing order.
    pub fn insert(
        &mut self,
        subject_type: impl Into<String>,
        name: impl Into<String>,
    ) -> SubjectId {
        let id = SubjectId(self.next_id);
        self.insert_subject(Subject {
            id,
            subject_type: subject_type.into(),
            name: name.into(),
            updated_at: DateTime::<Utc>::default(),
        })
    }

    /// Inserts a fully specified subject, replacing any subject with the same
    /// identifier, and returns its identifier.
    pub fn insert_subject(&mut self, subject: Subject) -> SubjectId {
        let id = subject.id;
        self.next_id = self.next_id.max(id.get() + 1);
        self.records.insert(
            id,
            SubjectRecord {
                subject,
                attributes: IndexMap::new(),
            },
        );
        id
    }

    /// Sets an attribute or relation on a subject.
    pub fn set(&mut self, id: SubjectId, attribute: &str, value: impl Into<Value>) -> &mut Self {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.attributes.insert(attribute.to_string(), value.into());
            }
            None => warn!("ignoring attribute `{attribute}` for unknown subject `{id}`"),
        }
        self
    }

    /// Sets the last update time of a subject.
    pub fn touch(&mut self, id: SubjectId, updated_at: DateTime<Utc>) -> &mut Self {
        match self.records.get_mut(&id) {
            Some(record) => record.subject.updated_at = updated_at,
            None => warn!("ignoring update time for unknown subject `{id}`"),
        }
        self
    }

    /// Gets the number of subjects in the graph.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the graph has no subjects.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the subjects of the graph in insertion order.
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.records.values().map(|r| &r.subject)
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Snapshot> for MemoryGraph {
    fn from(snapshot: Snapshot) -> Self {
        let mut graph = Self::new();
        for record in snapshot.subjects {
            let id = graph.insert_subject(record.subject);
            graph.records[&id].attributes = record.attributes;
        }
        graph
    }
}

impl From<MemoryGraph> for Snapshot {
    fn from(graph: MemoryGraph) -> Self {
        Self {
            subjects: graph.records.into_values().collect(),
        }
    }
}

impl EntityGraph for MemoryGraph {
    fn subject(&self, id: SubjectId) -> Option<Subject> {
        self.records.get(&id).map(|r| r.subject.clone())
    }

    fn attribute(&self, id: SubjectId, name: &str) -> Option<Value> {
        self.records
            .get(&id)
            .and_then(|r| r.attributes.get(name).cloned())
    }

    fn find(&self, subject_type: &str, filter: &Filter, limit: usize) -> Result<Vec<SubjectId>> {
        let mut found = Vec::new();
        for record in self.records.values() {
            if found.len() >= limit {
                break;
            }

            if record.subject.subject_type == subject_type
                && filter.matches(self, record.subject.id)?
            {
                found.push(record.subject.id);
            }
        }

        debug!(
            "found {count} `{subject_type}` subject(s) (limit {limit})",
            count = found.len()
        );
        Ok(found)
    }

    fn find_by_name(&self, subject_type: &str, name: &str) -> Option<SubjectId> {
        self.records
            .values()
            .find(|r| r.subject.subject_type == subject_type && r.subject.name == name)
            .map(|r| r.subject.id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::RelationPath;

    #[test]
    fn allocates_increasing_ids() {
        let mut graph = MemoryGraph::new();
        let a = graph.insert("Lane Subset", "LS-1");
        let b = graph.insert_subject(Subject {
            id: SubjectId(10),
            subject_type: "Lane Subset".to_string(),
            name: "LS-10".to_string(),
            updated_at: Default::default(),
        });
        let c = graph.insert("Lane Subset", "LS-11");
        assert_eq!((a, b, c), (SubjectId(1), SubjectId(10), SubjectId(11)));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn find_respects_type_filter_and_limit() {
        let mut graph = MemoryGraph::new();
        for i in 0..5 {
            let app = graph.insert("Alignment Post Processing", format!("APP-{i}"));
            graph.set(app, "Epitopes", if i % 2 == 0 { "WCE" } else { "H3K4me3" });
        }
        graph.insert("Epitope", "WCE");

        let filter = Filter::eq(RelationPath::new().hop("Epitopes"), "WCE");
        let all = graph
            .find("Alignment Post Processing", &filter, usize::MAX)
            .unwrap();
        assert_eq!(all, vec![SubjectId(1), SubjectId(3), SubjectId(5)]);

        let limited = graph.find("Alignment Post Processing", &filter, 2).unwrap();
        assert_eq!(limited, vec![SubjectId(1), SubjectId(3)]);

        assert_eq!(graph.find_by_name("Epitope", "WCE"), Some(SubjectId(6)));
        assert_eq!(graph.find_by_name("Epitope", "H3K4me3"), None);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut graph = MemoryGraph::new();
        let ls = graph.insert("Lane Subset", "LS-1");
        let lib = graph.insert("DNA_Lib", "Lib-1");
        graph
            .set(ls, "Library", lib)
            .set(ls, "Sequencing Run Date", chrono::NaiveDate::from_ymd_opt(2019, 3, 7).unwrap())
            .set(lib, "Cell Types", vec!["K562"])
            .touch(lib, Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());

        let json = serde_json::to_string(&graph).unwrap();
        let mut restored: MemoryGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.subject(lib), graph.subject(lib));
        assert_eq!(restored.attribute(ls, "Library"), Some(Value::Subject(lib)));
        assert_eq!(
            restored.attribute(lib, "Cell Types"),
            Some(Value::from(vec!["K562"]))
        );
        assert_eq!(restored.insert("Lane Subset", "LS-3").get(), 3);
    }

    #[test]
    fn reads_host_snapshot() {
        let json = r#"{
            "subjects": [
                {
                    "id": 7,
                    "type": "Lane Subset",
                    "name": "LS-7",
                    "updated_at": "2021-05-01T00:00:00Z",
                    "attributes": {
                        "Instrument Model": { "string": "Illumina NextSeq 500" },
                        "terminated": { "boolean": false },
                        "Library": { "subject": 8 }
                    }
                },
                { "id": 8, "type": "DNA_Lib", "name": "Lib-8" }
            ]
        }"#;

        let graph: MemoryGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.attribute(SubjectId(7), "Library"),
            Some(Value::Subject(SubjectId(8)))
        );
        assert_eq!(graph.subject(SubjectId(8)).unwrap().name, "Lib-8");
    }
}
