//! Subjects of the LIMS graph.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// The stable numeric identifier of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl SubjectId {
    /// Gets the raw numeric identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A host-managed entity such as a lane subset, a pool aliquot or an
/// alignment post processing record.
///
/// Subjects are owned by the LIMS; this crate only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Subject {
    /// The identifier of the subject.
    pub id: SubjectId,
    /// The name of the subject type (e.g. `Lane Subset`).
    #[serde(rename = "type")]
    pub subject_type: String,
    /// The human-readable name of the subject.
    pub name: String,
    /// When the subject was last updated.
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
