//! Free-text and choice parameters supplied by the LIMS host.
//!
//! The host exposes workflow options as user-defined fields keyed by their
//! display name. Several workflows reuse the host's generic
//! `text_attribute_for_tasks*` fields, so the constants below name what each
//! key means for the workflow that reads it.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// The genome name for `chipseq` requests.
pub const GENOME: &str = "text_attribute_for_tasks";

/// The Terra project for `chip-seq-export` requests.
pub const TERRA_PROJECT: &str = "text_attribute_for_tasks";

/// The Terra workspace name for `chip-seq-export` requests.
pub const WORKSPACE_NAME: &str = "text_attribute_for_tasks2";

/// The species common name used to pick a default genome for
/// `chip-seq-import` requests.
pub const SPECIES: &str = "text_attribute_for_tasks2";

/// The on-premises parent directory of BCL folders for `chip-seq-import`
/// requests.
pub const BCL_PARENT: &str = "text_attribute_for_tasks3";

/// The on-premises parent directory of BCL folders for `import` requests.
pub const IMPORT_BCL_PARENT: &str = "text_attribute_for_tasks2";

/// The sequencing technology of an import.
pub const SEQUENCING_TECHNOLOGY: &str = "Sequencing Technology";

/// The sequencing schema used to select candidate molecular barcodes.
pub const SEQUENCING_SCHEMA: &str = "Sequencing Schema";

/// The BCL folder for 10x and SHARE-seq imports.
pub const HISEQ_FOLDER: &str = "HiSeq Folder Name";

/// The delivery bucket for 10x imports.
pub const DATA_BUCKET: &str = "Data delivery bucket";

/// A map of parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(IndexMap<String, String>);

impl Params {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, returning the updated map.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Gets a parameter.
    ///
    /// Blank values are treated as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Gets a parameter that must be set.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
