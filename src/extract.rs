//! Field extraction from the LIMS subject graph.
//!
//! Extractors walk the sample-preparation lineage of a subject and flatten
//! what they find into an [`ExtractedRecord`]. They never fail because a
//! leaf value is absent; the record simply lacks the field and the
//! [`Validator`](crate::validate::Validator) reports it. A missing
//! intermediate entity of the lineage is a [`NotFound`](lims_graph::Error)
//! error.

use std::sync::LazyLock;

use chrono::Datelike;
use chrono::NaiveDate;
use indexmap::IndexMap;
use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use lims_graph::Value;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::Error;
use crate::Result;

pub mod chipseq;
pub mod cnv;

/// The maximum number of subjects a graph query may return.
pub const QUERY_LIMIT: usize = 30_000;

/// The library name prefix selecting the Mint-ChIP lineage.
pub const MINT_PREFIX: &str = "Mint";

/// From a lane subset to its pool component.
pub(crate) static POOL_COMPONENT: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("Component of Pooled SeqReq")
        .hop("CoPA")
        .hop("Pool Component")
});

/// From a CoPA to its library.
pub(crate) static COPA_LIBRARY: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Pool Component").hop("Library"));

/// From a chromatin prep to its biological sample.
pub(crate) static BIOLOGICAL_SAMPLE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("BioSAli").hop("Biological Sample"));

/// From a Mint library to its ChIP.
static MINT_CHIP: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("In Vitro Transcript")
        .hop("MoIVT")
        .hop("MoMint-ChIP")
});

/// From a Mint library to its chromatin prep.
static MINT_CHROMATIN_PREP: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("In Vitro Transcript")
        .hop("Mint-ChIP")
        .hop("CoMoChrPrp")
        .hop("Chromatin Prep")
});

/// From a ChIP library to its ChIP.
static CHIP: LazyLock<RelationPath> = LazyLock::new(|| RelationPath::new().hop("ChIP"));

/// From a ChIP library to its chromatin prep.
static CHIP_CHROMATIN_PREP: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("ChIP").hop("Chromatin Prep"));

/// Matches the instrument model in a free-text instrument description.
static INSTRUMENT_MODEL: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: this is checked statically with tests to always unwrap.
    Regex::new(r"\w+Seq").unwrap()
});

/// The lineage branch of a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LibraryBranch {
    /// A Mint-ChIP library, reached through its in vitro transcript.
    Mint,
    /// A ChIP library.
    Chip,
}

impl LibraryBranch {
    /// Determines the branch of a library from its name.
    ///
    /// Only names starting with `Mint` select the Mint branch.
    pub fn of(library_name: &str) -> Self {
        if library_name.starts_with(MINT_PREFIX) {
            Self::Mint
        } else {
            Self::Chip
        }
    }

    /// Gets the path from a library to its ChIP.
    pub fn chip(self) -> &'static RelationPath {
        match self {
            Self::Mint => &MINT_CHIP,
            Self::Chip => &CHIP,
        }
    }

    /// Gets the path from a library to its chromatin prep.
    pub fn chromatin_prep(self) -> &'static RelationPath {
        match self {
            Self::Mint => &MINT_CHROMATIN_PREP,
            Self::Chip => &CHIP_CHROMATIN_PREP,
        }
    }

    /// Gets the biological sample relation listing alignments of the branch.
    pub fn sample_alignments(self) -> &'static str {
        match self {
            Self::Mint => "Alignment SBR (BioSam) (Mint-ChIP)",
            Self::Chip => "Alignment SBR (BioSam) (ChIP)",
        }
    }

    /// Gets the subject type of libraries of the branch.
    pub fn library_type(self) -> &'static str {
        match self {
            Self::Mint => "Mint_DNA_Lib",
            Self::Chip => "DNA_Lib",
        }
    }
}

/// A flat, ordered map of field name to value extracted for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    /// The subject the record was extracted from.
    pub subject: SubjectId,
    /// The name of the subject.
    pub name: String,
    /// The extracted fields, in extraction order.
    fields: IndexMap<String, JsonValue>,
}

impl ExtractedRecord {
    /// Creates an empty record for a subject.
    pub fn new(subject: SubjectId, name: impl Into<String>) -> Self {
        Self {
            subject,
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Sets a field.
    pub fn insert(&mut self, field: &str, value: impl Into<JsonValue>) -> &mut Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Sets a field if a value is present.
    pub fn insert_some(&mut self, field: &str, value: Option<impl Into<JsonValue>>) -> &mut Self {
        if let Some(value) = value {
            self.insert(field, value);
        }
        self
    }

    /// Gets a field.
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    /// Gets a field as a string slice.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(JsonValue::as_str)
    }

    /// Determines if a field carries a value.
    ///
    /// Absent fields, nulls and empty arrays carry no value.
    pub fn has(&self, field: &str) -> bool {
        match self.get(field) {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Gets the fields of the record.
    pub fn fields(&self) -> &IndexMap<String, JsonValue> {
        &self.fields
    }

    /// Creates a JSON object from the given fields of the record, in the
    /// given order.
    ///
    /// Fields the record lacks are omitted.
    pub fn project(&self, fields: &[&str]) -> serde_json::Map<String, JsonValue> {
        fields
            .iter()
            .filter_map(|f| self.fields.get(*f).map(|v| (f.to_string(), v.clone())))
            .collect()
    }
}

/// Parses the instrument model out of a free-text instrument description.
///
/// For example, `Illumina NextSeq 500` yields `NextSeq`.
pub fn parse_instrument_model(subject: &str, instrument: &str) -> Result<String> {
    INSTRUMENT_MODEL
        .find(instrument)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::Parse {
            subject: subject.to_string(),
            what: "the instrument model",
            input: instrument.to_string(),
        })
}

/// Formats a run date as `YY-M-DT00:00:00`.
///
/// The year is reduced to its last two digits and the month and day are not
/// padded.
pub fn format_run_date(date: NaiveDate) -> String {
    format!(
        "{year:02}-{month}-{day}T00:00:00",
        year = date.year().rem_euclid(100),
        month = date.month(),
        day = date.day()
    )
}

/// Parses a run date stored as text by the host.
///
/// Accepts ISO dates and timestamps as well as `MM/DD/YYYY`.
pub fn parse_run_date(subject: &str, text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text.get(..10).unwrap_or(text), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .map_err(|_| Error::Parse {
            subject: subject.to_string(),
            what: "the run date",
            input: text.to_string(),
        })
}

/// Strips the `HOMER -` prefix from a preferred segmenter.
pub fn normalize_segmenter(segmenter: &str) -> String {
    segmenter.replace("HOMER -", "").trim().to_string()
}

/// Formats the description of a lane subset.
pub fn description(technology: &str, epitope: &str, species: &str, cell_type: &str) -> String {
    format!("{technology}-Seq analysis of {epitope} in {species} {cell_type} cells")
}

/// Converts an attribute value to JSON.
///
/// Subjects are represented by their name and dates by their ISO form.
pub fn to_json<G: EntityGraph + ?Sized>(graph: &G, value: Value) -> lims_graph::Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => b.into(),
        Value::Integer(i) => i.into(),
        Value::Float(f) => f.into(),
        Value::String(s) => s.into(),
        Value::Date(d) => d.to_string().into(),
        Value::Subject(id) => graph.require(id)?.name.into(),
        Value::Array(values) => values
            .into_iter()
            .map(|v| to_json(graph, v))
            .collect::<lims_graph::Result<Vec<_>>>()?
            .into(),
    })
}

/// Replaces spaces and underscores with dashes.
pub fn sanitize(name: &str) -> String {
    name.replace([' ', '_'], "-")
}
