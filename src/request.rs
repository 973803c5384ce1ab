//! Job request assembly.
//!
//! A [`JobRequest`] is the document sent to the workflow submission service
//! for one logical unit of work. Its `context` is an audit object carried
//! through the workflow untouched; it travels as a JSON-encoded string inside
//! the request.

use std::fmt;

use lims_graph::Subject;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::Error;
use crate::Result;

/// The free-form audit context of a request.
pub type Context = serde_json::Map<String, JsonValue>;

/// The workflows accepted by the submission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workflow {
    /// ChIP-seq analysis of lane subsets.
    #[serde(rename = "chipseq", alias = "chip-seq")]
    ChipSeq,
    /// Export of ChIP-seq reads to a Terra workspace.
    #[serde(rename = "chip-seq-export")]
    ChipSeqExport,
    /// Demultiplexing of ChIP-seq pool aliquots.
    #[serde(rename = "chip-seq-import")]
    ChipSeqImport,
    /// Copy number variation analysis of alignments.
    #[serde(rename = "cnv")]
    Cnv,
    /// Generic BCL import of pool aliquots.
    #[serde(rename = "import")]
    Import,
    /// Demultiplexing of 10x pool aliquots.
    #[serde(rename = "10x-import")]
    TenxImport,
    /// Demultiplexing of SHARE-seq pool aliquots.
    #[serde(rename = "share-seq-import")]
    ShareSeqImport,
    /// The SHARE-seq processing pipeline.
    #[serde(rename = "share-seq-proto")]
    ShareSeqProto,
    /// UCSC track hub creation.
    #[serde(rename = "ucsc")]
    Ucsc,
}

impl Workflow {
    /// Gets the name of the workflow as sent to the submission service.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChipSeq => "chipseq",
            Self::ChipSeqExport => "chip-seq-export",
            Self::ChipSeqImport => "chip-seq-import",
            Self::Cnv => "cnv",
            Self::Import => "import",
            Self::TenxImport => "10x-import",
            Self::ShareSeqImport => "share-seq-import",
            Self::ShareSeqProto => "share-seq-proto",
            Self::Ucsc => "ucsc",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject identifier(s) of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectIds {
    /// The identifier of a single subject or aggregate.
    Single(u64),
    /// Comma-joined identifiers of a batch.
    Joined(String),
}

/// Describes the aggregate a request was launched for.
///
/// When present, the request is identified by the aggregate instead of the
/// subjects it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// The name of the aggregate.
    pub name: String,
    /// The subject type of the aggregate.
    #[serde(rename = "type")]
    pub kind: String,
    /// The identifier of the aggregate.
    pub uid: u64,
}

impl Aggregation {
    /// Creates the aggregation descriptor of a subject.
    pub fn of(subject: &Subject) -> Self {
        Self {
            name: subject.name.clone(),
            kind: subject.subject_type.clone(),
            uid: subject.id.get(),
        }
    }
}

/// A request to launch a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// The workflow to launch.
    pub workflow: Workflow,
    /// The name(s) of the subject(s) the request covers.
    pub subj_name: String,
    /// The identifier(s) of the subject(s) the request covers.
    pub subj_id: SubjectIds,
    /// The workflow-specific fields.
    #[serde(flatten)]
    pub payload: serde_json::Map<String, JsonValue>,
    /// The JSON-encoded audit context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl JobRequest {
    /// Decodes the audit context of the request.
    pub fn decode_context(&self) -> Result<Option<Context>> {
        self.context
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Into::into)
    }
}

/// Builds a [`JobRequest`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    /// The workflow to launch.
    workflow: Workflow,
    /// The subject name(s), once set.
    subj_name: Option<String>,
    /// The subject identifier(s), once set.
    subj_id: Option<SubjectIds>,
    /// The aggregate the request was launched for.
    aggregation: Option<Aggregation>,
    /// The workflow-specific fields.
    payload: serde_json::Map<String, JsonValue>,
    /// The audit context.
    context: Option<Context>,
}

impl RequestBuilder {
    /// Creates a builder for a workflow.
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            subj_name: None,
            subj_id: None,
            aggregation: None,
            payload: Default::default(),
            context: None,
        }
    }

    /// Identifies the request by a single subject.
    pub fn subject(mut self, subject: &Subject) -> Self {
        self.subj_name = Some(subject.name.clone());
        self.subj_id = Some(SubjectIds::Single(subject.id.get()));
        self
    }

    /// Identifies the request by a batch of subjects.
    ///
    /// Names and identifiers are comma-joined in the given order. An empty
    /// batch leaves the request unidentified.
    pub fn subjects<'a>(mut self, subjects: impl IntoIterator<Item = &'a Subject>) -> Self {
        let (names, ids): (Vec<_>, Vec<_>) = subjects
            .into_iter()
            .map(|s| (s.name.as_str(), s.id.to_string()))
            .unzip();

        if !names.is_empty() {
            self.subj_name = Some(names.join(","));
            self.subj_id = Some(SubjectIds::Joined(ids.join(",")));
        }
        self
    }

    /// Sets the aggregate the request was launched for.
    pub fn aggregation(mut self, aggregation: Option<Aggregation>) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Sets a workflow-specific field.
    pub fn field(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.payload.insert(name.to_string(), value.into());
        self
    }

    /// Sets the audit context.
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Builds the request.
    ///
    /// An aggregation takes precedence over the subjects for identifying the
    /// request and is recorded in the context.
    pub fn build(self) -> Result<JobRequest> {
        let Self {
            workflow,
            subj_name,
            subj_id,
            aggregation,
            payload,
            mut context,
        } = self;

        let (subj_name, subj_id) = match aggregation {
            Some(aggregation) => {
                let identity = (aggregation.name.clone(), SubjectIds::Single(aggregation.uid));
                context
                    .get_or_insert_with(Context::new)
                    .insert("aggregation".to_string(), serde_json::to_value(aggregation)?);
                identity
            }
            None => subj_name
                .zip(subj_id)
                .ok_or(Error::EmptyBatch(workflow.as_str()))?,
        };

        Ok(JobRequest {
            workflow,
            subj_name,
            subj_id,
            payload,
            context: context.map(|c| serde_json::to_string(&c)).transpose()?,
        })
    }
}
