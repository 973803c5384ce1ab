//! Errors raised while assembling and submitting job requests.

use crate::validate::ValidationErrors;
use crate::validate::Violation;

/// An error raised while launching a workflow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A relation path could not be resolved.
    ///
    /// This includes a required hop yielding no entity.
    #[error(transparent)]
    Graph(#[from] lims_graph::Error),

    /// A free-text field could not be parsed.
    #[error("could not parse {what} for `{subject}` from `{input}`")]
    Parse {
        /// The name of the subject the field belongs to.
        subject: String,
        /// A description of the value being parsed.
        what: &'static str,
        /// The text that failed to parse.
        input: String,
    },

    /// The batch failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The batch contained no subjects.
    #[error("no subjects were provided for the `{0}` workflow")]
    EmptyBatch(&'static str),

    /// An input control override names an entity that does not exist.
    #[error("Input Control Override for `{subject}` doesn't exist: `{control}`")]
    OverrideNotFound {
        /// The name of the subject carrying the override.
        subject: String,
        /// The override value.
        control: String,
    },

    /// No control candidate exists and no override was set.
    #[error(
        "`{sample}` doesn't have any WCE(s), and no Input Control Override was set for \
         `{subject}`"
    )]
    NoControlFound {
        /// The name of the subject needing a control.
        subject: String,
        /// The name of the subject's biological sample.
        sample: String,
    },

    /// The resolved control lacks its CNV ratios BED reference.
    #[error("`{subject}` depends on WCE `{control}`, which is missing a CNV Ratios BED URI")]
    MissingControlArtifact {
        /// The name of the dependent subject.
        subject: String,
        /// The name of the control.
        control: String,
    },

    /// The submission endpoint could not be reached or gave an unusable
    /// response.
    #[error("failed to submit jobs to `{endpoint}`: {reason}")]
    SubmissionTransport {
        /// The endpoint the jobs were submitted to.
        endpoint: String,
        /// The reason the submission failed.
        reason: String,
    },

    /// The pipeline version could not be looked up.
    #[error("failed to look up the pipeline version from `{url}`: {reason}")]
    VersionLookup {
        /// The URL the version was looked up from.
        url: String,
        /// The reason the lookup failed.
        reason: String,
    },

    /// A required parameter was not supplied.
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    /// A parameter has an unsupported value.
    #[error("invalid value `{value}` for `{parameter}`: {reason}")]
    InvalidParameter {
        /// The name of the parameter.
        parameter: String,
        /// The supplied value.
        value: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// A request could not be encoded.
    #[error("failed to encode request: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Violation> for Error {
    fn from(violation: Violation) -> Self {
        Self::Validation(violation.into())
    }
}

/// A [`Result`](std::result::Result) with an [`Error`](enum@self::Error).
pub type Result<T> = std::result::Result<T, Error>;
