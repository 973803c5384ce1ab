//! Batch consistency validation.
//!
//! A [`Validator`] declares which fields every record of a batch must carry
//! and which fields must hold the same value across the batch. Validation
//! reports every violation in the batch at once.

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::extract::ExtractedRecord;

/// What to do when a uniform field has more than one distinct value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UniformPolicy {
    /// Fail the batch.
    #[default]
    Fail,
    /// Use no value for the field.
    NullOnConflict,
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A record lacks a required field.
    MissingField {
        /// The name of the subject the record was extracted from.
        subject: String,
        /// The missing field.
        field: String,
    },
    /// A uniform field has more than one distinct value across the batch.
    BatchInconsistency {
        /// The display name of the field.
        field: String,
        /// The distinct values, in first-seen order.
        values: Vec<JsonValue>,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { subject, field } => write!(f, "`{subject}` is missing `{field}`"),
            Self::BatchInconsistency { field, values } => {
                write!(f, "found subjects with unequal {field}: ")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
        }
    }
}

/// The violations of a batch that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    /// Gets the violations.
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }
}

impl From<Violation> for ValidationErrors {
    fn from(violation: Violation) -> Self {
        Self(vec![violation])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [violation] => write!(f, "{violation}"),
            violations => {
                write!(f, "{count} validation errors:", count = violations.len())?;
                for violation in violations {
                    write!(f, "\n  {violation}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// A field whose value must be the same across a batch.
#[derive(Debug, Clone)]
struct UniformField {
    /// The record field.
    field: String,
    /// The name reported for the field.
    label: String,
    /// The policy applied on conflict.
    policy: UniformPolicy,
}

/// The distinct values of selected fields across a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// The distinct values per field, in first-seen order.
    values: IndexMap<String, Vec<JsonValue>>,
    /// Fields whose conflicting values were discarded.
    nulled: Vec<String>,
}

impl BatchSummary {
    /// Folds a batch of records into the distinct values of `fields`.
    ///
    /// Records without a value for a field do not contribute to it.
    pub fn fold<'a>(
        fields: &[&str],
        records: impl IntoIterator<Item = &'a ExtractedRecord>,
    ) -> Self {
        let mut values: IndexMap<String, Vec<JsonValue>> =
            fields.iter().map(|f| (f.to_string(), Vec::new())).collect();
        for record in records {
            for (field, seen) in values.iter_mut() {
                if let Some(value) = record.get(field).filter(|_| record.has(field))
                    && !seen.contains(value)
                {
                    seen.push(value.clone());
                }
            }
        }

        Self {
            values,
            nulled: Vec::new(),
        }
    }

    /// Gets the distinct values of a field.
    pub fn distinct(&self, field: &str) -> &[JsonValue] {
        self.values.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Gets the single value of a uniform field.
    ///
    /// Yields null when the field had no value in the batch or its
    /// conflicting values were discarded.
    pub fn uniform(&self, field: &str) -> JsonValue {
        match self.distinct(field) {
            [value] if !self.nulled.iter().any(|f| f == field) => value.clone(),
            _ => JsonValue::Null,
        }
    }

    /// Joins the distinct string values of a field in sorted order.
    pub fn sorted_join(&self, field: &str, separator: &str) -> String {
        let mut values = self
            .distinct(field)
            .iter()
            .filter_map(JsonValue::as_str)
            .collect::<Vec<_>>();
        values.sort_unstable();
        values.join(separator)
    }
}

/// Validates batches of records of one subject type.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// The fields every record must carry.
    required: Vec<String>,
    /// The fields that must be uniform across the batch.
    uniform: Vec<UniformField>,
    /// Additional fields summarized without constraints.
    collected: Vec<String>,
}

impl Validator {
    /// Creates a validator with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires every record to carry a value for a field.
    pub fn require(mut self, field: &str) -> Self {
        self.required.push(field.to_string());
        self
    }

    /// Requires every record to carry a value for each of the fields.
    pub fn require_all(self, fields: &[&str]) -> Self {
        fields.iter().fold(self, |v, f| v.require(f))
    }

    /// Requires a field to hold the same value across the batch.
    ///
    /// `label` is the name used to report an inconsistency.
    pub fn uniform(mut self, field: &str, label: &str, policy: UniformPolicy) -> Self {
        self.uniform.push(UniformField {
            field: field.to_string(),
            label: label.to_string(),
            policy,
        });
        self
    }

    /// Summarizes a field without constraining it.
    pub fn collect(mut self, field: &str) -> Self {
        self.collected.push(field.to_string());
        self
    }

    /// Validates a batch of records.
    ///
    /// On success, the batch is summarized over the uniform and collected
    /// fields.
    pub fn validate(&self, records: &[ExtractedRecord]) -> Result<BatchSummary, ValidationErrors> {
        let mut violations = records
            .iter()
            .flat_map(|record| {
                self.required
                    .iter()
                    .filter(|field| !record.has(field))
                    .map(|field| Violation::MissingField {
                        subject: record.name.clone(),
                        field: field.clone(),
                    })
            })
            .collect::<Vec<_>>();

        let fields = self
            .uniform
            .iter()
            .map(|u| u.field.as_str())
            .chain(self.collected.iter().map(String::as_str))
            .collect::<Vec<_>>();
        let mut summary = BatchSummary::fold(&fields, records);

        for uniform in &self.uniform {
            let values = summary.distinct(&uniform.field);
            if values.len() <= 1 {
                continue;
            }

            match uniform.policy {
                UniformPolicy::Fail => violations.push(Violation::BatchInconsistency {
                    field: uniform.label.clone(),
                    values: values.to_vec(),
                }),
                UniformPolicy::NullOnConflict => {
                    debug!(
                        "discarding {count} conflicting values of {label}",
                        count = values.len(),
                        label = uniform.label
                    );
                    summary.nulled.push(uniform.field.clone());
                }
            }
        }

        if violations.is_empty() {
            Ok(summary)
        } else {
            Err(ValidationErrors(violations))
        }
    }
}
