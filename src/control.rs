//! Input control resolution for CNV rescaling.
//!
//! Every CNV request needs an input control: the whole-cell-extract (WCE)
//! alignment post processing record (APP) its ratios are rescaled against.
//! The control is, in order of precedence:
//!
//! 1. nothing, when the APP's override asks to bypass rescaling;
//! 2. the APP named by the override;
//! 3. the most recently updated WCE APP of the same biological sample and
//!    reference sequence.
//!
//! A control other than the APP itself must carry a CNV ratios BED.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::DateTime;
use chrono::Utc;
use indexmap::IndexSet;
use lims_graph::EntityGraph;
use lims_graph::Filter;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::Error;
use crate::Result;
use crate::extract::QUERY_LIMIT;
use crate::extract::cnv::CnvInput;
use crate::extract::cnv::REFERENCE_SEQUENCE;
use crate::validate::Violation;

/// The override value that disables CNV rescaling.
pub const BYPASS_RESCALING: &str = "bypass CNV rescaling step";

/// The epitope of whole-cell-extract controls.
pub const WCE: &str = "WCE";

/// The subject type of alignment post processing records.
pub const APP_TYPE: &str = "Alignment Post Processing";

/// The epitopes of an APP.
static EPITOPES: LazyLock<RelationPath> = LazyLock::new(|| RelationPath::new().hop("Epitopes"));

/// The reference sequence of an APP, compared by name.
static REFERENCE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Reference Sequence"));

/// The input alignments of a candidate APP, which may have none.
static CANDIDATE_ALIGNMENTS: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("Input_Alignments_SL"));

/// The CNV ratios BED URI of an APP.
static CNV_RATIOS_BED: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("CNV Ratios BED URI"));

/// What happens to a batch when an item's control cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlFailureMode {
    /// The whole batch fails.
    Abort,
    /// The item is skipped and the rest of the batch continues.
    #[default]
    Continue,
}

/// An APP that may serve as an input control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCandidate {
    /// The APP.
    pub id: SubjectId,
    /// The name of the APP.
    pub name: String,
    /// When the APP was last updated.
    pub updated_at: DateTime<Utc>,
    /// The CNV ratios BED URI of the APP.
    pub cnv_ratios_bed: Option<String>,
}

impl ControlCandidate {
    /// Loads a candidate from the graph.
    pub fn load<G: EntityGraph + ?Sized>(graph: &G, id: SubjectId) -> Result<Self> {
        let subject = graph.require(id)?;
        Ok(Self {
            id,
            name: subject.name,
            updated_at: subject.updated_at,
            cnv_ratios_bed: graph.get_optional_text(id, &CNV_RATIOS_BED)?,
        })
    }
}

/// The resolved input control of an APP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResolution {
    /// Whether rescaling is bypassed.
    pub bypass_rescaling: bool,
    /// The name of the input control, or the override value when bypassed.
    pub input_control: String,
    /// The CNV ratios BED of the control, if it is not the APP itself.
    pub cnv_ratios_bed: Option<String>,
}

/// Selects the most recently updated candidate.
///
/// Candidates are ordered by update time and then identifier, so among
/// candidates updated at the same time the one with the largest identifier
/// wins.
pub fn select_most_recent(mut candidates: Vec<ControlCandidate>) -> Option<ControlCandidate> {
    candidates.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
    candidates.pop()
}

/// An index from alignment to the WCE APPs using it, for one reference
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct ControlIndex {
    /// The WCE APPs by input alignment, in query order.
    owners: HashMap<SubjectId, IndexSet<SubjectId>>,
}

impl ControlIndex {
    /// Builds the index of WCE APPs aligned to a reference sequence.
    pub fn build<G: EntityGraph + ?Sized>(graph: &G, reference: &str) -> Result<Self> {
        let filter =
            Filter::eq(EPITOPES.clone(), WCE).and(Filter::eq(REFERENCE.clone(), reference));
        let apps = graph.find(APP_TYPE, &filter, QUERY_LIMIT)?;

        let mut owners: HashMap<SubjectId, IndexSet<SubjectId>> = HashMap::new();
        for app in &apps {
            for alignment in graph.get_subjects(*app, &CANDIDATE_ALIGNMENTS)? {
                owners.entry(alignment).or_default().insert(*app);
            }
        }

        debug!(
            "indexed {count} WCE APP(s) over {alignments} alignment(s) for `{reference}`",
            count = apps.len(),
            alignments = owners.len()
        );
        Ok(Self { owners })
    }

    /// Gets the distinct WCE APPs using any of the given alignments.
    pub fn owners_of(&self, alignments: &[SubjectId]) -> IndexSet<SubjectId> {
        alignments
            .iter()
            .filter_map(|a| self.owners.get(a))
            .flatten()
            .copied()
            .collect()
    }
}

/// Resolves the input controls of a batch of APPs.
///
/// Indices are built lazily, once per reference sequence, and reused for
/// every APP of the batch.
#[derive(Debug)]
pub struct ControlResolver<'g, G: ?Sized> {
    /// The graph to resolve against.
    graph: &'g G,
    /// The control indices by reference sequence name.
    indices: HashMap<String, ControlIndex>,
}

impl<'g, G: EntityGraph + ?Sized> ControlResolver<'g, G> {
    /// Creates a resolver for a batch.
    pub fn new(graph: &'g G) -> Self {
        Self {
            graph,
            indices: HashMap::new(),
        }
    }

    /// Resolves the input control of an APP.
    pub fn resolve(&mut self, input: &CnvInput) -> Result<ControlResolution> {
        let control = match input.override_control.as_deref() {
            Some(BYPASS_RESCALING) => {
                info!("bypassing CNV rescaling for `{name}`", name = input.name);
                return Ok(ControlResolution {
                    bypass_rescaling: true,
                    input_control: BYPASS_RESCALING.to_string(),
                    cnv_ratios_bed: None,
                });
            }
            Some(name) => {
                let id = self.graph.find_by_name(APP_TYPE, name).ok_or_else(|| {
                    Error::OverrideNotFound {
                        subject: input.name.clone(),
                        control: name.to_string(),
                    }
                })?;
                ControlCandidate::load(self.graph, id)?
            }
            None => {
                let reference = input.reference_sequence.as_deref().ok_or_else(|| {
                    Error::from(Violation::MissingField {
                        subject: input.name.clone(),
                        field: REFERENCE_SEQUENCE.to_string(),
                    })
                })?;

                let candidates = self.candidates(reference, &input.sample_alignments)?;
                debug!(
                    "`{name}` has {count} WCE candidate(s)",
                    name = input.name,
                    count = candidates.len()
                );
                select_most_recent(candidates).ok_or_else(|| Error::NoControlFound {
                    subject: input.name.clone(),
                    sample: input.sample_name.clone(),
                })?
            }
        };

        let cnv_ratios_bed = if control.id == input.app {
            None
        } else {
            Some(control.cnv_ratios_bed.ok_or_else(|| Error::MissingControlArtifact {
                subject: input.name.clone(),
                control: control.name.clone(),
            })?)
        };

        info!(
            "using input control `{control}` for `{name}`",
            control = control.name,
            name = input.name
        );
        Ok(ControlResolution {
            bypass_rescaling: false,
            input_control: control.name,
            cnv_ratios_bed,
        })
    }

    /// Gets the WCE candidates of the given sample alignments.
    pub fn candidates(
        &mut self,
        reference: &str,
        alignments: &[SubjectId],
    ) -> Result<Vec<ControlCandidate>> {
        if !self.indices.contains_key(reference) {
            let index = ControlIndex::build(self.graph, reference)?;
            self.indices.insert(reference.to_string(), index);
        }

        self.indices[reference]
            .owners_of(alignments)
            .into_iter()
            .map(|id| ControlCandidate::load(self.graph, id))
            .collect()
    }
}
