//! Extraction of CNV inputs from alignment post processing records.

use std::sync::LazyLock;

use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;

use super::BIOLOGICAL_SAMPLE;
use super::ExtractedRecord;
use super::LibraryBranch;
use super::POOL_COMPONENT;
use crate::Result;
use crate::validate::Validator;

/// The name of the reference sequence.
pub const REFERENCE_SEQUENCE: &str = "referenceSequence";
/// The BAM URI.
pub const BAM: &str = "bam";

/// The input alignments of an APP.
pub(crate) static INPUT_ALIGNMENTS: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Input_Alignments_SL"));

/// From an alignment to its library.
static ALIGNMENT_LIBRARY: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("Lane Subset")
        .then(&POOL_COMPONENT)
        .then(&RelationPath::new().hop("Library"))
});

/// The reference sequence of an APP.
pub(crate) static REFERENCE_SEQUENCE_PATH: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("Reference Sequence"));

/// The BAM URI of an APP.
static BAM_PATH: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("BAM Filename URI"));

/// The input control override of an APP.
static INPUT_CONTROL_OVERRIDE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("Input Control Override"));

/// The CNV inputs of an alignment post processing record (APP).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnvInput {
    /// The APP.
    pub app: SubjectId,
    /// The name of the APP.
    pub name: String,
    /// The name of the reference sequence the APP was aligned to.
    pub reference_sequence: Option<String>,
    /// The BAM URI of the APP.
    pub bam: Option<String>,
    /// The input control override of the APP.
    pub override_control: Option<String>,
    /// The library of the APP's first input alignment.
    pub library: String,
    /// The biological sample of the library.
    pub sample: SubjectId,
    /// The name of the biological sample.
    pub sample_name: String,
    /// The alignments of the biological sample for the library's branch.
    pub sample_alignments: Vec<SubjectId>,
}

impl CnvInput {
    /// Creates the record validated before control resolution.
    pub fn record(&self) -> ExtractedRecord {
        let mut record = ExtractedRecord::new(self.app, self.name.clone());
        record
            .insert_some(REFERENCE_SEQUENCE, self.reference_sequence.clone())
            .insert_some(BAM, self.bam.clone());
        record
    }
}

/// Gets the validator for CNV records.
pub fn validator() -> Validator {
    Validator::new().require_all(&[REFERENCE_SEQUENCE, BAM])
}

/// Extracts the CNV inputs of an APP.
pub fn extract<G: EntityGraph + ?Sized>(graph: &G, app: SubjectId) -> Result<CnvInput> {
    let name = graph.require(app)?.name;
    let reference_sequence = graph.get_optional_text(app, &REFERENCE_SEQUENCE_PATH)?;
    let bam = graph.get_optional_text(app, &BAM_PATH)?;
    let override_control = graph.get_optional_text(app, &INPUT_CONTROL_OVERRIDE)?;

    let alignment = graph
        .get_subjects(app, &INPUT_ALIGNMENTS)?
        .first()
        .copied()
        .ok_or_else(|| lims_graph::Error::NotFound {
            subject: name.clone(),
            path: INPUT_ALIGNMENTS.to_string(),
            hop: "Input_Alignments_SL".to_string(),
        })?;
    let library = graph.get_subject(alignment, &ALIGNMENT_LIBRARY)?;
    let library_name = graph.require(library)?.name;
    let branch = LibraryBranch::of(&library_name);

    let chromatin_prep = graph.get_subject(library, branch.chromatin_prep())?;
    let sample = graph.get_subject(chromatin_prep, &BIOLOGICAL_SAMPLE)?;
    let sample_name = graph.require(sample)?.name;
    let sample_alignments = graph.get_subjects(
        sample,
        &RelationPath::new().maybe(branch.sample_alignments()),
    )?;

    Ok(CnvInput {
        app,
        name,
        reference_sequence,
        bam,
        override_control,
        library: library_name,
        sample,
        sample_name,
        sample_alignments,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures::Lineage;

    #[test]
    fn extracts_sample_and_alignments() {
        let mut lineage = Lineage::new();
        let ls = lineage.lane_subset("LS-1", "Mint-Lib-1");
        let app = lineage.app("APP-1", &ls, "H3K27ac", "hg19_picard");

        let input = extract(lineage.graph(), app).unwrap();
        assert_eq!(input.name, "APP-1");
        assert_eq!(input.reference_sequence.as_deref(), Some("hg19_picard"));
        assert_eq!(input.bam.as_deref(), Some("gs://bams/APP-1.bam"));
        assert_eq!(input.override_control, None);
        assert_eq!(input.library, "Mint-Lib-1");
        assert_eq!(input.sample, ls.sample);
        assert_eq!(input.sample_alignments.len(), 1);
        assert!(validator().validate(&[input.record()]).is_ok());
    }

    #[test]
    fn missing_inputs_fail_validation() {
        let mut lineage = Lineage::new();
        let ls = lineage.lane_subset("LS-1", "Lib-1");
        let app = lineage.app("APP-1", &ls, "H3K27ac", "hg19_picard");
        lineage
            .graph_mut()
            .set(app, "BAM Filename URI", lims_graph::Value::Null);

        let input = extract(lineage.graph(), app).unwrap();
        let err = validator().validate(&[input.record()]).unwrap_err();
        assert_eq!(err.to_string(), "`APP-1` is missing `bam`");
    }
}
