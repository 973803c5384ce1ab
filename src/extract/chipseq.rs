//! Extraction of ChIP-seq lane subsets.

use std::sync::LazyLock;

use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use lims_graph::Value;
use tracing::trace;

use super::BIOLOGICAL_SAMPLE;
use super::ExtractedRecord;
use super::LibraryBranch;
use super::POOL_COMPONENT;
use super::description;
use super::format_run_date;
use super::normalize_segmenter;
use super::parse_instrument_model;
use super::parse_run_date;
use crate::Result;
use crate::validate::UniformPolicy;
use crate::validate::Validator;

/// The lane subset name.
pub const NAME: &str = "name";
/// The biological sample name.
pub const SAMPLE_NAME: &str = "sampleName";
/// The library name.
pub const LIBRARY_NAME: &str = "libraryName";
/// The lane subset description.
pub const DESCRIPTION: &str = "description";
/// The sequencing center.
pub const SEQUENCING_CENTER: &str = "sequencingCenter";
/// The parsed instrument model.
pub const INSTRUMENT_MODEL: &str = "instrumentModel";
/// The formatted run date.
pub const RUN_DATE: &str = "runDate";
/// The FASTQ URIs of the lane subset.
pub const FASTQS: &str = "fastqs";
/// The sequencing technology of the pool.
pub const SEQUENCING_TECHNOLOGY: &str = "sequencingTechnology";
/// The donor name.
pub const DONOR: &str = "donor";
/// The normalized preferred segmenters of the epitope.
pub const PEAK_STYLES: &str = "peakStyles";
/// The species common name of the donor.
pub const SPECIES_COMMON_NAME: &str = "speciesCommonName";
/// The cell type of the biological sample.
pub const CELL_TYPE: &str = "cellType";
/// The epitope name.
pub const EPITOPE: &str = "epitope";
/// The project of the biological sample.
pub const PROJECT: &str = "project";

/// The sequencing center every lane subset is attributed to (Broad
/// Institute).
pub const BROAD_INSTITUTE: &str = "BI";

/// The fields of a record that make up a lane subset workflow input.
pub const LANE_SUBSET_FIELDS: &[&str] = &[
    NAME,
    SAMPLE_NAME,
    LIBRARY_NAME,
    DESCRIPTION,
    SEQUENCING_CENTER,
    INSTRUMENT_MODEL,
    RUN_DATE,
    FASTQS,
];

/// The fields every lane subset of a batch must carry.
const REQUIRED_FIELDS: &[&str] = &[
    NAME,
    SAMPLE_NAME,
    LIBRARY_NAME,
    DESCRIPTION,
    INSTRUMENT_MODEL,
    RUN_DATE,
    FASTQS,
    SEQUENCING_TECHNOLOGY,
    CELL_TYPE,
    PEAK_STYLES,
    SPECIES_COMMON_NAME,
];

/// From a pool component to its sequencing technology.
static TECHNOLOGY: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("Pool of Libraries")
        .maybe("Sequencing Technology")
});

/// From a ChIP to its epitope.
pub(crate) static EPITOPE_PATH: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("Antibody Aliquot")
        .hop("Purchasable Antibody")
        .hop("Epitope")
});

/// From a biological sample to the species of its donor.
static SPECIES: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .maybe("Donor")
        .maybe("Cohort")
        .maybe("Species Common Name")
});

/// From a lane subset to the instrument model of its lane.
static INSTRUMENT: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("LIMS_Lane").maybe("Instrument Model"));

/// From a lane subset to the run end date of its lane.
static RUN_END_DATE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("LIMS_Lane").maybe("Run End Date"));

/// From a lane subset to its first FASTQ.
static READS_1: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("Reads 1 Filename URI"));

/// From a lane subset to its second FASTQ.
static READS_2: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("Reads 2 Filename URI"));

/// Gets the validator for batches of ChIP-seq lane subsets.
///
/// A batch must share its preferred segmenters, instrument model and
/// species; `donor` decides what happens when its donors differ.
pub fn validator(donor: UniformPolicy) -> Validator {
    Validator::new()
        .require_all(REQUIRED_FIELDS)
        .uniform(DONOR, "Donor", donor)
        .uniform(PEAK_STYLES, "Preferred Segmenter", UniformPolicy::Fail)
        .uniform(INSTRUMENT_MODEL, "Instrument Model", UniformPolicy::Fail)
        .uniform(SPECIES_COMMON_NAME, "Species Common Name", UniformPolicy::Fail)
        .collect(CELL_TYPE)
        .collect(EPITOPE)
}

/// Extracts the record of a ChIP-seq lane subset.
pub fn extract<G: EntityGraph + ?Sized>(
    graph: &G,
    lane_subset: SubjectId,
) -> Result<ExtractedRecord> {
    let name = graph.require(lane_subset)?.name;

    let pool_component = graph.get_subject(lane_subset, &POOL_COMPONENT)?;
    let technology = graph.get_optional_text(pool_component, &TECHNOLOGY)?;
    let library = graph.get_subject(pool_component, &RelationPath::new().hop("Library"))?;
    let library_name = graph.require(library)?.name;
    let branch = LibraryBranch::of(&library_name);
    trace!("lane subset `{name}` has {branch:?} library `{library_name}`");

    let chip = graph.get_subject(library, branch.chip())?;
    let epitope = graph.get_subject(chip, &EPITOPE_PATH)?;
    let epitope_name = graph.require(epitope)?.name;
    let segmenters = graph
        .get_texts(epitope, &RelationPath::new().maybe("Preferred Segmenter"))?
        .iter()
        .map(|s| normalize_segmenter(s))
        .collect::<Vec<_>>();

    let chromatin_prep = graph.get_subject(library, branch.chromatin_prep())?;
    let sample = graph.get_subject(chromatin_prep, &BIOLOGICAL_SAMPLE)?;
    let sample_name = graph.require(sample)?.name;
    let project = graph.get_optional_text(sample, &RelationPath::new().maybe("Project"))?;
    let cell_type = graph.get_optional_text(sample, &RelationPath::new().maybe("Cell Type"))?;
    let donor = graph.get_optional_text(sample, &RelationPath::new().maybe("Donor"))?;
    let species = graph.get_optional_text(sample, &SPECIES)?;

    let instrument_model = graph
        .get_optional_text(lane_subset, &INSTRUMENT)?
        .map(|i| parse_instrument_model(&name, &i))
        .transpose()?;
    let run_date = match graph.get_value(lane_subset, &RUN_END_DATE)? {
        Value::Date(date) => Some(format_run_date(date)),
        Value::String(text) => Some(format_run_date(parse_run_date(&name, &text)?)),
        _ => None,
    };
    let fastqs = [&*READS_1, &*READS_2]
        .into_iter()
        .map(|path| graph.get_optional_text(lane_subset, path))
        .filter_map(|r| r.transpose())
        .collect::<lims_graph::Result<Vec<_>>>()?;

    let description = match (&technology, &species, &cell_type) {
        (Some(technology), Some(species), Some(cell_type)) => {
            Some(description(technology, &epitope_name, species, cell_type))
        }
        _ => None,
    };

    let mut record = ExtractedRecord::new(lane_subset, name.clone());
    record
        .insert(NAME, name)
        .insert(SAMPLE_NAME, sample_name)
        .insert(LIBRARY_NAME, library_name)
        .insert_some(DESCRIPTION, description)
        .insert(SEQUENCING_CENTER, BROAD_INSTITUTE)
        .insert_some(INSTRUMENT_MODEL, instrument_model)
        .insert_some(RUN_DATE, run_date)
        .insert(FASTQS, fastqs)
        .insert_some(SEQUENCING_TECHNOLOGY, technology)
        .insert_some(DONOR, donor)
        .insert(PEAK_STYLES, segmenters)
        .insert_some(SPECIES_COMMON_NAME, species)
        .insert_some(CELL_TYPE, cell_type)
        .insert(EPITOPE, epitope_name)
        .insert_some(PROJECT, project);

    Ok(record)
}
