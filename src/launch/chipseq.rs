//! The `chipseq` workflow.

use std::sync::LazyLock;

use lims_graph::EntityGraph;
use lims_graph::Filter;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::info;
use tracing::warn;

use super::Launcher;
use crate::Result;
use crate::extract::LibraryBranch;
use crate::extract::POOL_COMPONENT;
use crate::extract::chipseq;
use crate::genome::validate_genome;
use crate::params;
use crate::params::Params;
use crate::request::Aggregation;
use crate::request::Context;
use crate::request::JobRequest;
use crate::request::RequestBuilder;
use crate::request::Workflow;

/// The maximum number of lane subsets aggregated for one library.
const LIBRARY_LANE_SUBSET_LIMIT: usize = 1000;

/// The name of a lane subset's Mint library.
static MINT_LIBRARY_NAME: LazyLock<RelationPath> = LazyLock::new(|| {
    POOL_COMPONENT
        .then(&RelationPath::new().hop_as("Library", LibraryBranch::Mint.library_type()))
        .name()
});

/// Collapses a uniform list value to its only element.
///
/// Lists of several values are kept as is.
fn collapse(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(mut values) if values.len() == 1 => values.remove(0),
        value => value,
    }
}

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Assembles the `chipseq` request of a batch of lane subsets.
    ///
    /// The genome is read from the [`GENOME`](params::GENOME) parameter.
    pub fn chipseq(
        &self,
        lane_subsets: &[SubjectId],
        params: &Params,
        pipeline_version: &str,
    ) -> Result<JobRequest> {
        let genome = validate_genome(params.require(params::GENOME)?)?;
        self.chipseq_request(lane_subsets, genome, pipeline_version, None)
    }

    /// Assembles one `chipseq` request per Mint library, covering the live
    /// lane subsets of the library.
    ///
    /// Libraries without live lane subsets are skipped.
    pub fn chipseq_by_library(
        &self,
        libraries: &[SubjectId],
        params: &Params,
        pipeline_version: &str,
    ) -> Result<Vec<JobRequest>> {
        let genome = validate_genome(params.require(params::GENOME)?)?;
        let libraries = self.subjects(Workflow::ChipSeq, libraries)?;

        let mut requests = Vec::with_capacity(libraries.len());
        for library in &libraries {
            let filter = Filter::eq(MINT_LIBRARY_NAME.clone(), library.name.as_str())
                .and(Filter::ne(RelationPath::new().hop("terminated"), true));
            let lane_subsets = self
                .graph
                .find("Lane Subset", &filter, LIBRARY_LANE_SUBSET_LIMIT)?;

            if lane_subsets.is_empty() {
                warn!("library `{name}` has no live lane subsets", name = library.name);
                continue;
            }

            info!(
                "aggregating {count} lane subset(s) of library `{name}`",
                count = lane_subsets.len(),
                name = library.name
            );
            requests.push(self.chipseq_request(
                &lane_subsets,
                genome,
                pipeline_version,
                Some(Aggregation::of(library)),
            )?);
        }

        Ok(requests)
    }

    /// Assembles a `chipseq` request.
    fn chipseq_request(
        &self,
        lane_subsets: &[SubjectId],
        genome: &str,
        pipeline_version: &str,
        aggregation: Option<Aggregation>,
    ) -> Result<JobRequest> {
        let subjects = self.subjects(Workflow::ChipSeq, lane_subsets)?;
        let records = lane_subsets
            .iter()
            .map(|ls| chipseq::extract(&self.graph, *ls))
            .collect::<Result<Vec<_>>>()?;

        let summary = chipseq::validator(self.config.validation.donor_policy).validate(&records)?;

        let projects = records
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    r.get(chipseq::PROJECT).cloned().unwrap_or(JsonValue::Null),
                )
            })
            .collect::<serde_json::Map<_, _>>();

        let mut context = Context::new();
        context.insert(
            "speciesCommonName".to_string(),
            summary.uniform(chipseq::SPECIES_COMMON_NAME),
        );
        context.insert(
            "cellTypes".to_string(),
            summary.sorted_join(chipseq::CELL_TYPE, ";").into(),
        );
        context.insert(
            "epitopes".to_string(),
            summary.sorted_join(chipseq::EPITOPE, ";").into(),
        );
        context.insert("projects".to_string(), projects.into());
        context.insert("lims7".to_string(), true.into());
        context.insert("pipelineVersion".to_string(), pipeline_version.into());

        let lane_subsets = records
            .iter()
            .map(|r| JsonValue::Object(r.project(chipseq::LANE_SUBSET_FIELDS)))
            .collect::<Vec<_>>();

        RequestBuilder::new(Workflow::ChipSeq)
            .subjects(&subjects)
            .aggregation(aggregation)
            .field("donor", summary.uniform(chipseq::DONOR))
            .field("genome_name", genome)
            .field("peak_styles", collapse(summary.uniform(chipseq::PEAK_STYLES)))
            .field("instrument_model", summary.uniform(chipseq::INSTRUMENT_MODEL))
            .field("lane_subsets", lane_subsets)
            .context(context)
            .build()
    }
}
