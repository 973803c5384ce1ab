//! The `chip-seq-export` workflow.

use std::path::Path;
use std::sync::LazyLock;

use lims_graph::EntityGraph;
use lims_graph::Filter;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde::Serialize;
use tracing::debug;

use super::Launcher;
use crate::Result;
use crate::control::WCE;
use crate::extract::LibraryBranch;
use crate::extract::POOL_COMPONENT;
use crate::extract::QUERY_LIMIT;
use crate::extract::chipseq::EPITOPE_PATH;
use crate::extract::sanitize;
use crate::params;
use crate::params::Params;
use crate::request::JobRequest;
use crate::request::RequestBuilder;
use crate::request::Workflow;

/// From a pool component to the name of the epitope of its ChIP library.
static CHIP_EPITOPE_NAME: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop_as("Library", LibraryBranch::Chip.library_type())
        .then(LibraryBranch::Chip.chip())
        .then(&EPITOPE_PATH)
        .name()
});

/// From a pool component to the name of the chromatin prep of its library,
/// one path per library branch.
static CHROMATIN_PREP_NAMES: LazyLock<[RelationPath; 2]> = LazyLock::new(|| {
    [LibraryBranch::Chip, LibraryBranch::Mint].map(|branch| {
        RelationPath::new()
            .hop_as("Library", branch.library_type())
            .then(branch.chromatin_prep())
            .name()
    })
});

/// From a lane subset to the name of its pool component.
static POOL_COMPONENT_NAME: LazyLock<RelationPath> =
    LazyLock::new(|| POOL_COMPONENT.clone().name());

/// The exported reads of a pool component and of its WCE controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ExportedPoolComponent {
    /// The sanitized library name.
    libraries: String,
    /// The epitope name.
    epitopes: String,
    /// The first reads of the pool component.
    reads1: Vec<String>,
    /// The second reads of the pool component.
    reads2: Vec<String>,
    /// The first reads of each control pool component.
    ctrl_r1: Vec<Vec<String>>,
    /// The second reads of each control pool component.
    ctrl_r2: Vec<Vec<String>>,
}

/// Sorts reads case-insensitively.
fn sort_reads(mut reads: Vec<String>) -> Vec<String> {
    reads.sort_by_cached_key(|r| r.to_lowercase());
    reads
}

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Gets the reads of the lane subsets of a pool component.
    ///
    /// Lane subsets without a read are left out of that read's list.
    fn pool_component_reads(&self, name: &str) -> Result<(Vec<String>, Vec<String>)> {
        let filter = Filter::eq(POOL_COMPONENT_NAME.clone(), name);
        let lane_subsets = self.graph.find("Lane Subset", &filter, QUERY_LIMIT)?;

        let mut reads1 = Vec::with_capacity(lane_subsets.len());
        let mut reads2 = Vec::with_capacity(lane_subsets.len());
        for lane_subset in lane_subsets {
            reads1.extend(self.graph.get_optional_text(
                lane_subset,
                &RelationPath::new().maybe("Reads 1 Filename URI"),
            )?);
            reads2.extend(self.graph.get_optional_text(
                lane_subset,
                &RelationPath::new().maybe("Reads 2 Filename URI"),
            )?);
        }

        Ok((sort_reads(reads1), sort_reads(reads2)))
    }

    /// Exports a pool component along with the WCE pool components sharing
    /// its chromatin prep.
    fn export_pool_component(&self, pool_component: SubjectId) -> Result<ExportedPoolComponent> {
        let name = self.graph.require(pool_component)?.name;
        let library = self
            .graph
            .get_subject(pool_component, &RelationPath::new().hop("Library"))?;
        let library_name = self.graph.require(library)?.name;
        let branch = LibraryBranch::of(&library_name);

        let epitope = self
            .graph
            .get_text(library, &branch.chip().then(&EPITOPE_PATH))?;
        let chromatin_prep = self.graph.get_subject(library, branch.chromatin_prep())?;
        let chromatin_prep_name = self.graph.require(chromatin_prep)?.name;

        let [chip_prep, mint_prep] = &*CHROMATIN_PREP_NAMES;
        let filter = Filter::eq(CHIP_EPITOPE_NAME.clone(), WCE).and(Filter::Or(vec![
            Filter::eq(chip_prep.clone(), chromatin_prep_name.as_str()),
            Filter::eq(mint_prep.clone(), chromatin_prep_name.as_str()),
        ]));
        let controls = self.graph.find("Pool Component", &filter, QUERY_LIMIT)?;
        debug!(
            "`{name}` has {count} WCE pool component(s) on `{chromatin_prep_name}`",
            count = controls.len()
        );

        let (reads1, reads2) = self.pool_component_reads(&name)?;
        let mut ctrl_r1 = Vec::with_capacity(controls.len());
        let mut ctrl_r2 = Vec::with_capacity(controls.len());
        for control in controls {
            let (r1, r2) = self.pool_component_reads(&self.graph.require(control)?.name)?;
            ctrl_r1.push(r1);
            ctrl_r2.push(r2);
        }

        Ok(ExportedPoolComponent {
            libraries: sanitize(&library_name),
            epitopes: epitope,
            reads1,
            reads2,
            ctrl_r1,
            ctrl_r2,
        })
    }

    /// Assembles the `chip-seq-export` request of a batch of pool components.
    ///
    /// The Terra table is named after the BCL folder, without its extension.
    pub fn chipseq_export(
        &self,
        pool_components: &[SubjectId],
        params: &Params,
    ) -> Result<JobRequest> {
        let subjects = self.subjects(Workflow::ChipSeqExport, pool_components)?;
        let folder = params.require(params::HISEQ_FOLDER)?;
        let table_name = Path::new(folder)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let exported = subjects
            .iter()
            .map(|pc| self.export_pool_component(pc.id))
            .collect::<Result<Vec<_>>>()?;

        RequestBuilder::new(Workflow::ChipSeqExport)
            .subjects(&subjects)
            .field("table_name", table_name)
            .field("terra_project", params.require(params::TERRA_PROJECT)?)
            .field("workspace_name", params.require(params::WORKSPACE_NAME)?)
            .field("pool_components", serde_json::to_value(exported)?)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::fixtures::Lineage;

    /// Gets the Terra parameters.
    fn params() -> Params {
        Params::new()
            .with(params::HISEQ_FOLDER, "190307_NB501_0042.tar")
            .with(params::TERRA_PROJECT, "broad-epi")
            .with(params::WORKSPACE_NAME, "chip-exports")
    }

    #[test]
    fn exports_reads_with_controls() {
        let mut lineage = Lineage::new();
        let ls = lineage.lane_subset("LS-b", "Mint_Lib 1");
        lineage.lane_subset_of_library("LS-A", &ls);
        let control = lineage.control_lane_subset("LS-W", "WCE-Lib", &ls);
        let unrelated = lineage.lane_subset("LS-9", "Lib-9");
        lineage.control_lane_subset("LS-X", "WCE-Lib-Other", &unrelated);

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let request = launcher.chipseq_export(&[ls.pool_component], &params()).unwrap();

        assert_eq!(request.workflow, Workflow::ChipSeqExport);
        assert_eq!(request.subj_name, "PC-Mint_Lib 1");
        assert_eq!(request.payload["table_name"], json!("190307_NB501_0042"));
        assert_eq!(request.payload["terra_project"], json!("broad-epi"));
        assert_eq!(request.payload["workspace_name"], json!("chip-exports"));
        assert_eq!(
            request.payload["pool_components"],
            json!([{
                "libraries": "Mint-Lib-1",
                "epitopes": "H3K27ac",
                "reads1": ["gs://reads/LS-A_R1.fastq.gz", "gs://reads/LS-b_R1.fastq.gz"],
                "reads2": ["gs://reads/LS-A_R2.fastq.gz", "gs://reads/LS-b_R2.fastq.gz"],
                "ctrl_r1": [["gs://reads/LS-W_R1.fastq.gz"]],
                "ctrl_r2": [["gs://reads/LS-W_R2.fastq.gz"]]
            }])
        );
        assert_eq!(control.branch, LibraryBranch::Chip);
    }

    #[test]
    fn missing_terra_parameters() {
        let mut lineage = Lineage::new();
        let ls = lineage.lane_subset("LS-1", "Lib-1");

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let params = Params::new().with(params::HISEQ_FOLDER, "190307_NB501_0042");
        let err = launcher.chipseq_export(&[ls.pool_component], &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required parameter `text_attribute_for_tasks`"
        );
    }
}
