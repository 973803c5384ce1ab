//! The `chip-seq-import` and `import` workflows.

use indexmap::IndexMap;
use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::info;

use super::Launcher;
use super::OUTPUT_JSON_BUCKET;
use crate::Result;
use crate::barcode;
use crate::genome::default_genome;
use crate::params;
use crate::params::Params;
use crate::request::JobRequest;
use crate::request::RequestBuilder;
use crate::request::Workflow;
use crate::run::MINT_CHIP;
use crate::run::RunParameters;

/// Joins a run folder onto its on-premises parent directory.
fn bcl_path(parent: &str, folder: &str) -> String {
    format!("{parent}/{folder}", parent = parent.trim_end_matches('/'))
}

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Assembles the `chip-seq-import` request of a batch of pool aliquots.
    ///
    /// Each aliquot becomes one demultiplexing pipeline of the request.
    pub fn chip_import(
        &self,
        pool_aliquots: &[SubjectId],
        params: &Params,
        run: &RunParameters,
    ) -> Result<JobRequest> {
        let subjects = self.subjects(Workflow::ChipSeqImport, pool_aliquots)?;
        let technology = params.require(params::SEQUENCING_TECHNOLOGY)?;
        let schema = params.require(params::SEQUENCING_SCHEMA)?;
        let bcl = bcl_path(params.require(params::BCL_PARENT)?, &run.folder_name);
        let genome = default_genome(params.get(params::SPECIES).unwrap_or_default());

        let mut pipelines = Vec::with_capacity(subjects.len());
        for pool_aliquot in &subjects {
            let copas = self
                .graph
                .get_subjects(pool_aliquot.id, &RelationPath::new().maybe("CoPA SBR"))?;

            let multiplex_params = copas
                .iter()
                .map(|copa| {
                    barcode::multiplex_params(&self.graph, *copa, technology, &run.instrument_model)
                })
                .collect::<Result<Vec<_>>>()?;
            let projects = copas
                .iter()
                .map(|copa| barcode::projects(&self.graph, *copa))
                .collect::<Result<IndexMap<_, _>>>()?;

            let context = json!({
                "poolAliquotUID": pool_aliquot.id.get(),
                "projects": projects,
                "sequencingTechnology": technology,
                "instrumentModel": run.instrument_model,
                "experimentName": run.experiment_name,
                "folderName": run.folder_name,
                "runDate": run.run_date,
                "genomeName": genome,
                "lims7": true,
            });

            let mismatches = RunParameters::mismatches(technology);
            pipelines.push(json!({
                "lanes": self.lanes(pool_aliquot.id, &run.lanes)?,
                "multiplexParams": multiplex_params,
                "maxMismatches": mismatches,
                "minMismatchDelta": mismatches,
                "outputJson": format!("{OUTPUT_JSON_BUCKET}/{id}.json", id = pool_aliquot.id),
                "context": serde_json::to_string(&context)?,
            }));
        }

        info!(
            "assembled {count} import pipeline(s) for run `{folder}`",
            count = pipelines.len(),
            folder = run.folder_name
        );

        RequestBuilder::new(Workflow::ChipSeqImport)
            .subjects(&subjects)
            .field("bcl", bcl)
            .field("read_structure", run.read_structure(technology)?)
            .field(
                "candidate_molecular_barcodes",
                json!(barcode::candidate_molecular_barcodes(
                    &self.graph,
                    schema,
                    &run.instrument_model
                )?),
            )
            .field(
                "candidate_molecular_indices",
                json!(barcode::candidate_molecular_indices(&self.graph)?),
            )
            .field("pipelines", pipelines)
            .build()
    }

    /// Assembles the generic `import` request of a batch of pool aliquots.
    ///
    /// Unlike [`chip_import`](Self::chip_import), no per-aliquot pipelines
    /// are assembled; only Mint-ChIP imports carry candidate indices.
    pub fn import(
        &self,
        pool_aliquots: &[SubjectId],
        params: &Params,
        run: &RunParameters,
    ) -> Result<JobRequest> {
        let subjects = self.subjects(Workflow::Import, pool_aliquots)?;
        let technology = params.require(params::SEQUENCING_TECHNOLOGY)?;
        let schema = params.require(params::SEQUENCING_SCHEMA)?;
        let bcl = bcl_path(params.require(params::IMPORT_BCL_PARENT)?, &run.folder_name);

        let indices = if technology == MINT_CHIP {
            barcode::candidate_molecular_indices(&self.graph)?
        } else {
            IndexMap::new()
        };

        RequestBuilder::new(Workflow::Import)
            .subjects(&subjects)
            .field("bcl", bcl)
            .field("read_structure", run.read_structure(technology)?)
            .field(
                "candidate_molecular_barcodes",
                json!(barcode::candidate_molecular_barcodes(
                    &self.graph,
                    schema,
                    &run.instrument_model
                )?),
            )
            .field("candidate_molecular_indices", json!(indices))
            .field("pipelines", JsonValue::Array(Vec::new()))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Error;
    use crate::config::Config;
    use crate::fixtures::Lineage;
    use crate::run::CHIP;

    /// Gets the parameters of a NextSeq run.
    fn run() -> RunParameters {
        RunParameters {
            folder_name: "220424_SL-NXD_0685_AHJJ3WBGXL".to_string(),
            experiment_name: "EXP-1".to_string(),
            instrument_model: "NextSeq".to_string(),
            run_date: "04/24/2022".to_string(),
            read1: 30,
            read2: 30,
            index_read1: 99,
            index_read2: 8,
            lanes: vec![1, 2, 3, 4],
        }
    }

    /// Gets the import parameters for a technology.
    fn params(technology: &str) -> Params {
        Params::new()
            .with(params::SEQUENCING_TECHNOLOGY, technology)
            .with(params::SEQUENCING_SCHEMA, "Dual Index")
            .with(params::SPECIES, "Human")
            .with(params::BCL_PARENT, "/seq/illumina/")
    }

    #[test]
    fn chip_import_pipelines() {
        let mut lineage = Lineage::new();
        let first = lineage.lane_subset("LS-1", "Lib-1");
        let second = lineage.lane_subset("LS-2", "Lib-2");
        let pa = lineage.pool_aliquot("PA-1", &[&first, &second], &["2"]);

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let request = launcher.chip_import(&[pa], &params(CHIP), &run()).unwrap();

        assert_eq!(request.workflow, Workflow::ChipSeqImport);
        assert_eq!(request.subj_name, "PA-1");
        assert_eq!(
            request.payload["bcl"],
            json!("/seq/illumina/220424_SL-NXD_0685_AHJJ3WBGXL")
        );
        assert_eq!(request.payload["read_structure"], json!("30T8B91S8B30T"));
        assert_eq!(
            request.payload["candidate_molecular_barcodes"],
            json!({ "MB-Lib-1": "AAACAACC", "MB-Lib-2": "AAACAACC" })
        );
        assert_eq!(request.payload["candidate_molecular_indices"], json!({}));

        let pipeline = &request.payload["pipelines"][0];
        assert_eq!(pipeline["lanes"], json!([2]));
        assert_eq!(
            pipeline["multiplexParams"],
            json!([["CoPA-Lib-1", "AAAC", "AACC"], ["CoPA-Lib-2", "AAAC", "AACC"]])
        );
        assert_eq!(pipeline["maxMismatches"], json!("1"));
        assert_eq!(pipeline["minMismatchDelta"], json!("1"));
        assert_eq!(
            pipeline["outputJson"],
            json!(format!("gs://broad-epi-bcl-output-jsons/{pa}.json"))
        );

        let context: JsonValue =
            serde_json::from_str(pipeline["context"].as_str().unwrap()).unwrap();
        assert_eq!(
            context,
            json!({
                "poolAliquotUID": pa.get(),
                "projects": { "CoPA-Lib-1": ["ENCODE"], "CoPA-Lib-2": ["ENCODE"] },
                "sequencingTechnology": "ChIP",
                "instrumentModel": "NextSeq",
                "experimentName": "EXP-1",
                "folderName": "220424_SL-NXD_0685_AHJJ3WBGXL",
                "runDate": "04/24/2022",
                "genomeName": "hg19",
                "lims7": true
            })
        );
    }

    #[test]
    fn mint_chip_import() {
        let mut lineage = Lineage::new();
        let ls = lineage.lane_subset("LS-1", "Mint-Lib-1");
        let pa = lineage.pool_aliquot("PA-1", &[&ls], &[]);

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let mut run = run();
        run.read2 = 50;
        let request = launcher.chip_import(&[pa], &params(MINT_CHIP), &run).unwrap();

        assert_eq!(request.payload["read_structure"], json!("30T8B91S8B8B42T"));
        assert_eq!(
            request.payload["candidate_molecular_indices"],
            json!({ "Index-Mint-Lib-1": "CCGA" })
        );

        let pipeline = &request.payload["pipelines"][0];
        assert_eq!(pipeline["lanes"], json!([1, 2, 3, 4]));
        assert_eq!(
            pipeline["multiplexParams"],
            json!([["CoPA-Mint-Lib-1", "AAAC", "AACC", "CCGA"]])
        );
        assert_eq!(pipeline["maxMismatches"], json!("2"));
    }

    #[test]
    fn lanes_are_required() {
        let mut lineage = Lineage::new();
        let ls = lineage.lane_subset("LS-1", "Lib-1");
        let pa = lineage.pool_aliquot("PA-1", &[&ls], &[]);

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let mut run = run();
        run.lanes.clear();
        let err = launcher.chip_import(&[pa], &params(CHIP), &run).unwrap_err();
        assert_eq!(err.to_string(), "`PA-1` is missing `PA_Lanes`");

        let err = launcher
            .chip_import(&[pa], &Params::new(), &self::run())
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(name) if name == "Sequencing Technology"));
    }

    #[test]
    fn generic_import() {
        let mut lineage = Lineage::new();
        let chip = lineage.lane_subset("LS-1", "Lib-1");
        let mint = lineage.lane_subset("LS-2", "Mint-Lib-2");
        let first = lineage.pool_aliquot("PA-1", &[&chip], &[]);
        let second = lineage.pool_aliquot("PA-2", &[&mint], &[]);

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let params = params(CHIP).with(params::IMPORT_BCL_PARENT, "/seq/nextseq");
        let request = launcher.import(&[first, second], &params, &run()).unwrap();

        assert_eq!(request.workflow, Workflow::Import);
        assert_eq!(request.subj_name, "PA-1,PA-2");
        assert_eq!(
            request.payload["bcl"],
            json!("/seq/nextseq/220424_SL-NXD_0685_AHJJ3WBGXL")
        );
        assert_eq!(request.payload["candidate_molecular_indices"], json!({}));
        assert_eq!(request.payload["pipelines"], json!([]));
        assert!(request.context.is_none());
    }
}
