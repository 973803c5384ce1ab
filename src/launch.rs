//! Workflow launchers.
//!
//! A [`Launcher`] turns a batch of subjects selected in the LIMS into the
//! job request(s) of one workflow: it extracts a record per subject,
//! validates the batch, resolves controls where the workflow needs them and
//! assembles the request. Nothing is submitted; the requests are handed to a
//! [`Submitter`](crate::submit::Submitter).
//!
//! All graph reads of a launcher go through one [`CachedGraph`], so lineage
//! shared by the subjects of a batch is only walked once.

use lims_graph::CachedGraph;
use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;

use crate::Error;
use crate::Result;
use crate::config::Config;
use crate::request::Workflow;
use crate::validate::Violation;

mod chip_import;
mod chipseq;
mod cnv;
mod export;
mod share_seq;
mod tenx;
mod trackview;

pub use cnv::CnvBatch;
pub use cnv::SkippedSubject;
pub use trackview::TrackHubRequest;

/// The bucket the demultiplexing pipelines write their output manifests to.
pub const OUTPUT_JSON_BUCKET: &str = "gs://broad-epi-bcl-output-jsons";

/// Assembles the job requests of the supported workflows.
#[derive(Debug)]
pub struct Launcher<'g, G: ?Sized> {
    /// The graph, memoized for the lifetime of the launcher.
    graph: CachedGraph<'g, G>,
    /// The configuration.
    config: Config,
}

impl<'g, G: EntityGraph + ?Sized> Launcher<'g, G> {
    /// Creates a launcher over a graph.
    pub fn new(graph: &'g G, config: Config) -> Self {
        Self {
            graph: CachedGraph::new(graph),
            config,
        }
    }

    /// Gets the graph of the launcher.
    pub fn graph(&self) -> &CachedGraph<'g, G> {
        &self.graph
    }

    /// Gets the configuration of the launcher.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves the configured pipeline version recorded in `chipseq`
    /// requests.
    pub async fn pipeline_version(&self, client: &reqwest::Client) -> Result<String> {
        self.config.pipeline.version.resolve(client).await
    }

    /// Gets the subjects of a batch, failing on an empty batch.
    fn subjects(
        &self,
        workflow: Workflow,
        ids: &[SubjectId],
    ) -> Result<Vec<lims_graph::Subject>> {
        if ids.is_empty() {
            return Err(Error::EmptyBatch(workflow.as_str()));
        }

        ids.iter()
            .map(|id| self.graph.require(*id).map_err(Into::into))
            .collect()
    }

    /// Gets the lanes assigned to a pool aliquot.
    ///
    /// `fallback` is used when the aliquot has none; having neither is an
    /// error.
    fn lanes(&self, pool_aliquot: SubjectId, fallback: &[u32]) -> Result<Vec<u32>> {
        let name = self.graph.require(pool_aliquot)?.name;
        let lanes = self
            .graph
            .get_texts(pool_aliquot, &RelationPath::new().maybe("PA_Lanes"))?
            .iter()
            .map(|lane| {
                lane.trim().parse::<u32>().map_err(|_| Error::Parse {
                    subject: name.clone(),
                    what: "a lane number",
                    input: lane.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        match (lanes.is_empty(), fallback.is_empty()) {
            (false, _) => Ok(lanes),
            (true, false) => Ok(fallback.to_vec()),
            (true, true) => Err(Violation::MissingField {
                subject: name,
                field: "PA_Lanes".to_string(),
            }
            .into()),
        }
    }
}
