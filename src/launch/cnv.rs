//! The `cnv` workflow.

use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::SubjectId;
use serde::Serialize;
use tracing::warn;

use super::Launcher;
use crate::Result;
use crate::control::ControlFailureMode;
use crate::control::ControlResolver;
use crate::extract::cnv;
use crate::genome::cnv_genome;
use crate::request::JobRequest;
use crate::request::RequestBuilder;
use crate::request::Workflow;

/// A subject left out of a batch because its control could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSubject {
    /// The name of the subject.
    pub name: String,
    /// The resolution error.
    pub error: String,
}

/// The `cnv` requests of a batch.
#[derive(Debug, Clone, Default)]
pub struct CnvBatch {
    /// One request per resolved APP, in input order.
    pub requests: Vec<JobRequest>,
    /// The APPs whose control could not be resolved.
    pub skipped: Vec<SkippedSubject>,
}

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Assembles one `cnv` request per alignment post processing record.
    ///
    /// Every APP must carry a reference sequence and a BAM before any control
    /// is resolved. A control that cannot be resolved fails the batch or
    /// skips the APP according to the configured
    /// [`ControlFailureMode`].
    pub fn cnv(&self, apps: &[SubjectId]) -> Result<CnvBatch> {
        self.subjects(Workflow::Cnv, apps)?;
        let inputs = apps
            .iter()
            .map(|app| cnv::extract(&self.graph, *app))
            .collect::<Result<Vec<_>>>()?;

        let records = inputs.iter().map(cnv::CnvInput::record).collect::<Vec<_>>();
        cnv::validator().validate(&records)?;

        let mut resolver = ControlResolver::new(&self.graph);
        let mut batch = CnvBatch::default();
        for input in &inputs {
            let resolution = match resolver.resolve(input) {
                Ok(resolution) => resolution,
                Err(e) if self.config.control.failure_mode == ControlFailureMode::Continue => {
                    warn!("skipping `{name}`: {e}", name = input.name);
                    batch.skipped.push(SkippedSubject {
                        name: input.name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let subject = self.graph.require(input.app)?;
            let genome = input.reference_sequence.as_deref().map(cnv_genome);
            batch.requests.push(
                RequestBuilder::new(Workflow::Cnv)
                    .subject(&subject)
                    .field("bam", input.bam.clone())
                    .field("cnv_ratios_bed", resolution.cnv_ratios_bed)
                    .field("genome_name", genome)
                    .field("bypass_rescaling", resolution.bypass_rescaling)
                    .field("input_control", resolution.input_control)
                    .build()?,
            );
        }

        Ok(batch)
    }
}
