//! The `10x-import` workflow.

use lims_graph::EntityGraph;
use lims_graph::Filter;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde_json::json;
use tracing::debug;

use super::Launcher;
use crate::Error;
use crate::Result;
use crate::extract::QUERY_LIMIT;
use crate::params;
use crate::params::Params;
use crate::request::Context;
use crate::request::JobRequest;
use crate::request::RequestBuilder;
use crate::request::Workflow;
use crate::validate::Violation;

/// The sequencing technology reported for 10x imports.
const TECHNOLOGY: &str = "10X";

/// The instrument 10x libraries are sequenced on.
const INSTRUMENT_MODEL: &str = "NovaSeq X";

/// The relation holding the library type of a 10x pool component.
const LIBRARY_TYPE: &str = "10X_Library_Type";

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Assembles the `10x-import` request of a 10x pool aliquot.
    ///
    /// Every CoPA of the aliquot must have the same library type; gene
    /// expression samples carry their dual index and ATAC samples one entry
    /// per index of their set.
    pub fn tenx_import(&self, pool_aliquot: SubjectId, params: &Params) -> Result<JobRequest> {
        let subject = self.graph.require(pool_aliquot)?;
        let bcl = params.require(params::HISEQ_FOLDER)?;
        let bucket = params.require(params::DATA_BUCKET)?;

        let filter = Filter::eq(RelationPath::new().hop("10X-PA").name(), subject.name.as_str());
        let copas = self.graph.find("10X-CoPA", &filter, QUERY_LIMIT)?;
        debug!(
            "found {count} 10X CoPA(s) for `{name}`",
            count = copas.len(),
            name = subject.name
        );

        let mut samples = Vec::new();
        let mut types: Vec<String> = Vec::new();
        for copa in copas {
            let (library_type, copa_samples) = self.tenx_samples(copa)?;
            samples.extend(copa_samples);
            if !types.contains(&library_type) {
                types.push(library_type);
            }
        }

        let library_type = match types.as_slice() {
            [library_type] => library_type.clone(),
            [] => {
                return Err(Violation::MissingField {
                    subject: subject.name,
                    field: "10X-CoPA".to_string(),
                }
                .into());
            }
            _ => {
                return Err(Violation::BatchInconsistency {
                    field: LIBRARY_TYPE.to_string(),
                    values: types.into_iter().map(Into::into).collect(),
                }
                .into());
            }
        };

        let mut context = Context::new();
        context.insert("poolAliquotUID".to_string(), pool_aliquot.get().into());
        context.insert("projects".to_string(), json!([]));
        context.insert("sequencingTechnology".to_string(), TECHNOLOGY.into());
        context.insert("instrumentModel".to_string(), INSTRUMENT_MODEL.into());

        RequestBuilder::new(Workflow::TenxImport)
            .subject(&subject)
            .field("bcl", bcl)
            .field("bucket", bucket)
            .field("lib_type", library_type)
            .field("lanes", self.lanes(pool_aliquot, &[])?)
            .field("samples", json!(samples))
            .context(context)
            .build()
    }

    /// Gets the library type of a 10x CoPA and its demultiplexing samples.
    fn tenx_samples(&self, copa: SubjectId) -> Result<(String, Vec<Vec<String>>)> {
        let id = self.graph.require(copa)?.name.replace(' ', "-");
        let pool_component = self
            .graph
            .get_subject(copa, &RelationPath::new().hop("10X-PC"))?;
        let raw_type = self
            .graph
            .get_text(pool_component, &RelationPath::new().hop(LIBRARY_TYPE))?;
        let library_type = raw_type
            .strip_prefix("10X_")
            .unwrap_or(&raw_type)
            .to_string();

        let library = self
            .graph
            .get_subject(pool_component, &RelationPath::new().hop("10X-Library"))?;
        let barcode = match self
            .graph
            .get_optional_subject(library, &RelationPath::new().maybe("10X_SI_barcode"))?
        {
            Some(barcode) => barcode,
            None => self
                .graph
                .get_subject(library, &RelationPath::new().hop("10X_DI_barcode"))?,
        };

        let samples = match library_type.as_str() {
            "GEX" => vec![vec![
                id,
                self.graph
                    .get_text(barcode, &RelationPath::new().hop("10X_index(i7)"))?,
                self.graph
                    .get_text(barcode, &RelationPath::new().hop("10X_index2_workflow_a(i5)"))?,
            ]],
            "ATAC" => self
                .graph
                .get_text(barcode, &RelationPath::new().hop("10X_i7_concatenated_index"))?
                .split('_')
                .map(|index| vec![id.clone(), index.to_string()])
                .collect(),
            _ => {
                return Err(Error::InvalidParameter {
                    parameter: LIBRARY_TYPE.to_string(),
                    value: raw_type,
                    reason: "unknown library type".to_string(),
                });
            }
        };

        Ok((library_type, samples))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::Value as JsonValue;

    use super::*;
    use crate::config::Config;
    use crate::fixtures::Lineage;
    use crate::request::SubjectIds;

    /// Gets the delivery parameters.
    fn params() -> Params {
        Params::new()
            .with(params::HISEQ_FOLDER, "250101_NOVASEQX_0001")
            .with(params::DATA_BUCKET, "gs://delivery")
    }

    #[test]
    fn gene_expression() {
        let mut lineage = Lineage::new();
        let pa = lineage.tenx_pool_aliquot("10X-PA-1", &["3"]);
        lineage.tenx_copa(pa, "10X CoPA 1", "10X_GEX");
        lineage.tenx_copa(pa, "10X CoPA 2", "10X_GEX");

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let request = launcher.tenx_import(pa, &params()).unwrap();

        assert_eq!(request.workflow, Workflow::TenxImport);
        assert_eq!(request.subj_name, "10X-PA-1");
        assert_eq!(request.subj_id, SubjectIds::Single(pa.get()));
        assert_eq!(request.payload["bcl"], json!("250101_NOVASEQX_0001"));
        assert_eq!(request.payload["bucket"], json!("gs://delivery"));
        assert_eq!(request.payload["lib_type"], json!("GEX"));
        assert_eq!(request.payload["lanes"], json!([3]));
        assert_eq!(
            request.payload["samples"],
            json!([
                ["10X-CoPA-1", "GTAC", "CATG"],
                ["10X-CoPA-2", "GTAC", "CATG"]
            ])
        );

        let context = request.decode_context().unwrap().unwrap();
        assert_eq!(
            JsonValue::Object(context),
            json!({
                "poolAliquotUID": pa.get(),
                "projects": [],
                "sequencingTechnology": "10X",
                "instrumentModel": "NovaSeq X"
            })
        );
    }

    #[test]
    fn atac_indices_are_split() {
        let mut lineage = Lineage::new();
        let pa = lineage.tenx_pool_aliquot("10X-PA-1", &["1", "2"]);
        lineage.tenx_copa(pa, "10X CoPA 1", "10X_ATAC");

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let request = launcher.tenx_import(pa, &params()).unwrap();
        assert_eq!(request.payload["lib_type"], json!("ATAC"));
        assert_eq!(
            request.payload["samples"],
            json!([
                ["10X-CoPA-1", "AAAA"],
                ["10X-CoPA-1", "CCCC"],
                ["10X-CoPA-1", "GGGG"],
                ["10X-CoPA-1", "TTTT"]
            ])
        );
    }

    #[test]
    fn library_types_must_match() {
        let mut lineage = Lineage::new();
        let pa = lineage.tenx_pool_aliquot("10X-PA-1", &["1"]);
        lineage.tenx_copa(pa, "10X CoPA 1", "10X_GEX");
        lineage.tenx_copa(pa, "10X CoPA 2", "10X_ATAC");

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let err = launcher.tenx_import(pa, &params()).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"found subjects with unequal 10X_Library_Type: "GEX", "ATAC""#
        );
    }

    #[test]
    fn unknown_library_type() {
        let mut lineage = Lineage::new();
        let pa = lineage.tenx_pool_aliquot("10X-PA-1", &["1"]);
        lineage.tenx_copa(pa, "10X CoPA 1", "10X_VDJ");

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let err = launcher.tenx_import(pa, &params()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { value, .. } if value == "10X_VDJ"));
    }

    #[test]
    fn aliquot_without_copas() {
        let mut lineage = Lineage::new();
        let pa = lineage.tenx_pool_aliquot("10X-PA-1", &["1"]);

        let launcher = Launcher::new(lineage.graph(), Config::default());
        let err = launcher.tenx_import(pa, &params()).unwrap_err();
        assert_eq!(err.to_string(), "`10X-PA-1` is missing `10X-CoPA`");
    }
}
