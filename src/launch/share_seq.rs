//! The `share-seq-import` and `share-seq-proto` workflows.

use std::sync::LazyLock;

use indexmap::IndexMap;
use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::debug;

use super::Launcher;
use super::OUTPUT_JSON_BUCKET;
use crate::Result;
use crate::barcode;
use crate::extract::BIOLOGICAL_SAMPLE;
use crate::extract::sanitize;
use crate::genome::share_seq_genome;
use crate::params;
use crate::params::Params;
use crate::request::JobRequest;
use crate::request::RequestBuilder;
use crate::request::Workflow;
use crate::run::RunParameters;

/// The sequencing technology reported for SHARE-seq imports.
const TECHNOLOGY: &str = "SHARE-seq";

/// The genome SHARE-seq imports are demultiplexed against.
const IMPORT_GENOME: &str = "hg19";

/// From a SHARE-seq library to its experiment component.
static EXPERIMENT_COMPONENT: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("SSEC"));

/// From a SHARE-seq library to the species of its donor.
static SPECIES: LazyLock<RelationPath> = LazyLock::new(|| {
    EXPERIMENT_COMPONENT
        .then(&BIOLOGICAL_SAMPLE)
        .then(
            &RelationPath::new()
                .hop("Donor")
                .hop("Cohort")
                .hop("Species Common Name"),
        )
});

/// The sample type of a SHARE-seq library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleType {
    /// A single-cell ATAC library.
    Atac,
    /// A single-cell RNA library.
    Rna,
}

impl SampleType {
    /// Gets the name of the sample type.
    fn as_str(self) -> &'static str {
        match self {
            Self::Atac => "ATAC",
            Self::Rna => "RNA",
        }
    }
}

/// The lineage of a SHARE-seq CoPA down to its PKR.
#[derive(Debug, Clone)]
struct ShareSeqLibrary {
    /// The library type recorded on the pool component.
    library_type: String,
    /// The SHARE-seq library.
    library: SubjectId,
    /// The molecular library (`MO scATAC Lib` or `MO scRNA Lib`).
    molecular_library: SubjectId,
    /// Whether the molecular library is ATAC or RNA.
    sample_type: SampleType,
    /// The PKR the molecular library was made from.
    pkr: SubjectId,
}

/// The barcodes of one PKR and library type combination.
#[derive(Debug, Default)]
struct BarcodeGroup {
    /// The molecular barcode sequence.
    sequence: String,
    /// The round 1 barcode sets, each as its name followed by its sequences.
    round1: Vec<Vec<String>>,
    /// The round 2 barcode sets.
    round2: Vec<Vec<String>>,
    /// The round 3 barcode sets.
    round3: Vec<Vec<String>>,
}

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Walks a SHARE-seq CoPA down to its PKR.
    fn share_seq_library(&self, copa: SubjectId) -> Result<ShareSeqLibrary> {
        let pool_component = self
            .graph
            .get_subject(copa, &RelationPath::new().hop("SS-PC"))?;
        let library_type = self
            .graph
            .get_text(pool_component, &RelationPath::new().hop("SS_Library_Type"))?;
        let library = self
            .graph
            .get_subject(pool_component, &RelationPath::new().hop("SS-Library"))?;

        let (molecular_library, sample_type) = match self
            .graph
            .get_optional_subject(library, &RelationPath::new().maybe("MO scATAC Lib"))?
        {
            Some(atac) => (atac, SampleType::Atac),
            None => (
                self.graph
                    .get_subject(library, &RelationPath::new().hop("MO scRNA Lib"))?,
                SampleType::Rna,
            ),
        };

        let pkr = match self
            .graph
            .get_optional_subject(molecular_library, &RelationPath::new().maybe("SS-PKR"))?
        {
            Some(pkr) => pkr,
            None => self.graph.get_subject(
                molecular_library,
                &RelationPath::new().hop("MO cDNA").hop("SS-PKR"),
            )?,
        };

        Ok(ShareSeqLibrary {
            library_type,
            library,
            molecular_library,
            sample_type,
            pkr,
        })
    }

    /// Gets a round barcode set as its name followed by its sequences.
    fn round_barcodes(&self, set: SubjectId, round: u8) -> Result<Vec<String>> {
        let sequences = RelationPath::new()
            .maybe(format!("Round {round} Barcode Set Subject List"))
            .hop(format!("Round {round} barcode sequence"));

        let mut barcodes = vec![self.graph.require(set)?.name];
        barcodes.extend(self.graph.get_texts(set, &sequences)?);
        Ok(barcodes)
    }

    /// Assembles the `share-seq-import` request of a SHARE-seq pool aliquot.
    ///
    /// The CoPAs of the aliquot are grouped by PKR and library type; each
    /// group is demultiplexed with its molecular barcode and its round
    /// barcode sets.
    pub fn share_seq_import(
        &self,
        pool_aliquot: SubjectId,
        params: &Params,
        run: &RunParameters,
    ) -> Result<JobRequest> {
        let subject = self.graph.require(pool_aliquot)?;
        let bcl = params.require(params::HISEQ_FOLDER)?;
        let schema = params.require(params::SEQUENCING_SCHEMA)?;

        let copas = self
            .graph
            .get_subjects(pool_aliquot, &RelationPath::new().maybe("SS-CoPA SBR"))?;

        let mut groups: IndexMap<String, BarcodeGroup> = IndexMap::new();
        for copa in copas {
            let library = self.share_seq_library(copa)?;
            let sequence = self.graph.get_text(
                library.molecular_library,
                &RelationPath::new()
                    .hop("Molecular Barcode")
                    .hop("Molecular Barcode Sequence"),
            )?;

            let experiment = self
                .graph
                .get_subject(library.pkr, &RelationPath::new().hop("Share Seq Experiment"))?;
            let round1 = self.graph.get_subject(
                library.library,
                &EXPERIMENT_COMPONENT.then(&RelationPath::new().hop("Round 1 barcode set")),
            )?;
            let round2 = self
                .graph
                .get_subject(experiment, &RelationPath::new().hop("Round 2 barcode set"))?;
            let round3 = self
                .graph
                .get_subject(experiment, &RelationPath::new().hop("Round 3 barcode set"))?;

            let key = format!("{pkr}|{kind}", pkr = library.pkr, kind = library.library_type);
            let group = groups.entry(key).or_default();
            group.sequence = sequence;
            group.round1.push(self.round_barcodes(round1, 1)?);
            group.round2.push(self.round_barcodes(round2, 2)?);
            group.round3.push(self.round_barcodes(round3, 3)?);
        }

        debug!(
            "`{name}` has {count} PKR and library type group(s)",
            name = subject.name,
            count = groups.len()
        );

        let mut pkr_ids = Vec::with_capacity(groups.len());
        let mut sample_types = Vec::with_capacity(groups.len());
        let mut multiplex_params = Vec::with_capacity(groups.len());
        let mut round1 = Vec::with_capacity(groups.len());
        let mut round2 = Vec::with_capacity(groups.len());
        let mut round3 = Vec::with_capacity(groups.len());
        for (key, group) in groups {
            if let Some((pkr, kind)) = key.split_once('|') {
                pkr_ids.push(pkr.to_string());
                sample_types.push(kind.to_string());
            }
            multiplex_params.push(vec![key, group.sequence]);
            round1.push(group.round1);
            round2.push(group.round2);
            round3.push(group.round3);
        }

        let context = json!({
            "poolAliquotUID": pool_aliquot.get(),
            "projects": [],
            "sequencingTechnology": TECHNOLOGY,
            "instrumentModel": run.instrument_model,
            "experimentName": run.experiment_name,
            "folderName": run.folder_name,
            "runDate": run.run_date,
            "genomeName": IMPORT_GENOME,
        });

        let pipeline = json!({
            "lanes": self.lanes(pool_aliquot, &run.lanes)?,
            "multiplexParams": multiplex_params,
            "round1Barcodes": round1,
            "round2Barcodes": round2,
            "round3Barcodes": round3,
            "pkrId": pkr_ids,
            "sampleType": sample_types,
            "outputJson": format!("{OUTPUT_JSON_BUCKET}/{pool_aliquot}.json"),
            "context": serde_json::to_string(&context)?,
        });

        RequestBuilder::new(Workflow::ShareSeqImport)
            .subject(&subject)
            .field("bcl", bcl)
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
            .field("pipelines", vec![pipeline])
            .build()
    }

    /// Assembles the `share-seq-proto` request of a batch of SHARE-seq lane
    /// subsets.
    ///
    /// The lane subsets are laid out as parallel arrays, one entry per lane
    /// subset in input order.
    pub fn share_seq_proto(&self, lane_subsets: &[SubjectId]) -> Result<JobRequest> {
        let subjects = self.subjects(Workflow::ShareSeqProto, lane_subsets)?;

        let mut pkr_ids = Vec::with_capacity(subjects.len());
        let mut libraries = Vec::with_capacity(subjects.len());
        let mut copas = Vec::with_capacity(subjects.len());
        let mut sample_types = Vec::with_capacity(subjects.len());
        let mut genomes = Vec::with_capacity(subjects.len());
        let mut round1_subsets = Vec::with_capacity(subjects.len());
        let mut reads1 = Vec::with_capacity(subjects.len());
        let mut reads2 = Vec::with_capacity(subjects.len());

        for lane_subset in &subjects {
            let copa = self
                .graph
                .get_subject(lane_subset.id, &RelationPath::new().hop("SS-CoPA"))?;
            let library = self.share_seq_library(copa)?;

            let species = self.graph.get_text(library.library, &SPECIES)?;
            let barcode = self.graph.get_subject(
                library.molecular_library,
                &RelationPath::new().hop("Molecular Barcode"),
            )?;
            let round1 = self.graph.get_subject(
                library.library,
                &EXPERIMENT_COMPONENT.then(&RelationPath::new().hop("Round 1 barcode set")),
            )?;

            pkr_ids.push(sanitize(&self.graph.require(library.pkr)?.name));
            libraries.push(sanitize(&self.graph.require(barcode)?.name));
            copas.push(sanitize(&self.graph.require(copa)?.name));
            sample_types.push(library.sample_type.as_str());
            genomes.push(share_seq_genome(&species)?);
            round1_subsets.push(sanitize(&self.graph.require(round1)?.name));
            reads1.push(self.graph.get_optional_text(
                lane_subset.id,
                &RelationPath::new().maybe("Reads 1 Filename URI"),
            )?);
            reads2.push(self.graph.get_optional_text(
                lane_subset.id,
                &RelationPath::new().maybe("Reads 2 Filename URI"),
            )?);
        }

        RequestBuilder::new(Workflow::ShareSeqProto)
            .subjects(&subjects)
            .field(
                "lane_subsets",
                JsonValue::Array(vec![json!({
                    "pkrIds": pkr_ids,
                    "libraries": libraries,
                    "ssCopas": copas,
                    "sampleTypes": sample_types,
                    "genomes": genomes,
                    "round1Subsets": round1_subsets,
                    "reads1": reads1,
                    "reads2": reads2,
                })]),
            )
            .build()
    }
}
