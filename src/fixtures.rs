//! Small LIMS lineages used by the unit tests.
//!
//! Every lane subset built by [`Lineage::lane_subset`] hangs off the same
//! pool and lane:
//!
//! * its library is a `Mint_DNA_Lib` when its name starts with `Mint` and a
//!   `DNA_Lib` otherwise, with a `H3K27ac` ChIP;
//! * its biological sample is `BioSam-{library}`, a `K562` sample of the
//!   `ENCODE` project from donor `D1`, a `Human`;
//! * its lane is an `Illumina NextSeq 500` run that ended on 2019-03-07;
//! * its library barcode is `MB-{library}` with sequence `AAAC_GGTT`, and
//!   Mint libraries have a `CCGA` index on their chromatin prep.

use std::cell::Cell;

use chrono::NaiveDate;
use lims_graph::EntityGraph;
use lims_graph::Filter;
use lims_graph::MemoryGraph;
use lims_graph::Subject;
use lims_graph::SubjectId;
use lims_graph::Value;

use crate::control::APP_TYPE;
use crate::extract::LibraryBranch;

/// The epitope of every library built by [`Lineage::lane_subset`].
const EPITOPE: &str = "H3K27ac";

/// A lane subset along with its lineage.
#[derive(Debug, Clone)]
pub struct LaneSubset {
    /// The lane subset.
    pub id: SubjectId,
    /// The component of pooled sequencing request of the lane subset.
    pub copsr: SubjectId,
    /// The CoPA.
    pub copa: SubjectId,
    /// The pool component.
    pub pool_component: SubjectId,
    /// The library.
    pub library: SubjectId,
    /// The branch of the library.
    pub branch: LibraryBranch,
    /// The chromatin prep of the library.
    pub chromatin_prep: SubjectId,
    /// The biological sample.
    pub sample: SubjectId,
}

/// A SHARE-seq CoPA along with its lineage.
#[derive(Debug, Clone)]
pub struct ShareSeqCopa {
    /// The lane subset sequencing the CoPA.
    pub lane_subset: SubjectId,
    /// The biological sample.
    pub sample: SubjectId,
    /// The PKR.
    pub pkr: SubjectId,
}

/// A graph being populated with lineages.
#[derive(Debug, Default)]
pub struct Lineage {
    /// The graph.
    graph: MemoryGraph,
    /// Every lane subset built so far.
    lane_subsets: Vec<LaneSubset>,
}

impl Lineage {
    /// Creates an empty lineage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the graph.
    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    /// Gets the graph for modification.
    pub fn graph_mut(&mut self) -> &mut MemoryGraph {
        &mut self.graph
    }

    /// Finds a subject by type and name, inserting it if needed.
    fn named(&mut self, subject_type: &str, name: &str) -> SubjectId {
        match self.graph.find_by_name(subject_type, name) {
            Some(id) => id,
            None => self.graph.insert(subject_type, name),
        }
    }

    /// Appends a subject to a multi-valued relation.
    fn push(&mut self, id: SubjectId, relation: &str, item: SubjectId) {
        let mut items = match self.graph.attribute(id, relation) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        items.push(Value::Subject(item));
        self.graph.set(id, relation, items);
    }

    /// Gets a lane subset built so far.
    fn record(&self, lane_subset: SubjectId) -> &LaneSubset {
        self.lane_subsets
            .iter()
            .find(|ls| ls.id == lane_subset)
            .expect("lane subset should have been built by the lineage")
    }

    /// Gets the donor of the given name, of the cohort of a species.
    fn donor(&mut self, name: &str, species: &str) -> SubjectId {
        let cohort = self.named("Cohort", &format!("Cohort-{species}"));
        self.graph.set(cohort, "Species Common Name", species);
        let donor = self.named("Donor", name);
        self.graph.set(donor, "Cohort", cohort);
        donor
    }

    /// Creates the biological sample of a library.
    fn sample(&mut self, library_name: &str) -> SubjectId {
        let cell_type = self.named("Cell Type", "K562");
        let donor = self.donor("D1", "Human");
        let sample = self
            .graph
            .insert("Biological Sample", format!("BioSam-{library_name}"));
        self.graph
            .set(sample, "Project", "ENCODE")
            .set(sample, "Cell Type", cell_type)
            .set(sample, "Donor", donor);
        sample
    }

    /// Creates a biological sample aliquot of a sample.
    fn sample_aliquot(&mut self, name: &str, sample: SubjectId) -> SubjectId {
        let aliquot = self.graph.insert("BioSAli", format!("BioSAli-{name}"));
        self.graph.set(aliquot, "Biological Sample", sample);
        aliquot
    }

    /// Gets an epitope.
    fn epitope(&mut self, name: &str) -> SubjectId {
        let epitope = self.named("Epitope", name);
        self.graph
            .set(epitope, "Preferred Segmenter", vec!["HOMER - X"]);
        epitope
    }

    /// Creates a ChIP against an epitope.
    fn chip(&mut self, library_name: &str, epitope: &str) -> SubjectId {
        let epitope = self.epitope(epitope);
        let antibody = self
            .graph
            .insert("Purchasable Antibody", format!("Ab-{library_name}"));
        let aliquot = self
            .graph
            .insert("Antibody Aliquot", format!("AbAli-{library_name}"));
        let chip = self.graph.insert("ChIP", format!("ChIP-{library_name}"));
        self.graph
            .set(antibody, "Epitope", epitope)
            .set(aliquot, "Purchasable Antibody", antibody)
            .set(chip, "Antibody Aliquot", aliquot);
        chip
    }

    /// Creates a library on a chromatin prep, along with its barcode.
    fn library(
        &mut self,
        name: &str,
        chromatin_prep: SubjectId,
        epitope: &str,
    ) -> (SubjectId, LibraryBranch) {
        let branch = LibraryBranch::of(name);
        let library = self.graph.insert(branch.library_type(), name);
        let chip = self.chip(name, epitope);

        match branch {
            LibraryBranch::Chip => {
                self.graph
                    .set(library, "ChIP", chip)
                    .set(chip, "Chromatin Prep", chromatin_prep);
            }
            LibraryBranch::Mint => {
                let transcript = self
                    .graph
                    .insert("In Vitro Transcript", format!("IVT-{name}"));
                let molecular = self.graph.insert("MoIVT", format!("MoIVT-{name}"));
                let mint_chip = self.graph.insert("Mint-ChIP", format!("MintChIP-{name}"));
                let component = self.graph.insert("CoMoChrPrp", format!("CoMoChrPrp-{name}"));
                let index = self.graph.insert("ChrPrp Index", format!("Index-{name}"));
                self.graph
                    .set(library, "In Vitro Transcript", transcript)
                    .set(transcript, "MoIVT", molecular)
                    .set(molecular, "MoMint-ChIP", chip)
                    .set(transcript, "Mint-ChIP", mint_chip)
                    .set(mint_chip, "CoMoChrPrp", component)
                    .set(component, "Chromatin Prep", chromatin_prep)
                    .set(chromatin_prep, "ChrPrp Index", index)
                    .set(index, "Molecular Index Sequence", "CCGA")
                    .set(index, "ChrPrp Index In-Use", "TRUE");
            }
        }

        let barcode = self.graph.insert("Molecular Barcode", format!("MB-{name}"));
        self.graph
            .set(barcode, "Molecular Barcode Sequence", "AAAC_GGTT")
            .set(barcode, "Sequencing Schema", "Dual Index")
            .set(library, "Molecular Barcode", barcode);
        (library, branch)
    }

    /// Creates a lane subset of a component of pooled sequencing request.
    fn insert_lane_subset(&mut self, name: &str, copsr: SubjectId) -> SubjectId {
        let lane = self.named("LIMS_Lane", "Lane-1");
        self.graph
            .set(lane, "Instrument Model", "Illumina NextSeq 500")
            .set(
                lane,
                "Run End Date",
                NaiveDate::from_ymd_opt(2019, 3, 7).expect("date should be valid"),
            );

        let id = self.graph.insert("Lane Subset", name);
        self.graph
            .set(id, "Component of Pooled SeqReq", copsr)
            .set(id, "LIMS_Lane", lane)
            .set(id, "Reads 1 Filename URI", format!("gs://reads/{name}_R1.fastq.gz"))
            .set(id, "Reads 2 Filename URI", format!("gs://reads/{name}_R2.fastq.gz"))
            .set(id, "terminated", false);
        id
    }

    /// Creates a lane subset of a new library against an epitope.
    fn build(
        &mut self,
        name: &str,
        library_name: &str,
        sample: SubjectId,
        chromatin_prep: Option<SubjectId>,
        epitope: &str,
    ) -> LaneSubset {
        let chromatin_prep = match chromatin_prep {
            Some(prep) => prep,
            None => {
                let aliquot = self.sample_aliquot(library_name, sample);
                let prep = self
                    .graph
                    .insert("Chromatin Prep", format!("ChrPrp-{library_name}"));
                self.graph.set(prep, "BioSAli", aliquot);
                prep
            }
        };
        let (library, branch) = self.library(library_name, chromatin_prep, epitope);

        let pool = self.named("Pool of Libraries", "Pool-1");
        self.graph.set(pool, "Sequencing Technology", "ChIP");
        let pool_component = self
            .graph
            .insert("Pool Component", format!("PC-{library_name}"));
        let copa = self.graph.insert("CoPA", format!("CoPA-{library_name}"));
        let copsr = self.graph.insert("CoPSR", format!("CoPSR-{library_name}"));
        self.graph
            .set(pool_component, "Library", library)
            .set(pool_component, "Pool of Libraries", pool)
            .set(copa, "Pool Component", pool_component)
            .set(copsr, "CoPA", copa);

        let lane_subset = LaneSubset {
            id: self.insert_lane_subset(name, copsr),
            copsr,
            copa,
            pool_component,
            library,
            branch,
            chromatin_prep,
            sample,
        };
        self.lane_subsets.push(lane_subset.clone());
        lane_subset
    }

    /// Creates a lane subset of a new library with its own sample.
    pub fn lane_subset(&mut self, name: &str, library_name: &str) -> LaneSubset {
        let sample = self.sample(library_name);
        self.build(name, library_name, sample, None, EPITOPE)
    }

    /// Creates another lane subset of the pool component of a lane subset.
    pub fn lane_subset_of_library(&mut self, name: &str, of: &LaneSubset) -> SubjectId {
        let id = self.insert_lane_subset(name, of.copsr);
        self.lane_subsets.push(LaneSubset { id, ..of.clone() });
        id
    }

    /// Creates a lane subset of a new library from the sample of a lane
    /// subset.
    pub fn lane_subset_of_sample(
        &mut self,
        name: &str,
        library_name: &str,
        of: &LaneSubset,
    ) -> LaneSubset {
        self.build(name, library_name, of.sample, None, EPITOPE)
    }

    /// Creates a lane subset of a new WCE library on the chromatin prep of a
    /// lane subset.
    pub fn control_lane_subset(
        &mut self,
        name: &str,
        library_name: &str,
        of: &LaneSubset,
    ) -> LaneSubset {
        self.build(
            name,
            library_name,
            of.sample,
            Some(of.chromatin_prep),
            crate::control::WCE,
        )
    }

    /// Gets the library of a lane subset.
    pub fn library_of(&self, lane_subset: SubjectId) -> SubjectId {
        self.record(lane_subset).library
    }

    /// Moves the sample of a lane subset to another donor of the same
    /// species.
    pub fn set_donor(&mut self, lane_subset: SubjectId, donor: &str) {
        let sample = self.record(lane_subset).sample;
        let donor = self.donor(donor, "Human");
        self.graph.set(sample, "Donor", donor);
    }

    /// Moves a sample to a donor of another species.
    pub fn set_species(&mut self, sample: SubjectId, species: &str) {
        let donor = self.donor(&format!("Donor-{species}"), species);
        self.graph.set(sample, "Donor", donor);
    }

    /// Creates an alignment of a lane subset and its APP.
    ///
    /// The alignment is listed on the biological sample of the lane subset.
    pub fn app(
        &mut self,
        name: &str,
        lane_subset: &LaneSubset,
        epitope: &str,
        reference: &str,
    ) -> SubjectId {
        let alignment = self.graph.insert("Alignment", format!("Align-{name}"));
        self.graph.set(alignment, "Lane Subset", lane_subset.id);

        let epitope = self.epitope(epitope);
        let reference = self.named("Reference Sequence", reference);
        let cell_type = self.named("Cell Type", "K562");
        let app = self.graph.insert(APP_TYPE, name);
        self.graph
            .set(app, "Input_Alignments_SL", vec![alignment])
            .set(app, "Epitopes", vec![epitope])
            .set(app, "Cell Types", vec![cell_type])
            .set(app, "Reference Sequence", reference)
            .set(app, "Library by formula", lane_subset.library)
            .set(app, "BAM Filename URI", format!("gs://bams/{name}.bam"));

        self.push(
            lane_subset.sample,
            lane_subset.branch.sample_alignments(),
            alignment,
        );
        app
    }

    /// Creates the track of an APP, with alignment statistics on the APP.
    pub fn track(&mut self, app: SubjectId) -> SubjectId {
        let name = format!(
            "Track-{app}",
            app = self.graph.subject(app).map(|s| s.name).unwrap_or_default()
        );
        let track = self.graph.insert("Track", name.as_str());
        self.graph
            .set(track, "Alignment Post Processing", app)
            .set(track, "BigWig Filename URI", format!("gs://tracks/{name}.bw"))
            .set(app, "Track", track)
            .set(app, "Total Fragments", 2000_i64)
            .set(app, "Aligned Fragments", 1800_i64)
            .set(app, "Duplicate Fragments", 200_i64)
            .set(app, "Percent Duplicate Fragments", 0.1_f64);
        track
    }

    /// Creates a pool aliquot of the CoPAs of lane subsets.
    pub fn pool_aliquot(
        &mut self,
        name: &str,
        lane_subsets: &[&LaneSubset],
        lanes: &[&str],
    ) -> SubjectId {
        let pool_aliquot = self.graph.insert("Pool Aliquot", name);
        let copas = lane_subsets.iter().map(|ls| ls.copa).collect::<Vec<_>>();
        self.graph.set(pool_aliquot, "CoPA SBR", copas);
        if !lanes.is_empty() {
            self.graph.set(pool_aliquot, "PA_Lanes", lanes.to_vec());
        }
        pool_aliquot
    }

    /// Creates a 10x pool aliquot.
    pub fn tenx_pool_aliquot(&mut self, name: &str, lanes: &[&str]) -> SubjectId {
        let pool_aliquot = self.graph.insert("10X-PA", name);
        self.graph.set(pool_aliquot, "PA_Lanes", lanes.to_vec());
        pool_aliquot
    }

    /// Creates a 10x CoPA of a pool aliquot.
    ///
    /// ATAC libraries get a single index set of four indices; any other
    /// library type gets a dual index.
    pub fn tenx_copa(
        &mut self,
        pool_aliquot: SubjectId,
        name: &str,
        library_type: &str,
    ) -> SubjectId {
        let library = self.graph.insert("10X-Library", format!("Lib-{name}"));
        if library_type.ends_with("ATAC") {
            let barcode = self.graph.insert("10X_SI_barcode", format!("SI-{name}"));
            self.graph
                .set(barcode, "10X_i7_concatenated_index", "AAAA_CCCC_GGGG_TTTT")
                .set(library, "10X_SI_barcode", barcode);
        } else {
            let barcode = self.graph.insert("10X_DI_barcode", format!("DI-{name}"));
            self.graph
                .set(barcode, "10X_index(i7)", "GTAC")
                .set(barcode, "10X_index2_workflow_a(i5)", "CATG")
                .set(library, "10X_DI_barcode", barcode);
        }

        let pool_component = self.graph.insert("10X-PC", format!("PC-{name}"));
        let copa = self.graph.insert("10X-CoPA", name);
        self.graph
            .set(pool_component, "10X_Library_Type", library_type)
            .set(pool_component, "10X-Library", library)
            .set(copa, "10X-PC", pool_component)
            .set(copa, "10X-PA", pool_aliquot);
        copa
    }

    /// Creates a SHARE-seq pool aliquot.
    pub fn share_seq_pool_aliquot(&mut self, name: &str, lanes: &[&str]) -> SubjectId {
        let pool_aliquot = self.graph.insert("SS-PA", name);
        if !lanes.is_empty() {
            self.graph.set(pool_aliquot, "PA_Lanes", lanes.to_vec());
        }
        pool_aliquot
    }

    /// Gets a round barcode set of the given sequences.
    fn round_set(&mut self, round: u8, name: &str, sequences: &[&str]) -> SubjectId {
        let set = self.named(&format!("Round {round} Barcode Set"), name);
        let barcodes = sequences
            .iter()
            .map(|sequence| {
                let barcode = self.named(&format!("Round {round} Barcode"), sequence);
                self.graph
                    .set(barcode, &format!("Round {round} barcode sequence"), *sequence);
                barcode
            })
            .collect::<Vec<_>>();
        self.graph
            .set(set, &format!("Round {round} Barcode Set Subject List"), barcodes);
        set
    }

    /// Creates a SHARE-seq CoPA of a pool aliquot, and a lane subset of it.
    ///
    /// PKRs are shared by name; RNA libraries reach theirs through their
    /// cDNA. Every PKR belongs to the same experiment.
    pub fn share_seq_copa(
        &mut self,
        pool_aliquot: SubjectId,
        name: &str,
        sample_type: &str,
        pkr: &str,
    ) -> ShareSeqCopa {
        let sample = self.sample(name);
        let aliquot = self.sample_aliquot(name, sample);
        let round1 = self.round_set(1, &format!("R1 Set_{name}"), &["R1A", "R1B"]);
        let component = self.graph.insert("SSEC", format!("SSEC-{name}"));
        self.graph
            .set(component, "BioSAli", aliquot)
            .set(component, "Round 1 barcode set", round1);

        let round2 = self.round_set(2, "R2 Set", &["R2A"]);
        let round3 = self.round_set(3, "R3 Set", &["R3A"]);
        let experiment = self.named("Share Seq Experiment", "SS-EXP");
        let pkr = self.named("SS-PKR", pkr);
        self.graph
            .set(experiment, "Round 2 barcode set", round2)
            .set(experiment, "Round 3 barcode set", round3)
            .set(pkr, "Share Seq Experiment", experiment);

        let library = self.graph.insert("SS-Library", format!("SSL-{name}"));
        self.graph.set(library, "SSEC", component);
        let molecular = if sample_type == "ATAC" {
            let molecular = self.graph.insert("MO scATAC Lib", format!("MO-{name}"));
            self.graph
                .set(library, "MO scATAC Lib", molecular)
                .set(molecular, "SS-PKR", pkr);
            molecular
        } else {
            let molecular = self.graph.insert("MO scRNA Lib", format!("MO-{name}"));
            let cdna = self.graph.insert("MO cDNA", format!("cDNA-{name}"));
            self.graph
                .set(library, "MO scRNA Lib", molecular)
                .set(molecular, "MO cDNA", cdna)
                .set(cdna, "SS-PKR", pkr);
            molecular
        };

        let barcode = self
            .graph
            .insert("Molecular Barcode", format!("SS MB_{name}"));
        self.graph
            .set(barcode, "Molecular Barcode Sequence", "ACGT")
            .set(molecular, "Molecular Barcode", barcode);

        let pool_component = self.graph.insert("SS-PC", format!("SS-PC-{name}"));
        let copa = self.graph.insert("SS-CoPA", name);
        self.graph
            .set(pool_component, "SS_Library_Type", sample_type)
            .set(pool_component, "SS-Library", library)
            .set(copa, "SS-PC", pool_component);
        self.push(pool_aliquot, "SS-CoPA SBR", copa);

        let lane_subset = self.graph.insert("Lane Subset", format!("LS-{name}"));
        self.graph
            .set(lane_subset, "SS-CoPA", copa)
            .set(
                lane_subset,
                "Reads 1 Filename URI",
                format!("gs://reads/LS-{name}_R1.fastq.gz"),
            )
            .set(
                lane_subset,
                "Reads 2 Filename URI",
                format!("gs://reads/LS-{name}_R2.fastq.gz"),
            );

        ShareSeqCopa {
            lane_subset,
            sample,
            pkr,
        }
    }
}

/// A graph counting the queries made through it.
#[derive(Debug)]
pub struct CountingGraph<'a, G: ?Sized> {
    /// The graph queried.
    inner: &'a G,
    /// The number of `find` calls made.
    finds: Cell<usize>,
}

impl<'a, G: EntityGraph + ?Sized> CountingGraph<'a, G> {
    /// Wraps a graph.
    pub fn new(inner: &'a G) -> Self {
        Self {
            inner,
            finds: Cell::new(0),
        }
    }

    /// Gets the number of `find` calls made.
    pub fn finds(&self) -> usize {
        self.finds.get()
    }
}

impl<G: EntityGraph + ?Sized> EntityGraph for CountingGraph<'_, G> {
    fn subject(&self, id: SubjectId) -> Option<Subject> {
        self.inner.subject(id)
    }

    fn attribute(&self, id: SubjectId, name: &str) -> Option<Value> {
        self.inner.attribute(id, name)
    }

    fn find(
        &self,
        subject_type: &str,
        filter: &Filter,
        limit: usize,
    ) -> lims_graph::Result<Vec<SubjectId>> {
        self.finds.set(self.finds.get() + 1);
        self.inner.find(subject_type, filter, limit)
    }

    fn find_by_name(&self, subject_type: &str, name: &str) -> Option<SubjectId> {
        self.inner.find_by_name(subject_type, name)
    }
}
