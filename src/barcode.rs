//! Molecular barcodes, indices and read structures for demultiplexing.

use std::sync::LazyLock;

use indexmap::IndexMap;
use lims_graph::EntityGraph;
use lims_graph::Filter;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use lims_graph::Value;
use tracing::debug;

use crate::Error;
use crate::Result;
use crate::extract::BIOLOGICAL_SAMPLE;
use crate::extract::COPA_LIBRARY;
use crate::extract::LibraryBranch;
use crate::extract::QUERY_LIMIT;
use crate::run::CHIP;
use crate::run::MINT_CHIP;

/// The instrument whose second barcode is read as a reverse complement.
pub const NEXTSEQ: &str = "NextSeq";

/// The molecular barcode of a library.
static MOLECULAR_BARCODE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().maybe("Molecular Barcode"));

/// The molecular barcode of a library reached through its Mint library.
static MINT_MOLECULAR_BARCODE: LazyLock<RelationPath> = LazyLock::new(|| {
    RelationPath::new()
        .hop("MoMint_DNA_Lib")
        .hop("Molecular Barcode")
});

/// The `_`-separated sequence of a molecular barcode.
static BARCODE_SEQUENCE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Molecular Barcode Sequence"));

/// The index sequence of a Mint library's chromatin prep.
static MINT_INDEX_SEQUENCE: LazyLock<RelationPath> = LazyLock::new(|| {
    LibraryBranch::Mint.chromatin_prep().then(
        &RelationPath::new()
            .hop("ChrPrp Index")
            .hop("Molecular Index Sequence"),
    )
});

/// The sequence of a chromatin prep index.
static INDEX_SEQUENCE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Molecular Index Sequence"));

/// Gets the reverse complement of a nucleotide sequence.
///
/// Characters other than `A`, `C`, `G`, `T` and `N` are dropped.
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .chars()
        .rev()
        .filter_map(|base| match base {
            'A' => Some('T'),
            'T' => Some('A'),
            'C' => Some('G'),
            'G' => Some('C'),
            'N' => Some('N'),
            _ => None,
        })
        .collect()
}

/// Formats the read structure of a run.
///
/// ChIP runs may be single-ended; every other technology needs a second read
/// longer than its 8 base barcode.
pub fn read_structure(
    technology: &str,
    read1: u32,
    read2: u32,
    index_read1: u32,
    index_read2: u32,
) -> Result<String> {
    let mut structure = format!("{read1}T8B");
    if index_read1 > 8 {
        structure.push_str(&format!("{skip}S", skip = index_read1 - 8));
    }
    if index_read2 >= 8 {
        structure.push_str("8B");
    }
    if index_read2 > 8 {
        structure.push_str(&format!("{skip}S", skip = index_read2 - 8));
    }

    if technology == CHIP {
        if read2 > 0 {
            structure.push_str(&format!("{read2}T"));
        }
    } else {
        if read2 <= 8 {
            return Err(Error::InvalidParameter {
                parameter: "Read2".to_string(),
                value: read2.to_string(),
                reason: "Read2 must be > 8".to_string(),
            });
        }
        structure.push_str(&format!("8B{template}T", template = read2 - 8));
    }

    Ok(structure)
}

/// Gets the demultiplexing parameters of a CoPA: its name followed by its
/// barcodes.
///
/// Mint-ChIP libraries add the index of their chromatin prep. On a NextSeq,
/// the second barcode of a dual-barcoded ChIP library or of any
/// triple-barcoded library is reverse complemented.
pub fn multiplex_params<G: EntityGraph + ?Sized>(
    graph: &G,
    copa: SubjectId,
    technology: &str,
    instrument_model: &str,
) -> Result<Vec<String>> {
    let name = graph.require(copa)?.name;
    let library = graph.get_subject(copa, &COPA_LIBRARY)?;
    let barcode = match graph.get_optional_subject(library, &MOLECULAR_BARCODE)? {
        Some(barcode) => barcode,
        None => graph.get_subject(library, &MINT_MOLECULAR_BARCODE)?,
    };

    let mut barcodes = graph
        .get_text(barcode, &BARCODE_SEQUENCE)?
        .split('_')
        .map(str::to_string)
        .collect::<Vec<_>>();
    if technology == MINT_CHIP {
        barcodes.push(graph.get_text(library, &MINT_INDEX_SEQUENCE)?);
    }

    if instrument_model == NEXTSEQ
        && ((barcodes.len() == 2 && technology == CHIP) || barcodes.len() == 3)
    {
        barcodes[1] = reverse_complement(&barcodes[1]);
    }

    Ok(std::iter::once(name).chain(barcodes).collect())
}

/// Gets the projects of a CoPA's biological sample, keyed by the CoPA name.
pub fn projects<G: EntityGraph + ?Sized>(
    graph: &G,
    copa: SubjectId,
) -> Result<(String, Vec<String>)> {
    let name = graph.require(copa)?.name;
    let library = graph.get_subject(copa, &COPA_LIBRARY)?;
    let branch = LibraryBranch::of(&graph.require(library)?.name);
    let chromatin_prep = graph.get_subject(library, branch.chromatin_prep())?;
    let sample = graph.get_subject(chromatin_prep, &BIOLOGICAL_SAMPLE)?;
    let projects = graph.get_texts(sample, &RelationPath::new().maybe("Project"))?;
    Ok((name, projects))
}

/// Gets the concatenated sequences of the molecular barcodes of a
/// sequencing schema, keyed by barcode name.
pub fn candidate_molecular_barcodes<G: EntityGraph + ?Sized>(
    graph: &G,
    schema: &str,
    instrument_model: &str,
) -> Result<IndexMap<String, String>> {
    let filter = Filter::eq(RelationPath::new().hop("Sequencing Schema"), schema);
    let barcodes = graph.find("Molecular Barcode", &filter, QUERY_LIMIT)?;
    debug!(
        "found {count} candidate molecular barcode(s) for schema `{schema}`",
        count = barcodes.len()
    );

    barcodes
        .into_iter()
        .map(|barcode| -> Result<(String, String)> {
            let name = graph.require(barcode)?.name;
            let mut parts = graph
                .get_text(barcode, &BARCODE_SEQUENCE)?
                .split('_')
                .map(str::to_string)
                .collect::<Vec<_>>();
            if instrument_model == NEXTSEQ && parts.len() == 2 {
                parts[1] = reverse_complement(&parts[1]);
            }
            Ok((name, parts.concat()))
        })
        .collect()
}

/// Gets the sequences of the chromatin prep indices in use, keyed by index
/// name.
pub fn candidate_molecular_indices<G: EntityGraph + ?Sized>(
    graph: &G,
) -> Result<IndexMap<String, String>> {
    let in_use = RelationPath::new().hop("ChrPrp Index In-Use");
    let filter = Filter::Or(vec![
        Filter::eq(in_use.clone(), "TRUE"),
        Filter::eq(in_use, Value::Boolean(true)),
    ]);

    graph
        .find("ChrPrp Index", &filter, QUERY_LIMIT)?
        .into_iter()
        .map(|index| -> Result<(String, String)> {
            Ok((
                graph.require(index)?.name,
                graph.get_text(index, &INDEX_SEQUENCE)?,
            ))
        })
        .collect()
}
