//! Genome names accepted by the downstream workflows.

use std::sync::LazyLock;

use regex::Regex;

use crate::Error;
use crate::Result;

/// The genomes a `chipseq` request may be run against.
pub const GENOMES: &[&str] = &["hg19", "hg38", "mm9", "mm10"];

/// Matches the genome prefix of a reference sequence name usable for track
/// viewing.
static TRACKVIEW_GENOME: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: this is checked statically with tests to always unwrap.
    Regex::new(r"^(hg(19|38)|mm10)_").unwrap()
});

/// Ensures a genome name is one of [`GENOMES`].
pub fn validate_genome(name: &str) -> Result<&str> {
    if GENOMES.contains(&name) {
        return Ok(name);
    }

    Err(Error::InvalidParameter {
        parameter: "genome".to_string(),
        value: name.to_string(),
        reason: "acceptable values are: hg19, hg38, mm9, or mm10".to_string(),
    })
}

/// Gets the default genome for a species common name.
///
/// Unknown species have no default and yield an empty string.
pub fn default_genome(species: &str) -> &'static str {
    match species {
        "Human" => "hg19",
        "House mouse" => "mm10",
        _ => "",
    }
}

/// Gets the genome used by SHARE-seq pipelines for a species common name.
pub fn share_seq_genome(species: &str) -> Result<&'static str> {
    let lower = species.to_lowercase();
    if lower.contains("human") {
        Ok("hg38")
    } else if lower.contains("mouse") {
        Ok("mm10")
    } else {
        Err(Error::InvalidParameter {
            parameter: "Species Common Name".to_string(),
            value: species.to_string(),
            reason: "unknown species common name".to_string(),
        })
    }
}

/// Gets the genome of a reference sequence for track viewing.
///
/// `subject` names the track the reference sequence belongs to.
pub fn trackview_genome<'a>(subject: &str, reference: &'a str) -> Result<&'a str> {
    TRACKVIEW_GENOME
        .captures(reference)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| Error::Parse {
            subject: subject.to_string(),
            what: "a supported genome (hg19, hg38, mm10)",
            input: reference.to_string(),
        })
}

/// Gets the genome name of a CNV reference sequence.
pub fn cnv_genome(reference: &str) -> String {
    reference.replace("_picard", "")
}
