//! Sequencing run parameters.

use serde::Deserialize;
use serde::Serialize;

use crate::barcode;
use crate::Result;

/// The sequencing technology of ChIP-seq libraries.
pub const CHIP: &str = "ChIP";

/// The sequencing technology of Mint-ChIP libraries.
pub const MINT_CHIP: &str = "Mint-ChIP";

/// Parameters of a sequencing run, as read from the instrument's run
/// parameters file by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParameters {
    /// The run folder name (the run identifier).
    pub folder_name: String,
    /// The experiment name.
    #[serde(default)]
    pub experiment_name: String,
    /// The instrument model (e.g. `NextSeq`).
    pub instrument_model: String,
    /// The run start date, formatted `MM/DD/YYYY`.
    pub run_date: String,
    /// The number of cycles of the first read.
    #[serde(default)]
    pub read1: u32,
    /// The number of cycles of the second read.
    #[serde(default)]
    pub read2: u32,
    /// The number of cycles of the first index read.
    #[serde(default)]
    pub index_read1: u32,
    /// The number of cycles of the second index read.
    #[serde(default)]
    pub index_read2: u32,
    /// The lanes of the run, when not given per pool aliquot.
    #[serde(default)]
    pub lanes: Vec<u32>,
}

impl RunParameters {
    /// Gets the demultiplexing mismatch tolerance for a technology.
    ///
    /// This is used for both the maximum mismatches and the minimum mismatch
    /// delta.
    pub fn mismatches(technology: &str) -> &'static str {
        if technology == CHIP { "1" } else { "2" }
    }

    /// Gets the read structure of the run for a technology.
    pub fn read_structure(&self, technology: &str) -> Result<String> {
        barcode::read_structure(
            technology,
            self.read1,
            self.read2,
            self.index_read1,
            self.index_read2,
        )
    }
}
