//! Assembly and submission of workflow job requests from LIMS metadata.
//!
//! A batch of subjects selected in the LIMS (lane subsets, alignment post
//! processing records, pool aliquots, ...) is turned into one or more
//! [`JobRequest`](request::JobRequest)s in four steps:
//!
//! 1. [extraction](extract) walks the lineage of every subject through an
//!    [`EntityGraph`](lims_graph::EntityGraph) into a flat record;
//! 2. [validation](validate) checks the batch for missing fields and for
//!    fields that must agree across the batch;
//! 3. [control resolution](control) picks the input control of every CNV
//!    request;
//! 4. [assembly](request) builds the request documents.
//!
//! The [`Launcher`](launch::Launcher) drives these steps for every supported
//! workflow and the [`Submitter`](submit::Submitter) sends the result to the
//! workflow submission service.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod barcode;
pub mod config;
pub mod control;
mod error;
pub mod extract;
pub mod genome;
pub mod launch;
pub mod params;
pub mod request;
pub mod run;
pub mod submit;
pub mod validate;
pub mod version;

#[cfg(test)]
mod fixtures;

pub use error::*;
