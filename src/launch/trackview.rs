//! The `ucsc` track hub workflow.

use std::sync::LazyLock;

use lims_graph::EntityGraph;
use lims_graph::GraphExt;
use lims_graph::RelationPath;
use lims_graph::SubjectId;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::Launcher;
use crate::Result;
use crate::extract::to_json;
use crate::genome::trackview_genome;
use crate::request::SubjectIds;
use crate::request::Workflow;
use crate::validate::Violation;

/// From a track to its APP.
static TRACK_APP: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Alignment Post Processing"));

/// From an APP to the name of its reference sequence.
static REFERENCE_SEQUENCE: LazyLock<RelationPath> =
    LazyLock::new(|| RelationPath::new().hop("Reference Sequence").name());

/// The APP attributes reported for every track, keyed by output field.
const APP_ATTRIBUTES: &[(&str, &str)] = &[
    ("cellType", "Cell Types"),
    ("epitope", "Epitopes"),
    ("totalFrag", "Total Fragments"),
    ("alignedFrag", "Aligned Fragments"),
    ("dupFrag", "Duplicate Fragments"),
    ("perDupFrag", "Percent Duplicate Fragments"),
];

/// A request to build a UCSC track hub.
///
/// Unlike a [`JobRequest`](crate::request::JobRequest), it is submitted on its
/// own with
/// [`Submitter::submit_trackview`](crate::submit::Submitter::submit_trackview).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackHubRequest {
    /// Always [`Workflow::Ucsc`].
    pub workflow: Workflow,
    /// The comma-joined names of the subjects.
    pub subj_name: String,
    /// The identifier(s) of the subjects.
    pub subj_id: SubjectIds,
    /// The genome every track is aligned to.
    pub genome: String,
    /// One entry per track, in subject order.
    pub tracks: Vec<serde_json::Map<String, JsonValue>>,
}

/// A track along with the subject it was selected through.
struct SelectedTrack {
    /// The name of the selecting subject.
    parent: String,
    /// The track.
    track: SubjectId,
    /// The APP of the track.
    app: SubjectId,
    /// The reference sequence name of the APP.
    reference: String,
}

impl<G: EntityGraph + ?Sized> Launcher<'_, G> {
    /// Assembles the `ucsc` request for the tracks of a batch of subjects.
    ///
    /// The genome is parsed from the first track's reference sequence and
    /// every other track must be aligned to the same genome.
    pub fn trackview(&self, subjects: &[SubjectId]) -> Result<TrackHubRequest> {
        let subjects = self.subjects(Workflow::Ucsc, subjects)?;

        let selected = subjects
            .iter()
            .map(|subject| -> Result<SelectedTrack> {
                let track = self
                    .graph
                    .get_subject(subject.id, &RelationPath::new().hop("Track"))?;
                let app = self.graph.get_subject(track, &TRACK_APP)?;
                Ok(SelectedTrack {
                    parent: subject.name.clone(),
                    track,
                    app,
                    reference: self.graph.get_text(app, &REFERENCE_SEQUENCE)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // `subjects` is never empty
        let first = &selected[0];
        let genome = trackview_genome(&self.graph.require(first.track)?.name, &first.reference)?;
        let prefix = format!("{genome}_");
        if let Some(other) = selected.iter().find(|t| !t.reference.starts_with(&prefix)) {
            return Err(Violation::BatchInconsistency {
                field: "Reference Sequence".to_string(),
                values: vec![first.reference.clone().into(), other.reference.clone().into()],
            }
            .into());
        }
        debug!(
            "viewing {count} track(s) on `{genome}`",
            count = selected.len()
        );

        let tracks = selected
            .iter()
            .map(|t| self.track_entry(t))
            .collect::<Result<Vec<_>>>()?;

        let (subj_name, subj_id) = match subjects.as_slice() {
            [subject] => (subject.name.clone(), SubjectIds::Single(subject.id.get())),
            subjects => (
                subjects.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(","),
                SubjectIds::Joined(
                    subjects
                        .iter()
                        .map(|s| s.id.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
            ),
        };

        Ok(TrackHubRequest {
            workflow: Workflow::Ucsc,
            subj_name,
            subj_id,
            genome: genome.to_string(),
            tracks,
        })
    }

    /// Formats the entry of one track.
    fn track_entry(&self, selected: &SelectedTrack) -> Result<serde_json::Map<String, JsonValue>> {
        let mut entry = serde_json::Map::new();
        entry.insert("track".to_string(), self.graph.require(selected.track)?.name.into());
        entry.insert(
            "library".to_string(),
            self.graph
                .get_text(selected.app, &RelationPath::new().hop("Library by formula"))?
                .into(),
        );
        entry.insert("parent".to_string(), selected.parent.clone().into());
        for (field, attribute) in APP_ATTRIBUTES {
            let value = self
                .graph
                .get_value(selected.app, &RelationPath::new().maybe(*attribute))?;
            entry.insert(field.to_string(), to_json(&self.graph, value)?);
        }
        entry.insert("refSeq".to_string(), selected.reference.clone().into());

        let bigwig = self.graph.get_value(
            selected.track,
            &RelationPath::new().maybe("BigWig Filename URI"),
        )?;
        entry.insert("bigwig".to_string(), to_json(&self.graph, bigwig)?);
        Ok(entry)
    }
}
