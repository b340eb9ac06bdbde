//! Edge derivation
//!
//! Turns a batch of events into dataset → dataset edges. Every
//! (input, output) pair of an event becomes one edge; a pair seen twice in
//! the same batch keeps the annotations of its first event. Across batches
//! the store's upsert decides (latest write wins).

use lineage_storage::{DatasetIdentifier, EdgeKey, LineageEdge, LineageEvent, MetadataValue};
use std::collections::HashSet;

pub const META_JOB_NAME: &str = "job_name";
pub const META_RUN_ID: &str = "run_id";
pub const META_EVENT_ID: &str = "event_id";

/// Derive the edge upserts for one batch, in event order
pub fn derive_edges(events: &[LineageEvent]) -> Vec<LineageEdge> {
    let mut seen: HashSet<EdgeKey> = HashSet::new();
    let mut edges = Vec::new();

    for event in events.iter().filter(|e| e.has_lineage()) {
        for input in &event.input_datasets {
            for output in &event.output_datasets {
                if !seen.insert(EdgeKey::new(input, output)) {
                    continue;
                }
                edges.push(edge_for(event, input.clone(), output.clone()));
            }
        }
    }

    edges
}

fn edge_for(event: &LineageEvent, source: DatasetIdentifier, target: DatasetIdentifier) -> LineageEdge {
    let mut edge = LineageEdge::new(source, target);
    edge.transformation = event.transformation.clone();
    edge.description = event.description.clone();

    if let Some(job_name) = event.job_name() {
        edge.metadata
            .insert(META_JOB_NAME.to_string(), MetadataValue::from(job_name));
    }
    if let Some(run_id) = &event.run_id {
        edge.metadata
            .insert(META_RUN_ID.to_string(), MetadataValue::from(run_id.as_str()));
    }
    edge.metadata.insert(
        META_EVENT_ID.to_string(),
        MetadataValue::from(event.event_id.as_str()),
    );
    edge
}
