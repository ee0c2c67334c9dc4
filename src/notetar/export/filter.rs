//! # Reference Filter
//!
//! Relations and links may point at notes that did not make it into the
//! export (outside the subtree, or excluded by label). Such references would
//! dangle in the manifest, so they are dropped here.
//!
//! This has to run after the whole manifest is built: a link may point
//! forward to a note the traversal only reaches later.

use std::collections::HashSet;
use tracing::debug;

use super::manifest::Registry;
use crate::model::NoteId;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    pub dropped_attributes: usize,
    pub dropped_links: usize,
}

/// Drop relation attributes and links whose target is not in `registry`.
/// Labels and definitions are left alone.
pub fn filter_references(registry: &mut Registry) -> FilterReport {
    let exported: HashSet<NoteId> = registry.ids().cloned().collect();
    let mut report = FilterReport::default();

    for meta in registry.metas_mut() {
        let attributes_before = meta.attributes.len();
        meta.attributes
            .retain(|attr| !attr.is_relation() || exported.contains(attr.value.as_str()));

        let links_before = meta.links.len();
        meta.links
            .retain(|link| exported.contains(&link.target_note_id));

        report.dropped_attributes += attributes_before - meta.attributes.len();
        report.dropped_links += links_before - meta.links.len();
    }

    debug!(
        attributes = report.dropped_attributes,
        links = report.dropped_links,
        "dropped references to notes outside the export"
    );
    report
}
