//! Merges the latest scan with the watch list and favorites into the unified
//! port view.
//!
//! [`compute_view`] is a pure function: identical inputs always produce an
//! identical, totally ordered output, so callers can recompute on every poll
//! without tracking whether anything changed.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{PortRecord, PortView, ViewFilter};

/// Builds the sorted view for one scan. The search term is trimmed and
/// lowercased before matching, so a term that is blank after trimming
/// matches every entry.
pub fn compute_view(
    scan: &[PortRecord],
    watch: &BTreeSet<u16>,
    favorites: &BTreeSet<u16>,
    filter: &ViewFilter,
) -> Vec<PortView> {
    let mut by_port: BTreeMap<u16, PortView> = BTreeMap::new();

    // Later records for the same port overwrite earlier ones.
    for record in scan {
        by_port.insert(
            record.port,
            PortView {
                port: record.port,
                occupant: Some(record.clone()),
                is_watched: watch.contains(&record.port),
                is_favorite: false,
            },
        );
    }

    for &port in watch {
        by_port.entry(port).or_insert(PortView {
            port,
            occupant: None,
            is_watched: true,
            is_favorite: false,
        });
    }

    for entry in by_port.values_mut() {
        entry.is_favorite = favorites.contains(&entry.port);
    }

    let term = filter.search_term.trim().to_lowercase();
    let mut view: Vec<PortView> = by_port
        .into_values()
        .filter(|entry| !filter.favorites_only || entry.is_favorite)
        .filter(|entry| term.is_empty() || matches_search(entry, &term))
        .collect();

    // The map already yields ascending ports; the stable sort only lifts
    // favorites to the front.
    view.sort_by_key(|entry| !entry.is_favorite);
    view
}

/// `term` must already be lowercased.
fn matches_search(entry: &PortView, term: &str) -> bool {
    if entry.port.to_string().contains(term) {
        return true;
    }
    match &entry.occupant {
        Some(record) => {
            record.process_name.to_lowercase().contains(term)
                || record.pid.to_string().contains(term)
        }
        None => false,
    }
}
