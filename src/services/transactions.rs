use std::collections::{BTreeMap, BTreeSet};

use crate::models::{PlaylistRow, TrackUri};

/// The deduplicated set of tracks appearing in one playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub playlist_id: String,
    pub items: BTreeSet<TrackUri>,
}

/// Groups raw rows into one transaction per playlist
///
/// Repeated tracks within a playlist collapse into a single item. Rows with a
/// blank track URI contribute nothing, so a playlist made only of such rows
/// yields no transaction at all. Output is ordered by playlist id.
pub fn build_transactions(rows: &[PlaylistRow]) -> Vec<Transaction> {
    let mut playlists: BTreeMap<&str, BTreeSet<TrackUri>> = BTreeMap::new();

    for row in rows {
        let items = playlists.entry(row.pid.as_str()).or_default();
        if !row.track_uri.as_str().trim().is_empty() {
            items.insert(row.track_uri.clone());
        }
    }

    playlists
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(pid, items)| Transaction {
            playlist_id: pid.to_string(),
            items,
        })
        .collect()
}
