use std::collections::{HashMap, HashSet};

use crate::models::{PlaylistRow, SingleItemRule, Track, TrackUri};

/// Lookup tables over a dataset's display metadata
///
/// When several rows share the same artist/track text, or the same URI, the
/// first row in dataset order wins.
#[derive(Debug, Default)]
pub struct TrackCatalog {
    by_name: HashMap<(String, String), TrackUri>,
    by_uri: HashMap<TrackUri, Track>,
}

impl TrackCatalog {
    pub fn from_rows(rows: &[PlaylistRow]) -> Self {
        let mut catalog = Self::default();
        for row in rows {
            catalog
                .by_name
                .entry((row.artist_name.clone(), row.track_name.clone()))
                .or_insert_with(|| row.track_uri.clone());
            catalog
                .by_uri
                .entry(row.track_uri.clone())
                .or_insert_with(|| Track::from(row));
        }
        catalog
    }

    /// Exact-match lookup of the canonical identifier for an artist/track pair
    pub fn resolve(&self, artist_name: &str, track_name: &str) -> Option<&TrackUri> {
        self.by_name
            .get(&(artist_name.to_string(), track_name.to_string()))
    }

    pub fn track(&self, uri: &TrackUri) -> Option<&Track> {
        self.by_uri.get(uri)
    }

    pub fn len(&self) -> usize {
        self.by_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }
}

/// Rule set indexed by antecedent
///
/// Equivalent to scanning every rule for a matching antecedent; consequents
/// keep rule-set order.
#[derive(Debug, Default)]
pub struct Recommender {
    by_antecedent: HashMap<TrackUri, Vec<TrackUri>>,
    rule_count: usize,
}

/// Result of a recommendation lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    /// The queried artist/track pair is not in the dataset
    NotFound,
    /// Zero or more tracks, deduplicated
    Found(Vec<Track>),
}

impl Recommender {
    pub fn new(rules: &[SingleItemRule]) -> Self {
        let mut by_antecedent: HashMap<TrackUri, Vec<TrackUri>> = HashMap::new();
        for rule in rules {
            by_antecedent
                .entry(rule.antecedent.clone())
                .or_default()
                .push(rule.consequent.clone());
        }

        Self {
            by_antecedent,
            rule_count: rules.len(),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Distinct consequents of every rule whose antecedent is `item`
    pub fn consequents(&self, item: &TrackUri) -> Vec<&TrackUri> {
        let mut seen = HashSet::new();
        self.by_antecedent
            .get(item)
            .into_iter()
            .flatten()
            .filter(|uri| *uri != item && seen.insert(*uri))
            .collect()
    }

    /// Maps an artist/track pair to recommended tracks
    pub fn recommend(
        &self,
        catalog: &TrackCatalog,
        artist_name: &str,
        track_name: &str,
    ) -> Recommendation {
        let Some(item) = catalog.resolve(artist_name, track_name) else {
            return Recommendation::NotFound;
        };

        let tracks = self
            .consequents(item)
            .into_iter()
            .filter_map(|uri| {
                let track = catalog.track(uri);
                if track.is_none() {
                    tracing::warn!(track_uri = %uri, "Recommended track missing from dataset");
                }
                track.cloned()
            })
            .collect();

        Recommendation::Found(tracks)
    }
}
