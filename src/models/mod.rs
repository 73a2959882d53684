use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

pub mod rule;
pub mod version;

pub use rule::{AssociationRule, FrequentItemset, SingleItemRule};
pub use version::VersionRecord;

/// Canonical item identifier for a track (e.g., "spotify:track:4uLU6hMCjMI75M1A2tKUQC")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackUri(pub String);

impl TrackUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a playlist dataset file
///
/// Columns other than these four are ignored when reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistRow {
    pub pid: String,
    pub artist_name: String,
    pub track_name: String,
    pub track_uri: TrackUri,
}

/// Display metadata for a track returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub artist_name: String,
    pub track_name: String,
    pub track_uri: TrackUri,
}

impl From<&PlaylistRow> for Track {
    fn from(row: &PlaylistRow) -> Self {
        Self {
            artist_name: row.artist_name.clone(),
            track_name: row.track_name.clone(),
            track_uri: row.track_uri.clone(),
        }
    }
}

/// A playlist dataset loaded into memory
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: String,
    pub rows: Vec<PlaylistRow>,
}

/// Artist/track pair the client wants recommendations for
#[derive(Debug, Clone, Deserialize)]
pub struct TrackQuery {
    pub artist_name: String,
    pub track_name: String,
}

/// Body of a recommendation request
///
/// Clients send a list holding a single record; a bare object is accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecommendRequest {
    Batch(Vec<TrackQuery>),
    Single(TrackQuery),
}

impl RecommendRequest {
    /// Returns the record to answer. Only the first entry of a list is used.
    ///
    /// Surrounding whitespace is stripped, matching how dataset fields are read.
    pub fn into_query(self) -> AppResult<TrackQuery> {
        let query = match self {
            RecommendRequest::Single(query) => query,
            RecommendRequest::Batch(queries) => queries.into_iter().next().ok_or_else(|| {
                AppError::InvalidInput("Request must contain one artist/track record".to_string())
            })?,
        };

        Ok(TrackQuery {
            artist_name: query.artist_name.trim().to_string(),
            track_name: query.track_name.trim().to_string(),
        })
    }
}

/// Body of a model update request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateModelRequest {
    #[serde(default)]
    pub dataset_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_uri_display() {
        let uri = TrackUri::new("spotify:track:abc");
        assert_eq!(format!("{}", uri), "spotify:track:abc");
    }

    #[test]
    fn test_track_uri_serializes_as_plain_string() {
        let uri = TrackUri::new("spotify:track:abc");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, r#""spotify:track:abc""#);
    }

    #[test]
    fn test_recommend_request_list_uses_first_record() {
        let request: RecommendRequest = serde_json::from_str(
            r#"[{"artist_name":"Drake","track_name":"One Dance"},
                {"artist_name":"Adele","track_name":"Hello"}]"#,
        )
        .unwrap();

        let query = request.into_query().unwrap();
        assert_eq!(query.artist_name, "Drake");
        assert_eq!(query.track_name, "One Dance");
    }

    #[test]
    fn test_recommend_request_single_object() {
        let request: RecommendRequest =
            serde_json::from_str(r#"{"artist_name":"Adele","track_name":"Hello"}"#).unwrap();

        let query = request.into_query().unwrap();
        assert_eq!(query.artist_name, "Adele");
    }

    #[test]
    fn test_recommend_request_trims_fields() {
        let request: RecommendRequest =
            serde_json::from_str(r#"[{"artist_name":" Adele ","track_name":"Hello\n"}]"#).unwrap();

        let query = request.into_query().unwrap();
        assert_eq!(query.artist_name, "Adele");
        assert_eq!(query.track_name, "Hello");
    }

    #[test]
    fn test_recommend_request_empty_list_is_invalid() {
        let request: RecommendRequest = serde_json::from_str("[]").unwrap();
        let result = request.into_query();
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_update_request_dataset_is_optional() {
        let request: UpdateModelRequest = serde_json::from_str("{}").unwrap();
        assert!(request.dataset_id.is_none());
    }
}
