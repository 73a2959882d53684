use std::{
    collections::HashSet,
    io::Read,
    path::{Path, PathBuf},
};

use crate::{
    error::{AppError, AppResult},
    models::{Dataset, PlaylistRow, Track},
};

/// Source of playlist datasets addressed by identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DatasetRepository: Send + Sync {
    /// Loads every row of the named dataset
    ///
    /// Returns `AppError::NotFound` when no such dataset exists.
    async fn load(&self, dataset_id: &str) -> AppResult<Dataset>;
}

/// Datasets stored as CSV files inside one directory, named by their identifier
pub struct FsDatasetRepository {
    root: PathBuf,
}

impl FsDatasetRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dataset_path(&self, dataset_id: &str) -> AppResult<PathBuf> {
        validate_dataset_id(dataset_id)?;
        Ok(self.root.join(dataset_id))
    }
}

#[async_trait::async_trait]
impl DatasetRepository for FsDatasetRepository {
    async fn load(&self, dataset_id: &str) -> AppResult<Dataset> {
        let path = self.dataset_path(dataset_id)?;
        if !path.is_file() {
            return Err(AppError::NotFound(format!(
                "Dataset not found: {}",
                path.display()
            )));
        }

        let id = dataset_id.to_string();
        let rows = tokio::task::spawn_blocking(move || read_playlist_file(&path))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        tracing::info!(dataset_id = %id, rows = rows.len(), "Dataset loaded");

        Ok(Dataset { id, rows })
    }
}

/// Rejects identifiers that could escape the dataset directory
pub fn validate_dataset_id(dataset_id: &str) -> AppResult<()> {
    let trimmed = dataset_id.trim();
    if trimmed.is_empty()
        || trimmed != dataset_id
        || dataset_id.contains(['/', '\\'])
        || dataset_id == "."
        || dataset_id.contains("..")
    {
        return Err(AppError::InvalidInput(format!(
            "Invalid dataset identifier: {:?}",
            dataset_id
        )));
    }
    Ok(())
}

/// Parses playlist rows from CSV with a header line
pub fn read_playlist_rows<R: Read>(reader: R) -> AppResult<Vec<PlaylistRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = rdr
        .deserialize::<PlaylistRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_playlist_file(path: &Path) -> AppResult<Vec<PlaylistRow>> {
    let file = std::fs::File::open(path)?;
    read_playlist_rows(std::io::BufReader::new(file))
}

/// Parses a reference track list, keeping the first row for each track URI
pub fn read_tracks<R: Read>(reader: R) -> AppResult<Vec<Track>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut seen = HashSet::new();
    let mut tracks = Vec::new();

    for record in rdr.deserialize::<Track>() {
        let track = record?;
        if seen.insert(track.track_uri.clone()) {
            tracks.push(track);
        }
    }

    Ok(tracks)
}

/// Loads the reference track list used for client-side browsing
pub async fn load_track_list(path: &Path) -> AppResult<Vec<Track>> {
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "Track list not found: {}",
            path.display()
        )));
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        read_tracks(std::io::BufReader::new(file))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}
