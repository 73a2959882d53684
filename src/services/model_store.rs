//! Filesystem persistence for mined rule sets.
//!
//! Two artifacts live in the model directory:
//! - `rules.json`: the rule set together with the version record it was written under
//! - `model_info`: the `version;timestamp` line
//!
//! Each file is written to a temporary sibling and renamed into place. A crash
//! between the two renames leaves the pair disagreeing on their version
//! record, which `load` reports as an inconsistent model instead of serving it.

use chrono::{Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::{
    error::{AppError, AppResult},
    models::{SingleItemRule, VersionRecord},
    services::mining::MiningParams,
};

const RULES_FILE: &str = "rules.json";
const INFO_FILE: &str = "model_info";

/// A rule set as persisted, with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub record: VersionRecord,
    pub dataset_id: String,
    pub params: MiningParams,
    pub rules: Vec<SingleItemRule>,
}

/// Owns the rule set and version record under one model directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn rules_path(&self) -> PathBuf {
        self.dir.join(RULES_FILE)
    }

    fn info_path(&self) -> PathBuf {
        self.dir.join(INFO_FILE)
    }

    /// Reads the current version record, if one has been written
    pub fn current_version(&self) -> AppResult<Option<VersionRecord>> {
        let path = self.info_path();
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)?;
        raw.parse::<VersionRecord>().map(Some).map_err(|e| {
            AppError::InconsistentModel(format!("unreadable {}: {}", path.display(), e))
        })
    }

    /// Persists a freshly mined rule set under the next version
    ///
    /// The version is one past the current record (1 when none exists) and the
    /// timestamp is strictly later than the previous one. The whole artifact is
    /// replaced; nothing from the previous rule set survives.
    pub fn save(
        &self,
        dataset_id: &str,
        params: MiningParams,
        rules: Vec<SingleItemRule>,
    ) -> AppResult<StoredModel> {
        fs::create_dir_all(&self.dir)?;

        let previous = self.current_version()?;
        let record = next_record(previous.as_ref())?;

        let model = StoredModel {
            record,
            dataset_id: dataset_id.to_string(),
            params,
            rules,
        };

        let payload = serde_json::to_vec(&model)?;
        self.write_atomic(&self.rules_path(), &payload)?;
        self.write_atomic(&self.info_path(), record.to_string().as_bytes())?;

        tracing::info!(
            model_dir = %self.dir.display(),
            version = record.version,
            rules = model.rules.len(),
            "Model saved"
        );

        Ok(model)
    }

    /// Loads the persisted model
    ///
    /// Returns `Ok(None)` when nothing has been mined yet. A lone artifact,
    /// unreadable content, or a version record that disagrees with the one
    /// embedded in the rule set is an `InconsistentModel` error.
    pub fn load(&self) -> AppResult<Option<StoredModel>> {
        let rules_path = self.rules_path();
        let info_path = self.info_path();

        match (rules_path.exists(), info_path.exists()) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(AppError::InconsistentModel(format!(
                    "{} exists without {}",
                    rules_path.display(),
                    info_path.display()
                )))
            }
            (false, true) => {
                return Err(AppError::InconsistentModel(format!(
                    "{} exists without {}",
                    info_path.display(),
                    rules_path.display()
                )))
            }
            (true, true) => {}
        }

        let record = self.current_version()?.ok_or_else(|| {
            AppError::InconsistentModel(format!("{} disappeared", info_path.display()))
        })?;

        let payload = fs::read(&rules_path)?;
        let model: StoredModel = serde_json::from_slice(&payload).map_err(|e| {
            AppError::InconsistentModel(format!("unreadable {}: {}", rules_path.display(), e))
        })?;

        if model.record != record {
            return Err(AppError::InconsistentModel(format!(
                "rule set was written as version {} but {} declares version {}",
                model.record, INFO_FILE, record
            )));
        }

        Ok(Some(model))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> AppResult<()> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| AppError::Io(e.error))?;
        Ok(())
    }
}

fn next_record(previous: Option<&VersionRecord>) -> AppResult<VersionRecord> {
    // Stored with microsecond precision, so compare at that precision
    let now = Utc::now().trunc_subsecs(6);

    let Some(previous) = previous else {
        return Ok(VersionRecord {
            version: 1,
            created_at: now,
        });
    };

    let version = previous.version.checked_add(1).ok_or_else(|| {
        AppError::InconsistentModel(format!(
            "{} holds version {}, which cannot be incremented",
            INFO_FILE, previous.version
        ))
    })?;

    Ok(VersionRecord {
        version,
        created_at: if now > previous.created_at {
            now
        } else {
            previous.created_at + Duration::microseconds(1)
        },
    })
}
