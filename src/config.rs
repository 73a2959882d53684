use serde::Deserialize;
use std::path::PathBuf;

use crate::services::mining::{MiningAlgorithm, MiningParams};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory holding playlist dataset files
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Directory holding the persisted rule set and version record
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Dataset mined when an update request names none
    #[serde(default = "default_dataset_id")]
    pub default_dataset_id: String,

    /// Reference file served by the track listing endpoint
    #[serde(default = "default_tracks_path")]
    pub tracks_path: PathBuf,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub app_port: u16,

    #[serde(default)]
    pub mining_algorithm: MiningAlgorithm,

    #[serde(default = "default_min_support")]
    pub min_support: f64,

    #[serde(default = "default_min_lift")]
    pub min_lift: f64,
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("./datasets")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./models")
}

fn default_dataset_id() -> String {
    "2023_spotify_ds1".to_string()
}

fn default_tracks_path() -> PathBuf {
    PathBuf::from("./datasets/tracks.csv")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_min_support() -> f64 {
    MiningParams::default().min_support
}

fn default_min_lift() -> f64 {
    MiningParams::default().min_lift
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config
            .mining_params()
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid mining configuration: {}", e))?;
        Ok(config)
    }

    /// Configuration rooted at the given directories with every other value defaulted
    pub fn with_paths(
        dataset_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
        tracks_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            model_path: model_path.into(),
            default_dataset_id: default_dataset_id(),
            tracks_path: tracks_path.into(),
            host: default_host(),
            app_port: default_port(),
            mining_algorithm: MiningAlgorithm::default(),
            min_support: default_min_support(),
            min_lift: default_min_lift(),
        }
    }

    pub fn mining_params(&self) -> MiningParams {
        MiningParams {
            min_support: self.min_support,
            min_lift: self.min_lift,
            max_len: None,
        }
    }
}
