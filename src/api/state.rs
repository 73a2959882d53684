use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{Dataset, VersionRecord},
    services::{
        dataset::FsDatasetRepository,
        model_store::{ModelStore, StoredModel},
        model_updater::ModelUpdater,
        recommender::{Recommender, TrackCatalog},
    },
};

/// Immutable view of everything a recommendation request reads
///
/// Built completely before it is published; replaced as a whole on update.
pub struct ServingSnapshot {
    pub dataset_id: String,
    pub catalog: TrackCatalog,
    pub recommender: Recommender,
    pub model: Option<ModelSummary>,
}

/// Provenance of the rule set currently served
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub record: VersionRecord,
    pub dataset_id: String,
    pub rule_count: usize,
}

impl ServingSnapshot {
    fn build(dataset: &Dataset, model: Option<&StoredModel>) -> Self {
        let recommender = model
            .map(|m| Recommender::new(&m.rules))
            .unwrap_or_default();

        Self {
            dataset_id: dataset.id.clone(),
            catalog: TrackCatalog::from_rows(&dataset.rows),
            model: model.map(|m| ModelSummary {
                record: m.record,
                dataset_id: m.dataset_id.clone(),
                rule_count: m.rules.len(),
            }),
            recommender,
        }
    }

    pub fn version(&self) -> Option<&VersionRecord> {
        self.model.as_ref().map(|m| &m.record)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    snapshot: Arc<RwLock<Arc<ServingSnapshot>>>,
    /// Held for the duration of a mining run; one run at a time
    update_lock: Arc<Mutex<()>>,
    updater: Arc<ModelUpdater>,
    tracks_path: PathBuf,
}

impl AppState {
    /// Creates state backed by the filesystem locations in `config`
    pub async fn new(config: &Config) -> AppResult<Self> {
        config.mining_params().validate()?;

        let updater = ModelUpdater::new(
            Arc::new(FsDatasetRepository::new(&config.dataset_path)),
            ModelStore::new(&config.model_path),
            config.mining_algorithm,
            config.mining_params(),
            config.default_dataset_id.clone(),
        );

        Self::from_updater(updater, config.tracks_path.clone()).await
    }

    /// Creates state around an existing updater, loading the persisted model
    ///
    /// Fails when the persisted model is inconsistent or its dataset cannot be read.
    pub async fn from_updater(updater: ModelUpdater, tracks_path: PathBuf) -> AppResult<Self> {
        let model = updater.store().load()?;

        let dataset_id = model
            .as_ref()
            .map(|m| m.dataset_id.clone())
            .unwrap_or_else(|| updater.default_dataset_id().to_string());
        let dataset = updater.load_dataset(&dataset_id).await?;

        let snapshot = ServingSnapshot::build(&dataset, model.as_ref());

        match &snapshot.model {
            Some(summary) => tracing::info!(
                version = summary.record.version,
                created_at = %summary.record.created_at,
                rules = summary.rule_count,
                dataset_id = %dataset_id,
                "Loaded persisted model"
            ),
            None => tracing::warn!(
                model_dir = %updater.store().dir().display(),
                dataset_id = %dataset_id,
                "No model found; serving without rules until an update runs"
            ),
        }

        Ok(Self {
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
            update_lock: Arc::new(Mutex::new(())),
            updater: Arc::new(updater),
            tracks_path,
        })
    }

    /// Current snapshot; the read lock is released before returning
    pub async fn snapshot(&self) -> Arc<ServingSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub fn tracks_path(&self) -> &Path {
        &self.tracks_path
    }

    /// Mines a new model and publishes it
    ///
    /// A second call while one is running is rejected with `AppError::Conflict`.
    /// The served snapshot only changes after the new model is persisted.
    ///
    /// The run happens on its own task, which holds the update lock until the
    /// snapshot is swapped. Dropping the returned future does not cancel it.
    pub async fn update_model(&self, dataset_id: Option<&str>) -> AppResult<ModelSummary> {
        let guard = self.update_lock.clone().try_lock_owned().map_err(|_| {
            AppError::Conflict("A model update is already in progress".to_string())
        })?;

        let updater = self.updater.clone();
        let served = self.snapshot.clone();
        let dataset_id = dataset_id.map(str::to_owned);

        let run = tokio::spawn(async move {
            let _guard = guard;

            let (model, dataset) = updater.update_model(dataset_id.as_deref()).await?;
            let snapshot = Arc::new(ServingSnapshot::build(&dataset, Some(&model)));
            let summary = snapshot
                .model
                .clone()
                .ok_or_else(|| AppError::Internal("snapshot built without model".to_string()))?;

            *served.write().await = snapshot;

            Ok::<_, AppError>(summary)
        });

        run.await
            .map_err(|e| AppError::Internal(format!("model update task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::DatasetRepository;
    use crate::services::mining::{MiningAlgorithm, MiningParams};
    use std::time::Duration;

    const PLAYLISTS: &str = "\
pid,artist_name,track_name,track_uri
1,Artist A,Song A,uri:a
1,Artist B,Song B,uri:b
2,Artist A,Song A,uri:a
2,Artist B,Song B,uri:b
";

    fn config(root: &std::path::Path) -> Config {
        let mut config = Config::with_paths(
            root.join("datasets"),
            root.join("models"),
            root.join("tracks.csv"),
        );
        config.default_dataset_id = "ds".to_string();
        config
    }

    fn write_dataset(root: &std::path::Path, name: &str, contents: &str) {
        std::fs::create_dir_all(root.join("datasets")).unwrap();
        std::fs::write(root.join("datasets").join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_starts_without_model() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);

        let state = AppState::new(&config(dir.path())).await.unwrap();
        let snapshot = state.snapshot().await;
        assert!(snapshot.model.is_none());
        assert_eq!(snapshot.catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_dataset_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppState::new(&config(dir.path())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);
        let state = AppState::new(&config(dir.path())).await.unwrap();

        let before = state.snapshot().await;
        let summary = state.update_model(None).await.unwrap();
        let after = state.snapshot().await;

        assert_eq!(summary.record.version, 1);
        assert_eq!(summary.rule_count, 2);
        assert!(before.model.is_none());
        assert_eq!(after.version().map(|r| r.version), Some(1));
    }

    #[tokio::test]
    async fn test_restart_serves_dataset_model_was_mined_from() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);
        write_dataset(
            dir.path(),
            "other",
            "pid,artist_name,track_name,track_uri\n1,X,Y,uri:x\n1,Z,W,uri:z\n",
        );

        let state = AppState::new(&config(dir.path())).await.unwrap();
        state.update_model(Some("other")).await.unwrap();

        let restarted = AppState::new(&config(dir.path())).await.unwrap();
        let snapshot = restarted.snapshot().await;
        assert_eq!(snapshot.dataset_id, "other");
        assert_eq!(snapshot.model.as_ref().unwrap().dataset_id, "other");
    }

    #[tokio::test]
    async fn test_inconsistent_model_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);
        let state = AppState::new(&config(dir.path())).await.unwrap();
        state.update_model(None).await.unwrap();

        std::fs::remove_file(dir.path().join("models").join("model_info")).unwrap();

        let result = AppState::new(&config(dir.path())).await;
        assert!(matches!(result, Err(AppError::InconsistentModel(_))));
    }

    #[tokio::test]
    async fn test_concurrent_update_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);
        let state = AppState::new(&config(dir.path())).await.unwrap();

        let _held = state.update_lock.lock().await;
        let result = state.update_model(None).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    struct SlowRepository {
        inner: FsDatasetRepository,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl DatasetRepository for SlowRepository {
        async fn load(&self, dataset_id: &str) -> AppResult<Dataset> {
            if dataset_id == "slow" {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.load(dataset_id).await
        }
    }

    #[tokio::test]
    async fn test_abandoned_update_keeps_lock_until_finished() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);
        write_dataset(dir.path(), "slow", PLAYLISTS);

        let config = config(dir.path());
        let updater = ModelUpdater::new(
            Arc::new(SlowRepository {
                inner: FsDatasetRepository::new(&config.dataset_path),
                delay: Duration::from_millis(300),
            }),
            ModelStore::new(&config.model_path),
            config.mining_algorithm,
            config.mining_params(),
            config.default_dataset_id.clone(),
        );
        let state = AppState::from_updater(updater, config.tracks_path.clone())
            .await
            .unwrap();

        let first =
            tokio::time::timeout(Duration::from_millis(50), state.update_model(Some("slow"))).await;
        assert!(first.is_err());

        let second = state.update_model(None).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        // The abandoned run still finishes and publishes its model
        let _done = state.update_lock.lock().await;
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.dataset_id, "slow");
        assert_eq!(snapshot.version().map(|r| r.version), Some(1));

        let stored = ModelStore::new(&config.model_path).current_version().unwrap();
        assert_eq!(stored.map(|r| r.version), Some(1));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_current_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "ds", PLAYLISTS);
        let state = AppState::new(&config(dir.path())).await.unwrap();
        state.update_model(None).await.unwrap();

        let result = state.update_model(Some("missing")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.dataset_id, "ds");
        assert_eq!(snapshot.version().map(|r| r.version), Some(1));
    }

    #[test]
    fn test_mining_params_validated_on_config() {
        let mut config = Config::with_paths("d", "m", "t");
        config.min_support = 2.0;
        config.mining_algorithm = MiningAlgorithm::Apriori;
        assert!(config.mining_params().validate().is_err());
        assert!(MiningParams::default().validate().is_ok());
    }
}
