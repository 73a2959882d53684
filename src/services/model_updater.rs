use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::Dataset,
    services::{
        dataset::DatasetRepository,
        encoder::EncodedTable,
        mining::{self, MiningAlgorithm, MiningParams},
        model_store::{ModelStore, StoredModel},
        transactions::build_transactions,
    },
};

/// Runs the offline pipeline: dataset -> transactions -> encoded table -> rules -> model store
pub struct ModelUpdater {
    datasets: Arc<dyn DatasetRepository>,
    store: ModelStore,
    algorithm: MiningAlgorithm,
    params: MiningParams,
    default_dataset_id: String,
}

impl ModelUpdater {
    pub fn new(
        datasets: Arc<dyn DatasetRepository>,
        store: ModelStore,
        algorithm: MiningAlgorithm,
        params: MiningParams,
        default_dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            datasets,
            store,
            algorithm,
            params,
            default_dataset_id: default_dataset_id.into(),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn default_dataset_id(&self) -> &str {
        &self.default_dataset_id
    }

    /// Loads a dataset through the repository
    pub async fn load_dataset(&self, dataset_id: &str) -> AppResult<Dataset> {
        self.datasets.load(dataset_id).await
    }

    /// Mines `dataset_id` (the default dataset when `None` or blank) and persists the result
    ///
    /// Every failure is logged and returned; nothing is written unless mining succeeds.
    /// Returns the stored model together with the dataset it was mined from.
    pub async fn update_model(
        &self,
        dataset_id: Option<&str>,
    ) -> AppResult<(StoredModel, Dataset)> {
        let dataset_id = dataset_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(self.default_dataset_id.as_str())
            .to_string();

        let result = self.run(&dataset_id).await;
        if let Err(e) = &result {
            tracing::error!(dataset_id = %dataset_id, error = %e, "Failed to update model");
        }
        result
    }

    async fn run(&self, dataset_id: &str) -> AppResult<(StoredModel, Dataset)> {
        let start = Instant::now();
        tracing::info!(dataset_id = %dataset_id, algorithm = ?self.algorithm, "Loading dataset");
        let dataset = self.datasets.load(dataset_id).await?;

        let store = self.store.clone();
        let algorithm = self.algorithm;
        let params = self.params;

        let (model, dataset) = tokio::task::spawn_blocking(move || {
            let model = mine_and_save(&store, &dataset, algorithm, params)?;
            Ok::<_, AppError>((model, dataset))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Mining task failed: {}", e)))??;

        tracing::info!(
            dataset_id = %dataset_id,
            version = model.record.version,
            rules = model.rules.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Model successfully updated"
        );

        Ok((model, dataset))
    }
}

fn mine_and_save(
    store: &ModelStore,
    dataset: &Dataset,
    algorithm: MiningAlgorithm,
    params: MiningParams,
) -> AppResult<StoredModel> {
    let transactions = build_transactions(&dataset.rows);
    tracing::info!(transactions = transactions.len(), "Preprocessed playlists");

    let table = EncodedTable::fit_transform(&transactions);
    tracing::info!(
        transactions = table.transaction_count(),
        items = table.item_count(),
        "Encoded transactions"
    );

    let rules = mining::mine_rules(&table, algorithm.miner().as_ref(), &params)?;

    store.save(&dataset.id, params, rules)
}
