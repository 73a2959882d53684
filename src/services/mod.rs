pub mod dataset;
pub mod encoder;
pub mod mining;
pub mod model_store;
pub mod model_updater;
pub mod recommender;
pub mod transactions;
