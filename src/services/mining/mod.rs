//! Association-rule mining over an encoded transaction table
//!
//! Frequent itemsets come from a pluggable `FrequentItemsetMiner` (Apriori or
//! FP-Growth, which agree on their output). Rules are derived from every split
//! of every frequent itemset, kept when their lift clears the threshold, and
//! finally narrowed to single-antecedent/single-consequent rules.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{AssociationRule, FrequentItemset, SingleItemRule},
    services::encoder::EncodedTable,
};

pub mod apriori;
pub mod fpgrowth;
pub mod rules;

pub use apriori::Apriori;
pub use fpgrowth::FpGrowth;

/// Thresholds for one mining run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MiningParams {
    /// Fraction of transactions an itemset must appear in
    pub min_support: f64,
    /// Minimum lift a rule must reach to be kept
    pub min_lift: f64,
    /// Upper bound on itemset size; unbounded when `None`
    pub max_len: Option<usize>,
}

impl Default for MiningParams {
    fn default() -> Self {
        Self {
            min_support: 0.05,
            min_lift: 1.0,
            max_len: None,
        }
    }
}

impl MiningParams {
    pub fn validate(&self) -> AppResult<()> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(AppError::InvalidInput(format!(
                "min_support must be in (0, 1], got {}",
                self.min_support
            )));
        }
        if !self.min_lift.is_finite() || self.min_lift < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "min_lift must be a non-negative number, got {}",
                self.min_lift
            )));
        }
        if self.max_len == Some(0) {
            return Err(AppError::InvalidInput(
                "max_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Frequent itemset algorithm selectable through configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningAlgorithm {
    Apriori,
    #[default]
    #[serde(alias = "fp_growth", alias = "fp-growth")]
    FpGrowth,
}

impl MiningAlgorithm {
    pub fn miner(&self) -> Box<dyn FrequentItemsetMiner> {
        match self {
            MiningAlgorithm::Apriori => Box::new(Apriori),
            MiningAlgorithm::FpGrowth => Box::new(FpGrowth),
        }
    }
}

/// Trait for frequent itemset algorithms
///
/// Implementations must return every itemset whose support is at least
/// `min_support`, each with its items as ascending column indices.
pub trait FrequentItemsetMiner: Send + Sync {
    fn frequent_itemsets(
        &self,
        table: &EncodedTable,
        min_support: f64,
        max_len: Option<usize>,
    ) -> Vec<FrequentItemset>;

    /// Algorithm name for logging
    fn name(&self) -> &'static str;
}

/// Shared frequency test so every algorithm draws the same support boundary
pub(crate) fn is_frequent(count: usize, transactions: usize, min_support: f64) -> bool {
    transactions > 0 && count as f64 / transactions as f64 >= min_support
}

/// Keeps only rules with exactly one antecedent and one consequent
///
/// Multi-item rules are discarded, never merged. Output order follows input order.
pub fn single_item_rules(
    rules: impl IntoIterator<Item = AssociationRule>,
) -> Vec<SingleItemRule> {
    rules
        .into_iter()
        .filter_map(|rule| SingleItemRule::try_from(rule).ok())
        .collect()
}

/// Runs the full pipeline from encoded table to the filtered rule set
///
/// An empty result (nothing clears `min_support`) is not an error.
pub fn mine_rules(
    table: &EncodedTable,
    miner: &dyn FrequentItemsetMiner,
    params: &MiningParams,
) -> AppResult<Vec<SingleItemRule>> {
    params.validate()?;
    let start = Instant::now();

    let itemsets = miner.frequent_itemsets(table, params.min_support, params.max_len);
    tracing::info!(
        algorithm = miner.name(),
        itemsets = itemsets.len(),
        min_support = params.min_support,
        "Frequent itemsets mined"
    );

    let derived = rules::association_rules(table, &itemsets, params.min_lift)?;
    let derived_count = derived.len();

    let mut filtered = single_item_rules(derived);
    filtered.sort_by(|a, b| {
        a.antecedent
            .cmp(&b.antecedent)
            .then_with(|| a.consequent.cmp(&b.consequent))
    });

    tracing::info!(
        derived = derived_count,
        kept = filtered.len(),
        min_lift = params.min_lift,
        elapsed_ms = start.elapsed().as_millis(),
        "Association rules generated"
    );

    Ok(filtered)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::TrackUri;
    use crate::services::encoder::EncodedTable;
    use crate::services::transactions::Transaction;

    pub fn table(transactions: &[&[&str]]) -> EncodedTable {
        let transactions: Vec<Transaction> = transactions
            .iter()
            .enumerate()
            .map(|(i, items)| Transaction {
                playlist_id: i.to_string(),
                items: items.iter().map(|s| TrackUri::new(*s)).collect(),
            })
            .collect();
        EncodedTable::fit_transform(&transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::table;
    use super::*;
    use crate::models::TrackUri;

    fn pairs(rules: &[SingleItemRule]) -> Vec<(String, String)> {
        rules
            .iter()
            .map(|r| (r.antecedent.to_string(), r.consequent.to_string()))
            .collect()
    }

    #[test]
    fn test_three_playlist_scenario() {
        // P1={A,B,C}, P2={A,B}, P3={A,C}
        let table = table(&[&["A", "B", "C"], &["A", "B"], &["A", "C"]]);

        for algorithm in [MiningAlgorithm::Apriori, MiningAlgorithm::FpGrowth] {
            let rules =
                mine_rules(&table, algorithm.miner().as_ref(), &MiningParams::default()).unwrap();

            // B<->C has lift 0.75 and the {A,B,C} rules are multi-item
            assert_eq!(
                pairs(&rules),
                vec![
                    ("A".to_string(), "B".to_string()),
                    ("A".to_string(), "C".to_string()),
                    ("B".to_string(), "A".to_string()),
                    ("C".to_string(), "A".to_string()),
                ]
            );
            assert!(rules.iter().all(|r| r.lift >= 1.0));
        }
    }

    #[test]
    fn test_no_self_referential_rules() {
        let table = table(&[
            &["a", "b"],
            &["a", "b"],
            &["c", "d"],
            &["c", "d"],
            &["a", "b", "c"],
        ]);
        let rules = mine_rules(&table, &FpGrowth, &MiningParams::default()).unwrap();

        assert!(!rules.is_empty());
        assert!(rules.iter().all(|r| r.antecedent != r.consequent));
    }

    #[test]
    fn test_unreachable_support_yields_empty_rule_set() {
        let table = table(&[&["a", "b"], &["c", "d"], &["e", "f"]]);
        let params = MiningParams {
            min_support: 0.9,
            ..MiningParams::default()
        };

        let rules = mine_rules(&table, &Apriori, &params).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_empty_table_yields_empty_rule_set() {
        let table = table(&[]);
        let rules = mine_rules(&table, &FpGrowth, &MiningParams::default()).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let table = table(&[&["a", "b", "c"], &["a", "b", "c"], &["a", "b"], &["c"]]);
        let itemsets = Apriori.frequent_itemsets(&table, 0.05, None);
        let derived = rules::association_rules(&table, &itemsets, 0.0).unwrap();
        assert!(derived.iter().any(|r| r.antecedents.len() > 1));

        let once = single_item_rules(derived);
        let twice = single_item_rules(once.iter().cloned().map(AssociationRule::from));

        assert_eq!(once, twice);
        assert!(once.iter().all(|r| r.antecedent != r.consequent));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let table = table(&[&["a"]]);
        let params = MiningParams {
            min_support: 0.0,
            ..MiningParams::default()
        };

        let result = mine_rules(&table, &Apriori, &params);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(MiningAlgorithm::Apriori.miner().name(), "apriori");
        assert_eq!(MiningAlgorithm::FpGrowth.miner().name(), "fpgrowth");
    }

    #[test]
    fn test_algorithm_deserializes_lowercase() {
        let algorithm: MiningAlgorithm = serde_json::from_str(r#""fpgrowth""#).unwrap();
        assert_eq!(algorithm, MiningAlgorithm::FpGrowth);
        let algorithm: MiningAlgorithm = serde_json::from_str(r#""apriori""#).unwrap();
        assert_eq!(algorithm, MiningAlgorithm::Apriori);
    }

    #[test]
    fn test_rule_items_are_track_uris() {
        let table = table(&[&["x", "y"], &["x", "y"]]);
        let rules = mine_rules(&table, &Apriori, &MiningParams::default()).unwrap();
        assert_eq!(rules[0].antecedent, TrackUri::new("x"));
        assert_eq!(rules[0].consequent, TrackUri::new("y"));
    }
}
