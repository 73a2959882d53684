use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{AssociationRule, FrequentItemset, TrackUri},
    services::encoder::EncodedTable,
};

/// Derives association rules from frequent itemsets
///
/// Every non-empty proper subset of each itemset of size two or more becomes an
/// antecedent, the remainder its consequent. Antecedent and consequent supports
/// are looked up among the itemsets, which is always possible because every
/// subset of a frequent itemset is frequent. Rules with `lift < min_lift` are dropped.
pub fn association_rules(
    table: &EncodedTable,
    itemsets: &[FrequentItemset],
    min_lift: f64,
) -> AppResult<Vec<AssociationRule>> {
    let supports: HashMap<&[usize], f64> = itemsets
        .iter()
        .map(|itemset| (itemset.items.as_slice(), itemset.support))
        .collect();

    let mut rules = Vec::new();

    for itemset in itemsets.iter().filter(|i| i.items.len() >= 2) {
        let items = &itemset.items;
        if items.len() >= u64::BITS as usize {
            return Err(AppError::Mining(format!(
                "itemset of {} items is too large to split into rules",
                items.len()
            )));
        }

        let full_mask = (1u64 << items.len()) - 1;
        for mask in 1..full_mask {
            let (antecedent, consequent) = split(items, mask);

            let antecedent_support = lookup(&supports, &antecedent)?;
            let consequent_support = lookup(&supports, &consequent)?;
            let metrics = Metrics::compute(itemset.support, antecedent_support, consequent_support);

            if metrics.lift < min_lift {
                continue;
            }

            rules.push(AssociationRule {
                antecedents: to_uris(table, &antecedent),
                consequents: to_uris(table, &consequent),
                antecedent_support,
                consequent_support,
                support: itemset.support,
                confidence: metrics.confidence,
                lift: metrics.lift,
                leverage: metrics.leverage,
                conviction: metrics.conviction,
                zhangs_metric: metrics.zhangs_metric,
            });
        }
    }

    Ok(rules)
}

fn split(items: &[usize], mask: u64) -> (Vec<usize>, Vec<usize>) {
    let mut antecedent = Vec::new();
    let mut consequent = Vec::new();
    for (bit, item) in items.iter().enumerate() {
        if mask & (1 << bit) != 0 {
            antecedent.push(*item);
        } else {
            consequent.push(*item);
        }
    }
    (antecedent, consequent)
}

fn lookup(supports: &HashMap<&[usize], f64>, items: &[usize]) -> AppResult<f64> {
    supports.get(items).copied().ok_or_else(|| {
        AppError::Mining(format!(
            "support missing for sub-itemset {:?}; itemsets are not downward closed",
            items
        ))
    })
}

fn to_uris(table: &EncodedTable, items: &[usize]) -> Vec<TrackUri> {
    items.iter().map(|&i| table.columns[i].clone()).collect()
}

#[derive(Debug, PartialEq)]
struct Metrics {
    confidence: f64,
    lift: f64,
    leverage: f64,
    conviction: Option<f64>,
    zhangs_metric: f64,
}

impl Metrics {
    fn compute(support: f64, antecedent_support: f64, consequent_support: f64) -> Self {
        let confidence = support / antecedent_support;
        let lift = confidence / consequent_support;
        let leverage = support - antecedent_support * consequent_support;

        let conviction = if confidence >= 1.0 {
            None
        } else {
            Some((1.0 - consequent_support) / (1.0 - confidence))
        };

        let denominator = f64::max(
            support * (1.0 - antecedent_support),
            antecedent_support * (consequent_support - support),
        );
        let zhangs_metric = if denominator == 0.0 {
            0.0
        } else {
            leverage / denominator
        };

        Self {
            confidence,
            lift,
            leverage,
            conviction,
            zhangs_metric,
        }
    }
}
