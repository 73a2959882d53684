use serde::{Deserialize, Serialize};

use super::TrackUri;

/// A frequent itemset expressed as sorted column indices of an encoded table
#[derive(Debug, Clone, PartialEq)]
pub struct FrequentItemset {
    pub items: Vec<usize>,
    pub support: f64,
}

/// Association rule with every metric computed during derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedents: Vec<TrackUri>,
    pub consequents: Vec<TrackUri>,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub leverage: f64,
    /// `None` when confidence is 1.0 (conviction is unbounded)
    pub conviction: Option<f64>,
    pub zhangs_metric: f64,
}

/// "If you listened to X, suggest Y" rule: exactly one antecedent and one consequent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleItemRule {
    pub antecedent: TrackUri,
    pub consequent: TrackUri,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub leverage: f64,
    pub conviction: Option<f64>,
    pub zhangs_metric: f64,
}

impl TryFrom<AssociationRule> for SingleItemRule {
    type Error = AssociationRule;

    /// Multi-item rules are handed back untouched
    fn try_from(rule: AssociationRule) -> Result<Self, Self::Error> {
        if rule.antecedents.len() != 1 || rule.consequents.len() != 1 {
            return Err(rule);
        }

        let mut rule = rule;
        let antecedent = rule.antecedents.remove(0);
        let consequent = rule.consequents.remove(0);

        Ok(SingleItemRule {
            antecedent,
            consequent,
            antecedent_support: rule.antecedent_support,
            consequent_support: rule.consequent_support,
            support: rule.support,
            confidence: rule.confidence,
            lift: rule.lift,
            leverage: rule.leverage,
            conviction: rule.conviction,
            zhangs_metric: rule.zhangs_metric,
        })
    }
}

impl From<SingleItemRule> for AssociationRule {
    fn from(rule: SingleItemRule) -> Self {
        AssociationRule {
            antecedents: vec![rule.antecedent],
            consequents: vec![rule.consequent],
            antecedent_support: rule.antecedent_support,
            consequent_support: rule.consequent_support,
            support: rule.support,
            confidence: rule.confidence,
            lift: rule.lift,
            leverage: rule.leverage,
            conviction: rule.conviction,
            zhangs_metric: rule.zhangs_metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(antecedents: &[&str], consequents: &[&str]) -> AssociationRule {
        AssociationRule {
            antecedents: antecedents.iter().map(|s| TrackUri::new(*s)).collect(),
            consequents: consequents.iter().map(|s| TrackUri::new(*s)).collect(),
            antecedent_support: 0.5,
            consequent_support: 0.5,
            support: 0.4,
            confidence: 0.8,
            lift: 1.6,
            leverage: 0.15,
            conviction: Some(2.5),
            zhangs_metric: 0.75,
        }
    }

    #[test]
    fn test_single_item_rule_from_one_to_one() {
        let single = SingleItemRule::try_from(rule(&["a"], &["b"])).unwrap();
        assert_eq!(single.antecedent, TrackUri::new("a"));
        assert_eq!(single.consequent, TrackUri::new("b"));
        assert_eq!(single.lift, 1.6);
    }

    #[test]
    fn test_single_item_rule_rejects_multi_item_sides() {
        assert!(SingleItemRule::try_from(rule(&["a", "b"], &["c"])).is_err());
        assert!(SingleItemRule::try_from(rule(&["a"], &["b", "c"])).is_err());
    }

    #[test]
    fn test_conviction_none_serializes_as_null() {
        let mut single = SingleItemRule::try_from(rule(&["a"], &["b"])).unwrap();
        single.conviction = None;
        let json = serde_json::to_value(&single).unwrap();
        assert!(json["conviction"].is_null());
    }
}
