use std::collections::HashMap;

use super::{is_frequent, FrequentItemsetMiner};
use crate::{models::FrequentItemset, services::encoder::EncodedTable};

/// FP-Growth: compresses transactions into a prefix tree and mines it
/// recursively through conditional trees, without candidate generation.
///
/// Output is ordered by itemset size, then lexicographically, matching `Apriori`.
pub struct FpGrowth;

impl FrequentItemsetMiner for FpGrowth {
    fn frequent_itemsets(
        &self,
        table: &EncodedTable,
        min_support: f64,
        max_len: Option<usize>,
    ) -> Vec<FrequentItemset> {
        let n = table.transaction_count();
        if n == 0 {
            return Vec::new();
        }

        let transactions: Vec<(Vec<usize>, usize)> =
            (0..n).map(|row| (table.row_items(row), 1)).collect();
        let tree = FpTree::build(&transactions, n, min_support);

        let mut result = Vec::new();
        mine(&tree, &[], n, min_support, max_len, &mut result);

        result.sort_by(|a, b| {
            a.items
                .len()
                .cmp(&b.items.len())
                .then_with(|| a.items.cmp(&b.items))
        });
        result
    }

    fn name(&self) -> &'static str {
        "fpgrowth"
    }
}

const ROOT: usize = 0;

#[derive(Debug)]
struct FpNode {
    item: usize,
    count: usize,
    parent: Option<usize>,
    children: HashMap<usize, usize>,
}

/// Arena-backed FP-tree; node 0 is the root
#[derive(Debug)]
struct FpTree {
    nodes: Vec<FpNode>,
    /// item -> every node carrying that item
    header: HashMap<usize, Vec<usize>>,
    /// item -> total count, frequent items only
    item_counts: HashMap<usize, usize>,
}

impl FpTree {
    /// Builds a tree from weighted transactions, dropping infrequent items
    fn build(transactions: &[(Vec<usize>, usize)], n: usize, min_support: f64) -> Self {
        let mut item_counts: HashMap<usize, usize> = HashMap::new();
        for (items, weight) in transactions {
            for &item in items {
                *item_counts.entry(item).or_default() += weight;
            }
        }
        item_counts.retain(|_, count| is_frequent(*count, n, min_support));

        let mut tree = FpTree {
            nodes: vec![FpNode {
                item: usize::MAX,
                count: 0,
                parent: None,
                children: HashMap::new(),
            }],
            header: HashMap::new(),
            item_counts,
        };

        for (items, weight) in transactions {
            let mut path: Vec<usize> = items
                .iter()
                .copied()
                .filter(|item| tree.item_counts.contains_key(item))
                .collect();
            // Most frequent first; ties broken by item index for a stable shape
            path.sort_by(|a, b| {
                tree.item_counts[b]
                    .cmp(&tree.item_counts[a])
                    .then_with(|| a.cmp(b))
            });
            tree.insert(&path, *weight);
        }

        tree
    }

    fn insert(&mut self, path: &[usize], weight: usize) {
        let mut current = ROOT;
        for &item in path {
            current = match self.nodes[current].children.get(&item) {
                Some(&child) => {
                    self.nodes[child].count += weight;
                    child
                }
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(FpNode {
                        item,
                        count: weight,
                        parent: Some(current),
                        children: HashMap::new(),
                    });
                    self.nodes[current].children.insert(item, index);
                    self.header.entry(item).or_default().push(index);
                    index
                }
            };
        }
    }

    /// Items on the path from the root down to (excluding) `node`
    fn prefix_path(&self, node: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self.nodes[node].parent;
        while let Some(index) = current {
            if index == ROOT {
                break;
            }
            path.push(self.nodes[index].item);
            current = self.nodes[index].parent;
        }
        path.reverse();
        path
    }

    /// Prefix paths of every node carrying `item`, weighted by that node's count
    fn conditional_pattern_base(&self, item: usize) -> Vec<(Vec<usize>, usize)> {
        self.header
            .get(&item)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|&node| (self.prefix_path(node), self.nodes[node].count))
                    .filter(|(path, _)| !path.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn mine(
    tree: &FpTree,
    suffix: &[usize],
    n: usize,
    min_support: f64,
    max_len: Option<usize>,
    out: &mut Vec<FrequentItemset>,
) {
    for (&item, &count) in &tree.item_counts {
        let mut itemset = suffix.to_vec();
        itemset.push(item);

        let mut items = itemset.clone();
        items.sort_unstable();
        out.push(FrequentItemset {
            items,
            support: count as f64 / n as f64,
        });

        if max_len.is_some_and(|max| itemset.len() >= max) {
            continue;
        }

        let base = tree.conditional_pattern_base(item);
        if base.is_empty() {
            continue;
        }

        let conditional = FpTree::build(&base, n, min_support);
        if !conditional.item_counts.is_empty() {
            mine(&conditional, &itemset, n, min_support, max_len, out);
        }
    }
}
