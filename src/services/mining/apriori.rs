use std::collections::HashSet;

use super::{is_frequent, FrequentItemsetMiner};
use crate::{models::FrequentItemset, services::encoder::EncodedTable};

/// Level-wise Apriori search over per-item row lists
///
/// Candidates of size k+1 are joined from frequent k-itemsets sharing a
/// (k-1)-prefix, pruned when any k-subset is infrequent, and counted by
/// intersecting the row lists of the two parents.
pub struct Apriori;

impl FrequentItemsetMiner for Apriori {
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

        // (items, rows containing all of them); kept lexicographically sorted
        let mut level: Vec<(Vec<usize>, Vec<usize>)> = table
            .column_rows()
            .into_iter()
            .enumerate()
            .filter(|(_, rows)| is_frequent(rows.len(), n, min_support))
            .map(|(item, rows)| (vec![item], rows))
            .collect();

        let mut result = Vec::new();
        let mut k = 1;

        while !level.is_empty() {
            result.extend(level.iter().map(|(items, rows)| FrequentItemset {
                items: items.clone(),
                support: rows.len() as f64 / n as f64,
            }));

            if max_len.is_some_and(|max| k >= max) {
                break;
            }

            let previous: HashSet<&[usize]> =
                level.iter().map(|(items, _)| items.as_slice()).collect();
            let mut next = Vec::new();

            for i in 0..level.len() {
                let (left, left_rows) = &level[i];
                for (right, right_rows) in &level[i + 1..] {
                    if left[..k - 1] != right[..k - 1] {
                        break;
                    }

                    let mut candidate = left.clone();
                    candidate.push(right[k - 1]);

                    if !all_subsets_frequent(&candidate, &previous) {
                        continue;
                    }

                    let rows = intersect(left_rows, right_rows);
                    if is_frequent(rows.len(), n, min_support) {
                        next.push((candidate, rows));
                    }
                }
            }

            level = next;
            k += 1;
        }

        result
    }

    fn name(&self) -> &'static str {
        "apriori"
    }
}

fn all_subsets_frequent(candidate: &[usize], previous: &HashSet<&[usize]>) -> bool {
    (0..candidate.len()).all(|skip| {
        let subset: Vec<usize> = candidate
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, item)| *item)
            .collect();
        previous.contains(subset.as_slice())
    })
}

/// Intersection of two ascending row lists
fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mining::test_support::table;

    fn as_pairs(itemsets: &[FrequentItemset]) -> Vec<(Vec<usize>, f64)> {
        itemsets
            .iter()
            .map(|i| (i.items.clone(), i.support))
            .collect()
    }

    #[test]
    fn test_levels_and_supports() {
        // columns: a=0, b=1, c=2
        let table = table(&[&["a", "b", "c"], &["a", "b"], &["a", "c"]]);
        let itemsets = Apriori.frequent_itemsets(&table, 0.5, None);

        assert_eq!(
            as_pairs(&itemsets),
            vec![
                (vec![0], 1.0),
                (vec![1], 2.0 / 3.0),
                (vec![2], 2.0 / 3.0),
                (vec![0, 1], 2.0 / 3.0),
                (vec![0, 2], 2.0 / 3.0),
            ]
        );
    }

    #[test]
    fn test_support_boundary_is_inclusive() {
        let table = table(&[&["a", "b"], &["c"], &["d"], &["e"]]);
        let itemsets = Apriori.frequent_itemsets(&table, 0.25, None);
        assert!(itemsets.iter().any(|i| i.items == vec![0, 1]));
    }

    #[test]
    fn test_max_len_caps_itemset_size() {
        let table = table(&[&["a", "b", "c"], &["a", "b", "c"]]);
        let itemsets = Apriori.frequent_itemsets(&table, 0.5, Some(2));
        assert!(itemsets.iter().all(|i| i.items.len() <= 2));
        assert_eq!(itemsets.len(), 6);
    }

    #[test]
    fn test_intersect() {
        assert_eq!(intersect(&[0, 2, 4, 6], &[1, 2, 3, 6]), vec![2, 6]);
        assert!(intersect(&[], &[1]).is_empty());
    }
}
