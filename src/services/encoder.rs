use std::collections::{BTreeSet, HashMap};

use crate::models::TrackUri;
use crate::services::transactions::Transaction;

/// Boolean item-presence table: one row per transaction, one column per distinct item
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    /// Sorted item vocabulary; column `j` holds `columns[j]`
    pub columns: Vec<TrackUri>,
    pub rows: Vec<Vec<bool>>,
}

impl EncodedTable {
    /// Builds the table from scratch, deriving the column set from the given transactions only
    pub fn fit_transform(transactions: &[Transaction]) -> Self {
        let columns: Vec<TrackUri> = transactions
            .iter()
            .flat_map(|t| t.items.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        let index: HashMap<&TrackUri, usize> =
            columns.iter().enumerate().map(|(i, uri)| (uri, i)).collect();

        let rows = transactions
            .iter()
            .map(|transaction| {
                let mut row = vec![false; columns.len()];
                for item in &transaction.items {
                    row[index[item]] = true;
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn transaction_count(&self) -> usize {
        self.rows.len()
    }

    pub fn item_count(&self) -> usize {
        self.columns.len()
    }

    /// Column indices present in row `row`, ascending
    pub fn row_items(&self, row: usize) -> Vec<usize> {
        self.rows[row]
            .iter()
            .enumerate()
            .filter_map(|(j, present)| present.then_some(j))
            .collect()
    }

    /// For each column, the ascending row indices containing that item
    pub fn column_rows(&self) -> Vec<Vec<usize>> {
        let mut column_rows = vec![Vec::new(); self.columns.len()];
        for (i, row) in self.rows.iter().enumerate() {
            for (j, present) in row.iter().enumerate() {
                if *present {
                    column_rows[j].push(i);
                }
            }
        }
        column_rows
    }
}
