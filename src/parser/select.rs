//! Picks the data table and its data rows.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cells::parse_integer;
use super::document::{Block, Row};
use crate::error::{EtlError, Result};

/// Inclusive integer bounds on one cell, e.g. a release year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    pub cell: usize,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub skip_leading: usize,
    pub max_records: Option<usize>,
    /// Rows with fewer data cells are not data rows.
    pub min_cells: usize,
    pub placeholder: String,
    /// Cells whose raw text must not be the placeholder.
    pub guarded_cells: Vec<usize>,
    pub range: Option<RangeRule>,
}

pub fn select_table(blocks: &[Block], index: usize) -> Result<&Block> {
    blocks.get(index).ok_or_else(|| {
        EtlError::Structure(format!(
            "expected a table at index {}, document has {}",
            index,
            blocks.len()
        ))
    })
}

/// Why a row was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    TooFewCells,
    Placeholder,
    OutOfRange,
}

impl RowFilter {
    pub fn check(&self, row: &Row) -> std::result::Result<(), Skip> {
        if row.cells.len() < self.min_cells {
            return Err(Skip::TooFewCells);
        }
        let placeholder = self.placeholder.as_str();
        if self
            .guarded_cells
            .iter()
            .any(|&i| row.cells.get(i).is_some_and(|c| c.text.trim() == placeholder))
        {
            return Err(Skip::Placeholder);
        }
        if let Some(rule) = &self.range {
            let value = row
                .cells
                .get(rule.cell)
                .and_then(|c| parse_integer(&c.text).ok());
            match value {
                Some(v) if (rule.min..=rule.max).contains(&v) => {}
                _ => return Err(Skip::OutOfRange),
            }
        }
        Ok(())
    }

    /// Rows after the leading skip that pass every check, in source order.
    /// Unbounded: `max_records` is applied by `select_with`.
    pub fn qualifying<'s, 'r: 's>(
        &'s self,
        rows: &'r [Row],
    ) -> impl Iterator<Item = (usize, &'r Row)> + 's {
        rows.iter()
            .enumerate()
            .skip(self.skip_leading)
            .filter(move |(idx, row)| match self.check(row) {
                Ok(()) => true,
                Err(reason) => {
                    debug!(row = idx, ?reason, "skipping row");
                    false
                }
            })
    }

    pub fn limit(&self) -> usize {
        self.max_records.unwrap_or(usize::MAX)
    }

    /// Qualifying rows mapped through `build`, at most `max_records` of them.
    /// A row `build` rejects does not count toward the limit.
    pub fn select_with<'r, T>(
        &self,
        rows: &'r [Row],
        mut build: impl FnMut(usize, &'r Row) -> Option<T>,
    ) -> Vec<T> {
        self.qualifying(rows)
            .filter_map(|(idx, row)| build(idx, row))
            .take(self.limit())
            .collect()
    }
}

pub fn select_rows<'r>(rows: &'r [Row], filter: &RowFilter) -> Vec<&'r Row> {
    filter.select_with(rows, |_, row| Some(row))
}
