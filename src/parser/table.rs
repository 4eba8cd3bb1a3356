use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cells::{normalize_numeric, parse_integer};
use super::document::{Document, Row};
use super::select::{select_table, RowFilter};
use crate::error::{EtlError, Result};
use crate::records::{RecordSet, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Text,
    /// Text of the first link in the cell.
    LinkText,
    Numeric,
    Integer,
}

impl CellKind {
    fn is_numeric(self) -> bool {
        matches!(self, CellKind::Numeric | CellKind::Integer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub cell: usize,
    pub kind: CellKind,
}

/// Where the data table sits and which of its rows are data.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub table_index: usize,
    pub schema: Vec<ColumnSpec>,
    pub filter: RowFilter,
}

impl ColumnSpec {
    fn read(&self, row: &Row) -> Result<Value> {
        let cell = row.cells.get(self.cell).ok_or_else(|| {
            EtlError::Structure(format!("row has no cell {} for {:?}", self.cell, self.name))
        })?;
        match self.kind {
            CellKind::Text => Ok(Value::Text(cell.text.clone())),
            CellKind::LinkText => cell
                .link_text
                .clone()
                .map(Value::Text)
                .ok_or_else(|| EtlError::Structure(format!("cell {} has no link", self.cell))),
            CellKind::Numeric => normalize_numeric(&cell.text).map(Value::Float),
            CellKind::Integer => parse_integer(&cell.text).map(Value::Integer),
        }
    }
}

/// Cells the placeholder check applies to.
pub fn numeric_cells(schema: &[ColumnSpec]) -> Vec<usize> {
    schema
        .iter()
        .filter(|c| c.kind.is_numeric())
        .map(|c| c.cell)
        .collect()
}

/// Fewest data cells a row needs for every column to be addressable.
pub fn required_cells(schema: &[ColumnSpec]) -> usize {
    schema.iter().map(|c| c.cell + 1).max().unwrap_or(0)
}

pub fn build_record(schema: &[ColumnSpec], row: &Row) -> Result<Vec<Value>> {
    schema.iter().map(|c| c.read(row)).collect()
}

pub fn extract(document: &Document, spec: &TableSpec) -> Result<RecordSet> {
    let block = select_table(&document.blocks, spec.table_index)?;
    let columns = spec.schema.iter().map(|c| c.name.clone()).collect();
    let mut records = RecordSet::new(columns);

    let built = spec
        .filter
        .select_with(&block.rows, |idx, row| match build_record(&spec.schema, row) {
            Ok(values) => Some(values),
            Err(e) => {
                debug!(row = idx, error = %e, "dropping row");
                None
            }
        });
    for values in built {
        records.push(values)?;
    }

    info!(
        table = spec.table_index,
        rows = block.rows.len(),
        records = records.len(),
        "extracted table"
    );
    Ok(records)
}
