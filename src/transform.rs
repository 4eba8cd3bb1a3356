use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EtlError, Result};
use crate::records::{RecordSet, Value};

/// Divide one column by `factor`, round, and store it under `rename`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rescale {
    pub column: String,
    pub factor: f64,
    /// Decimal digits to keep. `None` leaves values unrounded.
    pub precision: Option<u32>,
    pub rename: String,
}

/// Round half away from zero at `digits` decimal places.
pub fn round_to(x: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (x * scale).round() / scale
}

pub fn rescale(records: &RecordSet, spec: &Rescale) -> Result<RecordSet> {
    if spec.factor == 0.0 || !spec.factor.is_finite() {
        return Err(EtlError::Format {
            raw: spec.factor.to_string(),
            expected: "non-zero finite factor",
        });
    }
    let idx = records.column_index(&spec.column).ok_or_else(|| {
        EtlError::Structure(format!("no column {:?} to rescale", spec.column))
    })?;
    if spec.rename != spec.column && records.column_index(&spec.rename).is_some() {
        return Err(EtlError::Structure(format!(
            "cannot rename {:?} to {:?}: column already exists",
            spec.column, spec.rename
        )));
    }

    let mut columns = records.columns().to_vec();
    columns[idx] = spec.rename.clone();

    let mut out = RecordSet::new(columns);
    for (row_idx, row) in records.rows().iter().enumerate() {
        let type_err = || EtlError::Type {
            column: spec.column.clone(),
            row: row_idx,
        };
        let raw = row[idx].as_f64().ok_or_else(type_err)?;
        let scaled = raw / spec.factor;
        let value = match spec.precision {
            Some(p) => round_to(scaled, p),
            None => scaled,
        };
        if !value.is_finite() {
            return Err(type_err());
        }

        let mut values = row.clone();
        values[idx] = Value::Float(value);
        out.push(values)?;
    }

    info!(
        column = %spec.column,
        rename = %spec.rename,
        factor = spec.factor,
        rows = out.len(),
        "rescaled column"
    );
    Ok(out)
}
