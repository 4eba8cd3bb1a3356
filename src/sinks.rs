//! File snapshot sinks. Each call overwrites its target in full.
//!
//! The JSON layout is column-major, keyed by row position:
//! `{"Country": {"0": "United States", "1": "China"}, "GDP_USD_billions": {...}}`

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::error::{EtlError, Result, Sink};
use crate::records::{RecordSet, Value};

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

pub fn to_json(records: &RecordSet) -> JsonValue {
    let mut doc = Map::new();
    for (c, name) in records.columns().iter().enumerate() {
        let column: Map<String, JsonValue> = records
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| (i.to_string(), row[c].to_json()))
            .collect();
        doc.insert(name.clone(), JsonValue::Object(column));
    }
    JsonValue::Object(doc)
}

pub fn load_json(records: &RecordSet, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let write = || -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        ensure_parent(path)?;
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut out, &to_json(records))?;
        out.flush()?;
        Ok(())
    };
    write().map_err(|e| EtlError::storage(Sink::Json, target, e))?;
    info!(path = %path.display(), rows = records.len(), "wrote json snapshot");
    Ok(())
}

/// Read a snapshot written by [`load_json`]. Rows come back ordered by
/// their numeric key; columns keep file order.
pub fn read_json(path: &Path) -> Result<RecordSet> {
    let target = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| EtlError::io(target.clone(), e))?;
    let doc: JsonValue =
        serde_json::from_str(&text).map_err(|e| EtlError::storage(Sink::Json, target.clone(), e))?;
    let columns = doc.as_object().ok_or_else(|| {
        EtlError::Structure(format!("{}: expected an object of columns", target))
    })?;

    let mut keys: Vec<usize> = Vec::new();
    for column in columns.values() {
        let column = column.as_object().ok_or_else(|| {
            EtlError::Structure(format!("{}: column is not an object", target))
        })?;
        for k in column.keys() {
            let idx = k.parse::<usize>().map_err(|_| {
                EtlError::Structure(format!("{}: row key {:?} is not an index", target, k))
            })?;
            if !keys.contains(&idx) {
                keys.push(idx);
            }
        }
    }
    keys.sort_unstable();

    let mut out = RecordSet::new(columns.keys().cloned().collect());
    for idx in keys {
        let key = idx.to_string();
        let row = columns
            .values()
            .map(|col| col.get(&key).map(Value::from_json).unwrap_or(Value::Null))
            .collect();
        out.push(row)?;
    }
    Ok(out)
}

pub fn load_csv(records: &RecordSet, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let write = || -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        ensure_parent(path)?;
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(records.columns())?;
        for row in records.rows() {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    };
    write().map_err(|e| EtlError::storage(Sink::Csv, target, e))?;
    info!(path = %path.display(), rows = records.len(), "wrote csv snapshot");
    Ok(())
}
