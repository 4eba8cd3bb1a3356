use std::path::Path;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EtlError, Result, Sink};
use crate::records::{RecordSet, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    Append,
    Replace,
}

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| EtlError::storage(Sink::Relational, path.display().to_string(), e))?;
    Ok(conn)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
        })
    }
}

/// Double-quote an identifier; column names may hold spaces or quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(value: Option<&Value>) -> &'static str {
    match value {
        Some(Value::Integer(_)) => "INTEGER",
        Some(Value::Float(_)) => "REAL",
        _ => "TEXT",
    }
}

/// Write every record as one row of `table`, creating it if absent.
/// Column types are taken from the first record.
pub fn load_relational(
    conn: &Connection,
    records: &RecordSet,
    table: &str,
    mode: LoadMode,
) -> Result<usize> {
    write_rows(conn, records, table, mode)
        .map_err(|e| EtlError::storage(Sink::Relational, table, e))
}

fn write_rows(
    conn: &Connection,
    records: &RecordSet,
    table: &str,
    mode: LoadMode,
) -> rusqlite::Result<usize> {
    let first = records.rows().first();
    let column_defs: Vec<String> = records
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                "{} {}",
                quote_ident(name),
                sql_type(first.and_then(|r| r.get(i)))
            )
        })
        .collect();
    let table_q = quote_ident(table);

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table_q,
        column_defs.join(", ")
    ))?;
    if mode == LoadMode::Replace {
        tx.execute(&format!("DELETE FROM {}", table_q), [])?;
    }

    let mut count = 0;
    {
        let names: Vec<String> = records.columns().iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_q,
            names.join(", "),
            placeholders.join(", ")
        ))?;
        for row in records.rows() {
            count += stmt.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.commit()?;

    info!(table, ?mode, rows = count, "loaded relational table");
    Ok(count)
}

pub fn run_query(conn: &Connection, sql: &str) -> Result<RecordSet> {
    let (columns, rows) =
        read_query(conn, sql).map_err(|e| EtlError::storage(Sink::Relational, sql, e))?;
    let mut out = RecordSet::new(columns);
    for row in rows {
        out.push(row)?;
    }
    Ok(out)
}

fn read_query(conn: &Connection, sql: &str) -> rusqlite::Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();
    let mut out = Vec::new();

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(n) => Value::Integer(n),
                ValueRef::Real(f) => Value::Float(f),
                ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(b) => Value::Text(format!("<{} bytes>", b.len())),
            });
        }
        out.push(values);
    }
    Ok((columns, out))
}

// ── Tests ──
