use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EtlError, Result};

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// Parse a cell like `"26,854,599"` into a float, dropping grouping commas.
/// Values that overflow to infinity are rejected.
pub fn normalize_numeric(raw: &str) -> Result<f64> {
    let bad = || EtlError::Format {
        raw: raw.to_string(),
        expected: "number",
    };
    let stripped: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if !NUMERIC_RE.is_match(&stripped) {
        return Err(bad());
    }
    match stripped.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(bad()),
    }
}

/// Digits-only integer, e.g. a release year. Signs and separators are rejected.
pub fn parse_integer(raw: &str) -> Result<i64> {
    let t = raw.trim();
    if !DIGITS_RE.is_match(t) {
        return Err(EtlError::Format {
            raw: raw.to_string(),
            expected: "integer",
        });
    }
    t.parse::<i64>().map_err(|_| EtlError::Format {
        raw: raw.to_string(),
        expected: "integer",
    })
}
