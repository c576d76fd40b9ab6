//! Decoding of `run_query` results.
//!
//! Depending on `result_as` and server version, `results` arrives either as a
//! JSON array of rows or as a bracketed string rendering such as
//! `"[[a b] [c d]]"`. Both decode to the same rows:
//!
//! 1. strip every `[[` and `]]`
//! 2. replace the row separator `] [` with `,`
//! 3. split on `,` to get rows
//! 4. split each row on whitespace to get cells
//!
//! `"[[a b] [c d]]"` yields rows `[["a","b"],["c","d"]]`, flattened to
//! `["a","b","c","d"]`.

use serde_json::Value;

/// Split a bracketed result string into rows of cells.
pub fn parse_bracketed_rows(raw: &str) -> Vec<Vec<String>> {
    let stripped = raw.trim().replace("[[", "").replace("]]", "");
    // An empty result renders as "[]"
    if stripped.is_empty() || stripped == "[]" {
        return Vec::new();
    }

    stripped
        .replace("] [", ",")
        .split(',')
        .map(|row| row.split_whitespace().map(str::to_owned).collect::<Vec<_>>())
        .filter(|row| !row.is_empty())
        .collect()
}

/// Decode a `results` value of either encoding into rows of cells.
///
/// Returns `None` when the value is neither a string nor an array.
pub fn rows_from_value(results: &Value) -> Option<Vec<Vec<String>>> {
    match results {
        Value::String(s) => Some(parse_bracketed_rows(s)),
        Value::Array(rows) => Some(rows.iter().map(row_cells).collect()),
        _ => None,
    }
}

/// Flatten rows into a single ordered sequence of cells.
pub fn flatten_rows(rows: Vec<Vec<String>>) -> Vec<String> {
    rows.into_iter().flatten().collect()
}

fn row_cells(row: &Value) -> Vec<String> {
    match row {
        Value::Array(cells) => cells.iter().map(cell_text).collect(),
        other => vec![cell_text(other)],
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
