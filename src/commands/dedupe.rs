use anyhow::Result;
use log::info;
use serde_json::Value;
use std::path::Path;

use super::parse_json;
use crate::{
    dedupe::{RecordKind, remove_duplicates},
    runtime::Runtime,
};

/// Remove duplicate records from a JSON array read from `input` (or stdin
/// when `input` is `None` or `-`).
#[tracing::instrument(skip(runtime))]
pub fn dedupe<R: Runtime>(runtime: R, kind: &str, input: Option<&Path>) -> Result<Value> {
    let kind = kind.parse::<RecordKind>()?;

    let text = match input {
        Some(path) if path != Path::new("-") => runtime.read_to_string(path)?,
        _ => runtime.read_stdin()?,
    };

    let records = match parse_json(&text, "input")? {
        Value::Array(records) => records,
        _ => anyhow::bail!("Expected a JSON array of {} records", kind),
    };

    let total = records.len();
    let unique = remove_duplicates(records, |record| kind.key(record));
    info!(
        "Kept {} of {} {} records ({} removed)",
        unique.len(),
        total,
        kind,
        total - unique.len()
    );

    Ok(Value::Array(unique))
}
