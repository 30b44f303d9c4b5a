use anyhow::{Context, Result};
use serde_json::Value;

use crate::{config::Config, runtime::Runtime};

mod dedupe;
mod master_data;
mod request;

pub use dedupe::dedupe;
pub use master_data::{MasterDataKind, fetch_master_data, master_data};
pub use request::{RequestSpec, request, send};

/// Resolve an endpoint to the absolute URL a request would use
#[tracing::instrument(skip(runtime, api_url, members_url))]
pub fn url<R: Runtime>(
    runtime: R,
    api_url: Option<String>,
    members_url: Option<String>,
    endpoint: &str,
    members: bool,
) -> Result<String> {
    let config = Config::new(runtime, api_url, members_url)?;
    let client = if members {
        config.api.members()?
    } else {
        config.api
    };
    client.resolve(endpoint)
}

/// Splits `KEY<sep>VALUE` items. Keys are trimmed and must not be empty.
pub fn parse_pairs(items: &[String], separator: char) -> Result<Vec<(String, String)>> {
    items
        .iter()
        .map(|item| {
            let (key, value) = item.split_once(separator).with_context(|| {
                format!("Invalid argument '{}': expected KEY{}VALUE", item, separator)
            })?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("Invalid argument '{}': key is empty", item);
            }
            let value = if separator == ':' { value.trim() } else { value };
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parses a JSON argument, naming it in the error.
pub fn parse_json(text: &str, what: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("Failed to parse {} as JSON", what))
}

pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
