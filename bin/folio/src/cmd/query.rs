//! Query command - inspects the content index

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr, eyre};
use folio_content::{QueryOptions, QueryResult};
use serde_json::Value;

use super::{load_config, prepare_store, resolve_root};

/// Parse a `key=value` filter. The value is read as JSON when it parses,
/// otherwise as a string.
pub fn parse_filter(filter: &str) -> Result<(String, Value)> {
    let (key, raw) = filter
        .split_once('=')
        .ok_or_else(|| eyre!("Invalid filter `{filter}`, expected KEY=VALUE"))?;
    if key.is_empty() {
        return Err(eyre!("Invalid filter `{filter}`, key is empty"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Run the query command.
pub async fn run(
    config_path: &Path,
    root: &Path,
    table: &str,
    filters: &[String],
    order_by: Option<&str>,
    limit: Option<usize>,
    count: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let root = resolve_root(root)?;
    let store = prepare_store(&config, &root).await?;

    let mut options = QueryOptions::new();
    for filter in filters {
        let (key, value) = parse_filter(filter)?;
        options = options.filter(key, value);
    }
    if let Some(order) = order_by {
        options = options.order_by(order);
    }
    if let Some(limit) = limit {
        options = options.limit(limit);
    }
    if count {
        options = options.count();
    }

    tracing::debug!(table, ?options, "Running query");

    let output = match store.execute(table, &options) {
        QueryResult::Count(n) => n.to_string(),
        QueryResult::Rows(rows) => {
            serde_json::to_string_pretty(&rows).wrap_err("Failed to serialize rows")?
        }
    };
    println!("{output}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_filter_typed_values() {
        assert_eq!(parse_filter("draft=false").unwrap(), ("draft".to_string(), json!(false)));
        assert_eq!(parse_filter("views_gt=10").unwrap(), ("views_gt".to_string(), json!(10)));
        assert_eq!(
            parse_filter("title_like=%rust%").unwrap(),
            ("title_like".to_string(), json!("%rust%"))
        );
        assert_eq!(parse_filter("tag=a=b").unwrap().1, json!("a=b"));
    }

    #[test]
    fn test_parse_filter_rejects_malformed() {
        assert!(parse_filter("novalue").is_err());
        assert!(parse_filter("=x").is_err());
    }
}
