//! Output renderers for command results.

use anyhow::anyhow;
use hsadmin_config::OutputFormat;
use serde_json::{Map, Value};

use crate::client::{CliError, CliResult};

/// Print `value` to stdout in `format`.
pub(crate) fn emit(value: &Value, format: OutputFormat) -> CliResult<()> {
    let text = render(value, format)?;
    println!("{}", text.trim_end());
    Ok(())
}

pub(crate) fn render(value: &Value, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|err| CliError::failure(anyhow!("failed to format YAML: {err}"))),
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        OutputFormat::Minified => serde_json::to_string(value)
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        OutputFormat::Human => Ok(render_human(value)),
    }
}

fn render_human(value: &Value) -> String {
    match value {
        Value::Array(items) if is_table(items) => render_table(items),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join("\n"),
        Value::Object(map) => render_object(map),
        other => cell(other),
    }
}

// Listing responses carry one array of records next to counters and cursors;
// the records become the table and the rest a footer.
fn render_object(map: &Map<String, Value>) -> String {
    let listing = map.iter().find_map(|(key, value)| match value {
        Value::Array(rows) if is_table(rows) => Some((key, rows)),
        _ => None,
    });

    if let Some((listing_key, rows)) = listing {
        let mut lines = vec![render_table(rows)];
        lines.extend(
            map.iter()
                .filter(|(key, _)| *key != listing_key)
                .map(|(key, value)| format!("{key}: {}", cell(value))),
        );
        return lines.join("\n");
    }

    let width = map.keys().map(|key| key.chars().count()).max().unwrap_or(0);
    map.iter()
        .map(|(key, value)| format!("{key:<width$}  {}", cell(value)).trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_table(rows: &[Value]) -> bool {
    !rows.is_empty() && rows.iter().all(Value::is_object)
}

fn render_table(rows: &[Value]) -> String {
    let headers: Vec<&str> = rows
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().map(String::as_str).collect())
        .unwrap_or_default();
    let grid: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|header| row.get(*header).map_or_else(String::new, cell))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in &grid {
        for (width, text) in widths.iter_mut().zip(row) {
            *width = (*width).max(text.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(grid.len() + 2);
    lines.push(table_row(headers.iter().copied(), &widths));
    lines.push(table_row(widths.iter().map(|width| "-".repeat(*width)), &widths));
    lines.extend(grid.iter().map(|row| table_row(row.iter(), &widths)));
    lines.join("\n")
}

fn table_row<S: AsRef<str>>(cells: impl Iterator<Item = S>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(text, &width)| format!("{:<width$}", text.as_ref()))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn human(value: &Value) -> CliResult<String> {
        render(value, OutputFormat::Human)
    }

    #[test]
    fn records_render_as_aligned_table() -> CliResult<()> {
        let value = json!([
            {"name": "@alice:example.org", "admin": true},
            {"name": "@bob:example.org", "admin": false, "extra": 1}
        ]);
        assert_eq!(
            human(&value)?,
            "admin  name\n\
             -----  ------------------\n\
             true   @alice:example.org\n\
             false  @bob:example.org"
        );
        Ok(())
    }

    #[test]
    fn listing_object_renders_table_with_footer() -> CliResult<()> {
        let value = json!({
            "next_token": "100",
            "total": 2,
            "users": [{"name": "@a:x"}, {"name": "@b:x"}]
        });
        assert_eq!(
            human(&value)?,
            "name\n----\n@a:x\n@b:x\nnext_token: 100\ntotal: 2"
        );
        Ok(())
    }

    #[test]
    fn plain_object_renders_key_value_pairs() -> CliResult<()> {
        let value = json!({"server_version": "1.99.0", "deactivated": false, "threepids": []});
        assert_eq!(
            human(&value)?,
            "deactivated     false\nserver_version  1.99.0\nthreepids       []"
        );
        Ok(())
    }

    #[test]
    fn scalars_render_one_per_line() -> CliResult<()> {
        assert_eq!(human(&json!(["!a:x", "!b:x"]))?, "!a:x\n!b:x");
        assert_eq!(human(&json!("done"))?, "done");
        assert_eq!(human(&json!([]))?, "");
        Ok(())
    }

    #[test]
    fn machine_formats_render_value() -> CliResult<()> {
        let value = json!({"total": 1, "users": ["@a:x"]});
        assert_eq!(render(&value, OutputFormat::Minified)?, r#"{"total":1,"users":["@a:x"]}"#);
        let yaml = render(&value, OutputFormat::Yaml)?;
        assert!(yaml.starts_with("total: 1\nusers:\n"));
        assert!(render(&value, OutputFormat::Json)?.contains("\n  \"total\": 1"));
        Ok(())
    }
}
