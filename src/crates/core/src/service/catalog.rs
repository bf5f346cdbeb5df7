//! Widget catalog
//!
//! Read-only copy of the `widgets.json` discovery document, keyed by widget id.
//! Served verbatim to the client and used for the `list widgets` chat command.

use crate::util::errors::{NexusError, NexusResult};
use log::{info, warn};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetCatalog {
    widgets: Map<String, Value>,
}

impl WidgetCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_value(document: Value) -> NexusResult<Self> {
        match document {
            Value::Object(widgets) => Ok(Self { widgets }),
            other => Err(NexusError::config(format!(
                "widgets document must be a JSON object keyed by widget id, got {}",
                json_type(&other)
            ))),
        }
    }

    pub fn load(path: &Path) -> NexusResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw).map_err(|e| {
            NexusError::config(format!("Invalid widgets file {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_value(document)?;
        info!(
            "Widget catalog loaded: path={}, widgets={}",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn to_document(&self) -> Value {
        Value::Object(self.widgets.clone())
    }

    /// Markdown listing for the `list widgets` command.
    pub fn format_list(&self) -> String {
        if self.widgets.is_empty() {
            return "No widgets available. Make sure the widget backend is running.".to_string();
        }

        let mut lines = vec!["**Available Widgets:**\n".to_string()];
        for (widget_id, config) in &self.widgets {
            let name = config
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(widget_id);
            let description = config
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("No description");
            let widget_type = config
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("table");
            let param_names: Vec<&str> = config
                .get("params")
                .and_then(Value::as_array)
                .map(|params| {
                    params
                        .iter()
                        .map(|p| p.get("paramName").and_then(Value::as_str).unwrap_or("?"))
                        .collect()
                })
                .unwrap_or_default();
            let params = if param_names.is_empty() {
                String::new()
            } else {
                format!(" (params: {})", param_names.join(", "))
            };

            lines.push(format!(
                "- **{}** (`{}`) - _{}_{}",
                name, widget_id, widget_type, params
            ));
            lines.push(format!("  {}", description));
            lines.push(String::new());
        }
        lines.push(
            "\n_Use `add <widget_id>` or `add <widget_id> <symbol>` to add a widget._".to_string(),
        );
        lines.join("\n")
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Loads the catalog if a path is configured; a broken file is a startup error.
pub fn load_optional(path: Option<&Path>) -> NexusResult<WidgetCatalog> {
    match path {
        Some(path) => WidgetCatalog::load(path),
        None => {
            warn!("No widgets file configured; widget catalog is empty");
            Ok(WidgetCatalog::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_catalog_as_markdown() {
        let catalog = WidgetCatalog::from_value(json!({
            "stock_stats": {
                "name": "Stock Stats",
                "description": "Key statistics",
                "type": "table",
                "endpoint": "stock_stats",
                "params": [{"paramName": "symbol"}]
            }
        }))
        .unwrap();

        let listing = catalog.format_list();
        assert!(listing.starts_with("**Available Widgets:**"));
        assert!(listing.contains("- **Stock Stats** (`stock_stats`) - _table_ (params: symbol)"));
    }

    #[test]
    fn empty_catalog_has_a_hint() {
        assert!(WidgetCatalog::empty().format_list().starts_with("No widgets available"));
        assert!(WidgetCatalog::from_value(json!([])).is_err());
    }
}
