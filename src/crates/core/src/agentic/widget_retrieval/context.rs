//! Widget context text handed to the backend alongside the user's message.

use super::phase2::WidgetResult;
use crate::util::types::{QueryRequest, WidgetDescriptor};
use serde_json::Value;

const DATA_PREAMBLE: &str = "Use the following data to answer the question:";

/// Widget metadata for the dashboard plus any Phase-2 data. `None` if there is nothing to say.
pub fn format_widget_context(request: &QueryRequest, results: &[WidgetResult]) -> Option<String> {
    let mut parts = Vec::new();

    let primary = request.primary_widgets();
    if !primary.is_empty() {
        parts.push("## Dashboard Widgets (Available for Updates)".to_string());
        parts.extend(primary.iter().map(describe_primary));
    }

    for widget in request.secondary_widgets() {
        let mut lines = vec![format!("Dashboard Widget: {}", widget.display_name())];
        let params = widget.current_params();
        if !params.is_empty() {
            lines.push(format!("Parameters: {}", Value::Object(params)));
        }
        parts.push(lines.join("\n"));
    }

    if !results.is_empty() {
        let mut data = format!("{}\n\n", DATA_PREAMBLE);
        for result in results {
            if let Some(name) = result.name.as_deref() {
                data.push_str(&format!(
                    "Source: {} (`{}`)\n",
                    name,
                    result.widget_uuid.as_deref().unwrap_or("?")
                ));
            }
            for item in &result.items {
                data.push_str(item);
                data.push_str("\n---\n");
            }
        }
        parts.push(data);
    }

    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn describe_primary(widget: &WidgetDescriptor) -> String {
    let mut lines = vec![
        format!("### {}", widget.display_name()),
        format!("- **UUID:** `{}`", widget.uuid),
        format!("- **Origin:** `{}`", widget.origin),
        format!("- **Widget ID:** `{}`", widget.widget_id),
    ];
    if !widget.description.is_empty() {
        lines.push(format!("- **Description:** {}", widget.description));
    }
    let params = widget.current_params();
    if !params.is_empty() {
        lines.push(format!(
            "- **Current Parameters:** `{}`",
            Value::Object(params)
        ));
    }
    let names = widget.param_names();
    if !names.is_empty() {
        lines.push(format!("- **Updatable Parameters:** {}", names.join(", ")));
    }
    lines.join("\n")
}
