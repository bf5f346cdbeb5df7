//! Artifact translation
//!
//! Maps one backend artifact to at most one client event. Invalid artifacts are
//! dropped with an `ArtifactValidationWarning`; the response carries on.

use crate::util::types::{
    Artifact, ArtifactValidationWarning, ChartArtifact, QueryRequest, TableArtifact,
    WidgetUpdateArtifact,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use nexus_agent_transport::{ChartPayload, StreamEvent, TablePayload, WidgetDataSource};
use serde_json::{Map, Value};
use std::collections::HashSet;

// 2000-01-01 .. 2100-01-01
const SECONDS_RANGE: (f64, f64) = (946_684_800.0, 4_102_444_800.0);
const MILLIS_RANGE: (f64, f64) = (946_684_800_000.0, 4_102_444_800_000.0);

pub struct ArtifactTranslator<'a> {
    request: &'a QueryRequest,
}

impl<'a> ArtifactTranslator<'a> {
    /// `request` supplies the dashboard widgets that `widget_update` artifacts refer to.
    pub fn new(request: &'a QueryRequest) -> Self {
        Self { request }
    }

    pub fn translate(&self, payload: Value) -> Result<StreamEvent, ArtifactValidationWarning> {
        let artifact = Artifact::from_value(payload)?;
        debug!("Translating artifact: type={}", artifact.kind());
        match artifact {
            Artifact::Chart(chart) => Ok(StreamEvent::Chart(chart_payload(chart))),
            Artifact::Table(table) => Ok(StreamEvent::Table(table_payload(table))),
            Artifact::WidgetUpdate(update) => self.widget_update(update),
            Artifact::WidgetAdd(add) => Ok(StreamEvent::AddWidget(WidgetDataSource {
                widget_uuid: None,
                origin: add.origin,
                id: add.widget_id,
                input_args: add.params,
            })),
        }
    }

    fn widget_update(
        &self,
        update: WidgetUpdateArtifact,
    ) -> Result<StreamEvent, ArtifactValidationWarning> {
        let (origin, widget_id) = match self.request.find_widget(&update.widget_uuid) {
            Some(widget) => (widget.origin.clone(), widget.widget_id.clone()),
            None => match (update.origin, update.widget_id) {
                (Some(origin), Some(widget_id)) => {
                    warn!(
                        "Widget {} is not in the request; using the artifact's origin and widget_id",
                        update.widget_uuid
                    );
                    (origin, widget_id)
                }
                _ => {
                    return Err(ArtifactValidationWarning::new(
                        Some("widget_update"),
                        format!(
                            "widget {} is not on the dashboard and the artifact names no origin/widget_id",
                            update.widget_uuid
                        ),
                    ))
                }
            },
        };

        Ok(StreamEvent::UpdateWidget(WidgetDataSource {
            widget_uuid: Some(update.widget_uuid),
            origin,
            id: widget_id,
            input_args: update.input_args,
        }))
    }
}

fn chart_payload(chart: ChartArtifact) -> ChartPayload {
    let keep: HashSet<&str> = std::iter::once(chart.x_key.as_str())
        .chain(chart.y_keys.iter().map(String::as_str))
        .collect();

    let rows = chart
        .data
        .iter()
        .map(|row| {
            let filtered: Map<String, Value> = row
                .iter()
                .filter(|(key, _)| keep.contains(key.as_str()))
                .map(|(key, value)| {
                    let value = if *key == chart.x_key {
                        format_timestamp(value)
                    } else {
                        value.clone()
                    };
                    (key.clone(), value)
                })
                .collect();
            Value::Object(filtered)
        })
        .collect();

    ChartPayload {
        uuid: uuid::Uuid::new_v4().to_string(),
        chart_type: chart.chart_type.unwrap_or_else(|| "line".to_string()),
        name: chart
            .name
            .or(chart.title)
            .unwrap_or_else(|| "Chart".to_string()),
        description: chart.description.unwrap_or_default(),
        rows,
        x_key: chart.x_key,
        y_keys: chart.y_keys,
    }
}

fn table_payload(table: TableArtifact) -> TablePayload {
    TablePayload {
        uuid: uuid::Uuid::new_v4().to_string(),
        name: table.name.unwrap_or_else(|| "Table".to_string()),
        description: table.description.unwrap_or_default(),
        rows: table.data,
    }
}

/// Numbers that look like Unix timestamps (s or ms, 2000-2100) become `YYYY-MM-DD` in UTC.
pub fn format_timestamp(value: &Value) -> Value {
    let Some(number) = value.as_f64() else {
        return value.clone();
    };

    let date: Option<DateTime<Utc>> = if (MILLIS_RANGE.0..=MILLIS_RANGE.1).contains(&number) {
        DateTime::<Utc>::from_timestamp_millis(number as i64)
    } else if (SECONDS_RANGE.0..=SECONDS_RANGE.1).contains(&number) {
        DateTime::<Utc>::from_timestamp(number as i64, 0)
    } else {
        None
    };

    match date {
        Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        None => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::types::{Message, WidgetDescriptor};
    use serde_json::json;

    fn request() -> QueryRequest {
        let widget: WidgetDescriptor = serde_json::from_value(json!({
            "uuid": "abc",
            "origin": "viaNexus Widgets",
            "widget_id": "stock_chart"
        }))
        .unwrap();
        QueryRequest::new(vec![Message::human("chart it")]).with_widgets(vec![widget])
    }

    #[test]
    fn chart_rows_are_filtered_and_dates_formatted() {
        let request = request();
        let event = ArtifactTranslator::new(&request)
            .translate(json!({
                "artifact_type": "chart",
                "data": [
                    {"ts": 1_704_067_200, "close": 10.5, "volume": 1000},
                    {"ts": 1_704_153_600_000_i64, "close": 11.0, "volume": 1200}
                ],
                "x_key": "ts",
                "y_keys": ["close"]
            }))
            .unwrap();

        let StreamEvent::Chart(chart) = event else {
            panic!("expected a chart, got {:?}", event);
        };
        assert_eq!(chart.chart_type, "line");
        assert_eq!(chart.name, "Chart");
        assert_eq!(chart.rows[0], json!({"ts": "2024-01-01", "close": 10.5}));
        assert_eq!(chart.rows[1], json!({"ts": "2024-01-02", "close": 11.0}));
    }

    #[test]
    fn small_numbers_are_not_timestamps() {
        assert_eq!(format_timestamp(&json!(2024)), json!(2024));
        assert_eq!(format_timestamp(&json!("2024-01-01")), json!("2024-01-01"));
        assert_eq!(format_timestamp(&json!(1e15)), json!(1e15));
    }

    #[test]
    fn table_defaults_name() {
        let request = request();
        let event = ArtifactTranslator::new(&request)
            .translate(json!({"artifact_type": "table", "data": [{"a": 1}]}))
            .unwrap();
        let StreamEvent::Table(table) = event else {
            panic!("expected a table, got {:?}", event);
        };
        assert_eq!(table.name, "Table");
        assert_eq!(table.rows, vec![json!({"a": 1})]);
    }

    #[test]
    fn widget_update_resolves_from_request_then_artifact() {
        let request = request();
        let translator = ArtifactTranslator::new(&request);

        let known = translator
            .translate(json!({
                "artifact_type": "widget_update",
                "widget_uuid": "abc",
                "input_args": {"symbol": "MSFT"},
                "origin": "ignored",
                "widget_id": "ignored"
            }))
            .unwrap();
        let StreamEvent::UpdateWidget(source) = known else {
            panic!("expected a widget update, got {:?}", known);
        };
        assert_eq!(source.origin, "viaNexus Widgets");
        assert_eq!(source.id, "stock_chart");

        let fallback = translator
            .translate(json!({
                "artifact_type": "widget_update",
                "widget_uuid": "elsewhere",
                "input_args": {},
                "origin": "Other",
                "widget_id": "news"
            }))
            .unwrap();
        assert!(matches!(fallback, StreamEvent::UpdateWidget(ref s) if s.id == "news"));

        let warning = translator
            .translate(json!({
                "artifact_type": "widget_update",
                "widget_uuid": "elsewhere",
                "input_args": {}
            }))
            .unwrap_err();
        assert_eq!(warning.artifact_type.as_deref(), Some("widget_update"));
    }

    #[test]
    fn widget_add_has_no_uuid() {
        let request = request();
        let event = ArtifactTranslator::new(&request)
            .translate(json!({
                "artifact_type": "widget_add",
                "widget_id": "stock_chart",
                "origin": "viaNexus Widgets",
                "params": {"symbol": "TSLA"}
            }))
            .unwrap();
        let StreamEvent::AddWidget(source) = event else {
            panic!("expected a widget add, got {:?}", event);
        };
        assert_eq!(source.widget_uuid, None);
        assert_eq!(source.input_args["symbol"], "TSLA");
    }

    #[test]
    fn missing_required_field_yields_warning_only() {
        let request = request();
        let warning = ArtifactTranslator::new(&request)
            .translate(json!({"artifact_type": "chart", "data": [], "y_keys": ["close"]}))
            .unwrap_err();
        assert!(warning.reason.contains("x_key"));
    }
}
