//! Backend artifacts
//!
//! Closed union over the `artifact_type` tag. Parsing never fails the request: a
//! payload that is not a valid artifact becomes an `ArtifactValidationWarning`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub data: Vec<Map<String, Value>>,
    pub x_key: String,
    pub y_keys: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chart_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableArtifact {
    pub data: Vec<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetUpdateArtifact {
    pub widget_uuid: String,
    pub input_args: Map<String, Value>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub widget_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetAddArtifact {
    pub widget_id: String,
    pub origin: String,
    #[serde(alias = "input_args")]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Chart(ChartArtifact),
    Table(TableArtifact),
    WidgetUpdate(WidgetUpdateArtifact),
    WidgetAdd(WidgetAddArtifact),
}

/// Non-fatal: the artifact is dropped and the response continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Dropped artifact (type={}): {}", .artifact_type.as_deref().unwrap_or("<missing>"), .reason)]
pub struct ArtifactValidationWarning {
    pub artifact_type: Option<String>,
    pub reason: String,
}

impl ArtifactValidationWarning {
    pub fn new(artifact_type: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            artifact_type: artifact_type.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Chart(_) => "chart",
            Artifact::Table(_) => "table",
            Artifact::WidgetUpdate(_) => "widget_update",
            Artifact::WidgetAdd(_) => "widget_add",
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ArtifactValidationWarning> {
        let tag = match value.get("artifact_type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(_) => {
                return Err(ArtifactValidationWarning::new(
                    None,
                    "artifact_type is not a string",
                ))
            }
            None => {
                return Err(ArtifactValidationWarning::new(
                    None,
                    "payload has no artifact_type tag",
                ))
            }
        };

        let parsed = match tag.as_str() {
            "chart" => serde_json::from_value(value).map(Artifact::Chart),
            "table" => serde_json::from_value(value).map(Artifact::Table),
            "widget_update" => serde_json::from_value(value).map(Artifact::WidgetUpdate),
            "widget_add" => serde_json::from_value(value).map(Artifact::WidgetAdd),
            other => {
                return Err(ArtifactValidationWarning::new(
                    Some(other),
                    "unrecognized artifact type",
                ))
            }
        };

        parsed.map_err(|e| ArtifactValidationWarning::new(Some(&tag), e.to_string()))
    }
}
