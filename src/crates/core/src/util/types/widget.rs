use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetParam {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
}

impl WidgetParam {
    /// Current value, falling back to the declared default.
    pub fn effective_value(&self) -> Option<&Value> {
        self.current_value
            .as_ref()
            .filter(|value| !value.is_null())
            .or_else(|| self.default_value.as_ref().filter(|value| !value.is_null()))
    }
}

/// Snapshot of one dashboard widget as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    pub uuid: String,
    pub origin: String,
    pub widget_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Vec<WidgetParam>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl WidgetDescriptor {
    /// Parameter values the widget is currently showing, keyed by name.
    pub fn current_params(&self) -> Map<String, Value> {
        self.params
            .iter()
            .filter_map(|param| {
                param
                    .effective_value()
                    .map(|value| (param.name.clone(), value.clone()))
            })
            .collect()
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|param| param.name.as_str()).collect()
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.widget_id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widgets {
    /// Widgets the user explicitly put in the conversation context
    #[serde(default)]
    pub primary: Vec<WidgetDescriptor>,
    /// Other widgets on the dashboard
    #[serde(default)]
    pub secondary: Vec<WidgetDescriptor>,
}

impl Widgets {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    pub fn find(&self, uuid: &str) -> Option<&WidgetDescriptor> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .find(|widget| widget.uuid == uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_params_prefer_current_over_default() {
        let widget: WidgetDescriptor = serde_json::from_value(json!({
            "uuid": "abc",
            "origin": "viaNexus Widgets",
            "widget_id": "stock_stats",
            "params": [
                {"name": "symbol", "default_value": "AAPL", "current_value": "MSFT"},
                {"name": "interval", "default_value": "1d"},
                {"name": "unset"}
            ]
        }))
        .unwrap();

        let params = widget.current_params();
        assert_eq!(params.get("symbol"), Some(&json!("MSFT")));
        assert_eq!(params.get("interval"), Some(&json!("1d")));
        assert!(!params.contains_key("unset"));
        assert_eq!(widget.param_names(), vec!["symbol", "interval", "unset"]);
        assert_eq!(widget.display_name(), "stock_stats");
    }
}
