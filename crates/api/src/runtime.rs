//! Runtime domain - script evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::command;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
}

impl EvaluateParams {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            return_by_value: Some(true),
            await_promise: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResult {
    pub result: RemoteObject,
}

command!(enable = "Runtime.enable");
command!(disable = "Runtime.disable");
command!(evaluate = "Runtime.evaluate", EvaluateParams => EvaluateResult);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluate_defaults_to_by_value() {
        let value = serde_json::to_value(EvaluateParams::new("1 + 1")).unwrap();
        assert_eq!(
            value,
            json!({"expression": "1 + 1", "returnByValue": true})
        );
    }

    #[test]
    fn remote_object_decodes() {
        let result: EvaluateResult = serde_json::from_value(json!({
            "result": {"type": "number", "value": 2, "description": "2"}
        }))
        .unwrap();
        assert_eq!(result.result.object_type, "number");
        assert_eq!(result.result.value.unwrap(), 2);
    }
}
