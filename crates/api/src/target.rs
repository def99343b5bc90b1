//! Target domain - discovering, attaching to, and closing debuggable
//! targets.

use serde::{Deserialize, Serialize};

use cdp::{SessionId, TargetId};

use crate::catalog::command;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: TargetId,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    pub attached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
}

impl TargetInfo {
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetParams {
    pub target_id: TargetId,
    pub flatten: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTargetParams {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetParams {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
}

impl CreateTargetParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
            browser_context_id: None,
            background: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
    pub target_id: TargetId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTargetParams {
    pub target_id: TargetId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseTargetResult {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetTargetInfoParams {
    #[serde(rename = "targetId")]
    pub target_id: TargetId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetInfoResult {
    pub target_info: TargetInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetDiscoverTargetsParams {
    pub discover: bool,
}

// Event payloads

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreatedEvent {
    pub target_info: TargetInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfoChangedEvent {
    pub target_info: TargetInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDestroyedEvent {
    pub target_id: TargetId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCrashedEvent {
    pub target_id: TargetId,
    pub status: String,
    pub error_code: i64,
}

command!(
    /// Attach to the target; the debuggee assigns a session id. Prefer
    /// [`cdp::Session::attach`], which also registers the session with
    /// the router.
    attach_to_target = "Target.attachToTarget", AttachToTargetParams => AttachToTargetResult
);
command!(detach_from_target = "Target.detachFromTarget", DetachFromTargetParams);
command!(create_target = "Target.createTarget", CreateTargetParams => CreateTargetResult);
command!(close_target = "Target.closeTarget", CloseTargetParams => CloseTargetResult);
command!(get_target_info = "Target.getTargetInfo", GetTargetInfoParams => GetTargetInfoResult);
command!(set_discover_targets = "Target.setDiscoverTargets", SetDiscoverTargetsParams);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attach_params_wire_shape() {
        let params = AttachToTargetParams {
            target_id: "T1".to_string(),
            flatten: true,
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"targetId": "T1", "flatten": true})
        );
    }

    #[test]
    fn create_target_omits_unset_fields() {
        let value = serde_json::to_value(CreateTargetParams::new("about:blank")).unwrap();
        assert_eq!(value, json!({"url": "about:blank"}));
    }

    #[test]
    fn target_info_decodes_wire_names() {
        let info: TargetInfo = serde_json::from_value(json!({
            "targetId": "T1",
            "type": "page",
            "title": "Example",
            "url": "https://example.com",
            "attached": false
        }))
        .unwrap();
        assert!(info.is_page());
        assert_eq!(info.target_id, "T1");
        assert!(info.browser_context_id.is_none());
    }
}
