use crate::detector::Detection;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One inbound line, tagged by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    #[serde(rename = "update-model", rename_all = "camelCase")]
    UpdateModel { cam_id: String, models: Vec<String> },
    #[serde(rename = "detect")]
    Detect(FrameMessage),
}

/// Detect payload as it arrives. `cam_id` and `frame` stay optional here
/// so a missing field can still be reported against whatever identifying
/// fields the line did carry; the dispatcher validates them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMessage {
    #[serde(default)]
    pub cam_id: Option<String>,
    /// Base64-encoded compressed image bytes.
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub frame_number: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "update-model", rename_all = "camelCase")]
    UpdateModel { cam_id: String, models: Vec<String> },
    #[serde(rename = "detect")]
    Detect(DetectionReply),
}

/// Detections for one frame, keyed by model name. Key order follows the
/// camera's assignment list, first occurrence winning the position.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReply {
    pub cam_id: String,
    pub timestamp: i64,
    pub frame_number: u64,
    pub results: IndexMap<String, Vec<Detection>>,
}

/// Diagnostic line emitted instead of a reply. Camera id and frame number
/// are only present when the failure happened inside frame processing.
#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub error: String,
    #[serde(rename = "camId", skip_serializing_if = "Option::is_none")]
    pub cam_id: Option<String>,
    #[serde(rename = "frameNumber", skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<u64>,
}

impl ErrorRecord {
    pub fn bare(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            cam_id: None,
            frame_number: None,
        }
    }

    pub fn for_frame(error: impl Into<String>, cam_id: &str, frame_number: u64) -> Self {
        Self {
            error: error.into(),
            cam_id: Some(cam_id.to_string()),
            frame_number: Some(frame_number),
        }
    }
}
