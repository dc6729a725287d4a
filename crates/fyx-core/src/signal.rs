use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a browser tab
pub type TabId = i64;

/// Camera-derived user state, as summarised by the face-landmark pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraUserState {
    #[default]
    Unknown,
    Focused,
    LookingAway,
    Absent,
    Bored,
}

impl CameraUserState {
    /// The signal's own state wins unless it carries no information
    #[must_use]
    pub const fn or_ambient(self, ambient: Self) -> Self {
        match self {
            Self::Unknown => ambient,
            known => known,
        }
    }

    /// Unrecognised states carry no information
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "focused" => Self::Focused,
            "looking_away" => Self::LookingAway,
            "absent" => Self::Absent,
            "bored" => Self::Bored,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Focused => "focused",
            Self::LookingAway => "looking_away",
            Self::Absent => "absent",
            Self::Bored => "bored",
        }
    }
}

impl fmt::Display for CameraUserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CameraUserState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Unknown, Self::parse))
    }
}

/// One periodic behavioral sample from a tab's content script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignalSample {
    pub idle_seconds: u64,
    pub visible: bool,
    pub scroll_count: u32,
    /// Mouse moves plus key presses since the previous sample
    pub interaction_bursts: u32,
    /// `None` when the camera has no opinion
    pub face_detected: Option<bool>,
    pub camera_user_state: CameraUserState,
    pub tab_switches_last_minute: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hint: Option<String>,
}

impl Default for SignalSample {
    fn default() -> Self {
        Self {
            idle_seconds: 0,
            visible: true,
            scroll_count: 0,
            interaction_bursts: 0,
            face_detected: None,
            camera_user_state: CameraUserState::Unknown,
            tab_switches_last_minute: 0,
            content_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let signal: SignalSample = serde_json::from_str(r#"{"idleSeconds": 12}"#).unwrap();
        assert_eq!(signal.idle_seconds, 12);
        assert!(signal.visible);
        assert_eq!(signal.face_detected, None);
        assert_eq!(signal.camera_user_state, CameraUserState::Unknown);
    }

    #[test]
    fn test_null_face_and_unknown_camera_string() {
        let signal: SignalSample = serde_json::from_str(
            r#"{"faceDetected": null, "cameraUserState": "sleepy", "visible": false}"#,
        )
        .unwrap();
        assert_eq!(signal.face_detected, None);
        assert_eq!(signal.camera_user_state, CameraUserState::Unknown);
        assert!(!signal.visible);

        let null_camera: SignalSample =
            serde_json::from_str(r#"{"cameraUserState": null}"#).unwrap();
        assert_eq!(null_camera.camera_user_state, CameraUserState::Unknown);
    }

    #[test]
    fn test_camera_state_precedence() {
        assert_eq!(
            CameraUserState::Unknown.or_ambient(CameraUserState::Absent),
            CameraUserState::Absent
        );
        assert_eq!(
            CameraUserState::Focused.or_ambient(CameraUserState::Absent),
            CameraUserState::Focused
        );
        assert_eq!(CameraUserState::LookingAway.to_string(), "looking_away");
    }
}
