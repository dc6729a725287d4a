//! Distraction score: additive points per condition, clamped to [0, 10].

use crate::signal::{CameraUserState, SignalSample};

/// Upper bound of the distraction score
pub const MAX_SCORE: u8 = 10;

const IDLE_LONG_SECS: u64 = 45;
const IDLE_QUIET_SECS: u64 = 20;
const TAB_SWITCH_BURST: u32 = 4;

/// Score a signal against the process-wide camera state
#[must_use]
pub fn score(signal: &SignalSample, ambient_camera: CameraUserState) -> u8 {
    let camera = signal.camera_user_state.or_ambient(ambient_camera);
    let face_detected = signal
        .face_detected
        .or_else(|| (camera == CameraUserState::Absent).then_some(false));

    let mut points: u8 = 0;
    if signal.idle_seconds >= IDLE_LONG_SECS {
        points += 2;
    }
    if !signal.visible {
        points += 3;
    }
    if face_detected == Some(false) {
        points += 2;
    }
    if camera == CameraUserState::LookingAway {
        points += 3;
    }
    if signal.tab_switches_last_minute >= TAB_SWITCH_BURST {
        points += 2;
    }
    if signal.interaction_bursts == 0 && signal.idle_seconds > IDLE_QUIET_SECS {
        points += 1;
    }

    points.min(MAX_SCORE)
}
