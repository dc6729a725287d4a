/// Score command handler
use anyhow::{Context, Result};
use fyx_core::{classify, scoring, AgentState, CameraUserState, SignalSample};

/// Score and state for a raw signal JSON
pub fn score_signal(json: &str, camera: Option<&str>) -> Result<(u8, AgentState)> {
    let signal: SignalSample = serde_json::from_str(json).context("Invalid signal JSON")?;
    let ambient = camera.map_or(CameraUserState::Unknown, CameraUserState::parse);
    let score = scoring::score(&signal, ambient);
    Ok((score, classify(score)))
}

pub fn handle_score_command(json: &str, camera: Option<&str>) -> Result<()> {
    let (score, state) = score_signal(json, camera)?;
    println!("Score: {score}/{}", scoring::MAX_SCORE);
    println!("State: {state}");
    Ok(())
}
