use serde::{Deserialize, Serialize};

/// On-screen position of the ad when it was clicked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdPosition {
    pub x: i64,
    pub y: i64,
}

/// Click telemetry posted by the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub ad_id: i64,
    /// Client-side timestamp, stored verbatim.
    pub timestamp: String,
    /// Playback position of the host video, in seconds.
    pub video_time: f64,
    pub position: AdPosition,
    /// Seconds the pointer hovered over the ad before clicking.
    pub hover_time: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClickError {
    #[error("timestamp must not be empty")]
    EmptyTimestamp,
    #[error("{field} must be a finite, non-negative number")]
    InvalidDuration { field: &'static str },
}

impl ClickEvent {
    /// Reject payloads that parsed but can't be meaningful.
    pub fn validate(&self) -> Result<(), ClickError> {
        if self.timestamp.trim().is_empty() {
            return Err(ClickError::EmptyTimestamp);
        }
        check_duration("videoTime", self.video_time)?;
        check_duration("hoverTime", self.hover_time)?;
        Ok(())
    }
}

fn check_duration(field: &'static str, value: f64) -> Result<(), ClickError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ClickError::InvalidDuration { field })
    }
}
