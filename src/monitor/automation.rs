use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Failures surfaced by the browser/OCR collaborator. The monitor matches on
/// `SessionEnded` to drive the offline transition; everything else is a
/// transport problem.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The page navigated away, the tracked player element went stale, or
    /// the collaborator reported end of stream.
    #[error("stream session ended")]
    SessionEnded,
    #[error("automation transport failure: {0}")]
    Transport(String),
    #[error("malformed collaborator reply: {0}")]
    Protocol(String),
    #[error("failed to launch capture helper: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One OCR'd capture: the two cropped band texts plus the overlay clock text
/// when the collaborator could read it.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameText {
    pub top_text: String,
    pub bottom_text: String,
    #[serde(default)]
    pub stream_clock: Option<String>,
}

/// Contract for the browser automation / OCR collaborator. All calls are
/// bounded timed waits on the collaborator's side; none of them may block
/// indefinitely.
pub trait StreamAutomation {
    /// Bring the collaborator up (spawn the browser, load the channel page).
    fn acquire(&mut self) -> Result<(), AutomationError>;

    /// Is the broadcast live right now?
    fn probe_online(&mut self) -> Result<bool, AutomationError>;

    /// Capture and OCR both screen bands.
    fn capture_frame(&mut self) -> Result<FrameText, AutomationError>;

    /// Tear the collaborator down. Safe to call when already released; used
    /// both for hibernation and final cleanup.
    fn release(&mut self);
}

/// Crop rectangle in page pixels at the 1920x1080 capture size.
pub type CropRect = [u32; 4];

/// Which broadcast platform is being monitored. Selects the channel URL
/// shape and the overlay crop geometry handed to the capture collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Twitch,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Twitch => "twitch",
        }
    }

    pub fn channel_url(&self, channel: &str) -> String {
        match self {
            Platform::YouTube => format!("https://www.youtube.com/@{channel}/live"),
            Platform::Twitch => format!("https://www.twitch.tv/{channel}"),
        }
    }

    /// (top band, bottom band) crop rectangles. The Twitch player letterboxes
    /// differently, so its bands sit inset from the frame edges.
    pub fn crop_regions(&self) -> (CropRect, CropRect) {
        match self {
            Platform::YouTube => ([0, 0, 1280, 32], [0, 693, 1280, 720]),
            Platform::Twitch => ([100, 0, 1200, 32], [240, 700, 1140, 754]),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "twitch" => Ok(Platform::Twitch),
            other => Err(format!(
                "invalid mode '{other}' (accepted values: youtube, twitch)"
            )),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::YouTube);
        assert_eq!("twitch".parse::<Platform>().unwrap(), Platform::Twitch);
        assert!("vimeo".parse::<Platform>().is_err());
    }

    #[test]
    fn channel_urls_follow_the_platform_shape() {
        assert_eq!(
            Platform::YouTube.channel_url("somechannel"),
            "https://www.youtube.com/@somechannel/live"
        );
        assert_eq!(
            Platform::Twitch.channel_url("somechannel"),
            "https://www.twitch.tv/somechannel"
        );
    }
}
