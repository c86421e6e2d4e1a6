//! Application error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use crate::cdp::CdpError;
use crate::overlay::TimingError;

/// Errors surfaced to the caller of a starcap run.
///
/// Locator exhaustion and absent dialogs are deliberately not represented
/// here: they degrade gracefully inside the capture session.
#[derive(Debug, Error)]
pub enum StarcapError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Timing(#[from] TimingError),

    #[error("Chrome error: {0}")]
    Chrome(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Overlay injection failed: {0}")]
    OverlayInjection(String),

    #[error("Recording failed: {0}")]
    Recording(String),

    /// No video could be produced for the session.
    #[error("No recording was produced for this session")]
    RecordingUnavailable,

    /// The transcoding tool is entirely absent, as opposed to failing
    /// after being found.
    #[error(
        "ffmpeg not found. Please install ffmpeg and ensure it is on your PATH.\n\
         \n\
         Install hints:\n\
         \x20 macOS:   brew install ffmpeg\n\
         \x20 Ubuntu:  sudo apt-get install ffmpeg\n\
         \x20 Windows: choco install ffmpeg  (or download from https://ffmpeg.org/download.html)"
    )]
    FfmpegMissing,

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("ffmpeg palette generation failed for {}: {stderr}", path.display())]
    PaletteGeneration { path: PathBuf, stderr: String },

    #[error("ffmpeg GIF encoding failed for {}: {stderr}", path.display())]
    GifGeneration { path: PathBuf, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CdpError> for StarcapError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ChromeNotAvailable(msg) | CdpError::ConnectionFailed(msg) => {
                StarcapError::Chrome(msg)
            }
            CdpError::NavigationFailed(msg) => StarcapError::Navigation(msg),
            CdpError::JavaScript(msg) => StarcapError::OverlayInjection(msg),
            other => StarcapError::Chrome(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_missing_names_tool_and_hints() {
        let msg = StarcapError::FfmpegMissing.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.contains("PATH"));
        // At least three environments get an install hint.
        assert!(msg.contains("brew install ffmpeg"));
        assert!(msg.contains("apt-get install ffmpeg"));
        assert!(msg.contains("choco install ffmpeg"));
    }

    #[test]
    fn test_cdp_error_mapping() {
        let err: StarcapError = CdpError::NavigationFailed("net::ERR_FAILED".to_string()).into();
        assert!(matches!(err, StarcapError::Navigation(_)));

        let err: StarcapError = CdpError::JavaScript("SyntaxError".to_string()).into();
        assert!(matches!(err, StarcapError::OverlayInjection(_)));

        let err: StarcapError = CdpError::SessionClosed.into();
        assert!(matches!(err, StarcapError::Chrome(_)));
    }
}
