//! End-to-end capture session: browser launch, navigation, Star button
//! discovery, overlay injection, and viewport recording.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cdp::{CdpClient, PageSession};
use crate::chrome::{self, ChromeConfig, ChromeHandle};
use crate::error::StarcapError;
use crate::locator::{self, PageProbe};
use crate::overlay::{self, OverlayTiming};
use crate::recorder::ScreencastRecorder;
use crate::workdir::WorkDir;

/// Navigation budget, matching GitHub's slowest cold loads.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Settle pause after the network goes quiet, for layout stability.
const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Pause after scrolling back to the top.
const SCROLL_DELAY: Duration = Duration::from_millis(100);

/// How long the overlay animates before the debug snapshot is taken.
const SNAPSHOT_DELAY: Duration = Duration::from_secs(2);

/// Everything a capture session needs to know.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Normalized repository URL to visit.
    pub url: String,
    /// Tooltip message rendered in the overlay.
    pub message: String,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Recording window after the overlay starts animating.
    pub duration: Duration,
    /// Show the browser window instead of running headless.
    pub headful: bool,
    /// Save a mid-animation snapshot to the working directory.
    pub debug: bool,
}

/// Outcome of a successful capture session.
#[derive(Debug)]
pub struct CaptureResult {
    /// Finalized intermediate video inside the working directory.
    pub video_path: PathBuf,
    /// True when every locator strategy failed and the synthetic
    /// top-right rectangle was highlighted instead.
    pub used_fallback: bool,
}

/// Run one full capture session and return the recording.
///
/// The browser and page are torn down on both the success and error
/// paths; teardown failures are logged, never surfaced.
pub async fn capture_star_video(
    config: &CaptureConfig,
    work_dir: &WorkDir,
) -> Result<CaptureResult, StarcapError> {
    // Reject impossible animation windows before any browser work.
    OverlayTiming::default().validate(config.duration)?;

    info!("Launching browser...");
    let chrome = chrome::launch(&ChromeConfig {
        debug_port: 0,
        width: config.width,
        height: config.height,
        headful: config.headful,
        profile_dir: chrome::profile_dir(work_dir.path()),
    })
    .await?;

    let client = match CdpClient::connect(chrome.endpoint()).await {
        Ok(client) => client,
        Err(e) => {
            chrome.shutdown().await;
            return Err(e.into());
        }
    };

    let session = match client.new_page().await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            chrome.shutdown().await;
            return Err(e.into());
        }
    };

    let outcome = drive_session(config, work_dir, &session).await;
    teardown(client, &session, chrome).await;
    outcome
}

async fn drive_session(
    config: &CaptureConfig,
    work_dir: &WorkDir,
    session: &Arc<PageSession>,
) -> Result<CaptureResult, StarcapError> {
    session.set_viewport(config.width, config.height).await?;
    session.set_accept_language("en-US,en;q=0.9").await?;
    session.emulate_reduced_motion("no-preference").await?;

    info!("Navigating to {} ...", config.url);
    session.navigate(&config.url).await?;
    session.wait_until_idle(NAVIGATION_TIMEOUT).await?;
    sleep(SETTLE_DELAY).await;

    session.scroll_to_top().await?;
    sleep(SCROLL_DELAY).await;

    if let Err(e) = dismiss_dialogs(session).await {
        debug!("Dialog dismissal skipped: {}", e);
    }

    // Recording starts before the locator runs so the GIF opens on the
    // settled page rather than mid-animation.
    let recorder =
        ScreencastRecorder::start(session.clone(), config.width, config.height).await?;

    let mut probe = PageProbe::new(session);
    let target = locator::locate(&mut probe, config.width, config.height).await;
    if target.found {
        debug!("Target rect: {:?}", target.rect);
    } else {
        warn!("Star button not found, highlighting the fallback region");
    }

    let script = overlay::build_overlay_script(&target.rect, &config.message);
    session.evaluate(&script).await?;
    debug!("Overlay injected");

    if config.debug {
        sleep(SNAPSHOT_DELAY).await;
        if let Err(e) = save_snapshot(session, work_dir).await {
            warn!("Debug snapshot failed: {}", e);
        }
    }

    info!("Recording for {}ms...", config.duration.as_millis());
    sleep(config.duration).await;

    let video_path = recorder.finalize(work_dir.path()).await?;
    info!("Video saved: {}", video_path.display());

    Ok(CaptureResult {
        video_path,
        used_fallback: !target.found,
    })
}

/// Click the first visible consent or notice banner button, if any.
/// Pages without banners are the common case, so absence is not an error.
async fn dismiss_dialogs(session: &PageSession) -> Result<(), StarcapError> {
    let clicked = session
        .evaluate(
            r#"(() => {
  const labels = ['accept', 'got it', 'dismiss'];
  for (const b of document.querySelectorAll('button')) {
    const text = (b.textContent || '').trim().toLowerCase();
    if (!labels.some((l) => text.startsWith(l))) continue;
    const r = b.getBoundingClientRect();
    if (r.width <= 0 || r.height <= 0) continue;
    b.click();
    return true;
  }
  return false;
})()"#,
        )
        .await?;

    if clicked.as_bool() == Some(true) {
        debug!("Dismissed a dialog/banner");
        sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}

async fn save_snapshot(session: &PageSession, work_dir: &WorkDir) -> Result<(), StarcapError> {
    let png = session.screenshot_png().await?;
    let path = work_dir.path().join("debug-overlay.png");
    tokio::fs::write(&path, png).await?;
    info!("Debug snapshot saved: {}", path.display());
    Ok(())
}

async fn teardown(client: CdpClient, session: &PageSession, chrome: ChromeHandle) {
    if let Err(e) = client.close_page(session).await {
        debug!("Failed to close page: {}", e);
    }
    chrome.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(duration_ms: u64) -> CaptureConfig {
        CaptureConfig {
            url: "https://github.com/owner/repo".to_string(),
            message: "Star this repo".to_string(),
            width: 1280,
            height: 720,
            duration: Duration::from_millis(duration_ms),
            headful: false,
            debug: false,
        }
    }

    #[tokio::test]
    async fn test_short_window_fails_before_browser_launch() {
        // 500ms cannot contain the overlay's 1.8s animation tail, so the
        // session errors out without touching Chrome.
        let work = WorkDir::create().unwrap();
        let err = capture_star_video(&config(500), &work).await.unwrap_err();
        assert!(matches!(err, StarcapError::Timing(_)));
    }

    #[test]
    fn test_default_window_passes_timing_validation() {
        let cfg = config(4200);
        assert!(OverlayTiming::default().validate(cfg.duration).is_ok());
    }
}
