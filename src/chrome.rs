//! Chromium discovery and process lifecycle.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::StarcapError;

/// Launch options for the capture browser.
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// Remote debugging port. Zero picks a free port.
    pub debug_port: u16,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Run with a visible window.
    pub headful: bool,
    /// Isolated profile directory for this run.
    pub profile_dir: PathBuf,
}

/// A Chromium instance launched for one capture session.
///
/// The process is killed on [`shutdown`](Self::shutdown); the profile
/// directory is owned by the caller's working directory.
pub struct ChromeHandle {
    child: Child,
    endpoint: String,
}

impl ChromeHandle {
    /// CDP debug endpoint for this instance.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Kill the browser process. Best-effort; errors are logged only.
    pub async fn shutdown(mut self) {
        debug!("Shutting down Chrome (pid {:?})", self.child.id());
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill Chrome: {}", e);
        }
    }
}

/// Find a Chromium-family executable.
pub fn find_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("STARCAP_CHROME") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Some(p);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let paths = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let paths = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let paths = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Pick a free TCP port for the debug endpoint.
fn free_port() -> Result<u16, StarcapError> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Check whether the debug endpoint answers.
async fn is_chrome_ready(endpoint: &str) -> bool {
    reqwest::get(format!("{}/json/version", endpoint))
        .await
        .is_ok()
}

/// Launch Chromium with remote debugging and wait until it answers.
pub async fn launch(config: &ChromeConfig) -> Result<ChromeHandle, StarcapError> {
    let chrome_path = find_chrome().ok_or_else(|| {
        StarcapError::Chrome(
            "No Chromium-family browser found. Install Google Chrome or Chromium, \
             or point STARCAP_CHROME at an executable."
                .to_string(),
        )
    })?;

    let port = if config.debug_port == 0 {
        free_port()?
    } else {
        config.debug_port
    };
    let endpoint = format!("http://127.0.0.1:{}", port);

    std::fs::create_dir_all(&config.profile_dir)?;

    info!(
        "Launching {} with profile at {}",
        chrome_path.display(),
        config.profile_dir.display()
    );

    let mut cmd = Command::new(&chrome_path);
    cmd.arg(format!("--remote-debugging-port={}", port))
        .arg(format!("--user-data-dir={}", config.profile_dir.display()))
        .arg(format!("--window-size={},{}", config.width, config.height))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--metrics-recording-only")
        // Deterministic rendering for frame capture.
        .arg("--lang=en-US")
        .arg("--force-color-profile=srgb")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if !config.headful {
        cmd.arg("--headless=new");
    }

    let child = cmd
        .spawn()
        .map_err(|e| StarcapError::Chrome(format!("Failed to launch Chrome: {}", e)))?;

    debug!("Chrome launched with PID: {:?}", child.id());

    let mut attempts = 0;
    let max_attempts = 50;
    while attempts < max_attempts {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if is_chrome_ready(&endpoint).await {
            info!("Chrome ready at {}", endpoint);
            return Ok(ChromeHandle { child, endpoint });
        }
        attempts += 1;
    }

    let mut child = child;
    let _ = child.kill().await;
    Err(StarcapError::Chrome(
        "Chrome failed to start within timeout".to_string(),
    ))
}

/// Profile directory for a run, nested inside its working directory.
pub fn profile_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("profile")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_chrome_does_not_panic() {
        let _result = find_chrome();
    }

    #[test]
    fn test_free_port_is_nonzero() {
        let port = free_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn test_profile_dir_nested_in_work_dir() {
        let dir = profile_dir(Path::new("/tmp/starcap-x"));
        assert_eq!(dir, PathBuf::from("/tmp/starcap-x/profile"));
    }
}
