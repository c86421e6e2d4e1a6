//! Screencast frame capture and video finalization.
//!
//! Chrome has no context-owned video recorder over CDP, so the session's
//! recording subsystem is built from `Page.screencastFrame` events: frames
//! arrive only when the page repaints, each carrying a timestamp. At
//! finalization they are resampled onto a constant frame grid
//! (hold-last-frame) and piped into ffmpeg to produce the intermediate
//! video in the working directory. The video path only exists once
//! finalization completes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::cdp::{PageSession, ScreencastFrame};
use crate::error::StarcapError;

/// Frame rate of the intermediate video. The GIF pipeline re-times with
/// its own `fps=` filter, so this only needs to be dense enough.
pub const INTERMEDIATE_FPS: u32 = 25;

/// Filename of the finalized recording inside the working directory.
const RECORDING_FILENAME: &str = "recording.mp4";

/// One captured frame: PNG payload plus Chrome's epoch-seconds
/// timestamp, when the platform supplied one.
struct RecordedFrame {
    data: Vec<u8>,
    timestamp: Option<f64>,
}

/// Collects screencast frames for one page session.
pub struct ScreencastRecorder {
    session: Arc<PageSession>,
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
    collector: tokio::task::JoinHandle<()>,
}

impl ScreencastRecorder {
    /// Start the screencast and spawn the frame collector.
    pub async fn start(
        session: Arc<PageSession>,
        width: u32,
        height: u32,
    ) -> Result<Self, StarcapError> {
        let mut events = session
            .take_events()
            .ok_or_else(|| StarcapError::Recording("Event stream already claimed".to_string()))?;

        session.start_screencast(width, height).await?;

        let frames: Arc<Mutex<Vec<RecordedFrame>>> = Arc::new(Mutex::new(Vec::new()));

        let collector = {
            let session = session.clone();
            let frames = frames.clone();
            tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if event.method.as_deref() != Some("Page.screencastFrame") {
                        continue;
                    }
                    let Some(params) = event.params else { continue };
                    let frame: ScreencastFrame = match serde_json::from_value(params) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Bad screencast frame: {}", e);
                            continue;
                        }
                    };

                    // Ack immediately so Chrome keeps streaming.
                    if let Err(e) = session.ack_screencast_frame(frame.session_id).await {
                        debug!("Screencast ack failed: {}", e);
                    }

                    match BASE64.decode(frame.data.as_bytes()) {
                        Ok(data) => {
                            trace!(
                                "Screencast frame at {:?} ({} bytes)",
                                frame.metadata.timestamp,
                                data.len()
                            );
                            frames.lock().push(RecordedFrame {
                                data,
                                timestamp: frame.metadata.timestamp,
                            });
                        }
                        Err(e) => warn!("Undecodable screencast frame: {}", e),
                    }
                }
            })
        };

        Ok(Self {
            session,
            frames,
            collector,
        })
    }

    /// Stop the stream and encode the collected frames into the
    /// intermediate video. Returns the recording path.
    pub async fn finalize(self, work_dir: &Path) -> Result<PathBuf, StarcapError> {
        if let Err(e) = self.session.stop_screencast().await {
            warn!("Failed to stop screencast: {}", e);
        }
        self.collector.abort();

        let frames = std::mem::take(&mut *self.frames.lock());
        if frames.is_empty() {
            return Err(StarcapError::RecordingUnavailable);
        }
        debug!("Collected {} screencast frames", frames.len());

        let raw: Vec<Option<f64>> = frames.iter().map(|f| f.timestamp).collect();
        let timestamps = effective_timestamps(&raw, 1.0 / f64::from(INTERMEDIATE_FPS));
        let selected = resample_indices(&timestamps, INTERMEDIATE_FPS);

        let output = work_dir.join(RECORDING_FILENAME);
        encode_frames(&frames, &selected, &output).await?;

        let size = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(StarcapError::RecordingUnavailable);
        }

        debug!(
            "Recording finalized: {} ({} bytes, {} output frames)",
            output.display(),
            size,
            selected.len()
        );
        Ok(output)
    }
}

impl Drop for ScreencastRecorder {
    fn drop(&mut self) {
        self.collector.abort();
    }
}

/// Place every frame on one coherent timeline. Chrome stamps frames with
/// epoch seconds, but some platforms omit the stamp on some frames; a
/// frame without one is assumed to sit one grid step after its
/// predecessor. Frames preceding the first real timestamp are anchored
/// backwards from it, so a mixed stream never spans from zero to the
/// epoch. The result is non-decreasing.
fn effective_timestamps(raw: &[Option<f64>], step: f64) -> Vec<f64> {
    let Some(anchor) = raw.iter().position(Option::is_some) else {
        return (0..raw.len()).map(|i| i as f64 * step).collect();
    };

    let mut out = vec![0.0; raw.len()];
    out[anchor] = raw[anchor].unwrap_or_default();
    for i in (0..anchor).rev() {
        out[i] = out[i + 1] - step;
    }
    for i in anchor + 1..raw.len() {
        out[i] = match raw[i] {
            Some(t) => t.max(out[i - 1]),
            None => out[i - 1] + step,
        };
    }
    out
}

/// Map irregular frame timestamps onto a constant grid: for each output
/// tick, the latest frame at or before the tick (screencast only emits on
/// change, so the previous frame is held).
fn resample_indices(timestamps: &[f64], fps: u32) -> Vec<usize> {
    if timestamps.is_empty() {
        return Vec::new();
    }

    let first = timestamps[0];
    let last = *timestamps.last().unwrap_or(&first);
    let step = 1.0 / f64::from(fps);
    let tick_count = (((last - first) / step).floor() as usize).saturating_add(1);

    let mut selected = Vec::with_capacity(tick_count);
    let mut current = 0usize;
    for k in 0..tick_count {
        let t = first + step * k as f64;
        while current + 1 < timestamps.len() && timestamps[current + 1] <= t {
            current += 1;
        }
        selected.push(current);
    }
    selected
}

/// Arguments for the intermediate encode: PNG frames on stdin, H.264 in
/// an MP4 container out. Dimensions are snapped to even values for
/// yuv420p.
fn encode_args(fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
        "-vcodec".to_string(),
        "png".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.display().to_string(),
    ]
}

async fn encode_frames(
    frames: &[RecordedFrame],
    selected: &[usize],
    output: &Path,
) -> Result<(), StarcapError> {
    let mut child = Command::new("ffmpeg")
        .args(encode_args(INTERMEDIATE_FPS, output))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StarcapError::FfmpegMissing
            } else {
                StarcapError::Recording(format!("Failed to spawn ffmpeg: {}", e))
            }
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| StarcapError::Recording("Failed to open ffmpeg stdin".to_string()))?;

    for &index in selected {
        stdin
            .write_all(&frames[index].data)
            .await
            .map_err(|e| StarcapError::Recording(format!("Failed to write frame: {}", e)))?;
    }
    drop(stdin);

    let out = child
        .wait_with_output()
        .await
        .map_err(|e| StarcapError::Recording(format!("Failed to wait for ffmpeg: {}", e)))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(StarcapError::Recording(format!(
            "ffmpeg exited with status {}: {}",
            out.status,
            stderr.trim()
        )));
    }

    Ok(())
}
