//! Video to GIF conversion via ffmpeg's two-pass palette pipeline.
//!
//! Pass one scans the recording and generates a 256-color palette tuned
//! to the frames that actually change (`stats_mode=diff`). Pass two maps
//! the video through that palette with ordered dithering. GIFs produced
//! this way are sharply smaller than a single-pass encode at the same
//! visual quality.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::StarcapError;

/// Options shared by both encoding passes.
#[derive(Debug, Clone, Copy)]
pub struct GifOptions {
    /// Output GIF frame rate.
    pub fps: u32,
    /// Output width in pixels; height follows the aspect ratio.
    pub scale: u32,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self { fps: 15, scale: 960 }
    }
}

/// Two-pass GIF transcoder backed by an external ffmpeg binary.
pub struct Transcoder {
    program: PathBuf,
}

impl Transcoder {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific binary instead of resolving `ffmpeg` from PATH.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Preflight check: confirm the binary exists and runs. Called before
    /// any browser work so a missing ffmpeg fails fast.
    ///
    /// Only an absent binary maps to the install-hints error; a binary
    /// that is found but misbehaves is reported with its diagnostic.
    pub async fn ensure_available(&self) -> Result<(), StarcapError> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(StarcapError::Ffmpeg(format!(
                "{} -version exited with status {}",
                self.program.display(),
                status
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StarcapError::FfmpegMissing)
            }
            Err(e) => Err(StarcapError::Ffmpeg(format!(
                "Failed to run {}: {}",
                self.program.display(),
                e
            ))),
        }
    }

    /// Convert `input` into a looping GIF at `output`, using `work_dir`
    /// for the intermediate palette image.
    pub async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        options: GifOptions,
        work_dir: &Path,
    ) -> Result<(), StarcapError> {
        let palette = work_dir.join("palette.png");

        info!("Generating color palette...");
        self.generate_palette(input, &palette, options).await?;

        info!("Encoding GIF...");
        self.encode_gif(input, &palette, output, options).await?;

        let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        debug!("GIF written: {} ({} bytes)", output.display(), size);
        Ok(())
    }

    async fn generate_palette(
        &self,
        input: &Path,
        palette: &Path,
        options: GifOptions,
    ) -> Result<(), StarcapError> {
        let filter = format!(
            "fps={},scale={}:-1:flags=lanczos,palettegen=stats_mode=diff",
            options.fps, options.scale
        );
        let args = [
            "-y",
            "-loglevel",
            "error",
            "-i",
            &input.display().to_string(),
            "-vf",
            &filter,
            &palette.display().to_string(),
        ]
        .map(str::to_string);

        let stderr = self.run(&args).await?;
        if let Some(stderr) = stderr {
            return Err(StarcapError::PaletteGeneration {
                path: input.to_path_buf(),
                stderr,
            });
        }
        if !palette.exists() {
            return Err(StarcapError::PaletteGeneration {
                path: input.to_path_buf(),
                stderr: "No palette image was produced".to_string(),
            });
        }
        Ok(())
    }

    async fn encode_gif(
        &self,
        input: &Path,
        palette: &Path,
        output: &Path,
        options: GifOptions,
    ) -> Result<(), StarcapError> {
        let filter = format!(
            "fps={},scale={}:-1:flags=lanczos[x];[x][1:v]\
             paletteuse=dither=bayer:bayer_scale=5:diff_mode=rectangle",
            options.fps, options.scale
        );
        let args = [
            "-y",
            "-loglevel",
            "error",
            "-i",
            &input.display().to_string(),
            "-i",
            &palette.display().to_string(),
            "-filter_complex",
            &filter,
            "-loop",
            "0",
            &output.display().to_string(),
        ]
        .map(str::to_string);

        let stderr = self.run(&args).await?;
        if let Some(stderr) = stderr {
            return Err(StarcapError::GifGeneration {
                path: output.to_path_buf(),
                stderr,
            });
        }
        if !output.exists() {
            return Err(StarcapError::GifGeneration {
                path: output.to_path_buf(),
                stderr: "No output GIF was produced".to_string(),
            });
        }
        Ok(())
    }

    /// Run one ffmpeg pass. `Ok(None)` on success, `Ok(Some(stderr))` on
    /// a nonzero exit, `Err(FfmpegMissing)` when the binary is absent.
    async fn run(&self, args: &[String]) -> Result<Option<String>, StarcapError> {
        debug!("{} {}", self.program.display(), args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StarcapError::FfmpegMissing
                } else {
                    StarcapError::Ffmpeg(format!("Failed to run ffmpeg: {}", e))
                }
            })?;

        if output.status.success() {
            Ok(None)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Ok(Some(if stderr.is_empty() {
                format!("ffmpeg exited with status {}", output.status)
            } else {
                stderr
            }))
        }
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_reported_with_install_hint() {
        let transcoder = Transcoder::with_program("/nonexistent/ffmpeg-definitely-not-here");
        let err = transcoder.ensure_available().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ffmpeg"));
        assert!(message.contains("brew install"));
    }

    #[tokio::test]
    async fn test_broken_binary_is_not_reported_as_missing() {
        // `false` exists and runs, it just exits nonzero: that is a tool
        // failure, not an absent tool, so no install hints.
        let transcoder = Transcoder::with_program("false");
        let err = transcoder.ensure_available().await.unwrap_err();
        match err {
            StarcapError::Ffmpeg(msg) => assert!(msg.contains("exited with status")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_second_pass_is_a_gif_generation_error() {
        use std::os::unix::fs::PermissionsExt;

        // A stand-in encoder that writes the palette on pass one, then
        // exits 0 on pass two without producing the GIF.
        let bin_dir = tempfile::tempdir().unwrap();
        let fake = bin_dir.path().join("fake-ffmpeg");
        std::fs::write(
            &fake,
            "#!/bin/sh\n\
             for a in \"$@\"; do last=\"$a\"; done\n\
             case \"$*\" in *palettegen*) : > \"$last\";; esac\n\
             exit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let work = tempfile::tempdir().unwrap();
        let output = work.path().join("out.gif");
        let transcoder = Transcoder::with_program(&fake);
        let err = transcoder
            .transcode(
                Path::new("/tmp/in.mp4"),
                &output,
                GifOptions::default(),
                work.path(),
            )
            .await
            .unwrap_err();
        match err {
            StarcapError::GifGeneration { path, .. } => assert_eq!(path, output),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_palette_failure_carries_stderr() {
        // `true` exits 0 for -version but produces no palette image.
        let transcoder = Transcoder::with_program("true");
        assert!(transcoder.ensure_available().await.is_ok());

        let work = tempfile::tempdir().unwrap();
        let err = transcoder
            .transcode(
                Path::new("/tmp/in.mp4"),
                Path::new("/tmp/out.gif"),
                GifOptions::default(),
                work.path(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StarcapError::PaletteGeneration { .. }));
    }

    #[tokio::test]
    async fn test_failing_binary_maps_to_palette_error() {
        let transcoder = Transcoder::with_program("false");
        let work = tempfile::tempdir().unwrap();
        let err = transcoder
            .transcode(
                Path::new("/tmp/in.mp4"),
                Path::new("/tmp/out.gif"),
                GifOptions::default(),
                work.path(),
            )
            .await
            .unwrap_err();
        match err {
            StarcapError::PaletteGeneration { path, .. } => {
                assert_eq!(path, Path::new("/tmp/in.mp4"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_default_options() {
        let options = GifOptions::default();
        assert_eq!(options.fps, 15);
        assert_eq!(options.scale, 960);
    }
}
