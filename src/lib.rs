//! starcap - Animated GIFs that point at a repository's Star button.
//!
//! Drives a headless Chrome instance to a GitHub repository page, finds
//! the Star button through an ordered set of locator strategies, injects
//! a spotlight-and-tooltip overlay animation, records the viewport over
//! the DevTools screencast, and transcodes the recording into an
//! optimized looping GIF with ffmpeg's two-pass palette pipeline.

pub mod capture;
pub mod cdp;
pub mod chrome;
pub mod error;
pub mod locator;
pub mod overlay;
pub mod recorder;
pub mod repo_url;
pub mod transcode;
pub mod workdir;

pub use capture::{CaptureConfig, CaptureResult, capture_star_video};
pub use error::StarcapError;
pub use repo_url::{ParsedRepo, parse_github_url};
pub use transcode::{GifOptions, Transcoder};
