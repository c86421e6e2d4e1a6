//! Chrome DevTools Protocol (CDP) client.
//!
//! A deliberately narrow CDP client: one browser, one page, one recording.
//! It connects to a freshly launched Chromium over WebSocket, speaks the
//! CDP JSON-RPC dialect, and exposes only the surface the capture session
//! needs (navigation, script evaluation, emulation overrides, screenshots
//! and screencast frames).

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::{PageEvents, PageSession};
