//! Highlight animation script synthesis.
//!
//! Builds the JavaScript that, when evaluated in the page, injects the
//! overlay (dimmed backdrop with a spotlight cutout, pulsing ring,
//! simulated pointer, tooltip bubble) and starts deterministic CSS
//! animations. Pure string synthesis: no page access, byte-identical
//! output for identical input.
//!
//! All coordinates are viewport-fixed so they align with the recorded
//! frames.

use std::time::Duration;

use thiserror::Error;

use crate::locator::TargetRect;

/// Reserved DOM id for the injected overlay root. The script removes any
/// element with this id before inserting, so re-evaluation replaces the
/// previous overlay instead of stacking a new one.
pub const OVERLAY_ELEMENT_ID: &str = "__starcap_overlay";

/// Spotlight padding around the target, in pixels.
const SPOTLIGHT_PAD: f64 = 10.0;

/// Minimum tooltip top offset so it never renders off-screen.
const TOOLTIP_MIN_TOP: i64 = 8;

/// Animation schedule, in seconds relative to script evaluation.
///
/// The delays are chosen so effects appear in a fixed dramatic order:
/// pointer first, then backdrop, then ring, then tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayTiming {
    pub backdrop_delay: f64,
    pub backdrop_duration: f64,
    pub ring_delay: f64,
    pub ring_fade_duration: f64,
    pub pointer_duration: f64,
    pub tooltip_delay: f64,
    pub tooltip_duration: f64,
}

impl Default for OverlayTiming {
    fn default() -> Self {
        Self {
            backdrop_delay: 0.8,
            backdrop_duration: 0.4,
            ring_delay: 1.0,
            ring_fade_duration: 0.3,
            pointer_duration: 1.2,
            tooltip_delay: 1.3,
            tooltip_duration: 0.5,
        }
    }
}

/// A timing schedule that cannot fully render inside the capture window.
#[derive(Debug, Error, PartialEq)]
pub enum TimingError {
    #[error("backdrop fade-in ({backdrop}s) must start before the ring ({ring}s)")]
    BackdropAfterRing { backdrop: f64, ring: f64 },

    #[error("tooltip ({tooltip}s) must appear after the pointer settles ({pointer}s)")]
    TooltipBeforePointer { tooltip: f64, pointer: f64 },

    #[error("animation tail ({tail}s) must finish strictly inside the capture window ({total}s)")]
    ExceedsCapture { tail: f64, total: f64 },
}

impl OverlayTiming {
    /// The instant at which the last effect has fully rendered.
    pub fn tail(&self) -> f64 {
        (self.backdrop_delay + self.backdrop_duration)
            .max(self.ring_delay + self.ring_fade_duration)
            .max(self.pointer_duration)
            .max(self.tooltip_delay + self.tooltip_duration)
    }

    /// Check that this schedule is internally consistent and fully
    /// renders inside `total_capture`. Pure: no clock, no waiting.
    pub fn validate(&self, total_capture: Duration) -> Result<(), TimingError> {
        if self.backdrop_delay >= self.ring_delay {
            return Err(TimingError::BackdropAfterRing {
                backdrop: self.backdrop_delay,
                ring: self.ring_delay,
            });
        }
        if self.tooltip_delay <= self.pointer_duration {
            return Err(TimingError::TooltipBeforePointer {
                tooltip: self.tooltip_delay,
                pointer: self.pointer_duration,
            });
        }
        let total = total_capture.as_secs_f64();
        let tail = self.tail();
        if tail >= total {
            return Err(TimingError::ExceedsCapture { tail, total });
        }
        Ok(())
    }
}

/// Escape untrusted text for embedding as HTML content inside a
/// single-quoted JS string literal.
///
/// A single pass maps every sensitive character independently, so there
/// is no replacement-order interaction: HTML-active characters become
/// numeric or named entities (which also removes every quote the JS
/// literal could be terminated with), backslashes are doubled for the JS
/// string parser, and CR/LF become entities because a raw newline inside
/// a JS string literal is a syntax error.
fn escape_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for ch in message.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '`' => out.push_str("&#96;"),
            '\r' => out.push_str("&#13;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Build the overlay script with the default schedule.
pub fn build_overlay_script(target: &TargetRect, message: &str) -> String {
    build_with_timing(target, message, &OverlayTiming::default())
}

/// Build the overlay script for an explicit schedule.
pub fn build_with_timing(target: &TargetRect, message: &str, timing: &OverlayTiming) -> String {
    let cx = (target.x + target.width / 2.0).round() as i64;
    let cy = (target.y + target.height / 2.0).round() as i64;

    let spot_x = (target.x - SPOTLIGHT_PAD).round() as i64;
    let spot_y = (target.y - SPOTLIGHT_PAD).round() as i64;
    let spot_w = (target.width + SPOTLIGHT_PAD * 2.0).round() as i64;
    let spot_h = (target.height + SPOTLIGHT_PAD * 2.0).round() as i64;

    let tooltip_left = cx - 80;
    let tooltip_top = (spot_y - 56).max(TOOLTIP_MIN_TOP);

    let safe_message = escape_message(message);

    let mut script = String::with_capacity(4096);

    script.push_str("(() => {\n");
    script.push_str(&format!(
        "  const prev = document.getElementById('{OVERLAY_ELEMENT_ID}');\n  \
         if (prev) prev.remove();\n\n  \
         const root = document.createElement('div');\n  \
         root.id = '{OVERLAY_ELEMENT_ID}';\n"
    ));
    script.push_str(
        "  root.style.cssText = 'position:fixed;inset:0;z-index:2147483647;pointer-events:none;';\n\n",
    );

    // Keyframes.
    script.push_str(
        "  const style = document.createElement('style');\n  style.textContent = `\n    \
         @keyframes __sc_pulse {\n      \
         0%, 100% { box-shadow: 0 0 0 0 rgba(255, 215, 0, 0.6); }\n      \
         50% { box-shadow: 0 0 0 8px rgba(255, 215, 0, 0); }\n    }\n    \
         @keyframes __sc_pointerMove {\n      \
         0% { transform: translate(200px, 160px) scale(1); opacity: 0; }\n      \
         15% { opacity: 1; }\n      \
         100% { transform: translate(0px, 0px) scale(1); opacity: 1; }\n    }\n    \
         @keyframes __sc_tooltipIn {\n      \
         0% { opacity: 0; transform: translateY(8px); }\n      \
         100% { opacity: 1; transform: translateY(0); }\n    }\n    \
         @keyframes __sc_fadeIn {\n      \
         0% { opacity: 0; }\n      \
         100% { opacity: 1; }\n    }\n  `;\n  root.appendChild(style);\n\n",
    );

    // Dimmed backdrop with spotlight cutout.
    script.push_str(&format!(
        "  const backdrop = document.createElement('div');\n  backdrop.style.cssText = `\n    \
         position: fixed;\n    \
         left: {spot_x}px;\n    top: {spot_y}px;\n    \
         width: {spot_w}px;\n    height: {spot_h}px;\n    \
         border-radius: 8px;\n    \
         box-shadow: 0 0 0 9999px rgba(0, 0, 0, 0.35);\n    \
         animation: __sc_fadeIn {backdrop_duration}s ease-out {backdrop_delay}s both;\n  `;\n  \
         root.appendChild(backdrop);\n\n",
        backdrop_duration = timing.backdrop_duration,
        backdrop_delay = timing.backdrop_delay,
    ));

    // Pulsing ring around the target.
    script.push_str(&format!(
        "  const ring = document.createElement('div');\n  ring.style.cssText = `\n    \
         position: fixed;\n    \
         left: {spot_x}px;\n    top: {spot_y}px;\n    \
         width: {spot_w}px;\n    height: {spot_h}px;\n    \
         border-radius: 8px;\n    \
         border: 3px solid rgba(255, 215, 0, 0.8);\n    \
         animation: __sc_pulse 1s ease-in-out {ring_delay}s infinite, \
         __sc_fadeIn {ring_fade}s ease-out {ring_delay}s both;\n    \
         box-sizing: border-box;\n  `;\n  root.appendChild(ring);\n\n",
        ring_delay = timing.ring_delay,
        ring_fade = timing.ring_fade_duration,
    ));

    // Simulated pointer animating toward the element center.
    script.push_str(&format!(
        "  const pointer = document.createElement('div');\n  pointer.innerHTML = `\n    \
         <svg width=\"28\" height=\"28\" viewBox=\"0 0 24 24\" fill=\"none\" xmlns=\"http://www.w3.org/2000/svg\">\n      \
         <path d=\"M5 3L19 12L12 13L9 20L5 3Z\" fill=\"white\" stroke=\"black\" stroke-width=\"1.5\" stroke-linejoin=\"round\"/>\n    \
         </svg>\n  `;\n  pointer.style.cssText = `\n    \
         position: fixed;\n    \
         left: {cx}px;\n    top: {cy}px;\n    \
         width: 28px;\n    height: 28px;\n    \
         animation: __sc_pointerMove {pointer_duration}s cubic-bezier(0.25, 0.46, 0.45, 0.94) 0s both;\n    \
         filter: drop-shadow(1px 2px 2px rgba(0,0,0,0.3));\n  `;\n  \
         root.appendChild(pointer);\n\n",
        pointer_duration = timing.pointer_duration,
    ));

    // Tooltip bubble above the spotlight.
    script.push_str(&format!(
        "  const tooltip = document.createElement('div');\n  tooltip.innerHTML = '{safe_message}';\n  \
         tooltip.style.cssText = `\n    \
         position: fixed;\n    \
         left: {tooltip_left}px;\n    top: {tooltip_top}px;\n    \
         padding: 10px 18px;\n    \
         background: linear-gradient(135deg, #ffd700 0%, #ffb347 100%);\n    \
         color: #1a1a1a;\n    \
         font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;\n    \
         font-size: 16px;\n    \
         font-weight: 700;\n    \
         border-radius: 12px;\n    \
         white-space: nowrap;\n    \
         box-shadow: 0 4px 16px rgba(0,0,0,0.18);\n    \
         animation: __sc_tooltipIn {tooltip_duration}s ease-out {tooltip_delay}s both;\n  `;\n  \
         root.appendChild(tooltip);\n\n",
        tooltip_duration = timing.tooltip_duration,
        tooltip_delay = timing.tooltip_delay,
    ));

    script.push_str("  document.body.appendChild(root);\n})()");

    script
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod tests;
