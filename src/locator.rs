//! Ordered Star-button location strategies.
//!
//! GitHub renders the Star control differently depending on auth state:
//! logged in it is a `<button>` inside a `form[action*="/star"]`, logged
//! out it is an `<a>` styled as a button. No single query is reliable
//! across page states, so the locator walks a fixed ordered list of
//! strategies and stops at the first one that yields a visible,
//! positive-area element. Exhaustion is not an error: a synthetic
//! fallback rectangle near the top-right of the viewport is returned so
//! downstream stages always have something to highlight.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::cdp::{CdpError, PageSession};

/// Viewport-relative bounding box of the element being highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TargetRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Outcome of a locate pass.
///
/// `found` is false iff every strategy failed and the synthetic fallback
/// rectangle was substituted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocateResult {
    pub rect: TargetRect,
    pub found: bool,
}

/// One ordered attempt to locate the target element.
///
/// Each variant carries its own matching logic, compiled to a
/// self-contained JavaScript probe evaluated in the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Element with button semantics whose accessible name matches a pattern.
    ButtonRole { pattern: &'static str },
    /// Element with link semantics whose accessible name matches a pattern.
    LinkRole { pattern: &'static str },
    /// Plain CSS selector.
    Css { selector: &'static str },
    /// Parent element of a CSS selector match.
    ParentOf { selector: &'static str },
    /// Element whose class contains a fragment and whose text contains a string.
    GroupWithText {
        class_fragment: &'static str,
        text: &'static str,
    },
}

impl Strategy {
    /// Human-readable tag used in logs.
    pub fn label(&self) -> String {
        match self {
            Strategy::ButtonRole { pattern } => format!("role=button /{}/", pattern),
            Strategy::LinkRole { pattern } => format!("role=link /{}/", pattern),
            Strategy::Css { selector } => format!("css {}", selector),
            Strategy::ParentOf { selector } => format!("parent of {}", selector),
            Strategy::GroupWithText {
                class_fragment,
                text,
            } => format!("[class*=\"{}\"] with text \"{}\"", class_fragment, text),
        }
    }

    /// The per-variant candidate finder, as a JS statement binding `el`.
    fn finder_js(&self) -> String {
        match self {
            Strategy::ButtonRole { pattern } => format!(
                "const re = new RegExp({}, 'i');\n  \
                 const el = Array.from(document.querySelectorAll('button, [role=\"button\"]'))\n    \
                 .find((c) => re.test(name(c)));",
                js_string(pattern)
            ),
            Strategy::LinkRole { pattern } => format!(
                "const re = new RegExp({}, 'i');\n  \
                 const el = Array.from(document.querySelectorAll('a, [role=\"link\"]'))\n    \
                 .find((c) => re.test(name(c)));",
                js_string(pattern)
            ),
            Strategy::Css { selector } => {
                format!("const el = document.querySelector({});", js_string(selector))
            }
            Strategy::ParentOf { selector } => format!(
                "const hit = document.querySelector({});\n  \
                 const el = hit ? hit.parentElement : null;",
                js_string(selector)
            ),
            Strategy::GroupWithText {
                class_fragment,
                text,
            } => {
                let selector = format!("[class*=\"{}\"]", class_fragment);
                format!(
                    "const el = Array.from(document.querySelectorAll({}))\n    \
                     .find((c) => (c.textContent || '').includes({}));",
                    js_string(&selector),
                    js_string(text)
                )
            }
        }
    }

    /// Compile this strategy into a self-contained probe expression.
    ///
    /// The probe resolves to `{x, y, width, height}` only if the candidate
    /// matches, is visible, and has a positive-area box after being
    /// scrolled into view; otherwise it resolves to `null`.
    pub fn probe_js(&self) -> String {
        format!(
            "(() => {{\n  \
             const name = (c) => (c.getAttribute('aria-label') || c.textContent || '').trim();\n  \
             {}\n  \
             if (!el) return null;\n  \
             const style = window.getComputedStyle(el);\n  \
             if (style.display === 'none' || style.visibility === 'hidden') return null;\n  \
             if (el.getClientRects().length === 0) return null;\n  \
             el.scrollIntoView({{ block: 'center', inline: 'nearest' }});\n  \
             const r = el.getBoundingClientRect();\n  \
             if (r.width <= 0 || r.height <= 0) return null;\n  \
             return {{ x: r.x, y: r.y, width: r.width, height: r.height }};\n\
             }})()",
            self.finder_js()
        )
    }
}

/// Escape a string for embedding as a single-quoted JS string literal.
fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// The fixed strategy sequence. Order is significant: auth-state button
/// queries first, anchor variants next, broader attribute and text
/// fallbacks last.
pub fn strategies() -> Vec<Strategy> {
    vec![
        // Logged-in: actual <button> with Star text.
        Strategy::ButtonRole {
            pattern: r"^Star\b",
        },
        Strategy::ButtonRole {
            pattern: r"^Starred\b",
        },
        Strategy::Css {
            selector: r#"form[action*="/star"] button"#,
        },
        // Logged-out: <a> tag styled as button.
        Strategy::Css {
            selector: r#"a[aria-label*="star" i].btn"#,
        },
        Strategy::LinkRole {
            pattern: r"^\s*Star\b",
        },
        // Broader: any button-ish element with a star aria-label.
        Strategy::Css {
            selector: r#"[aria-label*="star" i][class*="btn"]"#,
        },
        // Counter-based: the star counter's enclosing control.
        Strategy::ParentOf {
            selector: "#repo-stars-counter-star",
        },
        // Text-based: button group containing "Star".
        Strategy::GroupWithText {
            class_fragment: "BtnGroup",
            text: "Star",
        },
    ]
}

/// Synthetic rectangle anchored to the top-right of the viewport, where
/// the Star button typically appears. Pure function of the viewport,
/// independent of page content.
pub fn fallback_rect(viewport_width: u32, _viewport_height: u32) -> TargetRect {
    TargetRect {
        x: f64::from(viewport_width) - 160.0,
        y: 86.0,
        width: 130.0,
        height: 30.0,
    }
}

/// Seam through which strategies are evaluated, so the sequencing policy
/// is testable without a browser.
#[async_trait]
pub trait StrategyProbe {
    /// Attempt one strategy, returning its rectangle if it matched a
    /// visible positive-area element.
    async fn attempt(&mut self, strategy: &Strategy) -> Result<Option<TargetRect>, CdpError>;
}

/// Evaluate the fixed strategy sequence in declared order, stopping at
/// the first success. A failing strategy (no match, or an evaluation
/// error) never aborts the whole operation; exhaustion degrades to the
/// fallback rectangle with `found = false`.
pub async fn locate<P>(probe: &mut P, viewport_width: u32, viewport_height: u32) -> LocateResult
where
    P: StrategyProbe + ?Sized,
{
    for strategy in strategies() {
        match probe.attempt(&strategy).await {
            Ok(Some(rect)) => {
                info!("Star button found via: {}", strategy.label());
                return LocateResult { rect, found: true };
            }
            Ok(None) => {
                debug!("Strategy yielded nothing: {}", strategy.label());
            }
            Err(e) => {
                debug!("Strategy failed: {}: {}", strategy.label(), e);
            }
        }
    }

    info!("Star button not found, using fallback region");
    LocateResult {
        rect: fallback_rect(viewport_width, viewport_height),
        found: false,
    }
}

/// Production probe: evaluates each strategy's JS in the live page, with
/// a short per-attempt timeout so one unresponsive strategy cannot stall
/// the session.
pub struct PageProbe<'a> {
    session: &'a PageSession,
    attempt_timeout: Duration,
}

impl<'a> PageProbe<'a> {
    pub fn new(session: &'a PageSession) -> Self {
        Self {
            session,
            attempt_timeout: Duration::from_secs(3),
        }
    }
}

#[async_trait]
impl StrategyProbe for PageProbe<'_> {
    async fn attempt(&mut self, strategy: &Strategy) -> Result<Option<TargetRect>, CdpError> {
        let probe = strategy.probe_js();
        let value = tokio::time::timeout(self.attempt_timeout, self.session.evaluate(&probe))
            .await
            .map_err(|_| CdpError::Timeout(format!("Strategy timed out: {}", strategy.label())))??;

        if value.is_null() {
            return Ok(None);
        }

        let rect: TargetRect = serde_json::from_value(value)?;
        Ok(Some(rect))
    }
}

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;
