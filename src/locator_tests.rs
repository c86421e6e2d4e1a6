use super::*;

/// Scripted probe: returns the supplied outcomes in order and records
/// which strategies were attempted.
struct ScriptedProbe {
    outcomes: Vec<Result<Option<TargetRect>, CdpError>>,
    attempted: Vec<String>,
}

impl ScriptedProbe {
    fn new(outcomes: Vec<Result<Option<TargetRect>, CdpError>>) -> Self {
        Self {
            outcomes: outcomes.into_iter().rev().collect(),
            attempted: Vec::new(),
        }
    }
}

#[async_trait]
impl StrategyProbe for ScriptedProbe {
    async fn attempt(&mut self, strategy: &Strategy) -> Result<Option<TargetRect>, CdpError> {
        self.attempted.push(strategy.label());
        self.outcomes.pop().unwrap_or(Ok(None))
    }
}

fn rect(x: f64, y: f64, w: f64, h: f64) -> TargetRect {
    TargetRect {
        x,
        y,
        width: w,
        height: h,
    }
}

#[test]
fn test_strategy_order_is_fixed() {
    let list = strategies();
    assert_eq!(list.len(), 8);
    // Auth-state button strategies come first, text fallback last.
    assert_eq!(
        list[0],
        Strategy::ButtonRole {
            pattern: r"^Star\b"
        }
    );
    assert_eq!(
        list[2],
        Strategy::Css {
            selector: r#"form[action*="/star"] button"#
        }
    );
    assert_eq!(
        list[7],
        Strategy::GroupWithText {
            class_fragment: "BtnGroup",
            text: "Star"
        }
    );
    // Deterministic: two calls produce the identical sequence.
    assert_eq!(list, strategies());
}

#[test]
fn test_fallback_rect_formula() {
    for (w, h) in [(1280u32, 720u32), (1920, 1080), (161, 1)] {
        let r = fallback_rect(w, h);
        assert_eq!(r.x, f64::from(w) - 160.0);
        assert_eq!(r.y, 86.0);
        assert_eq!(r.width, 130.0);
        assert_eq!(r.height, 30.0);
    }
}

#[tokio::test]
async fn test_locate_stops_at_first_success() {
    // Strategies 1..3 fail, strategy 4 succeeds: nothing after 4 runs.
    let hit = rect(100.0, 80.0, 120.0, 32.0);
    let mut probe = ScriptedProbe::new(vec![Ok(None), Ok(None), Ok(None), Ok(Some(hit))]);

    let result = locate(&mut probe, 1280, 720).await;

    assert!(result.found);
    assert_eq!(result.rect, hit);
    assert_eq!(probe.attempted.len(), 4);
}

#[tokio::test]
async fn test_locate_first_strategy_wins() {
    let hit = rect(1.0, 2.0, 3.0, 4.0);
    let mut probe = ScriptedProbe::new(vec![Ok(Some(hit))]);

    let result = locate(&mut probe, 1280, 720).await;

    assert!(result.found);
    assert_eq!(probe.attempted, vec![strategies()[0].label()]);
}

#[tokio::test]
async fn test_locate_strategy_error_does_not_abort() {
    let hit = rect(10.0, 20.0, 30.0, 40.0);
    let mut probe = ScriptedProbe::new(vec![
        Err(CdpError::JavaScript("boom".to_string())),
        Err(CdpError::Timeout("slow".to_string())),
        Ok(Some(hit)),
    ]);

    let result = locate(&mut probe, 1280, 720).await;

    assert!(result.found);
    assert_eq!(result.rect, hit);
    assert_eq!(probe.attempted.len(), 3);
}

#[tokio::test]
async fn test_locate_exhaustion_uses_fallback() {
    let mut probe = ScriptedProbe::new(vec![]);

    let result = locate(&mut probe, 1280, 720).await;

    assert!(!result.found);
    assert_eq!(result.rect, fallback_rect(1280, 720));
    // Every strategy was tried before giving up.
    assert_eq!(probe.attempted.len(), strategies().len());
}

#[tokio::test]
async fn test_locate_all_errors_uses_fallback() {
    let outcomes = strategies()
        .iter()
        .map(|_| Err(CdpError::SessionClosed))
        .collect();
    let mut probe = ScriptedProbe::new(outcomes);

    let result = locate(&mut probe, 800, 600).await;

    assert!(!result.found);
    assert_eq!(result.rect, fallback_rect(800, 600));
}

#[test]
fn test_probe_js_embeds_selector() {
    let strategy = Strategy::Css {
        selector: r#"form[action*="/star"] button"#,
    };
    let js = strategy.probe_js();
    assert!(js.contains(r#"document.querySelector('form[action*="/star"] button')"#));
    // Gating rules are always present.
    assert!(js.contains("getBoundingClientRect"));
    assert!(js.contains("scrollIntoView"));
    assert!(js.contains("r.width <= 0 || r.height <= 0"));
}

#[test]
fn test_probe_js_escapes_regex_pattern() {
    let strategy = Strategy::ButtonRole {
        pattern: r"^Star\b",
    };
    let js = strategy.probe_js();
    // The backslash must be doubled inside the JS string literal.
    assert!(js.contains(r"new RegExp('^Star\\b', 'i')"));
}

#[test]
fn test_probe_js_is_deterministic() {
    for strategy in strategies() {
        assert_eq!(strategy.probe_js(), strategy.probe_js());
    }
}

#[test]
fn test_js_string_escaping() {
    assert_eq!(js_string("plain"), "'plain'");
    assert_eq!(js_string("a'b"), r"'a\'b'");
    assert_eq!(js_string(r"a\b"), r"'a\\b'");
    assert_eq!(js_string("a\nb"), r"'a\nb'");
}
