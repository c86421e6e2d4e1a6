use super::*;

fn rect() -> TargetRect {
    TargetRect {
        x: 1100.0,
        y: 90.0,
        width: 120.0,
        height: 32.0,
    }
}

/// Pull the tooltip message literal back out of the generated script.
fn extract_embedded_message(script: &str) -> &str {
    let start = script
        .find("tooltip.innerHTML = '")
        .expect("tooltip assignment present")
        + "tooltip.innerHTML = '".len();
    let end = script[start..].find('\'').expect("literal terminated") + start;
    &script[start..end]
}

/// Decode the embedding: first the JS string-literal layer, then the
/// HTML entity layer, mirroring how the browser would parse it.
fn decode_embedded(embedded: &str) -> String {
    // JS string literal layer.
    let mut js_decoded = String::new();
    let mut chars = embedded.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('\\') => js_decoded.push('\\'),
                Some('\'') => js_decoded.push('\''),
                Some('n') => js_decoded.push('\n'),
                Some('r') => js_decoded.push('\r'),
                Some(other) => panic!("unexpected escape \\{}", other),
                None => panic!("dangling backslash"),
            }
        } else {
            js_decoded.push(ch);
        }
    }

    // HTML content layer.
    let mut out = String::new();
    let mut rest = js_decoded.as_str();
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let semi = tail.find(';').expect("entity terminated");
        let entity = &tail[..=semi];
        out.push(match entity {
            "&amp;" => '&',
            "&lt;" => '<',
            "&gt;" => '>',
            "&quot;" => '"',
            "&#39;" => '\'',
            "&#96;" => '`',
            "&#13;" => '\r',
            "&#10;" => '\n',
            other => panic!("unexpected entity {}", other),
        });
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

#[test]
fn test_build_is_deterministic() {
    let a = build_overlay_script(&rect(), "Star this repo ⭐👆");
    let b = build_overlay_script(&rect(), "Star this repo ⭐👆");
    assert_eq!(a, b);
}

#[test]
fn test_script_is_self_contained() {
    let script = build_overlay_script(&rect(), "hello");
    // One self-evaluating expression, no external references.
    assert!(script.starts_with("(() => {"));
    assert!(script.ends_with("})()"));
    assert!(!script.contains("require("));
    assert!(!script.contains("import "));
}

#[test]
fn test_remove_before_insert_by_reserved_id() {
    let script = build_overlay_script(&rect(), "hello");

    let removal = script
        .find("document.getElementById('__starcap_overlay')")
        .expect("removal lookup present");
    let insert = script
        .find("root.id = '__starcap_overlay'")
        .expect("insertion present");

    // Applying the overlay twice leaves exactly one overlay present: the
    // previous root is removed before the new one is created.
    assert!(removal < insert);
    assert_eq!(script.matches(OVERLAY_ELEMENT_ID).count(), 2);
    assert_eq!(script.matches("root.id =").count(), 1);
}

#[test]
fn test_spotlight_geometry() {
    let script = build_overlay_script(&rect(), "hi");
    // rect (1100, 90, 120, 32) padded by 10 on all sides.
    assert!(script.contains("left: 1090px"));
    assert!(script.contains("top: 80px"));
    assert!(script.contains("width: 140px"));
    assert!(script.contains("height: 52px"));
}

#[test]
fn test_tooltip_clamped_to_minimum_top() {
    let near_top = TargetRect {
        x: 400.0,
        y: 4.0,
        width: 100.0,
        height: 20.0,
    };
    let script = build_overlay_script(&near_top, "hi");
    // spot_y - 56 would be negative; the tooltip is clamped to 8px.
    assert!(script.contains("top: 8px"));
}

#[test]
fn test_message_round_trips_through_embedding() {
    let messages = [
        "plain text",
        "a & b < c > d",
        r#"quotes " and ' here"#,
        "backtick ` and backslash \\",
        "ends with backslash \\",
        "\\",
        "line\nbreak and\rcarriage",
        "Star this repo ⭐👆",
        "&amp; already encoded",
    ];

    for message in messages {
        let script = build_overlay_script(&rect(), message);
        let embedded = extract_embedded_message(&script);
        assert_eq!(
            decode_embedded(embedded),
            message,
            "round-trip failed for {:?}",
            message
        );
    }
}

#[test]
fn test_message_cannot_break_out_of_literal_or_create_markup() {
    let hostile = r#"'); alert(1); ('<img src=x onerror=alert(2)>"#;
    let script = build_overlay_script(&rect(), hostile);
    let embedded = extract_embedded_message(&script);

    // No raw quote, angle bracket, backtick, or stray backslash survives.
    assert!(!embedded.contains('<'));
    assert!(!embedded.contains('>'));
    assert!(!embedded.contains('`'));
    assert!(!embedded.contains('\''));
    assert!(!script.contains("<img"));
    assert_eq!(decode_embedded(embedded), hostile);
}

#[test]
fn test_timing_defaults() {
    let timing = OverlayTiming::default();
    assert_eq!(timing.backdrop_delay, 0.8);
    assert_eq!(timing.ring_delay, 1.0);
    assert_eq!(timing.pointer_duration, 1.2);
    assert_eq!(timing.tooltip_delay, 1.3);
    assert_eq!(timing.tail(), 1.8);
}

#[test]
fn test_timing_validates_default_capture_window() {
    // Scenario: duration=4200ms, fps=15. The tooltip is fully visible by
    // 1800ms, well inside the window; no validation error.
    let timing = OverlayTiming::default();
    assert!(timing.validate(Duration::from_millis(4200)).is_ok());
    assert!(timing.tail() <= 1.8);
}

#[test]
fn test_timing_tail_property_across_windows() {
    // For every supported window, validation passes exactly when the
    // animation tail ends strictly inside it.
    let timing = OverlayTiming::default();
    for total_ms in (100..6000).step_by(100) {
        let total = Duration::from_millis(total_ms);
        let expected_ok = timing.tail() < total.as_secs_f64();
        assert_eq!(
            timing.validate(total).is_ok(),
            expected_ok,
            "window {}ms",
            total_ms
        );
    }
}

#[test]
fn test_timing_rejects_backdrop_after_ring() {
    let timing = OverlayTiming {
        backdrop_delay: 1.0,
        ring_delay: 1.0,
        ..OverlayTiming::default()
    };
    assert!(matches!(
        timing.validate(Duration::from_secs(10)),
        Err(TimingError::BackdropAfterRing { .. })
    ));
}

#[test]
fn test_timing_rejects_tooltip_before_pointer_settles() {
    let timing = OverlayTiming {
        tooltip_delay: 1.1,
        pointer_duration: 1.2,
        ..OverlayTiming::default()
    };
    assert!(matches!(
        timing.validate(Duration::from_secs(10)),
        Err(TimingError::TooltipBeforePointer { .. })
    ));
}

#[test]
fn test_timing_rejects_window_shorter_than_tail() {
    let timing = OverlayTiming::default();
    assert!(matches!(
        timing.validate(Duration::from_millis(1800)),
        Err(TimingError::ExceedsCapture { .. })
    ));
}

#[test]
fn test_timing_values_appear_in_script() {
    let script = build_overlay_script(&rect(), "hi");
    assert!(script.contains("__sc_fadeIn 0.4s ease-out 0.8s both"));
    assert!(script.contains("__sc_pulse 1s ease-in-out 1s infinite"));
    assert!(script.contains("__sc_pointerMove 1.2s"));
    assert!(script.contains("__sc_tooltipIn 0.5s ease-out 1.3s both"));
}
