use super::*;

#[test]
fn test_cdp_request_serialize() {
    let req = CdpRequest {
        id: 1,
        method: "Page.navigate".to_string(),
        params: Some(serde_json::json!({"url": "https://github.com/owner/repo"})),
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("Page.navigate"));
    assert!(json.contains("github.com"));
    // Absent fields must not be serialized at all.
    assert!(!json.contains("sessionId"));
}

#[test]
fn test_cdp_request_session_id_rename() {
    let req = CdpRequest {
        id: 7,
        method: "Runtime.evaluate".to_string(),
        params: None,
        session_id: Some("SID".to_string()),
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("\"sessionId\":\"SID\""));
    assert!(!json.contains("params"));
}

#[test]
fn test_cdp_message_response_deserialize() {
    let json = r#"{"id": 1, "result": {"frameId": "abc"}}"#;
    let msg: CdpMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.id, Some(1));
    assert!(msg.result.is_some());
    assert!(msg.method.is_none());
}

#[test]
fn test_cdp_message_event_deserialize() {
    let json = r#"{"method": "Page.screencastFrame", "params": {"data": "aGk="}, "sessionId": "S1"}"#;
    let msg: CdpMessage = serde_json::from_str(json).unwrap();
    assert!(msg.id.is_none());
    assert_eq!(msg.method.as_deref(), Some("Page.screencastFrame"));
    assert_eq!(msg.session_id.as_deref(), Some("S1"));
}

#[test]
fn test_cdp_message_error_deserialize() {
    let json = r#"{"id": 3, "error": {"code": -32000, "message": "Not allowed"}}"#;
    let msg: CdpMessage = serde_json::from_str(json).unwrap();
    let err = msg.error.unwrap();
    assert_eq!(err.code, -32000);
    assert_eq!(err.message, "Not allowed");
}

#[test]
fn test_browser_version_deserialize() {
    let json = r#"{
        "Browser": "Chrome/131.0.0.0",
        "Protocol-Version": "1.3",
        "User-Agent": "Mozilla/5.0",
        "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/xyz"
    }"#;
    let version: BrowserVersion = serde_json::from_str(json).unwrap();
    assert_eq!(version.browser, "Chrome/131.0.0.0");
    assert!(version.web_socket_debugger_url.starts_with("ws://"));
}

#[test]
fn test_screencast_frame_deserialize() {
    let json = r#"{
        "data": "iVBORw0KGgo=",
        "metadata": {
            "deviceWidth": 1280.0,
            "deviceHeight": 720.0,
            "pageScaleFactor": 1.0,
            "timestamp": 1735200000.25
        },
        "sessionId": 4
    }"#;
    let frame: ScreencastFrame = serde_json::from_str(json).unwrap();
    assert_eq!(frame.session_id, 4);
    assert_eq!(frame.metadata.device_width, Some(1280.0));
    assert_eq!(frame.metadata.timestamp, Some(1735200000.25));
}

#[test]
fn test_screencast_frame_sparse_metadata() {
    // Chrome omits metadata fields on some platforms.
    let json = r#"{"data": "aGk=", "metadata": {}, "sessionId": 1}"#;
    let frame: ScreencastFrame = serde_json::from_str(json).unwrap();
    assert!(frame.metadata.timestamp.is_none());
}
