use super::*;

#[test]
fn terminal_create_serializes_with_type_tag() {
    let frame = Frame::TerminalCreate(TerminalCreate {
        session_id: "S1".to_owned(),
        cols: Some(80),
        rows: Some(24),
        cwd: None,
        shell: None,
    });
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "terminal:create");
    assert_eq!(json["payload"]["sessionId"], "S1");
}

#[test]
fn round_trips_through_json() {
    let frame = Frame::TerminalDestroyed { session_id: "S1".to_owned(), exit_code: Some(0) };
    let json = serde_json::to_string(&frame).unwrap();
    let back: Frame = serde_json::from_str(&json).unwrap();
    match back {
        Frame::TerminalDestroyed { session_id, exit_code } => {
            assert_eq!(session_id, "S1");
            assert_eq!(exit_code, Some(0));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn type_tag_matches_the_serialized_type_field() {
    let frame = Frame::BrowserStop {};
    assert_eq!(frame.type_tag(), "browser:stop");
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], frame.type_tag());
}

#[test]
fn error_type_for_derives_domain() {
    assert_eq!(error_type_for("terminal:create"), "terminal:error");
    assert_eq!(error_type_for("tunnel:request"), "tunnel:error");
    assert_eq!(domain_of("browser:frame-ack"), "browser");
}
