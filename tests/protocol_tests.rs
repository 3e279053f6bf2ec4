use serde_json::{json, Value};
use voice_hints::dispatch::action::{ActionArg, ActionKind, ActionResult, Target};
use voice_hints::hints::label::HintLabel;
use voice_hints::protocol::{parse_request, ResponseAction, ResponseToController};

fn to_value(response: &ResponseToController) -> Value {
    serde_json::from_str(&response.to_json()).expect("response is JSON")
}

// =========================================================================
// Requests
// =========================================================================

#[test]
fn request_with_single_label_target() {
    let request = parse_request(r#"{"type":"request","version":1,"action":{"type":"clickElement","target":"aa"}}"#)
        .expect("parse");
    assert_eq!(request.version, Some(1));
    assert_eq!(request.action.kind, ActionKind::ClickElement);
    assert_eq!(request.action.target, Some(Target::One(HintLabel::from("aa"))));
}

#[test]
fn request_with_label_list_and_text_argument() {
    let request = parse_request(
        r#"{"type":"request","action":{"type":"insertToField","target":["aa","ab"],"arg":"hello"}}"#,
    )
    .expect("parse");
    assert_eq!(request.version, None);
    assert_eq!(request.action.labels().len(), 2);
    assert_eq!(request.action.arg, Some(ActionArg::Text("hello".into())));
}

#[test]
fn numeric_argument_and_untargeted_action() {
    let request = parse_request(r#"{"type":"request","action":{"type":"closeNextTabsInWindow","arg":3}}"#)
        .expect("parse");
    assert_eq!(request.action.kind, ActionKind::CloseNextTabsInWindow);
    assert_eq!(request.action.arg_number(), Some(3.0));
    assert!(request.action.target.is_none());
}

#[test]
fn unknown_action_type_parses_as_unknown() {
    let request = parse_request(r#"{"type":"request","action":{"type":"launchRockets"}}"#).expect("parse");
    assert_eq!(request.action.kind, ActionKind::Unknown);
}

#[test]
fn response_is_not_a_request() {
    assert!(parse_request(r#"{"type":"response","action":{"type":"clickElement"}}"#).is_err());
    assert!(parse_request(r#"{"type":"request"}"#).is_err(), "action is required");
}

// =========================================================================
// Responses
// =========================================================================

#[test]
fn ok_response_shape() {
    let response: ResponseToController = ActionResult::Done.into();
    assert_eq!(to_value(&response), json!({"type": "response", "action": {"type": "ok"}}));
}

#[test]
fn clipboard_response_shape() {
    let response: ResponseToController = ActionResult::CopyToClipboard("https://example.com/".into()).into();
    assert_eq!(
        to_value(&response),
        json!({"type": "response", "action": {"type": "copyToClipboard", "textToCopy": "https://example.com/"}})
    );
}

#[test]
fn typed_fallback_response_shape() {
    let response: ResponseToController = ActionResult::type_target_characters().into();
    assert_eq!(
        to_value(&response),
        json!({
            "type": "response",
            "action": {"type": "noHintFound"},
            "actions": [{"name": "typeTargetCharacters"}]
        })
    );
}

#[test]
fn responses_parse_back() {
    let json = r#"{"type":"response","action":{"type":"textRetrieved","text":"https://example.com/"}}"#;
    let response: ResponseToController = serde_json::from_str(json).expect("parse");
    assert_eq!(
        response.action,
        ResponseAction::TextRetrieved {
            text: "https://example.com/".into()
        }
    );
    assert!(response.actions.is_empty());
}

#[test]
fn merged_results_prefer_clipboard_text() {
    let merged = ActionResult::merge(vec![
        ActionResult::Done,
        ActionResult::CopyToClipboard("one".into()),
        ActionResult::NoAction,
        ActionResult::CopyToClipboard("two".into()),
    ]);
    assert_eq!(merged, ActionResult::CopyToClipboard("one\ntwo".into()));
    assert_eq!(ActionResult::merge(vec![ActionResult::NoAction, ActionResult::Done]), ActionResult::Done);
    assert_eq!(ActionResult::merge(vec![]), ActionResult::NoAction);
}
