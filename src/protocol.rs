//! JSON messages exchanged with the voice controller.

use serde::{Deserialize, Serialize};

use crate::dispatch::action::{ActionRequest, ActionResult, ControllerInstruction};

/// `{"type": "request", "version": 1, "action": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "request")]
pub struct RequestFromController {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub action: ActionRequest,
}

impl RequestFromController {
    pub fn new(action: ActionRequest) -> Self {
        RequestFromController { version: Some(1), action }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResponseAction {
    NoAction,
    Ok,
    CopyToClipboard {
        #[serde(rename = "textToCopy")]
        text_to_copy: String,
    },
    TextRetrieved {
        text: String,
    },
    NoHintFound,
}

/// `{"type": "response", "action": {...}, "actions": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "response")]
pub struct ResponseToController {
    pub action: ResponseAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ControllerInstruction>,
}

impl ResponseToController {
    pub fn no_action() -> Self {
        ResponseToController {
            action: ResponseAction::NoAction,
            actions: Vec::new(),
        }
    }

    pub fn to_json(&self) -> String {
        // Plain enums and strings only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"response","action":{"type":"noAction"}}"#.to_string())
    }
}

impl From<ActionResult> for ResponseToController {
    fn from(result: ActionResult) -> Self {
        let (action, actions) = match result {
            ActionResult::NoAction => (ResponseAction::NoAction, Vec::new()),
            ActionResult::Done => (ResponseAction::Ok, Vec::new()),
            ActionResult::TextRetrieved(text) => (ResponseAction::TextRetrieved { text }, Vec::new()),
            ActionResult::CopyToClipboard(text_to_copy) => (ResponseAction::CopyToClipboard { text_to_copy }, Vec::new()),
            ActionResult::Instructions(instructions) => (ResponseAction::NoHintFound, instructions),
        };
        ResponseToController { action, actions }
    }
}

pub fn parse_request(json: &str) -> Result<RequestFromController, serde_json::Error> {
    serde_json::from_str(json)
}
