use serde::{Deserialize, Serialize};

use crate::hints::label::HintLabel;

/// Every action the controller can ask for, named as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    // Targeted, executed in the document context owning the label
    ClickElement,
    DirectClickElement,
    FocusElement,
    ShowLink,
    OpenInNewTab,
    OpenInBackgroundTab,
    HoverElement,
    CopyLink,
    CopyMarkdownLink,
    CopyElementTextContent,
    InsertToField,
    SetSelectionBefore,
    SetSelectionAfter,
    FocusAndDeleteContents,
    ScrollUpAtElement,
    ScrollDownAtElement,
    ScrollLeftAtElement,
    ScrollRightAtElement,
    ScrollElementToTop,
    ScrollElementToBottom,
    ScrollElementToCenter,
    IncludeExtraSelectors,
    ExcludeExtraSelectors,

    // Untargeted, executed in the main frame of the current tab
    UnhoverAll,
    ScrollUpPage,
    ScrollDownPage,

    // Tab, window and settings commands handled by the coordinator alone
    ToggleHints,
    EnableHints,
    DisableHints,
    ResetToggleLevel,
    ToggleKeyboardClicking,
    IncludeSingleLetterHints,
    ExcludeSingleLetterHints,
    IncreaseHintSize,
    DecreaseHintSize,
    SetHintStyle,
    SetHintWeight,
    EnableUrlInTitle,
    DisableUrlInTitle,
    CloseOtherTabsInWindow,
    CloseTabsToTheLeftInWindow,
    CloseTabsToTheRightInWindow,
    CloseTabsLeftEndInWindow,
    CloseTabsRightEndInWindow,
    ClosePreviousTabsInWindow,
    CloseNextTabsInWindow,
    CloneCurrentTab,
    MoveCurrentTabToNewWindow,
    GetCurrentTabUrl,
    CopyCurrentTabMarkdownUrl,

    #[serde(other)]
    Unknown,
}

/// How many of the resolved wrappers an action operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    First,
    All,
}

impl ActionKind {
    /// Handled by the coordinating process without touching any document.
    pub fn is_background(self) -> bool {
        use ActionKind::*;
        matches!(
            self,
            ToggleHints
                | EnableHints
                | DisableHints
                | ResetToggleLevel
                | ToggleKeyboardClicking
                | IncludeSingleLetterHints
                | ExcludeSingleLetterHints
                | IncreaseHintSize
                | DecreaseHintSize
                | SetHintStyle
                | SetHintWeight
                | EnableUrlInTitle
                | DisableUrlInTitle
                | CloseOtherTabsInWindow
                | CloseTabsToTheLeftInWindow
                | CloseTabsToTheRightInWindow
                | CloseTabsLeftEndInWindow
                | CloseTabsRightEndInWindow
                | ClosePreviousTabsInWindow
                | CloseNextTabsInWindow
                | CloneCurrentTab
                | MoveCurrentTabToNewWindow
                | GetCurrentTabUrl
                | CopyCurrentTabMarkdownUrl
        )
    }

    /// Runs in the main frame and needs no target.
    pub fn is_untargeted_content(self) -> bool {
        matches!(self, ActionKind::UnhoverAll | ActionKind::ScrollUpPage | ActionKind::ScrollDownPage)
    }

    pub fn target_mode(self) -> TargetMode {
        use ActionKind::*;
        match self {
            SetSelectionBefore
            | SetSelectionAfter
            | FocusAndDeleteContents
            | ScrollUpAtElement
            | ScrollDownAtElement
            | ScrollLeftAtElement
            | ScrollRightAtElement
            | ScrollElementToTop
            | ScrollElementToBottom
            | ScrollElementToCenter => TargetMode::First,
            _ => TargetMode::All,
        }
    }
}

/// One label or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    One(HintLabel),
    Many(Vec<HintLabel>),
}

impl Target {
    pub fn labels(&self) -> Vec<HintLabel> {
        match self {
            Target::One(label) => vec![label.clone()],
            Target::Many(labels) => labels.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Target::One(_) => 1,
            Target::Many(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionArg {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: ActionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<ActionArg>,
}

impl ActionRequest {
    pub fn new(kind: ActionKind) -> Self {
        ActionRequest {
            kind,
            target: None,
            arg: None,
        }
    }

    pub fn with_target(mut self, labels: &[&str]) -> Self {
        self.target = Some(match labels {
            [one] => Target::One(HintLabel::from(*one)),
            many => Target::Many(many.iter().map(|l| HintLabel::from(*l)).collect()),
        });
        self
    }

    pub fn with_arg(mut self, arg: ActionArg) -> Self {
        self.arg = Some(arg);
        self
    }

    pub fn labels(&self) -> Vec<HintLabel> {
        self.target.as_ref().map(Target::labels).unwrap_or_default()
    }

    pub fn arg_number(&self) -> Option<f64> {
        match &self.arg {
            Some(ActionArg::Number(n)) => Some(*n),
            Some(ActionArg::Text(t)) => t.trim().parse().ok(),
            None => None,
        }
    }

    pub fn arg_text(&self) -> Option<&str> {
        match &self.arg {
            Some(ActionArg::Text(t)) => Some(t),
            _ => None,
        }
    }
}

/// Side effects the controller performs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum ControllerInstruction {
    /// Type the spoken target as literal characters
    TypeTargetCharacters,
}

/// Outcome of one action in one context, before it is shaped into a
/// controller response.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActionResult {
    #[default]
    NoAction,
    /// Executed with no value to relay
    Done,
    TextRetrieved(String),
    CopyToClipboard(String),
    Instructions(Vec<ControllerInstruction>),
}

impl ActionResult {
    pub fn type_target_characters() -> Self {
        ActionResult::Instructions(vec![ControllerInstruction::TypeTargetCharacters])
    }

    pub fn is_no_action(&self) -> bool {
        matches!(self, ActionResult::NoAction)
    }

    /// Combine the answers of several frames. Clipboard text is joined with
    /// newlines, the first retrieved text wins, instructions accumulate and
    /// `Done` beats `NoAction`.
    pub fn merge(results: Vec<ActionResult>) -> ActionResult {
        let mut copies: Vec<String> = Vec::new();
        let mut text: Option<String> = None;
        let mut instructions: Vec<ControllerInstruction> = Vec::new();
        let mut done = false;

        for result in results {
            match result {
                ActionResult::NoAction => {}
                ActionResult::Done => done = true,
                ActionResult::TextRetrieved(t) => {
                    text.get_or_insert(t);
                }
                ActionResult::CopyToClipboard(t) => copies.push(t),
                ActionResult::Instructions(i) => instructions.extend(i),
            }
        }

        if !copies.is_empty() {
            ActionResult::CopyToClipboard(copies.join("\n"))
        } else if let Some(text) = text {
            ActionResult::TextRetrieved(text)
        } else if !instructions.is_empty() {
            ActionResult::Instructions(instructions)
        } else if done {
            ActionResult::Done
        } else {
            ActionResult::NoAction
        }
    }
}
