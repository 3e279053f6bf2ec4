use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::context::messages::{FrameId, TabId};
use crate::dispatch::action::ActionRequest;
use crate::dom::document::ElementTree;
use crate::hints::label::HintLabel;
use crate::protocol::ResponseToController;

/// A scripted session: pages to load, then controller requests and page
/// changes with expectations. Deserialized from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    /// Human-readable name for this scenario
    pub name: String,

    /// Overrides the settings from the config file
    #[serde(default)]
    pub settings: Option<Settings>,

    /// Tabs to open, in order. The first gets id 1; the last one opened is active.
    pub tabs: Vec<TabSpec>,

    /// Ordered list of steps to execute
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabSpec {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub frames: Vec<FrameSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSpec {
    #[serde(default)]
    pub frame: FrameId,

    /// Defaults to the tab's url
    #[serde(default)]
    pub url: Option<String>,

    /// `[width, height]`; defaults to 1280x720
    #[serde(default)]
    pub viewport: Option<[f64; 2]>,

    /// Focus state reported to the direct-click check
    #[serde(default = "default_true")]
    pub has_focus: bool,

    /// Children of `<body>`
    #[serde(default)]
    pub elements: Vec<ElementTree>,
}

fn default_true() -> bool { true }
fn default_tab() -> TabId { 1 }

/// A single step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Send a controller request; optionally check the response
    Request {
        action: ActionRequest,
        #[serde(default)]
        expect: Option<ResponseToController>,
    },

    /// Move a frame's viewport to an absolute scroll position
    ScrollViewport {
        #[serde(default = "default_tab")]
        tab: TabId,
        #[serde(default)]
        frame: FrameId,
        #[serde(default)]
        x: f64,
        y: f64,
    },

    /// Detach the element with this id
    RemoveElement {
        #[serde(default = "default_tab")]
        tab: TabId,
        #[serde(default)]
        frame: FrameId,
        id: String,
    },

    /// Append an element subtree under `parent` (an element id) or `<body>`
    AppendElement {
        #[serde(default = "default_tab")]
        tab: TabId,
        #[serde(default)]
        frame: FrameId,
        #[serde(default)]
        parent: Option<String>,
        element: ElementTree,
    },

    /// Set an attribute on the element with this id
    SetAttribute {
        #[serde(default = "default_tab")]
        tab: TabId,
        #[serde(default)]
        frame: FrameId,
        id: String,
        name: String,
        value: String,
    },

    /// Unload a frame
    CloseFrame {
        #[serde(default = "default_tab")]
        tab: TabId,
        frame: FrameId,
    },

    ActivateTab {
        tab: TabId,
    },

    /// Labels displayed in a frame, in any order
    ExpectLabels {
        #[serde(default = "default_tab")]
        tab: TabId,
        #[serde(default)]
        frame: FrameId,
        labels: Vec<HintLabel>,
    },

    /// Number of labels the tab's stack has handed out
    ExpectAssigned {
        #[serde(default = "default_tab")]
        tab: TabId,
        count: usize,
    },

    /// Number of tabs left in the strip
    ExpectTabCount {
        count: usize,
    },
}

/// Result of evaluating a single expectation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    /// Which step this check belongs to (0-indexed)
    pub step_index: usize,

    pub passed: bool,

    /// Actual value found (for debugging failed checks)
    pub actual: Option<String>,

    /// Human-readable failure message
    pub message: Option<String>,
}

/// Result of replaying a complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,

    /// Whether every step ran and every check passed
    pub passed: bool,

    pub steps_run: usize,

    pub checks: Vec<CheckResult>,

    /// Controller responses, one per request step
    pub responses: Vec<ResponseToController>,

    /// Error message if a step could not run (not a failed check)
    pub error: Option<String>,
}

impl ScenarioResult {
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}
