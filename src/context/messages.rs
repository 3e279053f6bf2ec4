use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::CustomSelectors;
use crate::dispatch::action::{ActionRequest, ActionResult};
use crate::dom::document::Document;
use crate::hints::label::HintLabel;
use crate::hints::pool::HintPoolSnapshot;

pub type TabId = u32;
pub type FrameId = u32;

/// The top-level document of a tab is always frame 0.
pub const MAIN_FRAME: FrameId = 0;

/// Matches a claim or snapshot reply to the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Fire-and-forget messages a document context sends to the coordinating
/// process. Anything that needs an answer carries a correlation id and is
/// answered with a `ContextEvent`.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameMessage {
    /// Make sure the tab has a stack and drop whatever an earlier document
    /// in this frame still held
    InitStack,
    ClaimHints { correlation: CorrelationId, amount: usize },
    /// Ask sibling frames to give up off-screen labels
    ReclaimFromOthers { correlation: CorrelationId, amount: usize },
    ReleaseHints { labels: Vec<HintLabel> },
    GetPoolSnapshot { correlation: CorrelationId },
    OpenTabs { urls: Vec<String>, active: bool },
    Notify { text: String, level: NotifyLevel },
    /// The host's custom selector lists changed in this frame
    StoreCustomSelectors { host: String, selectors: CustomSelectors },
    Unloaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameEnvelope {
    pub tab: TabId,
    pub frame: FrameId,
    pub message: FrameMessage,
}

/// Requests the coordinating process sends to a context and waits on.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextRequest {
    Action(ActionRequest),
    ReclaimHints { amount: usize },
    FullHintsRefresh { enabled: bool, selectors: CustomSelectors },
    MarkKeyboardReachable { letter: char },
    RestoreKeyboardReachable,
    CheckDocumentFocus,
    GetLabelsInUse,
    /// Ask the context to fetch the current tab stack from the coordinator.
    RefreshPoolSnapshot,
    GetStatus,
}

impl ContextRequest {
    /// Name used in logs and timeout errors.
    pub fn name(&self) -> &'static str {
        match self {
            ContextRequest::Action(_) => "action",
            ContextRequest::ReclaimHints { .. } => "reclaimHints",
            ContextRequest::FullHintsRefresh { .. } => "fullHintsRefresh",
            ContextRequest::MarkKeyboardReachable { .. } => "markHintsAsKeyboardReachable",
            ContextRequest::RestoreKeyboardReachable => "restoreKeyboardReachableHints",
            ContextRequest::CheckDocumentFocus => "checkIfDocumentHasFocus",
            ContextRequest::GetLabelsInUse => "getHintStringsInUse",
            ContextRequest::RefreshPoolSnapshot => "getHintsStack",
            ContextRequest::GetStatus => "getStatus",
        }
    }
}

/// What a context knows about itself; used by the scenario runner to wait
/// until allocation settles.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextStatus {
    pub labels: Vec<HintLabel>,
    pub pending_claims: usize,
    pub tracked: usize,
    pub keyboard_reachable: usize,
    /// A stack snapshot was asked for and has not arrived yet
    pub snapshot_pending: bool,
    pub pool_snapshot: Option<HintPoolSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextReply {
    Action(ActionResult),
    Labels(Vec<HintLabel>),
    Focus(bool),
    Status(ContextStatus),
    Done,
}

/// A change the host page makes to the document, applied on the context's
/// own turn.
pub type HostMutation = Box<dyn FnOnce(&mut Document) + Send>;

/// Everything that can land on a context's event queue.
pub enum ContextEvent {
    Request {
        request: ContextRequest,
        reply: oneshot::Sender<ContextReply>,
    },
    ClaimReply {
        correlation: CorrelationId,
        labels: Vec<HintLabel>,
    },
    PoolSnapshot {
        correlation: CorrelationId,
        snapshot: HintPoolSnapshot,
    },
    Host(HostMutation),
    Shutdown,
}

impl fmt::Debug for ContextEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextEvent::Request { request, .. } => f.debug_struct("Request").field("request", request).finish(),
            ContextEvent::ClaimReply { correlation, labels } => f
                .debug_struct("ClaimReply")
                .field("correlation", correlation)
                .field("labels", labels)
                .finish(),
            ContextEvent::PoolSnapshot { correlation, .. } => f
                .debug_struct("PoolSnapshot")
                .field("correlation", correlation)
                .finish_non_exhaustive(),
            ContextEvent::Host(_) => f.write_str("Host(..)"),
            ContextEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}
