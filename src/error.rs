use thiserror::Error;

use crate::context::messages::{FrameId, TabId};
use crate::dom::document::NodeId;

#[derive(Debug, Error)]
pub enum DomError {
    /// Node id was never allocated by this document
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Appending would make a node its own ancestor
    #[error("cannot append {child:?} under {parent:?}: would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    /// Selector text outside the supported compound grammar
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),
}

/// Failure of a single effect handler. Always converted to a notification
/// plus a "no action" reply at the dispatch boundary.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("element {0:?} is not an editable field")]
    NotEditable(NodeId),

    #[error("none of the targets can receive focus")]
    NotFocusable,

    #[error("none of the targets is a link")]
    NoLink,

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The other side of a context channel has gone away
    #[error("document context {tab}:{frame} is closed")]
    Closed { tab: TabId, frame: FrameId },

    #[error("document context {tab}:{frame} did not answer '{request}' within {timeout_ms}ms")]
    Timeout {
        tab: TabId,
        frame: FrameId,
        request: String,
        timeout_ms: u64,
    },

    #[error("tab {0} has no document context")]
    NoFrames(TabId),
}

#[derive(Debug, Error)]
pub enum TabError {
    #[error("unknown tab {0}")]
    UnknownTab(TabId),

    #[error("no active tab")]
    NoActiveTab,

    #[error("tab registry lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("hint stack store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("hint stack store JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hint stack store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse scenario '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("scenario references unknown frame {tab}:{frame}")]
    UnknownFrame { tab: TabId, frame: FrameId },

    #[error("scenario references unknown element '#{0}'")]
    UnknownElement(String),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Tab(#[from] TabError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_timeout_names_the_request() {
        let err = ChannelError::Timeout {
            tab: 3,
            frame: 1,
            request: "reclaimHints".into(),
            timeout_ms: 3000,
        };
        let text = err.to_string();
        assert!(text.contains("3:1"));
        assert!(text.contains("reclaimHints"));
    }

    #[test]
    fn effect_error_wraps_dom_error() {
        let err: EffectError = DomError::UnknownNode(NodeId(7)).into();
        assert!(err.to_string().contains("unknown node"));
    }
}
