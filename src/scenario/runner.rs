use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::Settings;
use crate::context::messages::{FrameId, TabId};
use crate::coordinator::coordinator::Coordinator;
use crate::coordinator::notify::TracingNotifier;
use crate::coordinator::store::MemoryStackStore;
use crate::coordinator::tabs::MemoryTabs;
use crate::dom::document::{Document, NodeId};
use crate::error::{ChannelError, ScenarioError};
use crate::protocol::{RequestFromController, ResponseToController};
use crate::scenario::scenario_model::{CheckResult, Scenario, ScenarioResult, ScenarioStep};

/// Checks and controller responses collected while a scenario replays.
#[derive(Debug, Default)]
struct ReplayLog {
    checks: Vec<CheckResult>,
    responses: Vec<ResponseToController>,
}

impl ReplayLog {
    fn check(&mut self, step_index: usize, passed: bool, actual: String, failure: impl FnOnce() -> String) {
        self.checks.push(CheckResult {
            step_index,
            passed,
            actual: Some(actual),
            message: if passed { None } else { Some(failure()) },
        });
    }

    fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    fn into_result(self, scenario: &Scenario, steps_run: usize, error: Option<String>) -> ScenarioResult {
        ScenarioResult {
            scenario_name: scenario.name.clone(),
            passed: error.is_none() && self.all_passed(),
            steps_run,
            checks: self.checks,
            responses: self.responses,
            error,
        }
    }
}

/// Replays a [`Scenario`] against an in-process coordinator with in-memory
/// tabs and hint stacks.
pub struct ScenarioRunner;

impl ScenarioRunner {
    /// Load the scenario's pages, then run each step, letting every frame
    /// settle in between. `defaults` applies when the scenario carries no
    /// settings of its own.
    pub async fn run(scenario: &Scenario, defaults: &Settings) -> ScenarioResult {
        let settings = scenario.settings.clone().unwrap_or_else(|| defaults.clone());
        let settle_timeout = settings.reply_timeout();
        let tabs = Arc::new(MemoryTabs::new());
        let coordinator = Coordinator::spawn(
            settings,
            Arc::new(MemoryStackStore::new()),
            tabs.clone(),
            Arc::new(TracingNotifier),
        );
        let mut log = ReplayLog::default();

        if let Err(e) = Self::load_tabs(scenario, &coordinator, &tabs) {
            return log.into_result(scenario, 0, Some(format!("Failed to load pages: {}", e)));
        }
        coordinator.settle(settle_timeout).await;
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "replaying scenario");

        for (i, step) in scenario.steps.iter().enumerate() {
            if let Err(e) = Self::execute_step(step, i, &coordinator, &tabs, &mut log).await {
                Self::shutdown(&coordinator);
                return log.into_result(scenario, i + 1, Some(format!("Step {} failed: {}", i, e)));
            }
            coordinator.settle(settle_timeout).await;
        }

        Self::shutdown(&coordinator);
        log.into_result(scenario, scenario.steps.len(), None)
    }

    fn load_tabs(scenario: &Scenario, coordinator: &Coordinator, tabs: &MemoryTabs) -> Result<(), ScenarioError> {
        for tab_def in &scenario.tabs {
            let tab = tabs.open(&tab_def.url, &tab_def.title)?;
            for frame in &tab_def.frames {
                let url = frame.url.as_deref().unwrap_or(&tab_def.url);
                let mut doc = Document::new(url, &tab_def.title);
                if let Some([width, height]) = frame.viewport {
                    doc.set_viewport_size(width, height);
                }
                doc.set_has_focus(frame.has_focus);
                let body = doc.body();
                for tree in &frame.elements {
                    doc.append_tree(body, tree)?;
                }
                coordinator.open_frame(tab, frame.frame, doc);
            }
        }
        Ok(())
    }

    fn shutdown(coordinator: &Coordinator) {
        for handle in coordinator.all_frames() {
            if let Err(e) = handle.shutdown() {
                debug!(error = %e, "frame already closed");
            }
        }
    }

    /// Execute a single step.
    async fn execute_step(
        step: &ScenarioStep,
        step_index: usize,
        coordinator: &Coordinator,
        tabs: &MemoryTabs,
        log: &mut ReplayLog,
    ) -> Result<(), ScenarioError> {
        match step {
            ScenarioStep::Request { action, expect } => {
                let response = coordinator
                    .handle_request(RequestFromController::new(action.clone()))
                    .await;
                if let Some(expected) = expect {
                    log.check(step_index, response == *expected, response.to_json(), || {
                        format!("Expected response {}", expected.to_json())
                    });
                }
                log.responses.push(response);
                Ok(())
            }

            ScenarioStep::ScrollViewport { tab, frame, x, y } => {
                let (x, y) = (*x, *y);
                with_document(coordinator, *tab, *frame, move |doc| {
                    doc.scroll_viewport_to(x, y);
                    Ok(())
                })
                .await
            }

            ScenarioStep::RemoveElement { tab, frame, id } => {
                let id = id.clone();
                with_document(coordinator, *tab, *frame, move |doc| {
                    let node = find(doc, &id)?;
                    doc.remove(node)?;
                    Ok(())
                })
                .await
            }

            ScenarioStep::AppendElement {
                tab,
                frame,
                parent,
                element,
            } => {
                let (parent, element) = (parent.clone(), element.clone());
                with_document(coordinator, *tab, *frame, move |doc| {
                    let parent = match parent {
                        Some(id) => find(doc, &id)?,
                        None => doc.body(),
                    };
                    doc.append_tree(parent, &element)?;
                    Ok(())
                })
                .await
            }

            ScenarioStep::SetAttribute {
                tab,
                frame,
                id,
                name,
                value,
            } => {
                let (id, name, value) = (id.clone(), name.clone(), value.clone());
                with_document(coordinator, *tab, *frame, move |doc| {
                    let node = find(doc, &id)?;
                    doc.set_attribute(node, &name, &value)?;
                    Ok(())
                })
                .await
            }

            ScenarioStep::CloseFrame { tab, frame } => {
                coordinator.close_frame(*tab, *frame)?;
                Ok(())
            }

            ScenarioStep::ActivateTab { tab } => {
                tabs.activate(*tab)?;
                Ok(())
            }

            ScenarioStep::ExpectLabels { tab, frame, labels } => {
                let in_use = coordinator.labels_in_use(*tab).await;
                let mut expected = labels.clone();
                expected.sort();
                match in_use.get(frame) {
                    Some(actual) => {
                        let shown: Vec<&str> = actual.iter().map(|l| l.as_str()).collect();
                        log.check(step_index, *actual == expected, shown.join(","), || {
                            let wanted: Vec<&str> = expected.iter().map(|l| l.as_str()).collect();
                            format!("Frame {}:{} shows different labels than [{}]", tab, frame, wanted.join(","))
                        });
                    }
                    None => log.check(step_index, false, "frame not loaded".to_string(), || {
                        format!("Frame {}:{} did not answer", tab, frame)
                    }),
                }
                Ok(())
            }

            ScenarioStep::ExpectAssigned { tab, count } => {
                let assigned = coordinator.snapshot(*tab).await.assigned.len();
                log.check(step_index, assigned == *count, assigned.to_string(), || {
                    format!("Expected {} assigned labels in tab {}", count, tab)
                });
                Ok(())
            }

            ScenarioStep::ExpectTabCount { count } => {
                let open = tabs.tabs()?.len();
                log.check(step_index, open == *count, open.to_string(), || {
                    format!("Expected {} open tabs", count)
                });
                Ok(())
            }
        }
    }
}

fn find(doc: &Document, id: &str) -> Result<NodeId, ScenarioError> {
    doc.find_by_id(id)
        .ok_or_else(|| ScenarioError::UnknownElement(id.to_string()))
}

/// Run `change` on the frame's own turn and wait for it to finish.
async fn with_document<F>(coordinator: &Coordinator, tab: TabId, frame: FrameId, change: F) -> Result<(), ScenarioError>
where
    F: FnOnce(&mut Document) -> Result<(), ScenarioError> + Send + 'static,
{
    let handle = coordinator
        .frame(tab, frame)
        .ok_or(ScenarioError::UnknownFrame { tab, frame })?;
    let (tx, rx) = oneshot::channel();
    handle.mutate(move |doc| {
        let _ = tx.send(change(doc));
    })?;
    rx.await.map_err(|_| ChannelError::Closed { tab, frame })?
}
