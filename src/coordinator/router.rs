use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::{HintStyle, HintWeight};
use crate::context::messages::{ContextReply, ContextRequest, FrameId, NotifyLevel, TabId, MAIN_FRAME};
use crate::coordinator::coordinator::Coordinator;
use crate::coordinator::tabs::{tabs_to_close, CloseScope, TabInfo};
use crate::dispatch::action::{ActionKind, ActionRequest, ActionResult, Target, TargetMode};
use crate::dispatch::resolve::unresolved_result;
use crate::error::TabError;
use crate::hints::label::HintLabel;
use crate::protocol::{parse_request, RequestFromController, ResponseToController};

/// Which level a hints toggle applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToggleLevel {
    Global,
    Tab,
}

fn toggle_level(request: &ActionRequest) -> ToggleLevel {
    match request.arg_text() {
        Some("tab") => ToggleLevel::Tab,
        _ => ToggleLevel::Global,
    }
}

fn count_arg(request: &ActionRequest) -> usize {
    request.arg_number().map(|n| n.max(1.0) as usize).unwrap_or(1)
}

/// `[title](url)`, with a " - url" suffix some pages add to the title removed.
pub fn markdown_url(tab: &TabInfo) -> Option<String> {
    if tab.url.is_empty() || tab.title.is_empty() {
        return None;
    }
    let title = tab.title.replace(&format!(" - {}", tab.url), "");
    Some(format!("[{}]({})", title, tab.url))
}

impl Coordinator {
    /// Raw JSON in, raw JSON out. Malformed requests get "no action".
    pub async fn handle_json(&self, json: &str) -> String {
        match parse_request(json) {
            Ok(request) => self.handle_request(request).await.to_json(),
            Err(e) => {
                warn!(error = %e, "malformed controller request");
                ResponseToController::no_action().to_json()
            }
        }
    }

    pub async fn handle_request(&self, request: RequestFromController) -> ResponseToController {
        let mut action = request.action;

        if action.kind == ActionKind::DirectClickElement {
            // Several labels cannot be a word somebody meant to type.
            if action.target.as_ref().is_some_and(|t| t.len() > 1) {
                action.kind = ActionKind::ClickElement;
            } else if !self.has_focused_document().await {
                debug!("no document context answered the focus check");
                return unresolved_result(&action).into();
            }
        }

        self.dispatch(action).await.into()
    }

    /// True when some frame of the current tab answered the focus check.
    async fn has_focused_document(&self) -> bool {
        let Ok(tab) = self.shared.tab_api.current_tab() else {
            return false;
        };
        !self
            .broadcast(tab.id, ContextRequest::CheckDocumentFocus)
            .await
            .is_empty()
    }

    /// Route one action: background commands run here, everything else goes
    /// to the frames that own the named labels.
    pub async fn dispatch(&self, action: ActionRequest) -> ActionResult {
        if action.kind == ActionKind::Unknown {
            return ActionResult::NoAction;
        }
        if action.kind.is_background() {
            return match self.run_background_command(&action).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(kind = ?action.kind, error = %e, "background command failed");
                    self.shared.notifier.notify(&e.to_string(), NotifyLevel::Error);
                    ActionResult::NoAction
                }
            };
        }

        let tab = match self.shared.tab_api.current_tab() {
            Ok(tab) => tab,
            Err(e) => {
                debug!(error = %e, "no tab to route to");
                return unresolved_result(&action);
            }
        };

        if action.kind.is_untargeted_content() {
            return self.send_action(tab.id, MAIN_FRAME, action).await.unwrap_or_default();
        }

        self.dispatch_targeted(tab.id, action).await
    }

    async fn send_action(&self, tab: TabId, frame: FrameId, action: ActionRequest) -> Option<ActionResult> {
        let handle = self.frame(tab, frame)?;
        match handle.request(ContextRequest::Action(action), self.reply_timeout()).await {
            Ok(ContextReply::Action(result)) => Some(result),
            Ok(other) => {
                warn!(tab, frame, reply = ?other, "unexpected reply to action");
                None
            }
            Err(e) => {
                debug!(tab, frame, error = %e, "action round trip failed");
                None
            }
        }
    }

    /// Group labels by owning frame, ask each owner, merge the answers.
    async fn dispatch_targeted(&self, tab: TabId, action: ActionRequest) -> ActionResult {
        let labels = action.labels();
        let snapshot = self.snapshot(tab).await;
        let owner_of = |label: &HintLabel| {
            snapshot
                .assigned
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, frame)| *frame)
        };

        let mut by_frame: BTreeMap<FrameId, Vec<HintLabel>> = BTreeMap::new();
        let mut first_owner: Option<FrameId> = None;
        for label in &labels {
            match owner_of(label) {
                Some(frame) => {
                    first_owner.get_or_insert(frame);
                    by_frame.entry(frame).or_default().push(label.clone());
                }
                None => debug!(tab, %label, "label is not assigned to any frame"),
            }
        }

        if action.kind.target_mode() == TargetMode::First {
            by_frame.retain(|frame, _| Some(*frame) == first_owner);
        }
        if by_frame.is_empty() {
            return unresolved_result(&action);
        }

        let mut results = Vec::with_capacity(by_frame.len());
        let mut answered = false;
        for (frame, frame_labels) in by_frame {
            let mut scoped = action.clone();
            scoped.target = Some(Target::Many(frame_labels));
            if let Some(result) = self.send_action(tab, frame, scoped).await {
                answered = true;
                results.push(result);
            }
        }

        if !answered {
            return unresolved_result(&action);
        }
        ActionResult::merge(results)
    }

    async fn run_background_command(&self, action: &ActionRequest) -> Result<ActionResult, TabError> {
        let api = self.shared.tab_api.clone();
        info!(kind = ?action.kind, "background command");

        match action.kind {
            ActionKind::ToggleHints => {
                self.update_settings(|s| s.hints_enabled = !s.hints_enabled);
                self.refresh_all().await;
            }
            ActionKind::EnableHints | ActionKind::DisableHints => {
                let enabled = action.kind == ActionKind::EnableHints;
                match toggle_level(action) {
                    ToggleLevel::Global => self.update_settings(|s| s.hints_enabled = enabled),
                    ToggleLevel::Tab => {
                        let tab = api.current_tab()?.id;
                        self.update_settings(|s| {
                            s.hints_enabled_tabs.insert(tab, enabled);
                        });
                    }
                }
                self.refresh_all().await;
            }
            ActionKind::ResetToggleLevel => {
                match toggle_level(action) {
                    ToggleLevel::Global => self.update_settings(|s| s.hints_enabled = true),
                    ToggleLevel::Tab => {
                        let tab = api.current_tab()?.id;
                        self.update_settings(|s| {
                            s.hints_enabled_tabs.remove(&tab);
                        });
                    }
                }
                self.refresh_all().await;
            }
            ActionKind::ToggleKeyboardClicking => {
                self.update_settings(|s| s.keyboard_clicking = !s.keyboard_clicking);
                let enabled = self.settings().keyboard_clicking;
                // Nothing is typed any more, so no label stays marked.
                if !enabled {
                    if let Ok(tab) = api.current_tab() {
                        self.restore_keyboard_reachable(tab.id).await;
                    }
                }
                let state = if enabled { "enabled" } else { "disabled" };
                self.shared
                    .notifier
                    .notify(&format!("Keyboard clicking {state}"), NotifyLevel::Info);
            }
            ActionKind::IncludeSingleLetterHints | ActionKind::ExcludeSingleLetterHints => {
                let include = action.kind == ActionKind::IncludeSingleLetterHints;
                self.update_settings(|s| s.include_single_letter_hints = include);
                self.reset_stacks().await;
                self.refresh_all().await;
            }
            ActionKind::IncreaseHintSize => {
                self.update_settings(|s| s.hint_font_size += 1);
                self.refresh_all().await;
            }
            ActionKind::DecreaseHintSize => {
                self.update_settings(|s| s.hint_font_size = s.hint_font_size.saturating_sub(1).max(1));
                self.refresh_all().await;
            }
            ActionKind::SetHintStyle => {
                let style = match action.arg_text() {
                    Some("subtle") => HintStyle::Subtle,
                    _ => HintStyle::Boxed,
                };
                self.update_settings(|s| s.hint_style = style);
                self.refresh_all().await;
            }
            ActionKind::SetHintWeight => {
                let weight = match action.arg_text() {
                    Some("normal") => HintWeight::Normal,
                    Some("bold") => HintWeight::Bold,
                    _ => HintWeight::Auto,
                };
                self.update_settings(|s| s.hint_weight = weight);
                self.refresh_all().await;
            }
            ActionKind::EnableUrlInTitle | ActionKind::DisableUrlInTitle => {
                let enabled = action.kind == ActionKind::EnableUrlInTitle;
                self.update_settings(|s| s.url_in_title = enabled);
            }
            ActionKind::CloseOtherTabsInWindow
            | ActionKind::CloseTabsToTheLeftInWindow
            | ActionKind::CloseTabsToTheRightInWindow
            | ActionKind::CloseTabsLeftEndInWindow
            | ActionKind::CloseTabsRightEndInWindow
            | ActionKind::ClosePreviousTabsInWindow
            | ActionKind::CloseNextTabsInWindow => {
                let n = count_arg(action);
                let scope = match action.kind {
                    ActionKind::CloseOtherTabsInWindow => CloseScope::Other,
                    ActionKind::CloseTabsToTheLeftInWindow => CloseScope::Left,
                    ActionKind::CloseTabsToTheRightInWindow => CloseScope::Right,
                    ActionKind::CloseTabsLeftEndInWindow => CloseScope::LeftEnd(n),
                    ActionKind::CloseTabsRightEndInWindow => CloseScope::RightEnd(n),
                    ActionKind::ClosePreviousTabsInWindow => CloseScope::Previous(n),
                    _ => CloseScope::Next(n),
                };
                let current = api.current_tab()?;
                let window_tabs = api.tabs_in_window(current.window)?;
                let doomed = tabs_to_close(&window_tabs, current.id, scope);
                api.close(&doomed)?;
                self.forget_tabs(&doomed);
            }
            ActionKind::CloneCurrentTab => {
                let current = api.current_tab()?;
                api.duplicate(current.id)?;
            }
            ActionKind::MoveCurrentTabToNewWindow => {
                let current = api.current_tab()?;
                api.move_to_new_window(current.id)?;
            }
            ActionKind::GetCurrentTabUrl => {
                let current = api.current_tab()?;
                if current.url.is_empty() {
                    return Ok(ActionResult::NoAction);
                }
                return Ok(ActionResult::TextRetrieved(current.url));
            }
            ActionKind::CopyCurrentTabMarkdownUrl => {
                let current = api.current_tab()?;
                return Ok(markdown_url(&current)
                    .map(ActionResult::CopyToClipboard)
                    .unwrap_or_default());
            }
            _ => return Ok(ActionResult::NoAction),
        }

        Ok(ActionResult::Done)
    }
}
