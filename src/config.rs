use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::messages::TabId;

/// Custom include/exclude selector lists for one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomSelectors {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintWeight {
    #[default]
    Auto,
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintStyle {
    #[default]
    Boxed,
    Subtle,
}

/// Global settings shared by the coordinating process and every document
/// context. Rendering-only fields are carried so the controller can adjust
/// them, but nothing in this crate draws badges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_hint_letters")]
    pub hint_letters: String,

    #[serde(default)]
    pub include_single_letter_hints: bool,

    #[serde(default = "default_true")]
    pub hints_enabled: bool,

    /// Per-tab overrides of `hints_enabled`
    #[serde(default)]
    pub hints_enabled_tabs: HashMap<TabId, bool>,

    #[serde(default = "default_font_size")]
    pub hint_font_size: u32,

    #[serde(default)]
    pub hint_weight: HintWeight,

    #[serde(default)]
    pub hint_style: HintStyle,

    #[serde(default)]
    pub keyboard_clicking: bool,

    #[serde(default = "default_true")]
    pub url_in_title: bool,

    /// Fraction of the scroll container's client size moved per scroll step
    #[serde(default = "default_scroll_factor")]
    pub scroll_factor: f64,

    /// Upper bound on any cross-context round trip
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Host -> custom selectors
    #[serde(default)]
    pub custom_selectors: HashMap<String, CustomSelectors>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            hint_letters: default_hint_letters(),
            include_single_letter_hints: false,
            hints_enabled: true,
            hints_enabled_tabs: HashMap::new(),
            hint_font_size: default_font_size(),
            hint_weight: HintWeight::Auto,
            hint_style: HintStyle::Boxed,
            keyboard_clicking: false,
            url_in_title: true,
            scroll_factor: default_scroll_factor(),
            reply_timeout_ms: default_reply_timeout_ms(),
            custom_selectors: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn hints_enabled_for(&self, tab: TabId) -> bool {
        self.hints_enabled_tabs
            .get(&tab)
            .copied()
            .unwrap_or(self.hints_enabled)
    }

    pub fn selectors_for(&self, host: &str) -> CustomSelectors {
        self.custom_selectors.get(host).cloned().unwrap_or_default()
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

// Serde default helpers
fn default_hint_letters() -> String { "abcdefghijklmnopqrstuvwxyz".to_string() }
fn default_true() -> bool { true }
fn default_font_size() -> u32 { 10 }
fn default_scroll_factor() -> f64 { 0.66 }
fn default_reply_timeout_ms() -> u64 { 3000 }
