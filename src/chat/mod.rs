//! Combat-log mark classification
//!
//! The chat reader hands over recognised log text; this module decides
//! whether it reports a landed mark, a failed mark, or a target that was
//! already marked, and turns that into the controller's mark state.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Mark outcome recognised in the combat log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    Marked,
    MarkFailed,
    AlreadyMarked,
}

impl MarkOutcome {
    /// `(is_marked, finish_available)` to report to the controller
    pub fn mark_state(&self) -> (bool, bool) {
        match self {
            MarkOutcome::Marked | MarkOutcome::AlreadyMarked => (true, true),
            MarkOutcome::MarkFailed => (false, false),
        }
    }
}

/// Phrases that identify each outcome, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkPhrases {
    #[serde(alias = "spoiled")]
    pub marked: Vec<String>,
    #[serde(alias = "not_spoiled")]
    pub mark_failed: Vec<String>,
    #[serde(alias = "already_spoiled")]
    pub already_marked: Vec<String>,
}

impl Default for MarkPhrases {
    fn default() -> Self {
        Self {
            marked: vec![
                "you use: spoil".into(),
                "вы используете: spoil".into(),
                "умение \"оценить\" активировано".into(),
            ],
            mark_failed: vec![
                "spoil failed".into(),
                "спойл не удался".into(),
                "не удалось".into(),
            ],
            already_marked: vec![
                "target is already spoiled".into(),
                "цель уже оценена".into(),
            ],
        }
    }
}

impl MarkPhrases {
    /// Load phrases from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save phrases as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Classifies combat-log text into mark outcomes
#[derive(Debug, Clone, Default)]
pub struct ChatClassifier {
    phrases: MarkPhrases,
    last_outcome: Option<MarkOutcome>,
}

impl ChatClassifier {
    pub fn new(phrases: MarkPhrases) -> Self {
        Self {
            phrases,
            last_outcome: None,
        }
    }

    /// Classify one block of recognised text
    ///
    /// Outcomes are checked in priority order: marked, failed, already marked.
    pub fn classify(&mut self, text: &str) -> Option<MarkOutcome> {
        let text = text.to_lowercase();
        let outcome = [
            (MarkOutcome::Marked, &self.phrases.marked),
            (MarkOutcome::MarkFailed, &self.phrases.mark_failed),
            (MarkOutcome::AlreadyMarked, &self.phrases.already_marked),
        ]
        .into_iter()
        .find(|(_, phrases)| contains_any(&text, phrases))
        .map(|(outcome, _)| outcome)?;

        log::debug!("Combat log: {:?}", outcome);
        self.last_outcome = Some(outcome);
        Some(outcome)
    }

    /// Mark state implied by the last recognised outcome
    pub fn mark_state(&self) -> (bool, bool) {
        self.last_outcome
            .map(|outcome| outcome.mark_state())
            .unwrap_or((false, false))
    }

    /// Most recent outcome recognised, if any
    pub fn last_outcome(&self) -> Option<MarkOutcome> {
        self.last_outcome
    }
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .map(|phrase| phrase.trim())
        .filter(|phrase| !phrase.is_empty())
        .any(|phrase| text.contains(&phrase.to_lowercase()))
}
