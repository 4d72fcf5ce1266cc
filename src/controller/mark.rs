//! Mark/finish bookkeeping
//!
//! A mark is a debuff applied to a live target; a finish is the follow-up
//! action that becomes available once a marked target dies. Whether a mark
//! landed is reported from outside (combat log), so the flags here are only
//! what the controller currently believes.

/// Default key used to apply a mark
pub const DEFAULT_MARK_KEY: &str = "F2";

/// Mark/finish state and keys
#[derive(Debug, Clone)]
pub struct MarkWorkflow {
    enabled: bool,
    mark_key: Option<String>,
    finish_key: Option<String>,
    /// `None` until the first new target or mark report
    mark_active: Option<bool>,
    finish_pending: bool,
}

impl MarkWorkflow {
    pub fn new(enabled: bool, mark_key: Option<String>, finish_key: Option<String>) -> Self {
        Self {
            enabled,
            mark_key: normalize_key(mark_key.as_deref()),
            finish_key: normalize_key(finish_key.as_deref()),
            mark_active: None,
            finish_pending: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn mark_key(&self) -> Option<&str> {
        self.mark_key.as_deref()
    }

    pub fn set_mark_key(&mut self, key: Option<&str>) {
        self.mark_key = normalize_key(key);
    }

    pub fn finish_key(&self) -> Option<&str> {
        self.finish_key.as_deref()
    }

    pub fn set_finish_key(&mut self, key: Option<&str>) {
        self.finish_key = normalize_key(key);
    }

    pub fn mark_active(&self) -> Option<bool> {
        self.mark_active
    }

    pub fn is_marked(&self) -> bool {
        self.mark_active == Some(true)
    }

    pub fn finish_pending(&self) -> bool {
        self.finish_pending
    }

    /// Overwrite both flags from an external mark report
    pub fn set_state(&mut self, is_marked: bool, finish_available: bool) {
        self.mark_active = Some(is_marked);
        self.finish_pending = finish_available;
    }

    /// A new engagement always starts unmarked
    pub fn reset_for_new_target(&mut self) {
        self.mark_active = Some(false);
        self.finish_pending = false;
    }

    /// Key to send for a mark attempt, if one is due
    pub fn mark_command(&self) -> Option<&str> {
        if self.is_marked() {
            return None;
        }
        self.mark_key()
    }

    /// Whether a finish is owed on death
    pub fn finish_due(&self) -> bool {
        self.is_marked() && self.finish_pending
    }

    pub fn clear_finish(&mut self) {
        self.finish_pending = false;
    }

    /// Forget all runtime flags, keeping keys and the enabled switch
    pub fn reset(&mut self) {
        self.mark_active = None;
        self.finish_pending = false;
    }
}

impl Default for MarkWorkflow {
    fn default() -> Self {
        Self::new(true, Some(DEFAULT_MARK_KEY.to_string()), None)
    }
}

fn normalize_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_trimmed() {
        let mut workflow = MarkWorkflow::new(true, Some(" F2 ".into()), Some("  ".into()));
        assert_eq!(workflow.mark_key(), Some("F2"));
        assert_eq!(workflow.finish_key(), None);

        workflow.set_finish_key(Some("F3"));
        assert_eq!(workflow.finish_key(), Some("F3"));
        workflow.set_mark_key(None);
        assert_eq!(workflow.mark_command(), None);
    }

    #[test]
    fn test_mark_command_only_when_unmarked() {
        let mut workflow = MarkWorkflow::default();
        assert_eq!(workflow.mark_command(), Some("F2"));

        workflow.set_state(true, true);
        assert_eq!(workflow.mark_command(), None);
        assert!(workflow.finish_due());

        workflow.reset_for_new_target();
        assert_eq!(workflow.mark_active(), Some(false));
        assert!(!workflow.finish_due());
        assert_eq!(workflow.mark_command(), Some("F2"));
    }

    #[test]
    fn test_finish_requires_mark() {
        let mut workflow = MarkWorkflow::default();
        workflow.set_state(false, true);
        assert!(!workflow.finish_due());

        workflow.set_state(true, true);
        workflow.clear_finish();
        assert!(!workflow.finish_due());
        assert!(workflow.is_marked());
    }
}
