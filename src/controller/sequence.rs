//! Per-state command sequences and the cooldown gate
//!
//! Each logical state owns an ordered list of command tokens that is cycled
//! one entry per matching update. The cooldown gate is the only rate limiter:
//! the same token is not re-sent within the cooldown window.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::state::LogicalState;

/// Default cooldown between two sends of the same command
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(500);

/// Normalised list of command tokens
///
/// Built from a token list (blank entries dropped) or from the legacy
/// `;`-delimited string form (entries trimmed, blanks dropped).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandList(Vec<String>);

impl CommandList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse the `;`-delimited form
    pub fn parse_delimited(s: &str) -> Self {
        Self(
            s.split(';')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Keep every token that is not blank
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(
            tokens
                .into_iter()
                .map(Into::into)
                .filter(|token| !token.trim().is_empty())
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CommandList {
    fn from(s: &str) -> Self {
        Self::parse_delimited(s)
    }
}

impl From<String> for CommandList {
    fn from(s: String) -> Self {
        Self::parse_delimited(&s)
    }
}

impl From<Vec<String>> for CommandList {
    fn from(tokens: Vec<String>) -> Self {
        Self::from_tokens(tokens)
    }
}

impl From<Vec<&str>> for CommandList {
    fn from(tokens: Vec<&str>) -> Self {
        Self::from_tokens(tokens)
    }
}

impl From<&[&str]> for CommandList {
    fn from(tokens: &[&str]) -> Self {
        Self::from_tokens(tokens.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for CommandList {
    fn from(tokens: [&str; N]) -> Self {
        Self::from_tokens(tokens)
    }
}

/// Round-robin command sequence bound to one logical state
#[derive(Debug, Clone, Default)]
pub struct CommandSequence {
    commands: CommandList,
    cursor: usize,
}

impl CommandSequence {
    pub fn new(commands: CommandList) -> Self {
        Self { commands, cursor: 0 }
    }

    /// Take the command under the cursor and advance it
    pub fn next_command(&mut self) -> Option<&str> {
        let len = self.commands.len();
        if len == 0 {
            return None;
        }
        let idx = self.cursor % len;
        self.cursor = (idx + 1) % len;
        self.commands.as_slice().get(idx).map(String::as_str)
    }

    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// Command sequences for every logical state
#[derive(Debug, Clone, Default)]
pub struct SequenceRegistry {
    sequences: [CommandSequence; 4],
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sequence for a state, rewinding its cursor
    pub fn bind(&mut self, state: LogicalState, commands: CommandList) {
        self.sequences[state.index()] = CommandSequence::new(commands);
    }

    pub fn get(&self, state: LogicalState) -> &CommandSequence {
        &self.sequences[state.index()]
    }

    pub fn get_mut(&mut self, state: LogicalState) -> &mut CommandSequence {
        &mut self.sequences[state.index()]
    }

    /// Rewind every cursor without touching the bound commands
    pub fn rewind_all(&mut self) {
        for sequence in &mut self.sequences {
            sequence.rewind();
        }
    }
}

/// Suppresses re-sending the last command inside the cooldown window
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// Whether `command` may be sent at `now`
    pub fn permits(&self, command: &str, now: Instant) -> bool {
        match &self.last {
            Some((last_command, sent_at)) if last_command == command => {
                now.saturating_duration_since(*sent_at) > self.cooldown
            }
            _ => true,
        }
    }

    /// Record a send
    pub fn record(&mut self, command: &str, now: Instant) {
        self.last = Some((command.to_string(), now));
    }

    pub fn last_command(&self) -> Option<&str> {
        self.last.as_ref().map(|(command, _)| command.as_str())
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_form() {
        let list = CommandList::from(" F1; ;F2 ;;F3 ");
        assert_eq!(list.as_slice(), ["F1", "F2", "F3"]);
        assert!(CommandList::from(";;").is_empty());
    }

    #[test]
    fn test_token_form_drops_blanks() {
        let list = CommandList::from(vec!["1", " ", "", "F5"]);
        assert_eq!(list.as_slice(), ["1", "F5"]);
    }

    #[test]
    fn test_round_robin_wraps() {
        let mut seq = CommandSequence::new(CommandList::from(["A", "B", "C"]));
        let picked: Vec<String> = (0..4)
            .filter_map(|_| seq.next_command().map(str::to_string))
            .collect();
        assert_eq!(picked, ["A", "B", "C", "A"]);
        assert_eq!(seq.cursor(), 1);
    }

    #[test]
    fn test_empty_sequence_yields_nothing() {
        let mut seq = CommandSequence::default();
        assert!(seq.next_command().is_none());
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn test_bind_rewinds_cursor() {
        let mut registry = SequenceRegistry::new();
        registry.bind(LogicalState::FarTarget, CommandList::from("W;S"));
        registry.get_mut(LogicalState::FarTarget).next_command();
        assert_eq!(registry.get(LogicalState::FarTarget).cursor(), 1);

        registry.bind(LogicalState::FarTarget, CommandList::from("W;S"));
        assert_eq!(registry.get(LogicalState::FarTarget).cursor(), 0);
        assert!(registry.get(LogicalState::NoTarget).commands().is_empty());
    }

    #[test]
    fn test_cooldown_gate() {
        let base = Instant::now();
        let mut gate = CooldownGate::new(Duration::from_secs(1));

        assert!(gate.permits("X", base));
        gate.record("X", base);

        assert!(!gate.permits("X", base + Duration::from_millis(500)));
        // Boundary is inclusive
        assert!(!gate.permits("X", base + Duration::from_secs(1)));
        assert!(gate.permits("X", base + Duration::from_millis(1100)));
        // A different command is never throttled
        assert!(gate.permits("Y", base));
    }
}
