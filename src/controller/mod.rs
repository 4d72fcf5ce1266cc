//! Health-state action controller
//!
//! Turns a stream of `(target state, health percent)` observations into
//! commands for the input device. Sequences are cycled per state, repeats are
//! throttled by a cooldown, a sustained health plateau fires a one-shot "far"
//! sequence, and the mark/finish workflow rides on top of the alive and dead
//! transitions.
//!
//! The controller is a single-writer state machine. Share it across threads
//! through [`worker::spawn`] or behind a mutex.

pub mod mark;
pub mod sequence;
pub mod stability;
pub mod state;
pub mod worker;

use std::time::{Duration, Instant};

use crate::config::Settings;

pub use mark::MarkWorkflow;
pub use sequence::{CommandList, CommandSequence, CooldownGate, SequenceRegistry};
pub use stability::{Baseline, StabilityTracker};
pub use state::{LogicalState, StateParseError, TargetPresenceState};
pub use worker::{ControlMessage, ControllerHandle};

/// Receives outbound command tokens
///
/// Delivery is best effort: implementations swallow their own transport
/// failures and never report back.
pub trait CommandSink {
    fn send(&mut self, command: &str);
}

impl<F> CommandSink for F
where
    F: FnMut(&str),
{
    fn send(&mut self, command: &str) {
        self(command)
    }
}

/// Health-state action controller
pub struct HpActionController<S> {
    sink: S,
    sequences: SequenceRegistry,
    gate: CooldownGate,
    tracker: StabilityTracker,
    mark: MarkWorkflow,
    /// Last state acted upon; `None` after stop or a far-and-forget
    current_state: Option<LogicalState>,
    far_signaled_at: Option<Instant>,
    far_transient: bool,
    enabled: bool,
}

impl<S: CommandSink> HpActionController<S> {
    /// Create a controller bound to `sink` and configured from `settings`
    pub fn new(settings: &Settings, sink: S) -> Self {
        let mut controller = Self {
            sink,
            sequences: SequenceRegistry::new(),
            gate: CooldownGate::default(),
            tracker: StabilityTracker::default(),
            mark: MarkWorkflow::default(),
            current_state: None,
            far_signaled_at: None,
            far_transient: true,
            enabled: true,
        };
        controller.apply_settings(settings);
        controller
    }

    /// Reconfigure from a settings value; every cursor is rewound
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.set_no_target_sequence(settings.no_target_command.clone());
        self.set_dead_target_sequence(settings.dead_target_command.clone());
        self.set_alive_target_sequence(settings.alive_target_command.clone());
        self.set_far_target_sequence(settings.far_target_command.clone());
        self.set_cooldown(settings.cooldown_sec);
        self.set_mark_enabled(settings.mark_enabled);
        self.set_mark_key(settings.mark_key.as_deref().unwrap_or_default());
        self.set_finish_key(settings.finish_key.as_deref().unwrap_or_default());
        self.set_stability_threshold(settings.hp_stable_threshold_sec);
        self.set_stability_epsilon(settings.hp_change_epsilon);
        self.set_far_transient(settings.far_transient);
    }

    /// Snapshot of the current configuration, for persistence
    pub fn settings(&self) -> Settings {
        Settings {
            no_target_command: self.sequence(LogicalState::NoTarget).clone(),
            dead_target_command: self.sequence(LogicalState::DeadTarget).clone(),
            alive_target_command: self.sequence(LogicalState::AliveTarget).clone(),
            far_target_command: self.sequence(LogicalState::FarTarget).clone(),
            cooldown_sec: self.gate.cooldown().as_secs_f64(),
            mark_enabled: self.mark.is_enabled(),
            mark_key: self.mark.mark_key().map(str::to_string),
            finish_key: self.mark.finish_key().map(str::to_string),
            hp_stable_threshold_sec: self.tracker.stable_threshold().as_secs_f64(),
            hp_change_epsilon: self.tracker.epsilon(),
            far_transient: self.far_transient,
            ..Settings::default()
        }
    }

    // --- Main entry points ---

    /// Process one observation taken now
    pub fn update(&mut self, reported: TargetPresenceState, health_percent: f64) {
        self.update_at(reported, health_percent, Instant::now());
    }

    /// Process one observation from its textual state label
    ///
    /// Unrecognised labels are logged and ignored.
    pub fn update_reported(&mut self, reported: &str, health_percent: f64) {
        match reported.parse::<TargetPresenceState>() {
            Ok(state) => self.update(state, health_percent),
            Err(e) => log::warn!("Ignoring observation: {}", e),
        }
    }

    /// Process one observation taken at `now`
    pub fn update_at(&mut self, reported: TargetPresenceState, health_percent: f64, now: Instant) {
        if !self.enabled {
            log::debug!("Controller disabled, skipping update");
            return;
        }

        if !health_percent.is_finite() {
            log::warn!("Ignoring observation with health {}", health_percent);
            return;
        }
        let health_percent = health_percent.clamp(0.0, 100.0);

        log::debug!(
            "update: {:?} -> {}, hp={:.2}",
            self.current_state.map(|s| s.as_str()),
            reported,
            health_percent
        );

        let reported_logical = LogicalState::from(reported);

        if self.mark.is_enabled()
            && reported == TargetPresenceState::AliveTarget
            && self.current_state != Some(reported_logical)
        {
            log::debug!("New target, resetting mark state");
            self.mark.reset_for_new_target();
        }

        if reported.ends_engagement() {
            self.tracker.clear();
            self.far_signaled_at = None;

            self.dispatch_next(reported_logical, now);

            if reported == TargetPresenceState::DeadTarget && self.mark.finish_due() {
                self.try_finish();
                self.mark.clear_finish();
            }

            self.current_state = Some(reported_logical);
            return;
        }

        let engaged = self.current_state.is_some_and(|s| s.is_engaged());
        if !self.tracker.is_tracking() || !engaged {
            log::debug!("Starting HP tracking for live target");
            self.tracker.rebase(health_percent, now);
            self.far_signaled_at = None;
        }

        if self.tracker.observe(health_percent, now) {
            self.far_and_forget(now);
            return;
        }

        if self.mark.is_enabled() && !self.mark.is_marked() {
            self.try_mark();
        } else {
            self.dispatch_next(LogicalState::AliveTarget, now);
        }

        self.current_state = Some(LogicalState::AliveTarget);
    }

    /// Overwrite the mark flags from an external mark report
    pub fn set_mark_state(&mut self, is_marked: bool, finish_available: bool) {
        self.mark.set_state(is_marked, finish_available);
        log::info!(
            "Mark state: marked={}, finish_pending={}",
            is_marked,
            finish_available
        );
    }

    // --- Mark / finish ---

    /// Send the mark key if one is configured and the target is not marked
    ///
    /// Sent on every unmarked alive update until a mark report arrives; the
    /// cooldown gate and its last-command record are left untouched.
    pub fn try_mark(&mut self) {
        match self.mark.mark_command().map(str::to_string) {
            Some(key) => {
                log::debug!("Trying mark with {}", key);
                self.sink.send(&key);
            }
            None => log::debug!("Mark skipped: already marked or no key"),
        }
    }

    /// Send the finish key if one is configured
    pub fn try_finish(&mut self) {
        match self.mark.finish_key().map(str::to_string) {
            Some(key) => {
                log::info!("Sending finish {}", key);
                self.sink.send(&key);
            }
            None => log::debug!("Finish skipped: no finish key"),
        }
    }

    // --- Lifecycle ---

    /// Re-enable dispatch; tracking starts fresh on the next live target
    pub fn start(&mut self) {
        self.enabled = true;
        log::info!("Controller started");
    }

    /// Disable dispatch and drop all transient state
    pub fn stop(&mut self) {
        self.enabled = false;
        self.mark.reset();
        self.current_state = None;
        self.gate.reset();
        self.tracker.clear();
        self.far_signaled_at = None;
        self.sequences.rewind_all();
        log::info!("Controller stopped");
    }

    // --- Setters ---

    /// Replace the sequence cycled while no target is selected
    pub fn set_no_target_sequence(&mut self, commands: impl Into<CommandList>) {
        self.bind_sequence(LogicalState::NoTarget, commands.into());
    }

    /// Replace the sequence cycled while the target is dead
    pub fn set_dead_target_sequence(&mut self, commands: impl Into<CommandList>) {
        self.bind_sequence(LogicalState::DeadTarget, commands.into());
    }

    /// Replace the sequence cycled while the target is alive
    pub fn set_alive_target_sequence(&mut self, commands: impl Into<CommandList>) {
        self.bind_sequence(LogicalState::AliveTarget, commands.into());
    }

    /// Replace the sequence fired once per health plateau
    pub fn set_far_target_sequence(&mut self, commands: impl Into<CommandList>) {
        self.bind_sequence(LogicalState::FarTarget, commands.into());
    }

    /// Minimum gap between two identical commands, in seconds
    pub fn set_cooldown(&mut self, seconds: f64) {
        if let Some(cooldown) = checked_seconds("cooldown", seconds) {
            self.gate.set_cooldown(cooldown);
        }
    }

    /// Toggle the mark/finish workflow
    pub fn set_mark_enabled(&mut self, enabled: bool) {
        log::info!("Mark workflow enabled: {}", enabled);
        self.mark.set_enabled(enabled);
    }

    /// Set the mark key; a blank key disables marking
    pub fn set_mark_key(&mut self, key: &str) {
        log::info!("Mark key: {:?}", key);
        self.mark.set_mark_key(Some(key));
    }

    /// Set the finish key; a blank key disables finishing
    pub fn set_finish_key(&mut self, key: &str) {
        log::info!("Finish key: {:?}", key);
        self.mark.set_finish_key(Some(key));
    }

    /// Plateau length, in seconds, before the target counts as far
    pub fn set_stability_threshold(&mut self, seconds: f64) {
        if let Some(threshold) = checked_seconds("stability threshold", seconds) {
            self.tracker.set_stable_threshold(threshold);
        }
    }

    /// Smallest health change that restarts the plateau clock
    pub fn set_stability_epsilon(&mut self, epsilon: f64) {
        if !epsilon.is_finite() || epsilon < 0.0 {
            log::warn!(
                "Invalid stability epsilon {}, keeping {}",
                epsilon,
                self.tracker.epsilon()
            );
            return;
        }
        log::info!("Stability epsilon: {}", epsilon);
        self.tracker.set_epsilon(epsilon);
    }

    /// Stored for persistence; far is always handled as a transient pulse
    pub fn set_far_transient(&mut self, transient: bool) {
        if !transient {
            log::warn!("Non-transient far mode is not supported, far stays transient");
        }
        self.far_transient = transient;
    }

    // --- Accessors ---

    /// Whether updates are currently acted upon
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Last state acted upon
    pub fn current_state(&self) -> Option<LogicalState> {
        self.current_state
    }

    /// Commands bound to `state`
    pub fn sequence(&self, state: LogicalState) -> &CommandList {
        self.sequences.get(state).commands()
    }

    /// Mark/finish flags and keys
    pub fn mark(&self) -> &MarkWorkflow {
        &self.mark
    }

    /// Current health plateau, if a live target is tracked
    pub fn baseline(&self) -> Option<Baseline> {
        self.tracker.baseline()
    }

    /// Last command that passed the cooldown gate
    pub fn last_dispatched(&self) -> Option<&str> {
        self.gate.last_command()
    }

    /// When the far sequence last fired
    pub fn far_signaled_at(&self) -> Option<Instant> {
        self.far_signaled_at
    }

    /// The outbound command sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    // --- Internals ---

    fn bind_sequence(&mut self, state: LogicalState, commands: CommandList) {
        log::info!("{} sequence -> {:?}", state, commands.as_slice());
        self.sequences.bind(state, commands);
    }

    /// Send the next command of a state's sequence through the cooldown gate
    fn dispatch_next(&mut self, state: LogicalState, now: Instant) {
        let Some(command) = self
            .sequences
            .get_mut(state)
            .next_command()
            .map(str::to_string)
        else {
            return;
        };
        self.send_gated(&command, now);
    }

    fn send_gated(&mut self, command: &str, now: Instant) {
        if !self.gate.permits(command, now) {
            log::debug!("Skipping '{}' due to cooldown", command);
            return;
        }
        log::debug!("Sending command: {}", command);
        self.sink.send(command);
        self.gate.record(command, now);
    }

    /// Fire the far sequence once per plateau, then forget the engagement
    fn far_and_forget(&mut self, now: Instant) {
        let window_start = self.tracker.baseline().map(|b| b.changed_at);
        let already_signaled = match (self.far_signaled_at, window_start) {
            (Some(signaled), Some(start)) => signaled >= start,
            _ => false,
        };

        if already_signaled {
            log::debug!("Far already signaled for this plateau");
        } else {
            self.dispatch_next(LogicalState::FarTarget, now);
            self.far_signaled_at = Some(now);
            log::info!("Target far, far sequence signaled");
        }

        // The next live observation starts a new engagement
        self.tracker.clear();
        self.current_state = None;
        log::debug!("Forgot far: baseline cleared, state reset");
    }
}

fn checked_seconds(name: &str, seconds: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) => {
            log::info!("{}: {}s", name, seconds);
            Some(duration)
        }
        Err(_) => {
            log::warn!("Invalid {} {}, keeping previous value", name, seconds);
            None
        }
    }
}
