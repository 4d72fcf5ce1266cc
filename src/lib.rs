//! hp-reactor - health-state driven action controller for game automation
//!
//! Perception reads the selected target's state and health from screen
//! frames, the controller decides which key to press next, and the input
//! device injects it over a serial line.
//!
//! ## Mark / finish
//!
//! The `chat` module classifies combat-log text into mark outcomes, which
//! feed the controller's mark/finish workflow alongside the health stream.

pub mod chat;
pub mod config;
pub mod controller;
pub mod device;
pub mod vision;

use image::RgbImage;

use crate::chat::{ChatClassifier, MarkOutcome};
use crate::controller::ControllerHandle;
use crate::vision::{Perception, TargetDetector, TargetObservation, VisionError};

pub use crate::config::Settings;
pub use crate::controller::{CommandSink, HpActionController, TargetPresenceState};

/// Producer side of the system: perception and combat-log reading
///
/// Both feed the same controller worker, so they can run on different threads
/// with their own `Reactor` or share one.
pub struct Reactor<D> {
    pub perception: Perception<D>,
    pub chat: ChatClassifier,
    controller: ControllerHandle,
}

impl<D: TargetDetector> Reactor<D> {
    pub fn new(detector: D, chat: ChatClassifier, controller: ControllerHandle) -> Self {
        Self {
            perception: Perception::new(detector),
            chat,
            controller,
        }
    }

    /// Analyse a frame and forward the observation to the controller
    pub fn process_frame(&mut self, frame: &RgbImage) -> Result<TargetObservation, VisionError> {
        let observation = self.perception.observe(frame).map_err(|e| {
            log::error!("Failed to process frame: {}", e);
            e
        })?;
        self.controller
            .observe(observation.state, observation.health_percent);
        Ok(observation)
    }

    /// Classify combat-log text and forward any mark outcome
    pub fn process_chat(&mut self, text: &str) -> Option<MarkOutcome> {
        let outcome = self.chat.classify(text)?;
        let (is_marked, finish_available) = outcome.mark_state();
        self.controller.set_mark_state(is_marked, finish_available);
        Some(outcome)
    }

    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }
}
