//! Controller worker thread
//!
//! The perception loop and the combat-log reader run on their own threads.
//! Both talk to the controller through a [`ControllerHandle`]; the worker owns
//! the controller and applies messages one at a time, so runtime state only
//! ever has a single writer.

use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::{CommandSink, HpActionController, TargetPresenceState};
use crate::config::Settings;

/// Messages accepted by the controller worker
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// One perception result, stamped when the frame was captured
    Observe {
        state: TargetPresenceState,
        health_percent: f64,
        observed_at: Instant,
    },
    /// Mark outcome reported by the combat-log reader
    MarkState {
        is_marked: bool,
        finish_available: bool,
    },
    /// Replace the controller configuration
    ApplySettings(Box<Settings>),
    Start,
    Stop,
    /// Exit the worker loop
    Shutdown,
}

/// Cloneable sender side of the controller worker
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControllerHandle {
    /// Queue an observation captured now
    pub fn observe(&self, state: TargetPresenceState, health_percent: f64) {
        self.observe_at(state, health_percent, Instant::now());
    }

    /// Queue an observation captured at `observed_at`
    pub fn observe_at(
        &self,
        state: TargetPresenceState,
        health_percent: f64,
        observed_at: Instant,
    ) {
        self.send(ControlMessage::Observe {
            state,
            health_percent,
            observed_at,
        });
    }

    pub fn set_mark_state(&self, is_marked: bool, finish_available: bool) {
        self.send(ControlMessage::MarkState {
            is_marked,
            finish_available,
        });
    }

    pub fn apply_settings(&self, settings: Settings) {
        self.send(ControlMessage::ApplySettings(Box::new(settings)));
    }

    pub fn start(&self) {
        self.send(ControlMessage::Start);
    }

    pub fn stop(&self) {
        self.send(ControlMessage::Stop);
    }

    pub fn shutdown(&self) {
        self.send(ControlMessage::Shutdown);
    }

    /// Send a raw message; dropped with a warning if the worker is gone
    pub fn send(&self, message: ControlMessage) {
        if let Err(e) = self.tx.send(message) {
            log::warn!("Controller worker gone, dropping {:?}", e.0);
        }
    }
}

/// Move `controller` onto a dedicated worker thread
///
/// The join handle yields the controller back once the worker exits, either on
/// [`ControlMessage::Shutdown`] or when every handle has been dropped.
pub fn spawn<S>(
    controller: HpActionController<S>,
) -> io::Result<(ControllerHandle, JoinHandle<HpActionController<S>>)>
where
    S: CommandSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let join = thread::Builder::new()
        .name("hp-controller".into())
        .spawn(move || run(controller, rx))?;
    Ok((ControllerHandle { tx }, join))
}

fn run<S: CommandSink>(
    mut controller: HpActionController<S>,
    rx: mpsc::Receiver<ControlMessage>,
) -> HpActionController<S> {
    log::info!("Controller worker started");

    while let Ok(message) = rx.recv() {
        match message {
            ControlMessage::Observe {
                state,
                health_percent,
                observed_at,
            } => controller.update_at(state, health_percent, observed_at),
            ControlMessage::MarkState {
                is_marked,
                finish_available,
            } => controller.set_mark_state(is_marked, finish_available),
            ControlMessage::ApplySettings(settings) => controller.apply_settings(&settings),
            ControlMessage::Start => controller.start(),
            ControlMessage::Stop => controller.stop(),
            ControlMessage::Shutdown => break,
        }
    }

    log::info!("Controller worker stopped");
    controller
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CommandList, LogicalState};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recording_controller() -> (
        Arc<Mutex<Vec<String>>>,
        HpActionController<impl FnMut(&str) + Send + 'static>,
    ) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink_sent = Arc::clone(&sent);
        let settings = Settings {
            mark_enabled: true,
            mark_key: Some("F2".into()),
            finish_key: Some("F4".into()),
            alive_target_command: CommandList::from("1"),
            dead_target_command: CommandList::from("ESC"),
            cooldown_sec: 0.0,
            ..Settings::default()
        };
        let controller = HpActionController::new(&settings, move |cmd: &str| {
            sink_sent.lock().unwrap().push(cmd.to_string())
        });
        (sent, controller)
    }

    #[test]
    fn test_worker_applies_messages_in_order() {
        let (sent, controller) = recording_controller();
        let (handle, join) = spawn(controller).unwrap();
        let base = Instant::now();

        handle.observe_at(TargetPresenceState::AliveTarget, 90.0, base);
        handle.set_mark_state(true, true);
        handle.observe_at(
            TargetPresenceState::AliveTarget,
            70.0,
            base + Duration::from_millis(200),
        );
        handle.observe_at(
            TargetPresenceState::DeadTarget,
            0.0,
            base + Duration::from_millis(400),
        );
        handle.shutdown();

        let controller = join.join().unwrap();
        assert_eq!(*sent.lock().unwrap(), ["F2", "1", "ESC", "F4"]);
        assert_eq!(controller.current_state(), Some(LogicalState::DeadTarget));
    }

    #[test]
    fn test_worker_stop_and_settings() {
        let (sent, controller) = recording_controller();
        let (handle, join) = spawn(controller).unwrap();

        handle.stop();
        handle.observe(TargetPresenceState::DeadTarget, 0.0);
        handle.apply_settings(Settings {
            dead_target_command: CommandList::from("TAB"),
            ..Settings::default()
        });
        handle.start();
        handle.observe(TargetPresenceState::DeadTarget, 0.0);
        drop(handle);

        let controller = join.join().unwrap();
        assert_eq!(*sent.lock().unwrap(), ["TAB"]);
        assert!(controller.is_enabled());
    }

    #[test]
    fn test_handle_survives_worker_exit() {
        let (_sent, controller) = recording_controller();
        let (handle, join) = spawn(controller).unwrap();
        handle.shutdown();
        join.join().unwrap();

        // Worker is gone; this must not panic
        handle.observe(TargetPresenceState::NoTarget, 0.0);
    }
}
