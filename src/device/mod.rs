//! Serial input-injection device
//!
//! The device firmware understands short key codes, one per line. Command
//! tokens coming out of the controller are key names; they are translated to
//! codes here and written best effort.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use once_cell::sync::Lazy;

use crate::controller::CommandSink;

/// Key name -> wire code understood by the device firmware
static KEY_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Firmware specials
    map.insert("F11_random", "11");
    map.insert("F11_once", "FF");
    map.insert("Ping", "PP");

    for key in [
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F12",
    ] {
        map.insert(key, key);
    }
    for key in ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"] {
        map.insert(key, key);
    }
    for key in [
        "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q",
        "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    ] {
        map.insert(key, key);
    }
    for key in ["Alt", "Ctrl", "Shift", "Space", "Enter", "Esc", "Tab"] {
        map.insert(key, key);
    }

    map
});

/// Wire code for a key name, if the firmware knows it
pub fn key_code(name: &str) -> Option<&'static str> {
    KEY_MAP.get(name.trim()).copied()
}

/// Key names the device accepts
pub fn key_names() -> Vec<&'static str> {
    let mut names: Vec<_> = KEY_MAP.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Device errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to open device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Input device behind any byte writer (serial port, pipe, buffer)
pub struct InputDevice<W> {
    writer: W,
    sent: u64,
}

impl InputDevice<File> {
    /// Open a serial device node for writing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.display().to_string(),
                source,
            })?;
        log::info!("Connected to input device at {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write> InputDevice<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, sent: 0 }
    }

    /// Send a key by name; unknown names and write failures are logged only
    pub fn send_key(&mut self, name: &str) {
        let Some(code) = key_code(name) else {
            log::warn!("Key '{}' is not in the device key map", name);
            return;
        };

        let result = self
            .writer
            .write_all(format!("{}\n", code).as_bytes())
            .and_then(|_| self.writer.flush());
        match result {
            Ok(()) => {
                self.sent += 1;
                log::debug!("Sent {:?} to device", code);
            }
            Err(e) => log::warn!("Failed to send '{}' to device: {}", name, e),
        }
    }

    /// Number of keys written successfully
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CommandSink for InputDevice<W> {
    fn send(&mut self, command: &str) {
        self.send_key(command);
    }
}
