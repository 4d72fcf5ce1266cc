//! hp-reactor CLI - replay observations through the controller
//!
//! Reads a recorded observation stream from stdin and drives the controller
//! with it, either printing the resulting commands or sending them to a
//! serial input device.
//!
//! ```text
//! hp-reactor [SETTINGS] [DEVICE] < recording.txt
//!
//! # one event per line, time in seconds from the start of the recording
//! 0.0 alive_target 97.5
//! 0.4 mark 1 1
//! 2.9 dead_target 0
//! 3.0 stop
//! ```

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use hp_reactor::config::{self, DEFAULT_SETTINGS_FILE};
use hp_reactor::device::InputDevice;
use hp_reactor::{HpActionController, TargetPresenceState};
use tracing_subscriber::EnvFilter;

type BoxedSink = Box<dyn FnMut(&str) + Send>;

/// Replay a recorded observation stream from stdin through the controller
#[derive(Parser, Debug)]
#[command(name = "hp-reactor", version, long_about = None)]
struct Cli {
    /// Settings file; defaults are used if it is missing or unreadable
    #[arg(default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Serial input device; commands are printed to stdout when omitted
    device: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let settings = config::load(&cli.settings);

    let sink: BoxedSink = match cli.device {
        Some(path) => match InputDevice::open(&path) {
            Ok(mut device) => Box::new(move |cmd: &str| device.send_key(cmd)),
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(|cmd: &str| println!("{}", cmd)),
    };

    let mut controller = HpActionController::new(&settings, sink);
    let base = Instant::now();

    for (line_no, line) in io::stdin().lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = replay_line(&mut controller, base, &line) {
            log::warn!("line {}: {}", line_no + 1, e);
        }
    }

    ExitCode::SUCCESS
}

/// Apply one replay line to the controller
fn replay_line(
    controller: &mut HpActionController<BoxedSink>,
    base: Instant,
    line: &str,
) -> Result<(), String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(());
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let (at, event, rest) = match fields.as_slice() {
        [time, event, rest @ ..] => match time.parse::<f64>() {
            Ok(secs) => (timestamp(base, secs)?, *event, rest),
            Err(_) => (Instant::now(), fields[0], &fields[1..]),
        },
        [event] => (Instant::now(), *event, &[][..]),
        [] => return Ok(()),
    };

    match (event, rest) {
        ("start", []) => controller.start(),
        ("stop", []) => controller.stop(),
        ("mark", [marked, finish]) => {
            controller.set_mark_state(parse_flag(marked)?, parse_flag(finish)?)
        }
        ("finish", []) => controller.try_finish(),
        (state, [hp]) => {
            let state: TargetPresenceState = state.parse().map_err(|e| format!("{}", e))?;
            let hp: f64 = hp.parse().map_err(|_| format!("bad health value {:?}", hp))?;
            controller.update_at(state, hp, at);
        }
        _ => return Err(format!("unrecognised event {:?}", line)),
    }
    Ok(())
}

fn timestamp(base: Instant, secs: f64) -> Result<Instant, String> {
    Duration::try_from_secs_f64(secs)
        .map(|offset| base + offset)
        .map_err(|_| format!("bad timestamp {}", secs))
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(format!("bad flag {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults_and_positionals() {
        let cli = Cli::try_parse_from(["hp-reactor"]).unwrap();
        assert_eq!(cli.settings, PathBuf::from(DEFAULT_SETTINGS_FILE));
        assert!(cli.device.is_none());

        let cli = Cli::try_parse_from(["hp-reactor", "bot.json", "/dev/ttyACM0"]).unwrap();
        assert_eq!(cli.settings, PathBuf::from("bot.json"));
        assert_eq!(cli.device, Some(PathBuf::from("/dev/ttyACM0")));
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["hp-reactor", "--bogus"]).is_err());
        let help = Cli::try_parse_from(["hp-reactor", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_replay_lines() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink_sent = Arc::clone(&sent);
        let settings = hp_reactor::Settings {
            mark_enabled: false,
            alive_target_command: "1".into(),
            dead_target_command: "ESC".into(),
            ..Default::default()
        };
        let sink: BoxedSink = Box::new(move |cmd: &str| {
            sink_sent.lock().unwrap().push(cmd.to_string())
        });
        let mut controller = HpActionController::new(&settings, sink);
        let base = Instant::now();

        for line in ["# recording", "", "0.0 alive_target 90", "1.0 dead_target 0", "stop"] {
            replay_line(&mut controller, base, line).unwrap();
        }
        assert!(replay_line(&mut controller, base, "0.5 wobbling 3").is_err());
        assert!(replay_line(&mut controller, base, "mark 1 maybe").is_err());

        assert_eq!(*sent.lock().unwrap(), ["1", "ESC"]);
        assert!(!controller.is_enabled());
    }
}
