//! Translates Hyprland's event stream into hyprstack [`Command`]s.
//!
//! Hyprland broadcasts events on its second socket (`socket2`) as
//! `EVENT>>DATA\n` lines:
//!
//! | Event            | Payload                              | Command                    |
//! |------------------|--------------------------------------|----------------------------|
//! | `openwindow`     | `<addr>,<workspace>,<class>,<title>` | [`Command::WindowOpened`]  |
//! | `closewindow`    | `<addr>`                             | [`Command::WindowClosed`]  |
//! | `workspace`      | `<name>`                             | [`Command::WorkspaceChanged`] |
//! | `configreloaded` | (empty)                              | [`Command::Reload`]        |
//!
//! Addresses on socket2 come without the `0x` prefix.  Everything else is
//! ignored.

use crate::command::{Command, WindowId};
use crate::traits::CommandSource;
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc;

/// [`CommandSource`] reading Hyprland's `socket2`.
#[derive(Debug, Default)]
pub struct HyprlandEventSource;

impl HyprlandEventSource {
    pub fn new() -> Self {
        Self
    }
}

/// Error from the Hyprland event source.
#[derive(Debug, thiserror::Error)]
#[error("hyprland event error: {0}")]
pub struct HyprlandEventError(String);

/// Resolve the Hyprland event socket path.
fn socket2_path() -> Result<PathBuf, HyprlandEventError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprlandEventError("XDG_RUNTIME_DIR not set".into()))?;
    let his = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| HyprlandEventError("HYPRLAND_INSTANCE_SIGNATURE not set".into()))?;
    Ok(PathBuf::from(format!("{}/hypr/{}/.socket2.sock", runtime_dir, his)))
}

/// Parse a single event line from socket2.
fn parse_event_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(">>")
}

/// Map one event to the command it triggers, if any.
fn event_to_command(event: &str, data: &str) -> Option<Command> {
    match event {
        "openwindow" => {
            let address = data.split(',').next()?;
            WindowId::parse(address).map(Command::WindowOpened)
        }
        "closewindow" => WindowId::parse(data).map(Command::WindowClosed),
        "workspace" => Some(Command::WorkspaceChanged),
        "configreloaded" => Some(Command::Reload),
        _ => None,
    }
}

impl CommandSource for HyprlandEventSource {
    type Error = HyprlandEventError;

    /// Connect to socket2 and forward window and workspace events.
    ///
    /// Blocks until the socket closes.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error> {
        let path = socket2_path()?;
        let stream = UnixStream::connect(&path)
            .map_err(|e| HyprlandEventError(format!("connect to {}: {}", path.display(), e)))?;
        info!("event source connected to {}", path.display());

        for line in BufReader::new(stream).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("socket2 read error: {}", e);
                    return Err(HyprlandEventError(format!("read error: {}", e)));
                }
            };
            let Some((event, data)) = parse_event_line(&line) else {
                continue;
            };
            if let Some(cmd) = event_to_command(event, data.trim()) {
                debug!("event {} -> {:?}", event, cmd);
                if sink.send(cmd).is_err() {
                    // Receiver gone, daemon is shutting down.
                    return Ok(());
                }
            }
        }

        warn!("socket2 stream ended");
        Ok(())
    }
}
