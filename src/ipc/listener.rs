//! Unix-socket [`CommandSource`] implementation.
//!
//! Binds a Unix stream socket and accepts one connection at a time.  Each
//! line received is one [`Command`].
//!
//! # Wire format
//!
//! Lines are JSON-encoded commands:
//!
//! ```json
//! "Toggle"
//! "Cycle"
//! {"PeekFor":800}
//! "Reload"
//! ```
//!
//! For key bindings a bare word works too, e.g.
//! `echo toggle | socat - UNIX-CONNECT:$XDG_RUNTIME_DIR/hyprstack.sock`:
//! `toggle`, `cycle`, `peek`, `peek <ms>` and `reload`.

use crate::command::Command;
use crate::traits::CommandSource;
use log::{debug, error, info};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// A [`CommandSource`] that listens on a Unix stream socket.
///
/// Each accepted connection can send multiple newline-delimited commands.
/// When the connection closes, the listener waits for the next one.
pub struct UnixSocketListener {
    path: PathBuf,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum UnixSocketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](CommandSource::run) is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse one line of input.
pub fn parse_line(line: &str) -> Result<Command, UnixSocketError> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let shorthand = match (words.next(), words.next(), words.next()) {
        (Some("toggle"), None, _) => Some(Command::Toggle),
        (Some("cycle"), None, _) => Some(Command::Cycle),
        (Some("peek"), None, _) => Some(Command::Peek),
        (Some("peek"), Some(ms), None) => ms.parse().ok().map(Command::PeekFor),
        (Some("reload"), None, _) => Some(Command::Reload),
        _ => None,
    };
    match shorthand {
        Some(cmd) => Ok(cmd),
        None => Ok(serde_json::from_str(line)?),
    }
}

impl CommandSource for UnixSocketListener {
    type Error = UnixSocketError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** until the receiving end of `sink` is dropped.
    /// Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };
            debug!("client connected");
            for line in BufReader::new(stream).lines() {
                let text = match line {
                    Ok(text) => text,
                    Err(e) => {
                        error!("read error: {}", e);
                        break;
                    }
                };
                if text.trim().is_empty() {
                    continue;
                }
                match parse_line(&text) {
                    Ok(cmd) => {
                        debug!("received {:?}", cmd);
                        if sink.send(cmd).is_err() {
                            info!("sink closed, shutting down");
                            let _ = std::fs::remove_file(&self.path);
                            return Ok(());
                        }
                    }
                    Err(e) => error!("bad command {:?}: {}", text, e),
                }
            }
            debug!("client disconnected");
        }
        Ok(())
    }
}
