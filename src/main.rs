//! Entry point for the **hyprstack** daemon.
//!
//! Spawns the command sources on background threads and runs the frame
//! loop on the main thread: wait for a command (at most one frame
//! interval), handle it, then advance the animation by one frame.

use hyprstack::command::Command;
use hyprstack::config::Config;
use hyprstack::controller::{default_config_path, StackController};
use hyprstack::hyprland::events::HyprlandEventSource;
use hyprstack::hyprland::wm::HyprlandBackend;
use hyprstack::ipc::listener::UnixSocketListener;
use hyprstack::traits::CommandSource;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};

/// Default socket path for the command listener.
fn default_socket_path() -> String {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    format!("{}/hyprstack.sock", runtime)
}

/// `--config <path>` if given, else the XDG location.
fn config_path() -> PathBuf {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return PathBuf::from(path);
            }
        }
    }
    default_config_path()
}

/// Load the config, falling back to compiled-in defaults.
fn load_config(path: &Path) -> Config {
    match Config::load(path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no usable config ({}), using defaults", e);
            Config::default()
        }
    }
}

fn main() {
    env_logger::init();

    let path = config_path();
    let config = load_config(&path);

    let mut controller = StackController::new(HyprlandBackend::new(), config);
    controller.set_config_path(path);

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    spawn_command_sources(cmd_tx);

    info!("hyprstack running");
    loop {
        let frame = controller.config().daemon.frame_interval();
        match cmd_rx.recv_timeout(frame) {
            Ok(cmd) => {
                if let Err(e) = controller.handle(cmd) {
                    error!("command error: {}", e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Err(e) = controller.tick() {
            error!("frame error: {}", e);
        }
    }
    info!("all command sources closed, exiting");
}

fn spawn_command_sources(tx: mpsc::Sender<Command>) {
    {
        let tx = tx.clone();
        let path = default_socket_path();
        std::thread::spawn(move || {
            let mut source = UnixSocketListener::new(&path);
            if let Err(e) = source.run(tx) {
                error!("socket listener error: {}", e);
            }
        });
    }

    std::thread::spawn(move || {
        let mut source = HyprlandEventSource::new();
        if let Err(e) = source.run(tx) {
            error!("hyprland event source error: {}", e);
        }
    });
}
