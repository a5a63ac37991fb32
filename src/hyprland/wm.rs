//! [`WindowSource`] and [`WindowSink`] implementations backed by Hyprland
//! IPC.
//!
//! Communicates directly with Hyprland through its Unix socket at
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket.sock`.
//!
//! Hyprland has no notion of per-window rotation or scale, so the sink only
//! forwards position, size and opacity.  `movewindowpixel` only works on
//! floating windows and `resizewindowpixel` on a tiled window rewrites the
//! split ratios, so a batch first floats its windows with `setfloating`
//! ([`WindowSink::detach`]) and `settiled` puts them back afterwards.
//! Windows that were never floated only receive the opacity change.

use crate::command::{WindowId, WindowInfo};
use crate::layout::{WindowLayout, Workspace};
use crate::traits::{WindowSink, WindowSource};
use glam::Vec2;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// At most this many windows take part in a transition.
pub const MAX_WINDOWS: usize = 32;

/// Hyprland-backed window source and sink.
///
/// No connection is kept open; each call issues a short-lived IPC request.
#[derive(Debug, Default)]
pub struct HyprlandBackend {
    /// Windows this backend floated and has not re-tiled yet.
    floated: RefCell<HashSet<WindowId>>,
}

/// Errors that can occur when talking to Hyprland.
#[derive(Debug, thiserror::Error)]
#[error("hyprland IPC error: {0}")]
pub struct HyprlandError(String);

impl HyprlandBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

//  Direct Hyprland IPC helpers

/// Resolve the Hyprland command socket path.
fn socket_path() -> Result<PathBuf, HyprlandError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprlandError("XDG_RUNTIME_DIR not set".into()))?;
    let his = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| HyprlandError("HYPRLAND_INSTANCE_SIGNATURE not set".into()))?;
    Ok(PathBuf::from(format!("{}/hypr/{}/.socket.sock", runtime_dir, his)))
}

/// Send a raw request to the command socket and return the reply.
fn ipc_request(request: &str) -> Result<String, HyprlandError> {
    let path = socket_path()?;
    let mut stream = UnixStream::connect(&path)
        .map_err(|e| HyprlandError(format!("connect to {}: {}", path.display(), e)))?;

    stream
        .write_all(request.as_bytes())
        .map_err(|e| HyprlandError(format!("write: {}", e)))?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|e| HyprlandError(format!("read: {}", e)))?;

    String::from_utf8(response).map_err(|e| HyprlandError(format!("utf-8: {}", e)))
}

/// Query `j/<what>` and decode the JSON reply.
fn ipc_json<T: for<'de> Deserialize<'de>>(what: &str) -> Result<T, HyprlandError> {
    let json = ipc_request(&format!("j/{}", what))?;
    serde_json::from_str(&json).map_err(|e| HyprlandError(format!("parse {}: {}", what, e)))
}

/// Send a `[[BATCH]]` request; every sub-command must answer `ok`.
fn ipc_batch(commands: &[String]) -> Result<(), HyprlandError> {
    if commands.is_empty() {
        return Ok(());
    }
    let response = ipc_request(&format!("[[BATCH]]{}", commands.join(";")))?;
    if response.replace("ok", "").trim().is_empty() {
        Ok(())
    } else {
        Err(HyprlandError(format!("batch error: {}", response.trim())))
    }
}

//  Minimal serde structs for the JSON we care about

#[derive(Debug, Deserialize)]
struct WorkspaceRefJson {
    id: i64,
}

/// Subset of an entry returned by `j/clients`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientJson {
    address: String,
    #[serde(default)]
    title: String,
    at: [f32; 2],
    size: [f32; 2],
    workspace: WorkspaceRefJson,
    #[serde(default = "yes")]
    mapped: bool,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    floating: bool,
    #[serde(rename = "focusHistoryID", default)]
    focus_history_id: i64,
}

/// Subset of an entry returned by `j/monitors`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonitorJson {
    width: f32,
    height: f32,
    x: f32,
    y: f32,
    #[serde(default = "unit_scale")]
    scale: f32,
    #[serde(default)]
    focused: bool,
    active_workspace: WorkspaceRefJson,
}

fn yes() -> bool {
    true
}

fn unit_scale() -> f32 {
    1.0
}

fn focused_monitor(monitors: &[MonitorJson]) -> Option<&MonitorJson> {
    monitors.iter().find(|m| m.focused).or_else(|| monitors.first())
}

/// Logical layout area of a monitor.
fn monitor_workspace(monitor: &MonitorJson) -> Workspace {
    let scale = if monitor.scale > 0.0 { monitor.scale } else { 1.0 };
    Workspace::new(
        Vec2::new(monitor.x, monitor.y),
        Vec2::new(monitor.width, monitor.height) / scale,
    )
}

/// Mapped, visible clients of `workspace_id`, most recently focused first,
/// capped at [`MAX_WINDOWS`].  Floating clients only count when `floated`
/// holds them.
fn select_windows(
    mut clients: Vec<ClientJson>,
    workspace_id: i64,
    floated: &HashSet<WindowId>,
) -> Vec<WindowInfo> {
    clients.retain(|c| c.workspace.id == workspace_id && c.mapped && !c.hidden);
    clients.sort_by_key(|c| c.focus_history_id);
    clients
        .into_iter()
        .filter_map(|c| {
            let id = WindowId::parse(&c.address)?;
            if c.floating && !floated.contains(&id) {
                return None;
            }
            Some(WindowInfo {
                id,
                title: c.title,
                position: Vec2::from(c.at),
                size: Vec2::from(c.size),
            })
        })
        .take(MAX_WINDOWS)
        .collect()
}

/// Hyprland requests that realise `layout`.
///
/// Geometry is only sent for `floating` windows; a tiled window gets the
/// opacity alone so its layout slot is left untouched.
fn layout_requests(layout: &WindowLayout, floating: bool) -> Vec<String> {
    let target = format!("address:{}", layout.window);
    let mut requests = Vec::with_capacity(3);
    if floating {
        let position = layout.position.round();
        let size = layout.size.round().max(Vec2::ONE);
        requests.push(format!(
            "/dispatch movewindowpixel exact {} {},{}",
            position.x as i32, position.y as i32, target
        ));
        requests.push(format!(
            "/dispatch resizewindowpixel exact {} {},{}",
            size.x as i32, size.y as i32, target
        ));
    }
    requests.push(format!("/setprop {} alpha {:.3}", target, layout.alpha.clamp(0.0, 1.0)));
    requests
}

/// `setfloating` / `settiled` for every window.
fn floating_requests(windows: &[WindowId], floating: bool) -> Vec<String> {
    let dispatcher = if floating { "setfloating" } else { "settiled" };
    windows
        .iter()
        .map(|id| format!("/dispatch {} address:{}", dispatcher, id))
        .collect()
}

//  Trait implementations

impl WindowSource for HyprlandBackend {
    type Error = HyprlandError;

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        let monitors: Vec<MonitorJson> = ipc_json("monitors")?;
        let workspace_id = focused_monitor(&monitors)
            .map(|m| m.active_workspace.id)
            .ok_or_else(|| HyprlandError("no monitors".into()))?;
        let clients: Vec<ClientJson> = ipc_json("clients")?;
        Ok(select_windows(clients, workspace_id, &self.floated.borrow()))
    }

    fn workspace(&self) -> Result<Workspace, Self::Error> {
        let monitors: Vec<MonitorJson> = ipc_json("monitors")?;
        focused_monitor(&monitors)
            .map(monitor_workspace)
            .ok_or_else(|| HyprlandError("no monitors".into()))
    }
}

impl WindowSink for HyprlandBackend {
    type Error = HyprlandError;

    fn apply(&self, layout: &WindowLayout) -> Result<(), Self::Error> {
        let floating = self.floated.borrow().contains(&layout.window);
        ipc_batch(&layout_requests(layout, floating))
    }

    /// Already-floating clients are never selected unless this backend
    /// floated them, so every window passed here starts out tiled.
    fn detach(&self, windows: &[WindowId]) -> Result<(), Self::Error> {
        let fresh: Vec<WindowId> = {
            let floated = self.floated.borrow();
            windows.iter().copied().filter(|id| !floated.contains(id)).collect()
        };
        ipc_batch(&floating_requests(&fresh, true))?;
        self.floated.borrow_mut().extend(fresh);
        Ok(())
    }

    fn reattach(&self, windows: &[WindowId]) -> Result<(), Self::Error> {
        let owned: Vec<WindowId> = {
            let mut floated = self.floated.borrow_mut();
            windows.iter().copied().filter(|id| floated.remove(id)).collect()
        };
        ipc_batch(&floating_requests(&owned, false))
    }
}
