//! IPC listener that accepts commands over a Unix socket.
//!
//! Key bindings and scripts connect to the socket and send one command per
//! line.

pub mod listener;
