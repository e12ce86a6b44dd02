//! # tether
//!
//! Daemon lifecycle toolkit: XDG paths, a JSON-lines server on a Unix socket
//! (with server-push streams), a blocking client, background start/stop and
//! pid file handling.

pub mod paths;
pub mod server;
pub mod client;
pub mod daemon;

#[cfg(feature = "clap")]
pub mod clap;

pub use paths::DaemonPaths;
pub use server::Reply;
pub use client::{DaemonClient, ClientError, Responses};
pub use daemon::{Daemon, DaemonError, ensure_daemon, shutdown_signal};
