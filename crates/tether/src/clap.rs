use clap::Subcommand;

use crate::client;
use crate::daemon::{Daemon, DaemonError};
use crate::paths::DaemonPaths;

#[derive(Debug, Subcommand)]
pub enum DaemonCommand {
	/// Run the daemon in the foreground (used internally)
	Run,
	/// Start the daemon in the background
	Start,
	/// Stop the running daemon
	Stop,
	/// Show daemon status
	Status,
}

impl DaemonCommand {
	/// Handles `start`, `stop` and `status`. `run` belongs to the application,
	/// which gets `false` back so it can serve.
	pub fn execute(&self, paths: &DaemonPaths, run_args: &[&str]) -> bool {
		let daemon = Daemon::new(paths.clone());
		match self {
			DaemonCommand::Run => return false,
			DaemonCommand::Start => match daemon.start_background(run_args) {
				Ok(()) => eprintln!("daemon started"),
				Err(DaemonError::AlreadyRunning) => eprintln!("daemon already running"),
				Err(e) => {
					eprintln!("error: {}", e);
					std::process::exit(1);
				}
			},
			DaemonCommand::Stop => match daemon.stop() {
				Ok(()) => eprintln!("daemon stopped"),
				Err(e) => eprintln!("{}", e),
			},
			DaemonCommand::Status => {
				if client::is_running(paths) {
					match client::read_pid(paths) {
						Some(pid) => eprintln!("daemon running (pid {})", pid),
						None => eprintln!("daemon running"),
					}
				} else {
					eprintln!("daemon not running");
				}
			}
		}
		true
	}
}
