use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::client::{self, ClientError, DaemonClient};
use crate::paths::DaemonPaths;
use crate::server::{self, Reply};

const POLL: Duration = Duration::from_millis(100);
const POLL_ATTEMPTS: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
	#[error("daemon already running")]
	AlreadyRunning,
	#[error("daemon not running")]
	NotRunning,
	#[error("failed to start daemon: {0}")]
	Spawn(#[source] io::Error),
	#[error("daemon did not exit in time (pid {0})")]
	StillRunning(u32),
}

pub struct Daemon {
	pub paths: DaemonPaths,
}

impl Daemon {
	pub fn new(paths: DaemonPaths) -> Self {
		Self { paths }
	}

	/// Serves `handler` on the socket until `shutdown` resolves, then removes
	/// the socket and pid file. Whatever the application needs to wind down
	/// should happen after this returns.
	pub async fn run<Req, Resp, F, Fut, E>(
		&self,
		handler: F,
		invalid: E,
		shutdown: impl Future<Output = ()>,
	) -> io::Result<()>
	where
		Req: DeserializeOwned + Send + 'static,
		Resp: Serialize + Send + Sync + 'static,
		F: Fn(Req) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Reply<Resp>> + Send,
		E: Fn(String) -> Resp + Send + Sync + 'static,
	{
		std::fs::create_dir_all(self.paths.state_dir())?;
		std::fs::write(self.paths.pid_path(), std::process::id().to_string())?;

		let socket_path = self.paths.socket_path();
		if socket_path.exists() {
			let _ = std::fs::remove_file(&socket_path);
		}

		tracing::info!("daemon started (pid {})", std::process::id());

		let paths = self.paths.clone();
		let mut server_handle = tokio::spawn(async move {
			server::run_socket_server(&paths, handler, invalid).await
		});

		let result = tokio::select! {
			joined = &mut server_handle => match joined {
				Ok(served) => served,
				Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
			},
			_ = shutdown => {
				tracing::info!("shutting down");
				server_handle.abort();
				Ok(())
			}
		};

		self.cleanup();
		result
	}

	pub fn cleanup(&self) {
		let _ = std::fs::remove_file(self.paths.socket_path());
		let _ = std::fs::remove_file(self.paths.pid_path());
	}

	/// Re-executes the current binary with `args` as a detached background
	/// process. Its stderr is appended to the daemon log.
	pub fn start_background(&self, args: &[&str]) -> Result<(), DaemonError> {
		if client::is_running(&self.paths) {
			return Err(DaemonError::AlreadyRunning);
		}
		spawn_detached(&self.paths, args).map_err(DaemonError::Spawn)
	}

	/// Asks the daemon to terminate and waits for its socket to go away.
	pub fn stop(&self) -> Result<(), DaemonError> {
		let Some(pid) = client::read_pid(&self.paths) else {
			return Err(DaemonError::NotRunning);
		};

		use nix::sys::signal::{kill, Signal};
		use nix::unistd::Pid;
		if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_err() {
			// Stale pid file from a daemon that died without cleaning up.
			self.cleanup();
			return Err(DaemonError::NotRunning);
		}

		for _ in 0..POLL_ATTEMPTS {
			if !client::is_running(&self.paths) {
				return Ok(());
			}
			std::thread::sleep(POLL);
		}
		Err(DaemonError::StillRunning(pid))
	}
}

/// Connects to the daemon, starting it in the background with `args` first
/// if nothing is listening.
pub fn ensure_daemon<Req, Resp>(
	paths: &DaemonPaths,
	args: &[&str],
) -> Result<DaemonClient<Req, Resp>, ClientError>
where
	Req: Serialize,
	Resp: DeserializeOwned,
{
	if let Ok(client) = DaemonClient::connect(paths) {
		return Ok(client);
	}

	spawn_detached(paths, args)?;

	for _ in 0..POLL_ATTEMPTS {
		std::thread::sleep(POLL);
		if let Ok(client) = DaemonClient::connect(paths) {
			return Ok(client);
		}
	}

	Err(ClientError::NotRunning)
}

fn spawn_detached(paths: &DaemonPaths, args: &[&str]) -> io::Result<()> {
	std::fs::create_dir_all(paths.state_dir())?;
	let log = std::fs::OpenOptions::new()
		.create(true)
		.append(true)
		.open(paths.log_path())?;

	let mut cmd = Command::new(find_current_binary());
	cmd.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::from(log));
	{
		use std::os::unix::process::CommandExt;
		cmd.process_group(0);
	}
	cmd.spawn()?;
	Ok(())
}

fn find_current_binary() -> PathBuf {
	std::env::current_exe().unwrap_or_else(|_| PathBuf::from("daemon"))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut term = match signal(SignalKind::terminate()) {
		Ok(s) => s,
		Err(e) => {
			tracing::warn!("cannot listen for SIGTERM: {}", e);
			let _ = tokio::signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {},
		_ = term.recv() => {},
	}
}
