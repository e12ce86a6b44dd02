//! Process-tree termination. A service command may fork its own children, so
//! signalling only the direct child would leave orphans behind.

use std::io;

pub trait TreeTerminator: Send + Sync {
	/// Ask the process and all of its descendants to exit.
	fn terminate(&self, pid: u32) -> io::Result<()>;
	/// Kill the process and all of its descendants without negotiation.
	fn kill(&self, pid: u32) -> io::Result<()>;
}

/// The terminator for the host platform.
pub fn platform_terminator() -> Box<dyn TreeTerminator> {
	#[cfg(unix)]
	{
		Box::new(ProcessGroupTerminator)
	}
	#[cfg(windows)]
	{
		Box::new(TaskkillTerminator)
	}
}

fn check_pid(pid: u32) -> io::Result<()> {
	// pid 0 would address our own process group.
	if pid == 0 {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "no pid to signal"));
	}
	Ok(())
}

/// Children are spawned as process-group leaders, so signalling the group
/// reaches every descendant that did not leave it.
#[cfg(unix)]
pub struct ProcessGroupTerminator;

#[cfg(unix)]
impl ProcessGroupTerminator {
	fn signal(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
		use nix::sys::signal::killpg;
		use nix::unistd::Pid;
		check_pid(pid)?;
		killpg(Pid::from_raw(pid as i32), signal).map_err(io::Error::from)
	}
}

#[cfg(unix)]
impl TreeTerminator for ProcessGroupTerminator {
	fn terminate(&self, pid: u32) -> io::Result<()> {
		Self::signal(pid, nix::sys::signal::Signal::SIGTERM)
	}

	fn kill(&self, pid: u32) -> io::Result<()> {
		Self::signal(pid, nix::sys::signal::Signal::SIGKILL)
	}
}

/// `taskkill /T` walks the child tree; Windows has no polite tree-wide signal,
/// so both requests force.
#[cfg(windows)]
pub struct TaskkillTerminator;

#[cfg(windows)]
impl TreeTerminator for TaskkillTerminator {
	fn terminate(&self, pid: u32) -> io::Result<()> {
		self.kill(pid)
	}

	fn kill(&self, pid: u32) -> io::Result<()> {
		use std::process::{Command, Stdio};
		check_pid(pid)?;
		let status = Command::new("taskkill")
			.args(["/F", "/T", "/PID", &pid.to_string()])
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.status()?;
		if status.success() {
			Ok(())
		} else {
			Err(io::Error::new(
				io::ErrorKind::Other,
				format!("taskkill exited with {}", status),
			))
		}
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	#[test]
	fn refuses_pid_zero() {
		let t = platform_terminator();
		assert!(t.terminate(0).is_err());
		assert!(t.kill(0).is_err());
	}

	#[test]
	fn reports_missing_group() {
		let mut child = std::process::Command::new("true").spawn().unwrap();
		let pid = child.id();
		child.wait().unwrap();
		assert!(platform_terminator().terminate(pid).is_err());
	}
}
