use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::shell::Shell;
use crate::terminate::TreeTerminator;
use crate::types::{CommandOutcome, BRANCH_NOT_APPLICABLE};

pub const BRANCH_QUERY: &str = "git rev-parse --abbrev-ref HEAD";

/// Runs one-off, non-interactive commands to completion in a directory.
///
/// Output is captured in memory only. Each run is bounded by `timeout`,
/// after which the whole process tree is killed and the run reports failure.
#[derive(Clone)]
pub struct CommandRunner {
	shell: Shell,
	timeout: Duration,
	terminator: Arc<dyn TreeTerminator>,
}

impl CommandRunner {
	pub fn new(shell: Shell, timeout: Duration, terminator: Arc<dyn TreeTerminator>) -> Self {
		Self {
			shell,
			timeout,
			terminator,
		}
	}

	pub async fn execute(&self, dir: &Path, command_line: &str) -> CommandOutcome {
		let mut cmd = self.shell.command(command_line);
		cmd.current_dir(dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		#[cfg(unix)]
		cmd.process_group(0);

		let mut child = match cmd.spawn() {
			Ok(c) => c,
			Err(e) => {
				tracing::debug!("failed to spawn {:?} in {}: {}", command_line, dir.display(), e);
				return CommandOutcome::failure(e.to_string());
			}
		};
		let pid = child.id();

		let stdout = tokio::spawn(read_all(child.stdout.take()));
		let stderr = tokio::spawn(read_all(child.stderr.take()));

		let completion = async {
			let status = child.wait().await;
			let out = stdout.await.unwrap_or_default();
			let err = stderr.await.unwrap_or_default();
			(status, out, err)
		};

		// Exactly one of completion or the deadline resolves the call.
		let finished = tokio::time::timeout(self.timeout, completion).await;
		match finished {
			Ok((Ok(status), out, err)) => CommandOutcome::from_exit(status.success(), &out, &err),
			Ok((Err(e), _, _)) => CommandOutcome::failure(e.to_string()),
			Err(_) => {
				tracing::warn!("command {:?} timed out after {:?}", command_line, self.timeout);
				if let Some(pid) = pid {
					if let Err(e) = self.terminator.kill(pid) {
						tracing::debug!("tree kill for {} failed: {}", pid, e);
					}
				}
				let _ = child.kill().await;
				CommandOutcome::failure(format!(
					"Command timed out after {}",
					describe(self.timeout)
				))
			}
		}
	}

	/// Current branch name, or [`BRANCH_NOT_APPLICABLE`] on any failure.
	pub async fn branch(&self, dir: &Path) -> String {
		let outcome = self.execute(dir, BRANCH_QUERY).await;
		if outcome.success && !outcome.output.is_empty() {
			outcome.output
		} else {
			BRANCH_NOT_APPLICABLE.to_string()
		}
	}
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
	let mut buf = Vec::new();
	if let Some(mut reader) = reader {
		let _ = reader.read_to_end(&mut buf).await;
	}
	String::from_utf8_lossy(&buf).into_owned()
}

fn describe(timeout: Duration) -> String {
	if timeout.subsec_millis() == 0 {
		let secs = timeout.as_secs();
		format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
	} else {
		format!("{} ms", timeout.as_millis())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn describes_timeouts() {
		assert_eq!(describe(Duration::from_secs(60)), "60 seconds");
		assert_eq!(describe(Duration::from_secs(1)), "1 second");
		assert_eq!(describe(Duration::from_millis(300)), "300 ms");
	}
}
