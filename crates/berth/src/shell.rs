use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A shell program plus the flag that makes it run one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
	program: PathBuf,
	flag: &'static str,
}

#[cfg(windows)]
const GIT_BASH_PATHS: &[&str] = &[
	"C:\\Program Files\\Git\\bin\\bash.exe",
	"C:\\Program Files (x86)\\Git\\bin\\bash.exe",
	"C:\\Program Files\\Git\\git-bash.exe",
	"C:\\Program Files (x86)\\Git\\git-bash.exe",
];

impl Shell {
	pub fn new(program: impl Into<PathBuf>, flag: &'static str) -> Self {
		Self {
			program: program.into(),
			flag,
		}
	}

	/// Shell for supervised services: resolves commands through PATH and
	/// cooperates with process-tree termination.
	pub fn for_services() -> Self {
		if cfg!(windows) {
			Self::new("cmd.exe", "/C")
		} else {
			Self::new("sh", "-c")
		}
	}

	/// Shell for one-off commands, chosen so version-control tooling behaves
	/// the way it does in a developer's terminal.
	pub fn for_commands() -> Self {
		#[cfg(windows)]
		{
			if let Some(bash) = GIT_BASH_PATHS.iter().map(Path::new).find(|p| p.exists()) {
				tracing::info!("using Git Bash at {}", bash.display());
				return Self::new(bash, "-c");
			}
			tracing::info!("Git Bash not found, falling back to PowerShell");
			Self::new("powershell.exe", "-Command")
		}
		#[cfg(not(windows))]
		{
			match find_on_path("bash") {
				Some(bash) => Self::new(bash, "-c"),
				None => Self::new("sh", "-c"),
			}
		}
	}

	pub fn program(&self) -> &Path {
		&self.program
	}

	pub fn command(&self, line: &str) -> Command {
		let mut cmd = Command::new(&self.program);
		cmd.arg(self.flag).arg(line);
		cmd
	}
}

#[cfg_attr(windows, allow(dead_code))]
fn find_on_path(name: &str) -> Option<PathBuf> {
	let path = std::env::var_os("PATH")?;
	std::env::split_paths(&path)
		.map(|dir| dir.join(name))
		.find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(unix)]
	#[test]
	fn service_shell_is_sh() {
		assert_eq!(Shell::for_services(), Shell::new("sh", "-c"));
	}

	#[cfg(unix)]
	#[test]
	fn command_shell_prefers_bash() {
		let shell = Shell::for_commands();
		let name = shell.program().file_name().unwrap().to_string_lossy().to_string();
		assert!(name == "bash" || name == "sh", "unexpected shell {}", name);
	}

	#[test]
	fn missing_binary_not_found() {
		assert!(find_on_path("berth-definitely-not-installed").is_none());
	}
}
