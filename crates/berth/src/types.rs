use serde::{Deserialize, Serialize};

/// Returned by branch queries when the directory is not a repository or git is unavailable.
pub const BRANCH_NOT_APPLICABLE: &str = "N/A";

/// A persisted service definition. `id` is fixed once created; the rest may be
/// edited at any time and takes effect on the next start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub command: String,
}

impl ServiceDefinition {
	pub fn new(
		id: impl Into<String>,
		name: impl Into<String>,
		path: impl Into<String>,
		command: impl Into<String>,
	) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			path: path.into(),
			command: command.into(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
	Stopped,
	Running,
}

impl RunStatus {
	pub fn is_running(&self) -> bool {
		matches!(self, RunStatus::Running)
	}
}

/// A definition joined with its current runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
	pub id: String,
	pub name: String,
	pub path: String,
	pub command: String,
	pub status: RunStatus,
	pub pid: Option<u32>,
}

impl ServiceInfo {
	pub fn stopped(def: &ServiceDefinition) -> Self {
		Self::with_state(def, RunStatus::Stopped, None)
	}

	pub fn with_state(def: &ServiceDefinition, status: RunStatus, pid: Option<u32>) -> Self {
		Self {
			id: def.id.clone(),
			name: def.name.clone(),
			path: def.path.clone(),
			command: def.command.clone(),
			status,
			pid,
		}
	}
}

/// Persisted profile document. Runtime fields are never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	#[serde(default, alias = "parentDir")]
	pub root_directory: String,
	#[serde(default)]
	pub services: Vec<ServiceDefinition>,
}

/// What a profile switch (or startup) hands back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
	pub services: Vec<ServiceInfo>,
	pub root_directory: String,
}

/// Outcome of a one-off command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
	pub success: bool,
	pub output: String,
}

impl CommandOutcome {
	pub fn failure(output: impl Into<String>) -> Self {
		Self {
			success: false,
			output: output.into(),
		}
	}

	/// Exit 0 reports stdout; anything else prefers stderr and falls back to stdout.
	pub fn from_exit(success: bool, stdout: &str, stderr: &str) -> Self {
		if success {
			return Self {
				success: true,
				output: stdout.trim().to_string(),
			};
		}
		let stderr = stderr.trim();
		let output = if stderr.is_empty() { stdout.trim() } else { stderr };
		Self::failure(output)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn profile_accepts_legacy_parent_dir() {
		let raw = r#"{"parentDir":"/src","services":[{"id":"a","name":"A","path":"a","command":"npm start"}]}"#;
		let profile: Profile = serde_json::from_str(raw).unwrap();
		assert_eq!(profile.root_directory, "/src");
		assert_eq!(profile.services[0].command, "npm start");

		let written = serde_json::to_string(&profile).unwrap();
		assert!(written.contains("\"rootDirectory\":\"/src\""));
		assert!(!written.contains("status"));
	}

	#[test]
	fn outcome_prefers_stderr_on_failure() {
		let o = CommandOutcome::from_exit(false, " out \n", "  err\n");
		assert_eq!(o, CommandOutcome::failure("err"));

		let o = CommandOutcome::from_exit(false, " out \n", " \n");
		assert_eq!(o, CommandOutcome::failure("out"));

		let o = CommandOutcome::from_exit(true, "main\n", "warning");
		assert!(o.success);
		assert_eq!(o.output, "main");
	}

	#[test]
	fn status_serializes_lowercase() {
		assert_eq!(serde_json::to_string(&RunStatus::Running).unwrap(), "\"running\"");
		assert!(!RunStatus::Stopped.is_running());
	}
}
