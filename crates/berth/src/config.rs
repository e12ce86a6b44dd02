use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Engine settings ([logs], [supervisor], [commands] in config.toml) ───────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
	#[serde(default)]
	pub logs: LogsConfig,
	#[serde(default)]
	pub supervisor: SupervisorSettings,
	#[serde(default)]
	pub commands: CommandsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
	#[serde(default = "default_max_lines")]
	pub max_lines: usize,
	#[serde(default = "default_flush_interval_ms")]
	pub flush_interval_ms: u64,
	#[serde(default = "default_read_limit")]
	pub read_limit_bytes: u64,
}

impl Default for LogsConfig {
	fn default() -> Self {
		Self {
			max_lines: default_max_lines(),
			flush_interval_ms: default_flush_interval_ms(),
			read_limit_bytes: default_read_limit(),
		}
	}
}

fn default_max_lines() -> usize { 350 }
fn default_flush_interval_ms() -> u64 { 50 }
fn default_read_limit() -> u64 { 5 * 1024 * 1024 }

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
	#[serde(default = "default_restart_delay_ms")]
	pub restart_delay_ms: u64,
	#[serde(default = "default_kill_grace_ms")]
	pub kill_grace_ms: u64,
}

impl Default for SupervisorSettings {
	fn default() -> Self {
		Self {
			restart_delay_ms: default_restart_delay_ms(),
			kill_grace_ms: default_kill_grace_ms(),
		}
	}
}

fn default_restart_delay_ms() -> u64 { 1000 }
fn default_kill_grace_ms() -> u64 { 3000 }

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
}

impl Default for CommandsConfig {
	fn default() -> Self {
		Self { timeout_secs: default_timeout_secs() }
	}
}

fn default_timeout_secs() -> u64 { 60 }

impl EngineConfig {
	pub fn flush_interval(&self) -> Duration {
		Duration::from_millis(self.logs.flush_interval_ms)
	}

	pub fn restart_delay(&self) -> Duration {
		Duration::from_millis(self.supervisor.restart_delay_ms)
	}

	pub fn kill_grace(&self) -> Duration {
		Duration::from_millis(self.supervisor.kill_grace_ms)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.commands.timeout_secs)
	}

	pub fn from_toml(content: &str) -> crate::Result<Self> {
		Ok(toml::from_str(content)?)
	}
}

/// Everything the supervisor needs to run: where logs go, what relative
/// service paths resolve against, and the tunables.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	pub log_dir: PathBuf,
	pub base_dir: PathBuf,
	pub settings: EngineConfig,
	/// Overrides `settings.commands.timeout_secs` when set; lets callers use sub-second ceilings.
	pub command_timeout: Option<Duration>,
}

impl SupervisorConfig {
	pub fn new(log_dir: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
		Self {
			log_dir: log_dir.into(),
			base_dir: base_dir.into(),
			settings: EngineConfig::default(),
			command_timeout: None,
		}
	}

	pub fn command_timeout(&self) -> Duration {
		self.command_timeout
			.unwrap_or_else(|| self.settings.command_timeout())
	}

	pub fn log_dir(&self) -> &Path {
		&self.log_dir
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_config_uses_defaults() {
		let config = EngineConfig::from_toml("").unwrap();
		assert_eq!(config.logs.max_lines, 350);
		assert_eq!(config.flush_interval(), Duration::from_millis(50));
		assert_eq!(config.logs.read_limit_bytes, 5 * 1024 * 1024);
		assert_eq!(config.restart_delay(), Duration::from_secs(1));
		assert_eq!(config.command_timeout(), Duration::from_secs(60));
	}

	#[test]
	fn partial_sections_keep_other_defaults() {
		let config = EngineConfig::from_toml("[logs]\nmax_lines = 20\n\n[commands]\ntimeout_secs = 5\n").unwrap();
		assert_eq!(config.logs.max_lines, 20);
		assert_eq!(config.logs.flush_interval_ms, 50);
		assert_eq!(config.commands.timeout_secs, 5);
		assert_eq!(config.supervisor.kill_grace_ms, 3000);
	}

	#[test]
	fn rejects_wrong_types() {
		assert!(EngineConfig::from_toml("[logs]\nmax_lines = \"many\"\n").is_err());
	}
}
