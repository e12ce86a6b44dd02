use berth::EngineConfig;
use serde::Deserialize;
use tether::DaemonPaths;

// ── Global config (~/.config/berth/config.toml) ─────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GlobalConfig {
	#[serde(default)]
	pub daemon: DaemonConfig,
	/// `[logs]`, `[supervisor]` and `[commands]`.
	#[serde(flatten)]
	pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
	#[serde(default = "default_port")]
	pub port: u16,
	/// Serve the HTTP API even when the daemon was started without `--http`.
	#[serde(default)]
	pub http: bool,
	#[serde(default = "default_profile")]
	pub default_profile: String,
}

impl Default for DaemonConfig {
	fn default() -> Self {
		Self {
			port: default_port(),
			http: false,
			default_profile: default_profile(),
		}
	}
}

fn default_port() -> u16 { 13370 }
fn default_profile() -> String { berth::DEFAULT_PROFILE.to_string() }

impl GlobalConfig {
	pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(content)
	}
}

pub fn load_global_config(paths: &DaemonPaths) -> GlobalConfig {
	let path = paths.config_dir().join("config.toml");
	if path.exists() {
		match std::fs::read_to_string(&path) {
			Ok(content) => match GlobalConfig::parse(&content) {
				Ok(config) => return config,
				Err(e) => tracing::warn!("failed to parse {}: {}", path.display(), e),
			},
			Err(e) => tracing::warn!("failed to read {}: {}", path.display(), e),
		}
	}
	GlobalConfig::default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_config_uses_defaults() {
		let config = GlobalConfig::parse("").unwrap();
		assert_eq!(config.daemon.port, 13370);
		assert!(!config.daemon.http);
		assert_eq!(config.daemon.default_profile, "default");
		assert_eq!(config.engine.logs.max_lines, 350);
		assert_eq!(config.engine.supervisor.restart_delay_ms, 1000);
		assert_eq!(config.engine.commands.timeout_secs, 60);
	}

	#[test]
	fn sections_override_independently() {
		let config = GlobalConfig::parse(
			r#"
[daemon]
port = 9000
default_profile = "work"

[logs]
max_lines = 1000

[commands]
timeout_secs = 5
"#,
		)
		.unwrap();
		assert_eq!(config.daemon.port, 9000);
		assert_eq!(config.daemon.default_profile, "work");
		assert_eq!(config.engine.logs.max_lines, 1000);
		assert_eq!(config.engine.logs.flush_interval_ms, 50);
		assert_eq!(config.engine.commands.timeout_secs, 5);
		assert_eq!(config.engine.supervisor.kill_grace_ms, 3000);
	}

	#[test]
	fn missing_file_falls_back() {
		let tmp = tempfile::tempdir().unwrap();
		let paths = DaemonPaths::with_root("berth", tmp.path());
		let config = load_global_config(&paths);
		assert_eq!(config.daemon.port, 13370);
	}

	#[test]
	fn invalid_file_falls_back() {
		let tmp = tempfile::tempdir().unwrap();
		let paths = DaemonPaths::with_root("berth", tmp.path());
		std::fs::create_dir_all(paths.config_dir()).unwrap();
		std::fs::write(paths.config_dir().join("config.toml"), "[daemon]\nport = \"nope\"\n").unwrap();
		let config = load_global_config(&paths);
		assert_eq!(config.daemon.port, 13370);
	}
}
