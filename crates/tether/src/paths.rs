use std::path::PathBuf;

/// Where a daemon keeps its socket, pid file, log and configuration.
///
/// Follows XDG (`$XDG_STATE_HOME/<app>`, `$XDG_CONFIG_HOME/<app>`) unless a
/// root is pinned with [`DaemonPaths::with_root`], in which case both live
/// under `<root>/state` and `<root>/config`.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
	pub app_name: String,
	root: Option<PathBuf>,
}

impl DaemonPaths {
	pub fn new(app_name: impl Into<String>) -> Self {
		Self {
			app_name: app_name.into(),
			root: None,
		}
	}

	pub fn with_root(app_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
		Self {
			app_name: app_name.into(),
			root: Some(root.into()),
		}
	}

	pub fn state_dir(&self) -> PathBuf {
		if let Some(root) = &self.root {
			root.join("state")
		} else if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
			PathBuf::from(dir).join(&self.app_name)
		} else if let Some(home) = home_dir() {
			home.join(".local").join("state").join(&self.app_name)
		} else {
			std::env::temp_dir().join(&self.app_name)
		}
	}

	pub fn config_dir(&self) -> PathBuf {
		if let Some(root) = &self.root {
			root.join("config")
		} else if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
			PathBuf::from(dir).join(&self.app_name)
		} else if let Some(home) = home_dir() {
			home.join(".config").join(&self.app_name)
		} else {
			std::env::temp_dir().join(&self.app_name).join("config")
		}
	}

	pub fn socket_path(&self) -> PathBuf {
		self.state_dir().join("daemon.sock")
	}

	pub fn pid_path(&self) -> PathBuf {
		self.state_dir().join("daemon.pid")
	}

	/// Where a background daemon's stderr goes.
	pub fn log_path(&self) -> PathBuf {
		self.state_dir().join("daemon.log")
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pinned_root_wins() {
		let paths = DaemonPaths::with_root("app", "/srv/app");
		assert_eq!(paths.state_dir(), PathBuf::from("/srv/app/state"));
		assert_eq!(paths.config_dir(), PathBuf::from("/srv/app/config"));
		assert_eq!(paths.socket_path(), PathBuf::from("/srv/app/state/daemon.sock"));
		assert_eq!(paths.pid_path(), PathBuf::from("/srv/app/state/daemon.pid"));
		assert_eq!(paths.log_path(), PathBuf::from("/srv/app/state/daemon.log"));
	}
}
