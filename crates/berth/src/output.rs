use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

/// The log file attached to a running session, opened in append mode.
///
/// Appends land at the current end of file, so a truncation from `clear`
/// simply restarts the file underneath the session.
pub struct SessionLog {
	file: File,
	path: PathBuf,
	failed: bool,
}

impl SessionLog {
	pub fn open(path: &Path) -> io::Result<Self> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let file = OpenOptions::new().create(true).append(true).open(path)?;
		Ok(Self {
			file,
			path: path.to_path_buf(),
			failed: false,
		})
	}

	pub fn write(&mut self, data: &[u8]) {
		if let Err(e) = self.file.write_all(data) {
			// Report once per session; output keeps flowing to subscribers regardless.
			if !self.failed {
				tracing::warn!("failed to write {}: {}", self.path.display(), e);
				self.failed = true;
			}
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn close(mut self) {
		let _ = self.file.flush();
	}
}

/// Coalesces output chunks into at most one delivery per service per flush interval.
///
/// One deadline is shared by every service: it is set when the first chunk
/// lands in an empty sink and cleared by [`OutputSink::take`].
pub struct OutputSink {
	pending: HashMap<String, Vec<u8>>,
	interval: Duration,
	deadline: Option<Instant>,
}

impl OutputSink {
	pub fn new(interval: Duration) -> Self {
		Self {
			pending: HashMap::new(),
			interval,
			deadline: None,
		}
	}

	pub fn push(&mut self, id: &str, data: &[u8]) {
		if data.is_empty() {
			return;
		}
		match self.pending.get_mut(id) {
			Some(buf) => buf.extend_from_slice(data),
			None => {
				self.pending.insert(id.to_string(), data.to_vec());
			}
		}
		if self.deadline.is_none() {
			self.deadline = Some(Instant::now() + self.interval);
		}
	}

	/// When the armed flush should fire, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn is_armed(&self) -> bool {
		self.deadline.is_some()
	}

	/// Drains every pending buffer and disarms the timer.
	pub fn take(&mut self) -> Vec<(String, Vec<u8>)> {
		self.deadline = None;
		self.pending.drain().collect()
	}

	/// Drops anything still pending for `id` (used when the service is removed).
	pub fn discard(&mut self, id: &str) {
		self.pending.remove(id);
		if self.pending.is_empty() {
			self.deadline = None;
		}
	}
}
