//! On-disk log history: one plain-text file per service, bracketed by
//! session markers and bounded to a number of lines at session boundaries.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

pub const NO_LOGS: &str = "No logs found.";

pub fn log_path(log_dir: &Path, id: &str) -> PathBuf {
	log_dir.join(format!("{}.log", file_stem(id)))
}

// Ids are opaque; keep them from escaping the log directory.
fn file_stem(id: &str) -> String {
	let stem: String = id
		.chars()
		.map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
		.collect();
	match stem.as_str() {
		"" | "." | ".." => format!("_{}", stem),
		_ => stem,
	}
}

/// ISO-8601 UTC with millisecond precision, e.g. `2026-02-14T09:47:03.120Z`.
pub fn timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn session_started_marker() -> String {
	format!("\n--- Session started at {} ---\n", timestamp())
}

pub fn session_ended_marker(code: Option<i32>) -> String {
	let code = code.map(|c| c.to_string()).unwrap_or_else(|| "null".to_string());
	format!("\n--- Session ended at {} with code {} ---\n", timestamp(), code)
}

pub fn cleared_marker() -> String {
	format!("\n--- Logs cleared at {} ---\n", timestamp())
}

/// Rewrites `path` keeping only the last `max_lines` newline-separated pieces.
/// Returns whether the file was rewritten. A missing file is not an error.
pub fn enforce_line_limit(path: &Path, max_lines: usize) -> io::Result<bool> {
	let data = match fs::read(path) {
		Ok(d) => d,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
		Err(e) => return Err(e),
	};

	let pieces = bytecount_newlines(&data) + 1;
	if pieces <= max_lines {
		return Ok(false);
	}

	let drop = pieces - max_lines;
	let keep_from = data
		.iter()
		.enumerate()
		.filter(|(_, b)| **b == b'\n')
		.nth(drop - 1)
		.map(|(i, _)| i + 1)
		.unwrap_or(data.len());

	fs::write(path, &data[keep_from..])?;
	tracing::debug!("truncated {} to {} lines", path.display(), max_lines);
	Ok(true)
}

fn bytecount_newlines(data: &[u8]) -> usize {
	data.iter().filter(|b| **b == b'\n').count()
}

/// Full contents for display. Files larger than `limit` bytes yield only their
/// tail, behind a notice; read failures come back as text.
pub fn read_log(path: &Path, limit: u64) -> String {
	match read_tail(path, limit) {
		Ok(Some(text)) => text,
		Ok(None) => NO_LOGS.to_string(),
		Err(e) => {
			tracing::warn!("failed to read {}: {}", path.display(), e);
			format!("Error reading logs: {}", e)
		}
	}
}

fn read_tail(path: &Path, limit: u64) -> io::Result<Option<String>> {
	let mut file = match File::open(path) {
		Ok(f) => f,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e),
	};
	let size = file.metadata()?.len();

	if size <= limit {
		let mut buf = Vec::with_capacity(size as usize);
		file.read_to_end(&mut buf)?;
		return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
	}

	file.seek(SeekFrom::Start(size - limit))?;
	let mut buf = Vec::with_capacity(limit as usize);
	file.take(limit).read_to_end(&mut buf)?;
	Ok(Some(format!(
		"--- Log truncated (showing last {}) ---\n{}",
		human_size(limit),
		String::from_utf8_lossy(&buf)
	)))
}

fn human_size(bytes: u64) -> String {
	const MB: u64 = 1024 * 1024;
	const KB: u64 = 1024;
	if bytes >= MB && bytes % MB == 0 {
		format!("{}MB", bytes / MB)
	} else if bytes >= KB && bytes % KB == 0 {
		format!("{}KB", bytes / KB)
	} else {
		format!("{} bytes", bytes)
	}
}

/// Truncates the file to zero bytes. Returns false when there was nothing to clear.
pub fn clear_log(path: &Path) -> io::Result<bool> {
	match OpenOptions::new().write(true).open(path) {
		Ok(file) => {
			file.set_len(0)?;
			Ok(true)
		}
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
		Err(e) => Err(e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lines(n: usize) -> String {
		(0..n).map(|i| format!("line {}\n", i)).collect()
	}

	#[test]
	fn log_path_stays_in_dir() {
		let dir = Path::new("/var/berth/logs");
		assert_eq!(log_path(dir, "web"), dir.join("web.log"));
		assert_eq!(log_path(dir, "../etc/passwd"), dir.join(".._etc_passwd.log"));
		assert_eq!(log_path(dir, ".."), dir.join("_...log"));
	}

	#[test]
	fn enforce_keeps_most_recent_lines() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("web.log");
		fs::write(&path, lines(1000)).unwrap();

		assert!(enforce_line_limit(&path, 10).unwrap());
		let content = fs::read_to_string(&path).unwrap();
		assert!(content.lines().count() <= 10);
		assert!(content.ends_with("line 999\n"));
		assert!(!content.contains("line 990\n"));
		assert!(content.contains("line 991\n"));
	}

	#[test]
	fn enforce_leaves_small_files_alone() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("web.log");
		fs::write(&path, lines(3)).unwrap();
		assert!(!enforce_line_limit(&path, 10).unwrap());
		assert_eq!(fs::read_to_string(&path).unwrap(), lines(3));

		assert!(!enforce_line_limit(&tmp.path().join("missing.log"), 10).unwrap());
	}

	#[test]
	fn enforce_zero_empties_file() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("web.log");
		fs::write(&path, lines(5)).unwrap();
		assert!(enforce_line_limit(&path, 0).unwrap());
		assert_eq!(fs::metadata(&path).unwrap().len(), 0);
	}

	#[test]
	fn read_returns_tail_with_notice() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("web.log");
		fs::write(&path, "aaaaabbbbb").unwrap();

		assert_eq!(read_log(&path, 100), "aaaaabbbbb");
		assert_eq!(read_log(&path, 5), "--- Log truncated (showing last 5 bytes) ---\nbbbbb");
		assert_eq!(read_log(&tmp.path().join("nope.log"), 100), NO_LOGS);
		assert_eq!(human_size(5 * 1024 * 1024), "5MB");
	}

	#[test]
	fn clear_truncates_existing_only() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("web.log");
		fs::write(&path, lines(4)).unwrap();
		assert!(clear_log(&path).unwrap());
		assert_eq!(fs::metadata(&path).unwrap().len(), 0);
		assert!(!clear_log(&tmp.path().join("nope.log")).unwrap());
	}

	#[test]
	fn markers_carry_exit_code() {
		assert!(session_ended_marker(Some(1)).contains("with code 1 ---"));
		assert!(session_ended_marker(None).contains("with code null ---"));
		assert!(session_started_marker().starts_with("\n--- Session started at "));
		assert!(timestamp().ends_with('Z'));
	}
}
