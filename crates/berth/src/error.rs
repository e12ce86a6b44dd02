use std::io;

/// Errors surfaced by the engine's value-returning operations.
///
/// Fire-and-forget control paths never return these; they log and move on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("invalid profile document: {0}")]
	Json(#[from] serde_json::Error),
	#[error("invalid config: {0}")]
	Toml(#[from] toml::de::Error),
	#[error("service not found: {0}")]
	NotFound(String),
	#[error("profile not found: {0}")]
	ProfileNotFound(String),
	#[error("invalid profile name: {0:?}")]
	InvalidProfileName(String),
	#[error("{0}")]
	Busy(String),
	#[error("supervisor is no longer running")]
	Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
