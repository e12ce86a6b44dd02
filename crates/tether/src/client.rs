use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::os::unix::net::UnixStream;

use serde::{de::DeserializeOwned, Serialize};

use crate::paths::DaemonPaths;

/// Errors from daemon client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	/// Daemon is not running (socket not found or refusing connections).
	#[error("daemon not running")]
	NotRunning,
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("serialize error: {0}")]
	Serialize(String),
	#[error("deserialize error: {0}")]
	Deserialize(String),
	/// The daemon closed the connection before answering.
	#[error("connection closed by daemon")]
	Closed,
}

/// Synchronous client for a daemon speaking JSON lines over a Unix socket.
pub struct DaemonClient<Req, Resp> {
	reader: BufReader<UnixStream>,
	_phantom: PhantomData<(Req, Resp)>,
}

impl<Req, Resp> DaemonClient<Req, Resp>
where
	Req: Serialize,
	Resp: DeserializeOwned,
{
	/// Connect to an already-running daemon.
	pub fn connect(paths: &DaemonPaths) -> Result<Self, ClientError> {
		let stream = UnixStream::connect(paths.socket_path()).map_err(|_| ClientError::NotRunning)?;
		Ok(Self {
			reader: BufReader::new(stream),
			_phantom: PhantomData,
		})
	}

	/// Send a request and wait for its single response.
	pub fn send(&mut self, request: &Req) -> Result<Resp, ClientError> {
		self.write(request)?;
		self.read()?.ok_or(ClientError::Closed)
	}

	/// Send a request the daemon answers with a stream of responses. The
	/// connection is handed to the returned iterator.
	pub fn stream(mut self, request: &Req) -> Result<Responses<Resp>, ClientError> {
		self.write(request)?;
		Ok(Responses {
			reader: self.reader,
			_phantom: PhantomData,
		})
	}

	fn write(&mut self, request: &Req) -> Result<(), ClientError> {
		let mut data = serde_json::to_vec(request).map_err(|e| ClientError::Serialize(e.to_string()))?;
		data.push(b'\n');
		self.reader.get_mut().write_all(&data)?;
		Ok(())
	}

	fn read(&mut self) -> Result<Option<Resp>, ClientError> {
		read_response(&mut self.reader)
	}
}

/// Responses pushed by the daemon after [`DaemonClient::stream`]. Ends when
/// the daemon closes the connection.
pub struct Responses<Resp> {
	reader: BufReader<UnixStream>,
	_phantom: PhantomData<Resp>,
}

impl<Resp: DeserializeOwned> Iterator for Responses<Resp> {
	type Item = Result<Resp, ClientError>;

	fn next(&mut self) -> Option<Self::Item> {
		read_response(&mut self.reader).transpose()
	}
}

fn read_response<Resp: DeserializeOwned>(
	reader: &mut BufReader<UnixStream>,
) -> Result<Option<Resp>, ClientError> {
	let mut line = String::new();
	if reader.read_line(&mut line)? == 0 {
		return Ok(None);
	}
	serde_json::from_str(&line)
		.map(Some)
		.map_err(|e| ClientError::Deserialize(e.to_string()))
}

/// Check if a daemon is running (socket is connectable).
pub fn is_running(paths: &DaemonPaths) -> bool {
	UnixStream::connect(paths.socket_path()).is_ok()
}

/// Read the PID of a running daemon from its PID file.
pub fn read_pid(paths: &DaemonPaths) -> Option<u32> {
	std::fs::read_to_string(paths.pid_path())
		.ok()
		.and_then(|s| s.trim().parse().ok())
}
