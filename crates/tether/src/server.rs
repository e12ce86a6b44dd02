use std::future::Future;
use std::io;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::paths::DaemonPaths;

/// What a handler sends back for one request.
pub enum Reply<Resp> {
	/// A single response line; the connection stays open for more requests.
	Once(Resp),
	/// A response line per item until the sender is dropped or the client
	/// goes away. The connection is closed afterwards.
	Stream(mpsc::Receiver<Resp>),
}

impl<Resp> From<Resp> for Reply<Resp> {
	fn from(resp: Resp) -> Self {
		Reply::Once(resp)
	}
}

/// Accepts connections on the daemon socket and answers JSON-lines requests.
///
/// Lines that do not parse as `Req` are answered with `invalid(message)` so a
/// client never waits on a request the server dropped. Returns only if the
/// socket cannot be bound.
pub async fn run_socket_server<Req, Resp, F, Fut, E>(
	paths: &DaemonPaths,
	handler: F,
	invalid: E,
) -> io::Result<()>
where
	Req: DeserializeOwned + Send + 'static,
	Resp: Serialize + Send + Sync + 'static,
	F: Fn(Req) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Reply<Resp>> + Send,
	E: Fn(String) -> Resp + Send + Sync + 'static,
{
	let socket_path = paths.socket_path();
	let listener = UnixListener::bind(&socket_path).map_err(|e| {
		tracing::error!("failed to bind socket {}: {}", socket_path.display(), e);
		e
	})?;

	tracing::info!("listening on {}", socket_path.display());

	let handler = Arc::new(handler);
	let invalid = Arc::new(invalid);

	loop {
		let (stream, _) = match listener.accept().await {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("accept error: {}", e);
				continue;
			}
		};

		let handler = Arc::clone(&handler);
		let invalid = Arc::clone(&invalid);
		tokio::spawn(async move {
			handle_connection(stream, handler, invalid).await;
		});
	}
}

async fn handle_connection<Req, Resp, F, Fut, E>(
	stream: UnixStream,
	handler: Arc<F>,
	invalid: Arc<E>,
) where
	Req: DeserializeOwned + Send + 'static,
	Resp: Serialize + Send + Sync + 'static,
	F: Fn(Req) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Reply<Resp>> + Send,
	E: Fn(String) -> Resp + Send + Sync + 'static,
{
	let (reader, mut writer) = stream.into_split();
	let mut lines = BufReader::new(reader).lines();

	while let Ok(Some(line)) = lines.next_line().await {
		let reply = match serde_json::from_str::<Req>(&line) {
			Ok(request) => handler(request).await,
			Err(e) => {
				tracing::warn!("invalid request: {}", e);
				Reply::Once(invalid(e.to_string()))
			}
		};

		match reply {
			Reply::Once(resp) => {
				if write_line(&mut writer, &resp).await.is_err() {
					break;
				}
			}
			Reply::Stream(mut rx) => {
				while let Some(resp) = rx.recv().await {
					if write_line(&mut writer, &resp).await.is_err() {
						break;
					}
				}
				break;
			}
		}
	}
}

async fn write_line<Resp: Serialize>(writer: &mut OwnedWriteHalf, resp: &Resp) -> io::Result<()> {
	let mut data = serde_json::to_vec(resp).map_err(|e| {
		tracing::error!("failed to serialize response: {}", e);
		io::Error::new(io::ErrorKind::InvalidData, e)
	})?;
	data.push(b'\n');
	writer.write_all(&data).await
}
