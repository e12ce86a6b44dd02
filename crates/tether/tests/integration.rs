use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use tether::client::{self, ClientError, DaemonClient};
use tether::server::{run_socket_server, Reply};
use tether::DaemonPaths;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum Req {
	Ping,
	Add(i32, i32),
	Count(u32),
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum Resp {
	Pong,
	Sum(i32),
	Tick(u32),
	Error(String),
}

fn temp_paths() -> (tempfile::TempDir, DaemonPaths) {
	let tmp = tempfile::tempdir().unwrap();
	let paths = DaemonPaths::with_root("tether-test", tmp.path());
	std::fs::create_dir_all(paths.state_dir()).unwrap();
	(tmp, paths)
}

async fn handle(req: Req) -> Reply<Resp> {
	match req {
		Req::Ping => Resp::Pong.into(),
		Req::Add(a, b) => Resp::Sum(a + b).into(),
		Req::Count(n) => {
			let (tx, rx) = mpsc::channel(4);
			tokio::spawn(async move {
				for i in 0..n {
					if tx.send(Resp::Tick(i)).await.is_err() {
						break;
					}
				}
			});
			Reply::Stream(rx)
		}
	}
}

async fn serve(paths: &DaemonPaths) -> tokio::task::JoinHandle<()> {
	let server_paths = paths.clone();
	let server = tokio::spawn(async move {
		let _ = run_socket_server(&server_paths, handle, Resp::Error).await;
	});
	for _ in 0..50 {
		if client::is_running(paths) {
			break;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	server
}

// --- Client helpers ---

#[test]
fn is_running_false_when_no_socket() {
	let (_tmp, paths) = temp_paths();
	assert!(!client::is_running(&paths));
}

#[test]
fn read_pid_parses_file() {
	let (_tmp, paths) = temp_paths();
	assert_eq!(client::read_pid(&paths), None);
	std::fs::write(paths.pid_path(), "12345\n").unwrap();
	assert_eq!(client::read_pid(&paths), Some(12345));
	std::fs::write(paths.pid_path(), "not-a-number").unwrap();
	assert_eq!(client::read_pid(&paths), None);
}

#[test]
fn connect_without_server_is_not_running() {
	let (_tmp, paths) = temp_paths();
	match DaemonClient::<Req, Resp>::connect(&paths) {
		Err(ClientError::NotRunning) => {}
		Err(other) => panic!("expected NotRunning, got {:?}", other),
		Ok(_) => panic!("expected error, got Ok"),
	}
}

#[test]
fn stop_without_pid_file_is_not_running() {
	let (_tmp, paths) = temp_paths();
	let daemon = tether::Daemon::new(paths);
	assert!(matches!(daemon.stop(), Err(tether::DaemonError::NotRunning)));
}

// --- Client + server ---

#[tokio::test(flavor = "multi_thread")]
async fn request_response_roundtrip() {
	let (_tmp, paths) = temp_paths();
	let server = serve(&paths).await;

	let client_paths = paths.clone();
	tokio::task::spawn_blocking(move || {
		let mut client = DaemonClient::<Req, Resp>::connect(&client_paths).unwrap();
		assert_eq!(client.send(&Req::Ping).unwrap(), Resp::Pong);
		assert_eq!(client.send(&Req::Add(3, 7)).unwrap(), Resp::Sum(10));
	})
	.await
	.unwrap();

	server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_reply_pushes_until_sender_drops() {
	let (_tmp, paths) = temp_paths();
	let server = serve(&paths).await;

	let client_paths = paths.clone();
	let ticks = tokio::task::spawn_blocking(move || {
		let client = DaemonClient::<Req, Resp>::connect(&client_paths).unwrap();
		client
			.stream(&Req::Count(5))
			.unwrap()
			.collect::<Result<Vec<_>, _>>()
			.unwrap()
	})
	.await
	.unwrap();
	assert_eq!(ticks, (0..5).map(Resp::Tick).collect::<Vec<_>>());

	server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_request_gets_error_reply() {
	use std::io::{BufRead, BufReader, Write};
	use std::os::unix::net::UnixStream;

	let (_tmp, paths) = temp_paths();
	let server = serve(&paths).await;

	let socket = paths.socket_path();
	let line = tokio::task::spawn_blocking(move || {
		let mut stream = UnixStream::connect(socket).unwrap();
		stream.write_all(b"{\"Nope\":1}\n").unwrap();
		let mut line = String::new();
		BufReader::new(&stream).read_line(&mut line).unwrap();
		line
	})
	.await
	.unwrap();

	let resp: Resp = serde_json::from_str(&line).unwrap();
	assert!(matches!(resp, Resp::Error(_)));

	server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn multiple_clients_are_served() {
	let (_tmp, paths) = temp_paths();
	let server = serve(&paths).await;

	let mut joins = Vec::new();
	for i in 0..5 {
		let client_paths = paths.clone();
		joins.push(tokio::task::spawn_blocking(move || {
			let mut client = DaemonClient::<Req, Resp>::connect(&client_paths).unwrap();
			client.send(&Req::Add(i, i)).unwrap()
		}));
	}
	for (i, join) in joins.into_iter().enumerate() {
		assert_eq!(join.await.unwrap(), Resp::Sum(2 * i as i32));
	}

	server.abort();
}
