pub mod api;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use berth::{Event, JsonProfileStore, Supervisor, SupervisorConfig};
use tether::Reply;
use tokio::sync::{broadcast, mpsc, Notify};
use tracing_subscriber::EnvFilter;

use crate::config;
use crate::protocol::{self, Request, Response};

const WATCH_BUFFER: usize = 256;

pub async fn run(enable_http: bool) {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let paths = protocol::daemon_paths();
	let global_config = config::load_global_config(&paths);
	let enable_http = enable_http || global_config.daemon.http;

	let store = Arc::new(JsonProfileStore::new(paths.config_dir().join("profiles")));
	let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	let mut sup_config = SupervisorConfig::new(paths.state_dir().join("logs"), base_dir);
	sup_config.settings = global_config.engine.clone();
	let supervisor = Supervisor::spawn(sup_config, store, &global_config.daemon.default_profile);

	let http_handle = if enable_http {
		let sup_http = supervisor.clone();
		let port = global_config.daemon.port;
		Some(tokio::spawn(async move {
			run_http_server(sup_http, port).await;
		}))
	} else {
		None
	};

	let stop = Arc::new(Notify::new());
	let handler = {
		let supervisor = supervisor.clone();
		let stop = Arc::clone(&stop);
		move |req: Request| {
			let sup = supervisor.clone();
			let stop = Arc::clone(&stop);
			async move { handle_request(&sup, &stop, req).await }
		}
	};
	let shutdown = {
		let stop = Arc::clone(&stop);
		async move {
			tokio::select! {
				_ = tether::shutdown_signal() => {},
				_ = stop.notified() => {},
			}
		}
	};

	let daemon = tether::Daemon::new(paths);
	if let Err(e) = daemon.run(handler, |message| Response::Error { message }, shutdown).await {
		tracing::error!("socket server failed: {}", e);
	}
	if let Some(handle) = http_handle {
		handle.abort();
	}

	let grace = global_config.engine.supervisor.kill_grace_ms;
	let deadline = Duration::from_millis(grace) + Duration::from_secs(2);
	match tokio::time::timeout(deadline, supervisor.shutdown()).await {
		Ok(Ok(())) => tracing::info!("daemon stopped"),
		Ok(Err(e)) => tracing::warn!("shutdown: {}", e),
		Err(_) => tracing::warn!("services still running after {:?}", deadline),
	}
}

async fn handle_request(supervisor: &Supervisor, stop: &Notify, request: Request) -> Reply<Response> {
	let response = match request {
		Request::Ping => Response::Pong,
		Request::Version => Response::Version {
			version: Supervisor::version().to_string(),
		},
		Request::List => match supervisor.snapshot().await {
			Ok(snapshot) => Response::Services {
				services: snapshot.services,
				root_directory: snapshot.root_directory,
			},
			Err(e) => Response::error(e),
		},
		Request::Start { ids, all } => {
			if all {
				supervisor.start_all();
			} else {
				ids.iter().for_each(|id| supervisor.start(id));
			}
			Response::ok(describe("starting", &ids, all))
		}
		Request::Stop { ids, all } => {
			if all {
				supervisor.stop_all();
			} else {
				ids.iter().for_each(|id| supervisor.stop(id));
			}
			Response::ok(describe("stopping", &ids, all))
		}
		Request::Restart { ids, all } => {
			if all {
				supervisor.restart_all();
			} else {
				ids.iter().for_each(|id| supervisor.restart(id));
			}
			Response::ok(describe("restarting", &ids, all))
		}
		Request::Add { definition } => {
			let id = definition.id.clone();
			done(supervisor.add_service(definition).await, format!("added {}", id))
		}
		Request::Remove { id } => done(supervisor.remove_service(&id).await, format!("removed {}", id)),
		Request::Update { definition } => {
			let id = definition.id.clone();
			done(supervisor.update_service(definition).await, format!("updated {}", id))
		}
		Request::Reorder { ids } => done(supervisor.reorder_services(ids).await, "reordered"),
		Request::Exec { id, command } => Response::Command(supervisor.execute(&id, &command).await),
		Request::Branch { id } => Response::Branch {
			branch: supervisor.branch(&id).await,
		},
		Request::Logs { id } => Response::Logs {
			text: supervisor.logs(&id).await,
		},
		Request::ClearLogs { id } => match supervisor.clear_logs(&id).await {
			Ok(true) => Response::ok(format!("cleared {}", id)),
			Ok(false) => Response::ok(format!("no logs for {}", id)),
			Err(e) => Response::error(e),
		},
		Request::Profiles => Response::Profiles {
			profiles: supervisor.profiles().await,
		},
		Request::SwitchProfile { name } => match supervisor.switch_profile(&name).await {
			Ok(snapshot) => Response::Services {
				services: snapshot.services,
				root_directory: snapshot.root_directory,
			},
			Err(e) => Response::error(e),
		},
		Request::CreateProfile { name, root_directory } => {
			match supervisor.create_profile(&name, &root_directory).await {
				Ok(true) => Response::ok(format!("created profile {}", name)),
				Ok(false) => Response::ok(format!("profile {} already exists", name)),
				Err(e) => Response::error(e),
			}
		}
		Request::DeleteProfile { name } => match supervisor.delete_profile(&name).await {
			Ok(true) => Response::ok(format!("deleted profile {}", name)),
			Ok(false) => Response::error(format!("no such profile: {}", name)),
			Err(e) => Response::error(e),
		},
		Request::UpdateProfileRoot { name, root_directory } => done(
			supervisor.update_profile_root(&name, &root_directory).await,
			format!("{} now rooted at {}", name, root_directory),
		),
		Request::SetLogLines { max_lines } => {
			supervisor.set_max_log_lines(max_lines);
			Response::ok(format!("keeping {} lines per log", max_lines))
		}
		Request::Watch => return Reply::Stream(watch(supervisor).await),
		Request::Shutdown => {
			stop.notify_one();
			Response::ok("shutting down")
		}
	};
	Reply::Once(response)
}

/// Streams every engine event to the client, starting with the current
/// service list so a late subscriber has a consistent picture.
async fn watch(supervisor: &Supervisor) -> mpsc::Receiver<Response> {
	let (tx, rx) = mpsc::channel(WATCH_BUFFER);
	let mut events = supervisor.subscribe();
	let snapshot = supervisor.snapshot().await;

	tokio::spawn(async move {
		if let Ok(snapshot) = snapshot {
			let init = Event::InitServices {
				services: snapshot.services,
				root_directory: snapshot.root_directory,
			};
			if tx.send(Response::Event { event: init }).await.is_err() {
				return;
			}
		}
		loop {
			match events.recv().await {
				Ok(event) => {
					if tx.send(Response::Event { event }).await.is_err() {
						break;
					}
				}
				Err(broadcast::error::RecvError::Lagged(n)) => {
					tracing::warn!("watcher fell behind, dropped {} events", n);
				}
				Err(broadcast::error::RecvError::Closed) => break,
			}
		}
	});
	rx
}

fn done(result: berth::Result<()>, message: impl Into<String>) -> Response {
	match result {
		Ok(()) => Response::ok(message),
		Err(e) => Response::error(e),
	}
}

fn describe(verb: &str, ids: &[String], all: bool) -> String {
	if all {
		format!("{} all services", verb)
	} else {
		format!("{} {}", verb, ids.join(", "))
	}
}

async fn run_http_server(supervisor: Supervisor, port: u16) {
	let app = api::router(supervisor);
	let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind HTTP on {}: {}", addr, e);
			return;
		}
	};
	tracing::info!("HTTP listening on {}", addr);
	if let Err(e) = axum::serve(listener, app).await {
		tracing::error!("HTTP server error: {}", e);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn describes_targets() {
		assert_eq!(describe("starting", &[], true), "starting all services");
		assert_eq!(
			describe("stopping", &["api".into(), "web".into()], false),
			"stopping api, web"
		);
	}

	#[tokio::test]
	async fn requests_map_onto_supervisor() {
		let tmp = tempfile::tempdir().unwrap();
		let store = Arc::new(JsonProfileStore::new(tmp.path().join("profiles")));
		let sup = Supervisor::spawn(
			SupervisorConfig::new(tmp.path().join("logs"), tmp.path()),
			store,
			berth::DEFAULT_PROFILE,
		);
		let stop = Notify::new();

		let definition = berth::ServiceDefinition::new("web", "Web", ".", "true");
		let reply = handle_request(&sup, &stop, Request::Add { definition }).await;
		assert!(matches!(reply, Reply::Once(Response::Ok { .. })));

		match handle_request(&sup, &stop, Request::List).await {
			Reply::Once(Response::Services { services, .. }) => assert_eq!(services[0].id, "web"),
			_ => panic!("expected service list"),
		}

		match handle_request(&sup, &stop, Request::Exec { id: "web".into(), command: "echo hi".into() }).await {
			Reply::Once(Response::Command(outcome)) => assert_eq!(outcome.output, "hi"),
			_ => panic!("expected command outcome"),
		}

		let reply = handle_request(&sup, &stop, Request::Remove { id: "nope".into() }).await;
		assert!(matches!(reply, Reply::Once(Response::Error { .. })));

		match handle_request(&sup, &stop, Request::Watch).await {
			Reply::Stream(mut rx) => match rx.recv().await {
				Some(Response::Event { event: Event::InitServices { services, .. } }) => {
					assert_eq!(services.len(), 1)
				}
				_ => panic!("expected initial snapshot"),
			},
			_ => panic!("expected stream"),
		}
	}
}
