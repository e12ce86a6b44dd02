use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use berth::{CommandOutcome, Event, ProfileSnapshot, ServiceDefinition, Supervisor};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Supervisor,
}

pub fn router(supervisor: Supervisor) -> Router {
	let state = AppState { supervisor };

	Router::new()
		.route("/api/services", get(list_services).post(add_service))
		.route("/api/order", put(reorder_services))
		.route("/api/services/{id}", put(update_service).delete(remove_service))
		.route("/api/services/{id}/{action}", post(control_service))
		.route("/api/services/{id}/exec", post(execute_command))
		.route("/api/services/{id}/branch", get(git_branch))
		.route("/api/services/{id}/logs", get(service_logs).delete(clear_logs))
		.route("/api/all/{action}", post(control_all))
		.route("/api/profiles", get(list_profiles).post(create_profile))
		.route("/api/profiles/{name}", axum::routing::delete(delete_profile))
		.route("/api/profiles/{name}/switch", post(switch_profile))
		.route("/api/profiles/{name}/root", put(update_profile_root))
		.route("/api/config/logs", put(update_log_config))
		.route("/api/version", get(version))
		.route("/ws/events", get(ws_events))
		.layer(CorsLayer::permissive())
		.with_state(state)
}

#[derive(Serialize)]
struct ActionResponse {
	message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
	error: String,
}

struct ApiError(StatusCode, String);

impl From<berth::Error> for ApiError {
	fn from(e: berth::Error) -> Self {
		let status = match &e {
			berth::Error::NotFound(_) | berth::Error::ProfileNotFound(_) => StatusCode::NOT_FOUND,
			berth::Error::InvalidProfileName(_) => StatusCode::BAD_REQUEST,
			berth::Error::Busy(_) => StatusCode::CONFLICT,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};
		ApiError(status, e.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.0, Json(ErrorResponse { error: self.1 })).into_response()
	}
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn action(message: impl Into<String>) -> ApiResult<ActionResponse> {
	Ok(Json(ActionResponse { message: message.into() }))
}

// ── Services ────────────────────────────────────────────────────────────────

async fn list_services(State(state): State<AppState>) -> ApiResult<ProfileSnapshot> {
	Ok(Json(state.supervisor.snapshot().await?))
}

async fn add_service(
	State(state): State<AppState>,
	Json(definition): Json<ServiceDefinition>,
) -> ApiResult<ActionResponse> {
	let id = definition.id.clone();
	state.supervisor.add_service(definition).await?;
	action(format!("added {}", id))
}

async fn update_service(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(mut definition): Json<ServiceDefinition>,
) -> ApiResult<ActionResponse> {
	definition.id = id.clone();
	state.supervisor.update_service(definition).await?;
	action(format!("updated {}", id))
}

async fn remove_service(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> ApiResult<ActionResponse> {
	state.supervisor.remove_service(&id).await?;
	action(format!("removed {}", id))
}

async fn reorder_services(
	State(state): State<AppState>,
	Json(ids): Json<Vec<String>>,
) -> ApiResult<ActionResponse> {
	state.supervisor.reorder_services(ids).await?;
	action("reordered")
}

async fn control_service(
	State(state): State<AppState>,
	Path((id, verb)): Path<(String, String)>,
) -> ApiResult<ActionResponse> {
	let sup = &state.supervisor;
	match verb.as_str() {
		"start" => sup.start(&id),
		"stop" => sup.stop(&id),
		"restart" => sup.restart(&id),
		_ => return Err(ApiError(StatusCode::NOT_FOUND, format!("unknown action: {}", verb))),
	}
	action(format!("{} {}", verb, id))
}

async fn control_all(
	State(state): State<AppState>,
	Path(verb): Path<String>,
) -> ApiResult<ActionResponse> {
	let sup = &state.supervisor;
	match verb.as_str() {
		"start" => sup.start_all(),
		"stop" => sup.stop_all(),
		"restart" => sup.restart_all(),
		_ => return Err(ApiError(StatusCode::NOT_FOUND, format!("unknown action: {}", verb))),
	}
	action(format!("{} all", verb))
}

#[derive(Deserialize)]
struct ExecBody {
	command: String,
}

async fn execute_command(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(body): Json<ExecBody>,
) -> Json<CommandOutcome> {
	Json(state.supervisor.execute(&id, &body.command).await)
}

#[derive(Serialize)]
struct BranchResponse {
	branch: String,
}

async fn git_branch(State(state): State<AppState>, Path(id): Path<String>) -> Json<BranchResponse> {
	Json(BranchResponse {
		branch: state.supervisor.branch(&id).await,
	})
}

async fn service_logs(State(state): State<AppState>, Path(id): Path<String>) -> String {
	state.supervisor.logs(&id).await
}

async fn clear_logs(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> ApiResult<ActionResponse> {
	state.supervisor.clear_logs(&id).await?;
	action(format!("cleared {}", id))
}

// ── Profiles ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewProfile {
	name: String,
	#[serde(default)]
	root_directory: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RootBody {
	root_directory: String,
}

#[derive(Serialize)]
struct RootUpdate {
	success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

async fn list_profiles(State(state): State<AppState>) -> Json<Vec<String>> {
	Json(state.supervisor.profiles().await)
}

async fn create_profile(
	State(state): State<AppState>,
	Json(body): Json<NewProfile>,
) -> ApiResult<ActionResponse> {
	let created = state.supervisor.create_profile(&body.name, &body.root_directory).await?;
	if created {
		action(format!("created profile {}", body.name))
	} else {
		action(format!("profile {} already exists", body.name))
	}
}

async fn delete_profile(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> ApiResult<ActionResponse> {
	if !state.supervisor.delete_profile(&name).await? {
		return Err(ApiError(StatusCode::NOT_FOUND, format!("no such profile: {}", name)));
	}
	action(format!("deleted profile {}", name))
}

async fn switch_profile(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> ApiResult<ProfileSnapshot> {
	Ok(Json(state.supervisor.switch_profile(&name).await?))
}

async fn update_profile_root(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(body): Json<RootBody>,
) -> Json<RootUpdate> {
	let result = state
		.supervisor
		.update_profile_root(&name, &body.root_directory)
		.await;
	Json(match result {
		Ok(()) => RootUpdate { success: true, error: None },
		Err(e) => RootUpdate { success: false, error: Some(e.to_string()) },
	})
}

// ── Misc ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogConfigBody {
	max_log_lines: usize,
}

async fn update_log_config(
	State(state): State<AppState>,
	Json(body): Json<LogConfigBody>,
) -> ApiResult<ActionResponse> {
	state.supervisor.set_max_log_lines(body.max_log_lines);
	action(format!("keeping {} lines per log", body.max_log_lines))
}

#[derive(Serialize)]
struct VersionResponse {
	version: &'static str,
}

async fn version() -> Json<VersionResponse> {
	Json(VersionResponse {
		version: Supervisor::version(),
	})
}

// ── Event stream ────────────────────────────────────────────────────────────

async fn ws_events(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
	ws.on_upgrade(move |socket| handle_ws_events(socket, state))
}

async fn handle_ws_events(mut socket: WebSocket, state: AppState) {
	let mut events = state.supervisor.subscribe();

	if let Ok(snapshot) = state.supervisor.snapshot().await {
		let init = Event::InitServices {
			services: snapshot.services,
			root_directory: snapshot.root_directory,
		};
		if send_event(&mut socket, &init).await.is_err() {
			return;
		}
	}

	loop {
		tokio::select! {
			received = events.recv() => match received {
				Ok(event) => {
					if send_event(&mut socket, &event).await.is_err() {
						break;
					}
				}
				Err(broadcast::error::RecvError::Lagged(n)) => {
					tracing::warn!("websocket client fell behind, dropped {} events", n);
				}
				Err(broadcast::error::RecvError::Closed) => break,
			},
			incoming = socket.recv() => match incoming {
				Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
				Some(Ok(_)) => {}
			},
		}
	}
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<(), ()> {
	let text = serde_json::to_string(event).map_err(|e| {
		tracing::error!("failed to serialize event: {}", e);
	})?;
	socket.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn engine_errors_map_to_status_codes() {
		let cases = [
			(berth::Error::NotFound("web".into()), StatusCode::NOT_FOUND),
			(berth::Error::ProfileNotFound("work".into()), StatusCode::NOT_FOUND),
			(berth::Error::InvalidProfileName("../x".into()), StatusCode::BAD_REQUEST),
			(berth::Error::Busy("shut down".into()), StatusCode::CONFLICT),
			(berth::Error::Closed, StatusCode::INTERNAL_SERVER_ERROR),
		];
		for (error, expected) in cases {
			let ApiError(status, _) = ApiError::from(error);
			assert_eq!(status, expected);
		}
	}

	#[test]
	fn root_update_omits_missing_error() {
		let ok = serde_json::to_value(RootUpdate { success: true, error: None }).unwrap();
		assert_eq!(ok, serde_json::json!({ "success": true }));
	}
}
