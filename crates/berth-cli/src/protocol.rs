use berth::{CommandOutcome, Event, ServiceDefinition, ServiceInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
	List,
	Start {
		#[serde(default)]
		ids: Vec<String>,
		#[serde(default)]
		all: bool,
	},
	Stop {
		#[serde(default)]
		ids: Vec<String>,
		#[serde(default)]
		all: bool,
	},
	Restart {
		#[serde(default)]
		ids: Vec<String>,
		#[serde(default)]
		all: bool,
	},
	Add { definition: ServiceDefinition },
	Remove { id: String },
	Update { definition: ServiceDefinition },
	Reorder { ids: Vec<String> },
	Exec { id: String, command: String },
	Branch { id: String },
	Logs { id: String },
	ClearLogs { id: String },
	Profiles,
	SwitchProfile { name: String },
	CreateProfile {
		name: String,
		#[serde(default)]
		root_directory: String,
	},
	DeleteProfile { name: String },
	UpdateProfileRoot { name: String, root_directory: String },
	SetLogLines { max_lines: usize },
	/// Subscribes the connection to engine events.
	Watch,
	Version,
	Ping,
	Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Ok { message: Option<String> },
	Services { services: Vec<ServiceInfo>, root_directory: String },
	Command(CommandOutcome),
	Branch { branch: String },
	Logs { text: String },
	Profiles { profiles: Vec<String> },
	Event { event: Event },
	Version { version: String },
	Error { message: String },
	Pong,
}

impl Response {
	pub fn ok(message: impl Into<String>) -> Self {
		Response::Ok { message: Some(message.into()) }
	}

	pub fn error(message: impl ToString) -> Self {
		Response::Error { message: message.to_string() }
	}
}

pub fn daemon_paths() -> tether::DaemonPaths {
	tether::DaemonPaths::new("berth")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn requests_are_tagged() {
		let json = serde_json::to_value(Request::Start { ids: vec!["web".into()], all: false }).unwrap();
		assert_eq!(json["cmd"], "start");
		assert_eq!(json["ids"][0], "web");

		let parsed: Request = serde_json::from_str(r#"{"cmd":"stop","all":true}"#).unwrap();
		assert!(matches!(parsed, Request::Stop { ids, all: true } if ids.is_empty()));
	}

	#[test]
	fn command_outcome_is_inlined() {
		let json = serde_json::to_value(Response::Command(CommandOutcome::failure("boom"))).unwrap();
		assert_eq!(json["type"], "command");
		assert_eq!(json["success"], false);
		assert_eq!(json["output"], "boom");
	}
}
