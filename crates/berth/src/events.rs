use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{RunStatus, ServiceDefinition, ServiceInfo};

const EVENT_CAPACITY: usize = 1024;

/// Everything the engine tells the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
	ServiceStatus {
		id: String,
		status: RunStatus,
		pid: Option<u32>,
	},
	/// Output coalesced over one flush interval. Bytes are forwarded as produced.
	ServiceLog {
		id: String,
		#[serde(with = "lossy_text")]
		log: Vec<u8>,
	},
	ServiceAdded {
		definition: ServiceDefinition,
	},
	ServiceRemoved {
		id: String,
	},
	InitServices {
		services: Vec<ServiceInfo>,
		#[serde(rename = "rootDirectory")]
		root_directory: String,
	},
}

impl Event {
	pub fn service_id(&self) -> Option<&str> {
		match self {
			Event::ServiceStatus { id, .. }
			| Event::ServiceLog { id, .. }
			| Event::ServiceRemoved { id } => Some(id.as_str()),
			Event::ServiceAdded { definition } => Some(definition.id.as_str()),
			Event::InitServices { .. } => None,
		}
	}
}

/// Fan-out of engine events. Emitting with no subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	pub fn new() -> Self {
		let (sender, _) = broadcast::channel(EVENT_CAPACITY);
		Self { sender }
	}

	pub fn emit(&self, event: Event) {
		let _ = self.sender.send(event);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

// JSON consumers get text; invalid UTF-8 is replaced rather than rejected.
mod lossy_text {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&String::from_utf8_lossy(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		Ok(String::deserialize(deserializer)?.into_bytes())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_names_match_consumer_contract() {
		let status = Event::ServiceStatus {
			id: "web".into(),
			status: RunStatus::Stopped,
			pid: None,
		};
		let json = serde_json::to_string(&status).unwrap();
		assert_eq!(json, r#"{"event":"service-status","id":"web","status":"stopped","pid":null}"#);

		let log = Event::ServiceLog {
			id: "web".into(),
			log: b"\x1b[32mready\x1b[0m\n".to_vec(),
		};
		let json = serde_json::to_string(&log).unwrap();
		assert!(json.contains(r#""event":"service-log""#));
		assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), log);

		let init = Event::InitServices {
			services: vec![],
			root_directory: "/src".into(),
		};
		assert!(serde_json::to_string(&init).unwrap().contains(r#""rootDirectory":"/src""#));
	}

	#[tokio::test]
	async fn subscribers_receive_in_order() {
		let bus = EventBus::new();
		let mut rx = bus.subscribe();
		bus.emit(Event::ServiceRemoved { id: "a".into() });
		bus.emit(Event::ServiceRemoved { id: "b".into() });
		assert_eq!(rx.recv().await.unwrap().service_id(), Some("a"));
		assert_eq!(rx.recv().await.unwrap().service_id(), Some("b"));
	}
}
