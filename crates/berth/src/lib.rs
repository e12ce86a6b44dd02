//! # berth
//!
//! Supervision engine for local development services.
//!
//! A profile names a set of services (id, display name, directory, launch
//! command). The [`Supervisor`] starts and stops them through the platform
//! shell, keeps a bounded log file per service, batches live output into
//! events, and runs one-off commands (usually git) inside a service's
//! directory under a timeout.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use berth::{Event, JsonProfileStore, ServiceDefinition, Supervisor, SupervisorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> berth::Result<()> {
//! let store = Arc::new(JsonProfileStore::new("/tmp/berth/profiles"));
//! let sup = Supervisor::spawn(
//!     SupervisorConfig::new("/tmp/berth/logs", "/tmp"),
//!     store,
//!     "default",
//! );
//!
//! let mut events = sup.subscribe();
//! sup.add_service(ServiceDefinition::new("web", "Web", ".", "echo hello")).await?;
//! sup.start("web");
//!
//! while let Ok(event) = events.recv().await {
//!     if let Event::ServiceLog { log, .. } = event {
//!         print!("{}", String::from_utf8_lossy(&log));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logs;
pub mod output;
pub mod registry;
pub mod runner;
pub mod shell;
pub mod supervisor;
pub mod terminate;
pub mod types;

pub use config::{EngineConfig, SupervisorConfig};
pub use error::{Error, Result};
pub use events::{Event, EventBus};
pub use registry::{JsonProfileStore, ProfileStore, ServiceRegistry, DEFAULT_PROFILE};
pub use runner::CommandRunner;
pub use supervisor::Supervisor;
pub use types::*;
