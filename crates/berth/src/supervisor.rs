use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::logs;
use crate::output::{OutputSink, SessionLog};
use crate::registry::{validate_profile_name, ProfileStore, ServiceRegistry, DEFAULT_PROFILE};
use crate::runner::CommandRunner;
use crate::shell::Shell;
use crate::terminate::{platform_terminator, TreeTerminator};
use crate::types::*;

/// How long a reaped process's pipes may stay open (held by a detached
/// descendant) before the remaining output is abandoned.
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

type Reply<T> = oneshot::Sender<Result<T>>;

enum Control {
	Start(String),
	Stop(String),
	/// The start half of a restart, sent once the delay has passed.
	Relaunch(String),
	StartAll,
	RelaunchAll,
	StopAll,
	Add(ServiceDefinition, Reply<()>),
	Remove(String, Reply<()>),
	Update(ServiceDefinition, Reply<()>),
	Reorder(Vec<String>, Reply<()>),
	List(oneshot::Sender<ProfileSnapshot>),
	WorkingDir(String, oneshot::Sender<Option<PathBuf>>),
	ClearLogs(String, Reply<bool>),
	SetMaxLines(usize),
	UpdateRoot {
		profile: String,
		root_directory: String,
		reply: Reply<()>,
	},
	SwitchProfile(String, Reply<ProfileSnapshot>),
	Shutdown(oneshot::Sender<()>),
}

/// What the OS side of a running session reports back to the engine.
enum Notice {
	Output { id: String, session: u64, data: Vec<u8> },
	Exited { id: String, session: u64, code: Option<i32> },
	GraceExpired { id: String, session: u64 },
}

/// A live process attached to a service id.
struct Attached {
	session: u64,
	pid: u32,
	log: Option<SessionLog>,
	stopping: bool,
}

/// Work that may only complete once no process is attached.
enum Drain {
	Switch { profile: String, reply: Reply<ProfileSnapshot> },
	Shutdown(oneshot::Sender<()>),
}

/// Handle to the supervision engine.
///
/// All state lives in a single engine task; this handle only posts requests
/// to it, so it is cheap to clone and share. Control operations such as
/// [`start`](Self::start) and [`stop`](Self::stop) return immediately;
/// outcomes are observed through [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct Supervisor {
	control: mpsc::UnboundedSender<Control>,
	events: EventBus,
	store: Arc<dyn ProfileStore>,
	runner: CommandRunner,
	log_dir: PathBuf,
	read_limit: u64,
	restart_delay: Duration,
}

impl Supervisor {
	/// Loads `profile` from `store` and starts the engine task. Must be called
	/// from within a Tokio runtime.
	pub fn spawn(config: SupervisorConfig, store: Arc<dyn ProfileStore>, profile: &str) -> Self {
		let terminator: Arc<dyn TreeTerminator> = Arc::from(platform_terminator());
		let events = EventBus::new();
		let settings = &config.settings;

		let registry = match ServiceRegistry::load(Arc::clone(&store), profile) {
			Ok(registry) => registry,
			Err(e) => {
				tracing::warn!("failed to load profile {}: {}", profile, e);
				ServiceRegistry::empty(Arc::clone(&store), profile)
			}
		};
		tracing::info!(
			"loaded profile {} ({} services)",
			profile,
			registry.definitions().len()
		);

		let (control_tx, control_rx) = mpsc::unbounded_channel();
		let (notice_tx, notice_rx) = mpsc::unbounded_channel();

		let engine = Engine {
			registry,
			store: Arc::clone(&store),
			table: HashMap::new(),
			sink: OutputSink::new(settings.flush_interval()),
			events: events.clone(),
			notices: notice_tx,
			terminator: Arc::clone(&terminator),
			shell: Shell::for_services(),
			log_dir: config.log_dir.clone(),
			base_dir: config.base_dir.clone(),
			max_lines: settings.logs.max_lines,
			kill_grace: settings.kill_grace(),
			next_session: 1,
			drains: Vec::new(),
			closed: false,
		};
		tokio::spawn(engine.run(control_rx, notice_rx));

		Self {
			control: control_tx,
			events,
			store,
			runner: CommandRunner::new(Shell::for_commands(), config.command_timeout(), terminator),
			log_dir: config.log_dir.clone(),
			read_limit: settings.logs.read_limit_bytes,
			restart_delay: settings.restart_delay(),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	pub fn version() -> &'static str {
		env!("CARGO_PKG_VERSION")
	}

	fn send(&self, msg: Control) {
		if self.control.send(msg).is_err() {
			tracing::warn!("supervisor is no longer running");
		}
	}

	async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Control) -> Result<T> {
		let (tx, rx) = oneshot::channel();
		self.control.send(make(tx)).map_err(|_| Error::Closed)?;
		rx.await.map_err(|_| Error::Closed)
	}

	// ── Lifecycle (fire-and-forget) ─────────────────────────────────────────

	pub fn start(&self, id: &str) {
		self.send(Control::Start(id.to_string()));
	}

	pub fn stop(&self, id: &str) {
		self.send(Control::Stop(id.to_string()));
	}

	/// Stops, then starts again after the restart delay so ports and file
	/// locks can be released. The delay applies even if nothing was running.
	pub fn restart(&self, id: &str) {
		self.stop(id);
		self.after_delay(Control::Relaunch(id.to_string()));
	}

	pub fn start_all(&self) {
		self.send(Control::StartAll);
	}

	pub fn stop_all(&self) {
		self.send(Control::StopAll);
	}

	pub fn restart_all(&self) {
		self.stop_all();
		self.after_delay(Control::RelaunchAll);
	}

	fn after_delay(&self, msg: Control) {
		let control = self.control.clone();
		let delay = self.restart_delay;
		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			let _ = control.send(msg);
		});
	}

	/// Stops every service and waits until all of them are reaped. Anything
	/// that ignores the polite request is killed after the grace period.
	/// No further starts are accepted afterwards.
	pub async fn shutdown(&self) -> Result<()> {
		self.request(Control::Shutdown).await
	}

	// ── Registry ────────────────────────────────────────────────────────────

	pub async fn add_service(&self, definition: ServiceDefinition) -> Result<()> {
		self.request(|tx| Control::Add(definition, tx)).await?
	}

	pub async fn remove_service(&self, id: &str) -> Result<()> {
		self.request(|tx| Control::Remove(id.to_string(), tx)).await?
	}

	pub async fn update_service(&self, definition: ServiceDefinition) -> Result<()> {
		self.request(|tx| Control::Update(definition, tx)).await?
	}

	pub async fn reorder_services(&self, ids: Vec<String>) -> Result<()> {
		self.request(|tx| Control::Reorder(ids, tx)).await?
	}

	pub async fn services(&self) -> Result<Vec<ServiceInfo>> {
		Ok(self.snapshot().await?.services)
	}

	pub async fn snapshot(&self) -> Result<ProfileSnapshot> {
		self.request(Control::List).await
	}

	// ── Profiles ────────────────────────────────────────────────────────────

	/// Saved profile names; falls back to the default profile if the store
	/// cannot be listed.
	pub async fn profiles(&self) -> Vec<String> {
		let store = Arc::clone(&self.store);
		match blocking(move || store.list()).await {
			Ok(names) => names,
			Err(e) => {
				tracing::debug!("failed to list profiles: {}", e);
				vec![DEFAULT_PROFILE.to_string()]
			}
		}
	}

	pub async fn create_profile(&self, name: &str, root_directory: &str) -> Result<bool> {
		let store = Arc::clone(&self.store);
		let (name, root) = (name.to_string(), root_directory.to_string());
		blocking(move || store.create(&name, &root)).await
	}

	pub async fn delete_profile(&self, name: &str) -> Result<bool> {
		let store = Arc::clone(&self.store);
		let name = name.to_string();
		blocking(move || store.delete(&name)).await
	}

	pub async fn update_profile_root(&self, profile: &str, root_directory: &str) -> Result<()> {
		self.request(|reply| Control::UpdateRoot {
			profile: profile.to_string(),
			root_directory: root_directory.to_string(),
			reply,
		})
		.await?
	}

	/// Stops everything, waits for every process to be reaped, then loads
	/// `name` with all services stopped.
	pub async fn switch_profile(&self, name: &str) -> Result<ProfileSnapshot> {
		self.request(|tx| Control::SwitchProfile(name.to_string(), tx))
			.await?
	}

	// ── One-off commands ────────────────────────────────────────────────────

	pub async fn execute(&self, id: &str, command_line: &str) -> CommandOutcome {
		match self.working_dir(id).await {
			Ok(Some(dir)) => self.runner.execute(&dir, command_line).await,
			Ok(None) => CommandOutcome::failure("Service not found"),
			Err(e) => CommandOutcome::failure(e.to_string()),
		}
	}

	pub async fn branch(&self, id: &str) -> String {
		match self.working_dir(id).await {
			Ok(Some(dir)) => self.runner.branch(&dir).await,
			_ => BRANCH_NOT_APPLICABLE.to_string(),
		}
	}

	async fn working_dir(&self, id: &str) -> Result<Option<PathBuf>> {
		self.request(|tx| Control::WorkingDir(id.to_string(), tx))
			.await
	}

	// ── Logs ────────────────────────────────────────────────────────────────

	pub async fn logs(&self, id: &str) -> String {
		let path = logs::log_path(&self.log_dir, id);
		let limit = self.read_limit;
		match tokio::task::spawn_blocking(move || logs::read_log(&path, limit)).await {
			Ok(text) => text,
			Err(e) => format!("Error reading logs: {}", e),
		}
	}

	/// Empties the service's log file. A running session marks the point of
	/// clearing so its output stays contiguous.
	pub async fn clear_logs(&self, id: &str) -> Result<bool> {
		self.request(|tx| Control::ClearLogs(id.to_string(), tx))
			.await?
	}

	/// Changes the line bound used at the next session boundary.
	pub fn set_max_log_lines(&self, max_lines: usize) {
		self.send(Control::SetMaxLines(max_lines));
	}
}

async fn blocking<T: Send + 'static>(
	f: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
	tokio::task::spawn_blocking(f)
		.await
		.map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?
}

/// Owns every piece of mutable supervision state. Runs as one task; control
/// requests and OS notifications are handled one at a time, in arrival order.
struct Engine {
	registry: ServiceRegistry,
	store: Arc<dyn ProfileStore>,
	table: HashMap<String, Attached>,
	sink: OutputSink,
	events: EventBus,
	notices: mpsc::UnboundedSender<Notice>,
	terminator: Arc<dyn TreeTerminator>,
	shell: Shell,
	log_dir: PathBuf,
	base_dir: PathBuf,
	max_lines: usize,
	kill_grace: Duration,
	next_session: u64,
	drains: Vec<Drain>,
	closed: bool,
}

impl Engine {
	async fn run(
		mut self,
		mut control: mpsc::UnboundedReceiver<Control>,
		mut notices: mpsc::UnboundedReceiver<Notice>,
	) {
		self.announce();

		loop {
			tokio::select! {
				Some(notice) = notices.recv() => self.on_notice(notice),
				msg = control.recv() => match msg {
					Some(msg) => self.on_control(msg),
					None => break,
				},
				_ = flush_at(self.sink.deadline()) => self.flush(),
			}
		}

		// Every handle is gone; nothing may outlive us.
		self.flush();
		self.kill_all();
	}

	fn on_control(&mut self, msg: Control) {
		match msg {
			Control::Start(id) => self.start(&id),
			Control::Stop(id) => self.stop(&id),
			Control::StartAll => {
				for id in self.registry.ids() {
					self.start(&id);
				}
			}
			Control::StopAll => self.stop_attached(),
			Control::Relaunch(id) => self.relaunch(&id),
			Control::RelaunchAll => {
				for id in self.registry.ids() {
					self.relaunch(&id);
				}
			}
			Control::Add(definition, reply) => {
				let _ = reply.send(self.add(definition));
			}
			Control::Remove(id, reply) => {
				let _ = reply.send(self.remove(&id));
			}
			Control::Update(definition, reply) => {
				let _ = reply.send(self.registry.update(definition));
			}
			Control::Reorder(ids, reply) => {
				let _ = reply.send(self.registry.reorder(&ids));
			}
			Control::List(reply) => {
				let _ = reply.send(self.snapshot());
			}
			Control::WorkingDir(id, reply) => {
				let _ = reply.send(self.registry.resolve_dir(&id, &self.base_dir));
			}
			Control::ClearLogs(id, reply) => {
				let _ = reply.send(self.clear_logs(&id));
			}
			Control::SetMaxLines(max_lines) => {
				tracing::info!("log files now bounded to {} lines", max_lines);
				self.max_lines = max_lines;
			}
			Control::UpdateRoot { profile, root_directory, reply } => {
				let result = if profile == self.registry.profile() {
					self.registry.set_root_directory(&root_directory)
				} else {
					self.store.update_root(&profile, &root_directory)
				};
				let _ = reply.send(result);
			}
			Control::SwitchProfile(profile, reply) => {
				if self.closed {
					let _ = reply.send(Err(Error::Busy("supervisor is shut down".into())));
					return;
				}
				match validate_profile_name(&profile) {
					Ok(()) => self.begin_drain(Drain::Switch { profile, reply }),
					Err(e) => {
						let _ = reply.send(Err(e));
					}
				}
			}
			Control::Shutdown(reply) => self.begin_drain(Drain::Shutdown(reply)),
		}
	}

	fn on_notice(&mut self, notice: Notice) {
		match notice {
			Notice::Output { id, session, data } => {
				let Some(attached) = self.live(&id, session) else {
					return;
				};
				if let Some(log) = attached.log.as_mut() {
					log.write(&data);
				}
				self.sink.push(&id, &data);
			}
			Notice::Exited { id, session, code } => self.on_exit(&id, session, code),
			Notice::GraceExpired { id, session } => {
				let Some(attached) = self.live(&id, session) else {
					return;
				};
				let pid = attached.pid;
				tracing::warn!("{} (pid {}) still running after {:?}, killing", id, pid, self.kill_grace);
				if let Err(e) = self.terminator.kill(pid) {
					tracing::warn!("failed to kill {} (pid {}): {}", id, pid, e);
				}
			}
		}
	}

	/// The attached process for `id`, if it belongs to `session`.
	fn live(&mut self, id: &str, session: u64) -> Option<&mut Attached> {
		self.table.get_mut(id).filter(|a| a.session == session)
	}

	fn start(&mut self, id: &str) {
		if self.closed || !self.drains.is_empty() {
			tracing::warn!("{}: not starting while services are shutting down", id);
			return;
		}
		if self.table.contains_key(id) {
			tracing::debug!("{}: already running", id);
			return;
		}
		let (Some(def), Some(dir)) = (self.registry.get(id), self.registry.resolve_dir(id, &self.base_dir)) else {
			tracing::warn!("{}: service not found", id);
			return;
		};

		tracing::info!("starting {} in {}: {}", id, dir.display(), def.command);
		let mut cmd = self.shell.command(&def.command);
		cmd.current_dir(&dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped());
		#[cfg(unix)]
		cmd.process_group(0);

		let (child, pid) = match cmd.spawn().and_then(with_pid) {
			Ok(spawned) => spawned,
			Err(e) => {
				tracing::error!("failed to start {}: {}", id, e);
				self.sink.push(id, format!("ERROR: {}\n", e).as_bytes());
				return;
			}
		};
		let session = self.next_session;
		self.next_session += 1;

		let path = logs::log_path(&self.log_dir, id);
		if let Err(e) = logs::enforce_line_limit(&path, self.max_lines) {
			tracing::warn!("failed to trim {}: {}", path.display(), e);
		}
		let log = match SessionLog::open(&path) {
			Ok(mut log) => {
				log.write(logs::session_started_marker().as_bytes());
				Some(log)
			}
			Err(e) => {
				tracing::warn!("failed to open {}: {}", path.display(), e);
				None
			}
		};

		self.table.insert(
			id.to_string(),
			Attached {
				session,
				pid,
				log,
				stopping: false,
			},
		);
		self.events.emit(Event::ServiceStatus {
			id: id.to_string(),
			status: RunStatus::Running,
			pid: Some(pid),
		});
		tracing::info!("started {} (pid {})", id, pid);

		tokio::spawn(watch_process(child, id.to_string(), session, self.notices.clone()));
	}

	fn relaunch(&mut self, id: &str) {
		if let Some(attached) = self.table.get(id) {
			if attached.stopping {
				tracing::info!(
					"{} (pid {}) has not exited yet, skipping restart",
					id,
					attached.pid
				);
				return;
			}
		}
		self.start(id);
	}

	fn stop(&mut self, id: &str) {
		let Some(attached) = self.table.get_mut(id) else {
			tracing::debug!("{}: not running", id);
			return;
		};
		tracing::info!("stopping {} (pid {})", id, attached.pid);
		if let Err(e) = self.terminator.terminate(attached.pid) {
			tracing::warn!("failed to signal {} (pid {}): {}", id, attached.pid, e);
		}

		if !attached.stopping {
			attached.stopping = true;
			let notices = self.notices.clone();
			let grace = self.kill_grace;
			let id = id.to_string();
			let session = attached.session;
			tokio::spawn(async move {
				tokio::time::sleep(grace).await;
				let _ = notices.send(Notice::GraceExpired { id, session });
			});
		}
	}

	fn stop_attached(&mut self) {
		let ids: Vec<String> = self.table.keys().cloned().collect();
		for id in ids {
			self.stop(&id);
		}
	}

	fn on_exit(&mut self, id: &str, session: u64, code: Option<i32>) {
		if self.live(id, session).is_none() {
			return;
		}
		let Some(attached) = self.table.remove(id) else {
			return;
		};
		tracing::info!("{} stopped with code {:?}", id, code);

		if let Some(mut log) = attached.log {
			log.write(logs::session_ended_marker(code).as_bytes());
			log.close();
		}
		let path = logs::log_path(&self.log_dir, id);
		if let Err(e) = logs::enforce_line_limit(&path, self.max_lines) {
			tracing::warn!("failed to trim {}: {}", path.display(), e);
		}

		self.events.emit(Event::ServiceStatus {
			id: id.to_string(),
			status: RunStatus::Stopped,
			pid: None,
		});
		// A missing code means a signal ended it, which is what stop asks for.
		if let Some(code) = code.filter(|c| *c != 0) {
			self.sink.push(id, format!("\nProcess exited with code {}\n", code).as_bytes());
		}

		self.settle_drains();
	}

	fn add(&mut self, definition: ServiceDefinition) -> Result<()> {
		let result = self.registry.register(definition.clone());
		self.events.emit(Event::ServiceAdded { definition });
		result
	}

	fn remove(&mut self, id: &str) -> Result<()> {
		if !self.registry.contains(id) {
			return Err(Error::NotFound(id.to_string()));
		}
		self.stop(id);
		self.sink.discard(id);
		let result = self.registry.unregister(id).map(|_| ());
		self.events.emit(Event::ServiceRemoved { id: id.to_string() });
		result
	}

	fn clear_logs(&mut self, id: &str) -> Result<bool> {
		let path = logs::log_path(&self.log_dir, id);
		let cleared = logs::clear_log(&path)?;
		if let Some(log) = self.table.get_mut(id).and_then(|a| a.log.as_mut()) {
			log.write(logs::cleared_marker().as_bytes());
		}
		Ok(cleared)
	}

	fn begin_drain(&mut self, drain: Drain) {
		self.drains.push(drain);
		self.stop_attached();
		self.settle_drains();
	}

	fn settle_drains(&mut self) {
		if self.drains.is_empty() || !self.table.is_empty() {
			return;
		}
		for drain in std::mem::take(&mut self.drains) {
			match drain {
				Drain::Switch { profile, reply } => {
					let _ = reply.send(self.load_profile(&profile));
				}
				Drain::Shutdown(reply) => {
					tracing::info!("all services stopped");
					self.closed = true;
					self.flush();
					let _ = reply.send(());
				}
			}
		}
	}

	fn load_profile(&mut self, profile: &str) -> Result<ProfileSnapshot> {
		tracing::info!("switching to profile {}", profile);
		let result = ServiceRegistry::load(Arc::clone(&self.store), profile);
		let loaded = match result {
			Ok(registry) => {
				self.registry = registry;
				Ok(self.snapshot())
			}
			Err(e) => {
				tracing::warn!("failed to load profile {}: {}", profile, e);
				self.registry = ServiceRegistry::empty(Arc::clone(&self.store), profile);
				Err(e)
			}
		};
		self.announce();
		loaded
	}

	fn snapshot(&self) -> ProfileSnapshot {
		let services = self
			.registry
			.definitions()
			.iter()
			.map(|def| match self.table.get(&def.id) {
				Some(attached) => ServiceInfo::with_state(def, RunStatus::Running, Some(attached.pid)),
				None => ServiceInfo::stopped(def),
			})
			.collect();
		ProfileSnapshot {
			services,
			root_directory: self.registry.root_directory().to_string(),
		}
	}

	fn announce(&self) {
		let snapshot = self.snapshot();
		self.events.emit(Event::InitServices {
			services: snapshot.services,
			root_directory: snapshot.root_directory,
		});
	}

	fn flush(&mut self) {
		for (id, log) in self.sink.take() {
			self.events.emit(Event::ServiceLog { id, log });
		}
	}

	fn kill_all(&mut self) {
		for (id, attached) in self.table.drain() {
			if let Err(e) = self.terminator.kill(attached.pid) {
				tracing::debug!("failed to kill {} (pid {}): {}", id, attached.pid, e);
			}
			if let Some(mut log) = attached.log {
				log.write(logs::session_ended_marker(None).as_bytes());
				log.close();
			}
		}
	}
}

/// Pairs a freshly spawned child with its pid. A child already reaped has
/// none, and is treated as a failed start.
fn with_pid(child: Child) -> io::Result<(Child, u32)> {
	match child.id() {
		Some(pid) => Ok((child, pid)),
		None => Err(io::Error::new(
			io::ErrorKind::Other,
			"process exited before its pid could be read",
		)),
	}
}

async fn flush_at(deadline: Option<Instant>) {
	match deadline {
		Some(at) => tokio::time::sleep_until(at).await,
		None => std::future::pending().await,
	}
}

/// Forwards a session's output and, once the process is reaped and its
/// pipes drained, its exit. Everything travels on one channel, so the exit
/// always arrives after the output that preceded it.
async fn watch_process(
	mut child: Child,
	id: String,
	session: u64,
	notices: mpsc::UnboundedSender<Notice>,
) {
	let mut readers = Vec::new();
	if let Some(stdout) = child.stdout.take() {
		readers.push(tokio::spawn(pipe_output(stdout, id.clone(), session, notices.clone())));
	}
	if let Some(stderr) = child.stderr.take() {
		readers.push(tokio::spawn(pipe_output(stderr, id.clone(), session, notices.clone())));
	}

	let code = match child.wait().await {
		Ok(status) => status.code(),
		Err(e) => {
			tracing::warn!("{}: failed to wait for exit: {}", id, e);
			None
		}
	};

	for mut reader in readers {
		if tokio::time::timeout(OUTPUT_DRAIN, &mut reader).await.is_err() {
			tracing::debug!("{}: output still open after exit, detaching", id);
			reader.abort();
		}
	}

	let _ = notices.send(Notice::Exited { id, session, code });
}

async fn pipe_output<R: AsyncRead + Unpin>(
	mut reader: R,
	id: String,
	session: u64,
	notices: mpsc::UnboundedSender<Notice>,
) {
	let mut buf = [0u8; 8192];
	loop {
		match reader.read(&mut buf).await {
			Ok(0) => break,
			Ok(n) => {
				let data = buf[..n].to_vec();
				if notices.send(Notice::Output { id: id.clone(), session, data }).is_err() {
					break;
				}
			}
			Err(_) => break,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(unix)]
	#[tokio::test]
	async fn reaped_child_has_no_pid() {
		let live = Shell::for_services().command("sleep 5").spawn().unwrap();
		let (mut live, pid) = with_pid(live).unwrap();
		assert!(pid > 0);
		live.kill().await.unwrap();

		let mut child = Shell::for_services().command("true").spawn().unwrap();
		child.wait().await.unwrap();
		let err = with_pid(child).unwrap_err();
		assert!(err.to_string().contains("pid"));
	}
}
