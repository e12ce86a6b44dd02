mod config;
mod daemon;
mod protocol;

use std::io::{self, Write};

use berth::{Event, RunStatus, ServiceDefinition, ServiceInfo};
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use protocol::{Request, Response};
use tether::clap::DaemonCommand;
use tether::{ClientError, DaemonClient};

#[derive(Parser)]
#[command(name = "berth", version, about = "Supervise local development services")]
struct Cli {
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
	/// Show services and their status (default command)
	#[command(alias = "ls", alias = "st")]
	Status,
	/// Start service(s)
	Start(Targets),
	/// Stop service(s)
	Stop(Targets),
	/// Stop, then start again after a short delay
	Restart(Targets),
	/// Register a service in the active profile
	Add {
		id: String,
		/// Display name (defaults to the id)
		#[arg(long)]
		name: Option<String>,
		/// Working directory, relative to the profile root
		#[arg(long, default_value = ".")]
		path: String,
		/// Launch command
		#[arg(trailing_var_arg = true, required = true)]
		command: Vec<String>,
	},
	/// Remove a service (stopping it first)
	#[command(alias = "remove")]
	Rm { id: String },
	/// Change a service's name, directory or command
	Edit {
		id: String,
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		path: Option<String>,
		#[arg(long)]
		command: Option<String>,
	},
	/// Put services in the given order; unlisted ones keep their relative order after
	Reorder { ids: Vec<String> },
	/// Run a one-off command in a service's directory
	Exec {
		id: String,
		#[arg(trailing_var_arg = true, required = true)]
		command: Vec<String>,
	},
	/// Current git branch of a service's directory
	Branch { id: String },
	/// Print a service's log file
	Logs { id: String },
	/// Empty a service's log file
	Clear { id: String },
	/// Stream live output and status changes
	Watch {
		/// Only show these services
		ids: Vec<String>,
	},
	/// Manage profiles
	Profile {
		#[command(subcommand)]
		command: ProfileCommand,
	},
	/// Set how many lines each log file keeps
	LogLines { max_lines: usize },
	/// Manage the daemon
	Daemon {
		/// Also serve the HTTP API
		#[arg(long)]
		http: bool,
		#[command(subcommand)]
		command: DaemonCommand,
	},
}

#[derive(Args)]
struct Targets {
	ids: Vec<String>,
	/// Every service in the active profile
	#[arg(short, long)]
	all: bool,
}

#[derive(Subcommand)]
enum ProfileCommand {
	/// List saved profiles
	#[command(alias = "ls")]
	List,
	/// Stop everything and load another profile
	Switch { name: String },
	/// Create an empty profile
	Create {
		name: String,
		#[arg(long, default_value = "")]
		root: String,
	},
	/// Delete a profile
	Delete { name: String },
	/// Change the directory a profile's service paths resolve against
	Root { name: String, root: String },
}

fn main() {
	let cli = Cli::parse();

	match cli.command.unwrap_or(Command::Status) {
		Command::Status => render_status(),
		Command::Start(t) => print_result(send(&Request::Start { ids: t.ids, all: t.all })),
		Command::Stop(t) => print_result(send(&Request::Stop { ids: t.ids, all: t.all })),
		Command::Restart(t) => print_result(send(&Request::Restart { ids: t.ids, all: t.all })),
		Command::Add { id, name, path, command } => {
			let name = name.unwrap_or_else(|| id.clone());
			let definition = ServiceDefinition::new(id, name, path, command.join(" "));
			print_result(send(&Request::Add { definition }));
		}
		Command::Rm { id } => print_result(send(&Request::Remove { id })),
		Command::Edit { id, name, path, command } => cmd_edit(id, name, path, command),
		Command::Reorder { ids } => print_result(send(&Request::Reorder { ids })),
		Command::Exec { id, command } => cmd_exec(id, command.join(" ")),
		Command::Branch { id } => match send(&Request::Branch { id }) {
			Response::Branch { branch } => println!("{}", branch),
			other => print_result(other),
		},
		Command::Logs { id } => match send(&Request::Logs { id }) {
			Response::Logs { text } => print!("{}", text),
			other => print_result(other),
		},
		Command::Clear { id } => print_result(send(&Request::ClearLogs { id })),
		Command::Watch { ids } => cmd_watch(&ids),
		Command::Profile { command } => cmd_profile(command),
		Command::LogLines { max_lines } => print_result(send(&Request::SetLogLines { max_lines })),
		Command::Daemon { http, command } => cmd_daemon(http, command),
	}
}

// --- Daemon connection ---

const RUN_ARGS: &[&str] = &["daemon", "run"];
const RUN_HTTP_ARGS: &[&str] = &["daemon", "--http", "run"];

fn connect() -> DaemonClient<Request, Response> {
	match tether::ensure_daemon(&protocol::daemon_paths(), RUN_ARGS) {
		Ok(client) => client,
		Err(ClientError::NotRunning) => {
			eprintln!("error: daemon did not start in time");
			std::process::exit(1);
		}
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn send(request: &Request) -> Response {
	connect()
		.send(request)
		.unwrap_or_else(|e| Response::error(format!("daemon request failed: {}", e)))
}

fn print_result(response: Response) {
	match response {
		Response::Ok { message } => {
			if let Some(message) = message {
				eprintln!("{}", message);
			}
		}
		Response::Error { message } => {
			eprintln!("{} {}", "error:".red().bold(), message);
			std::process::exit(1);
		}
		other => eprintln!("unexpected response: {:?}", other),
	}
}

// --- Commands ---

fn render_status() {
	let (services, root) = match send(&Request::List) {
		Response::Services { services, root_directory } => (services, root_directory),
		other => return print_result(other),
	};

	if services.is_empty() {
		eprintln!("no services registered; add one with {}", "berth add <id> -- <command>".bold());
		return;
	}
	if !root.is_empty() {
		eprintln!("{} {}", "root".dimmed(), root);
	}

	let id_width = services.iter().map(|s| s.id.len()).max().unwrap_or(0);
	for service in &services {
		print_service_line(service, id_width);
	}
}

fn print_service_line(service: &ServiceInfo, id_width: usize) {
	let (circle, label, pid) = match (service.status, service.pid) {
		(RunStatus::Running, Some(pid)) => ("●".green().to_string(), "on".green().to_string(), pid.to_string()),
		(RunStatus::Running, None) => ("●".green().to_string(), "on".green().to_string(), "-".to_string()),
		(RunStatus::Stopped, _) => ("●".red().to_string(), "off".red().to_string(), "-".to_string()),
	};
	println!(
		"{} {:<id_width$}  {:<3}  {:>7}  {}  {}",
		circle,
		service.id.bold(),
		label,
		pid.dimmed(),
		service.path.dimmed(),
		service.command,
		id_width = id_width,
	);
}

fn cmd_edit(id: String, name: Option<String>, path: Option<String>, command: Option<String>) {
	let services = match send(&Request::List) {
		Response::Services { services, .. } => services,
		other => return print_result(other),
	};
	let Some(current) = services.into_iter().find(|s| s.id == id) else {
		eprintln!("{} service not found: {}", "error:".red().bold(), id);
		std::process::exit(1);
	};

	let definition = ServiceDefinition::new(
		id,
		name.unwrap_or(current.name),
		path.unwrap_or(current.path),
		command.unwrap_or(current.command),
	);
	print_result(send(&Request::Update { definition }));
}

fn cmd_exec(id: String, command: String) {
	match send(&Request::Exec { id, command }) {
		Response::Command(outcome) => {
			if !outcome.output.is_empty() {
				println!("{}", outcome.output);
			}
			if !outcome.success {
				std::process::exit(1);
			}
		}
		other => print_result(other),
	}
}

fn cmd_watch(ids: &[String]) {
	let stream = match connect().stream(&Request::Watch) {
		Ok(s) => s,
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	};
	let wanted = |id: &str| ids.is_empty() || ids.iter().any(|i| i == id);
	let mut stdout = io::stdout();

	for response in stream {
		let event = match response {
			Ok(Response::Event { event }) => event,
			Ok(_) => continue,
			Err(e) => {
				eprintln!("error: {}", e);
				std::process::exit(1);
			}
		};
		match event {
			Event::ServiceLog { id, log } if wanted(&id) => {
				let _ = stdout.write_all(&log);
				let _ = stdout.flush();
			}
			Event::ServiceStatus { id, status, pid } if wanted(&id) => match (status, pid) {
				(RunStatus::Running, Some(pid)) => eprintln!("{} {} (pid {})", id.bold(), "started".green(), pid),
				_ => eprintln!("{} {}", id.bold(), "stopped".red()),
			},
			Event::ServiceAdded { definition } => eprintln!("{} {}", definition.id.bold(), "added".cyan()),
			Event::ServiceRemoved { id } => eprintln!("{} {}", id.bold(), "removed".cyan()),
			Event::InitServices { services, .. } => {
				let running = services.iter().filter(|s| s.status.is_running()).count();
				eprintln!("watching {} services ({} running)", services.len(), running);
			}
			_ => {}
		}
	}
	eprintln!("daemon closed the stream");
}

fn cmd_profile(command: ProfileCommand) {
	match command {
		ProfileCommand::List => match send(&Request::Profiles) {
			Response::Profiles { profiles } => {
				for name in profiles {
					println!("{}", name);
				}
			}
			other => print_result(other),
		},
		ProfileCommand::Switch { name } => match send(&Request::SwitchProfile { name: name.clone() }) {
			Response::Services { services, .. } => {
				eprintln!("switched to {} ({} services)", name.bold(), services.len());
			}
			other => print_result(other),
		},
		ProfileCommand::Create { name, root } => {
			print_result(send(&Request::CreateProfile { name, root_directory: root }))
		}
		ProfileCommand::Delete { name } => print_result(send(&Request::DeleteProfile { name })),
		ProfileCommand::Root { name, root } => {
			print_result(send(&Request::UpdateProfileRoot { name, root_directory: root }))
		}
	}
}

fn cmd_daemon(http: bool, command: DaemonCommand) {
	let paths = protocol::daemon_paths();
	let run_args = if http { RUN_HTTP_ARGS } else { RUN_ARGS };
	if command.execute(&paths, run_args) {
		return;
	}

	let runtime = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("error: failed to start runtime: {}", e);
			std::process::exit(1);
		}
	};
	runtime.block_on(daemon::run(http));
}
