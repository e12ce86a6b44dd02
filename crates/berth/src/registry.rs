use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Profile, ServiceDefinition};

pub const DEFAULT_PROFILE: &str = "default";

/// Where profiles live between sessions. The engine only ever reads and writes
/// whole documents.
pub trait ProfileStore: Send + Sync {
	/// Loads a profile; a profile that was never saved is empty.
	fn load(&self, name: &str) -> Result<Profile>;
	fn save(&self, name: &str, profile: &Profile) -> Result<()>;
	fn list(&self) -> Result<Vec<String>>;
	/// Creates an empty profile. Returns false if it already existed.
	fn create(&self, name: &str, root_directory: &str) -> Result<bool>;
	/// Returns false if there was nothing to delete.
	fn delete(&self, name: &str) -> Result<bool>;
	fn update_root(&self, name: &str, root_directory: &str) -> Result<()>;
}

/// One pretty-printed JSON document per profile: `<dir>/<name>.json`.
pub struct JsonProfileStore {
	dir: PathBuf,
}

impl JsonProfileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	fn path(&self, name: &str) -> Result<PathBuf> {
		validate_profile_name(name)?;
		Ok(self.dir.join(format!("{}.json", name)))
	}

	fn read(&self, path: &Path) -> Result<Option<Profile>> {
		match fs::read_to_string(path) {
			Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	fn write(&self, path: &Path, profile: &Profile) -> Result<()> {
		fs::create_dir_all(&self.dir)?;
		let json = serde_json::to_string_pretty(profile)?;
		fs::write(path, json)?;
		Ok(())
	}
}

impl ProfileStore for JsonProfileStore {
	fn load(&self, name: &str) -> Result<Profile> {
		let path = self.path(name)?;
		Ok(self.read(&path)?.unwrap_or_default())
	}

	fn save(&self, name: &str, profile: &Profile) -> Result<()> {
		let path = self.path(name)?;
		self.write(&path, profile)
	}

	fn list(&self) -> Result<Vec<String>> {
		let mut names: Vec<String> = fs::read_dir(&self.dir)?
			.flatten()
			.filter_map(|entry| {
				let path = entry.path();
				if path.extension().and_then(|e| e.to_str()) != Some("json") {
					return None;
				}
				path.file_stem().map(|s| s.to_string_lossy().to_string())
			})
			.collect();
		names.sort();
		Ok(names)
	}

	fn create(&self, name: &str, root_directory: &str) -> Result<bool> {
		let path = self.path(name)?;
		if path.exists() {
			return Ok(false);
		}
		let profile = Profile {
			root_directory: root_directory.to_string(),
			services: Vec::new(),
		};
		self.write(&path, &profile)?;
		Ok(true)
	}

	fn delete(&self, name: &str) -> Result<bool> {
		if name == DEFAULT_PROFILE {
			return Err(Error::InvalidProfileName(format!("{} cannot be deleted", name)));
		}
		let path = self.path(name)?;
		match fs::remove_file(&path) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	fn update_root(&self, name: &str, root_directory: &str) -> Result<()> {
		let path = self.path(name)?;
		let mut profile = self
			.read(&path)?
			.ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
		profile.root_directory = root_directory.to_string();
		self.write(&path, &profile)
	}
}

/// Profile names become file names.
pub fn validate_profile_name(name: &str) -> Result<()> {
	let bad = name.is_empty()
		|| name.starts_with('.')
		|| name.contains(|c: char| c == '/' || c == '\\' || c == '\0');
	if bad {
		return Err(Error::InvalidProfileName(name.to_string()));
	}
	Ok(())
}

/// The active profile's service definitions, in persisted order.
///
/// Every mutation is applied in memory first and then written through; a
/// failed write is returned to the caller but never rolls the change back.
pub struct ServiceRegistry {
	profile: String,
	root_directory: String,
	services: Vec<ServiceDefinition>,
	store: Arc<dyn ProfileStore>,
}

impl ServiceRegistry {
	pub fn load(store: Arc<dyn ProfileStore>, profile: &str) -> Result<Self> {
		let doc = store.load(profile)?;
		Ok(Self {
			profile: profile.to_string(),
			root_directory: doc.root_directory,
			services: dedupe(doc.services),
			store,
		})
	}

	pub fn empty(store: Arc<dyn ProfileStore>, profile: &str) -> Self {
		Self {
			profile: profile.to_string(),
			root_directory: String::new(),
			services: Vec::new(),
			store,
		}
	}

	pub fn profile(&self) -> &str {
		&self.profile
	}

	pub fn root_directory(&self) -> &str {
		&self.root_directory
	}

	pub fn definitions(&self) -> &[ServiceDefinition] {
		&self.services
	}

	pub fn ids(&self) -> Vec<String> {
		self.services.iter().map(|s| s.id.clone()).collect()
	}

	pub fn get(&self, id: &str) -> Option<&ServiceDefinition> {
		self.services.iter().find(|s| s.id == id)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.get(id).is_some()
	}

	/// Adds a definition, or replaces the one with the same id in place.
	pub fn register(&mut self, definition: ServiceDefinition) -> Result<()> {
		match self.services.iter_mut().find(|s| s.id == definition.id) {
			Some(existing) => *existing = definition,
			None => self.services.push(definition),
		}
		self.persist()
	}

	pub fn unregister(&mut self, id: &str) -> Result<ServiceDefinition> {
		let index = self
			.services
			.iter()
			.position(|s| s.id == id)
			.ok_or_else(|| Error::NotFound(id.to_string()))?;
		let removed = self.services.remove(index);
		self.persist()?;
		Ok(removed)
	}

	/// Replaces name, path and command of an existing definition.
	pub fn update(&mut self, definition: ServiceDefinition) -> Result<()> {
		let existing = self
			.services
			.iter_mut()
			.find(|s| s.id == definition.id)
			.ok_or_else(|| Error::NotFound(definition.id.clone()))?;
		existing.name = definition.name;
		existing.path = definition.path;
		existing.command = definition.command;
		self.persist()
	}

	/// Puts the listed ids first, in the given order. Unknown ids are ignored;
	/// services missing from the list keep their relative order at the end.
	pub fn reorder(&mut self, ids: &[String]) -> Result<()> {
		let mut remaining = std::mem::take(&mut self.services);
		let mut ordered = Vec::with_capacity(remaining.len());
		for id in ids {
			if let Some(index) = remaining.iter().position(|s| &s.id == id) {
				ordered.push(remaining.remove(index));
			}
		}
		ordered.extend(remaining);
		self.services = ordered;
		self.persist()
	}

	pub fn set_root_directory(&mut self, root_directory: &str) -> Result<()> {
		self.root_directory = root_directory.to_string();
		self.persist()
	}

	/// Working directory for a service: its path, relative to the profile
	/// root, relative to `base`. Absolute paths win at each step.
	pub fn resolve_dir(&self, id: &str, base: &Path) -> Option<PathBuf> {
		let def = self.get(id)?;
		Some(base.join(&self.root_directory).join(&def.path))
	}

	pub fn persist(&self) -> Result<()> {
		let profile = Profile {
			root_directory: self.root_directory.clone(),
			services: self.services.clone(),
		};
		self.store.save(&self.profile, &profile)
	}
}

// A hand-edited document may repeat an id; the last definition wins its slot.
fn dedupe(services: Vec<ServiceDefinition>) -> Vec<ServiceDefinition> {
	let mut out: Vec<ServiceDefinition> = Vec::with_capacity(services.len());
	for def in services {
		match out.iter_mut().find(|s| s.id == def.id) {
			Some(existing) => *existing = def,
			None => out.push(def),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> (tempfile::TempDir, Arc<JsonProfileStore>) {
		let tmp = tempfile::tempdir().unwrap();
		let store = Arc::new(JsonProfileStore::new(tmp.path().join("profiles")));
		(tmp, store)
	}

	fn def(id: &str) -> ServiceDefinition {
		ServiceDefinition::new(id, id.to_uppercase(), id, "npm run dev")
	}

	#[test]
	fn missing_profile_loads_empty() {
		let (_tmp, store) = store();
		let registry = ServiceRegistry::load(store, DEFAULT_PROFILE).unwrap();
		assert!(registry.definitions().is_empty());
		assert_eq!(registry.root_directory(), "");
	}

	#[test]
	fn register_persists_and_overwrites_in_place() {
		let (_tmp, store) = store();
		let mut registry = ServiceRegistry::empty(store.clone(), "work");
		registry.register(def("api")).unwrap();
		registry.register(def("web")).unwrap();
		registry
			.register(ServiceDefinition::new("api", "API v2", "api", "cargo run"))
			.unwrap();

		let saved = store.load("work").unwrap();
		assert_eq!(saved.services.len(), 2);
		assert_eq!(saved.services[0].name, "API v2");
		assert_eq!(saved.services[1].id, "web");
	}

	#[test]
	fn unknown_ids_are_not_found() {
		let (_tmp, store) = store();
		let mut registry = ServiceRegistry::empty(store, "work");
		assert!(matches!(registry.unregister("ghost"), Err(Error::NotFound(_))));
		assert!(matches!(registry.update(def("ghost")), Err(Error::NotFound(_))));
	}

	#[test]
	fn reorder_keeps_unlisted_services() {
		let (_tmp, store) = store();
		let mut registry = ServiceRegistry::empty(store.clone(), "work");
		for id in ["a", "b", "c", "d"] {
			registry.register(def(id)).unwrap();
		}
		registry
			.reorder(&["c".to_string(), "ghost".to_string(), "a".to_string()])
			.unwrap();
		assert_eq!(registry.ids(), vec!["c", "a", "b", "d"]);
		let saved: Vec<String> = store.load("work").unwrap().services.into_iter().map(|s| s.id).collect();
		assert_eq!(saved, vec!["c", "a", "b", "d"]);
	}

	#[test]
	fn failed_write_keeps_memory() {
		let tmp = tempfile::tempdir().unwrap();
		let blocker = tmp.path().join("profiles");
		fs::write(&blocker, "not a directory").unwrap();
		let store = Arc::new(JsonProfileStore::new(&blocker));

		let mut registry = ServiceRegistry::empty(store, "work");
		assert!(registry.register(def("api")).is_err());
		assert!(registry.contains("api"));
	}

	#[test]
	fn resolve_dir_layers_base_root_and_path() {
		let (_tmp, store) = store();
		let mut registry = ServiceRegistry::empty(store, "work");
		registry.register(def("api")).unwrap();
		registry
			.register(ServiceDefinition::new("abs", "Abs", "/opt/abs", "run"))
			.unwrap();

		let base = Path::new("/home/dev");
		assert_eq!(registry.resolve_dir("api", base).unwrap(), PathBuf::from("/home/dev/api"));

		registry.set_root_directory("/src").unwrap();
		assert_eq!(registry.resolve_dir("api", base).unwrap(), PathBuf::from("/src/api"));
		assert_eq!(registry.resolve_dir("abs", base).unwrap(), PathBuf::from("/opt/abs"));
		assert!(registry.resolve_dir("ghost", base).is_none());
	}

	#[test]
	fn profile_management() {
		let (_tmp, store) = store();
		assert!(store.create("work", "/src").unwrap());
		assert!(!store.create("work", "/elsewhere").unwrap());
		store.save(DEFAULT_PROFILE, &Profile::default()).unwrap();
		assert_eq!(store.list().unwrap(), vec!["default", "work"]);

		store.update_root("work", "/new").unwrap();
		assert_eq!(store.load("work").unwrap().root_directory, "/new");
		assert!(matches!(store.update_root("ghost", "/x"), Err(Error::ProfileNotFound(_))));

		assert!(store.delete(DEFAULT_PROFILE).is_err());
		assert!(store.delete("work").unwrap());
		assert!(!store.delete("work").unwrap());
		assert!(matches!(store.load("../etc"), Err(Error::InvalidProfileName(_))));
	}

	#[test]
	fn duplicate_ids_collapse_on_load() {
		let (_tmp, store) = store();
		store
			.save(
				"work",
				&Profile {
					root_directory: String::new(),
					services: vec![def("a"), def("b"), ServiceDefinition::new("a", "second", "a", "x")],
				},
			)
			.unwrap();
		let registry = ServiceRegistry::load(store, "work").unwrap();
		assert_eq!(registry.ids(), vec!["a", "b"]);
		assert_eq!(registry.get("a").unwrap().name, "second");
	}
}
