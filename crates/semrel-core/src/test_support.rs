//! Fixtures shared by unit tests

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use semrel_registry::{PublishRequest, Registry, RegistryError, CRATES_IO};
use tempfile::TempDir;

use crate::workflow::CancelHandle;

/// `[package]` manifest text with the given dependency lines
pub(crate) fn package(name: &str, version: &str, dependencies: &str) -> String {
    format!(
        "[package]\nname = \"{name}\"\nversion = \"{version}\"\nedition = \"2021\"\n\n[dependencies]\n{dependencies}\n"
    )
}

/// A workspace on disk
pub(crate) struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Empty directory
    pub(crate) fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Directory with a root Cargo.toml
    pub(crate) fn new(root_manifest: &str) -> Self {
        let fixture = Self::empty();
        fs::write(fixture.root().join("Cargo.toml"), root_manifest).unwrap();
        fixture
    }

    /// `a -> b -> c`, all at 0.1.0
    pub(crate) fn chain() -> Self {
        let fixture = Self::new("[workspace]\nmembers = [\"crates/*\"]\nresolver = \"2\"\n");
        fixture.add(
            "crates/a",
            &package("a", "0.1.0", "b = { path = \"../b\", version = \"0.1.0\" }"),
        );
        fixture.add(
            "crates/b",
            &package("b", "0.1.0", "c = { path = \"../c\", version = \"0.1.0\" }"),
        );
        fixture.add("crates/c", &package("c", "0.1.0", ""));
        fixture
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<rel>/Cargo.toml` and an empty lib
    pub(crate) fn add(&self, rel: &str, manifest: &str) {
        let dir = self.root().join(rel);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("Cargo.toml"), manifest).unwrap();
        fs::write(dir.join("src").join("lib.rs"), "").unwrap();
    }

    pub(crate) fn write(&self, rel: &str, text: &str) {
        fs::write(self.root().join(rel), text).unwrap();
    }

    pub(crate) fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).unwrap()
    }

    /// Every file under the root, by relative path
    pub(crate) fn snapshot(&self) -> BTreeMap<PathBuf, String> {
        fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_path_buf();
                    out.insert(rel, fs::read_to_string(&path).unwrap());
                }
            }
        }

        let mut files = BTreeMap::new();
        walk(self.root(), self.root(), &mut files);
        files
    }
}

/// Scripted result of one `publish` call
#[derive(Debug, Clone, Copy)]
pub(crate) enum Outcome {
    Ok,
    Network,
    RateLimited(u64),
    Rejected,
    AlreadyPublished,
}

/// In-memory registry recording every call
pub(crate) struct FakeRegistry {
    name: String,
    existing: Mutex<HashSet<(String, String)>>,
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    hidden_polls: Mutex<HashMap<String, usize>>,
    cancel_on: Mutex<Option<(String, CancelHandle)>>,
    unreachable: AtomicBool,
    publishes: Mutex<Vec<PublishRequest>>,
    lookups: AtomicUsize,
}

impl FakeRegistry {
    pub(crate) fn new() -> Self {
        Self::named(CRATES_IO)
    }

    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            existing: Mutex::new(HashSet::new()),
            scripts: Mutex::new(HashMap::new()),
            hidden_polls: Mutex::new(HashMap::new()),
            cancel_on: Mutex::new(None),
            unreachable: AtomicBool::new(false),
            publishes: Mutex::new(Vec::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Pretend `name@version` is already in the index
    pub(crate) fn with_existing(self, name: &str, version: &str) -> Self {
        self.existing
            .lock()
            .unwrap()
            .insert((name.to_string(), version.to_string()));
        self
    }

    /// Outcomes of successive publish calls for a crate; `Ok` once exhausted
    pub(crate) fn with_script(self, name: &str, outcomes: &[Outcome]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), outcomes.iter().copied().collect());
        self
    }

    /// Lookups answering "absent" after a successful upload
    pub(crate) fn with_hidden_polls(self, name: &str, polls: usize) -> Self {
        self.hidden_polls
            .lock()
            .unwrap()
            .insert(name.to_string(), polls);
        self
    }

    /// Cancel the run when `name` is uploaded
    pub(crate) fn cancel_on_publish(self, name: &str, handle: CancelHandle) -> Self {
        *self.cancel_on.lock().unwrap() = Some((name.to_string(), handle));
        self
    }

    pub(crate) fn unreachable(self) -> Self {
        self.unreachable.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn published_names(&self) -> Vec<String> {
        self.publishes
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub(crate) fn publish_count(&self) -> usize {
        self.publishes.lock().unwrap().len()
    }

    pub(crate) fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Registry for FakeRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn version_exists(&self, name: &str, version: &str) -> semrel_registry::Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RegistryError::Network("connection refused".to_string()));
        }

        let key = (name.to_string(), version.to_string());
        if !self.existing.lock().unwrap().contains(&key) {
            return Ok(false);
        }

        let mut hidden = self.hidden_polls.lock().unwrap();
        match hidden.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    async fn publish(&self, request: &PublishRequest) -> semrel_registry::Result<()> {
        self.publishes.lock().unwrap().push(request.clone());

        if let Some((name, handle)) = self.cancel_on.lock().unwrap().as_ref() {
            if *name == request.name {
                handle.cancel();
            }
        }

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Ok);

        match outcome {
            Outcome::Ok => {
                self.existing
                    .lock()
                    .unwrap()
                    .insert((request.name.clone(), request.version.clone()));
                Ok(())
            }
            Outcome::Network => Err(RegistryError::Network("connection reset".to_string())),
            Outcome::RateLimited(secs) => Err(RegistryError::RateLimited {
                retry_after: Some(secs),
            }),
            Outcome::Rejected => Err(RegistryError::InvalidManifest {
                name: request.name.clone(),
                reason: "missing license".to_string(),
            }),
            Outcome::AlreadyPublished => Err(RegistryError::AlreadyPublished {
                name: request.name.clone(),
                version: request.version.clone(),
            }),
        }
    }

    fn crate_url(&self, name: &str) -> Option<String> {
        (self.name == CRATES_IO).then(|| format!("https://crates.io/crates/{name}"))
    }
}
