//! Graph store sessions and backends.
//!
//! Every operation runs inside one session: [`GraphStore::read`] for queries and
//! [`GraphStore::write`] for mutations. A write session works on a copy of the graph and only
//! commits it when the closure returns `Ok`, so a failed operation never leaves partial changes
//! behind.
//!
//! The file backend keeps the whole graph in one JSON document together with the store owner's
//! user name and salted password digest. The document is reloaded at the start of every session
//! and replaced atomically (temporary file + rename) at the end of every successful write.

use crate::config::{GraphConnection, StoreUri};
use crate::constants::GRAPH_FILE_FORMAT_VERSION;
use crate::graph::GraphData;
use crate::password::PasswordDigest;
use crate::{ClinicError, ClinicResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Serialize, Deserialize)]
struct StoreOwner {
    user: String,
    password: PasswordDigest,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    format_version: u32,
    owner: StoreOwner,
    graph: GraphData,
}

#[derive(Debug)]
enum Backend {
    Memory(Mutex<GraphData>),
    File { path: PathBuf, lock: Mutex<()> },
}

/// Handle to a graph store.
#[derive(Debug)]
pub struct GraphStore {
    backend: Backend,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic inside a session never leaves half-applied state behind, so a poisoned lock is safe
    // to reuse.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GraphStore {
    /// An empty store that lives as long as the value.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(GraphData::default())),
        }
    }

    /// Opens an existing store.
    ///
    /// # Errors
    ///
    /// - `ClinicError::Config` if a file store has not been created yet
    /// - `ClinicError::StoreAuthentication` if the credentials do not match the store owner
    pub fn open(connection: &GraphConnection) -> ClinicResult<Self> {
        match connection.uri() {
            StoreUri::Memory => Ok(Self::in_memory()),
            StoreUri::File(path) => {
                if !path.is_file() {
                    return Err(ClinicError::Config(format!(
                        "no graph store at {}; run `clinic bootstrap` first",
                        path.display()
                    )));
                }
                let file = read_graph_file(path)?;
                authenticate(&file, connection)?;

                tracing::debug!(path = %path.display(), "opened graph store");
                Ok(Self {
                    backend: Backend::File {
                        path: path.clone(),
                        lock: Mutex::new(()),
                    },
                })
            }
        }
    }

    /// Opens the store, creating an empty file store owned by `connection`'s user if none exists.
    pub fn create(connection: &GraphConnection) -> ClinicResult<Self> {
        if let StoreUri::File(path) = connection.uri() {
            if !path.exists() {
                let file = GraphFile {
                    format_version: GRAPH_FILE_FORMAT_VERSION,
                    owner: StoreOwner {
                        user: connection.user().to_owned(),
                        password: PasswordDigest::new(connection.password()),
                    },
                    graph: GraphData::default(),
                };
                write_graph_file(path, &file)?;
                tracing::info!(path = %path.display(), owner = connection.user(), "created graph store");
            }
        }
        Self::open(connection)
    }

    /// Runs a read-only session.
    pub fn read<T, F>(&self, f: F) -> ClinicResult<T>
    where
        F: FnOnce(&GraphData) -> ClinicResult<T>,
    {
        match &self.backend {
            Backend::Memory(data) => f(&lock(data)),
            Backend::File { path, lock: file_lock } => {
                let _guard = lock(file_lock);
                let file = read_graph_file(path)?;
                f(&file.graph)
            }
        }
    }

    /// Runs a write session. The graph is only committed when `f` succeeds.
    pub fn write<T, F>(&self, f: F) -> ClinicResult<T>
    where
        F: FnOnce(&mut GraphData) -> ClinicResult<T>,
    {
        match &self.backend {
            Backend::Memory(data) => {
                let mut guard = lock(data);
                let mut working = guard.clone();
                let out = f(&mut working)?;
                *guard = working;
                Ok(out)
            }
            Backend::File { path, lock: file_lock } => {
                let _guard = lock(file_lock);
                let mut file = read_graph_file(path)?;
                let out = f(&mut file.graph)?;
                write_graph_file(path, &file)?;
                tracing::debug!(path = %path.display(), "committed graph write session");
                Ok(out)
            }
        }
    }
}

fn authenticate(file: &GraphFile, connection: &GraphConnection) -> ClinicResult<()> {
    if file.owner.user != connection.user() || !file.owner.password.verify(connection.password()) {
        return Err(ClinicError::StoreAuthentication(connection.user().to_owned()));
    }
    Ok(())
}

fn read_graph_file(path: &Path) -> ClinicResult<GraphFile> {
    let contents = fs::read_to_string(path).map_err(|source| ClinicError::StoreRead {
        path: path.to_path_buf(),
        source,
    })?;
    let file: GraphFile = serde_json::from_str(&contents).map_err(ClinicError::Deserialization)?;

    if file.format_version != GRAPH_FILE_FORMAT_VERSION {
        return Err(ClinicError::Config(format!(
            "graph store {} has format version {}, expected {}",
            path.display(),
            file.format_version,
            GRAPH_FILE_FORMAT_VERSION
        )));
    }
    Ok(file)
}

fn write_graph_file(path: &Path, file: &GraphFile) -> ClinicResult<()> {
    let json = serde_json::to_vec_pretty(file).map_err(ClinicError::Serialization)?;
    let write_err = |source| ClinicError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut tmp = fs::File::create(&tmp_path).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.sync_all().map_err(write_err)?;
    drop(tmp);

    fs::rename(&tmp_path, path).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Label, NodeRef};
    use serde_json::Map;
    use tempfile::TempDir;

    fn file_connection(dir: &TempDir, user: &str, password: &str) -> GraphConnection {
        GraphConnection::new(
            StoreUri::File(dir.path().join("graph.json")),
            user,
            password,
        )
        .unwrap()
    }

    fn add_clinic(store: &GraphStore, key: &str) -> ClinicResult<()> {
        store.write(|g| g.create_node(Label::Clinic, key, Map::new()))
    }

    #[test]
    fn test_memory_write_commits_on_success() {
        let store = GraphStore::in_memory();

        add_clinic(&store, "C1").unwrap();

        let exists = store
            .read(|g| Ok(g.contains(&NodeRef::new(Label::Clinic, "C1"))))
            .unwrap();
        assert!(exists);
    }

    #[test]
    fn test_failed_write_is_not_committed() {
        let store = GraphStore::in_memory();

        let result: ClinicResult<()> = store.write(|g| {
            g.create_node(Label::Clinic, "C1", Map::new())?;
            Err(ClinicError::InvalidInput("abort".into()))
        });

        assert!(result.is_err());
        let count = store.read(|g| Ok(g.nodes(Label::Clinic).count())).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_missing_file_store_fails() {
        let temp = TempDir::new().unwrap();
        let conn = file_connection(&temp, "clinic", "pw");

        assert!(matches!(GraphStore::open(&conn), Err(ClinicError::Config(_))));
    }

    #[test]
    fn test_file_store_persists_between_handles() {
        let temp = TempDir::new().unwrap();
        let conn = file_connection(&temp, "clinic", "pw");

        let store = GraphStore::create(&conn).unwrap();
        add_clinic(&store, "C1").unwrap();
        drop(store);

        let reopened = GraphStore::open(&conn).unwrap();
        let keys: Vec<String> = reopened
            .read(|g| Ok(g.nodes(Label::Clinic).map(|n| n.key.clone()).collect()))
            .unwrap();
        assert_eq!(keys, vec!["C1".to_string()]);
        assert!(!temp.path().join("graph.json.tmp").exists());
    }

    #[test]
    fn test_file_store_failed_write_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let conn = file_connection(&temp, "clinic", "pw");
        let store = GraphStore::create(&conn).unwrap();
        add_clinic(&store, "C1").unwrap();
        let before = fs::read_to_string(temp.path().join("graph.json")).unwrap();

        assert!(add_clinic(&store, "C1").is_err());

        let after = fs::read_to_string(temp.path().join("graph.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_file_store_rejects_other_credentials() {
        let temp = TempDir::new().unwrap();
        GraphStore::create(&file_connection(&temp, "clinic", "pw")).unwrap();

        let wrong_password = GraphStore::open(&file_connection(&temp, "clinic", "nope"));
        let wrong_user = GraphStore::open(&file_connection(&temp, "other", "pw"));

        assert!(matches!(wrong_password, Err(ClinicError::StoreAuthentication(_))));
        assert!(matches!(wrong_user, Err(ClinicError::StoreAuthentication(_))));
    }

    #[test]
    fn test_store_file_never_contains_clear_password() {
        let temp = TempDir::new().unwrap();
        GraphStore::create(&file_connection(&temp, "clinic", "hunter2")).unwrap();

        let contents = fs::read_to_string(temp.path().join("graph.json")).unwrap();
        assert!(!contents.contains("hunter2"));
        assert!(contents.contains("sha256$"));
    }
}
