//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables during
//! request handling; binaries call [`ConfigValues::from_env`] once and hand the result to
//! [`CoreConfig::resolve`].
//!
//! Graph store credentials follow a fixed precedence: environment values win, missing values are
//! filled from the cached credentials file written by `clinic bootstrap`, and anything still
//! missing is a startup error.

use crate::constants::{
    DEFAULT_CREDENTIALS_FILE, DEFAULT_DOCUMENT_DB, DEFAULT_DOCUMENT_URI, DEFAULT_FILES_DIR,
    FILE_URI_PREFIX, MEMORY_URI,
};
use crate::{ClinicError, ClinicResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_GRAPH_URI: &str = "CLINIC_GRAPH_URI";
pub const ENV_GRAPH_USER: &str = "CLINIC_GRAPH_USER";
pub const ENV_GRAPH_PASSWORD: &str = "CLINIC_GRAPH_PASSWORD";
pub const ENV_CREDENTIALS_FILE: &str = "CLINIC_CREDENTIALS_FILE";
pub const ENV_DOCUMENT_URI: &str = "CLINIC_DOCUMENT_URI";
pub const ENV_DOCUMENT_DB: &str = "CLINIC_DOCUMENT_DB";
pub const ENV_FILES_DIR: &str = "CLINIC_FILES_DIR";

// ============================================================================
// STORE URIS
// ============================================================================

/// Location of a store: in-process memory or a path on local disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreUri {
    /// `memory:`; contents live as long as the process.
    Memory,
    /// `file://<path>`
    File(PathBuf),
}

impl FromStr for StoreUri {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == MEMORY_URI {
            return Ok(Self::Memory);
        }
        match s.strip_prefix(FILE_URI_PREFIX) {
            Some(path) if !path.trim().is_empty() => Ok(Self::File(PathBuf::from(path))),
            _ => Err(ClinicError::Config(format!(
                "unsupported store URI '{}' (expected '{}' or '{}<path>')",
                s, MEMORY_URI, FILE_URI_PREFIX
            ))),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(MEMORY_URI),
            Self::File(path) => write!(f, "{}{}", FILE_URI_PREFIX, path.display()),
        }
    }
}

// ============================================================================
// GRAPH CONNECTION
// ============================================================================

/// Where the graph store lives and who may open it.
#[derive(Clone)]
pub struct GraphConnection {
    uri: StoreUri,
    user: String,
    password: String,
}

impl GraphConnection {
    /// Create a new `GraphConnection`.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Config` if the user or password is blank.
    pub fn new(uri: StoreUri, user: &str, password: &str) -> ClinicResult<Self> {
        let user = user.trim();
        let password = password.trim();
        if user.is_empty() || password.is_empty() {
            return Err(ClinicError::Config(
                "graph store user and password are required".into(),
            ));
        }
        Ok(Self {
            uri,
            user: user.to_owned(),
            password: password.to_owned(),
        })
    }

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for GraphConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConnection")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// CORE CONFIG
// ============================================================================

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    graph: GraphConnection,
    document_uri: StoreUri,
    document_db: String,
    files_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `document_db` names a sub-directory of the document store, so it must be a single plain
    /// path component.
    pub fn new(
        graph: GraphConnection,
        document_uri: StoreUri,
        document_db: &str,
        files_dir: PathBuf,
    ) -> ClinicResult<Self> {
        let document_db = document_db.trim();
        if document_db.is_empty() {
            return Err(ClinicError::Config("document database name cannot be empty".into()));
        }
        if document_db == "."
            || document_db == ".."
            || document_db.contains(['/', '\\'])
        {
            return Err(ClinicError::Config(format!(
                "document database name '{}' must be a plain name",
                document_db
            )));
        }

        Ok(Self {
            graph,
            document_uri,
            document_db: document_db.to_owned(),
            files_dir,
        })
    }

    /// Resolve a configuration from raw values, applying defaults and the credentials fallback.
    pub fn resolve(values: ConfigValues) -> ClinicResult<Self> {
        let credentials_file = values
            .credentials_file
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));

        let graph = resolve_graph_connection(
            values.graph_uri,
            values.graph_user,
            values.graph_password,
            &credentials_file,
        )?;

        let document_uri = values
            .document_uri
            .as_deref()
            .unwrap_or(DEFAULT_DOCUMENT_URI)
            .parse()?;

        Self::new(
            graph,
            document_uri,
            values.document_db.as_deref().unwrap_or(DEFAULT_DOCUMENT_DB),
            values
                .files_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FILES_DIR)),
        )
    }

    pub fn graph(&self) -> &GraphConnection {
        &self.graph
    }

    pub fn document_uri(&self) -> &StoreUri {
        &self.document_uri
    }

    pub fn document_db(&self) -> &str {
        &self.document_db
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }
}

/// Raw configuration values before defaults are applied.
///
/// Blank values are treated as absent.
#[derive(Clone, Debug, Default)]
pub struct ConfigValues {
    pub graph_uri: Option<String>,
    pub graph_user: Option<String>,
    pub graph_password: Option<String>,
    pub credentials_file: Option<String>,
    pub document_uri: Option<String>,
    pub document_db: Option<String>,
    pub files_dir: Option<String>,
}

impl ConfigValues {
    /// Read the `CLINIC_*` variables. Call once at process startup.
    pub fn from_env() -> Self {
        let var = |name: &str| non_blank(std::env::var(name).ok());
        Self {
            graph_uri: var(ENV_GRAPH_URI),
            graph_user: var(ENV_GRAPH_USER),
            graph_password: var(ENV_GRAPH_PASSWORD),
            credentials_file: var(ENV_CREDENTIALS_FILE),
            document_uri: var(ENV_DOCUMENT_URI),
            document_db: var(ENV_DOCUMENT_DB),
            files_dir: var(ENV_FILES_DIR),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// CREDENTIALS FILE
// ============================================================================

/// Cached graph credentials, written by `clinic bootstrap`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredentials {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Load the credentials file if present.
///
/// A missing file is `Ok(None)`. A file that exists but cannot be read or parsed is logged and
/// also treated as absent, so a damaged cache never blocks environment-only configuration.
pub fn load_credentials(path: &Path) -> ClinicResult<Option<StoredCredentials>> {
    if !path.is_file() {
        return Ok(None);
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read credentials file");
            return Ok(None);
        }
    };

    match serde_yaml::from_str(&contents) {
        Ok(credentials) => Ok(Some(credentials)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed credentials file");
            Ok(None)
        }
    }
}

/// Write the credentials file, creating parent directories. On Unix the file mode is `0600`.
pub fn save_credentials(path: &Path, connection: &GraphConnection) -> ClinicResult<()> {
    let credentials = StoredCredentials {
        uri: Some(connection.uri().to_string()),
        user: Some(connection.user().to_owned()),
        password: Some(connection.password().to_owned()),
    };
    let yaml = serde_yaml::to_string(&credentials).map_err(ClinicError::YamlSerialization)?;

    let write_err = |source| ClinicError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, yaml).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(write_err)?;
    }

    tracing::info!(path = %path.display(), "saved graph credentials");
    Ok(())
}

/// Resolve the graph connection: explicit values win, then the credentials file.
///
/// # Errors
///
/// Returns `ClinicError::Config` naming the missing variables when any of URI, user, or password
/// remains unset.
pub fn resolve_graph_connection(
    uri: Option<String>,
    user: Option<String>,
    password: Option<String>,
    credentials_file: &Path,
) -> ClinicResult<GraphConnection> {
    let mut uri = non_blank(uri);
    let mut user = non_blank(user);
    let mut password = non_blank(password);

    if uri.is_none() || user.is_none() || password.is_none() {
        if let Some(saved) = load_credentials(credentials_file)? {
            uri = uri.or(non_blank(saved.uri));
            user = user.or(non_blank(saved.user));
            password = password.or(non_blank(saved.password));
        }
    }

    match (uri, user, password) {
        (Some(uri), Some(user), Some(password)) => {
            GraphConnection::new(uri.parse()?, &user, &password)
        }
        (uri, user, password) => {
            let missing: Vec<&str> = [
                (uri.is_none(), ENV_GRAPH_URI),
                (user.is_none(), ENV_GRAPH_USER),
                (password.is_none(), ENV_GRAPH_PASSWORD),
            ]
            .into_iter()
            .filter_map(|(is_missing, name)| is_missing.then_some(name))
            .collect();

            Err(ClinicError::Config(format!(
                "graph store credentials not provided ({}). Set the environment variables or run \
                 `clinic bootstrap` once to save them to {}",
                missing.join(", "),
                credentials_file.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_uri_parsing() {
        assert_eq!("memory:".parse::<StoreUri>().unwrap(), StoreUri::Memory);
        assert_eq!(
            "file://data/graph.json".parse::<StoreUri>().unwrap(),
            StoreUri::File(PathBuf::from("data/graph.json"))
        );
        assert!("bolt://localhost:7687".parse::<StoreUri>().is_err());
        assert!("file://".parse::<StoreUri>().is_err());
    }

    #[test]
    fn test_store_uri_display_parses_back() {
        let uri = StoreUri::File(PathBuf::from("/var/clinic/graph.json"));
        assert_eq!(uri.to_string().parse::<StoreUri>().unwrap(), uri);
    }

    #[test]
    fn test_graph_connection_requires_user_and_password() {
        assert!(GraphConnection::new(StoreUri::Memory, " ", "pw").is_err());
        assert!(GraphConnection::new(StoreUri::Memory, "neo", "").is_err());

        let conn = GraphConnection::new(StoreUri::Memory, " neo ", "pw").unwrap();
        assert_eq!(conn.user(), "neo");
        assert!(!format!("{:?}", conn).contains("pw"));
    }

    #[test]
    fn test_core_config_rejects_path_like_db_name() {
        let graph = GraphConnection::new(StoreUri::Memory, "u", "p").unwrap();
        let result = CoreConfig::new(graph, StoreUri::Memory, "../x", PathBuf::from("files"));
        assert!(matches!(result, Err(ClinicError::Config(_))));
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let temp = TempDir::new().unwrap();
        let values = ConfigValues {
            graph_uri: Some("memory:".into()),
            graph_user: Some("clinic".into()),
            graph_password: Some("secret".into()),
            credentials_file: Some(temp.path().join("none.yaml").display().to_string()),
            ..Default::default()
        };

        let cfg = CoreConfig::resolve(values).unwrap();

        assert_eq!(cfg.document_db(), DEFAULT_DOCUMENT_DB);
        assert_eq!(cfg.files_dir(), Path::new(DEFAULT_FILES_DIR));
        assert_eq!(
            cfg.document_uri(),
            &StoreUri::File(PathBuf::from("clinic_data/documents"))
        );
    }

    #[test]
    fn test_explicit_values_win_over_credentials_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creds.yaml");
        let saved = GraphConnection::new(StoreUri::Memory, "saved-user", "saved-pw").unwrap();
        save_credentials(&path, &saved).unwrap();

        let conn = resolve_graph_connection(None, Some("env-user".into()), None, &path).unwrap();

        assert_eq!(conn.user(), "env-user");
        assert_eq!(conn.password(), "saved-pw");
        assert_eq!(conn.uri(), &StoreUri::Memory);
    }

    #[test]
    fn test_missing_values_name_the_variables() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yaml");

        let err = resolve_graph_connection(Some("memory:".into()), None, None, &path).unwrap_err();

        let message = err.to_string();
        assert!(message.contains(ENV_GRAPH_USER));
        assert!(message.contains(ENV_GRAPH_PASSWORD));
        assert!(!message.contains(ENV_GRAPH_URI));
    }

    #[test]
    fn test_malformed_credentials_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creds.yaml");
        std::fs::write(&path, ": : not yaml [").unwrap();

        assert!(load_credentials(&path).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_credentials_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".clinic").join("credentials.yaml");
        let conn = GraphConnection::new(StoreUri::Memory, "u", "p").unwrap();

        save_credentials(&path, &conn).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
