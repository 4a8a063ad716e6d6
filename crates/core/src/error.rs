#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("invalid login name or password")]
    InvalidCredentials,
    #[error("graph store rejected credentials for user '{0}'")]
    StoreAuthentication(String),
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read store file {path}: {source}", path = path.display())]
    StoreRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write store file {path}: {source}", path = path.display())]
    StoreWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize store data: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize store data: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),

    #[error("attachment storage error: {0}")]
    Files(#[from] clinic_files::FilesError),
    #[error("invalid text: {0}")]
    Text(#[from] clinic_types::TextError),
    #[error("invalid identifier: {0}")]
    Id(#[from] clinic_ids::IdError),
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;

impl ClinicError {
    /// Shorthand for a [`ClinicError::NotFound`] naming the entity kind and key.
    pub(crate) fn not_found(kind: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} '{}'", kind, key))
    }

    /// Shorthand for a [`ClinicError::AlreadyExists`] naming the entity kind and key.
    pub(crate) fn already_exists(kind: &str, key: impl std::fmt::Display) -> Self {
        Self::AlreadyExists(format!("{} '{}'", kind, key))
    }
}
