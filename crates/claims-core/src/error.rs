#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("unknown claim type: {0}")]
    UnknownClaimType(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to create staging file in {path}: {source}", path = path.display())]
    StagingCreate {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write staging file: {0}")]
    StagingWrite(std::io::Error),
    #[error("failed to read staging file: {0}")]
    StagingRead(std::io::Error),
    #[error("failed to serialize claim line: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to parse schema registry: {0}")]
    SchemaParse(serde_yaml::Error),
    #[error("external sort failed: {0}")]
    Sort(String),
    #[error("external sort I/O error: {0}")]
    SortIo(std::io::Error),
}

pub type ClaimsResult<T> = std::result::Result<T, ClaimsError>;
