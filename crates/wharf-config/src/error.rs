use miette::Diagnostic;
use thiserror::Error;
use wharf_utils::error::{FileSystemError, PathError, UtilsError};

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(wharf_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(wharf_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists at {0}")]
    #[diagnostic(
        code(wharf_config::already_exists),
        help("Remove the existing config file or point WHARF_CONFIG elsewhere")
    )]
    ConfigAlreadyExists(String),

    #[error("Invalid duration for `{field}`: {value}")]
    #[diagnostic(
        code(wharf_config::invalid_duration),
        help("Use a non-zero duration like `30s`, `5m` or `1h30m`")
    )]
    InvalidDuration { field: &'static str, value: String },

    #[error("`workers` must be at least 1, got {0}")]
    #[diagnostic(
        code(wharf_config::invalid_workers),
        help("Set `workers` to a positive number")
    )]
    InvalidWorkers(usize),

    #[error("`max_metadata_size` must be greater than zero")]
    #[diagnostic(code(wharf_config::invalid_metadata_size))]
    InvalidMetadataSize,

    #[error("IO error: {0}")]
    #[diagnostic(code(wharf_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(wharf_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(wharf_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(wharf_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
