use std::{
    fs,
    path::PathBuf,
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::info;
use wharf_utils::{
    path::{resolve_path, xdg_config_home, xdg_data_home},
    time::parse_duration,
};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

const DEFAULT_WORKERS: usize = 2;
const DEFAULT_RESERVATION_LEASE: &str = "5m";
const DEFAULT_POLL_INTERVAL: &str = "1s";
const DEFAULT_BUSY_TIMEOUT: &str = "5s";
const DEFAULT_MAX_METADATA_SIZE: u64 = 1024 * 1024;

/// wharf configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Path where the wharf database is stored.
    /// Default: $WHARF_ROOT/wharf.db
    pub db_path: Option<String>,

    /// Directory holding content-addressed artifact blobs.
    /// Default: $WHARF_ROOT/artifacts
    pub artifacts_path: Option<String>,

    /// Directory under which per-upload scratch workspaces are created.
    /// Default: the system temporary directory
    pub workspace_path: Option<String>,

    /// Number of concurrent job workers.
    /// Default: 2
    pub workers: Option<usize>,

    /// How long a worker may hold a reservation without renewing it.
    /// Jobs whose lease expires are failed and their resources released.
    /// Default: 5m
    pub reservation_lease: Option<String>,

    /// How long an idle worker waits before polling the job queue again.
    /// Default: 1s
    pub poll_interval: Option<String>,

    /// How long a database call waits on a locked database before failing.
    /// Default: 5s
    pub busy_timeout: Option<String>,

    /// Largest metadata file (in bytes) a reader accepts from an archive.
    /// Default: 1048576
    pub max_metadata_size: Option<u64>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("WHARF_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("wharf").join("config.toml"),
    })
});

/// Loads the configuration from [`CONFIG_PATH`] and installs it globally.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *global_config = Some(config);
    Ok(())
}

/// Points [`CONFIG_PATH`] at a different file.
pub fn set_config_path(path: PathBuf) {
    let mut config_path = CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner);
    *config_path = path;
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .to_path_buf()
}

/// Returns the global configuration, falling back to defaults when [`init`] hasn't run.
pub fn get_config() -> Config {
    {
        let config_guard = CONFIG.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = config_guard.as_ref() {
            return config.clone();
        }
    }

    let mut config_guard = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    config_guard
        .get_or_insert_with(Config::default_config)
        .clone()
}

fn wharf_root() -> String {
    std::env::var("WHARF_ROOT")
        .unwrap_or_else(|_| format!("{}/wharf", xdg_data_home().display()))
}

fn parse_positive_duration(field: &'static str, value: &str) -> Result<Duration> {
    match parse_duration(value) {
        Some(millis) if millis > 0 => Ok(Duration::from_millis(
            u64::try_from(millis).unwrap_or(u64::MAX),
        )),
        _ => {
            Err(ConfigError::InvalidDuration {
                field,
                value: value.to_string(),
            })
        }
    }
}

impl Config {
    pub fn default_config() -> Self {
        let root = wharf_root();

        Self {
            db_path: Some(format!("{root}/wharf.db")),
            artifacts_path: Some(format!("{root}/artifacts")),
            workspace_path: None,
            workers: Some(DEFAULT_WORKERS),
            reservation_lease: Some(DEFAULT_RESERVATION_LEASE.to_string()),
            poll_interval: Some(DEFAULT_POLL_INTERVAL.to_string()),
            busy_timeout: Some(DEFAULT_BUSY_TIMEOUT.to_string()),
            max_metadata_size: Some(DEFAULT_MAX_METADATA_SIZE),
        }
    }

    /// Loads the configuration file, or the defaults when it doesn't exist.
    pub fn new() -> Result<Self> {
        let config_path = config_path();

        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Fills unset fields with defaults and validates the rest.
    pub fn resolve(&mut self) -> Result<()> {
        let workers = *self.workers.get_or_insert(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::InvalidWorkers(workers));
        }

        self.reservation_lease
            .get_or_insert_with(|| DEFAULT_RESERVATION_LEASE.to_string());
        self.poll_interval
            .get_or_insert_with(|| DEFAULT_POLL_INTERVAL.to_string());
        self.busy_timeout
            .get_or_insert_with(|| DEFAULT_BUSY_TIMEOUT.to_string());

        if *self.max_metadata_size.get_or_insert(DEFAULT_MAX_METADATA_SIZE) == 0 {
            return Err(ConfigError::InvalidMetadataSize);
        }

        self.get_reservation_lease()?;
        self.get_poll_interval()?;
        self.get_busy_timeout()?;

        Ok(())
    }

    pub fn get_db_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("WHARF_DB") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.db_path {
            Some(db_path) => Ok(resolve_path(db_path)?),
            None => Ok(resolve_path(&format!("{}/wharf.db", wharf_root()))?),
        }
    }

    pub fn get_artifacts_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("WHARF_ARTIFACTS") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.artifacts_path {
            Some(artifacts_path) => Ok(resolve_path(artifacts_path)?),
            None => Ok(resolve_path(&format!("{}/artifacts", wharf_root()))?),
        }
    }

    pub fn get_workspace_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("WHARF_WORKSPACE") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.workspace_path {
            Some(workspace_path) => Ok(resolve_path(workspace_path)?),
            None => Ok(std::env::temp_dir()),
        }
    }

    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_WORKERS).max(1)
    }

    pub fn get_reservation_lease(&self) -> Result<Duration> {
        parse_positive_duration(
            "reservation_lease",
            self.reservation_lease
                .as_deref()
                .unwrap_or(DEFAULT_RESERVATION_LEASE),
        )
    }

    pub fn get_poll_interval(&self) -> Result<Duration> {
        parse_positive_duration(
            "poll_interval",
            self.poll_interval.as_deref().unwrap_or(DEFAULT_POLL_INTERVAL),
        )
    }

    pub fn get_busy_timeout(&self) -> Result<Duration> {
        parse_positive_duration(
            "busy_timeout",
            self.busy_timeout.as_deref().unwrap_or(DEFAULT_BUSY_TIMEOUT),
        )
    }

    pub fn get_max_metadata_size(&self) -> u64 {
        self.max_metadata_size.unwrap_or(DEFAULT_MAX_METADATA_SIZE)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        Ok(doc)
    }
}

/// Writes an annotated default configuration to [`CONFIG_PATH`].
///
/// Refuses to overwrite an existing file.
pub fn generate_default_config() -> Result<PathBuf> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(
            config_path.display().to_string(),
        ));
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(config_path)
}
