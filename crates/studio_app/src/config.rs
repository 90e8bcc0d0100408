use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use studio_core::ColumnMap;
use studio_engine::{
    AtomicFileWriter, FetchSettings, GenerationSettings, PersistError, SchedulerConfig,
};
use studio_logging::{studio_info, studio_warn};

pub(crate) const DEFAULT_CONFIG_FILENAME: &str = "studio.ron";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
    #[error("config {0:?} already exists")]
    AlreadyExists(PathBuf),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Limits for sheet and reference downloads, in config-friendly units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FetchSection {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
        }
    }
}

impl FetchSection {
    pub fn to_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StudioConfig {
    pub columns: ColumnMap,
    pub fetch: FetchSection,
    pub generation: GenerationSettings,
    pub scheduler: SchedulerConfig,
    pub export_dir: PathBuf,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            fetch: FetchSection::default(),
            generation: GenerationSettings::default(),
            scheduler: SchedulerConfig::default(),
            export_dir: PathBuf::from("export"),
        }
    }
}

/// Load the config at `path`. A missing file yields the defaults.
pub(crate) fn load_config(path: &Path) -> Result<StudioConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            studio_info!("No config at {:?}; using defaults", path);
            return Ok(StudioConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config: StudioConfig = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    studio_info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Write the default config to `path`, refusing to replace an existing file unless `force`.
pub(crate) fn write_default_config(path: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    if path.exists() {
        studio_warn!("Overwriting config at {:?}", path);
    }
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(&StudioConfig::default(), pretty)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string());
    let writer = AtomicFileWriter::new(dir);
    Ok(writer.write(&filename, &content)?)
}
