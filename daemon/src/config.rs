use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gradebook_core::{CatalogSchema, FallbackSettings, ResolutionPolicy, ServiceSettings};
use serde::Deserialize;

use crate::error::{DaemonError, Result};

const DEFAULT_CONFIG_ENV: &str = "GRADEBOOK_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub data: DataSettings,
    pub catalog: CatalogSettings,
    pub resolution: ResolutionSettings,
    pub server: ServerSettings,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: Some(String::from("info")),
            log_file: None,
            data: DataSettings::default(),
            catalog: CatalogSettings::default(),
            resolution: ResolutionSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads the configuration from the CLI path, then `GRADEBOOK_CONFIG`,
    /// falling back to defaults rooted at the working directory.
    pub fn from_sources(cli_path: Option<&str>) -> Result<Self> {
        let env_path = std::env::var(DEFAULT_CONFIG_ENV)
            .ok()
            .filter(|path| !path.is_empty());

        let config = match (cli_path, env_path) {
            (Some(""), _) => {
                return Err(DaemonError::Config(
                    "configuration path must not be empty".into(),
                ));
            }
            (Some(path), _) => Self::load_from_path(path)?,
            (None, Some(path)) => Self::load_from_path(path)?,
            (None, None) => {
                let mut config = Self::default();
                config.normalize_paths(&std::env::current_dir()?);
                config
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let mut config: DaemonConfig = toml::from_str(&fs::read_to_string(&path)?)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.normalize_paths(base);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.data.catalog.as_os_str().is_empty() {
            return Err(DaemonError::Config("data.catalog must not be empty".into()));
        }
        if self.data.entries_backend == EntriesBackendKind::Csv
            && self.data.entries.as_os_str().is_empty()
        {
            return Err(DaemonError::Config(
                "data.entries must be set for the csv entries backend".into(),
            ));
        }

        let credits = self.resolution.fallback_credits;
        if !credits.is_finite() || credits <= 0.0 {
            return Err(DaemonError::Config(
                "resolution.fallback_credits must be a positive number".into(),
            ));
        }

        if self.catalog.poll_interval_ms == 0 {
            return Err(DaemonError::Config(
                "catalog.poll_interval_ms must be greater than zero".into(),
            ));
        }

        let server = &self.server;
        for (key, value) in [
            ("server.concurrency_limit", server.concurrency_limit),
            ("server.body_limit", server.body_limit),
            ("server.worker_threads", server.worker_threads),
        ] {
            if value == Some(0) {
                return Err(DaemonError::Config(format!("{key} must be greater than zero")));
            }
        }

        Ok(())
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn data(&self) -> &DataSettings {
        &self.data
    }

    pub fn catalog(&self) -> &CatalogSettings {
        &self.catalog
    }

    pub fn server(&self) -> &ServerSettings {
        &self.server
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            compute_policy: self.resolution.compute_policy,
            save_policy: self.resolution.save_policy,
            fallback: FallbackSettings {
                credits: self.resolution.fallback_credits,
                ..FallbackSettings::default()
            },
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|err| DaemonError::Config(format!("invalid bind_address: {err}")))?;
        Ok(SocketAddr::new(addr, self.server.port))
    }

    fn normalize_paths(&mut self, base: &Path) {
        normalize_optional_path(&mut self.log_file, base);
        self.data.normalize(base);
    }
}

fn normalize_optional_path(target: &mut Option<PathBuf>, base: &Path) {
    if let Some(path) = target {
        normalize_path(path, base);
    }
}

fn normalize_path(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntriesBackendKind {
    Memory,
    Csv,
}

/// Locations of the catalog, the saved entries and the requirement tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub catalog: PathBuf,
    pub entries: PathBuf,
    pub entries_backend: EntriesBackendKind,
    pub rules: PathBuf,
    pub subcategories: PathBuf,
    pub majors: PathBuf,
    pub categories: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("data/subjects.csv"),
            entries: PathBuf::from("data/saved_entries.csv"),
            entries_backend: EntriesBackendKind::Csv,
            rules: PathBuf::from("data/graduation_requirements.csv"),
            subcategories: PathBuf::from("data/subcategories.csv"),
            majors: PathBuf::from("data/categories.csv"),
            categories: PathBuf::from("data/maincategories.csv"),
        }
    }
}

impl DataSettings {
    fn normalize(&mut self, base: &Path) {
        for path in [
            &mut self.catalog,
            &mut self.entries,
            &mut self.rules,
            &mut self.subcategories,
            &mut self.majors,
            &mut self.categories,
        ] {
            normalize_path(path, base);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub poll_interval_ms: u64,
    pub columns: CatalogSchema,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            columns: CatalogSchema::default(),
        }
    }
}

impl CatalogSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    pub compute_policy: ResolutionPolicy,
    pub save_policy: ResolutionPolicy,
    pub fallback_credits: f64,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            compute_policy: ResolutionPolicy::Lenient,
            save_policy: ResolutionPolicy::Lenient,
            fallback_credits: FallbackSettings::default().credits,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub tcp_nodelay: bool,
    pub worker_threads: Option<usize>,
    pub concurrency_limit: Option<usize>,
    pub body_limit: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 8080,
            tcp_nodelay: true,
            worker_threads: None,
            concurrency_limit: None,
            body_limit: None,
        }
    }
}

impl ServerSettings {
    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }
}
