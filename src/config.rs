use crate::search::TypeFilter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enable_regex: bool,
    pub search_in_path: bool,
    pub limit_results: bool,
    pub num_results: usize,
    pub filter: TypeFilter,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enable_regex: false,
            search_in_path: false,
            limit_results: false,
            num_results: 1000,
            filter: TypeFilter::None,
        }
    }
}

impl SearchConfig {
    /// Result cap handed to the aggregator; 0 means unlimited.
    pub fn max_results(&self) -> usize {
        if self.limit_results {
            self.num_results
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    #[serde(default)]
    pub fault_isolation: bool,
    #[serde(default = "default_regex_cache_size")]
    pub regex_cache_size: usize,
}

fn default_min_chunk_size() -> usize {
    1000
}
fn default_regex_cache_size() -> usize {
    32
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            min_chunk_size: default_min_chunk_size(),
            fault_isolation: false,
            regex_cache_size: default_regex_cache_size(),
        }
    }
}

impl PerformanceConfig {
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Environment variable naming a config file that replaces the default one.
pub const CONFIG_ENV: &str = "FSEARCH_CORE_CONFIG";

impl Config {
    /// `$FSEARCH_CORE_CONFIG` if set, otherwise `<config dir>/fsearch-core/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => dirs::config_dir().map(|dir| dir.join("fsearch-core").join("config.toml")),
        }
    }

    /// Reads the config at [`Config::default_path`], or the built-in
    /// defaults when no file exists there.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serializing config")?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        fs::write(path, text).with_context(|| format!("writing config {}", path.display()))
    }
}
