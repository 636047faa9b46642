use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Level of the `vigil` log target; `RUST_LOG` directives still apply.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub task_manager: TaskManagerConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskManagerConfig {
    #[serde(default = "default_process_period_secs")]
    pub process_period_secs: u64,
    #[serde(default = "default_cleanup_period_secs")]
    pub cleanup_period_secs: u64,
    /// Finished tasks older than this are removed.
    #[serde(default = "default_task_retention_secs")]
    pub task_retention_secs: i64,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            process_period_secs: default_process_period_secs(),
            cleanup_period_secs: default_cleanup_period_secs(),
            task_retention_secs: default_task_retention_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_export_dir")]
    pub dir: String,
    /// Maximum export file size in bytes before rotation.
    #[serde(default = "default_export_file_size")]
    pub file_size: u64,
    #[serde(default = "default_export_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_export_dir(),
            file_size: default_export_file_size(),
            retry_delay_secs: default_export_retry_delay_secs(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_process_period_secs() -> u64 {
    5
}

fn default_cleanup_period_secs() -> u64 {
    3600
}

fn default_task_retention_secs() -> i64 {
    86400
}

fn default_export_dir() -> String {
    "export".to_string()
}

fn default_export_file_size() -> u64 {
    1 << 30
}

fn default_export_retry_delay_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            task_manager: TaskManagerConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Database file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("vigil.db")
    }
}
