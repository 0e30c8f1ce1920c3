use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One running deployment of the full stack (cache + application + worker),
/// isolated by its ports, data directory and container-runtime project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: u32,
    pub app_port: u16,
    pub cache_port: u16,
    pub started_at: DateTime<Utc>,
    pub data_dir: PathBuf,
    pub env_file: PathBuf,
    pub manifest_file: PathBuf,
    pub project_name: String,
}

/// Live-unit tally for one instance, as reported by the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitHealth {
    /// The runtime query failed; nothing is assumed about the units.
    Unknown,
    /// `running` of `expected` units report the running state.
    Counted { running: usize, expected: usize },
}

#[derive(Debug, Clone)]
pub struct InstanceStatus {
    pub instance: Instance,
    pub units: UnitHealth,
}
