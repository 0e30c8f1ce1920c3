use std::path::{Path, PathBuf};

pub const REGISTRY_FILENAME: &str = ".fleet-instances.json";
pub const CONFIG_FILENAME: &str = ".fleet.yaml";
pub const BASE_ENV_FILENAME: &str = ".env";

/// Subdirectories every instance data directory is created with. The
/// workloads inside the instance own their contents; the orchestrator only
/// creates them and never deletes them.
pub const DATA_SUBDIRS: [&str; 4] = ["inputs", "outputs", "checkpoints", "logs"];

/// Derives every per-instance path and runtime name from the fleet root.
///
/// The materializer and the lifecycle controller both go through this type,
/// so generated artifacts and registry entries always agree on naming.
#[derive(Debug, Clone)]
pub struct FleetLayout {
    root: PathBuf,
}

impl FleetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILENAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    pub fn base_env_file(&self) -> PathBuf {
        self.root.join(BASE_ENV_FILENAME)
    }

    /// Env descriptor name as the deployment manifest references it,
    /// relative to the fleet root.
    pub fn env_file_name(&self, id: u32) -> String {
        format!(".env.instance_{id}")
    }

    pub fn env_file(&self, id: u32) -> PathBuf {
        self.root.join(self.env_file_name(id))
    }

    pub fn manifest_file(&self, id: u32) -> PathBuf {
        self.root.join(format!("docker-compose.instance_{id}.yml"))
    }

    /// Instance data path as the env descriptor and manifest advertise it,
    /// relative to the fleet root.
    pub fn data_dir_relative(&self, id: u32) -> String {
        format!("data/instance_{id}")
    }

    pub fn data_dir(&self, id: u32) -> PathBuf {
        self.root.join("data").join(format!("instance_{id}"))
    }

    pub fn project_name(&self, id: u32) -> String {
        format!("fleet_instance_{id}")
    }

    pub fn network_name(&self, id: u32) -> String {
        format!("fleet_instance_{id}")
    }

    pub fn cache_service(&self, id: u32) -> String {
        format!("redis_instance_{id}")
    }

    pub fn app_service(&self, id: u32) -> String {
        format!("app_instance_{id}")
    }

    pub fn worker_service(&self, id: u32) -> String {
        format!("worker_instance_{id}")
    }

    pub fn cache_volume(&self, id: u32) -> String {
        format!("redis_data_instance_{id}")
    }
}
