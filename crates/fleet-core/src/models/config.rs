use serde::Deserialize;

/// Knobs read from the optional `.fleet.yaml` at the fleet root. Every
/// field has a default so the file can be absent entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Base port for the application class; instance k scans from
    /// `app_base_port + (k - 1)`.
    pub app_base_port: u16,
    /// Base port for the cache class.
    pub cache_base_port: u16,
    /// Image for the cache service.
    pub cache_image: String,
    /// Image for the application service; absent means build from the
    /// local Dockerfile.
    pub app_image: Option<String>,
    /// Image for the worker service; absent means build from the local
    /// Dockerfile.
    pub worker_image: Option<String>,
    /// Command override for the application service.
    pub app_command: Option<String>,
    /// Command override for the worker service.
    pub worker_command: Option<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            app_base_port: 8000,
            cache_base_port: 6379,
            cache_image: "redis:7-alpine".into(),
            app_image: None,
            worker_image: None,
            app_command: None,
            worker_command: None,
        }
    }
}
