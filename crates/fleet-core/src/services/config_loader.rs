use std::path::Path;

use crate::error::{OrchestratorError, Result};
use crate::models::FleetConfig;

/// Load the fleet config; a missing file yields the defaults.
pub fn load_or_default(config_path: &Path) -> Result<FleetConfig> {
    if !config_path.exists() {
        return Ok(FleetConfig::default());
    }
    let contents = std::fs::read_to_string(config_path)?;
    let config: FleetConfig = serde_yaml::from_str(&contents)
        .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))?;
    if config.cache_image.is_empty() {
        return Err(OrchestratorError::InvalidConfig(
            "cache_image must not be empty".into(),
        ));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::models::layout::CONFIG_FILENAME;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.app_base_port, 8000);
        assert_eq!(config.cache_base_port, 6379);
        assert_eq!(config.cache_image, "redis:7-alpine");
        assert!(config.app_image.is_none());
    }

    #[test]
    fn parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
app_base_port: 9000
cache_base_port: 7000
cache_image: valkey/valkey:8
app_image: registry.local/app:latest
app_command: serve --port 8000
"#;
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, yaml).unwrap();
        let config = load_or_default(&path).unwrap();
        assert_eq!(config.app_base_port, 9000);
        assert_eq!(config.cache_base_port, 7000);
        assert_eq!(config.cache_image, "valkey/valkey:8");
        assert_eq!(config.app_image.as_deref(), Some("registry.local/app:latest"));
        assert_eq!(config.app_command.as_deref(), Some("serve --port 8000"));
        assert!(config.worker_command.is_none());
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "app_base_port: [not a port").unwrap();
        assert!(matches!(
            load_or_default(&path),
            Err(OrchestratorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_cache_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "cache_image: \"\"\n").unwrap();
        assert!(matches!(
            load_or_default(&path),
            Err(OrchestratorError::InvalidConfig(_))
        ));
    }
}
