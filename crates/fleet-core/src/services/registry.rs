use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{OrchestratorError, Result};
use crate::models::Instance;

/// The fleet as held in memory: instance id to instance record.
pub type Registry = BTreeMap<u32, Instance>;

/// Durable store for the fleet registry, the single source of truth for
/// what is running.
///
/// `load` hands out an owned snapshot and `save` replaces the file
/// wholesale via a temp file and rename, so callers mutate their copy and
/// write it back; a crash mid-save never leaves a truncated file behind.
pub struct RegistryStore {
    registry_path: PathBuf,
}

impl RegistryStore {
    pub fn new(registry_path: PathBuf) -> Self {
        Self { registry_path }
    }

    pub async fn load(&self) -> Result<Registry> {
        if !self.registry_path.exists() {
            return Ok(Registry::new());
        }
        let json = tokio::fs::read_to_string(&self.registry_path)
            .await
            .map_err(|e| OrchestratorError::State(format!("failed to read registry file: {e}")))?;
        let registry: Registry = serde_json::from_str(&json)
            .map_err(|e| OrchestratorError::State(format!("malformed registry file: {e}")))?;
        Ok(registry)
    }

    pub async fn save(&self, registry: &Registry) -> Result<()> {
        let json = serde_json::to_string_pretty(registry)?;
        let mut tmp = self.registry_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp_path = PathBuf::from(tmp);
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| OrchestratorError::State(format!("failed to write registry file: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.registry_path)
            .await
            .map_err(|e| {
                OrchestratorError::State(format!("failed to replace registry file: {e}"))
            })?;
        Ok(())
    }
}

/// Next instance id: 1 for an empty fleet, otherwise max + 1. Ids are never
/// reused after removal; a fleet of {1, 3} yields 4.
pub fn next_id(registry: &Registry) -> u32 {
    registry.keys().max().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::FleetLayout;

    fn test_instance(id: u32) -> Instance {
        let layout = FleetLayout::new("/fleet");
        Instance {
            id,
            app_port: 8000 + id as u16 - 1,
            cache_port: 6379 + id as u16 - 1,
            started_at: Utc::now(),
            data_dir: layout.data_dir(id),
            env_file: layout.env_file(id),
            manifest_file: layout.manifest_file(id),
            project_name: layout.project_name(id),
        }
    }

    fn store(dir: &tempfile::TempDir) -> RegistryStore {
        RegistryStore::new(FleetLayout::new(dir.path()).registry_file())
    }

    #[tokio::test]
    async fn load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = store(&dir).load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn round_trip_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut registry = Registry::new();
        registry.insert(1, test_instance(1));
        registry.insert(3, test_instance(3));
        store.save(&registry).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, registry);
    }

    #[tokio::test]
    async fn malformed_file_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        tokio::fs::write(FleetLayout::new(dir.path()).registry_file(), "{not json")
            .await
            .unwrap();
        assert!(matches!(
            store.load().await,
            Err(OrchestratorError::State(_))
        ));
    }

    #[tokio::test]
    async fn save_uses_decimal_ids_and_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut registry = Registry::new();
        registry.insert(1, test_instance(1));
        store.save(&registry).await.unwrap();

        let json = tokio::fs::read_to_string(FleetLayout::new(dir.path()).registry_file())
            .await
            .unwrap();
        assert!(json.contains("\"1\""));
        assert!(json.contains("\"appPort\""));
        assert!(json.contains("\"projectName\""));
        assert!(!json.contains("\"app_port\""));
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save(&Registry::new()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".fleet-instances.json".to_string()]);
    }

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id(&Registry::new()), 1);
    }

    #[test]
    fn next_id_never_reuses_removed_ids() {
        let mut registry = Registry::new();
        registry.insert(1, test_instance(1));
        registry.insert(3, test_instance(3));
        assert_eq!(next_id(&registry), 4);
    }
}
