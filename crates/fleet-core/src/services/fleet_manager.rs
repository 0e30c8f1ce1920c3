use chrono::Utc;

use crate::error::{OrchestratorError, Result};
use crate::models::{FleetConfig, FleetLayout, Instance, InstanceStatus, UnitHealth};
use crate::services::materializer::{self, EXPECTED_UNITS};
use crate::services::ports::{self, PortClass};
use crate::services::registry::{self, Registry, RegistryStore};
use crate::services::runtime::ContainerRuntime;

/// Per-item outcome of a batch command; callers decide what to do with the
/// failures instead of the batch aborting on the first one.
#[derive(Debug)]
pub struct BatchOutcome {
    pub id: u32,
    pub result: Result<()>,
}

/// Drives instances through their lifecycle: absent -> starting -> running
/// -> stopping -> absent. A failed start leaves no trace in the registry.
///
/// Registry access follows a snapshot discipline: every operation loads an
/// owned copy, mutates it, and saves it back whole. The manager assumes it
/// is the only process working against the registry file.
pub struct FleetManager<R> {
    layout: FleetLayout,
    config: FleetConfig,
    store: RegistryStore,
    runtime: R,
}

impl<R: ContainerRuntime> FleetManager<R> {
    pub fn new(layout: FleetLayout, config: FleetConfig, runtime: R) -> Self {
        let store = RegistryStore::new(layout.registry_file());
        Self {
            layout,
            config,
            store,
            runtime,
        }
    }

    pub fn layout(&self) -> &FleetLayout {
        &self.layout
    }

    /// The known fleet as recorded in the registry.
    pub async fn fleet(&self) -> Result<Registry> {
        self.store.load().await
    }

    /// Start one instance. With no explicit id the next free id is taken.
    pub async fn start_instance(&self, id: Option<u32>) -> Result<Instance> {
        let mut fleet = self.store.load().await?;
        let id = id.unwrap_or_else(|| registry::next_id(&fleet));
        if fleet.contains_key(&id) {
            return Err(OrchestratorError::DuplicateInstance(id));
        }
        let offset = id
            .checked_sub(1)
            .ok_or_else(|| OrchestratorError::InvalidConfig("instance id must be positive".into()))?
            .min(u16::MAX as u32) as u16;

        let app_port = ports::find_free_port(
            PortClass::App,
            self.config.app_base_port.saturating_add(offset),
        )?;
        let cache_port = ports::find_free_port(
            PortClass::Cache,
            self.config.cache_base_port.saturating_add(offset),
        )?;

        let data_dir = self.layout.data_dir(id);
        for subdir in crate::models::layout::DATA_SUBDIRS {
            tokio::fs::create_dir_all(data_dir.join(subdir)).await?;
        }

        materializer::materialize(&self.layout, &self.config, id, app_port, cache_port).await?;

        let manifest_file = self.layout.manifest_file(id);
        let project_name = self.layout.project_name(id);
        if let Err(e) = self.runtime.bring_up(&manifest_file, &project_name).await {
            tracing::warn!(instance = id, error = %e, "bring-up failed, removing generated artifacts");
            if let Err(cleanup) = materializer::remove_artifacts(&self.layout, id).await {
                tracing::warn!(instance = id, error = %cleanup, "artifact cleanup failed");
            }
            return Err(e);
        }

        let instance = Instance {
            id,
            app_port,
            cache_port,
            started_at: Utc::now(),
            data_dir,
            env_file: self.layout.env_file(id),
            manifest_file,
            project_name,
        };
        fleet.insert(id, instance.clone());
        self.store.save(&fleet).await?;
        tracing::debug!(instance = id, app_port, cache_port, "instance started");
        Ok(instance)
    }

    /// Stop one instance. The registry entry is removed even when the
    /// runtime call fails; the failure is surfaced afterwards so a dead
    /// instance cannot wedge the fleet. The data directory is preserved.
    pub async fn stop_instance(&self, id: u32) -> Result<Instance> {
        let mut fleet = self.store.load().await?;
        let instance = fleet
            .remove(&id)
            .ok_or(OrchestratorError::UnknownInstance(id))?;

        let runtime_result = self
            .runtime
            .tear_down(&instance.manifest_file, &instance.project_name)
            .await;
        if let Err(ref e) = runtime_result {
            tracing::warn!(instance = id, error = %e, "tear-down failed");
        }

        materializer::remove_artifacts(&self.layout, id).await?;
        self.store.save(&fleet).await?;
        tracing::debug!(instance = id, "instance stopped");

        runtime_result.map(|()| instance)
    }

    /// Stop then immediately start the same id. Allocation re-runs, so the
    /// instance usually, but not guaranteed, gets its old ports back.
    pub async fn restart_instance(&self, id: u32) -> Result<Instance> {
        match self.stop_instance(id).await {
            Ok(_) => {}
            Err(OrchestratorError::Runtime(e)) => {
                // The entry is already removed; starting is still the way
                // forward.
                tracing::warn!(instance = id, error = %e, "tear-down failed during restart");
            }
            Err(e) => return Err(e),
        }
        self.start_instance(Some(id)).await
    }

    /// Report every known instance with its live-unit tally. A failed
    /// runtime query reads as unknown rather than stopped.
    pub async fn status(&self) -> Result<Vec<InstanceStatus>> {
        let fleet = self.store.load().await?;
        let mut report = Vec::with_capacity(fleet.len());
        for instance in fleet.into_values() {
            let units = match self
                .runtime
                .query(&instance.manifest_file, &instance.project_name)
                .await
            {
                Ok(states) => UnitHealth::Counted {
                    running: states.iter().filter(|u| u.is_running()).count(),
                    expected: EXPECTED_UNITS,
                },
                Err(e) => {
                    tracing::warn!(instance = instance.id, error = %e, "status query failed");
                    UnitHealth::Unknown
                }
            };
            report.push(InstanceStatus { instance, units });
        }
        Ok(report)
    }

    /// Start `count` fresh instances sequentially, continuing past
    /// individual failures. Earlier successes are never rolled back.
    pub async fn start_many(&self, count: u32) -> Result<Vec<BatchOutcome>> {
        let mut outcomes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let fleet = self.store.load().await?;
            let id = registry::next_id(&fleet);
            let result = self.start_instance(Some(id)).await.map(|_| ());
            outcomes.push(BatchOutcome { id, result });
        }
        Ok(outcomes)
    }

    /// Stop every known instance in ascending id order, continuing past
    /// individual failures.
    pub async fn stop_all(&self) -> Result<Vec<BatchOutcome>> {
        let fleet = self.store.load().await?;
        let mut outcomes = Vec::with_capacity(fleet.len());
        for id in fleet.into_keys() {
            let result = self.stop_instance(id).await.map(|_| ());
            outcomes.push(BatchOutcome { id, result });
        }
        Ok(outcomes)
    }
}
