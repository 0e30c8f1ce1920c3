//! Workload file exchange across the fleet: spreading input files over the
//! instances' `inputs` directories and gathering their `outputs` back into
//! one place.

use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};
use crate::services::registry::Registry;

/// How distribute spreads files across the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// File i goes to instance i mod n, in ascending id order.
    RoundRobin,
    /// Contiguous chunks; earlier instances absorb the remainder.
    Balanced,
}

/// Files moved per instance by a distribute or collect run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub per_instance: Vec<(u32, usize)>,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.per_instance.iter().map(|(_, count)| count).sum()
    }
}

/// Copy every regular file in `source_dir` into the fleet's `inputs`
/// directories according to `strategy`. Files are taken in name order so a
/// given source directory always distributes the same way.
pub async fn distribute(
    registry: &Registry,
    source_dir: &Path,
    strategy: Strategy,
) -> Result<TransferReport> {
    if registry.is_empty() {
        return Err(OrchestratorError::EmptyFleet);
    }
    let files = list_files(source_dir).await?;
    let instances: Vec<_> = registry.values().collect();
    let mut counts = vec![0usize; instances.len()];

    match strategy {
        Strategy::RoundRobin => {
            for (index, file) in files.iter().enumerate() {
                let slot = index % instances.len();
                copy_into(file, &instances[slot].data_dir.join("inputs")).await?;
                counts[slot] += 1;
            }
        }
        Strategy::Balanced => {
            let share = files.len() / instances.len();
            let remainder = files.len() % instances.len();
            let mut taken = 0;
            for (slot, count) in counts.iter_mut().enumerate() {
                let take = share + usize::from(slot < remainder);
                for file in &files[taken..taken + take] {
                    copy_into(file, &instances[slot].data_dir.join("inputs")).await?;
                }
                *count = take;
                taken += take;
            }
        }
    }

    Ok(TransferReport {
        per_instance: instances
            .iter()
            .map(|instance| instance.id)
            .zip(counts)
            .collect(),
    })
}

/// Gather every file from each instance's `outputs` directory into
/// `target_dir`, renamed to `{stem}_i{id}{ext}` so instances cannot
/// collide. Instances without an outputs directory are skipped.
pub async fn collect(registry: &Registry, target_dir: &Path) -> Result<TransferReport> {
    if registry.is_empty() {
        return Err(OrchestratorError::EmptyFleet);
    }
    tokio::fs::create_dir_all(target_dir).await?;

    let mut per_instance = Vec::with_capacity(registry.len());
    for instance in registry.values() {
        let outputs = instance.data_dir.join("outputs");
        if !outputs.exists() {
            per_instance.push((instance.id, 0));
            continue;
        }
        let files = list_files(&outputs).await?;
        for file in &files {
            tokio::fs::copy(file, target_dir.join(suffixed_name(file, instance.id))).await?;
        }
        per_instance.push((instance.id, files.len()));
    }
    Ok(TransferReport { per_instance })
}

async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

async fn copy_into(file: &Path, dest_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let Some(name) = file.file_name() else {
        return Ok(());
    };
    tokio::fs::copy(file, dest_dir.join(name)).await?;
    Ok(())
}

fn suffixed_name(file: &Path, id: u32) -> String {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_i{id}.{ext}"),
        None => format!("{stem}_i{id}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{FleetLayout, Instance};

    fn fleet_of(root: &Path, ids: &[u32]) -> Registry {
        let layout = FleetLayout::new(root);
        ids.iter()
            .map(|&id| {
                (
                    id,
                    Instance {
                        id,
                        app_port: 8000,
                        cache_port: 6379,
                        started_at: Utc::now(),
                        data_dir: layout.data_dir(id),
                        env_file: layout.env_file(id),
                        manifest_file: layout.manifest_file(id),
                        project_name: layout.project_name(id),
                    },
                )
            })
            .collect()
    }

    async fn write_source_files(dir: &Path, count: usize) {
        tokio::fs::create_dir_all(dir).await.unwrap();
        for index in 0..count {
            tokio::fs::write(dir.join(format!("doc_{index}.html")), "<html/>")
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn round_robin_alternates_instances() {
        let dir = tempfile::tempdir().unwrap();
        let registry = fleet_of(dir.path(), &[1, 2]);
        let source = dir.path().join("incoming");
        write_source_files(&source, 5).await;

        let report = distribute(&registry, &source, Strategy::RoundRobin)
            .await
            .unwrap();
        assert_eq!(report.per_instance, vec![(1, 3), (2, 2)]);
        assert_eq!(report.total(), 5);

        let layout = FleetLayout::new(dir.path());
        assert!(layout.data_dir(1).join("inputs/doc_0.html").exists());
        assert!(layout.data_dir(2).join("inputs/doc_1.html").exists());
        assert!(layout.data_dir(1).join("inputs/doc_2.html").exists());
    }

    #[tokio::test]
    async fn balanced_gives_earlier_instances_the_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let registry = fleet_of(dir.path(), &[1, 2, 3]);
        let source = dir.path().join("incoming");
        write_source_files(&source, 7).await;

        let report = distribute(&registry, &source, Strategy::Balanced)
            .await
            .unwrap();
        assert_eq!(report.per_instance, vec![(1, 3), (2, 2), (3, 2)]);

        let layout = FleetLayout::new(dir.path());
        // Chunks are contiguous in name order.
        assert!(layout.data_dir(1).join("inputs/doc_0.html").exists());
        assert!(layout.data_dir(1).join("inputs/doc_2.html").exists());
        assert!(layout.data_dir(2).join("inputs/doc_3.html").exists());
        assert!(layout.data_dir(3).join("inputs/doc_6.html").exists());
    }

    #[tokio::test]
    async fn distribute_needs_a_fleet() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("incoming");
        write_source_files(&source, 1).await;
        assert!(matches!(
            distribute(&Registry::new(), &source, Strategy::RoundRobin).await,
            Err(OrchestratorError::EmptyFleet)
        ));
    }

    #[tokio::test]
    async fn collect_renames_per_instance() {
        let dir = tempfile::tempdir().unwrap();
        let registry = fleet_of(dir.path(), &[1, 2]);
        let layout = FleetLayout::new(dir.path());

        for id in [1, 2] {
            let outputs = layout.data_dir(id).join("outputs");
            tokio::fs::create_dir_all(&outputs).await.unwrap();
            tokio::fs::write(outputs.join("song.json"), "{}")
                .await
                .unwrap();
        }

        let target = dir.path().join("results");
        let report = collect(&registry, &target).await.unwrap();
        assert_eq!(report.per_instance, vec![(1, 1), (2, 1)]);
        assert!(target.join("song_i1.json").exists());
        assert!(target.join("song_i2.json").exists());
    }

    #[tokio::test]
    async fn collect_skips_instances_without_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let registry = fleet_of(dir.path(), &[1]);
        let target = dir.path().join("results");

        let report = collect(&registry, &target).await.unwrap();
        assert_eq!(report.per_instance, vec![(1, 0)]);
        assert_eq!(report.total(), 0);
    }
}
