use std::collections::BTreeMap;
use std::io::ErrorKind;

use crate::error::Result;
use crate::models::compose::{
    BuildSpec, ComposeManifest, ComposeNetwork, ComposeService, ComposeVolume, DependsOn,
    Healthcheck,
};
use crate::models::{FleetConfig, FleetLayout};

/// Ports the services listen on inside their containers; the allocated host
/// ports are published onto these.
pub const APP_CONTAINER_PORT: u16 = 8000;
pub const CACHE_CONTAINER_PORT: u16 = 6379;

/// Units every instance runs: cache, application, worker.
pub const EXPECTED_UNITS: usize = 3;

/// Render the per-instance env descriptor: the shared base environment with
/// the instance-specific keys appended. Dotenv readers take the last
/// occurrence of a key, so the instance overlay wins.
pub fn render_env(
    base_env: &str,
    layout: &FleetLayout,
    id: u32,
    app_port: u16,
    cache_port: u16,
) -> String {
    let mut env = format!("# environment for instance {id}, generated by fleet\n");
    if !base_env.is_empty() {
        env.push_str(base_env);
        if !base_env.ends_with('\n') {
            env.push('\n');
        }
    }
    env.push('\n');
    env.push_str(&format!("INSTANCE_ID={id}\n"));
    env.push_str(&format!("PORT={app_port}\n"));
    env.push_str(&format!("REDIS_HOST={}\n", layout.cache_service(id)));
    env.push_str(&format!("REDIS_PORT={cache_port}\n"));
    env.push_str(&format!("DATA_DIR={}\n", layout.data_dir_relative(id)));
    env
}

/// Build the typed deployment manifest for one instance: a health-checked
/// cache plus an application and a worker gated on it, everything scoped to
/// the instance's own containers, volume and network.
pub fn build_manifest(
    config: &FleetConfig,
    layout: &FleetLayout,
    id: u32,
    app_port: u16,
    cache_port: u16,
) -> ComposeManifest {
    let cache_name = layout.cache_service(id);
    let network = layout.network_name(id);
    let volume = layout.cache_volume(id);
    let data_mount = format!("./{}:/app/data", layout.data_dir_relative(id));

    let gated_on_cache: BTreeMap<String, DependsOn> = [(
        cache_name.clone(),
        DependsOn {
            condition: "service_healthy".into(),
        },
    )]
    .into();

    let workload_env = |serves_http: bool| -> Vec<String> {
        let mut env = vec![
            format!("REDIS_HOST={cache_name}"),
            format!("REDIS_PORT={CACHE_CONTAINER_PORT}"),
        ];
        if serves_http {
            env.push(format!("PORT={APP_CONTAINER_PORT}"));
        }
        env.push(format!("INSTANCE_ID={id}"));
        env
    };

    let local_build = || BuildSpec {
        context: ".".into(),
        dockerfile: "Dockerfile".into(),
    };

    let cache = ComposeService {
        image: Some(config.cache_image.clone()),
        container_name: cache_name.clone(),
        ports: vec![format!("{cache_port}:{CACHE_CONTAINER_PORT}")],
        volumes: vec![format!("{volume}:/data")],
        healthcheck: Some(Healthcheck {
            test: vec!["CMD".into(), "redis-cli".into(), "ping".into()],
            interval: "10s".into(),
            timeout: "5s".into(),
            retries: 5,
        }),
        networks: vec![network.clone()],
        ..Default::default()
    };

    let app = ComposeService {
        image: config.app_image.clone(),
        build: config.app_image.is_none().then(local_build),
        container_name: layout.app_service(id),
        ports: vec![format!("{app_port}:{APP_CONTAINER_PORT}")],
        volumes: vec![data_mount.clone()],
        env_file: vec![layout.env_file_name(id)],
        environment: workload_env(true),
        depends_on: gated_on_cache.clone(),
        command: config.app_command.clone(),
        networks: vec![network.clone()],
        ..Default::default()
    };

    let worker = ComposeService {
        image: config.worker_image.clone(),
        build: config.worker_image.is_none().then(local_build),
        container_name: layout.worker_service(id),
        volumes: vec![data_mount],
        env_file: vec![layout.env_file_name(id)],
        environment: workload_env(false),
        depends_on: gated_on_cache,
        command: config.worker_command.clone(),
        networks: vec![network.clone()],
        ..Default::default()
    };

    ComposeManifest {
        services: [
            (cache_name, cache),
            (layout.app_service(id), app),
            (layout.worker_service(id), worker),
        ]
        .into(),
        volumes: [(volume, ComposeVolume::default())].into(),
        networks: [(
            network,
            ComposeNetwork {
                driver: "bridge".into(),
            },
        )]
        .into(),
    }
}

/// Write both artifacts for the instance. The paths come from the layout
/// and embed the instance id, so no other instance's files can be touched.
/// Output is deterministic: identical inputs produce byte-identical files.
pub async fn materialize(
    layout: &FleetLayout,
    config: &FleetConfig,
    id: u32,
    app_port: u16,
    cache_port: u16,
) -> Result<()> {
    let base_env = match tokio::fs::read_to_string(layout.base_env_file()).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let env = render_env(&base_env, layout, id, app_port, cache_port);
    tokio::fs::write(layout.env_file(id), env).await?;

    let manifest = build_manifest(config, layout, id, app_port, cache_port);
    let yaml = serde_yaml::to_string(&manifest)?;
    tokio::fs::write(layout.manifest_file(id), yaml).await?;
    Ok(())
}

/// Delete the instance's generated artifacts; files already gone are fine.
pub async fn remove_artifacts(layout: &FleetLayout, id: u32) -> Result<()> {
    for path in [layout.env_file(id), layout.manifest_file(id)] {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
