#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("instance {0} is already running")]
    DuplicateInstance(u32),

    #[error("instance {0} not found")]
    UnknownInstance(u32),

    #[error("no instances are running")]
    EmptyFleet,

    #[error("no free {class} port in range {base}..={limit}")]
    PortExhaustion {
        class: &'static str,
        base: u16,
        limit: u16,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("registry state failed: {0}")]
    State(String),

    #[error("container runtime failed: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
