pub mod compose;
pub mod config;
pub mod instance;
pub mod layout;

pub use compose::ComposeManifest;
pub use config::FleetConfig;
pub use instance::{Instance, InstanceStatus, UnitHealth};
pub use layout::FleetLayout;
