// Export modules for library usage
pub mod capabilities;
pub mod cli;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod persist;
pub mod proxy;
pub mod registry;
pub mod report;
pub mod runner;
pub mod stage;
pub mod tools;

// Re-export commonly used types
pub use crate::capabilities::{Capability, CapabilitySet};
pub use crate::config::{ConfigValue, EffectiveConfig};
pub use crate::errors::{CapabilityError, ConfigError, PipelineError, RegistryError};
pub use crate::orchestrator::{Orchestrator, PipelineRequest};
pub use crate::proxy::{ProxyDescriptor, ProxyOverride};
pub use crate::registry::{Completeness, Dataset, DatasetRegistry, DatasetValue};
pub use crate::report::{RunReport, RunReportEntry, StageStatus};
pub use crate::runner::{Collector, InvocationContext, StageInput, StageRunner};
pub use crate::stage::{descriptor, StageDescriptor, StageId};
