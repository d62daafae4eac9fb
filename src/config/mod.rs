//! Layered configuration: load, merge, interpolate, read.

mod accessors;
mod interpolate;
mod loader;
mod merge;
mod value;

pub use interpolate::{process_env, EnvSnapshot};
pub use loader::resolve;
pub use merge::deep_merge;
pub use value::{ConfigValue, EffectiveConfig};
