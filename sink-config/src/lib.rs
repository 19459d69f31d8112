//! Configuration types and loading for the CDC sink.
//!
//! [`shared`] holds the serde types shared by every consumer of the sink, while
//! [`load_config`] assembles them from layered files and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
