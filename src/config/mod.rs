//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional) + command-line flags
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flags override file values)
//!     → validation.rs (semantic checks)
//!     → LbConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any configuration error is fatal at startup

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    HealthCheckConfig, LbConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, Policy,
    RetryConfig, TimeoutConfig,
};
