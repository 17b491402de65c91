//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or flat properties
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable)
//!     → handed to Harness::builder()
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::HarnessConfig;
pub use schema::ObservabilityConfig;
pub use schema::RunnerConfig;
pub use schema::TracingConfig;
pub use schema::CORRELATE_TRACE_KEY;
