//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --config bridge.toml (or COLLECTOR_BRIDGE_CONFIG holding TOML text)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, every problem reported)
//!     → BridgeConfig (validated, immutable)
//!     → consumed once by lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All sections have defaults so a minimal file only names the servers
//! - Scheme checks on server locations live in upstream::ConnectionPool::configure,
//!   validation here only reports missing values

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_or_env, parse_config, ConfigError, CONFIG_ENV_VAR};
pub use schema::{
    BridgeConfig, CacheConfig, HealthCheckConfig, ListenerConfig, LoginUser, ObservabilityConfig,
    RelayConfig, RetryConfig, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
