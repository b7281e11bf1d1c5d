//! # DeskPilot Runtime
//!
//! Wires the reasoning core to providers and tools:
//! - `Pipeline`: the top-level `process(utterance, session_id?)` entry point
//! - `ResponseFormatter`: the single place user-facing text is produced
//! - YAML configuration loading and bootstrap

pub mod bootstrap;
pub mod config;
pub mod formatter;
pub mod pipeline;

pub use bootstrap::{bootstrap, BootstrapError};
pub use config::{load_config, ConfigError, RuntimeConfig};
pub use formatter::ResponseFormatter;
pub use pipeline::{
    ActionReport, Pipeline, ProviderRoles, RequestKind, RequestOutcome, StaticWorldProbe,
    WorldProbe,
};
