//! # DeskPilot Tools
//!
//! Tool registry implementation and the default capability catalog:
//! - `InMemoryRegistry`: read-only after bootstrap
//! - native file tools over `tokio::fs` (`files.*`)
//! - declarative platform-command tools (`system.*`, `browsers.*`)
//! - a plan-scoped browser session manager
//!
//! Tools are atomic and deterministic. They receive finished absolute paths
//! and validated params from the pipeline; nothing here resolves paths or
//! rewrites arguments.

mod catalog;
mod command;
mod files;
mod registry;
mod sessions;

pub use catalog::default_catalog;
pub use command::{CommandSpec, CommandTool};
pub use files::{file_tools, FileTool};
pub use registry::InMemoryRegistry;
pub use sessions::BrowserSessionManager;
