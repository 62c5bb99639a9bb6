//! Falcon Messenger - fan one message out to many messaging platforms
//!
//! This library holds the dispatch engine (target resolution, rendering,
//! concurrent publishing, result aggregation) together with the platform
//! clients, configuration, logging, HTTP API and the recommendations feed
//! used by the `falcon-*` binaries.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod recommendations;
pub mod registry;
pub mod render;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchOptions, Dispatcher};
pub use error::{ErrorKind, FalconError, PlatformError, Result, ValidationError};
pub use registry::TargetRegistry;
pub use types::{DispatchResult, ImageRef, PlatformId, PlatformResult, PublishRequest};

/// Crate version reported by the health endpoint and the CLIs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
