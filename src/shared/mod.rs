pub mod config;
pub mod error;
pub mod metrics;

pub use config::SyncConfig;
pub use error::{Result, SaveErrorKind, SyncError};
pub use metrics::{EngineMetrics, MetricsSnapshot};
