pub mod reconciler;
pub mod save_scheduler;

pub use reconciler::RecordReconciler;
pub use save_scheduler::{SaveBatch, SaveScheduler};
