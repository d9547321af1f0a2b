pub mod ports;
pub mod services;

pub use ports::{NoopObserver, RecordObserver, RemotePatch, RemotePersistence, RemoteRecord};
pub use services::{RecordReconciler, SaveBatch, SaveScheduler};
