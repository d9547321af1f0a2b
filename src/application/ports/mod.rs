pub mod record_observer;
pub mod remote_persistence;

pub use record_observer::{NoopObserver, RecordObserver};
pub use remote_persistence::{RemotePatch, RemotePersistence, RemoteRecord};
