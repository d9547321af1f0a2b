pub mod memory;
pub mod notify;

pub use memory::MemoryRemotePersistence;
pub use notify::BroadcastObserver;
