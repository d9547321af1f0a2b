pub mod broadcast;

pub use broadcast::BroadcastObserver;
