use crate::application::ports::RecordObserver;
use crate::domain::entities::RecordSnapshot;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Fans record snapshots out to any number of subscribers over a tokio
/// broadcast channel. A subscriber that falls more than the channel capacity
/// behind loses the oldest snapshots and sees a lag marker; the latest state
/// always gets through.
#[derive(Debug)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<RecordSnapshot>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordSnapshot> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecordObserver for BroadcastObserver {
    fn record_changed(&self, snapshot: &RecordSnapshot) {
        // No subscribers means nobody to tell; not an error.
        let _ = self.sender.send(snapshot.clone());
    }
}
