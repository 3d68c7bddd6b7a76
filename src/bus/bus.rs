//! Latest-frame slot between one capture loop and its readers.

use crate::capture::Frame;
use std::sync::Arc;
use tokio::sync::watch;

/// Depth-1 overwrite slot for one camera.
///
/// Publishing replaces whatever frame was there and never waits for
/// readers. Each [`FrameReceiver`] independently waits for the next frame
/// newer than the last one it saw; frames published while a reader is busy
/// are skipped for that reader.
#[derive(Clone)]
pub struct FrameBus {
    tx: Arc<watch::Sender<Option<Frame>>>,
}

impl FrameBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes a frame, replacing the previous one.
    pub fn publish(&self, frame: Frame) {
        self.tx.send_replace(Some(frame));
    }

    /// Creates a receiver that waits for the next frame published after
    /// this call. The frame currently in the slot is never replayed.
    pub fn subscribe(&self) -> FrameReceiver {
        FrameReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Most recently published frame, if any.
    pub fn latest(&self) -> Option<Frame> {
        self.tx.borrow().clone()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBus")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

/// Reader side of a [`FrameBus`].
#[derive(Debug)]
pub struct FrameReceiver {
    rx: watch::Receiver<Option<Frame>>,
}

impl FrameReceiver {
    /// Waits for a frame newer than the last one returned.
    ///
    /// Returns `None` once every [`FrameBus`] handle is gone.
    pub async fn next(&mut self) -> Option<Frame> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn frame(sequence: u64) -> Frame {
        Frame::new(Bytes::from(sequence.to_string()), 0, sequence)
    }

    #[test]
    fn test_publish_without_readers_does_not_block() {
        let bus = FrameBus::new();
        for seq in 1..=100 {
            bus.publish(frame(seq));
        }
        assert_eq!(bus.latest().map(|f| f.sequence()), Some(100));
    }

    #[tokio::test]
    async fn test_late_subscriber_waits_for_next_frame() {
        let bus = FrameBus::new();
        bus.publish(frame(1));

        let mut rx = bus.subscribe();
        let stale = tokio::time::timeout(Duration::from_millis(20), rx.next()).await;
        assert!(stale.is_err(), "stale frame was replayed");

        bus.publish(frame(2));
        assert_eq!(rx.next().await.map(|f| f.sequence()), Some(2));
    }

    #[tokio::test]
    async fn test_slow_reader_sees_newest_frame() {
        let bus = FrameBus::new();
        let mut rx = bus.subscribe();

        for seq in 1..=5 {
            bus.publish(frame(seq));
        }
        assert_eq!(rx.next().await.map(|f| f.sequence()), Some(5));
    }

    #[tokio::test]
    async fn test_every_reader_gets_the_frame() {
        let bus = FrameBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(frame(9));
        assert_eq!(a.next().await.map(|f| f.sequence()), Some(9));
        assert_eq!(b.next().await.map(|f| f.sequence()), Some(9));
    }

    #[tokio::test]
    async fn test_receiver_ends_when_bus_dropped() {
        let bus = FrameBus::new();
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(rx.next().await.is_none());
    }
}
