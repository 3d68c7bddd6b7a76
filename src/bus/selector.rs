//! Active-camera selection shared by all stream sessions.

use thiserror::Error;
use tokio::sync::watch;

/// Errors from [`CameraSelector::switch_to`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("camera index {index} out of range ({count} cameras)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Which camera stream sessions read from.
///
/// The selected index lives in a watch slot whose lock serializes
/// [`switch_to`](Self::switch_to) against [`current`](Self::current); readers
/// never see a partially updated value. Sessions hold a
/// [`SelectionReceiver`] so a switch wakes them even while they are waiting
/// on the old camera's bus.
#[derive(Debug)]
pub struct CameraSelector {
    count: usize,
    current: watch::Sender<usize>,
}

impl CameraSelector {
    /// Selector over `count` cameras, starting at camera 0.
    ///
    /// `count` must be at least 1.
    pub fn new(count: usize) -> Self {
        let (current, _) = watch::channel(0);
        Self {
            count: count.max(1),
            current,
        }
    }

    /// Currently selected camera index.
    pub fn current(&self) -> usize {
        *self.current.borrow()
    }

    /// Selects camera `index`, returning the previous selection.
    ///
    /// Out-of-range requests leave the selection unchanged.
    pub fn switch_to(&self, index: usize) -> Result<usize, SelectError> {
        if index >= self.count {
            return Err(SelectError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        Ok(self.current.send_replace(index))
    }

    /// Number of selectable cameras.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Subscribes to selection changes.
    pub fn watch(&self) -> SelectionReceiver {
        SelectionReceiver {
            rx: self.current.subscribe(),
        }
    }
}

/// Observes selection changes.
#[derive(Debug, Clone)]
pub struct SelectionReceiver {
    rx: watch::Receiver<usize>,
}

impl SelectionReceiver {
    /// Current selection; marks it as seen.
    pub fn current(&mut self) -> usize {
        *self.rx.borrow_and_update()
    }

    /// Waits until a switch happens after the last [`current`](Self::current)
    /// call, returning the new selection. `None` when the selector is gone.
    pub async fn changed(&mut self) -> Option<usize> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_switch_in_range() {
        let selector = CameraSelector::new(3);
        assert_eq!(selector.current(), 0);

        assert_eq!(selector.switch_to(2), Ok(0));
        assert_eq!(selector.current(), 2);
    }

    #[test]
    fn test_out_of_range_leaves_selection() {
        let selector = CameraSelector::new(2);
        selector.switch_to(1).unwrap();

        assert_eq!(
            selector.switch_to(5),
            Err(SelectError::IndexOutOfRange { index: 5, count: 2 })
        );
        assert_eq!(selector.current(), 1);
    }

    #[tokio::test]
    async fn test_watch_wakes_on_switch() {
        let selector = CameraSelector::new(2);
        let mut rx = selector.watch();
        assert_eq!(rx.current(), 0);

        selector.switch_to(1).unwrap();
        let changed = tokio::time::timeout(Duration::from_secs(1), rx.changed()).await;
        assert_eq!(changed.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_rejected_switch_does_not_wake() {
        let selector = CameraSelector::new(2);
        let mut rx = selector.watch();
        rx.current();

        assert!(selector.switch_to(2).is_err());
        let changed = tokio::time::timeout(Duration::from_millis(20), rx.changed()).await;
        assert!(changed.is_err());
    }
}
