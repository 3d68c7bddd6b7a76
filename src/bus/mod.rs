//! Frame hand-off between capture loops and stream sessions.
//!
//! Each camera gets a [`FrameBus`], a latest-value slot: capture never waits
//! for readers and every reader sees the newest frame. Under load a reader
//! skips frames instead of falling behind; that is the intended drop policy.
//!
//! The [`Switchboard`] groups the buses with the [`CameraSelector`] so a
//! session can resolve which bus to read from on every iteration.

#[allow(clippy::module_inception)]
mod bus;
mod selector;

pub use bus::{FrameBus, FrameReceiver};
pub use selector::{CameraSelector, SelectError, SelectionReceiver};

/// Buses for all running cameras plus the active selection.
#[derive(Debug)]
pub struct Switchboard {
    buses: Vec<FrameBus>,
    selector: CameraSelector,
}

impl Switchboard {
    /// Returns `None` when `buses` is empty: there must always be a camera
    /// to select.
    pub fn new(buses: Vec<FrameBus>) -> Option<Self> {
        if buses.is_empty() {
            return None;
        }
        let selector = CameraSelector::new(buses.len());
        Some(Self { buses, selector })
    }

    /// Number of cameras.
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    /// Always `false` for a constructed switchboard.
    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Bus of camera `index`.
    pub fn bus(&self, index: usize) -> Option<&FrameBus> {
        self.buses.get(index)
    }

    /// Index of the active camera.
    pub fn active(&self) -> usize {
        self.selector.current()
    }

    /// Bus of the active camera.
    pub fn active_bus(&self) -> &FrameBus {
        // The selector only accepts indices below `buses.len()`.
        &self.buses[self.selector.current()]
    }

    /// Subscribes to camera `index`.
    ///
    /// `index` must come from the selector, which only holds valid indices.
    pub(crate) fn subscribe(&self, index: usize) -> FrameReceiver {
        self.buses[index].subscribe()
    }

    /// Makes camera `index` active for every session.
    pub fn switch_to(&self, index: usize) -> Result<usize, SelectError> {
        self.selector.switch_to(index)
    }

    /// Shared camera selection.
    pub fn selector(&self) -> &CameraSelector {
        &self.selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switchboard_requires_a_camera() {
        assert!(Switchboard::new(Vec::new()).is_none());
    }

    #[test]
    fn test_active_bus_follows_selection() {
        let board = Switchboard::new(vec![FrameBus::new(), FrameBus::new()]).unwrap();
        let _reader = board.bus(1).unwrap().subscribe();

        board.switch_to(1).unwrap();
        assert_eq!(board.active(), 1);
        assert!(board.switch_to(2).is_err());
        assert_eq!(board.active(), 1);
        assert_eq!(board.active_bus().receiver_count(), 1);
    }
}
