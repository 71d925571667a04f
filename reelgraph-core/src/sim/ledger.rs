//! Bookkeeping shared by every graph a [`SimFramework`](super::SimFramework)
//! creates: what was instantiated, what was released and in which order,
//! and what the video window was last told.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::framework::WindowStyle;
use crate::registry::ComponentRole;
use crate::surface::Rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Created(ComponentRole),
    Added(ComponentRole),
    Removed(ComponentRole),
    Released(ComponentRole),
    Run,
    Pause,
    Stop,
    GraphCreated,
    GraphReleased,
}

/// Last state pushed to the video window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowBinding {
    pub owner: Option<isize>,
    pub message_drain: Option<isize>,
    pub style: Option<WindowStyle>,
    pub rect: Option<Rect>,
    pub visible: bool,
}

#[derive(Default)]
struct LedgerInner {
    next_id: u32,
    live: BTreeMap<u32, ComponentRole>,
    double_releases: u32,
    live_graphs: u32,
    events: Vec<SimEvent>,
    window: WindowBinding,
}

#[derive(Default)]
pub struct SimLedger {
    inner: Mutex<LedgerInner>,
}

impl SimLedger {
    pub(crate) fn create(&self, role: ComponentRole) -> u32 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.live.insert(id, role);
        inner.events.push(SimEvent::Created(role));
        id
    }

    pub(crate) fn release(&self, id: u32) {
        let mut inner = self.inner.lock();
        match inner.live.remove(&id) {
            Some(role) => inner.events.push(SimEvent::Released(role)),
            None => inner.double_releases += 1,
        }
    }

    pub(crate) fn graph_created(&self) {
        let mut inner = self.inner.lock();
        inner.live_graphs += 1;
        inner.events.push(SimEvent::GraphCreated);
    }

    pub(crate) fn graph_released(&self) {
        let mut inner = self.inner.lock();
        inner.live_graphs = inner.live_graphs.saturating_sub(1);
        inner.events.push(SimEvent::GraphReleased);
    }

    pub(crate) fn record(&self, event: SimEvent) {
        self.inner.lock().events.push(event);
    }

    pub(crate) fn update_window(&self, f: impl FnOnce(&mut WindowBinding)) {
        f(&mut self.inner.lock().window);
    }

    /// Components instantiated and not yet released
    pub fn live_components(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn live_roles(&self) -> Vec<ComponentRole> {
        self.inner.lock().live.values().copied().collect()
    }

    pub fn total_created(&self) -> u32 {
        self.inner.lock().next_id
    }

    pub fn double_releases(&self) -> u32 {
        self.inner.lock().double_releases
    }

    pub fn live_graphs(&self) -> u32 {
        self.inner.lock().live_graphs
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.inner.lock().events.clone()
    }

    /// Roles in the order their handles were released
    pub fn release_order(&self) -> Vec<ComponentRole> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Released(role) => Some(*role),
                _ => None,
            })
            .collect()
    }

    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }

    pub fn window(&self) -> WindowBinding {
        self.inner.lock().window.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_twice_counts_double_release() {
        let ledger = SimLedger::default();
        let id = ledger.create(ComponentRole::Source);
        assert_eq!(ledger.live_components(), 1);
        ledger.release(id);
        ledger.release(id);
        assert_eq!(ledger.live_components(), 0);
        assert_eq!(ledger.double_releases(), 1);
        assert_eq!(ledger.release_order(), vec![ComponentRole::Source]);
    }
}
