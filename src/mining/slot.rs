use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Cancellation group shared by every round racing for the same block index.
/// The first round to append its block cancels the whole group.
#[derive(Debug)]
pub struct RoundSlot {
    index: u64,
    cancel_tx: watch::Sender<bool>,
}

impl RoundSlot {
    fn new(index: u64) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self { index, cancel_tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

/// Resolves once the slot is cancelled (or its sender is gone).
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

#[derive(Debug)]
struct SlotEntry {
    slot: Arc<RoundSlot>,
    members: usize,
}

/// Open slots keyed by block index, with a count of searching rounds each.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    open: Mutex<HashMap<u64, SlotEntry>>,
    /// Live memberships, including losers of a closed slot that have not
    /// yet observed the cancellation.
    in_flight: AtomicUsize,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the race for `index`, opening the slot if needed.
    pub fn join(self: &Arc<Self>, index: u64) -> SlotMembership {
        let slot = {
            let mut open = self.open.lock().expect("mutex poisoned");
            let entry = open.entry(index).or_insert_with(|| SlotEntry {
                slot: Arc::new(RoundSlot::new(index)),
                members: 0,
            });
            entry.members += 1;
            self.in_flight.fetch_add(1, Ordering::AcqRel);
            debug!("SLOT #{index} - {} round(s) racing", entry.members);
            entry.slot.clone()
        };
        SlotMembership {
            registry: self.clone(),
            slot,
        }
    }

    /// Close a slot once it has a winner. Members still holding it keep
    /// their `Arc` and observe the cancellation.
    pub fn close(&self, index: u64) {
        let mut open = self.open.lock().expect("mutex poisoned");
        open.remove(&index);
    }

    /// Rounds still running, across open and closed slots.
    pub fn active_rounds(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn leave(&self, slot: &Arc<RoundSlot>) {
        let mut open = self.open.lock().expect("mutex poisoned");
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        let Some(entry) = open.get_mut(&slot.index) else {
            return;
        };
        // A closed slot may have been reopened for the same index.
        if !Arc::ptr_eq(&entry.slot, slot) {
            return;
        }
        entry.members = entry.members.saturating_sub(1);
        if entry.members == 0 {
            open.remove(&slot.index);
        }
    }
}

/// A round's seat in a slot; leaving happens on drop, including when the
/// round's task is aborted.
#[derive(Debug)]
pub struct SlotMembership {
    registry: Arc<SlotRegistry>,
    slot: Arc<RoundSlot>,
}

impl SlotMembership {
    pub fn slot(&self) -> &RoundSlot {
        &self.slot
    }

    /// Cancel every sibling and close the slot.
    pub fn win(&self) {
        self.slot.cancel();
        self.registry.close(self.slot.index);
    }
}

impl Drop for SlotMembership {
    fn drop(&mut self) {
        self.registry.leave(&self.slot);
    }
}
