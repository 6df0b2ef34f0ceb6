use crate::router::DisplayMetadata;
use crate::state::PlaybackModel;
use crate::state_machine::SessionState;
use std::sync::{Arc, Mutex, MutexGuard};

/// Point-in-time view of the bridge for observers
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSnapshot {
    pub session_state: SessionState,
    pub ownership_active: bool,
    pub playback: PlaybackModel,
    pub cursor: usize,
    pub device_count: usize,
    pub display: DisplayMetadata,
}

impl BridgeSnapshot {
    pub fn initial(initial_volume: u8) -> Self {
        Self {
            session_state: SessionState::Inactive,
            ownership_active: false,
            playback: PlaybackModel::new(initial_volume),
            cursor: 0,
            device_count: 0,
            display: DisplayMetadata::idle(),
        }
    }
}

/// Latest snapshot published by the bridge task, readable from any thread.
/// Only the bridge task writes it.
#[derive(Clone)]
pub struct SharedBridgeView {
    inner: Arc<Mutex<BridgeSnapshot>>,
}

impl SharedBridgeView {
    pub fn new(initial: BridgeSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Current snapshot
    pub fn current(&self) -> BridgeSnapshot {
        self.lock_or_recover().clone()
    }

    pub(crate) fn publish(&self, snapshot: BridgeSnapshot) {
        *self.lock_or_recover() = snapshot;
    }

    /// Lock the view, recovering from poison if necessary
    fn lock_or_recover(&self) -> MutexGuard<'_, BridgeSnapshot> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Recovering from poisoned mutex in SharedBridgeView");
                poisoned.into_inner()
            }
        }
    }
}
