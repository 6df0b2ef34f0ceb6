use super::WakeSource;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receiver of scheduled wakes
pub trait WakeSink: Send + Sync + 'static {
    fn deliver(&self, source: WakeSource);
}

impl WakeSink for mpsc::UnboundedSender<WakeSource> {
    fn deliver(&self, source: WakeSource) {
        if self.send(source).is_err() {
            log::debug!("[LIVENESS] Dropping {} wake, receiver is gone", source);
        }
    }
}

/// Timers that outlive a single activation: the periodic job and the backup alarm.
///
/// OS job schedulers plug in through this trait; [`TokioWakeScheduler`] is the
/// in-process version.
pub trait WakeScheduler: Send + Sync {
    /// Schedule the periodic job unless one is already pending.
    /// Returns `true` when a new schedule was created.
    fn ensure_periodic(&self) -> bool;

    fn cancel_periodic(&self);

    /// (Re)arm the one-shot backup alarm, replacing any pending one
    fn arm_backup(&self);

    fn cancel_backup(&self);

    fn has_pending_periodic(&self) -> bool;

    fn has_pending_backup(&self) -> bool;
}

/// Delay of one periodic cycle: uniform in `[period - flex, period]`
pub fn next_periodic_delay(period: Duration, flex: Duration) -> Duration {
    let flex = flex.min(period);
    let earliest = period - flex;
    if flex.is_zero() {
        return period;
    }
    let flex_ms = u64::try_from(flex.as_millis()).unwrap_or(u64::MAX);
    let offset_ms = rand::thread_rng().gen_range(0..=flex_ms);
    earliest
        .saturating_add(Duration::from_millis(offset_ms))
        .min(period)
}

/// Tokio-timer implementation. Must be used from within a tokio runtime.
pub struct TokioWakeScheduler {
    period: Duration,
    flex: Duration,
    backup_delay: Duration,
    sink: Arc<dyn WakeSink>,
    periodic: Mutex<Option<JoinHandle<()>>>,
    backup: Mutex<Option<JoinHandle<()>>>,
}

impl TokioWakeScheduler {
    pub fn new(
        period: Duration,
        flex: Duration,
        backup_delay: Duration,
        sink: Arc<dyn WakeSink>,
    ) -> Self {
        Self {
            period,
            flex,
            backup_delay,
            sink,
            periodic: Mutex::new(None),
            backup: Mutex::new(None),
        }
    }

    fn lock_or_recover(slot: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Recovering from poisoned mutex in TokioWakeScheduler");
                poisoned.into_inner()
            }
        }
    }

    fn is_pending(slot: &Mutex<Option<JoinHandle<()>>>) -> bool {
        Self::lock_or_recover(slot)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn abort(slot: &Mutex<Option<JoinHandle<()>>>) -> bool {
        match Self::lock_or_recover(slot).take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl WakeScheduler for TokioWakeScheduler {
    fn ensure_periodic(&self) -> bool {
        let mut slot = Self::lock_or_recover(&self.periodic);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let period = self.period;
        let flex = self.flex;
        let sink = self.sink.clone();
        *slot = Some(tokio::spawn(async move {
            loop {
                let delay = next_periodic_delay(period, flex);
                log::debug!("[LIVENESS] Next scheduled wake in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
                sink.deliver(WakeSource::ScheduledJob);
            }
        }));

        log::info!(
            "[LIVENESS] Periodic wake scheduled every {}min (flex {}min)",
            self.period.as_secs() / 60,
            self.flex.as_secs() / 60
        );
        true
    }

    fn cancel_periodic(&self) {
        if Self::abort(&self.periodic) {
            log::info!("[LIVENESS] Periodic wake cancelled");
        }
    }

    fn arm_backup(&self) {
        let mut slot = Self::lock_or_recover(&self.backup);
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let delay = self.backup_delay;
        let sink = self.sink.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::info!("[LIVENESS] Backup alarm fired");
            sink.deliver(WakeSource::BackupAlarm);
        }));
        log::debug!("[LIVENESS] Backup alarm armed for {}s", delay.as_secs());
    }

    fn cancel_backup(&self) {
        if Self::abort(&self.backup) {
            log::info!("[LIVENESS] Backup alarm cancelled");
        }
    }

    fn has_pending_periodic(&self) -> bool {
        Self::is_pending(&self.periodic)
    }

    fn has_pending_backup(&self) -> bool {
        Self::is_pending(&self.backup)
    }
}

impl Drop for TokioWakeScheduler {
    fn drop(&mut self) {
        Self::abort(&self.periodic);
        Self::abort(&self.backup);
    }
}
