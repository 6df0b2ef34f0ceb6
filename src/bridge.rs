//! Bridge actor.
//!
//! Every entry point (platform broadcasts, media buttons, volume callbacks,
//! timers, explicit start/stop) becomes a [`BridgeMessage`] in one mailbox.
//! A single task drains it, so session claims and the playback/cursor state
//! are never touched concurrently.

use crate::config::BridgeConfig;
use crate::dispatch::{DispatchNotification, EventDispatcher};
use crate::liveness::{
    admit, MediaKeyEvent, PlatformSignal, TokioWakeScheduler, WakeScheduler, WakeSink, WakeSource,
};
use crate::media::{FocusChange, MediaPlatform, SessionController};
use crate::remote::{EntityState, RemoteError, RemoteGateway};
use crate::router::{CommandRouter, TransportCommand};
use crate::state::{BridgeSnapshot, BridgeState, SharedBridgeView};
use crate::state_machine::SessionState;
use crate::store::{ConfigStore, Device, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::select;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge task is not running")]
    Closed,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum BridgeMessage {
    Wake(WakeSource),
    Command(TransportCommand),
    FocusChanged(FocusChange),
    DevicesChanged,
    Start,
    Stop,
    TaskRemoved,
    EntityStateFetched(EntityState),
    Snapshot(oneshot::Sender<BridgeSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Collaborators the bridge runs against
pub struct BridgeDeps {
    pub store: Arc<dyn ConfigStore>,
    pub gateway: Arc<dyn RemoteGateway>,
    pub platform: Arc<dyn MediaPlatform>,
    /// `None` uses a [`TokioWakeScheduler`] that wakes this bridge
    pub scheduler: Option<Arc<dyn WakeScheduler>>,
}

impl BridgeDeps {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        gateway: Arc<dyn RemoteGateway>,
        platform: Arc<dyn MediaPlatform>,
    ) -> Self {
        Self {
            store,
            gateway,
            platform,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn WakeScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

/// Cheap, cloneable entry point into the bridge task
#[derive(Clone)]
pub struct BridgeHandle {
    mailbox: mpsc::UnboundedSender<BridgeMessage>,
    view: SharedBridgeView,
    dispatcher: EventDispatcher,
}

impl BridgeHandle {
    fn send(&self, message: BridgeMessage) -> Result<(), BridgeError> {
        self.mailbox.send(message).map_err(|_| BridgeError::Closed)
    }

    pub fn wake(&self, source: WakeSource) -> Result<(), BridgeError> {
        self.send(BridgeMessage::Wake(source))
    }

    /// Forward a platform broadcast; broadcasts that are not wake triggers are dropped here.
    pub fn signal(&self, signal: PlatformSignal) -> Result<(), BridgeError> {
        match signal.wake_source() {
            Some(source) => self.wake(source),
            None => {
                log::debug!("[LIVENESS] Ignoring {:?}", signal);
                Ok(())
            }
        }
    }

    pub fn command(&self, command: TransportCommand) -> Result<(), BridgeError> {
        self.send(BridgeMessage::Command(command))
    }

    pub fn media_button(&self, event: MediaKeyEvent) -> Result<(), BridgeError> {
        match event.to_command() {
            Some(command) => self.command(command),
            None => Ok(()),
        }
    }

    pub fn focus_changed(&self, change: FocusChange) -> Result<(), BridgeError> {
        self.send(BridgeMessage::FocusChanged(change))
    }

    /// Reload the device list from the store after a roster mutation
    pub fn devices_changed(&self) -> Result<(), BridgeError> {
        self.send(BridgeMessage::DevicesChanged)
    }

    /// Enable the bridge and activate it
    pub fn start(&self) -> Result<(), BridgeError> {
        self.send(BridgeMessage::Start)
    }

    /// Disable the bridge, release the session and cancel every liveness trigger
    pub fn stop(&self) -> Result<(), BridgeError> {
        self.send(BridgeMessage::Stop)
    }

    pub fn task_removed(&self) -> Result<(), BridgeError> {
        self.send(BridgeMessage::TaskRemoved)
    }

    /// Snapshot taken after every message queued before this call was handled
    pub async fn snapshot(&self) -> Result<BridgeSnapshot, BridgeError> {
        let (reply, response) = oneshot::channel();
        self.send(BridgeMessage::Snapshot(reply))?;
        response.await.map_err(|_| BridgeError::Closed)
    }

    /// Last published snapshot, without a round trip through the mailbox
    pub fn latest(&self) -> BridgeSnapshot {
        self.view.current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchNotification> {
        self.dispatcher.subscribe()
    }

    /// Release the session and stop the bridge task
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        let (done, finished) = oneshot::channel();
        self.send(BridgeMessage::Shutdown(done))?;
        finished.await.map_err(|_| BridgeError::Closed)
    }
}

impl WakeSink for BridgeHandle {
    fn deliver(&self, source: WakeSource) {
        if self.wake(source).is_err() {
            log::debug!("[LIVENESS] Dropping {} wake, bridge is gone", source);
        }
    }
}

pub struct Bridge {
    config: BridgeConfig,
    store: Arc<dyn ConfigStore>,
    gateway: Arc<dyn RemoteGateway>,
    scheduler: Arc<dyn WakeScheduler>,
    dispatcher: EventDispatcher,
    controller: SessionController,
    router: CommandRouter,
    devices: Vec<Device>,
    view: SharedBridgeView,
    handle: BridgeHandle,
    initial_state_fetched: bool,
}

impl Bridge {
    /// Spawn the bridge task. Must be called from within a tokio runtime.
    pub fn spawn(deps: BridgeDeps, config: BridgeConfig) -> BridgeHandle {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let view = SharedBridgeView::new(BridgeSnapshot::initial(config.initial_volume));
        let dispatcher = EventDispatcher::new(deps.gateway.clone(), config.notification_capacity);
        let handle = BridgeHandle {
            mailbox,
            view: view.clone(),
            dispatcher: dispatcher.clone(),
        };

        let scheduler = deps.scheduler.unwrap_or_else(|| {
            Arc::new(TokioWakeScheduler::new(
                config.scheduled_wake_period,
                config.scheduled_wake_flex,
                config.backup_alarm_delay,
                Arc::new(handle.clone()),
            ))
        });

        let devices = deps.store.devices();
        let mut router = CommandRouter::new(config.initial_volume, config.volume_step);
        router.on_devices_changed(&devices);

        let bridge = Bridge {
            controller: SessionController::new(
                deps.platform,
                config.quiet_window,
                config.heartbeat_policy,
            ),
            router,
            devices,
            store: deps.store,
            gateway: deps.gateway,
            scheduler,
            dispatcher,
            view,
            handle: handle.clone(),
            initial_state_fetched: false,
            config,
        };
        bridge.publish_view();

        tokio::spawn(bridge.run(inbox));
        handle
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<BridgeMessage>) {
        let period = self.config.refresh_interval;
        let mut refresh = tokio::time::interval_at(Instant::now() + period, period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Bridge started ({} devices, refresh every {}s)",
            self.devices.len(),
            period.as_secs()
        );

        loop {
            select! {
                message = inbox.recv() => {
                    match message {
                        Some(BridgeMessage::Shutdown(done)) => {
                            self.controller.teardown("shutdown");
                            self.scheduler.cancel_backup();
                            self.publish_view();
                            let _ = done.send(());
                            break;
                        }
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                }
                _ = refresh.tick() => self.handle_wake(WakeSource::PeriodicTimer),
            }
        }

        log::info!("Bridge stopped");
    }

    fn handle_message(&mut self, message: BridgeMessage) {
        match message {
            BridgeMessage::Wake(source) => self.handle_wake(source),
            BridgeMessage::Command(command) => self.handle_command(command),
            BridgeMessage::FocusChanged(change) => self.controller.on_focus_change(change),
            BridgeMessage::DevicesChanged => self.reload_devices(),
            BridgeMessage::Start => {
                if let Err(e) = self.store.set_enabled(true) {
                    log::error!("Failed to persist enabled flag: {}", e);
                }
                self.handle_wake(WakeSource::Explicit);
            }
            BridgeMessage::Stop => self.stop(),
            BridgeMessage::TaskRemoved => {
                if self.gate().is_open() {
                    log::info!("[LIVENESS] Task removed, arming backup alarm");
                    self.scheduler.arm_backup();
                }
            }
            BridgeMessage::EntityStateFetched(state) => {
                if self.router.apply_entity_state(&self.devices, &state) {
                    self.publish();
                }
            }
            BridgeMessage::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop
            BridgeMessage::Shutdown(_) => {}
        }
        self.publish_view();
    }

    fn gate(&self) -> BridgeState {
        self.store.bridge_state()
    }

    fn handle_wake(&mut self, source: WakeSource) {
        if !admit(source, self.gate()) {
            return;
        }

        let owned = self.controller.state() != SessionState::Inactive;
        if owned && source.is_refresh_timer() {
            if self.controller.tick(self.router.playback(), Instant::now()) {
                self.publish();
            }
            return;
        }

        log::info!("[LIVENESS] Activating bridge ({})", source);
        self.controller
            .claim(self.router.playback(), Instant::now(), source.as_str());
        self.after_activation();
    }

    /// Bookkeeping shared by every successful activation
    fn after_activation(&mut self) {
        if !self.initial_state_fetched {
            self.initial_state_fetched = true;
            if let Some(device) = self.router.selected_device(&self.devices) {
                let entity_id = device.entity_id.clone();
                self.fetch_entity_state(entity_id);
            }
        }
        self.scheduler.ensure_periodic();
        self.scheduler.arm_backup();
        self.publish();
    }

    fn handle_command(&mut self, command: TransportCommand) {
        if !self.gate().is_open() {
            log::debug!("[ROUTER] Dropping {:?}, bridge is disabled", command);
            return;
        }

        let now = Instant::now();
        if self
            .controller
            .ensure_active(self.router.playback(), now, "command while inactive")
        {
            self.after_activation();
        }

        let outcome = self.router.route(command, &self.devices);
        if let Some(action) = outcome.action {
            // Completion is reported through the notification channel
            drop(self.dispatcher.dispatch(action));
        }
        if let Some(changed) = outcome.volume_changed {
            self.controller
                .note_volume_event(self.router.playback(), changed, now);
        }
        if let Some(entity_id) = outcome.refresh_entity {
            self.fetch_entity_state(entity_id);
        }
        self.publish();
    }

    fn fetch_entity_state(&self, entity_id: String) {
        let gateway = self.gateway.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            match gateway.get_entity_state(&entity_id).await {
                Ok(state) => {
                    log::debug!(
                        "Fetched {}: state={}, brightness={:?}",
                        state.entity_id,
                        state.state,
                        state.brightness
                    );
                    if handle.send(BridgeMessage::EntityStateFetched(state)).is_err() {
                        log::debug!("Bridge gone before state of {} arrived", entity_id);
                    }
                }
                Err(e) => log::warn!("Failed to fetch state of {}: {}", entity_id, e),
            }
        });
    }

    fn reload_devices(&mut self) {
        self.devices = self.store.devices();
        self.router.on_devices_changed(&self.devices);
        log::info!("Device list reloaded ({} devices)", self.devices.len());
        self.publish();
    }

    fn stop(&mut self) {
        if let Err(e) = self.store.set_enabled(false) {
            log::error!("Failed to persist enabled flag: {}", e);
        }
        self.controller.teardown("disabled");
        self.scheduler.cancel_periodic();
        self.scheduler.cancel_backup();
    }

    /// Push transport state and display metadata to the platform
    fn publish(&self) {
        let display = self.router.display(&self.devices);
        self.controller.publish(self.router.playback(), &display);
    }

    fn snapshot(&self) -> BridgeSnapshot {
        let display = self.router.display(&self.devices);
        BridgeSnapshot {
            session_state: self.controller.state(),
            ownership_active: self.controller.is_active(),
            playback: self.router.playback(),
            cursor: self.router.cursor_index(),
            device_count: self.devices.len(),
            display,
        }
    }

    fn publish_view(&self) {
        let snapshot = self.snapshot();
        self.view.publish(snapshot);
    }
}
