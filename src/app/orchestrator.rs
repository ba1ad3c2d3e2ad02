use super::types::{ComponentState, ShutdownReason};
use crate::capture::CaptureDeliveryPipeline;
use crate::config::LapsecamConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::hardware::{
    CardSlot, DisplayPanel, FeedClient, Indicator, InputSource, Radio, Sensor,
};
use crate::modes::ModeController;
use crate::storage::StorageGuardian;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Concrete collaborators the appliance runs against
#[derive(Clone)]
pub struct Devices {
    pub sensor: Arc<dyn Sensor>,
    pub display: Arc<dyn DisplayPanel>,
    pub radio: Arc<dyn Radio>,
    pub feed: Arc<dyn FeedClient>,
    pub card: Arc<dyn CardSlot>,
    pub input: Arc<dyn InputSource>,
    pub indicator: Arc<dyn Indicator>,
}

/// Wires the components together and drives the cooperative control loop
pub struct LapsecamOrchestrator {
    pub(super) config: LapsecamConfig,
    pub(super) devices: Devices,

    // Components
    pub(super) link: Arc<ConnectivityMonitor>,
    pub(super) storage: Arc<StorageGuardian>,
    pub(super) pipeline: Arc<CaptureDeliveryPipeline>,
    pub(super) modes: ModeController,

    // Lifecycle management
    pub(super) component_states: Mutex<HashMap<String, ComponentState>>,
    pub(super) shutdown_reason: Arc<Mutex<Option<ShutdownReason>>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) last_report: Mutex<Option<Instant>>,
}

impl LapsecamOrchestrator {
    pub fn new(config: LapsecamConfig, devices: Devices) -> Self {
        let link = Arc::new(ConnectivityMonitor::new(
            Arc::clone(&devices.radio),
            &config.network,
        ));

        let storage = Arc::new(StorageGuardian::new(
            Arc::clone(&devices.card),
            Arc::clone(&devices.display),
            &config.storage,
            config.ui.message_hold(),
        ));

        let pipeline = Arc::new(CaptureDeliveryPipeline::new(
            Arc::clone(&devices.sensor),
            Arc::clone(&devices.feed),
            Arc::clone(&link),
            Arc::clone(&storage),
            &config.feed,
            &config.delivery,
        ));

        let modes = ModeController::new(
            &config,
            Arc::clone(&devices.sensor),
            Arc::clone(&devices.display),
            Arc::clone(&devices.indicator),
            Arc::clone(&devices.input),
            Arc::clone(&pipeline),
            Arc::clone(&storage),
        );

        Self {
            config,
            devices,
            link,
            storage,
            pipeline,
            modes,
            component_states: Mutex::new(HashMap::new()),
            shutdown_reason: Arc::new(Mutex::new(None)),
            cancellation_token: CancellationToken::new(),
            last_report: Mutex::new(None),
        }
    }

    /// Share an externally owned token, e.g. one a quit key also cancels
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Token that stops the control loop once cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn link(&self) -> &ConnectivityMonitor {
        &self.link
    }

    pub fn storage(&self) -> &StorageGuardian {
        &self.storage
    }

    pub fn pipeline(&self) -> &CaptureDeliveryPipeline {
        &self.pipeline
    }

    pub fn modes(&self) -> &ModeController {
        &self.modes
    }
}
