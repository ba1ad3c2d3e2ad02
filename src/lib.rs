pub mod config;
pub mod error;
pub mod recovery;
pub mod frame;
pub mod hardware;
pub mod connectivity;
pub mod storage;
pub mod capture;
pub mod timelapse;
pub mod modes;
pub mod app;

#[cfg(feature = "simulator")]
pub mod sim;

#[cfg(test)]
mod testing;

pub use config::LapsecamConfig;
pub use error::{
    BurstError, DeliveryError, EncodeError, LapsecamError, LinkError, RadioError, Result,
    StorageError,
};
pub use recovery::{Backoff, BackoffPolicy};
pub use frame::Frame;
pub use hardware::{
    CardSlot, Color, DisplayPanel, ExposureSettings, FeedClient, FeedPayload, FileKind,
    Indicator, InputEvents, InputSource, MediaSink, Radio, Sensor, SensorSettings,
};
pub use connectivity::{ConnectivityMonitor, LinkState};
pub use storage::{StorageGuardian, StorageState};
pub use capture::{CaptureDeliveryPipeline, CaptureOutcome, CaptureStats, UploadAttempt};
pub use timelapse::{TimelapseSchedule, TimelapseScheduler};
pub use modes::{BurstReport, CaptureMode, FrameRateStats, ModeController, TimelapseSubmode};
pub use app::{ComponentState, Devices, LapsecamOrchestrator, ShutdownReason};
