use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::frame::Frame;
use crate::hardware::{CardSlot, Color, DisplayPanel, FileKind, MediaSink};
use parking_lot::RwLock;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Removable storage state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    Absent,
    Mounted,
    MountFailed,
}

/// Tracks SD card presence and guards every file-backed operation
pub struct StorageGuardian {
    card: Arc<dyn CardSlot>,
    display: Arc<dyn DisplayPanel>,
    state: RwLock<StorageState>,
    mount_attempts: u32,
    retry_pause: Duration,
    message_hold: Duration,
}

impl StorageGuardian {
    pub fn new(
        card: Arc<dyn CardSlot>,
        display: Arc<dyn DisplayPanel>,
        config: &StorageConfig,
        message_hold: Duration,
    ) -> Self {
        Self {
            card,
            display,
            state: RwLock::new(StorageState::Absent),
            mount_attempts: config.mount_attempts.max(1),
            retry_pause: config.mount_retry_pause(),
            message_hold,
        }
    }

    pub fn state(&self) -> StorageState {
        *self.state.read()
    }

    pub fn is_mounted(&self) -> bool {
        self.state() == StorageState::Mounted
    }

    fn set_state(&self, state: StorageState) {
        let mut current = self.state.write();
        if *current != state {
            info!("Storage state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Mount a card already sitting in the slot at boot
    pub async fn detect_at_startup(&self) -> StorageState {
        if self.card.is_present().await {
            self.on_insert_edge().await
        } else {
            info!("No SD card present at startup");
            self.state()
        }
    }

    /// Card inserted: mount with a bounded number of attempts
    pub async fn on_insert_edge(&self) -> StorageState {
        info!("SD card inserted");
        self.display.show_message("Mounting\nSD Card", Color::White).await;

        for attempt in 1..=self.mount_attempts {
            debug!("Mounting card (attempt {}/{})", attempt, self.mount_attempts);
            match self.card.mount().await {
                Ok(()) => {
                    self.set_state(StorageState::Mounted);
                    return StorageState::Mounted;
                }
                Err(e) => {
                    warn!("Mount attempt {} failed: {}", attempt, e);
                    if attempt < self.mount_attempts {
                        sleep(self.retry_pause).await;
                    }
                }
            }
        }

        error!("SD card mount failed after {} attempts", self.mount_attempts);
        self.set_state(StorageState::MountFailed);
        self.display.show_message("SD Card\nFailed!", Color::Red).await;
        sleep(self.message_hold).await;
        StorageState::MountFailed
    }

    /// Card removed: unmount unconditionally
    pub async fn on_remove_edge(&self) {
        info!("SD card removed");
        self.card.unmount().await;
        self.set_state(StorageState::Absent);
    }

    /// Unmount a mounted card at shutdown
    pub async fn release(&self) {
        if self.is_mounted() {
            info!("Unmounting SD card");
            self.card.unmount().await;
        }
        self.set_state(StorageState::Absent);
    }

    /// Run `op` only while mounted. I/O failures are surfaced without touching
    /// the mount state; the next presence edge re-evaluates it.
    pub async fn with_mounted<T, F, Fut>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(Arc<dyn CardSlot>) -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let state = self.state();
        if state != StorageState::Mounted {
            return Err(StorageError::NotMounted { state });
        }

        op(Arc::clone(&self.card)).await.map_err(|e| {
            warn!("Storage operation failed: {}", e);
            StorageError::IoFailure(e)
        })
    }

    /// Write a complete file under the next sequential name
    pub async fn save_sequential(
        &self,
        kind: FileKind,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        self.with_mounted(|card| async move { card.save_sequential(kind, bytes).await })
            .await
    }

    /// Append one frame to an open sink, refusing once the card is gone
    pub async fn append_frame(
        &self,
        sink: &mut dyn MediaSink,
        frame: &Frame,
        delay: Duration,
    ) -> Result<(), StorageError> {
        self.with_mounted(|_| async move { sink.append(frame, delay).await })
            .await
    }

    /// Open the next sequential file for frame-by-frame writing
    pub async fn open_sequential(&self, kind: FileKind) -> Result<Box<dyn MediaSink>, StorageError> {
        self.with_mounted(|card| async move { card.open_sequential_file(kind).await })
            .await
    }
}
