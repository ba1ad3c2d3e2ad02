use super::SimControls;
use crate::error::DeliveryError;
use crate::hardware::{FeedClient, FeedPayload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// One line of a value feed's `.jsonl` log
#[derive(Debug, Serialize)]
struct ValueRecord<'a> {
    feed: &'a str,
    value: i64,
    received_at: DateTime<Utc>,
}

/// Feed client that "uploads" into a local outbox directory.
///
/// JPEG payloads land as `<feed>-<timestamp>-<seq>.jpg`; values are appended
/// to `<feed>.jsonl`. Sends fail while the simulated access point is down.
pub struct OutboxFeed {
    root: PathBuf,
    controls: Arc<SimControls>,
    sequence: AtomicU64,
}

impl OutboxFeed {
    pub fn new(root: impl AsRef<Path>, controls: Arc<SimControls>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            controls,
            sequence: AtomicU64::new(0),
        }
    }

    fn transport(e: std::io::Error) -> DeliveryError {
        DeliveryError::Transport {
            details: e.to_string(),
        }
    }

    async fn write_jpeg(&self, feed_key: &str, bytes: &[u8]) -> Result<PathBuf, DeliveryError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}-{:04}.jpg",
            feed_key,
            Utc::now().format("%Y%m%dT%H%M%S"),
            seq
        );
        let path = self.root.join(name);
        fs::write(&path, bytes).await.map_err(Self::transport)?;
        Ok(path)
    }

    async fn append_value(&self, feed_key: &str, value: i64) -> Result<(), DeliveryError> {
        let record = ValueRecord {
            feed: feed_key,
            value,
            received_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record).map_err(|e| DeliveryError::Rejected {
            feed: feed_key.to_string(),
            details: e.to_string(),
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(format!("{}.jsonl", feed_key)))
            .await
            .map_err(Self::transport)?;
        file.write_all(line.as_bytes())
            .await
            .map_err(Self::transport)?;
        file.flush().await.map_err(Self::transport)
    }
}

#[async_trait]
impl FeedClient for OutboxFeed {
    async fn send(&self, feed_key: &str, payload: FeedPayload) -> Result<(), DeliveryError> {
        if !self.controls.wifi_available() {
            return Err(DeliveryError::LinkDown);
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(Self::transport)?;

        match payload {
            FeedPayload::Jpeg(bytes) => {
                let path = self.write_jpeg(feed_key, &bytes).await?;
                info!("Delivered {} bytes to feed '{}' ({})", bytes.len(), feed_key, path.display());
            }
            FeedPayload::Value(value) => {
                self.append_value(feed_key, value).await?;
                debug!("Feed '{}' <- {}", feed_key, value);
            }
        }
        Ok(())
    }
}
