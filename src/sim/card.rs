use super::SimControls;
use crate::frame::Frame;
use crate::hardware::{CardSlot, FileKind, MediaSink};
use async_trait::async_trait;
use image::codecs::gif::GifEncoder;
use image::{Delay, DynamicImage, RgbImage, RgbaImage};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::task;
use tracing::{debug, info};

/// Highest sequence number tried before the card counts as full
const MAX_SEQUENCE: u32 = 9999;

fn io_other<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::Other, e)
}

/// SD card emulated by a directory; presence follows the keyboard switch
pub struct DirectoryCard {
    root: PathBuf,
    controls: Arc<SimControls>,
    mounted: AtomicBool,
}

impl DirectoryCard {
    pub fn new(root: impl AsRef<Path>, controls: Arc<SimControls>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            controls,
            mounted: AtomicBool::new(false),
        }
    }

    fn ensure_ready(&self) -> io::Result<()> {
        if !self.controls.card_present() || !self.mounted.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "card not mounted"));
        }
        Ok(())
    }

    /// First free `imgNNNN.<ext>` name
    async fn next_path(&self, kind: FileKind) -> io::Result<PathBuf> {
        for seq in 0..=MAX_SEQUENCE {
            let path = self.root.join(format!("img{:04}.{}", seq, kind.extension()));
            if fs::metadata(&path).await.is_err() {
                return Ok(path);
            }
        }
        Err(io_other("no free sequence numbers left on card"))
    }
}

#[async_trait]
impl CardSlot for DirectoryCard {
    async fn is_present(&self) -> bool {
        self.controls.card_present()
    }

    async fn mount(&self) -> io::Result<()> {
        if !self.controls.card_present() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no card in slot"));
        }
        fs::create_dir_all(&self.root).await?;
        self.mounted.store(true, Ordering::SeqCst);
        info!("Card mounted at {}", self.root.display());
        Ok(())
    }

    async fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    async fn open_sequential_file(&self, kind: FileKind) -> io::Result<Box<dyn MediaSink>> {
        self.ensure_ready()?;
        let path = self.next_path(kind).await?;
        let file = fs::File::create(&path).await?.into_std().await;
        debug!("Opened {}", path.display());
        Ok(Box::new(GifFileSink {
            path,
            encoder: Some(GifEncoder::new(file)),
            controls: Arc::clone(&self.controls),
        }))
    }

    async fn save_sequential(&self, kind: FileKind, bytes: &[u8]) -> io::Result<PathBuf> {
        self.ensure_ready()?;
        let path = self.next_path(kind).await?;
        fs::write(&path, bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Animated GIF written frame by frame; encoding runs on the blocking pool
pub struct GifFileSink {
    path: PathBuf,
    encoder: Option<GifEncoder<std::fs::File>>,
    controls: Arc<SimControls>,
}

fn to_rgba(frame: &Frame) -> io::Result<RgbaImage> {
    let rgb = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb8())
        .ok_or_else(|| io_other(format!("frame {} has a short pixel buffer", frame.id)))?;
    Ok(DynamicImage::ImageRgb8(rgb).to_rgba8())
}

#[async_trait]
impl MediaSink for GifFileSink {
    async fn append(&mut self, frame: &Frame, delay: Duration) -> io::Result<()> {
        if !self.controls.card_present() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "card removed"));
        }

        let mut encoder = self
            .encoder
            .take()
            .ok_or_else(|| io_other("sink already closed"))?;
        let rgba = to_rgba(frame)?;

        let (encoder, result) = task::spawn_blocking(move || {
            let gif_frame = image::Frame::from_parts(rgba, 0, 0, Delay::from_saturating_duration(delay));
            let result = encoder.encode_frame(gif_frame);
            (encoder, result)
        })
        .await
        .map_err(io_other)?;

        self.encoder = Some(encoder);
        result.map_err(io_other)
    }

    async fn finish(self: Box<Self>) -> io::Result<u64> {
        let GifFileSink { path, encoder, .. } = *self;
        // dropping the encoder writes the trailer
        if let Some(encoder) = encoder {
            task::spawn_blocking(move || drop(encoder))
                .await
                .map_err(io_other)?;
        }
        let size = fs::metadata(&path).await?.len();
        debug!("Closed {} ({} bytes)", path.display(), size);
        Ok(size)
    }
}
