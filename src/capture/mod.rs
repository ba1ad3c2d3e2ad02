mod pipeline;
mod stats;

pub use pipeline::{CaptureDeliveryPipeline, CaptureOutcome, UploadAttempt};
pub use stats::CaptureStats;
