use crate::capture::{CaptureDeliveryPipeline, CaptureOutcome};
use crate::hardware::{ExposureSettings, Sensor};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Active timelapse: exists only while armed
#[derive(Debug, Clone, PartialEq)]
pub struct TimelapseSchedule {
    pub interval: Duration,
    pub next_deadline: Instant,
    pub locked_exposure: Option<ExposureSettings>,
}

/// Decides when unattended captures are due and holds exposure steady meanwhile
pub struct TimelapseScheduler {
    sensor: Arc<dyn Sensor>,
    settle_margin: Duration,
    schedule: Option<TimelapseSchedule>,
}

impl TimelapseScheduler {
    pub fn new(sensor: Arc<dyn Sensor>, settle_margin: Duration) -> Self {
        Self {
            sensor,
            settle_margin,
            schedule: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn schedule(&self) -> Option<&TimelapseSchedule> {
        self.schedule.as_ref()
    }

    /// Time left until the next capture, zero once overdue
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.schedule
            .as_ref()
            .map(|s| s.next_deadline.saturating_duration_since(now))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.schedule
            .as_ref()
            .map_or(false, |s| now >= s.next_deadline)
    }

    /// Freeze the automatic exposure controller and schedule the first capture
    pub async fn arm(&mut self, interval: Duration, now: Instant) {
        if self.schedule.is_some() {
            self.disarm().await;
        }

        let locked_exposure = match self.sensor.auto_settings().await {
            Ok(settings) => {
                self.sensor.lock_exposure(&settings).await;
                Some(settings)
            }
            Err(e) => {
                warn!("Could not read auto exposure, timelapse runs unlocked: {}", e);
                None
            }
        };

        info!(
            "Timelapse armed every {:?} (exposure lock: {:?})",
            interval, locked_exposure
        );
        self.schedule = Some(TimelapseSchedule {
            interval,
            next_deadline: now + interval,
            locked_exposure,
        });
    }

    /// Change the interval of an armed timelapse. The pending deadline is
    /// kept; the next reschedule uses the new interval.
    pub fn set_interval(&mut self, interval: Duration) {
        if let Some(schedule) = self.schedule.as_mut() {
            if schedule.interval != interval {
                info!("Timelapse interval {:?} -> {:?}", schedule.interval, interval);
                schedule.interval = interval;
            }
        }
    }

    pub async fn disarm(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            info!("Timelapse disarmed");
            if schedule.locked_exposure.is_some() {
                self.sensor.restore_auto_exposure().await;
            }
        }
    }

    /// Fire the capture when due. Missed deadlines collapse into a single
    /// capture; the next one is measured from `now`, whatever the outcome.
    pub async fn tick(
        &mut self,
        now: Instant,
        pipeline: &CaptureDeliveryPipeline,
    ) -> Option<CaptureOutcome> {
        if !self.is_due(now) {
            return None;
        }

        let outcome = pipeline.capture_and_deliver().await;

        if let Some(schedule) = self.schedule.as_mut() {
            schedule.next_deadline = now + schedule.interval + self.settle_margin;
            info!(
                "Timelapse capture {:?}, next in {:?}",
                outcome,
                schedule.interval + self.settle_margin
            );
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestRig, MOCK_EXPOSURE};

    fn scheduler(rig: &TestRig) -> TimelapseScheduler {
        TimelapseScheduler::new(rig.sensor.clone(), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_sets_deadline_and_locks_exposure() {
        let rig = TestRig::new();
        let mut scheduler = scheduler(&rig);
        let t = Instant::now();

        scheduler.arm(Duration::from_secs(30), t).await;

        let schedule = scheduler.schedule().unwrap();
        assert_eq!(schedule.next_deadline, t + Duration::from_secs(30));
        assert_eq!(schedule.locked_exposure, Some(MOCK_EXPOSURE));
        assert_eq!(rig.sensor.locked(), Some(MOCK_EXPOSURE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_restores_auto_exposure() {
        let rig = TestRig::new();
        let mut scheduler = scheduler(&rig);
        scheduler.arm(Duration::from_secs(5), Instant::now()).await;

        scheduler.disarm().await;
        assert!(!scheduler.is_armed());
        assert_eq!(rig.sensor.locked(), None);
        assert_eq!(rig.sensor.restore_calls(), 1);

        // disarming twice is a no-op
        scheduler.disarm().await;
        assert_eq!(rig.sensor.restore_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_fires_once_and_reschedules_with_margin() {
        let rig = TestRig::new();
        let mut scheduler = scheduler(&rig);
        let t = Instant::now();
        let interval = Duration::from_secs(10);
        scheduler.arm(interval, t).await;

        assert!(scheduler.tick(t + Duration::from_secs(9), &rig.pipeline).await.is_none());

        let fire = t + interval;
        assert_eq!(
            scheduler.tick(fire, &rig.pipeline).await,
            Some(CaptureOutcome::Delivered)
        );
        assert_eq!(
            scheduler.schedule().unwrap().next_deadline,
            fire + interval + Duration::from_secs(1)
        );
        assert!(scheduler.tick(fire, &rig.pipeline).await.is_none());
        assert_eq!(rig.pipeline.stats().captures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_independent_of_delivery_duration() {
        let rig = TestRig::new();
        rig.feed.fail_camera_sends(100);
        let mut scheduler = scheduler(&rig);
        let t = Instant::now();
        let interval = Duration::from_secs(5);
        scheduler.arm(interval, t).await;

        let fire = t + interval;
        let outcome = scheduler.tick(fire, &rig.pipeline).await;
        assert_eq!(outcome, Some(CaptureOutcome::CaptureFailed));
        assert_eq!(
            scheduler.schedule().unwrap().next_deadline,
            fire + interval + Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_deadline_never_backfills() {
        let rig = TestRig::new();
        let mut scheduler = scheduler(&rig);
        let t = Instant::now();
        let interval = Duration::from_secs(10);
        scheduler.arm(interval, t).await;

        // device was busy 40 units past the deadline
        let late = t + interval + Duration::from_secs(40);
        assert!(scheduler.tick(late, &rig.pipeline).await.is_some());
        assert!(scheduler.tick(late, &rig.pipeline).await.is_none());
        assert!(scheduler
            .tick(late + Duration::from_secs(10), &rig.pipeline)
            .await
            .is_none());

        assert_eq!(rig.pipeline.stats().captures, 1);
        assert_eq!(
            scheduler.schedule().unwrap().next_deadline,
            late + Duration::from_secs(11)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_only_affects_armed_schedule() {
        let rig = TestRig::new();
        let mut scheduler = scheduler(&rig);
        let t = Instant::now();

        scheduler.set_interval(Duration::from_secs(60));
        assert!(!scheduler.is_armed());

        scheduler.arm(Duration::from_secs(10), t).await;
        scheduler.set_interval(Duration::from_secs(30));
        let schedule = scheduler.schedule().unwrap();
        assert_eq!(schedule.interval, Duration::from_secs(30));
        assert_eq!(schedule.next_deadline, t + Duration::from_secs(10));

        let fire = t + Duration::from_secs(10);
        scheduler.tick(fire, &rig.pipeline).await;
        assert_eq!(
            scheduler.schedule().unwrap().next_deadline,
            fire + Duration::from_secs(31)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let rig = TestRig::new();
        let mut scheduler = scheduler(&rig);
        let t = Instant::now();
        assert_eq!(scheduler.remaining(t), None);

        scheduler.arm(Duration::from_secs(20), t).await;
        assert_eq!(
            scheduler.remaining(t + Duration::from_secs(5)),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            scheduler.remaining(t + Duration::from_secs(25)),
            Some(Duration::ZERO)
        );
    }
}
