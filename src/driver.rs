// src/driver.rs - Frame loop: extract, apply control input, count, report
use crate::extractor::KeypointExtractor;
use crate::pose::Frame;
use crate::session::{ExerciseMode, FrameOutcome, WorkoutCount, WorkoutSession};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

const METRICS_WINDOW: usize = 30;
const COMMAND_QUEUE: usize = 32;
const REPORT_QUEUE: usize = 64;

/// Control input from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectMode(ExerciseMode),
    Reset,
    /// Model or camera settings changed; frames already in flight are stale.
    Reload,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    Processed(FrameOutcome),
    /// Inference started before a reload; the result was dropped unseen.
    Stale,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub tracking_confidence: f32,
    frame_times: VecDeque<f32>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            tracking_confidence: 0.0,
            frame_times: VecDeque::with_capacity(METRICS_WINDOW),
        }
    }

    pub fn record(&mut self, elapsed: Duration, confidence: f32) {
        self.frame_times.push_front(elapsed.as_secs_f32());
        if self.frame_times.len() > METRICS_WINDOW {
            self.frame_times.pop_back();
        }

        self.avg_processing_time =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
        self.tracking_confidence = confidence;
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the presentation layer needs to show for one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    pub timestamp: f64,
    pub mode: ExerciseMode,
    pub status: FrameStatus,
    pub counts: Vec<WorkoutCount>,
    pub metrics: PerformanceMetrics,
}

impl FrameReport {
    pub fn outcome(&self) -> Option<&FrameOutcome> {
        match &self.status {
            FrameStatus::Processed(outcome) => Some(outcome),
            FrameStatus::Stale => None,
        }
    }
}

/// Sending half handed to whoever drives mode changes and resets.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .context("Frame driver has stopped")
    }

    pub fn try_send(&self, command: Command) -> Result<()> {
        self.commands
            .try_send(command)
            .map_err(|e| anyhow::anyhow!("Cannot queue {:?}: {}", command, e))
    }
}

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// Runs one extract -> count -> report cycle at a time.
///
/// Commands are only applied between the extractor returning and the counter
/// update, so a reset or mode switch never lands in the middle of a buffer
/// mutation. A reload bumps the configuration generation; a frame whose
/// extraction began under an older generation is reported as stale and never
/// reaches the counter.
pub struct FrameDriver<E> {
    extractor: E,
    session: WorkoutSession,
    commands: mpsc::Receiver<Command>,
    reports: mpsc::Sender<FrameReport>,
    generation: u64,
    metrics: PerformanceMetrics,
    consecutive_skips: u32,
}

impl<E: KeypointExtractor> FrameDriver<E> {
    pub fn new(
        extractor: E,
        session: WorkoutSession,
    ) -> (Self, DriverHandle, mpsc::Receiver<FrameReport>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (report_tx, report_rx) = mpsc::channel(REPORT_QUEUE);

        let driver = Self {
            extractor,
            session,
            commands: command_rx,
            reports: report_tx,
            generation: 0,
            metrics: PerformanceMetrics::new(),
            consecutive_skips: 0,
        };

        (driver, DriverHandle { commands: command_tx }, report_rx)
    }

    /// Processes frames until the extractor runs dry or a shutdown arrives,
    /// then hands back the session for export.
    pub async fn run(mut self) -> Result<WorkoutSession> {
        info!("Frame loop started in {} mode", self.session.mode());

        loop {
            if self.apply_pending_commands().await? == Flow::Stop {
                break;
            }

            let generation = self.generation;
            let started = Instant::now();

            let Some(frame) = self.extractor.extract().await.context("Keypoint extraction failed")? else {
                info!("Keypoint stream ended");
                break;
            };

            if self.apply_pending_commands().await? == Flow::Stop {
                break;
            }

            let status = if generation != self.generation {
                debug!("Discarding frame {} from superseded configuration", frame.index);
                FrameStatus::Stale
            } else {
                let outcome = self.session.process_frame(&frame);
                self.note_skips(&frame, &outcome);
                FrameStatus::Processed(outcome)
            };

            let confidence = frame.primary_pose().map(|p| p.mean_confidence()).unwrap_or(0.0);
            self.metrics.record(started.elapsed(), confidence);

            let report = FrameReport {
                frame_index: frame.index,
                timestamp: frame.timestamp,
                mode: self.session.mode(),
                status,
                counts: self.session.workout_counts(),
                metrics: self.metrics.clone(),
            };

            if self.reports.send(report).await.is_err() {
                debug!("Report receiver dropped; continuing without reports");
            }
        }

        info!("Frame loop stopped");
        Ok(self.session)
    }

    async fn apply_pending_commands(&mut self) -> Result<Flow> {
        loop {
            match self.commands.try_recv() {
                Ok(Command::SelectMode(mode)) => self.session.select_mode(mode),
                Ok(Command::Reset) => self.session.reset(),
                Ok(Command::Reload) => {
                    self.generation += 1;
                    info!("Reloading extractor (generation {})", self.generation);
                    self.extractor.reload().await.context("Extractor reload failed")?;
                }
                Ok(Command::Shutdown) => return Ok(Flow::Stop),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(Flow::Continue),
            }
        }
    }

    fn note_skips(&mut self, frame: &Frame, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Skipped(e) => {
                if self.consecutive_skips % METRICS_WINDOW as u32 == 0 {
                    warn!("Frame {} skipped: {}", frame.index, e);
                }
                self.consecutive_skips += 1;
            }
            _ => {
                if self.consecutive_skips > 1 {
                    debug!("Tracking recovered after {} skipped frames", self.consecutive_skips);
                }
                self.consecutive_skips = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Feedback;
    use crate::pose::Pose;
    use crate::tracking::test_poses::lateral_raise;
    use crate::tracking::Exercise;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves canned frames; optionally queues a command while "inferring"
    /// a given frame, the way a UI event lands during a model call.
    struct ScriptedExtractor {
        frames: VecDeque<Frame>,
        served: usize,
        inject: Option<(usize, Command, DriverHandle)>,
        reloads: Arc<AtomicUsize>,
    }

    impl ScriptedExtractor {
        fn new(poses: Vec<Pose>) -> Self {
            let frames = poses
                .into_iter()
                .enumerate()
                .map(|(i, pose)| Frame {
                    index: i as u64,
                    timestamp: i as f64 / 30.0,
                    width: 0,
                    poses: vec![pose],
                })
                .collect();
            Self {
                frames,
                served: 0,
                inject: None,
                reloads: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl KeypointExtractor for ScriptedExtractor {
        async fn extract(&mut self) -> Result<Option<Frame>> {
            if let Some((at, command, handle)) = &self.inject {
                if *at == self.served {
                    handle.try_send(*command)?;
                }
            }
            self.served += 1;
            tokio::task::yield_now().await;
            Ok(self.frames.pop_front())
        }

        async fn reload(&mut self) -> Result<()> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn raise_then_drop() -> Vec<Pose> {
        let mut poses = vec![lateral_raise(150.0, 150.0); 10];
        poses.push(lateral_raise(90.0, 90.0));
        poses
    }

    fn lateral_session() -> WorkoutSession {
        let mut session = WorkoutSession::default();
        session.select_mode(ExerciseMode::LateralRaise);
        session
    }

    async fn collect(mut reports: mpsc::Receiver<FrameReport>) -> Vec<FrameReport> {
        let mut out = Vec::new();
        while let Some(report) = reports.recv().await {
            out.push(report);
        }
        out
    }

    #[tokio::test]
    async fn counts_a_rep_and_reports_every_frame() {
        let extractor = ScriptedExtractor::new(raise_then_drop());
        let (driver, _handle, reports) = FrameDriver::new(extractor, lateral_session());

        let collector = tokio::spawn(collect(reports));
        let session = driver.run().await.unwrap();
        let reports = collector.await.unwrap();

        assert_eq!(session.rep_count(Exercise::LateralRaise), 1);
        assert_eq!(reports.len(), 11);
        let last = reports.last().unwrap();
        assert_eq!(last.counts[0].count, 1);
        let feedback = last.outcome().and_then(|o| o.update()).and_then(|u| u.feedback);
        assert_eq!(feedback, Some(Feedback::RaiseBothArms));
    }

    #[tokio::test]
    async fn reset_during_inference_applies_before_the_update() {
        let placeholder = ScriptedExtractor::new(Vec::new());
        let (mut driver, handle, reports) = FrameDriver::new(placeholder, lateral_session());
        let mut extractor = ScriptedExtractor::new(raise_then_drop());
        extractor.inject = Some((10, Command::Reset, handle.clone()));
        driver.extractor = extractor;

        let collector = tokio::spawn(collect(reports));
        let session = driver.run().await.unwrap();
        drop(handle);
        let reports = collector.await.unwrap();

        // the drop frame met an empty history, so nothing was counted
        let last = reports.last().unwrap().outcome().and_then(|o| o.update()).cloned().unwrap();
        assert_eq!(last.flushed, 0);
        assert!(!last.counted);
        assert_eq!(session.rep_count(Exercise::LateralRaise), 0);
        assert!(session.history(Exercise::LateralRaise).is_empty());
    }

    #[tokio::test]
    async fn reload_discards_the_in_flight_frame() {
        let placeholder = ScriptedExtractor::new(Vec::new());
        let (mut driver, handle, reports) = FrameDriver::new(placeholder, lateral_session());
        let mut extractor = ScriptedExtractor::new(vec![lateral_raise(150.0, 150.0); 4]);
        extractor.inject = Some((2, Command::Reload, handle.clone()));
        let reloads = extractor.reloads.clone();
        driver.extractor = extractor;

        let collector = tokio::spawn(collect(reports));
        let session = driver.run().await.unwrap();
        drop(handle);
        let reports = collector.await.unwrap();

        assert_eq!(reloads.load(Ordering::SeqCst), 1);
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[2].status, FrameStatus::Stale);
        assert!(reports[3].outcome().is_some());
        assert_eq!(session.history(Exercise::LateralRaise).len(), 3);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let extractor = ScriptedExtractor::new(raise_then_drop());
        let (driver, handle, reports) = FrameDriver::new(extractor, lateral_session());
        handle.send(Command::SelectMode(ExerciseMode::Squat)).await.unwrap();
        handle.send(Command::Shutdown).await.unwrap();

        let collector = tokio::spawn(collect(reports));
        let session = driver.run().await.unwrap();
        let reports = collector.await.unwrap();

        assert!(reports.is_empty());
        assert_eq!(session.mode(), ExerciseMode::Squat);
    }

    #[test]
    fn metrics_average_over_window() {
        let mut metrics = PerformanceMetrics::new();
        for _ in 0..40 {
            metrics.record(Duration::from_millis(20), 0.8);
        }
        assert!((metrics.avg_processing_time - 0.02).abs() < 1e-4);
        assert!((metrics.avg_fps - 50.0).abs() < 0.5);
        assert_eq!(metrics.frame_times.len(), METRICS_WINDOW);
    }
}
