// src/lib.rs
//! Counts exercise repetitions from per-frame body keypoints and produces
//! coaching feedback for each counted rep.

pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod feedback;
pub mod geometry;
pub mod pose;
pub mod session;
pub mod tracking;

pub use config::AppSettings;
pub use driver::{Command, DriverHandle, FrameDriver, FrameReport, FrameStatus, PerformanceMetrics};
pub use error::TrackingError;
pub use extractor::{KeypointExtractor, RecordedExtractor};
pub use feedback::{AudioCue, Feedback, Side};
pub use geometry::angle_between;
pub use pose::{BodyPart, Frame, Keypoint, Pose, Position};
pub use session::{ExerciseMode, FrameOutcome, WorkoutCount, WorkoutSession};
pub use tracking::{AngleHistory, Exercise, FrameUpdate, Phase, TrackerConfig};
