// src/session.rs
use crate::error::TrackingError;
use crate::pose::{Frame, Pose};
use crate::tracking::{AngleHistory, Exercise, FrameUpdate, TrackerConfig};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ExerciseMode {
    #[default]
    None,
    LateralRaise,
    Squat,
}

impl ExerciseMode {
    pub fn exercise(self) -> Option<Exercise> {
        match self {
            ExerciseMode::None => None,
            ExerciseMode::LateralRaise => Some(Exercise::LateralRaise),
            ExerciseMode::Squat => Some(Exercise::Squat),
        }
    }
}

impl From<Exercise> for ExerciseMode {
    fn from(exercise: Exercise) -> Self {
        match exercise {
            Exercise::LateralRaise => ExerciseMode::LateralRaise,
            Exercise::Squat => ExerciseMode::Squat,
        }
    }
}

impl FromStr for ExerciseMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ExerciseMode::None),
            "sidelift" | "lateral-raise" | "lateral_raise" => Ok(ExerciseMode::LateralRaise),
            "squat" => Ok(ExerciseMode::Squat),
            other => Err(anyhow::anyhow!(
                "Unknown exercise '{}', expected none, lateral-raise or squat",
                other
            )),
        }
    }
}

impl fmt::Display for ExerciseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exercise() {
            Some(exercise) => write!(f, "{}", exercise),
            None => f.write_str("None"),
        }
    }
}

/// Result of routing one frame through the session.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No exercise selected; nothing was looked at.
    Idle,
    /// The frame contributed nothing; history is unchanged.
    Skipped(TrackingError),
    Updated(FrameUpdate),
}

impl FrameOutcome {
    pub fn update(&self) -> Option<&FrameUpdate> {
        match self {
            FrameOutcome::Updated(update) => Some(update),
            _ => None,
        }
    }
}

/// One row of the on-screen count table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutCount {
    pub workout_type: &'static str,
    pub count: u32,
}

/// Session context: selected mode plus one history per exercise.
///
/// Both histories live for the whole session so switching modes keeps each
/// exercise's count. Only `reset` clears them.
#[derive(Debug, Clone)]
pub struct WorkoutSession {
    mode: ExerciseMode,
    config: TrackerConfig,
    flip_horizontal: bool,
    lateral_raise: AngleHistory,
    squat: AngleHistory,
}

impl WorkoutSession {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            mode: ExerciseMode::None,
            config,
            flip_horizontal: false,
            lateral_raise: AngleHistory::new(),
            squat: AngleHistory::new(),
        }
    }

    /// Mirror poses about the frame width before counting, matching a
    /// mirrored webcam preview.
    pub fn with_flip_horizontal(mut self, flip: bool) -> Self {
        self.flip_horizontal = flip;
        self
    }

    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn select_mode(&mut self, mode: ExerciseMode) {
        if mode != self.mode {
            info!("Exercise mode: {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn reset(&mut self) {
        self.lateral_raise.reset();
        self.squat.reset();
        info!("Workout counts reset");
    }

    pub fn history(&self, exercise: Exercise) -> &AngleHistory {
        match exercise {
            Exercise::LateralRaise => &self.lateral_raise,
            Exercise::Squat => &self.squat,
        }
    }

    pub fn rep_count(&self, exercise: Exercise) -> u32 {
        self.history(exercise).rep_count()
    }

    pub fn workout_counts(&self) -> Vec<WorkoutCount> {
        Exercise::ALL
            .iter()
            .map(|&exercise| WorkoutCount {
                workout_type: exercise.display_name(),
                count: self.rep_count(exercise),
            })
            .collect()
    }

    /// Routes one pose to the selected exercise.
    pub fn process_pose(&mut self, pose: &Pose) -> FrameOutcome {
        let Some(exercise) = self.mode.exercise() else {
            return FrameOutcome::Idle;
        };

        let history = match exercise {
            Exercise::LateralRaise => &mut self.lateral_raise,
            Exercise::Squat => &mut self.squat,
        };
        match exercise.update(pose, history, &self.config) {
            Ok(update) => FrameOutcome::Updated(update),
            Err(e) => {
                debug!("Frame skipped for {}: {}", exercise, e);
                FrameOutcome::Skipped(e)
            }
        }
    }

    /// Picks the frame's primary pose and routes it.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        if self.mode == ExerciseMode::None {
            return FrameOutcome::Idle;
        }

        let Some(pose) = frame.primary_pose() else {
            debug!("Frame {} has no keypoints", frame.index);
            return FrameOutcome::Skipped(TrackingError::MissingModelOutput);
        };

        if self.flip_horizontal && frame.width > 0 {
            let mut mirrored = pose.clone();
            mirrored.flip_horizontal(frame.width);
            self.process_pose(&mirrored)
        } else {
            self.process_pose(pose)
        }
    }
}

impl Default for WorkoutSession {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
