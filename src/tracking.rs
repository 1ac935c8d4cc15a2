// src/tracking.rs - Repetition counting from joint-angle history
use crate::error::TrackingError;
use crate::feedback::{Feedback, Side};
use crate::geometry::angle_between;
use crate::pose::{BodyPart, Pose};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Both arm angles must exceed this for a frame to count as "arms raised".
    pub raise_threshold: f64,
    /// Smoothed peak arm angle needed for a well-done raise.
    pub full_extension: f64,
    /// Either knee angle below this counts as "squatting".
    pub squat_threshold: f64,
    /// Knee angle below which the facing-side heuristic is sampled.
    pub perspective_threshold: f64,
    /// Smoothed lowest knee angle needed for a well-done squat.
    pub deep_enough: f64,
    /// An episode is counted only when it holds more samples than this.
    pub min_episode_frames: usize,
    pub min_keypoint_confidence: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            raise_threshold: 120.0,
            full_extension: 165.0,
            squat_threshold: 60.0,
            perspective_threshold: 30.0,
            deep_enough: 15.0,
            min_episode_frames: 8,
            min_keypoint_confidence: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exercise {
    LateralRaise,
    Squat,
}

impl Exercise {
    pub const ALL: [Exercise; 2] = [Exercise::LateralRaise, Exercise::Squat];

    pub fn display_name(self) -> &'static str {
        match self {
            Exercise::LateralRaise => "Side Lateral Raise",
            Exercise::Squat => "Squat",
        }
    }

    /// Feeds one frame's pose into this exercise's history.
    ///
    /// Every failure is detected before `history` is touched, so an `Err`
    /// leaves buffers, bias and count exactly as they were.
    pub fn update(
        self,
        pose: &Pose,
        history: &mut AngleHistory,
        config: &TrackerConfig,
    ) -> Result<FrameUpdate, TrackingError> {
        if pose.is_empty() {
            return Err(TrackingError::MissingModelOutput);
        }
        match self {
            Exercise::LateralRaise => update_lateral_raise(pose, history, config),
            Exercise::Squat => update_squat(pose, history, config),
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Paired left/right angle buffers plus the counters of one exercise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngleHistory {
    left: Vec<f64>,
    right: Vec<f64>,
    rep_count: u32,
    perspective_bias: i32,
}

impl AngleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn left(&self) -> &[f64] {
        &self.left
    }

    pub fn right(&self) -> &[f64] {
        &self.right
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn perspective_bias(&self) -> i32 {
        self.perspective_bias
    }

    pub fn push(&mut self, left: f64, right: f64) {
        self.left.push(left);
        self.right.push(right);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Ends the current episode. Buffers are always emptied; when the episode
    /// was long enough the count goes up by one and the smoothed series are
    /// returned.
    fn close_episode(&mut self, min_episode_frames: usize) -> Option<(Vec<f64>, Vec<f64>)> {
        let mut left = std::mem::take(&mut self.left);
        let mut right = std::mem::take(&mut self.right);

        if left.len() <= min_episode_frames {
            return None;
        }

        smooth_in_place(&mut left);
        smooth_in_place(&mut right);
        self.rep_count += 1;
        Some((left, right))
    }
}

/// Replaces each sample with the mean of the 3-sample window starting at it
/// (centered on the following sample). The last two samples have no full
/// window and are dropped.
fn smooth_in_place(samples: &mut Vec<f64>) {
    let smoothed_len = samples.len().saturating_sub(2);
    for i in 0..smoothed_len {
        samples[i] = (samples[i] + samples[i + 1] + samples[i + 2]) / 3.0;
    }
    samples.truncate(smoothed_len);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Extreme posture held; samples are accumulating.
    Holding,
    /// Out of the extreme posture; buffers are empty.
    Resting,
}

/// What one frame did to an exercise's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameUpdate {
    pub exercise: Exercise,
    pub left_angle: f64,
    pub right_angle: f64,
    pub phase: Phase,
    /// Samples cleared by this frame, counted or not.
    pub flushed: usize,
    pub counted: bool,
    pub rep_count: u32,
    pub feedback: Option<Feedback>,
}

impl FrameUpdate {
    fn new(exercise: Exercise, left_angle: f64, right_angle: f64) -> Self {
        Self {
            exercise,
            left_angle,
            right_angle,
            phase: Phase::Resting,
            flushed: 0,
            counted: false,
            rep_count: 0,
            feedback: None,
        }
    }
}

fn update_lateral_raise(
    pose: &Pose,
    history: &mut AngleHistory,
    config: &TrackerConfig,
) -> Result<FrameUpdate, TrackingError> {
    let min_conf = config.min_keypoint_confidence;
    let left_shoulder = pose.require(BodyPart::LeftShoulder, min_conf)?.point();
    let right_shoulder = pose.require(BodyPart::RightShoulder, min_conf)?.point();
    let left_elbow = pose.require(BodyPart::LeftElbow, min_conf)?.point();
    let right_elbow = pose.require(BodyPart::RightElbow, min_conf)?.point();

    // Both angles are measured against the shoulder line.
    let left_angle = angle_between(left_elbow, left_shoulder, right_shoulder)?;
    let right_angle = angle_between(left_shoulder, right_shoulder, right_elbow)?;

    let mut update = FrameUpdate::new(Exercise::LateralRaise, left_angle, right_angle);

    if left_angle > config.raise_threshold && right_angle > config.raise_threshold {
        history.push(left_angle, right_angle);
        update.phase = Phase::Holding;
    } else {
        update.flushed = history.len();
        let mut max_left = -1.0_f64;
        let mut max_right = -1.0_f64;

        if let Some((left, right)) = history.close_episode(config.min_episode_frames) {
            max_left = left.iter().copied().fold(max_left, f64::max);
            max_right = right.iter().copied().fold(max_right, f64::max);
            update.counted = true;
            info!(
                "Lateral raise #{} counted (peak left {:.1}, right {:.1})",
                history.rep_count(),
                max_left,
                max_right
            );
        } else if update.flushed > 0 {
            debug!("Lateral raise episode of {} frames too short, discarded", update.flushed);
        }

        if max_left > 0.0 && max_right > 0.0 {
            update.feedback = Some(classify_raise(max_left, max_right, config.full_extension));
        }
    }

    update.rep_count = history.rep_count();
    Ok(update)
}

fn update_squat(
    pose: &Pose,
    history: &mut AngleHistory,
    config: &TrackerConfig,
) -> Result<FrameUpdate, TrackingError> {
    let min_conf = config.min_keypoint_confidence;
    let left_hip = pose.require(BodyPart::LeftHip, min_conf)?;
    let right_hip = pose.require(BodyPart::RightHip, min_conf)?;
    let left_knee = pose.require(BodyPart::LeftKnee, min_conf)?;
    let right_knee = pose.require(BodyPart::RightKnee, min_conf)?;

    // Thigh elevation: the second ray runs from the knee horizontally to
    // the point level with the knee under the hip.
    let left_angle = angle_between(
        left_hip.point(),
        left_knee.point(),
        Point2::new(left_hip.x, left_knee.y),
    )?;
    let right_angle = angle_between(
        right_hip.point(),
        right_knee.point(),
        Point2::new(right_hip.x, right_knee.y),
    )?;

    let mut update = FrameUpdate::new(Exercise::Squat, left_angle, right_angle);

    if left_angle < config.perspective_threshold || right_angle < config.perspective_threshold {
        if left_knee.x > left_hip.x {
            history.perspective_bias += 1;
        } else if right_knee.x < right_hip.x {
            history.perspective_bias -= 1;
        }
    }

    let mut now_perspective = 0;
    let mut min_left = 180.0_f64;
    let mut min_right = 180.0_f64;

    if left_angle < config.squat_threshold || right_angle < config.squat_threshold {
        history.push(left_angle, right_angle);
        update.phase = Phase::Holding;
    } else {
        update.flushed = history.len();
        let bias = history.perspective_bias;

        if let Some((left, right)) = history.close_episode(config.min_episode_frames) {
            min_left = left.iter().copied().fold(min_left, f64::min);
            min_right = right.iter().copied().fold(min_right, f64::min);
            now_perspective = bias;
            update.counted = true;
            info!(
                "Squat #{} counted (lowest left {:.1}, right {:.1}, perspective {})",
                history.rep_count(),
                min_left,
                min_right,
                bias
            );
        } else if update.flushed > 0 {
            debug!("Squat episode of {} frames too short, discarded", update.flushed);
        }
        history.perspective_bias = 0;
    }

    if min_left < 180.0 || min_right < 180.0 {
        update.feedback = Some(classify_squat(now_perspective, min_left, min_right, config.deep_enough));
    }

    update.rep_count = history.rep_count();
    Ok(update)
}

/// Classifies a finished raise from the smoothed peak angle of each arm.
pub fn classify_raise(max_left: f64, max_right: f64, full_extension: f64) -> Feedback {
    match (max_left < full_extension, max_right < full_extension) {
        (true, true) => Feedback::RaiseBothArms,
        (true, false) => Feedback::RaiseLeftArm,
        (false, true) => Feedback::RaiseRightArm,
        (false, false) => Feedback::WellDone,
    }
}

/// Classifies a finished squat using only the leg facing the camera.
pub fn classify_squat(perspective: i32, min_left: f64, min_right: f64, deep_enough: f64) -> Feedback {
    let (side, lowest) = if perspective > 0 {
        (Side::Left, min_left)
    } else {
        (Side::Right, min_right)
    };

    if lowest < deep_enough {
        Feedback::SquatWellDone(side)
    } else {
        Feedback::SquatDeeper(side)
    }
}

#[cfg(test)]
pub(crate) mod test_poses {
    use crate::pose::{BodyPart, Keypoint, Pose};

    const ARM: f64 = 80.0;
    const THIGH: f64 = 100.0;

    /// Shoulders level at y = 200; each elbow placed so the angle measured
    /// against the shoulder line equals the requested value.
    pub fn lateral_raise(left_deg: f64, right_deg: f64) -> Pose {
        let (lsx, lsy) = (200.0, 200.0);
        let (rsx, rsy) = (320.0, 200.0);
        let l = left_deg.to_radians();
        let r = right_deg.to_radians();
        Pose::new(vec![
            Keypoint::new(BodyPart::LeftShoulder, lsx, lsy, 0.9),
            Keypoint::new(BodyPart::RightShoulder, rsx, rsy, 0.9),
            Keypoint::new(BodyPart::LeftElbow, lsx + ARM * l.cos(), lsy - ARM * l.sin(), 0.9),
            Keypoint::new(BodyPart::RightElbow, rsx - ARM * r.cos(), rsy - ARM * r.sin(), 0.9),
        ])
    }

    /// Knees at y = 400 with hips above them. `left_knee_out` puts the left
    /// knee outside its hip, which tips the facing-side heuristic to the left;
    /// otherwise the right knee sits inside its hip.
    pub fn squat(left_deg: f64, right_deg: f64, left_knee_out: bool) -> Pose {
        let (lkx, lky) = (220.0, 400.0);
        let (rkx, rky) = (360.0, 400.0);
        let l = left_deg.to_radians();
        let r = right_deg.to_radians();
        let left_dx = if left_knee_out { -THIGH * l.cos() } else { THIGH * l.cos() };
        Pose::new(vec![
            Keypoint::new(BodyPart::LeftHip, lkx + left_dx, lky - THIGH * l.sin(), 0.9),
            Keypoint::new(BodyPart::RightHip, rkx + THIGH * r.cos(), rky - THIGH * r.sin(), 0.9),
            Keypoint::new(BodyPart::LeftKnee, lkx, lky, 0.9),
            Keypoint::new(BodyPart::RightKnee, rkx, rky, 0.9),
        ])
    }
}
