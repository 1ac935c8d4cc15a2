// src/pose.rs
use crate::error::TrackingError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body parts in the 17-keypoint layout emitted by the pose model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl BodyPart {
    pub const COUNT: usize = 17;

    pub const ALL: [BodyPart; Self::COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEye,
        BodyPart::RightEye,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    /// Position of this part in the model's keypoint array.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftEye => "leftEye",
            BodyPart::RightEye => "rightEye",
            BodyPart::LeftEar => "leftEar",
            BodyPart::RightEar => "rightEar",
            BodyPart::LeftShoulder => "leftShoulder",
            BodyPart::RightShoulder => "rightShoulder",
            BodyPart::LeftElbow => "leftElbow",
            BodyPart::RightElbow => "rightElbow",
            BodyPart::LeftWrist => "leftWrist",
            BodyPart::RightWrist => "rightWrist",
            BodyPart::LeftHip => "leftHip",
            BodyPart::RightHip => "rightHip",
            BodyPart::LeftKnee => "leftKnee",
            BodyPart::RightKnee => "rightKnee",
            BodyPart::LeftAnkle => "leftAnkle",
            BodyPart::RightAnkle => "rightAnkle",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Image-space pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// One observed joint for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: BodyPart,
    pub position: Position,
    /// Confidence in 0.0..=1.0.
    pub score: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, x: f64, y: f64, score: f32) -> Self {
        Self {
            part,
            position: Position::new(x, y),
            score,
        }
    }
}

/// All keypoints the model reported for one person.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            score: mean_score(&keypoints),
            keypoints,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn get(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.part == part)
    }

    /// Looks up a keypoint the counter depends on.
    ///
    /// A keypoint whose score is below `min_confidence`, zero, or NaN is
    /// rejected rather than fed into the angle computation.
    pub fn require(&self, part: BodyPart, min_confidence: f32) -> Result<Position, TrackingError> {
        let keypoint = self.get(part).ok_or(TrackingError::MissingKeypoint(part))?;
        let usable = keypoint.score > 0.0 && keypoint.score >= min_confidence;
        if !usable {
            return Err(TrackingError::LowConfidenceKeypoint {
                part,
                score: keypoint.score,
            });
        }
        Ok(keypoint.position)
    }

    /// Mirrors every keypoint about the vertical axis of an image `width`
    /// pixels wide. Part labels are kept as reported.
    pub fn flip_horizontal(&mut self, width: u32) {
        let max_x = width.saturating_sub(1) as f64;
        for keypoint in &mut self.keypoints {
            keypoint.position.x = max_x - keypoint.position.x;
        }
    }

    pub fn mean_confidence(&self) -> f32 {
        mean_score(&self.keypoints)
    }
}

fn mean_score(keypoints: &[Keypoint]) -> f32 {
    if keypoints.is_empty() {
        return 0.0;
    }
    keypoints.iter().map(|k| k.score).sum::<f32>() / keypoints.len() as f32
}

/// One frame of model output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub poses: Vec<Pose>,
}

impl Frame {
    /// The pose the counter follows when several people are in view.
    pub fn primary_pose(&self) -> Option<&Pose> {
        self.poses
            .iter()
            .filter(|p| !p.is_empty())
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_part_index_matches_model_layout() {
        assert_eq!(BodyPart::LeftShoulder.index(), 5);
        assert_eq!(BodyPart::RightElbow.index(), 8);
        assert_eq!(BodyPart::LeftHip.index(), 11);
        assert_eq!(BodyPart::RightKnee.index(), 14);
        assert_eq!(BodyPart::from_index(16), Some(BodyPart::RightAnkle));
        assert_eq!(BodyPart::from_index(17), None);
    }

    #[test]
    fn require_rejects_low_and_zero_confidence() {
        let pose = Pose::new(vec![
            Keypoint::new(BodyPart::LeftHip, 1.0, 2.0, 0.05),
            Keypoint::new(BodyPart::RightHip, 1.0, 2.0, 0.0),
            Keypoint::new(BodyPart::LeftKnee, 3.0, 4.0, 0.9),
        ]);

        assert!(matches!(
            pose.require(BodyPart::LeftHip, 0.1),
            Err(TrackingError::LowConfidenceKeypoint { part: BodyPart::LeftHip, .. })
        ));
        // zero is rejected even with the gate disabled
        assert!(pose.require(BodyPart::RightHip, 0.0).is_err());
        assert_eq!(
            pose.require(BodyPart::RightKnee, 0.1),
            Err(TrackingError::MissingKeypoint(BodyPart::RightKnee))
        );
        assert_eq!(pose.require(BodyPart::LeftKnee, 0.1), Ok(Position::new(3.0, 4.0)));
    }

    #[test]
    fn flip_mirrors_x_only() {
        let mut pose = Pose::new(vec![Keypoint::new(BodyPart::Nose, 100.0, 50.0, 0.9)]);
        pose.flip_horizontal(640);
        let nose = pose.get(BodyPart::Nose).unwrap();
        assert_eq!(nose.position, Position::new(539.0, 50.0));
    }

    #[test]
    fn primary_pose_picks_highest_score() {
        let weak = Pose {
            score: 0.2,
            keypoints: vec![Keypoint::new(BodyPart::Nose, 0.0, 0.0, 0.2)],
        };
        let strong = Pose {
            score: 0.8,
            keypoints: vec![Keypoint::new(BodyPart::Nose, 1.0, 1.0, 0.8)],
        };
        let frame = Frame {
            poses: vec![weak, strong.clone(), Pose::default()],
            ..Default::default()
        };
        assert_eq!(frame.primary_pose(), Some(&strong));
        assert_eq!(Frame::default().primary_pose(), None);
    }

    #[test]
    fn keypoint_deserializes_from_model_json() {
        let json = r#"{"part":"leftShoulder","position":{"x":12.5,"y":40.0},"score":0.93}"#;
        let keypoint: Keypoint = serde_json::from_str(json).unwrap();
        assert_eq!(keypoint.part, BodyPart::LeftShoulder);
        assert_eq!(keypoint.position.x, 12.5);
    }
}
