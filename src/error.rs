// src/error.rs
use crate::pose::BodyPart;
use thiserror::Error;

/// Reasons a frame contributes nothing to an exercise's history.
///
/// None of these are fatal: the frame is skipped and the history is left
/// exactly as it was before the frame arrived.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("degenerate angle: coincident or missing keypoints")]
    DegenerateAngle,
    #[error("keypoint {part} below confidence threshold (score {score:.3})")]
    LowConfidenceKeypoint { part: BodyPart, score: f32 },
    #[error("keypoint {0} missing from model output")]
    MissingKeypoint(BodyPart),
    #[error("model returned no keypoints for this frame")]
    MissingModelOutput,
}

impl TrackingError {
    /// Short tag used in exported records.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackingError::DegenerateAngle => "degenerate_angle",
            TrackingError::LowConfidenceKeypoint { .. } => "low_confidence",
            TrackingError::MissingKeypoint(_) => "missing_keypoint",
            TrackingError::MissingModelOutput => "missing_model_output",
        }
    }
}
