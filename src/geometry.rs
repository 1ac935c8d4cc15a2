// src/geometry.rs
use crate::error::TrackingError;
use nalgebra::Point2;

const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Planar angle at `vertex` between the segments to `p1` and `p2`, in degrees.
///
/// Result lies in `[0, 180]`. Fails with `DegenerateAngle` when either segment
/// has (near) zero length or any coordinate is not finite.
pub fn angle_between(
    p1: Point2<f64>,
    vertex: Point2<f64>,
    p2: Point2<f64>,
) -> Result<f64, TrackingError> {
    let v1 = p1 - vertex;
    let v2 = p2 - vertex;

    let mag1 = v1.norm();
    let mag2 = v2.norm();

    if !mag1.is_finite() || !mag2.is_finite() || mag1 < MIN_SEGMENT_LENGTH || mag2 < MIN_SEGMENT_LENGTH {
        return Err(TrackingError::DegenerateAngle);
    }

    // rounding can push the ratio just past +-1
    let cos_angle = (v1.dot(&v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    Ok(cos_angle.acos().to_degrees())
}
