use anyhow::{Context, Result};
use rep_tracker::{AngleHistory, Exercise, KeypointExtractor, RecordedExtractor, TrackerConfig};

fn describe(exercise: Exercise, pose: &rep_tracker::Pose, config: &TrackerConfig) -> String {
    // fresh history each frame: only the angles are of interest here
    let mut scratch = AngleHistory::new();
    match exercise.update(pose, &mut scratch, config) {
        Ok(update) => format!("{:>6.1} {:>6.1}", update.left_angle, update.right_angle),
        Err(e) => format!("✗ {}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("Usage: keypoint_probe <recording.jsonl>")?;

    println!("Probing keypoints in {}...\n", path);

    let mut extractor = RecordedExtractor::open(&path).await?;
    let config = TrackerConfig::default();
    let mut frames = 0usize;
    let mut empty = 0usize;

    println!("{:>6} {:>5} {:>6}  {:<16} {:<16}", "frame", "poses", "conf", "arms L/R", "knees L/R");
    while let Some(frame) = extractor.extract().await? {
        frames += 1;
        let Some(pose) = frame.primary_pose() else {
            empty += 1;
            println!("{:>6} {:>5}  ✗ no keypoints", frame.index, frame.poses.len());
            continue;
        };

        println!(
            "{:>6} {:>5} {:>6.2}  {:<16} {:<16}",
            frame.index,
            frame.poses.len(),
            pose.mean_confidence(),
            describe(Exercise::LateralRaise, pose, &config),
            describe(Exercise::Squat, pose, &config),
        );
    }

    println!("\n✓ {} frames read, {} without keypoints, {} malformed lines", frames, empty, extractor.malformed_lines());
    Ok(())
}
