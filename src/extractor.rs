// src/extractor.rs - Keypoint sources feeding the frame loop
use crate::pose::Frame;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};

/// Produces one frame of keypoints per call.
///
/// Implementations wrap whatever runs the pose model. `extract` may suspend
/// for inference; the driver never calls it concurrently with itself.
#[async_trait]
pub trait KeypointExtractor: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn extract(&mut self) -> Result<Option<Frame>>;

    /// Applies a pending model or camera change. Returns once the new
    /// configuration is in effect.
    async fn reload(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Replays model output recorded as JSON Lines, one `Frame` per line.
pub struct RecordedExtractor {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
    next_index: u64,
    frame_interval: Option<Duration>,
    malformed_lines: usize,
}

impl RecordedExtractor {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(anyhow::anyhow!("Recording does not exist: {}", path.display()));
        }

        let file = File::open(&path)
            .await
            .with_context(|| format!("Cannot read recording {}", path.display()))?;

        info!("Replaying keypoints from {}", path.display());

        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_number: 0,
            next_index: 0,
            frame_interval: None,
            malformed_lines: 0,
        })
    }

    /// Paces replay to roughly `fps` frames per second instead of as fast as
    /// frames can be read.
    pub fn with_frame_rate(mut self, fps: f32) -> Self {
        self.frame_interval = (fps > 0.0).then(|| Duration::from_secs_f32(1.0 / fps));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }
}

#[async_trait]
impl KeypointExtractor for RecordedExtractor {
    async fn extract(&mut self) -> Result<Option<Frame>> {
        if let Some(interval) = self.frame_interval {
            tokio::time::sleep(interval).await;
        }

        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .with_context(|| format!("Failed reading {}", self.path.display()))?
            else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Frame>(&line) {
                Ok(mut frame) => {
                    frame.index = self.next_index;
                    self.next_index += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    self.malformed_lines += 1;
                    warn!("Skipping malformed line {} in {}: {}", self.line_number, self.path.display(), e);
                }
            }
        }
    }

    async fn reload(&mut self) -> Result<()> {
        info!("Reload requested for recorded source {}; nothing to reload", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_frames_and_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"timestamp":0.0,"width":640,"poses":[{{"score":0.9,"keypoints":[{{"part":"nose","position":{{"x":1.0,"y":2.0}},"score":0.9}}]}}]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"timestamp":0.033,"width":640,"poses":[]}}"#).unwrap();

        let mut extractor = RecordedExtractor::open(file.path()).await.unwrap();

        let first = extractor.extract().await.unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.poses.len(), 1);

        let second = extractor.extract().await.unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert!(second.poses.is_empty());

        assert!(extractor.extract().await.unwrap().is_none());
        assert_eq!(extractor.malformed_lines(), 1);
    }

    #[tokio::test]
    async fn missing_recording_fails_to_open() {
        assert!(RecordedExtractor::open("/nonexistent/recording.jsonl").await.is_err());
    }
}
