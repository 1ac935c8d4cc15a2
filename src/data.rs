// src/data.rs
use crate::driver::{FrameReport, FrameStatus};
use crate::session::{FrameOutcome, WorkoutCount};
use crate::tracking::{Exercise, Phase};
use anyhow::Result;
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
struct TrackingRecord {
    frame: u64,
    timestamp: f64,
    mode: String,
    status: &'static str,
    skip_reason: Option<&'static str>,

    left_angle: Option<f64>,
    right_angle: Option<f64>,
    counted: bool,

    lateral_raise_count: u32,
    squat_count: u32,

    feedback: Option<&'static str>,
    feedback_message: Option<String>,

    processing_ms: f32,
    tracking_confidence: f32,
}

pub struct DataExporter {
    output_dir: PathBuf,
    session_name: String,
    session_id: Uuid,
    records: Vec<TrackingRecord>,
}

impl DataExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            session_id: Uuid::new_v4(),
            records: Vec::new(),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn frame_count(&self) -> usize {
        self.records.len()
    }

    pub fn add_report(&mut self, report: &FrameReport) {
        self.records.push(Self::create_record(report));
    }

    fn create_record(report: &FrameReport) -> TrackingRecord {
        let mut record = TrackingRecord {
            frame: report.frame_index,
            timestamp: report.timestamp,
            mode: report.mode.to_string(),
            status: "stale",
            skip_reason: None,
            left_angle: None,
            right_angle: None,
            counted: false,
            lateral_raise_count: count_of(&report.counts, Exercise::LateralRaise),
            squat_count: count_of(&report.counts, Exercise::Squat),
            feedback: None,
            feedback_message: None,
            processing_ms: report.metrics.avg_processing_time * 1000.0,
            tracking_confidence: report.metrics.tracking_confidence,
        };

        match &report.status {
            FrameStatus::Stale => {}
            FrameStatus::Processed(FrameOutcome::Idle) => record.status = "idle",
            FrameStatus::Processed(FrameOutcome::Skipped(e)) => {
                record.status = "skipped";
                record.skip_reason = Some(e.kind());
            }
            FrameStatus::Processed(FrameOutcome::Updated(update)) => {
                record.status = match update.phase {
                    Phase::Holding => "holding",
                    Phase::Resting => "resting",
                };
                record.left_angle = Some(update.left_angle);
                record.right_angle = Some(update.right_angle);
                record.counted = update.counted;
                if let Some(feedback) = update.feedback {
                    record.feedback = Some(feedback.code());
                    record.feedback_message = Some(feedback.message());
                }
            }
        }

        record
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("tracking_data.csv");

        // Create directory if it doesn't exist
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn generate_report(&self, counts: &[WorkoutCount]) -> Result<PathBuf> {
        let report_path = self.session_dir().join("report.html");

        if let Some(parent) = report_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let html_content = self.create_html_report(counts);
        std::fs::write(&report_path, html_content)?;

        Ok(report_path)
    }

    fn create_html_report(&self, counts: &[WorkoutCount]) -> String {
        let total_frames = self.records.len();
        let skipped = self.records.iter().filter(|r| r.status == "skipped").count();
        let stale = self.records.iter().filter(|r| r.status == "stale").count();
        let usable_rate = if total_frames == 0 {
            0.0
        } else {
            (1.0 - (skipped + stale) as f64 / total_frames as f64) * 100.0
        };

        let mut feedback_tally: BTreeMap<String, usize> = BTreeMap::new();
        for message in self.records.iter().filter_map(|r| r.feedback_message.as_ref()) {
            *feedback_tally.entry(message.clone()).or_default() += 1;
        }

        let count_rows: String = counts
            .iter()
            .map(|c| format!("<tr><td>{}</td><td>{}</td></tr>", c.workout_type, c.count))
            .collect();
        let feedback_rows: String = feedback_tally
            .iter()
            .map(|(message, n)| format!("<tr><td>{}</td><td>{}</td></tr>", message, n))
            .collect();

        format!(r#"
<!DOCTYPE html>
<html>
<head>
    <title>Workout Report - {}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); margin-bottom: 20px; }}
        .stat-item {{ margin: 10px 0; }}
        .stat-label {{ font-weight: bold; color: #666; }}
        .stat-value {{ color: #4682EA; font-size: 1.2em; }}
        td {{ padding: 4px 16px 4px 0; }}
    </style>
</head>
<body>
    <h1>Workout Session Report</h1>
    <div class="stats">
        <h2>Session: {}</h2>
        <div class="stat-item">
            <span class="stat-label">Session ID:</span>
            <span class="stat-value">{}</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Total Frames:</span>
            <span class="stat-value">{}</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Usable Frame Rate:</span>
            <span class="stat-value">{:.1}%</span>
        </div>
    </div>
    <div class="stats">
        <h2>Repetitions</h2>
        <table>
            <tr><th>Workout Type</th><th>Count</th></tr>
            {}
        </table>
    </div>
    <div class="stats">
        <h2>Feedback</h2>
        <table>
            {}
        </table>
    </div>
</body>
</html>
        "#,
            self.session_name,
            self.session_name,
            self.session_id,
            total_frames,
            usable_rate,
            count_rows,
            feedback_rows
        )
    }
}

fn count_of(counts: &[WorkoutCount], exercise: Exercise) -> u32 {
    counts
        .iter()
        .find(|c| c.workout_type == exercise.display_name())
        .map(|c| c.count)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PerformanceMetrics;
    use crate::error::TrackingError;
    use crate::feedback::Feedback;
    use crate::session::ExerciseMode;
    use crate::tracking::FrameUpdate;

    fn report(index: u64, status: FrameStatus, lateral: u32) -> FrameReport {
        FrameReport {
            frame_index: index,
            timestamp: index as f64 / 30.0,
            mode: ExerciseMode::LateralRaise,
            status,
            counts: vec![
                WorkoutCount { workout_type: "Side Lateral Raise", count: lateral },
                WorkoutCount { workout_type: "Squat", count: 0 },
            ],
            metrics: PerformanceMetrics::new(),
        }
    }

    fn counted_update() -> FrameUpdate {
        FrameUpdate {
            exercise: Exercise::LateralRaise,
            left_angle: 90.0,
            right_angle: 91.0,
            phase: Phase::Resting,
            flushed: 10,
            counted: true,
            rep_count: 1,
            feedback: Some(Feedback::RaiseLeftArm),
        }
    }

    #[test]
    fn exports_one_row_per_frame_and_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = DataExporter::new(dir.path(), Some("test_session".to_string()));

        exporter.add_report(&report(0, FrameStatus::Processed(FrameOutcome::Idle), 0));
        exporter.add_report(&report(
            1,
            FrameStatus::Processed(FrameOutcome::Skipped(TrackingError::DegenerateAngle)),
            0,
        ));
        exporter.add_report(&report(2, FrameStatus::Stale, 0));
        exporter.add_report(&report(
            3,
            FrameStatus::Processed(FrameOutcome::Updated(counted_update())),
            1,
        ));
        assert_eq!(exporter.frame_count(), 4);

        let csv_path = exporter.export_csv().unwrap();
        assert_eq!(csv_path, dir.path().join("test_session").join("tracking_data.csv"));

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);

        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][column("status")], "idle");
        assert_eq!(&rows[1][column("skip_reason")], "degenerate_angle");
        assert_eq!(&rows[2][column("status")], "stale");
        assert_eq!(&rows[3][column("feedback")], "RAISE_LEFT_ARM");
        assert_eq!(&rows[3][column("lateral_raise_count")], "1");

        let counts = vec![
            WorkoutCount { workout_type: "Side Lateral Raise", count: 1 },
            WorkoutCount { workout_type: "Squat", count: 0 },
        ];
        let report_path = exporter.generate_report(&counts).unwrap();
        let html = std::fs::read_to_string(report_path).unwrap();
        assert!(html.contains("<td>Side Lateral Raise</td><td>1</td>"));
        assert!(html.contains("Please Raise Your Left Arm Higher!"));
        assert!(html.contains("50.0%"));
    }
}
