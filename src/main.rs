// src/main.rs
use anyhow::{Context, Result};
use rep_tracker::data::DataExporter;
use rep_tracker::{
    AppSettings, Command, ExerciseMode, FrameDriver, FrameOutcome, FrameReport, RecordedExtractor,
    WorkoutSession,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: rep_tracker <recording.jsonl> [--mode none|lateral-raise|squat] \
[--config settings.json] [--output DIR] [--fps N]";

struct CliArgs {
    recording: PathBuf,
    mode: ExerciseMode,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    fps: Option<f32>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut recording = None;
    let mut mode = ExerciseMode::None;
    let mut config = None;
    let mut output = None;
    let mut fps = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
        };
        match arg.as_str() {
            "--mode" => mode = value("--mode")?.parse()?,
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--output" => output = Some(PathBuf::from(value("--output")?)),
            "--fps" => {
                fps = Some(
                    value("--fps")?
                        .parse::<f32>()
                        .context("--fps must be a number")?,
                )
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if recording.is_none() && !other.starts_with("--") => {
                recording = Some(PathBuf::from(other))
            }
            other => anyhow::bail!("Unexpected argument '{}'\n{}", other, USAGE),
        }
    }

    Ok(CliArgs {
        recording: recording.with_context(|| format!("Missing recording path\n{}", USAGE))?,
        mode,
        config,
        output,
        fps,
    })
}

/// Stand-in for the on-screen label and sound: one line per counted rep.
fn present(report: &FrameReport) {
    let Some(FrameOutcome::Updated(update)) = report.outcome() else {
        return;
    };
    if let Some(feedback) = update.feedback {
        println!(
            "[frame {:>5}] {} #{}: {} (cue: {:?})",
            report.frame_index,
            update.exercise,
            update.rep_count,
            feedback.message(),
            feedback.audio_cue()
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;

    let mut settings = match &args.config {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };
    if let Some(output) = args.output {
        settings.output_directory = output;
    }

    if args.mode == ExerciseMode::None {
        warn!("No exercise selected; frames will be read but nothing is counted");
    }

    let mut extractor = RecordedExtractor::open(&args.recording).await?;
    if let Some(fps) = args.fps {
        extractor = extractor.with_frame_rate(fps);
    }

    let mut session = WorkoutSession::new(settings.tracker.clone())
        .with_flip_horizontal(settings.flip_horizontal);
    session.select_mode(args.mode);

    let (driver, handle, mut reports) = FrameDriver::new(extractor, session);

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing session");
            let _ = interrupt.send(Command::Shutdown).await;
        }
    });

    let output_directory = settings.output_directory.clone();
    let presenter = tokio::spawn(async move {
        let mut exporter = DataExporter::new(&output_directory, None);
        while let Some(report) = reports.recv().await {
            present(&report);
            exporter.add_report(&report);
        }
        exporter
    });

    let session = driver.run().await?;
    drop(handle);
    let exporter = presenter.await.context("Report task failed")?;

    println!("\n=== Workout Summary ===");
    for row in session.workout_counts() {
        println!("  {:<20} {}", row.workout_type, row.count);
    }
    println!("  {:<20} {}", "Frames", exporter.frame_count());

    if settings.export_csv {
        let csv_path = exporter.export_csv()?;
        let report_path = exporter.generate_report(&session.workout_counts())?;
        info!("Wrote {} and {}", csv_path.display(), report_path.display());
    }

    Ok(())
}
