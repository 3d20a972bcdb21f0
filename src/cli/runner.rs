use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde_json::{Value, json};

use crate::formats::{PlaneOutputs, read_video, write_label_map};
use crate::jobs::{JobKind, JobProgress};
use crate::model::{ConfigValue, Params, label_set, load_params, save_params};
use crate::runtime::{AppContext, Intent, JobUpdate};
use crate::session::Mode;

use super::types::{Cli, Commands, PlaneSummary, VideoInfo};

const JOB_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let video = read_video(&input).map_err(|error| error.to_string())?;
            let (height, width) = video.frame_shape();
            let info = VideoInfo {
                path: input.display().to_string(),
                frames: video.frames(),
                planes: video.planes(),
                height,
                width,
                max_value: video.max_value(),
                dynamic_range: video.dynamic_range(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&info).map_err(|error| error.to_string())?
            );
        }
        Commands::Params { config, output } => {
            let params = params_from(config.as_deref())?;
            if let Some(output) = output {
                save_params(&output, &params).map_err(|error| error.to_string())?;
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&params).map_err(|error| error.to_string())?
            );
        }
        Commands::Detect {
            input,
            output,
            config,
            motion_correct,
        } => {
            let params = params_from(config.as_deref())?;
            let mut app = AppContext::new(params);
            dispatch(&mut app, Intent::ImportVideos(vec![input]))?;
            if motion_correct {
                run_job(&mut app, JobKind::MotionCorrection)?;
                dispatch(
                    &mut app,
                    Intent::SetConfig(ConfigValue::UseMotionCorrected(true)),
                )?;
            }
            detect(&mut app)?;
            save_detection(&mut app, &output)?;
        }
        Commands::Process {
            inputs,
            config,
            rois,
            motion_correct,
            blur,
        } => {
            let mut params = params_from(config.as_deref())?;
            params.motion_correct_all_videos = motion_correct;
            params.apply_blur = blur;
            let mut app = AppContext::new(params);
            dispatch(&mut app, Intent::ImportVideos(inputs))?;
            match rois {
                Some(archive) => dispatch(&mut app, Intent::LoadRoiArchive(archive))?,
                None => detect(&mut app)?,
            }
            run_job(&mut app, JobKind::BatchProcessing)?;
            let summary = app
                .last_batch()
                .ok_or_else(|| "batch processing produced no summary".to_string())?;
            let processed = summary
                .processed
                .iter()
                .map(|video| {
                    json!({
                        "path": video.path,
                        "output_dir": video.output_dir,
                        "shifts": video.shifts,
                    })
                })
                .collect::<Vec<_>>();
            println!(
                "{}",
                json!({"status": "ok", "processed": processed, "skipped": summary.skipped})
            );
        }
    }

    Ok(())
}

fn params_from(config: Option<&Path>) -> Result<Params, String> {
    match config {
        Some(path) => load_params(path).map_err(|error| error.to_string()),
        None => Ok(Params::default()),
    }
}

fn dispatch(app: &mut AppContext, intent: Intent) -> Result<(), String> {
    app.dispatch(intent).map_err(|error| error.to_string())
}

fn status_line(update: &JobUpdate) -> Value {
    let job = update.kind.to_string();
    match update.progress {
        JobProgress::Running(percent) => json!({"job": job, "status": "running", "percent": percent}),
        JobProgress::Done => json!({"job": job, "status": "done"}),
        JobProgress::Idle => json!({"job": job, "status": "cancelled"}),
        JobProgress::Failed => json!({"job": job, "status": "failed"}),
    }
}

/// Starts one job, streams its status lines and waits for it to finish.
fn run_job(app: &mut AppContext, kind: JobKind) -> Result<(), String> {
    dispatch(app, Intent::ToggleJob(kind))?;
    if !app.is_busy() {
        return Err(format!("{kind} cannot start in the current state"));
    }
    for update in app.wait_for_job(JOB_TIMEOUT) {
        println!("{}", status_line(&update));
    }
    match app.progress(kind) {
        JobProgress::Done => Ok(()),
        JobProgress::Failed => Err(app
            .last_failure()
            .map_or_else(|| format!("{kind} failed"), str::to_string)),
        _ => Err(format!("{kind} did not finish")),
    }
}

fn detect(app: &mut AppContext) -> Result<(), String> {
    dispatch(app, Intent::SwitchMode(Mode::RoiFinding))?;
    run_job(app, JobKind::RoiDetection)?;
    dispatch(app, Intent::SwitchMode(Mode::RoiFiltering))
}

fn save_detection(app: &mut AppContext, output: &Path) -> Result<(), String> {
    std::fs::create_dir_all(output).map_err(|error| error.to_string())?;
    let archive = output.join("rois.json");
    let image = output.join("rois.png");
    dispatch(app, Intent::SaveRoiArchive(archive.clone()))?;
    dispatch(app, Intent::SaveRoiImage(image.clone()))?;

    let session = app.session();
    let mut planes = Vec::new();
    let mut label_maps: Vec<PathBuf> = Vec::new();
    for (z, labels) in session.export_label_maps().iter().enumerate() {
        let path = PlaneOutputs::new(output, z).rois;
        write_label_map(&path, labels).map_err(|error| error.to_string())?;
        label_maps.push(path);
        planes.push(PlaneSummary {
            plane: z,
            rois: label_set(labels).len(),
            removed: session
                .roi_sets(z)
                .map_or(0, |sets| sets.removed().len()),
        });
    }
    println!(
        "{}",
        json!({
            "status": "ok",
            "archive": archive,
            "image": image,
            "label_maps": label_maps,
            "planes": planes,
        })
    );
    Ok(())
}
