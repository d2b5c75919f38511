use clap::Parser;
use colored::*;
use std::io::BufRead;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{info, warn};

mod args;
mod camera;

use args::Args;
use camera::CameraSource;
use gesture_capture::{
    describe, AppConfig, ClassifierAdapter, GesturePipeline, InferenceEngine, OnnxHandLandmarker,
    OnnxInferenceEngine, OnnxPoseLandmarker, PipelineEvent, PipelineOptions,
};

enum Control {
    Toggle,
    Quit,
}

/// Reads operator input on its own thread: Enter toggles recording, `q` quits.
fn spawn_control_reader() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let control = if line.trim().eq_ignore_ascii_case("q") {
                Control::Quit
            } else {
                Control::Toggle
            };
            let quit = matches!(control, Control::Quit);
            if tx.send(control).is_err() || quit {
                break;
            }
        }
        let _ = tx.send(Control::Quit);
    });
    rx
}

fn print_event(event: &PipelineEvent) {
    let line = describe(event);
    match event {
        PipelineEvent::Result { result, frames, .. } => {
            let text = if result.uncertain { line.yellow() } else { line.green() };
            println!("{}  [{} frames, scores {:?}]", text, frames, result.scores);
        }
        PipelineEvent::NoGesture { .. } => println!("{}", line.yellow()),
        PipelineEvent::Error { message, kind, .. } => {
            println!("{} ({}: {})", line.red(), kind.as_str(), message)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_capture=info".into()),
        )
        .init();

    if args.list {
        return camera::list_cameras();
    }

    // 0. Load Config
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    config.validate()?;
    if args.save_config {
        config.save(&args.config)?;
        info!("Saved configuration to {}", args.config.display());
    }

    // 1. Landmarkers. Failing here is fatal; the GPU fallback already happened inside.
    let detector = &config.detector;
    let hands = OnnxHandLandmarker::new(
        &detector.hand_model_path,
        detector.backend,
        detector.min_hand_confidence,
    )
    .map_err(|e| {
        println!("{}", "Failed to initialize models.".red());
        e
    })?;
    let pose = OnnxPoseLandmarker::new(
        &detector.pose_model_path,
        detector.backend,
        detector.min_pose_confidence,
    )
    .map_err(|e| {
        println!("{}", "Failed to initialize models.".red());
        e
    })?;
    info!(hand = hands.backend().as_str(), pose = pose.backend().as_str(), "landmarkers ready");

    // 2. Classifier. A missing model is reported per recording, not at startup.
    let engine: Option<Box<dyn InferenceEngine>> =
        match OnnxInferenceEngine::open(&config.classifier.model_path, detector.backend) {
            Ok(engine) => Some(Box::new(engine)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
    let mut classifier = ClassifierAdapter::new(
        engine,
        config.classifier.labels.clone(),
        config.classifier.threshold,
        config.classifier.fallback_index,
    );
    if classifier.is_ready() && !classifier.self_test() {
        println!("{}", "Classifier self-test failed; predictions may be wrong.".yellow());
    }

    // 3. Pipeline workers
    let mut pipeline = GesturePipeline::spawn(
        Box::new(hands),
        Box::new(pose),
        classifier,
        PipelineOptions::from(&config),
    )?;

    // 4. Camera
    let mut camera = CameraSource::new(config.camera.index, config.camera.mirror)?;
    println!("Capturing from {}", camera.name());
    println!(
        "Controls: [Enter] Record/Stop ({} ms window)  [q + Enter] Quit",
        config.recording.duration_ms
    );

    let controls = spawn_control_reader();

    // 5. Loop
    'run: loop {
        loop {
            match controls.try_recv() {
                Ok(Control::Toggle) => {
                    if pipeline.is_recording() {
                        pipeline.stop_recording();
                        println!("{}", "Processing...".cyan());
                    } else if let Some(session) = pipeline.start_recording() {
                        println!("{}", format!("Recording... (session {})", session).cyan());
                    }
                }
                Ok(Control::Quit) | Err(mpsc::TryRecvError::Disconnected) => break 'run,
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }

        match camera.capture() {
            Ok(frame) => {
                pipeline.submit(frame);
            }
            Err(e) => {
                warn!("{:#}", e);
                std::thread::sleep(Duration::from_millis(30));
            }
        }

        while let Some(event) = pipeline.try_event() {
            print_event(&event);
        }
    }

    pipeline.shutdown();
    while let Some(event) = pipeline.try_event() {
        print_event(&event);
    }
    Ok(())
}
