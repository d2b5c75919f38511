use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Camera index, overrides the config file
    #[arg(long)]
    pub cam_index: Option<u32>,

    /// Decision threshold for the top class, overrides the config file
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Recording window in milliseconds, overrides the config file
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Run the landmark models on CPU only
    #[arg(long, default_value_t = false)]
    pub cpu: bool,

    /// Write the effective configuration back to the config file
    #[arg(long, default_value_t = false)]
    pub save_config: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,
}

impl Args {
    pub fn apply(&self, config: &mut gesture_capture::AppConfig) {
        if let Some(index) = self.cam_index {
            config.camera.index = index;
        }
        if let Some(threshold) = self.threshold {
            config.classifier.threshold = threshold;
        }
        if let Some(duration_ms) = self.duration_ms {
            config.recording.duration_ms = duration_ms;
        }
        if self.cpu {
            config.detector.backend = gesture_capture::Backend::Cpu;
        }
    }
}
