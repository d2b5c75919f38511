use anyhow::{anyhow, Context, Result};
use colored::*;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};
use std::time::Instant;

use gesture_capture::{Frame, RgbFrame};

/// Front-facing camera delivering RGB frames stamped with a monotonic clock
pub struct CameraSource {
    camera: Camera,
    mirror: bool,
    opened_at: Instant,
}

impl CameraSource {
    pub fn new(index: u32, mirror: bool) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .context("Failed to create camera instance")?;

        camera
            .open_stream()
            .map_err(|e| anyhow!(e))
            .context("Failed to open camera stream")?;

        println!("{}", format!("Opened camera: {}", camera.info().human_name()).green());
        println!("Format: {}", camera.camera_format());

        Ok(Self {
            camera,
            mirror,
            opened_at: Instant::now(),
        })
    }

    pub fn capture(&mut self) -> Result<Frame> {
        let raw = self.camera.frame().map_err(|e| anyhow!(e)).context("Failed to get frame")?;
        let timestamp_ms = self.opened_at.elapsed().as_millis() as u64;
        let decoded = raw
            .decode_image::<RgbFormat>()
            .map_err(|e| anyhow!(e))
            .context("Failed to decode frame")?;
        let (width, height) = (decoded.width(), decoded.height());
        let mut image = RgbFrame::from_raw(width, height, decoded.into_raw())
            .context("Decoded frame has an unexpected size")?;
        if self.mirror {
            image::imageops::flip_horizontal_in_place(&mut image);
        }
        Ok(Frame::new(image, timestamp_ms))
    }

    pub fn name(&self) -> String {
        self.camera.info().human_name()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}

pub fn list_cameras() -> Result<()> {
    let cameras = nokhwa::query(ApiBackend::Auto)?;
    println!("Available Cameras:");
    println!("{:<5} | {:<30} | {:<10}", "Index", "Name", "Misc");
    println!("{}", "-".repeat(60));
    for cam in cameras {
        println!("{:<5} | {:<30} | {:?}", cam.index(), cam.human_name(), cam.misc());
    }
    Ok(())
}
