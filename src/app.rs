use std::time::Instant;

use crate::{
    cv::{Camera, CascadeLocator, Window},
    face::FaceLocator,
    model,
    processor::{self, Flow, FrameProcessor},
    setting::{Mode, Setting},
    Result,
};

/// Frame loop over the camera: read, mirror, locate, process, show, poll.
pub struct App {
    camera: Camera,
    window: Window,
    locator: Box<dyn FaceLocator>,
    processor: Box<dyn FrameProcessor>,
    mirror: bool,
    max_read_retries: u32,
}

impl App {
    #[tracing::instrument(name = "Starting facemoji", skip(setting), err)]
    pub fn new(mode: Mode, setting: &Setting) -> Result<Self> {
        let config = &setting.config;
        let classifier = match mode {
            Mode::Detect => model::load_classifier(&config.model),
            Mode::Capture | Mode::Characters => None,
        };
        let processor = processor::for_mode(mode, config, classifier)?;
        let locator = Box::new(CascadeLocator::new(&config.locator)?);
        let camera = Camera::open(&config.camera)?;
        let window = Window::open(&config.camera.window_title)?;
        tracing::info!("{:?} mode ready: {}", mode, processor.help());

        Ok(Self {
            camera,
            window,
            locator,
            processor,
            mirror: config.camera.mirror,
            max_read_retries: config.camera.max_read_retries,
        })
    }

    /// Runs until `q` or until the camera stops delivering frames.
    pub fn run(mut self) -> Result<()> {
        let mut failed_reads = 0;
        loop {
            let mut frame = match self.camera.read_frame() {
                Ok(frame) => {
                    failed_reads = 0;
                    frame
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    failed_reads += 1;
                    tracing::warn!("{} ({}/{})", err, failed_reads, self.max_read_retries);
                    if failed_reads >= self.max_read_retries {
                        tracing::info!("camera stopped delivering frames, exiting");
                        return Ok(());
                    }
                    continue;
                }
            };
            if self.mirror {
                frame.mirror();
            }

            let detections = self.locator.locate(&frame).unwrap_or_else(|err| {
                tracing::warn!("face location failed: {}", err);
                vec![]
            });
            let annotations = self.processor.process(&mut frame, &detections, Instant::now());
            self.window.show(&frame, &annotations)?;

            if let Some(key) = self.window.poll_key()? {
                if self.processor.handle_key(key) == Flow::Quit {
                    tracing::info!("quit requested");
                    return Ok(());
                }
            }
        }
    }
}
