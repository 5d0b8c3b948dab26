use std::time::Instant;

use super::{face_boxes, help_line, Annotation, Flow, FrameProcessor, Key};
use crate::{
    capture::{CaptureEvent, CaptureStateMachine, Command, DatasetWriter, SampleSink},
    face::Detection,
    image::Frame,
    setting::CaptureConfig,
    Result,
};

pub struct CaptureProcessor<S = DatasetWriter> {
    machine: CaptureStateMachine,
    sink: S,
}

impl CaptureProcessor {
    #[tracing::instrument(name = "Initialize capture mode", skip_all, err)]
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let writer = DatasetWriter::new(config);
        writer.prepare(&config.classes)?;
        Ok(Self::with_sink(CaptureStateMachine::new(config), writer))
    }
}

impl<S: SampleSink> CaptureProcessor<S> {
    pub fn with_sink(machine: CaptureStateMachine, sink: S) -> Self {
        Self { machine, sink }
    }

    pub fn machine(&self) -> &CaptureStateMachine {
        &self.machine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn send(&mut self, command: Command) -> Vec<CaptureEvent> {
        let events = self.machine.command(command, &mut self.sink);
        for event in &events {
            if let CaptureEvent::Ignored(command) = event {
                tracing::debug!("{:?} ignored in {:?}", command, self.machine.state());
            }
        }
        events
    }
}

impl<S: SampleSink> FrameProcessor for CaptureProcessor<S> {
    fn help(&self) -> &'static str {
        "'c' start capture, 'n' next expression, 'q' quit"
    }

    fn process(&mut self, frame: &mut Frame, detections: &[Detection], _now: Instant) -> Vec<Annotation> {
        self.machine.tick(frame, detections, &mut self.sink);

        let session = self.machine.session();
        let mut annotations: Vec<Annotation> = face_boxes(detections).collect();
        if session.is_capturing && session.countdown_remaining > 0 {
            annotations.extend(detections.iter().map(|d| {
                Annotation::text(
                    format!("Capturing in: {}", session.countdown_remaining),
                    (d.bbox.x, d.bbox.y - 30),
                )
                .with_scale(0.9)
            }));
        }
        annotations.push(Annotation::text(
            format!(
                "Expression: {} | Captures: {}/{}",
                self.machine.current_class(),
                session.per_class_captured_count,
                session.per_class_target_count
            ),
            (10, 30),
        ));
        annotations.push(help_line(frame, self.help()));
        annotations
    }

    fn handle_key(&mut self, key: Key) -> Flow {
        let command = match key {
            Key::Quit => Command::Quit,
            Key::C => Command::StartCapture,
            Key::N => Command::NextClass,
        };
        self.send(command);
        match self.machine.is_finished() {
            true => Flow::Quit,
            false => Flow::Continue,
        }
    }
}
