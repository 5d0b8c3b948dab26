//! Operator driven capture of labeled face crops.
//!
//! The operator picks a class, starts a capture and holds the expression while
//! the machine saves one crop per detected face every few frames until the
//! class quota is reached. Countdowns count processed frames, not seconds.

use std::path::PathBuf;

pub use dataset::{DatasetWriter, LabeledSample, SampleSink, SequencePolicy, Split};

use crate::{
    face::{self, Detection},
    image::Frame,
    setting::CaptureConfig,
};

pub mod dataset;

/// Frames between `start_capture` and the first save.
pub const COUNTDOWN_FRAMES: u32 = 5;
/// Frames between two saves of the same class.
pub const INTER_CAPTURE_DELAY: u32 = 5;
pub const TARGET_PER_CLASS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    /// Counting down before capture mode starts.
    Armed,
    /// Saving faces whenever the countdown is at zero.
    Capturing,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartCapture,
    NextClass,
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSession {
    pub current_class_index: usize,
    pub per_class_target_count: u32,
    pub per_class_captured_count: u32,
    pub countdown_remaining: u32,
    pub is_capturing: bool,
    pub running_sample_index: u32,
}

#[derive(Debug, PartialEq)]
pub enum CaptureEvent {
    Started { class: String },
    /// Numbering for the class could not be resumed, capture stays idle.
    StartRefused { class: String, reason: String },
    Saved { path: PathBuf },
    SampleFailed { reason: String },
    ClassCompleted { class: String, captured: u32 },
    /// Quota of the last class reached, capture wrapped back to the first class.
    AllClassesCompleted,
    ClassChanged { class: String },
    /// Command not allowed in the current state.
    Ignored(Command),
    Quit,
}

pub struct CaptureStateMachine {
    classes: Vec<String>,
    session: CaptureSession,
    state: CaptureState,
    countdown_frames: u32,
    inter_capture_delay: u32,
}

impl CaptureSession {
    pub fn new(per_class_target_count: u32) -> Self {
        Self {
            per_class_target_count,
            ..Default::default()
        }
    }

    fn reset_class_counters(&mut self) {
        self.per_class_captured_count = 0;
        self.running_sample_index = 0;
    }
}

impl CaptureStateMachine {
    pub fn new(config: &CaptureConfig) -> Self {
        Self::with_classes(config.classes.clone(), config)
    }

    pub fn with_classes(classes: Vec<String>, config: &CaptureConfig) -> Self {
        Self {
            classes,
            session: CaptureSession::new(config.target_per_class),
            state: CaptureState::Idle,
            countdown_frames: config.countdown_frames,
            inter_capture_delay: config.inter_capture_delay,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn current_class(&self) -> &str {
        self.classes
            .get(self.session.current_class_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.state == CaptureState::Quit
    }

    pub fn command(&mut self, command: Command, sink: &mut impl SampleSink) -> Vec<CaptureEvent> {
        match (command, self.state) {
            (_, CaptureState::Quit) => vec![],
            (Command::Quit, _) => {
                self.session.is_capturing = false;
                self.state = CaptureState::Quit;
                vec![CaptureEvent::Quit]
            }
            (Command::StartCapture, CaptureState::Idle) if !self.classes.is_empty() => {
                let class = self.current_class().to_string();
                if let Err(err) = sink.begin_class(&class) {
                    tracing::warn!("not starting {}, numbering could not be resumed: {}", class, err);
                    return vec![CaptureEvent::StartRefused {
                        class,
                        reason: err.to_string(),
                    }];
                }
                tracing::info!("starting capture for {}", class);
                self.session.is_capturing = true;
                self.session.countdown_remaining = self.countdown_frames;
                self.state = if self.countdown_frames == 0 {
                    CaptureState::Capturing
                } else {
                    CaptureState::Armed
                };
                vec![CaptureEvent::Started { class }]
            }
            (Command::NextClass, CaptureState::Idle) if !self.classes.is_empty() => {
                self.advance_class();
                let class = self.current_class().to_string();
                tracing::info!("switched to {}", class);
                vec![CaptureEvent::ClassChanged { class }]
            }
            (command, _) => vec![CaptureEvent::Ignored(command)],
        }
    }

    /// Advances the machine by one processed frame.
    pub fn tick(
        &mut self,
        frame: &Frame,
        detections: &[Detection],
        sink: &mut impl SampleSink,
    ) -> Vec<CaptureEvent> {
        match self.state {
            CaptureState::Idle | CaptureState::Quit => vec![],
            CaptureState::Armed => {
                self.session.countdown_remaining = self.session.countdown_remaining.saturating_sub(1);
                if self.session.countdown_remaining == 0 {
                    self.state = CaptureState::Capturing;
                }
                vec![]
            }
            CaptureState::Capturing if self.session.countdown_remaining > 0 => {
                self.session.countdown_remaining -= 1;
                vec![]
            }
            // no face yet, try again next frame
            CaptureState::Capturing if detections.is_empty() => vec![],
            CaptureState::Capturing => self.capture(frame, detections, sink),
        }
    }

    fn capture(
        &mut self,
        frame: &Frame,
        detections: &[Detection],
        sink: &mut impl SampleSink,
    ) -> Vec<CaptureEvent> {
        let class = self.current_class().to_string();
        let mut events = vec![];
        let mut saved = 0;

        for detection in detections {
            let face = match face::normalize(frame, &detection.bbox) {
                Ok(face) => face,
                Err(err) => {
                    tracing::debug!("skipping detection {:?}: {}", detection.bbox, err);
                    continue;
                }
            };
            // the quota only moves once the sample is on disk
            match sink.store(&class, self.session.running_sample_index, face.to_gray_image()) {
                Ok(path) => {
                    tracing::info!("saved {}", path.display());
                    self.session.per_class_captured_count += 1;
                    self.session.running_sample_index += 1;
                    saved += 1;
                    events.push(CaptureEvent::Saved { path });
                }
                Err(err) => {
                    tracing::warn!("failed to save {} sample: {}", class, err);
                    events.push(CaptureEvent::SampleFailed {
                        reason: err.to_string(),
                    });
                }
            }
        }

        if self.session.per_class_captured_count >= self.session.per_class_target_count {
            tracing::info!(
                "completed {} captures for {}",
                self.session.per_class_captured_count,
                class
            );
            events.push(CaptureEvent::ClassCompleted {
                class,
                captured: self.session.per_class_captured_count,
            });
            self.advance_class();
            if self.session.current_class_index == 0 {
                tracing::info!("all classes completed, press 'q' to quit or keep capturing");
                events.push(CaptureEvent::AllClassesCompleted);
            }
            self.session.is_capturing = false;
            self.session.countdown_remaining = 0;
            self.state = CaptureState::Idle;
        } else if saved > 0 {
            self.session.countdown_remaining = self.inter_capture_delay;
        }
        events
    }

    fn advance_class(&mut self) {
        self.session.current_class_index = (self.session.current_class_index + 1) % self.classes.len();
        self.session.reset_class_counters();
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::{
        CaptureEvent, CaptureState, CaptureStateMachine, Command, SampleSink, COUNTDOWN_FRAMES,
        INTER_CAPTURE_DELAY,
    };
    use crate::{
        face::{BoundingBox, Detection},
        image::Frame,
        setting::CaptureConfig,
        Error, Result,
    };

    #[derive(Default)]
    struct MemorySink {
        stored: Vec<(String, u32)>,
        begun: Vec<String>,
        fail: bool,
        fail_begin: bool,
    }

    impl SampleSink for MemorySink {
        fn begin_class(&mut self, class_name: &str) -> Result<()> {
            if self.fail_begin {
                return Err(Error::SequenceExhausted(class_name.to_string()));
            }
            self.begun.push(class_name.to_string());
            Ok(())
        }

        fn store(
            &mut self,
            class_name: &str,
            running_index: u32,
            pixels: image::GrayImage,
        ) -> Result<PathBuf> {
            assert_eq!(pixels.dimensions(), (48, 48));
            if self.fail {
                return Err(Error::IOFailure(
                    PathBuf::from("dataset"),
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ));
            }
            self.stored.push((class_name.to_string(), running_index));
            Ok(PathBuf::from(format!("{}_{}.jpg", class_name, running_index)))
        }
    }

    fn machine(target: u32) -> CaptureStateMachine {
        CaptureStateMachine::new(&CaptureConfig {
            target_per_class: target,
            ..Default::default()
        })
    }

    fn one_face() -> Vec<Detection> {
        vec![Detection::new(BoundingBox::new(10, 10, 40, 40), 1.)]
    }

    /// Ticks until the countdown is spent and the next tick would capture.
    fn run_countdown(
        machine: &mut CaptureStateMachine,
        frame: &Frame,
        sink: &mut MemorySink,
        frames: u32,
    ) {
        for _ in 0..frames {
            assert!(machine.tick(frame, &[], sink).is_empty());
        }
    }

    #[test]
    fn start_then_countdown_without_faces_is_capturing_and_empty() {
        let (frame, mut sink) = (Frame::new(64, 64), MemorySink::default());
        let mut machine = machine(50);

        machine.command(Command::StartCapture, &mut sink);
        assert_eq!(machine.state(), CaptureState::Armed);
        run_countdown(&mut machine, &frame, &mut sink, COUNTDOWN_FRAMES);
        assert_eq!(machine.state(), CaptureState::Capturing);

        // nobody in front of the camera, still no error and no sample
        for _ in 0..10 {
            assert!(machine.tick(&frame, &[], &mut sink).is_empty());
        }
        assert_eq!(machine.session().per_class_captured_count, 0);
        assert_eq!(machine.session().countdown_remaining, 0);
        assert_eq!(machine.state(), CaptureState::Capturing);
        assert!(sink.stored.is_empty());
    }

    #[test]
    fn quota_advances_class_by_one_and_resets() {
        let (frame, mut sink) = (Frame::new(64, 64), MemorySink::default());
        let target = 4;
        let mut machine = machine(target);

        machine.command(Command::StartCapture, &mut sink);
        run_countdown(&mut machine, &frame, &mut sink, COUNTDOWN_FRAMES);
        for n in 0..target {
            let events = machine.tick(&frame, &one_face(), &mut sink);
            assert!(matches!(events[0], CaptureEvent::Saved { .. }));
            if n + 1 < target {
                assert_eq!(machine.session().countdown_remaining, INTER_CAPTURE_DELAY);
                run_countdown(&mut machine, &frame, &mut sink, INTER_CAPTURE_DELAY);
            }
        }

        assert_eq!(machine.session().current_class_index, 1);
        assert_eq!(machine.session().per_class_captured_count, 0);
        assert_eq!(machine.session().running_sample_index, 0);
        assert!(!machine.session().is_capturing);
        assert_eq!(machine.state(), CaptureState::Idle);
        assert_eq!(
            sink.stored,
            (0..target).map(|i| ("angry".to_string(), i)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn every_face_in_frame_is_saved() {
        let (frame, mut sink) = (Frame::new(128, 64), MemorySink::default());
        let mut machine = machine(50);
        let faces = vec![
            Detection::new(BoundingBox::new(0, 0, 40, 40), 0.9),
            Detection::new(BoundingBox::new(60, 10, 40, 40), 0.8),
            Detection::new(BoundingBox::new(500, 500, 40, 40), 0.7),
        ];

        machine.command(Command::StartCapture, &mut sink);
        run_countdown(&mut machine, &frame, &mut sink, COUNTDOWN_FRAMES);
        let events = machine.tick(&frame, &faces, &mut sink);

        assert_eq!(events.len(), 2, "off-frame box must be skipped");
        assert_eq!(machine.session().per_class_captured_count, 2);
        assert_eq!(machine.session().running_sample_index, 2);
    }

    #[test]
    fn failed_write_does_not_count() {
        let (frame, mut sink) = (Frame::new(64, 64), MemorySink::default());
        let mut machine = machine(50);
        sink.fail = true;

        machine.command(Command::StartCapture, &mut sink);
        run_countdown(&mut machine, &frame, &mut sink, COUNTDOWN_FRAMES);
        let events = machine.tick(&frame, &one_face(), &mut sink);

        assert!(matches!(events[0], CaptureEvent::SampleFailed { .. }));
        assert_eq!(machine.session().per_class_captured_count, 0);
        assert_eq!(machine.session().running_sample_index, 0);
        // nothing on disk, so the next frame tries again
        assert_eq!(machine.session().countdown_remaining, 0);
        sink.fail = false;
        let events = machine.tick(&frame, &one_face(), &mut sink);
        assert!(matches!(events[0], CaptureEvent::Saved { .. }));
        assert_eq!(machine.session().countdown_remaining, INTER_CAPTURE_DELAY);
    }

    #[test]
    fn off_frame_faces_do_not_rearm_delay() {
        let (frame, mut sink) = (Frame::new(64, 64), MemorySink::default());
        let mut machine = machine(50);
        let outside = [Detection::new(BoundingBox::new(200, 200, 30, 30), 1.)];

        machine.command(Command::StartCapture, &mut sink);
        run_countdown(&mut machine, &frame, &mut sink, COUNTDOWN_FRAMES);

        assert!(machine.tick(&frame, &outside, &mut sink).is_empty());
        assert_eq!(machine.session().countdown_remaining, 0);
        assert_eq!(machine.state(), CaptureState::Capturing);
    }

    #[test]
    fn cycling_classes_by_hand_is_not_completion() {
        let mut sink = MemorySink::default();
        let mut machine = machine(50);
        let classes = CaptureConfig::default().classes.len();

        let events: Vec<CaptureEvent> = (0..classes)
            .flat_map(|_| machine.command(Command::NextClass, &mut sink))
            .collect();

        assert_eq!(machine.session().current_class_index, 0);
        assert_eq!(events.len(), classes);
        assert!(!events.contains(&CaptureEvent::AllClassesCompleted));
    }

    #[test]
    fn start_is_refused_when_numbering_cannot_resume() {
        let mut sink = MemorySink {
            fail_begin: true,
            ..Default::default()
        };
        let mut machine = machine(50);

        let events = machine.command(Command::StartCapture, &mut sink);

        assert!(matches!(
            &events[..],
            [CaptureEvent::StartRefused { class, .. }] if class == "angry"
        ));
        assert_eq!(machine.state(), CaptureState::Idle);
        assert!(!machine.session().is_capturing);
    }

    #[test]
    fn wrapping_to_first_class_reports_all_completed() {
        let (frame, mut sink) = (Frame::new(64, 64), MemorySink::default());
        let config = CaptureConfig {
            target_per_class: 1,
            countdown_frames: 0,
            ..Default::default()
        };
        let mut machine =
            CaptureStateMachine::with_classes(vec!["happy".into(), "sad".into()], &config);

        let mut wrapped = false;
        for _ in 0..2 {
            machine.command(Command::StartCapture, &mut sink);
            assert_eq!(machine.state(), CaptureState::Capturing);
            let events = machine.tick(&frame, &one_face(), &mut sink);
            wrapped = events.contains(&CaptureEvent::AllClassesCompleted);
        }

        assert!(wrapped);
        assert_eq!(machine.current_class(), "happy");
        assert_eq!(machine.state(), CaptureState::Idle);
        assert_eq!(sink.begun, vec!["happy".to_string(), "sad".to_string()]);
    }

    #[test]
    fn next_class_only_from_idle() {
        let mut sink = MemorySink::default();
        let mut machine = machine(50);

        let events = machine.command(Command::NextClass, &mut sink);
        assert_eq!(
            events,
            vec![CaptureEvent::ClassChanged {
                class: "disgust".into()
            }]
        );

        machine.command(Command::StartCapture, &mut sink);
        let events = machine.command(Command::NextClass, &mut sink);
        assert_eq!(events, vec![CaptureEvent::Ignored(Command::NextClass)]);
        let events = machine.command(Command::StartCapture, &mut sink);
        assert_eq!(events, vec![CaptureEvent::Ignored(Command::StartCapture)]);
        assert_eq!(machine.current_class(), "disgust");
    }

    #[test]
    fn quit_is_terminal_from_any_state() {
        let (frame, mut sink) = (Frame::new(64, 64), MemorySink::default());
        let mut machine = machine(50);

        machine.command(Command::StartCapture, &mut sink);
        assert_eq!(machine.command(Command::Quit, &mut sink), vec![CaptureEvent::Quit]);
        assert!(machine.is_finished());
        assert!(machine.tick(&frame, &one_face(), &mut sink).is_empty());
        assert!(machine.command(Command::StartCapture, &mut sink).is_empty());
        assert!(!machine.session().is_capturing);
    }
}
