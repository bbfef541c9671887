// Test doubles for the capture and recognizer seams
//
// Both doubles are driven from the test through a cloneable control handle that
// shares their state.

#![allow(dead_code)]

use anyhow::{bail, Result};
use speech_sound::audio::{AudioCapture, AudioFormat, AudioFrame, AudioSessionConfig, TapHandler};
use speech_sound::speech::{
    AvailabilityObserver, RecognitionError, RecognitionRequest, RecognitionTask, ResultSink,
    SpeechRecognizer,
};
use speech_sound::{SessionConfig, SessionController, SessionEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

pub const FORMAT: AudioFormat = AudioFormat {
    sample_rate: 16000,
    channels: 1,
};

#[derive(Default)]
struct CaptureState {
    calls: Vec<&'static str>,
    tap: Option<TapHandler>,
    running: bool,
    fail_activate: bool,
    fail_tap: bool,
    fail_engine: bool,
    engine_delay: Duration,
}

/// Records every call; can be told to fail activation, tap installation or engine start
pub struct FakeCapture {
    state: Arc<Mutex<CaptureState>>,
}

#[derive(Clone)]
pub struct CaptureControl {
    state: Arc<Mutex<CaptureState>>,
}

impl FakeCapture {
    pub fn new() -> (Self, CaptureControl) {
        let state = Arc::new(Mutex::new(CaptureState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            CaptureControl { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap()
    }
}

impl AudioCapture for FakeCapture {
    fn name(&self) -> &str {
        "fake"
    }

    fn activate(&mut self, _config: &AudioSessionConfig) -> Result<()> {
        let mut state = self.state();
        state.calls.push("activate");
        if state.fail_activate {
            bail!("activation refused");
        }
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.state().calls.push("deactivate");
        Ok(())
    }

    fn input_format(&self) -> AudioFormat {
        FORMAT
    }

    fn install_tap(&mut self, _buffer_size: usize, handler: TapHandler) -> Result<()> {
        let mut state = self.state();
        state.calls.push("install_tap");
        if state.fail_tap {
            bail!("tap refused");
        }
        state.tap = Some(handler);
        Ok(())
    }

    fn remove_tap(&mut self) {
        let mut state = self.state();
        state.calls.push("remove_tap");
        state.tap = None;
    }

    fn prepare(&mut self) {
        self.state().calls.push("prepare");
    }

    fn start_engine(&mut self) -> Result<()> {
        let delay = {
            let mut state = self.state();
            state.calls.push("start_engine");
            if state.fail_engine {
                bail!("engine refused");
            }
            state.engine_delay
        };

        // A slow device holds the calling thread, like a real engine start
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.state().running = true;
        Ok(())
    }

    fn stop_engine(&mut self) {
        let mut state = self.state();
        state.calls.push("stop_engine");
        state.running = false;
    }

    fn is_running(&self) -> bool {
        self.state().running
    }
}

impl CaptureControl {
    fn state(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    pub fn has_tap(&self) -> bool {
        self.state().tap.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn fail_activate(&self, fail: bool) {
        self.state().fail_activate = fail;
    }

    pub fn fail_tap(&self, fail: bool) {
        self.state().fail_tap = fail;
    }

    pub fn fail_engine(&self, fail: bool) {
        self.state().fail_engine = fail;
    }

    pub fn engine_delay(&self, delay: Duration) {
        self.state().engine_delay = delay;
    }

    /// Deliver one captured buffer through the installed tap.
    /// Returns false when no tap is installed.
    pub fn push_buffer(&self, frames: usize) -> bool {
        let mut state = self.state();
        match state.tap.as_mut() {
            Some(tap) => {
                tap(AudioFrame {
                    samples: vec![0; frames],
                    sample_rate: FORMAT.sample_rate,
                    channels: FORMAT.channels,
                    timestamp_ms: 0,
                });
                true
            }
            None => false,
        }
    }
}

struct RecognizerState {
    available: bool,
    on_device: bool,
    observer: Option<AvailabilityObserver>,
    sink: Option<ResultSink>,
    request: Option<RecognitionRequest>,
    tasks_started: usize,
    cancellations: usize,
    fail_task: bool,
}

/// Starts tasks that only report what the test tells them to
pub struct ManualRecognizer {
    state: Arc<Mutex<RecognizerState>>,
}

#[derive(Clone)]
pub struct RecognizerControl {
    state: Arc<Mutex<RecognizerState>>,
}

struct ManualTask {
    state: Arc<Mutex<RecognizerState>>,
}

impl RecognitionTask for ManualTask {
    fn cancel(&mut self) {
        self.state.lock().unwrap().cancellations += 1;
    }
}

impl ManualRecognizer {
    pub fn new() -> (Self, RecognizerControl) {
        let state = Arc::new(Mutex::new(RecognizerState {
            available: true,
            on_device: true,
            observer: None,
            sink: None,
            request: None,
            tasks_started: 0,
            cancellations: 0,
            fail_task: false,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            RecognizerControl { state },
        )
    }
}

impl SpeechRecognizer for ManualRecognizer {
    fn name(&self) -> &str {
        "manual"
    }

    fn is_available(&self) -> bool {
        self.state.lock().unwrap().available
    }

    fn supports_on_device_recognition(&self) -> bool {
        self.state.lock().unwrap().on_device
    }

    fn set_availability_observer(&mut self, observer: AvailabilityObserver) {
        self.state.lock().unwrap().observer = Some(observer);
    }

    fn recognition_task(
        &mut self,
        request: RecognitionRequest,
        results: ResultSink,
    ) -> Result<Box<dyn RecognitionTask>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_task {
            bail!("task refused");
        }
        state.tasks_started += 1;
        state.sink = Some(results);
        state.request = Some(request);
        Ok(Box::new(ManualTask {
            state: Arc::clone(&self.state),
        }))
    }
}

impl RecognizerControl {
    fn state(&self) -> MutexGuard<'_, RecognizerState> {
        self.state.lock().unwrap()
    }

    /// Sink of the most recently started task
    pub fn sink(&self) -> ResultSink {
        self.state().sink.clone().expect("no recognition task started")
    }

    pub fn partial(&self, text: &str) {
        self.sink().partial(text);
    }

    pub fn finish(&self, text: &str) {
        self.sink().finish(text);
    }

    pub fn fail(&self, error: RecognitionError) {
        self.sink().fail(error);
    }

    /// Flip availability and notify the observer, like a platform recognizer would
    pub fn set_available(&self, available: bool) {
        let observer = {
            let mut state = self.state();
            state.available = available;
            state.observer.clone()
        };
        if let Some(observer) = observer {
            observer.notify(available);
        }
    }

    /// Change availability without notifying
    pub fn set_available_silently(&self, available: bool) {
        self.state().available = available;
    }

    pub fn fail_task(&self, fail: bool) {
        self.state().fail_task = fail;
    }

    pub fn tasks_started(&self) -> usize {
        self.state().tasks_started
    }

    pub fn cancellations(&self) -> usize {
        self.state().cancellations
    }

    /// Drain appended buffers; `None` once the audio has ended
    pub fn drain_buffers(&self) -> Option<usize> {
        let mut state = self.state();
        let request = state.request.as_mut()?;
        let mut drained = 0;
        loop {
            match request.try_next_buffer() {
                Ok(_) => drained += 1,
                Err(false) => return Some(drained),
                Err(true) => return if drained > 0 { Some(drained) } else { None },
            }
        }
    }
}

pub struct Harness {
    pub controller: SessionController,
    pub capture: CaptureControl,
    pub recognizer: RecognizerControl,
    pub events: broadcast::Receiver<SessionEvent>,
}

/// Controller wired to fresh doubles, 3 s inactivity timeout
pub fn harness() -> Harness {
    harness_with(SessionConfig::default())
}

pub fn harness_with(config: SessionConfig) -> Harness {
    let (capture, capture_control) = FakeCapture::new();
    let (recognizer, recognizer_control) = ManualRecognizer::new();
    let controller = SessionController::spawn(Box::new(capture), Box::new(recognizer), config);
    let events = controller.subscribe();

    Harness {
        controller,
        capture: capture_control,
        recognizer: recognizer_control,
        events,
    }
}

/// Events received so far, without waiting
pub fn drain_events(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
