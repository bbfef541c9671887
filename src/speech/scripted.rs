// Scripted speech recognizer
//
// Plays back a fixed sequence of hypotheses at a steady pace while draining
// whatever audio is appended, so the whole session lifecycle can run
// without a speech engine (demo mode, tests).

use anyhow::{anyhow, bail, Context, Result};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{
    AvailabilityObserver, RecognitionError, RecognitionRequest, RecognitionTask, ResultSink,
    SpeechRecognizer,
};

/// One scripted recognizer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Partial(String),
    Final(String),
    Fail(RecognitionError),
}

/// Sequence of recognizer callbacks
///
/// Parsed from whitespace-separated tokens: `42` is a partial hypothesis,
/// `42!` a final one, `<error>` a backend failure and `<nospeech>` a
/// no-speech failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
}

impl FromStr for Script {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let steps = s
            .split_whitespace()
            .map(|token| match token {
                "<error>" => Ok(ScriptStep::Fail(RecognitionError::Backend(
                    "scripted failure".to_string(),
                ))),
                "<nospeech>" => Ok(ScriptStep::Fail(RecognitionError::NoSpeech)),
                "!" => Err(anyhow!("Final marker without a transcript")),
                _ => match token.strip_suffix('!') {
                    Some(text) => Ok(ScriptStep::Final(text.to_string())),
                    None => Ok(ScriptStep::Partial(token.to_string())),
                },
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { steps })
    }
}

struct AvailabilityState {
    available: AtomicBool,
    observer: Mutex<Option<AvailabilityObserver>>,
}

/// Flips a scripted recognizer's availability from outside
#[derive(Clone)]
pub struct AvailabilitySwitch {
    state: Arc<AvailabilityState>,
}

impl AvailabilitySwitch {
    fn new(available: bool) -> Self {
        Self {
            state: Arc::new(AvailabilityState {
                available: AtomicBool::new(available),
                observer: Mutex::new(None),
            }),
        }
    }

    /// Set availability, notifying the observer on change
    pub fn set(&self, available: bool) {
        let previous = self.state.available.swap(available, Ordering::SeqCst);
        if previous == available {
            return;
        }

        let observer = self
            .state
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer.notify(available);
        }
    }

    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    fn observe(&self, observer: AvailabilityObserver) {
        *self
            .state
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }
}

pub struct ScriptedRecognizer {
    script: Script,
    step_delay: Duration,
    on_device: bool,
    availability: AvailabilitySwitch,
}

impl ScriptedRecognizer {
    pub fn new(script: Script, step_delay: Duration) -> Self {
        Self {
            script,
            step_delay,
            on_device: true,
            availability: AvailabilitySwitch::new(true),
        }
    }

    pub fn with_on_device(mut self, on_device: bool) -> Self {
        self.on_device = on_device;
        self
    }

    pub fn availability_switch(&self) -> AvailabilitySwitch {
        self.availability.clone()
    }

    async fn play(
        script: Script,
        step_delay: Duration,
        mut request: RecognitionRequest,
        results: ResultSink,
    ) {
        let mut steps = script.steps.into_iter();
        let mut last_transcript: Option<String> = None;
        let mut script_done = false;
        let mut buffers = 0usize;

        let tick = sleep(step_delay);
        tokio::pin!(tick);

        loop {
            tokio::select! {
                frame = request.next_buffer() => match frame {
                    Some(_) => buffers += 1,
                    None => {
                        // Audio ended: settle on the last hypothesis
                        debug!(buffers, "Scripted recognizer reached end of audio");
                        if let Some(text) = last_transcript.take() {
                            results.finish(text);
                        }
                        return;
                    }
                },
                _ = &mut tick, if !script_done => {
                    match steps.next() {
                        Some(ScriptStep::Partial(text)) => {
                            if request.should_report_partial_results {
                                results.partial(text.clone());
                            }
                            last_transcript = Some(text);
                        }
                        Some(ScriptStep::Final(text)) => {
                            results.finish(text);
                            return;
                        }
                        Some(ScriptStep::Fail(error)) => {
                            results.fail(error);
                            return;
                        }
                        None => script_done = true,
                    }
                    tick.as_mut().reset(Instant::now() + step_delay);
                }
            }
        }
    }
}

struct ScriptedTask {
    handle: JoinHandle<()>,
}

impl RecognitionTask for ScriptedTask {
    fn cancel(&mut self) {
        self.handle.abort();
    }
}

impl Drop for ScriptedTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    fn supports_on_device_recognition(&self) -> bool {
        self.on_device
    }

    fn set_availability_observer(&mut self, observer: AvailabilityObserver) {
        self.availability.observe(observer);
    }

    fn recognition_task(
        &mut self,
        request: RecognitionRequest,
        results: ResultSink,
    ) -> Result<Box<dyn RecognitionTask>> {
        if !self.is_available() {
            bail!("Scripted recognizer is unavailable");
        }

        let runtime = tokio::runtime::Handle::try_current()
            .context("Scripted recognizer needs a tokio runtime")?;

        info!(
            steps = self.script.steps.len(),
            step_delay_ms = self.step_delay.as_millis() as u64,
            "Starting scripted recognition"
        );

        let handle = runtime.spawn(Self::play(
            self.script.clone(),
            self.step_delay,
            request,
            results,
        ));

        Ok(Box::new(ScriptedTask { handle }))
    }
}
