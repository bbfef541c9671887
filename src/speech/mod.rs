//! Speech recognizer seam
//!
//! A recognizer accepts a stream of captured buffers through a
//! [`RecognitionRequest`], and reports hypotheses through a [`ResultSink`]
//! from whatever thread it runs on. Availability changes are pushed to an
//! [`AvailabilityObserver`].
//!
//! - `ScriptedRecognizer`: plays back a fixed script (all platforms)
//! - `VoskRecognizer`: offline Vosk model (feature `vosk`)

pub mod factory;
pub mod numbers;
pub mod scripted;

#[cfg(feature = "vosk")]
pub mod vosk;

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::AudioFrame;

pub use factory::{RecognizerBackend, RecognizerConfig, RecognizerFactory};
pub use scripted::{AvailabilitySwitch, Script, ScriptStep, ScriptedRecognizer};

#[cfg(feature = "vosk")]
pub use self::vosk::VoskRecognizer;

/// Best current hypothesis for the utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    /// No further refinement of this transcript will follow
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    #[error("recognition cancelled")]
    Cancelled,
    #[error("no speech detected")]
    NoSpeech,
    #[error("recognizer failed: {0}")]
    Backend(String),
}

/// One callback from a running recognition task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionUpdate {
    Result(RecognitionResult),
    Failed(RecognitionError),
}

/// Receives updates from a recognition task
///
/// Cheap to clone; may be called from any thread.
#[derive(Clone)]
pub struct ResultSink {
    deliver: Arc<dyn Fn(RecognitionUpdate) + Send + Sync>,
}

impl ResultSink {
    pub fn new(deliver: impl Fn(RecognitionUpdate) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn deliver(&self, update: RecognitionUpdate) {
        (self.deliver)(update)
    }

    pub fn partial(&self, transcript: impl Into<String>) {
        self.deliver(RecognitionUpdate::Result(RecognitionResult {
            transcript: transcript.into(),
            is_final: false,
        }));
    }

    pub fn finish(&self, transcript: impl Into<String>) {
        self.deliver(RecognitionUpdate::Result(RecognitionResult {
            transcript: transcript.into(),
            is_final: true,
        }));
    }

    pub fn fail(&self, error: RecognitionError) {
        self.deliver(RecognitionUpdate::Failed(error));
    }
}

/// Receives recognizer availability changes
#[derive(Clone)]
pub struct AvailabilityObserver {
    notify: Arc<dyn Fn(bool) + Send + Sync>,
}

impl AvailabilityObserver {
    pub fn new(notify: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Self {
            notify: Arc::new(notify),
        }
    }

    pub fn notify(&self, available: bool) {
        (self.notify)(available)
    }
}

/// Producer side of a streaming recognition request
///
/// Dropping every appender ends the audio.
#[derive(Clone)]
pub struct BufferAppender {
    tx: mpsc::UnboundedSender<AudioFrame>,
    appended: Arc<AtomicUsize>,
}

impl BufferAppender {
    /// Append a captured buffer. Returns false once the request is gone.
    pub fn append(&self, frame: AudioFrame) -> bool {
        if self.tx.send(frame).is_err() {
            return false;
        }
        self.appended.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Number of buffers appended so far
    pub fn appended(&self) -> usize {
        self.appended.load(Ordering::Relaxed)
    }

    pub(crate) fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.appended)
    }
}

/// Consumer side of a streaming recognition request, handed to the recognizer
pub struct RecognitionRequest {
    rx: mpsc::UnboundedReceiver<AudioFrame>,
    pub should_report_partial_results: bool,
}

impl RecognitionRequest {
    /// Next appended buffer, or `None` once the audio has ended
    pub async fn next_buffer(&mut self) -> Option<AudioFrame> {
        self.rx.recv().await
    }

    /// Blocking variant for recognizers running on their own thread
    pub fn blocking_next_buffer(&mut self) -> Option<AudioFrame> {
        self.rx.blocking_recv()
    }

    /// Buffer if one is ready; `Err(true)` once the audio has ended
    pub fn try_next_buffer(&mut self) -> Result<AudioFrame, bool> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(frame),
            Err(mpsc::error::TryRecvError::Empty) => Err(false),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(true),
        }
    }
}

/// Create a streaming request: the appender feeds the tap, the request feeds the recognizer
pub fn audio_buffer_request(report_partial_results: bool) -> (BufferAppender, RecognitionRequest) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        BufferAppender {
            tx,
            appended: Arc::new(AtomicUsize::new(0)),
        },
        RecognitionRequest {
            rx,
            should_report_partial_results: report_partial_results,
        },
    )
}

/// A running recognition task
pub trait RecognitionTask: Send {
    /// Stop recognizing. Further updates may still arrive and must be tolerated.
    fn cancel(&mut self);
}

/// Speech recognition service
pub trait SpeechRecognizer: Send {
    /// Recognizer name for logging
    fn name(&self) -> &str;

    /// Whether recognition can start right now
    fn is_available(&self) -> bool;

    fn supports_on_device_recognition(&self) -> bool;

    /// Register the observer for availability changes, replacing any previous one
    fn set_availability_observer(&mut self, observer: AvailabilityObserver);

    /// Start recognizing the buffers appended to `request`
    fn recognition_task(
        &mut self,
        request: RecognitionRequest,
        results: ResultSink,
    ) -> Result<Box<dyn RecognitionTask>>;
}
