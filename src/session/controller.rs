use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::event::{EndReason, SessionEvent, SessionSnapshot, SessionState, StartFailure};
use super::stats::SessionStats;
use super::timer::InactivityTimer;
use crate::audio::lease::{self, AudioSessionLease, SharedCapture};
use crate::audio::{AudioCapture, TapHandler};
use crate::speech::{
    audio_buffer_request, AvailabilityObserver, RecognitionTask, RecognitionUpdate, ResultSink,
    SpeechRecognizer,
};

/// Everything the driver reacts to, in arrival order
enum Message {
    Start,
    Stop,
    Flush(oneshot::Sender<()>),
    Shutdown(Option<oneshot::Sender<()>>),
    Recognition {
        generation: u64,
        update: RecognitionUpdate,
    },
    Availability(bool),
    TimerExpired {
        generation: u64,
        arm_id: u64,
    },
}

/// Handle to a speech-recognition session manager
///
/// Commands return immediately; the driver task applies them together with
/// recognizer callbacks and timer expiries, one at a time, in arrival order.
/// Observe results through [`SessionController::watch`] and
/// [`SessionController::subscribe`].
pub struct SessionController {
    tx: mpsc::UnboundedSender<Message>,
    snapshot: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Spawn the driver task. Must be called inside a tokio runtime.
    pub fn spawn(
        capture: Box<dyn AudioCapture>,
        mut recognizer: Box<dyn SpeechRecognizer>,
        config: SessionConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let availability_tx = tx.clone();
        recognizer.set_availability_observer(AvailabilityObserver::new(move |available| {
            let _ = availability_tx.send(Message::Availability(available));
        }));

        info!(
            capture = capture.name(),
            recognizer = recognizer.name(),
            inactivity_timeout_ms = config.inactivity_timeout_ms,
            "Session controller ready"
        );

        let driver = Driver {
            timer: InactivityTimer::new(config.inactivity_timeout()),
            config,
            capture: lease::shared(capture),
            recognizer,
            tx: tx.clone(),
            snapshot: snapshot_tx,
            events: events.clone(),
            session: None,
            next_generation: 0,
        };
        tokio::spawn(driver.run(rx));

        Self {
            tx,
            snapshot,
            events,
        }
    }

    /// Begin a recognition session. Ignored while one is active.
    pub fn start(&self) {
        self.send(Message::Start);
    }

    /// End the active session, if any
    pub fn stop(&self) {
        self.send(Message::Stop);
    }

    pub fn recognized_text(&self) -> Option<String> {
        self.snapshot.borrow().recognized_text.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.snapshot.borrow().is_processing
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Observable fields; notified whenever one of them changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until everything queued before this call has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// End any active session and stop the driver
    pub async fn shutdown(self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Shutdown(Some(done_tx))).is_ok() {
            let _ = done_rx.await;
        }
    }

    fn send(&self, message: Message) {
        if self.tx.send(message).is_err() {
            warn!("Session driver has stopped; command dropped");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown(None));
    }
}

/// Resources owned by one recognition attempt
struct ActiveSession {
    id: Uuid,
    generation: u64,
    started_at: DateTime<Utc>,
    lease: AudioSessionLease,
    task: Box<dyn RecognitionTask>,
    buffers: Arc<AtomicUsize>,
    transcript_updates: usize,
}

impl ActiveSession {
    /// Cancel recognition and give the audio session back, without stats.
    /// Used when the session never got as far as `SessionStarted`.
    fn abandon(self) {
        let ActiveSession { lease, mut task, .. } = self;
        task.cancel();
        lease.release();
    }

    fn teardown(self, reason: EndReason) -> SessionStats {
        let ActiveSession {
            id,
            started_at,
            lease,
            mut task,
            buffers,
            transcript_updates,
            ..
        } = self;

        task.cancel();
        // Stops the engine and removes the tap, which drops the last appender
        lease.release();

        let duration = Utc::now().signed_duration_since(started_at);
        SessionStats {
            session_id: id,
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            transcript_updates,
            buffers_appended: buffers.load(Ordering::Relaxed),
            end_reason: reason,
        }
    }
}

struct Driver {
    config: SessionConfig,
    capture: SharedCapture,
    recognizer: Box<dyn SpeechRecognizer>,
    tx: mpsc::UnboundedSender<Message>,
    snapshot: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    timer: InactivityTimer,
    session: Option<ActiveSession>,
    next_generation: u64,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Start => self.start_session(),
                Message::Stop => self.end_session(EndReason::Requested),
                Message::Flush(done) => {
                    let _ = done.send(());
                }
                Message::Shutdown(done) => {
                    self.end_session(EndReason::Shutdown);
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    break;
                }
                Message::Recognition { generation, update } => {
                    self.on_recognition(generation, update)
                }
                Message::Availability(available) => self.on_availability(available),
                Message::TimerExpired { generation, arm_id } => {
                    self.on_timer_expired(generation, arm_id)
                }
            }
        }

        debug!("Session driver stopped");
    }

    fn start_session(&mut self) {
        if let Some(session) = &self.session {
            warn!(session_id = %session.id, "Recognition already started");
            return;
        }

        let acquired =
            blocking(|| AudioSessionLease::acquire(Arc::clone(&self.capture), &self.config.audio));
        let lease = match acquired {
            Ok(lease) => lease,
            Err(e) => {
                error!("{:#}", e);
                self.start_failed(StartFailure::AudioSession, format!("{:#}", e));
                return;
            }
        };

        info!(
            recognizer = self.recognizer.name(),
            "Supports on-device recognition: {}",
            self.recognizer.supports_on_device_recognition()
        );

        if !self.recognizer.is_available() {
            warn!("Speech recognizer is unavailable; not starting");
            blocking(|| drop(lease));
            self.set_text(Some(self.config.unavailable_text.clone()));
            self.start_failed(
                StartFailure::RecognizerUnavailable,
                "speech recognizer is unavailable".to_string(),
            );
            return;
        }

        self.next_generation += 1;
        let generation = self.next_generation;

        let (appender, request) = audio_buffer_request(self.config.report_partial_results);
        let buffers = appender.counter();
        let tap: TapHandler = Box::new(move |frame| {
            appender.append(frame);
        });

        let format = lease.capture().input_format();
        let installed = lease.capture().install_tap(self.config.buffer_size, tap);
        if let Err(e) = installed {
            error!("Couldn't install input tap: {:#}", e);
            blocking(|| drop(lease));
            self.start_failed(StartFailure::Tap, format!("{:#}", e));
            return;
        }

        let results_tx = self.tx.clone();
        let results = ResultSink::new(move |update| {
            let _ = results_tx.send(Message::Recognition { generation, update });
        });

        let task = match self.recognizer.recognition_task(request, results) {
            Ok(task) => task,
            Err(e) => {
                error!("Couldn't start recognition task: {:#}", e);
                blocking(|| drop(lease));
                self.start_failed(StartFailure::Recognizer, format!("{:#}", e));
                return;
            }
        };

        let session = ActiveSession {
            id: Uuid::new_v4(),
            generation,
            started_at: Utc::now(),
            lease,
            task,
            buffers,
            transcript_updates: 0,
        };
        let session_id = session.id;
        let started_at = session.started_at;

        let engine = blocking(|| {
            let mut capture = session.lease.capture();
            capture.prepare();
            capture.start_engine()
        });

        if let Err(e) = engine {
            error!(%session_id, "Couldn't start audio engine: {:#}", e);
            blocking(|| session.abandon());
            self.start_failed(StartFailure::Engine, format!("{:#}", e));
            return;
        }
        self.session = Some(session);

        self.snapshot.send_modify(|s| {
            s.state = SessionState::Active;
            s.is_processing = true;
        });
        self.arm_timer(generation);

        info!(
            %session_id,
            generation,
            sample_rate = format.sample_rate,
            channels = format.channels,
            buffer_size = self.config.buffer_size,
            "Recognition session started"
        );
        self.emit(SessionEvent::SessionStarted {
            session_id,
            at: started_at,
        });
    }

    fn end_session(&mut self, reason: EndReason) {
        let Some(session) = self.session.take() else {
            debug!(?reason, "No active session to stop");
            return;
        };

        self.snapshot.send_modify(|s| s.state = SessionState::Stopping);
        self.timer.disarm();

        let stats = blocking(|| session.teardown(reason));

        self.snapshot.send_modify(|s| {
            s.state = SessionState::Idle;
            s.is_processing = false;
        });

        info!(
            session_id = %stats.session_id,
            ?reason,
            duration_secs = stats.duration_secs,
            transcript_updates = stats.transcript_updates,
            buffers_appended = stats.buffers_appended,
            "Recognition session ended"
        );
        self.emit(SessionEvent::SessionEnded { stats });
    }

    fn on_recognition(&mut self, generation: u64, update: RecognitionUpdate) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.generation == generation)
        else {
            debug!(generation, "Ignoring callback from a finished recognition task");
            return;
        };

        session.transcript_updates += 1;
        let session_id = session.id;

        let (text, is_final, ending) = match update {
            RecognitionUpdate::Result(result) => {
                let is_final = result.is_final;
                let ending = is_final.then_some(EndReason::Final);
                (Some(result.transcript), is_final, ending)
            }
            RecognitionUpdate::Failed(err) => {
                warn!(%session_id, "Recognition failed: {}", err);
                (None, false, Some(EndReason::Error))
            }
        };

        debug!(%session_id, ?text, is_final, "Transcript updated");
        self.set_text(text.clone());
        self.emit(SessionEvent::TranscriptUpdated {
            session_id,
            text,
            is_final,
            at: Utc::now(),
        });

        self.arm_timer(generation);

        if let Some(reason) = ending {
            self.end_session(reason);
        }
    }

    fn on_availability(&mut self, available: bool) {
        let changed = SessionEvent::AvailabilityChanged {
            available,
            at: Utc::now(),
        };

        if available {
            info!("Speech recognition available");
            self.emit(changed);
            return;
        }

        let Some(session) = &self.session else {
            info!("Speech recognition unavailable (idle)");
            self.emit(changed);
            return;
        };

        // Text first, so subscribers reading it on this event see the sentinel
        warn!(session_id = %session.id, "Speech recognition became unavailable");
        self.set_text(Some(self.config.unavailable_text.clone()));
        self.emit(changed);
        self.end_session(EndReason::Unavailable);
    }

    fn on_timer_expired(&mut self, generation: u64, arm_id: u64) {
        let live = self
            .session
            .as_ref()
            .is_some_and(|session| session.generation == generation)
            && self.timer.is_current(arm_id);
        if !live {
            debug!(generation, arm_id, "Ignoring stale inactivity expiry");
            return;
        }

        info!(
            timeout_ms = self.timer.duration().as_millis() as u64,
            "No speech before the inactivity timeout"
        );
        self.end_session(EndReason::Inactivity);
    }

    fn arm_timer(&mut self, generation: u64) {
        let tx = self.tx.clone();
        self.timer.arm(move |arm_id| {
            let _ = tx.send(Message::TimerExpired { generation, arm_id });
        });
    }

    fn start_failed(&self, reason: StartFailure, detail: String) {
        self.emit(SessionEvent::StartFailed {
            reason,
            detail,
            at: Utc::now(),
        });
    }

    fn set_text(&self, text: Option<String>) {
        self.snapshot.send_if_modified(|s| {
            if s.recognized_text == text {
                return false;
            }
            s.recognized_text = text;
            true
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Run device work that may block (engine start and stop, session
/// activation) without stalling other tasks on a multi-threaded runtime.
/// A current-thread runtime has no other worker to hand off to, so the
/// work runs inline there.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
