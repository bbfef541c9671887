//! Offline speech recognition using Vosk.
//!
//! Requires a Vosk model on disk. Download models from
//! https://alphacephei.com/vosk/models and point `recognizer.model_path` at
//! the extracted directory.

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};
use ::vosk::{Model, Recognizer};

use super::numbers::digits_for_number_words;
use super::{
    AvailabilityObserver, RecognitionError, RecognitionRequest, RecognitionTask, ResultSink,
    SpeechRecognizer,
};

pub struct VoskRecognizer {
    model_path: PathBuf,
    observer: Option<AvailabilityObserver>,
}

impl VoskRecognizer {
    pub fn new(model_path: PathBuf) -> Result<Self> {
        if !model_path.exists() {
            return Err(anyhow!(
                "Vosk model not found at: {}\n\
                 Download a model from https://alphacephei.com/vosk/models\n\
                 and set recognizer.model_path",
                model_path.display()
            ));
        }

        info!("Vosk recognizer using model at {}", model_path.display());

        Ok(Self {
            model_path,
            observer: None,
        })
    }

    fn run_recognition(
        model_path: PathBuf,
        mut request: RecognitionRequest,
        results: ResultSink,
        cancelled: Arc<AtomicBool>,
    ) -> Result<()> {
        let model = Model::new(model_path.to_string_lossy())
            .ok_or_else(|| anyhow!("Failed to load Vosk model from {}", model_path.display()))?;

        // The recognizer is sized to the first buffer's rate
        let Some(first) = request.blocking_next_buffer() else {
            return Ok(());
        };
        let mut recognizer = Recognizer::new(&model, first.sample_rate as f32)
            .ok_or_else(|| anyhow!("Failed to create Vosk recognizer"))?;
        recognizer.set_partial_words(true);

        let mut last_partial = String::new();
        let mut next = Some(first);

        while let Some(frame) = next {
            if cancelled.load(Ordering::SeqCst) {
                return Ok(());
            }

            let mono = frame.to_mono();
            recognizer
                .accept_waveform(&mono.samples)
                .map_err(|e| anyhow!("Vosk rejected an audio buffer: {:?}", e))?;

            if request.should_report_partial_results {
                let partial = recognizer.partial_result().partial;
                if !partial.is_empty() && partial != last_partial {
                    last_partial = partial.to_string();
                    results.partial(digits_for_number_words(&last_partial));
                }
            }

            next = request.blocking_next_buffer();
        }

        if cancelled.load(Ordering::SeqCst) {
            return Ok(());
        }

        let text = recognizer
            .final_result()
            .single()
            .map(|result| digits_for_number_words(result.text))
            .unwrap_or_default();

        if text.is_empty() {
            results.fail(RecognitionError::NoSpeech);
        } else {
            results.finish(text);
        }

        Ok(())
    }
}

struct VoskTask {
    cancelled: Arc<AtomicBool>,
}

impl RecognitionTask for VoskTask {
    fn cancel(&mut self) {
        // The worker exits once the request's audio ends
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl SpeechRecognizer for VoskRecognizer {
    fn name(&self) -> &str {
        "vosk"
    }

    fn is_available(&self) -> bool {
        self.model_path.exists()
    }

    fn supports_on_device_recognition(&self) -> bool {
        true
    }

    fn set_availability_observer(&mut self, observer: AvailabilityObserver) {
        // A local model never changes availability while running
        self.observer = Some(observer);
    }

    fn recognition_task(
        &mut self,
        request: RecognitionRequest,
        results: ResultSink,
    ) -> Result<Box<dyn RecognitionTask>> {
        if !self.is_available() {
            if let Some(observer) = &self.observer {
                observer.notify(false);
            }
            bail!("Vosk model disappeared from {}", self.model_path.display());
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let model_path = self.model_path.clone();
        let worker_cancelled = Arc::clone(&cancelled);

        thread::Builder::new()
            .name("vosk-recognition".to_string())
            .spawn(move || {
                let failure_sink = results.clone();
                if let Err(e) =
                    Self::run_recognition(model_path, request, results, worker_cancelled)
                {
                    error!("Speech recognition error: {:#}", e);
                    failure_sink.fail(RecognitionError::Backend(e.to_string()));
                }
                debug!("Vosk recognition worker finished");
            })?;

        Ok(Box::new(VoskTask { cancelled }))
    }
}
