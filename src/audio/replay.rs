// Paced playback capture backend
//
// Stands in for a live input node: delivers fixed-size buffers to the tap at
// real-time cadence from either silence or a WAV recording. Once a
// recording runs out (and looping is off) the node keeps producing silence,
// like an open microphone in a quiet room.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::backend::{AudioCapture, AudioFormat, AudioFrame, AudioSessionConfig, TapHandler};
use super::file::AudioFile;

struct Tap {
    buffer_size: usize,
    handler: TapHandler,
}

type SharedTap = Arc<Mutex<Option<Tap>>>;

/// Where replayed samples come from
#[derive(Clone)]
pub enum ReplaySource {
    Silence(AudioFormat),
    Samples {
        format: AudioFormat,
        samples: Arc<Vec<i16>>,
        looping: bool,
    },
}

impl ReplaySource {
    fn format(&self) -> AudioFormat {
        match self {
            ReplaySource::Silence(format) => *format,
            ReplaySource::Samples { format, .. } => *format,
        }
    }
}

pub struct ReplayCapture {
    source: ReplaySource,
    session_active: bool,
    tap: SharedTap,
    stop_signal: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ReplayCapture {
    pub fn new(source: ReplaySource) -> Self {
        Self {
            source,
            session_active: false,
            tap: Arc::new(Mutex::new(None)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn silence(format: AudioFormat) -> Self {
        Self::new(ReplaySource::Silence(format))
    }

    pub fn from_file(file: AudioFile, looping: bool) -> Self {
        Self::new(ReplaySource::Samples {
            format: file.format(),
            samples: Arc::new(file.samples),
            looping,
        })
    }

    fn run(source: ReplaySource, tap: SharedTap, stop_signal: Arc<AtomicBool>) {
        let format = source.format();
        let channels = format.channels.max(1) as usize;
        let started = Instant::now();
        let mut cursor = 0usize;
        let mut delivered_frames = 0u64;

        while !stop_signal.load(Ordering::SeqCst) {
            let buffer_duration = {
                let mut guard = tap.lock().unwrap_or_else(PoisonError::into_inner);
                if guard.is_none() {
                    drop(guard);
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
                let Some(tap) = guard.as_mut() else {
                    continue;
                };

                let wanted = tap.buffer_size * channels;
                let samples = match &source {
                    ReplaySource::Silence(_) => vec![0i16; wanted],
                    ReplaySource::Samples {
                        samples, looping, ..
                    } => next_samples(samples, &mut cursor, wanted, *looping),
                };

                let timestamp_ms = delivered_frames * 1000 / format.sample_rate.max(1) as u64;
                delivered_frames += tap.buffer_size as u64;

                let frame = AudioFrame {
                    samples,
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                    timestamp_ms,
                };
                let duration = frame.duration();
                (tap.handler)(frame);
                duration
            };

            // Pace against the wall clock so slow handlers don't accumulate drift
            let due = started
                + Duration::from_millis(delivered_frames * 1000 / format.sample_rate.max(1) as u64);
            let now = Instant::now();
            if due > now {
                thread::sleep((due - now).min(buffer_duration));
            }
        }

        debug!("Replay worker stopped");
    }
}

/// Take `wanted` samples from `samples` starting at `cursor`, padding with silence
fn next_samples(samples: &[i16], cursor: &mut usize, wanted: usize, looping: bool) -> Vec<i16> {
    let mut out = Vec::with_capacity(wanted);

    while out.len() < wanted {
        if *cursor >= samples.len() {
            if looping && !samples.is_empty() {
                *cursor = 0;
            } else {
                out.resize(wanted, 0);
                break;
            }
        }

        let take = (wanted - out.len()).min(samples.len() - *cursor);
        out.extend_from_slice(&samples[*cursor..*cursor + take]);
        *cursor += take;
    }

    out
}

impl AudioCapture for ReplayCapture {
    fn name(&self) -> &str {
        match self.source {
            ReplaySource::Silence(_) => "replay (silence)",
            ReplaySource::Samples { .. } => "replay (wav)",
        }
    }

    fn activate(&mut self, config: &AudioSessionConfig) -> Result<()> {
        debug!(category = ?config.category, mode = ?config.mode, "Replay session activated");
        self.session_active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.session_active = false;
        Ok(())
    }

    fn input_format(&self) -> AudioFormat {
        self.source.format()
    }

    fn install_tap(&mut self, buffer_size: usize, handler: TapHandler) -> Result<()> {
        if buffer_size == 0 {
            bail!("Tap buffer size must be positive");
        }
        let mut tap = self.tap.lock().unwrap_or_else(PoisonError::into_inner);
        *tap = Some(Tap {
            buffer_size,
            handler,
        });
        Ok(())
    }

    fn remove_tap(&mut self) {
        let mut tap = self.tap.lock().unwrap_or_else(PoisonError::into_inner);
        *tap = None;
    }

    fn start_engine(&mut self) -> Result<()> {
        if self.worker.is_some() {
            bail!("Already capturing");
        }
        if !self.session_active {
            bail!("Audio session is not active");
        }

        let format = self.source.format();
        if format.sample_rate == 0 {
            bail!("Invalid input format: 0 Hz");
        }

        info!(
            "Starting replay capture ({}Hz, {} channels)",
            format.sample_rate, format.channels
        );

        self.stop_signal.store(false, Ordering::SeqCst);
        let source = self.source.clone();
        let tap = Arc::clone(&self.tap);
        let stop_signal = Arc::clone(&self.stop_signal);

        let handle = thread::Builder::new()
            .name("replay-capture".to_string())
            .spawn(move || Self::run(source, tap, stop_signal))?;

        self.worker = Some(handle);
        Ok(())
    }

    fn stop_engine(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.stop_signal.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            warn!("Replay capture worker panicked");
        }
        info!("Replay capture stopped");
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ReplayCapture {
    fn drop(&mut self) {
        self.stop_engine();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_samples_pads_with_silence_when_exhausted() {
        let samples = [1, 2, 3];
        let mut cursor = 0;

        assert_eq!(next_samples(&samples, &mut cursor, 2, false), vec![1, 2]);
        assert_eq!(next_samples(&samples, &mut cursor, 2, false), vec![3, 0]);
        assert_eq!(next_samples(&samples, &mut cursor, 2, false), vec![0, 0]);
    }

    #[test]
    fn next_samples_wraps_when_looping() {
        let samples = [1, 2, 3];
        let mut cursor = 2;

        assert_eq!(next_samples(&samples, &mut cursor, 4, true), vec![3, 1, 2, 3]);
        assert_eq!(cursor, 3);
    }

    #[test]
    fn start_engine_requires_active_session() {
        let mut capture = ReplayCapture::silence(AudioFormat {
            sample_rate: 16000,
            channels: 1,
        });

        assert!(capture.start_engine().is_err());
        assert!(!capture.is_running());
    }
}
