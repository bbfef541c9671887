// Microphone capture backend using cpal
//
// The cpal stream is not Send, so it is built and kept alive on a dedicated
// thread until the engine is stopped.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::backend::{AudioCapture, AudioFormat, AudioFrame, AudioSessionConfig, TapHandler};

struct Tap {
    buffer_size: usize,
    handler: TapHandler,
}

type SharedTap = Arc<Mutex<Option<Tap>>>;

/// Re-chunks arbitrary callback sizes into tap-sized buffers
struct Chunker {
    format: AudioFormat,
    pending: Vec<i16>,
    started: Instant,
}

impl Chunker {
    fn push(&mut self, samples: impl Iterator<Item = i16>, tap: &SharedTap) {
        self.pending.extend(samples);

        let mut guard = tap.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tap) = guard.as_mut() else {
            self.pending.clear();
            return;
        };

        let chunk_len = tap.buffer_size * self.format.channels.max(1) as usize;
        while self.pending.len() >= chunk_len {
            let samples: Vec<i16> = self.pending.drain(..chunk_len).collect();
            (tap.handler)(AudioFrame {
                samples,
                sample_rate: self.format.sample_rate,
                channels: self.format.channels,
                timestamp_ms: self.started.elapsed().as_millis() as u64,
            });
        }
    }
}

pub struct MicrophoneCapture {
    format: AudioFormat,
    session_active: bool,
    tap: SharedTap,
    stop_signal: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MicrophoneCapture {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;
        let config = device
            .default_input_config()
            .context("Failed to query default input config")?;

        let format = AudioFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };

        info!(
            "Microphone backend initialized ({}Hz, {} channels, {:?})",
            format.sample_rate,
            format.channels,
            config.sample_format()
        );

        Ok(Self {
            format,
            session_active: false,
            tap: Arc::new(Mutex::new(None)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    fn run_stream(
        format: AudioFormat,
        tap: SharedTap,
        stop_signal: Arc<AtomicBool>,
        ready: std_mpsc::Sender<Result<()>>,
    ) {
        let stream = match Self::build_stream(format, tap) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        if let Err(e) = stream.play() {
            let _ = ready.send(Err(anyhow!("Failed to start input stream: {}", e)));
            return;
        }
        let _ = ready.send(Ok(()));

        while !stop_signal.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(20));
        }

        if let Err(e) = stream.pause() {
            warn!("Failed to pause input stream: {}", e);
        }
    }

    fn build_stream(format: AudioFormat, tap: SharedTap) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;
        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let mut chunker = Chunker {
            format,
            pending: Vec::new(),
            started: Instant::now(),
        };
        let on_error = |err: cpal::StreamError| error!("Audio stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                    chunker.push(samples, &tap);
                },
                on_error,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    chunker.push(data.iter().copied(), &tap);
                },
                on_error,
                None,
            )?,
            other => bail!("Unsupported input sample format: {:?}", other),
        };

        Ok(stream)
    }
}

impl AudioCapture for MicrophoneCapture {
    fn name(&self) -> &str {
        "microphone (cpal)"
    }

    fn activate(&mut self, _config: &AudioSessionConfig) -> Result<()> {
        // Desktop hosts have no session categories; activation only gates the engine
        self.session_active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.session_active = false;
        Ok(())
    }

    fn input_format(&self) -> AudioFormat {
        self.format
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

        self.stop_signal.store(false, Ordering::SeqCst);
        let format = self.format;
        let tap = Arc::clone(&self.tap);
        let stop_signal = Arc::clone(&self.stop_signal);
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let handle = thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || Self::run_stream(format, tap, stop_signal, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(handle);
                info!("Microphone capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                bail!("Microphone capture thread exited before starting")
            }
        }
    }

    fn stop_engine(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.stop_signal.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            warn!("Microphone capture thread panicked");
        }
        info!("Microphone capture stopped");
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop_engine();
    }
}
