// Integration tests for the capture backends
//
// These run the real replay worker thread, so they use the wall clock.

use anyhow::Result;
use speech_sound::audio::{
    AudioCapture, AudioFormat, AudioFrame, AudioSessionConfig, AudioSessionLease, CaptureConfig,
    CaptureFactory, CaptureSource, ReplayCapture,
};
use speech_sound::audio::lease;
use std::sync::mpsc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn collecting_tap() -> (mpsc::Receiver<AudioFrame>, Box<dyn FnMut(AudioFrame) + Send>) {
    let (tx, rx) = mpsc::channel();
    (
        rx,
        Box::new(move |frame| {
            let _ = tx.send(frame);
        }),
    )
}

#[test]
fn test_audio_frame_stereo_interleaved() {
    let frame = AudioFrame {
        samples: vec![100, 200, 150, 250, 175, 275],
        sample_rate: 44100,
        channels: 2,
        timestamp_ms: 0,
    };

    assert_eq!(frame.frame_count(), 3);
    assert_eq!(frame.to_mono().samples, vec![150, 200, 225]);
}

#[test]
fn test_audio_frame_duration() {
    let frame = AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };

    assert_eq!(frame.duration(), Duration::from_millis(100));
}

#[test]
fn test_silence_capture_delivers_tap_sized_buffers() -> Result<()> {
    let mut capture = ReplayCapture::silence(AudioFormat {
        sample_rate: 16000,
        channels: 1,
    });
    let (frames, tap) = collecting_tap();

    capture.activate(&AudioSessionConfig::default())?;
    capture.install_tap(160, tap)?;
    capture.start_engine()?;
    assert!(capture.is_running());

    let first = frames.recv_timeout(TIMEOUT)?;
    let second = frames.recv_timeout(TIMEOUT)?;
    capture.stop_engine();

    assert_eq!(first.samples.len(), 160);
    assert!(first.samples.iter().all(|s| *s == 0));
    assert_eq!(first.timestamp_ms, 0);
    assert_eq!(second.timestamp_ms, 10);
    assert!(!capture.is_running());
    Ok(())
}

#[test]
fn test_start_engine_twice_fails() -> Result<()> {
    let mut capture = ReplayCapture::silence(AudioFormat {
        sample_rate: 8000,
        channels: 1,
    });
    let (_frames, tap) = collecting_tap();

    capture.activate(&AudioSessionConfig::default())?;
    capture.install_tap(80, tap)?;
    capture.start_engine()?;
    assert!(capture.start_engine().is_err());

    capture.stop_engine();
    Ok(())
}

#[test]
fn test_lease_release_stops_capture() -> Result<()> {
    let capture = lease::shared(Box::new(ReplayCapture::silence(AudioFormat {
        sample_rate: 16000,
        channels: 1,
    })));
    let (frames, tap) = collecting_tap();

    let session = AudioSessionLease::acquire(capture.clone(), &AudioSessionConfig::default())?;
    session.capture().install_tap(160, tap)?;
    session.capture().start_engine()?;
    frames.recv_timeout(TIMEOUT)?;

    session.release();

    // The tap (and its sender) is gone once the lease is released
    while frames.recv_timeout(TIMEOUT).is_ok() {}
    assert!(!capture.lock().unwrap().is_running());
    assert!(capture.lock().unwrap().start_engine().is_err());
    Ok(())
}

#[test]
fn test_dropped_lease_deactivates() -> Result<()> {
    let capture = lease::shared(Box::new(ReplayCapture::silence(AudioFormat {
        sample_rate: 16000,
        channels: 1,
    })));

    {
        let _session =
            AudioSessionLease::acquire(capture.clone(), &AudioSessionConfig::default())?;
    }

    // Inactive session: the engine refuses to start
    assert!(capture.lock().unwrap().start_engine().is_err());
    Ok(())
}

#[test]
fn test_factory_builds_silence_by_default() -> Result<()> {
    let capture = CaptureFactory::create(&CaptureConfig::default())?;

    assert_eq!(
        capture.input_format(),
        AudioFormat {
            sample_rate: 16000,
            channels: 1
        }
    );
    Ok(())
}
