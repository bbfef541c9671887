// Integration tests for WAV loading and replayed capture
//
// Fixtures are generated into temp files with hound.

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use speech_sound::audio::{
    AudioCapture, AudioFile, AudioFrame, AudioSessionConfig, CaptureConfig, CaptureFactory,
    CaptureSource, ReplayCapture,
};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(2);

fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| i as i16).collect()
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("ramp.wav");
    write_wav(&path, 8000, 1, &ramp(4000))?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 8000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 4000);
    assert!((audio.duration_seconds - 0.5).abs() < 1e-9);
    assert!(audio.path.contains("ramp.wav"));
    Ok(())
}

#[test]
fn test_stereo_duration_counts_frames() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("stereo.wav");
    write_wav(&path, 16000, 2, &vec![0; 32000])?;

    let audio = AudioFile::open(&path)?;
    assert!((audio.duration_seconds - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_float_wav_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&path, spec)?;
    writer.write_sample(0.5f32)?;
    writer.finalize()?;

    let err = AudioFile::open(&path).err().expect("float WAV should be rejected");
    assert!(format!("{err:#}").contains("16-bit"));
    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(AudioFile::open("/nonexistent/speech.wav").is_err());
}

#[test]
fn test_replay_delivers_file_then_silence() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("short.wav");
    write_wav(&path, 8000, 1, &ramp(120))?;

    let mut capture = ReplayCapture::from_file(AudioFile::open(&path)?, false);
    let (tx, frames) = mpsc::channel::<AudioFrame>();

    capture.activate(&AudioSessionConfig::default())?;
    capture.install_tap(
        80,
        Box::new(move |frame| {
            let _ = tx.send(frame);
        }),
    )?;
    capture.start_engine()?;

    let first = frames.recv_timeout(TIMEOUT)?;
    let second = frames.recv_timeout(TIMEOUT)?;
    let third = frames.recv_timeout(TIMEOUT)?;
    capture.stop_engine();

    assert_eq!(first.samples, ramp(80));
    assert_eq!(&second.samples[..40], &ramp(120)[80..]);
    assert!(second.samples[40..].iter().all(|s| *s == 0));
    assert!(third.samples.iter().all(|s| *s == 0));
    Ok(())
}

#[test]
fn test_replay_loops_when_asked() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("loop.wav");
    write_wav(&path, 8000, 1, &ramp(50))?;

    let mut capture = ReplayCapture::from_file(AudioFile::open(&path)?, true);
    let (tx, frames) = mpsc::channel::<AudioFrame>();

    capture.activate(&AudioSessionConfig::default())?;
    capture.install_tap(
        80,
        Box::new(move |frame| {
            let _ = tx.send(frame);
        }),
    )?;
    capture.start_engine()?;
    let first = frames.recv_timeout(TIMEOUT)?;
    capture.stop_engine();

    assert_eq!(&first.samples[..50], &ramp(50)[..]);
    assert_eq!(&first.samples[50..], &ramp(30)[..]);
    Ok(())
}

#[test]
fn test_factory_opens_wav_source() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("numbers.wav");
    write_wav(&path, 22050, 2, &vec![0; 4410])?;

    let config = CaptureConfig {
        source: CaptureSource::Wav,
        wav_path: Some(path.to_string_lossy().into_owned()),
        ..CaptureConfig::default()
    };
    let capture = CaptureFactory::create(&config)?;

    assert_eq!(capture.input_format().sample_rate, 22050);
    assert_eq!(capture.input_format().channels, 2);
    Ok(())
}
