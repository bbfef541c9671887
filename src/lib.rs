pub mod audio;
pub mod config;
pub mod game;
pub mod session;
pub mod speech;

pub use audio::{
    AudioCapture, AudioFile, AudioFormat, AudioFrame, AudioSessionConfig, AudioSessionLease,
    CaptureConfig, CaptureFactory, CaptureSource, ReplayCapture,
};
pub use config::Config;
pub use game::{Game, GameConfig, GameInput, GameSummary, Scoreboard, ViewModel};
pub use session::{
    EndReason, SessionConfig, SessionController, SessionEvent, SessionSnapshot, SessionState,
    SessionStats, StartFailure,
};
pub use speech::{
    RecognitionError, RecognitionResult, RecognizerBackend, RecognizerConfig, RecognizerFactory,
    ScriptedRecognizer, SpeechRecognizer,
};
