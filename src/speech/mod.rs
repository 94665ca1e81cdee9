//! Speech input and output: audio normalization, recognition, and synthesis.

pub mod audio;
pub mod recognition;
pub mod synthesis;
pub mod transcribe;

pub use audio::{AudioError, AudioSource, RecordedAudio};
pub use recognition::{HuggingFaceRecognizer, Recognition, RecognitionError, SpeechRecognizer};
pub use synthesis::{
    GoogleTranslateTts, SpeechEngine, SpeechSynthesizer, SynthesisError, SynthesizedAudio,
    VoiceType,
};
pub use transcribe::{Transcriber, TranscriptionError};
