//! Tandem speech crate - transcript ingest and speech output.
//!
//! Wraps the two speech collaborators behind narrow async traits: the
//! transcription engine that turns audio into attributed transcripts, and
//! the synthesis engine that turns reply text into audio. Mock
//! implementations allow the whole pipeline to run without hardware or
//! provider credentials.

pub mod ingest;
pub mod listener;
pub mod synthesis;
pub mod transcription;

pub use ingest::{IngestOutcome, TranscriptIngest};
pub use listener::ListenerControl;
pub use synthesis::{run_speaker, MockSynthesizer, SpeechSynthesizer};
pub use transcription::{MockTranscription, TranscriptionService};
