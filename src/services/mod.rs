//! Collaborator interfaces consumed by the core, plus their production
//! implementations. Each trait is narrow on purpose: the session manager and
//! the pipeline only ever see these capability contracts, never transport
//! detail.

pub mod docs;
pub mod formatter;
pub mod notifier;
pub mod transcription;
pub mod voice;

pub use docs::{DocsError, DocumentService, GoogleDocsClient};
pub use formatter::{ChatMinutesFormatter, MinutesFormatter};
pub use notifier::{LogNotifier, Notifier};
pub use transcription::{TranscriptionError, TranscriptionService, WhisperApiClient};
pub use voice::{
    CaptureEvent, FinishedCapture, SourceEncoding, VoiceError, VoiceHandle, VoicePlatform,
    VoiceTarget,
};
