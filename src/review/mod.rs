//! Review-classes modal
//!
//! Opened by the intent interceptor. Walks a subject's slides with spoken
//! narration, then a short quiz and a score summary.

pub mod content;
pub mod narration;
pub mod popup;
pub mod speech;

pub use content::{find_subject, QuizQuestion, Slide, Subject, SUBJECTS};
pub use narration::{NarrationDriver, NarrationOutcome, NarrationStatus};
pub use popup::{AnswerFeedback, PopupStage, PopupView, ReviewClasses, ReviewClassesPopup};
pub use speech::{
    AudioClip, AudioOutput, ElevenLabsSpeechClient, MemoryAudioOutput, PlaybackHandle,
    SpeechClient,
};
