//! Prep Assistant
//!
//! Conversational core of an exam-preparation dashboard's chat widget. A
//! student types a question or presses a suggested button; the assistant
//! either answers in text or takes them to a page of the dashboard, shows a
//! short transition overlay, and picks the conversation back up on the new
//! page.
//!
//! # Layout
//!
//! - [`session`]: one mounted chat surface, driving everything below
//! - [`intent`]: phrases answered locally without a remote call
//! - [`completion`]: the remote chat-completion collaborator
//! - [`navigation`]: reply parsing, the navigation state machine, routing
//! - [`scripted`]: button branches and follow-up messages
//! - [`conversation`]: the message log
//! - [`storage`]: the durable key-value store that survives route changes
//! - [`review`]: the review-classes modal with narrated slides
//! - [`config`]: endpoints, model parameters and pacing

pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod navigation;
pub mod review;
pub mod scripted;
pub mod session;
pub mod storage;

pub use completion::{CompletionClient, OpenAiCompletionClient};
pub use config::{AssistantConfig, CompletionConfig, PacingConfig, SpeechConfig};
pub use conversation::{Button, Conversation, Message, Sender};
pub use error::{AssistantError, AssistantResult, RouteError};
pub use intent::{IntentInterceptor, InterceptResult, Modal};
pub use navigation::{
    HistoryRouter, NavPhase, NavigationIntent, NavigationRequest, NavigationSequencer, Reply,
    Router,
};
pub use session::{ChatSession, Lifetime, MountReason, SessionDeps, SurfaceStatus, TurnOutcome};
pub use storage::{
    DeferredKind, DurableState, FileStore, KeyValueStore, MemoryStore, PendingNavigation,
};
