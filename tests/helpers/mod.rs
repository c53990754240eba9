//! Shared doubles for the session integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use prep_assistant::navigation::Router;
use prep_assistant::{
    AssistantError, AssistantResult, CompletionClient, DurableState, KeyValueStore, MemoryStore,
    Message, PacingConfig, RouteError, SessionDeps, SurfaceStatus,
};

/// What the fake completion service answers
#[derive(Debug, Clone)]
pub enum CannedReply {
    Text(String),
    Upstream(u16, String),
}

/// Completion double that counts calls and can be slow
pub struct CountingCompletion {
    reply: CannedReply,
    delay: Duration,
    calls: AtomicUsize,
    histories: Mutex<Vec<Vec<Message>>>,
}

impl CountingCompletion {
    pub fn text(reply: &str) -> Arc<Self> {
        Self::build(CannedReply::Text(reply.to_string()), Duration::ZERO)
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        Self::build(CannedReply::Upstream(status, message.to_string()), Duration::ZERO)
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Self::build(CannedReply::Text(reply.to_string()), delay)
    }

    fn build(reply: CannedReply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply,
            delay,
            calls: AtomicUsize::new(0),
            histories: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_history(&self) -> Option<Vec<Message>> {
        self.histories.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionClient for CountingCompletion {
    async fn complete(&self, history: &[Message], _latest: &str) -> AssistantResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().push(history.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            CannedReply::Text(text) => Ok(text.clone()),
            CannedReply::Upstream(status, message) => {
                Err(AssistantError::upstream(*status, message.clone()))
            }
        }
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

/// One observed route change
#[derive(Debug, Clone)]
pub struct RouteCall {
    pub path: String,
    pub elapsed: Duration,
    pub status: Option<SurfaceStatus>,
}

/// Router double that records when it was called and what the surface
/// looked like at that moment
pub struct RecordingRouter {
    started: Instant,
    failure: Option<RouteError>,
    delay: Duration,
    surface: Mutex<Option<watch::Receiver<SurfaceStatus>>>,
    calls: Mutex<Vec<RouteCall>>,
}

impl RecordingRouter {
    pub fn new() -> Arc<Self> {
        Self::build(None, Duration::ZERO)
    }

    pub fn rejecting(error: RouteError) -> Arc<Self> {
        Self::build(Some(error), Duration::ZERO)
    }

    pub fn hanging(delay: Duration) -> Arc<Self> {
        Self::build(None, delay)
    }

    fn build(failure: Option<RouteError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            failure,
            delay,
            surface: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn observe(&self, status: watch::Receiver<SurfaceStatus>) {
        *self.surface.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<RouteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }
}

#[async_trait]
impl Router for RecordingRouter {
    async fn navigate(&self, path: &str) -> Result<(), RouteError> {
        let status = self
            .surface
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| rx.borrow().clone());
        self.calls.lock().unwrap().push(RouteCall {
            path: path.to_string(),
            elapsed: self.started.elapsed(),
            status,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Store double whose writes to one key always fail
pub struct FailingWriteStore {
    inner: MemoryStore,
    key: &'static str,
}

impl FailingWriteStore {
    pub fn new(key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            key,
        })
    }
}

impl KeyValueStore for FailingWriteStore {
    fn get(&self, key: &str) -> AssistantResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> AssistantResult<()> {
        if key == self.key {
            return Err(AssistantError::storage(format!("quota exceeded writing {}", key)));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> AssistantResult<()> {
        self.inner.remove(key)
    }
}

pub fn deps(
    state: &DurableState,
    completion: Arc<CountingCompletion>,
    router: Arc<RecordingRouter>,
    pacing: PacingConfig,
) -> SessionDeps {
    SessionDeps {
        state: state.clone(),
        completion,
        router,
        pacing,
    }
}
